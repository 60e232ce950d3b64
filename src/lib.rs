//! Response cache for generative-AI brand analyses.
//!
//! This crate provides:
//! - Deterministic fingerprinting of analysis requests (question + brand + competitors + model)
//! - A persistent SQLite-backed cache with TTL expiration and hit accounting
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{AnalysisConfig, CacheEntry, CacheEvent, CacheStats, ResponseCache};
pub use config::AppConfig;
pub use error::Error;
