//! SQLite-backed response cache for generative-AI analyses.
//!
//! This module provides a persistent cache between the analysis engine and
//! billed provider calls, using SQLite with async access via tokio-rusqlite.
//! It supports:
//!
//! - Deterministic fingerprints over semantically-equivalent requests (SHA-256)
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - TTL expiration, enforced lazily at read time plus an explicit sweep
//! - Hit/miss accounting and targeted invalidation by brand

pub mod connection;
pub mod engine;
pub mod entries;
pub mod events;
pub mod fingerprint;
pub mod migrations;
pub mod stats;

pub use crate::Error;

pub use connection::CacheDb;
pub use engine::ResponseCache;
pub use entries::CacheEntry;
pub use events::{CacheEvent, EventKind};
pub use fingerprint::AnalysisConfig;
pub use stats::CacheStats;
