//! Engine configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (BRANDLENS_*)
//! 2. TOML config file (if BRANDLENS_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Engine configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (BRANDLENS_*)
/// 2. TOML config file (if BRANDLENS_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite cache database.
    ///
    /// Set via BRANDLENS_DB_PATH environment variable. The host process may
    /// point this at a database shared with its other tables.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Default TTL applied by `set` when the caller supplies none.
    ///
    /// Set via BRANDLENS_DEFAULT_TTL_SECONDS environment variable.
    #[serde(default = "default_ttl_seconds")]
    pub default_ttl_seconds: i64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./brandlens-cache.sqlite")
}

fn default_ttl_seconds() -> i64 {
    7 * 24 * 3600 // 7 days
}

impl Default for AppConfig {
    fn default() -> Self {
        Self { db_path: default_db_path(), default_ttl_seconds: default_ttl_seconds() }
    }
}

impl AppConfig {
    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `BRANDLENS_`
    /// 2. TOML file from `BRANDLENS_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("BRANDLENS_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("BRANDLENS_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
