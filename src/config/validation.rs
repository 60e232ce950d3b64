//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

/// One year, the upper bound for the default TTL.
const MAX_TTL_SECONDS: i64 = 365 * 24 * 3600;

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `default_ttl_seconds` is not positive or exceeds one year
    /// - `db_path` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_ttl_seconds < 1 {
            return Err(ConfigError::Invalid {
                field: "default_ttl_seconds".into(),
                reason: "must be at least 1 second".into(),
            });
        }
        if self.default_ttl_seconds > MAX_TTL_SECONDS {
            return Err(ConfigError::Invalid {
                field: "default_ttl_seconds".into(),
                reason: "must not exceed one year (31536000s)".into(),
            });
        }

        if self.db_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid { field: "db_path".into(), reason: "must not be empty".into() });
        }

        if self.default_ttl_seconds < 60 {
            tracing::warn!(
                default_ttl_seconds = self.default_ttl_seconds,
                "default TTL under a minute; most entries will expire before reuse"
            );
        }

        Ok(())
    }
}
