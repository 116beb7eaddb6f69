//! Process-level configuration

use crate::logging::LogFormat;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while reading configuration from the environment
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable held a value that could not be parsed
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Application-wide settings shared by every binary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application name, used as the tracing target prefix
    pub app_name: String,
    /// Deployment environment (development, production, ...)
    pub environment: String,
    /// Log line format
    pub log_format: LogFormat,
    /// Default `EnvFilter` directive when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: "nexus".to_string(),
            environment: "development".to_string(),
            log_format: LogFormat::Pretty,
            log_filter: "warn,nexus=info".to_string(),
        }
    }
}

impl AppConfig {
    /// Read `NEXUS_ENV` and `NEXUS_LOG_FORMAT` on top of the defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`AppConfig::from_env`] with an injectable variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(env) = lookup("NEXUS_ENV") {
            config.environment = env;
        }

        if let Some(format) = lookup("NEXUS_LOG_FORMAT") {
            config.log_format = format.parse().map_err(|reason| ConfigError::InvalidValue {
                key: "NEXUS_LOG_FORMAT".to_string(),
                reason,
            })?;
        }

        Ok(config)
    }

    /// Whether this process runs in production
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.app_name, "nexus");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(!config.is_production());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> =
            HashMap::from([("NEXUS_ENV", "production"), ("NEXUS_LOG_FORMAT", "json")]);
        let config = AppConfig::from_lookup(|k| vars.get(k).map(|v| (*v).to_string())).unwrap();

        assert!(config.is_production());
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_log_format() {
        let err = AppConfig::from_lookup(|k| (k == "NEXUS_LOG_FORMAT").then(|| "yaml".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "NEXUS_LOG_FORMAT"));
    }
}
