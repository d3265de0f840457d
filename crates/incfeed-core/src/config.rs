//! Notifier timing configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::notification::DEFAULT_PREVIEW_CHARS;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_500;
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 4_000;
pub const DEFAULT_LEASE_TTL_MS: u64 = 7_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error(
        "lease_ttl_ms ({lease_ttl_ms}) must exceed heartbeat_interval_ms ({heartbeat_interval_ms})"
    )]
    LeaseTooShort {
        lease_ttl_ms: u64,
        heartbeat_interval_ms: u64,
    },
}

/// Tunable timings. Any values with `lease_ttl_ms > heartbeat_interval_ms`
/// keep the protocol correct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NotifierConfig {
    pub poll_interval_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub lease_ttl_ms: u64,
    pub preview_chars: usize,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            lease_ttl_ms: DEFAULT_LEASE_TTL_MS,
            preview_chars: DEFAULT_PREVIEW_CHARS,
        }
    }
}

impl NotifierConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Zero("poll_interval_ms"));
        }
        if self.heartbeat_interval_ms == 0 {
            return Err(ConfigError::Zero("heartbeat_interval_ms"));
        }
        if self.preview_chars == 0 {
            return Err(ConfigError::Zero("preview_chars"));
        }
        if self.lease_ttl_ms <= self.heartbeat_interval_ms {
            return Err(ConfigError::LeaseTooShort {
                lease_ttl_ms: self.lease_ttl_ms,
                heartbeat_interval_ms: self.heartbeat_interval_ms,
            });
        }
        Ok(())
    }

    /// Parse and validate a TOML document. Missing keys take defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = NotifierConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.poll_interval_ms, 1_500);
        assert_eq!(config.heartbeat_interval_ms, 4_000);
        assert_eq!(config.lease_ttl_ms, 7_000);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = NotifierConfig::from_toml_str("poll_interval_ms = 500\n").expect("valid");
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.lease_ttl_ms, DEFAULT_LEASE_TTL_MS);
    }

    #[test]
    fn lease_must_exceed_heartbeat() {
        let err = NotifierConfig::from_toml_str("heartbeat_interval_ms = 7000\n")
            .expect_err("ttl == heartbeat");
        assert!(matches!(err, ConfigError::LeaseTooShort { .. }));
    }

    #[test]
    fn zero_interval_rejected() {
        let err = NotifierConfig::from_toml_str("poll_interval_ms = 0\n").expect_err("zero");
        assert!(matches!(err, ConfigError::Zero("poll_interval_ms")));
    }

    #[test]
    fn unknown_keys_rejected() {
        let err = NotifierConfig::from_toml_str("poll_ms = 1\n").expect_err("unknown");
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
