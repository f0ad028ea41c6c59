//! Runtime configuration of the persistence core.
//!
//! # Invariants
//! - `default_page_size` is positive and not above `max_page_size`.
//! - Missing keys fall back to the defaults below.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 2000;
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5000;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PersistenceConfig {
    /// Page size used when a request carries none.
    pub default_page_size: u32,
    /// Upper bound for requested page sizes; larger requests are clamped.
    pub max_page_size: u32,
    /// How long a session waits for a record lock or a busy store.
    pub lock_timeout_ms: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }
}

impl PersistenceConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn from_json_str(raw: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.default_page_size == 0 {
            return Err(ConfigError::Invalid(
                "default_page_size must be positive".to_string(),
            ));
        }
        if self.max_page_size < self.default_page_size {
            return Err(ConfigError::Invalid(format!(
                "max_page_size {} is below default_page_size {}",
                self.max_page_size, self.default_page_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, PersistenceConfig};
    use std::time::Duration;

    #[test]
    fn missing_keys_use_defaults() {
        let config = PersistenceConfig::from_json_str(r#"{"default_page_size": 3}"#).unwrap();
        assert_eq!(config.default_page_size, 3);
        assert_eq!(config.max_page_size, 2000);
        assert_eq!(config.lock_timeout(), Duration::from_millis(5000));
    }

    #[test]
    fn zero_default_page_size_is_rejected() {
        let err = PersistenceConfig::from_json_str(r#"{"default_page_size": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = PersistenceConfig::from_json_str(r#"{"page": 3}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_reads_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.json");
        std::fs::write(&path, r#"{"lock_timeout_ms": 250}"#).unwrap();

        let config = PersistenceConfig::load(&path).unwrap();
        assert_eq!(config.lock_timeout(), Duration::from_millis(250));
    }
}
