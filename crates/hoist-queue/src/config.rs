use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::QueueError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub concurrency: usize,
    pub max_retries: u32,
    pub auto_retry: bool,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub stall_threshold_ms: u64,
    pub cleanup_grace_ms: u64,
    /// How long a cancelled transfer may keep running before it is dropped.
    pub cancel_grace_ms: u64,
    pub event_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            max_retries: 3,
            auto_retry: true,
            retry_base_delay_ms: 1_000,
            retry_max_delay_ms: 30_000,
            stall_threshold_ms: 5_000,
            cleanup_grace_ms: 1_500,
            cancel_grace_ms: 5_000,
            event_capacity: 256,
        }
    }
}

impl QueueConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, QueueError> {
        let config: QueueConfig = toml::from_str(s).map_err(|e| QueueError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, QueueError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String, QueueError> {
        toml::to_string_pretty(self).map_err(|e| QueueError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), QueueError> {
        if self.concurrency == 0 {
            return Err(QueueError::Config("concurrency must be at least 1".into()));
        }
        if self.retry_base_delay_ms > self.retry_max_delay_ms {
            return Err(QueueError::Config(format!(
                "retry_base_delay_ms ({}) exceeds retry_max_delay_ms ({})",
                self.retry_base_delay_ms, self.retry_max_delay_ms
            )));
        }
        if self.event_capacity == 0 {
            return Err(QueueError::Config("event_capacity must be at least 1".into()));
        }
        Ok(())
    }

    pub fn stall_threshold(&self) -> Duration {
        Duration::from_millis(self.stall_threshold_ms)
    }

    pub fn cleanup_grace(&self) -> Duration {
        Duration::from_millis(self.cleanup_grace_ms)
    }

    pub fn cancel_grace(&self) -> Duration {
        Duration::from_millis(self.cancel_grace_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = QueueConfig::from_toml_str("concurrency = 5\nauto_retry = false\n").unwrap();
        assert_eq!(config.concurrency, 5);
        assert!(!config.auto_retry);
        assert_eq!(config.max_retries, QueueConfig::default().max_retries);
    }

    #[test]
    fn rejects_zero_concurrency() {
        assert!(matches!(
            QueueConfig::from_toml_str("concurrency = 0"),
            Err(QueueError::Config(_))
        ));
    }

    #[test]
    fn rejects_inverted_delays() {
        let err = QueueConfig::from_toml_str("retry_base_delay_ms = 10\nretry_max_delay_ms = 5")
            .unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn toml_roundtrip() {
        let config = QueueConfig {
            concurrency: 7,
            ..QueueConfig::default()
        };
        let text = config.to_toml_string().unwrap();
        assert_eq!(QueueConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn load_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("queue.toml");
        std::fs::write(&path, "max_retries = 1\n").unwrap();
        assert_eq!(QueueConfig::load(&path).unwrap().max_retries, 1);
        assert!(matches!(
            QueueConfig::load(&tmp.path().join("missing.toml")),
            Err(QueueError::Io(_))
        ));
    }
}
