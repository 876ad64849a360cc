//! Configuration loaded from TOML.
//!
//! ```toml
//! [scheduler]
//! idle_backoff_ms = 250
//!
//! [coordinator]
//! auto_start = true
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EaselConfig {
    pub scheduler: SchedulerConfig,
    pub coordinator: CoordinatorConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// How long the processing loop idles when nothing is eligible.
    pub idle_backoff_ms: u64,
}

impl SchedulerConfig {
    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms.max(1))
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            idle_backoff_ms: 250,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Start the processing loop right after restore when online.
    pub auto_start: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self { auto_start: true }
    }
}

impl EaselConfig {
    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = EaselConfig::load(&dir.path().join("easel.toml")).unwrap();
        assert_eq!(config, EaselConfig::default());
        assert_eq!(config.scheduler.idle_backoff(), Duration::from_millis(250));
        assert!(config.coordinator.auto_start);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[scheduler]\nidle_backoff_ms = 40").unwrap();

        let config = EaselConfig::load(file.path()).unwrap();
        assert_eq!(config.scheduler.idle_backoff_ms, 40);
        assert!(config.coordinator.auto_start);
    }

    #[test]
    fn invalid_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[scheduler]\nidle_backoff_ms = \"soon\"").unwrap();

        let err = EaselConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
