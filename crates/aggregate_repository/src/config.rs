//! Gateway and logging configuration.
//!
//! # Responsibility
//! - Describe where the backing store lives and how connections are tuned.
//! - Provide serde-friendly shapes so hosts can load settings from their own
//!   config files.
//!
//! # Invariants
//! - Every field has a default; an empty document is a valid config.

use crate::logging::default_log_level;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_PERSISTENCE_UNIT: &str = "default";
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Location of the backing SQLite database.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DatabaseTarget {
    /// Private in-memory database, discarded when the gateway is dropped.
    #[default]
    Memory,
    /// Database file on disk.
    File { path: PathBuf },
}

impl DatabaseTarget {
    /// Short label used in log events.
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::File { .. } => "file",
        }
    }
}

/// Settings for one persistence gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Name of the persistence unit, reported in every log event.
    pub persistence_unit: String,
    pub database: DatabaseTarget,
    /// How long a writer waits on a locked database before failing.
    pub busy_timeout_ms: u64,
    /// Enables `PRAGMA foreign_keys` on the connection.
    pub foreign_keys: bool,
}

impl GatewayConfig {
    /// In-memory config, mostly useful for tests.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// File-backed config with default tuning.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            database: DatabaseTarget::File { path: path.into() },
            ..Self::default()
        }
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            persistence_unit: DEFAULT_PERSISTENCE_UNIT.to_string(),
            database: DatabaseTarget::Memory,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            foreign_keys: true,
        }
    }
}

/// Settings consumed by [`crate::logging::init_logging`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    /// Absolute directory for rolling log files.
    pub log_dir: PathBuf,
}

impl LoggingConfig {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            level: default_level(),
            log_dir: log_dir.into(),
        }
    }
}

fn default_level() -> String {
    default_log_level().to_string()
}

#[cfg(test)]
mod tests {
    use super::{DatabaseTarget, GatewayConfig, LoggingConfig};
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn empty_document_yields_defaults() {
        let config: GatewayConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, GatewayConfig::default());
        assert_eq!(config.persistence_unit, "default");
        assert_eq!(config.database, DatabaseTarget::Memory);
        assert_eq!(config.busy_timeout(), Duration::from_secs(5));
        assert!(config.foreign_keys);
    }

    #[test]
    fn file_target_deserializes_with_tag() {
        let config: GatewayConfig = serde_json::from_str(
            r#"{
                "persistence_unit": "orders",
                "database": { "kind": "file", "path": "/var/lib/app/orders.db" },
                "busy_timeout_ms": 250
            }"#,
        )
        .unwrap();

        assert_eq!(config.persistence_unit, "orders");
        assert_eq!(
            config.database,
            DatabaseTarget::File {
                path: PathBuf::from("/var/lib/app/orders.db")
            }
        );
        assert_eq!(config.database.mode(), "file");
        assert_eq!(config.busy_timeout_ms, 250);
        assert!(config.foreign_keys);
    }

    #[test]
    fn logging_level_falls_back_to_build_default() {
        let config: LoggingConfig = serde_json::from_str(r#"{ "log_dir": "/tmp/logs" }"#).unwrap();
        assert_eq!(config.level, crate::logging::default_log_level());
        assert_eq!(config, LoggingConfig::new("/tmp/logs"));
    }
}
