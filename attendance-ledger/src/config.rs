//! Configuration for the attendance ledger

use crate::types::Identity;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Fixed administrator identity, immutable once the store is initialized
    pub admin_identity: String,

    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Writer mailbox capacity (pending mutations)
    pub mailbox_capacity: usize,

    /// Emit JSON log lines instead of human-readable ones
    pub log_json: bool,

    /// RocksDB configuration
    pub rocksdb: RocksDBConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            admin_identity: String::new(),
            data_dir: PathBuf::from("./data/attendance"),
            service_name: "attendance-ledger".to_string(),
            mailbox_capacity: 1000,
            log_json: false,
            rocksdb: RocksDBConfig::default(),
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RocksDBConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Sync the WAL on every write
    pub sync_writes: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 16,
            max_write_buffer_number: 2,
            max_background_jobs: 2,
            sync_writes: false,
        }
    }
}

impl Config {
    /// Config with the given administrator and data directory, defaults elsewhere
    pub fn new(admin_identity: impl Into<String>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            admin_identity: admin_identity.into(),
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(admin) = std::env::var("ATTENDANCE_ADMIN") {
            config.admin_identity = admin;
        }

        if let Ok(data_dir) = std::env::var("ATTENDANCE_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(flag) = std::env::var("ATTENDANCE_LOG_JSON") {
            config.log_json = matches!(flag.as_str(), "1" | "true" | "yes");
        }

        Ok(config)
    }

    /// Check the configuration and return the parsed administrator identity
    pub fn validate(&self) -> crate::Result<Identity> {
        if self.mailbox_capacity == 0 {
            return Err(crate::Error::Config(
                "mailbox_capacity must be greater than zero".to_string(),
            ));
        }

        Identity::parse(&self.admin_identity).map_err(|e| {
            crate::Error::Config(format!("admin_identity is not usable: {}", e))
        })
    }
}
