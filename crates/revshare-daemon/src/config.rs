//! Configuration file management.

use std::path::PathBuf;
use std::time::Duration;

use revshare_ledger::settlement::SettlementConfig;
use serde::{Deserialize, Serialize};

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// RPC socket settings.
    #[serde(default)]
    pub rpc: RpcConfig,
    /// Settlement worker timing.
    #[serde(default)]
    pub settlement: SettlementSettings,
    /// Advanced settings.
    #[serde(default)]
    pub advanced: AdvancedConfig,
}

/// Which [`revshare_ledger::LedgerStore`] backs the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Sqlite,
    /// Nothing survives a restart.
    Memory,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Data directory. Empty = platform default.
    #[serde(default)]
    pub data_dir: String,
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,
}

/// RPC configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Socket file name inside the data directory.
    #[serde(default = "default_socket_name")]
    pub socket_name: String,
}

/// Settlement configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementSettings {
    /// Seconds after recording before a payment counts as confirmed.
    #[serde(default = "default_confirmation_delay")]
    pub confirmation_delay_secs: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Pending transactions older than this are failed.
    #[serde(default = "default_settlement_timeout")]
    pub timeout_secs: u64,
}

/// Advanced configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedConfig {
    /// Log level: "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default value functions

fn default_backend() -> StorageBackend {
    StorageBackend::Sqlite
}

fn default_socket_name() -> String {
    "revshare.sock".to_string()
}

fn default_confirmation_delay() -> u64 {
    revshare_ledger::settlement::DEFAULT_CONFIRMATION_DELAY_SECS
}

fn default_poll_interval() -> u64 {
    revshare_ledger::settlement::DEFAULT_POLL_INTERVAL.as_millis() as u64
}

fn default_settlement_timeout() -> u64 {
    revshare_ledger::settlement::DEFAULT_SETTLEMENT_TIMEOUT.as_secs()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: String::new(),
            backend: default_backend(),
        }
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            socket_name: default_socket_name(),
        }
    }
}

impl Default for SettlementSettings {
    fn default() -> Self {
        Self {
            confirmation_delay_secs: default_confirmation_delay(),
            poll_interval_ms: default_poll_interval(),
            timeout_secs: default_settlement_timeout(),
        }
    }
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl SettlementSettings {
    /// Worker timing derived from these settings.
    pub fn worker_config(&self) -> SettlementConfig {
        SettlementConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from the default config file location.
    ///
    /// Falls back to defaults if file does not exist.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: DaemonConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> PathBuf {
        if self.storage.data_dir.is_empty() {
            Self::default_data_dir()
        } else {
            PathBuf::from(&self.storage.data_dir)
        }
    }

    /// Get the RPC socket path.
    pub fn socket_path(&self) -> PathBuf {
        self.data_dir().join(&self.rpc.socket_name)
    }

    /// Get the config file path.
    fn config_path() -> PathBuf {
        Self::default_data_dir().join("config.toml")
    }

    /// Platform-specific default data directory.
    fn default_data_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("REVSHARE_DATA_DIR") {
            return PathBuf::from(dir);
        }
        #[cfg(target_os = "macos")]
        {
            dirs_fallback("Library/Application Support/Revshare")
        }
        #[cfg(not(target_os = "macos"))]
        {
            dirs_fallback(".revshare")
        }
    }
}

/// Fallback home directory resolution.
fn dirs_fallback(subpath: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(subpath))
        .unwrap_or_else(|_| PathBuf::from("/tmp/revshare"))
}
