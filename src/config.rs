//! Configuration for the tollgate provider gateway.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Gateway configuration.
///
/// Loaded once at process start and passed by reference into every
/// component constructor; nothing reads configuration ambiently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// JSON-RPC endpoint of the chain node.
    #[serde(default = "default_network_url")]
    pub network_url: String,

    /// Base URL of the metadata store (asset registry).
    #[serde(default = "default_metadata_store_url")]
    pub metadata_store_url: String,

    /// Base URL of the compute operator service.
    #[serde(default = "default_operator_service_url")]
    pub operator_service_url: String,

    /// Hex-encoded secp256k1 secret key of the provider account.
    #[serde(default)]
    pub provider_key: Option<String>,

    /// Transfer confirmation settings.
    #[serde(default)]
    pub confirmation: ConfirmationConfig,

    /// Capacity of the verified-transfer cache.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// How long to wait for a payment transaction to reach a block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationConfig {
    /// Overall wait budget in seconds before giving up on confirmation.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Poll interval in milliseconds while the transaction is pending.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            network_url: default_network_url(),
            metadata_store_url: default_metadata_store_url(),
            operator_service_url: default_operator_service_url(),
            provider_key: None,
            confirmation: ConfirmationConfig::default(),
            cache_capacity: default_cache_capacity(),
            log_level: default_log_level(),
        }
    }
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_network_url() -> String {
    "http://localhost:8545".to_string()
}

fn default_metadata_store_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_operator_service_url() -> String {
    "http://localhost:8050".to_string()
}

const fn default_cache_capacity() -> usize {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_timeout_secs() -> u64 {
    60
}

const fn default_poll_interval_ms() -> u64 {
    100
}

impl ConfirmationConfig {
    /// Overall confirmation wait budget.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Poll interval while a transaction is pending.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl GatewayConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Save configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file(&self, path: &std::path::Path) -> crate::Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Default location of the gateway's config file.
    #[must_use]
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("", "", "tollgate")
            .map(|dirs| dirs.config_dir().join("tollgate.toml"))
            .unwrap_or_else(|| PathBuf::from("tollgate.toml"))
    }

    /// Endpoint jobs are submitted to on the operator service.
    #[must_use]
    pub fn operator_compute_endpoint(&self) -> String {
        format!(
            "{}/api/v1/operator/compute",
            self.operator_service_url.trim_end_matches('/')
        )
    }
}
