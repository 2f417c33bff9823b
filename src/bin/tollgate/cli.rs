//! Command-line interface definition.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tollgate::GatewayConfig;

/// Payment-gated data and compute provider gateway.
#[derive(Parser, Debug)]
#[command(name = "tollgate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file.
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// JSON-RPC endpoint of the chain node.
    #[arg(long, env = "TOLLGATE_NETWORK_URL")]
    pub network_url: Option<String>,

    /// Base URL of the metadata store.
    #[arg(long, env = "TOLLGATE_METADATA_STORE_URL")]
    pub metadata_store_url: Option<String>,

    /// Base URL of the compute operator service.
    #[arg(long, env = "TOLLGATE_OPERATOR_SERVICE_URL")]
    pub operator_service_url: Option<String>,

    /// Hex-encoded provider secret key.
    #[arg(long, env = "TOLLGATE_PROVIDER_KEY", hide_env_values = true)]
    pub provider_key: Option<String>,

    /// Log level.
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Operation to run.
    #[command(subcommand)]
    pub command: Command,
}

/// One-shot gate operations.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate a claimed token transfer against the chain.
    VerifyTransfer {
        /// Consumer address the tokens came from.
        #[arg(long)]
        sender: String,
        /// Address the tokens went to.
        #[arg(long)]
        receiver: String,
        /// Token contract address.
        #[arg(long)]
        token: String,
        /// Expected amount in token base units.
        #[arg(long)]
        amount: String,
        /// Transaction hash of the claimed payment.
        #[arg(long)]
        tx: String,
    },

    /// Recover the address that signed a personal message.
    RecoverSigner {
        /// The signed message.
        #[arg(long)]
        message: String,
        /// Hex-encoded 65-byte signature.
        #[arg(long)]
        signature: String,
    },

    /// Resolve an asset and decrypt its download URLs.
    AssetUrls {
        /// Payment token contract address.
        #[arg(long)]
        token: String,
        /// Asset DID.
        #[arg(long)]
        did: String,
    },

    /// Run a download request through the full gate and print the grant.
    GrantAccess {
        /// Path to the JSON request payload.
        #[arg(long)]
        request: PathBuf,
    },

    /// Run a compute request through the full gate and print the job
    /// specification.
    ComputeJob {
        /// Path to the JSON request payload.
        #[arg(long)]
        request: PathBuf,
    },

    /// Print the effective configuration.
    ShowConfig,
}

impl Cli {
    /// Merge CLI arguments over the config file (or defaults) and hand back
    /// the command to run.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file is specified but cannot be loaded.
    pub fn into_config(self) -> color_eyre::Result<(GatewayConfig, Command)> {
        // Start with default config or load from file
        let mut config = if let Some(ref path) = self.config {
            GatewayConfig::from_file(path)?
        } else {
            let default_path = GatewayConfig::default_path();
            if default_path.exists() {
                GatewayConfig::from_file(&default_path)?
            } else {
                GatewayConfig::default()
            }
        };

        // Override with CLI arguments
        if let Some(network_url) = self.network_url {
            config.network_url = network_url;
        }
        if let Some(metadata_store_url) = self.metadata_store_url {
            config.metadata_store_url = metadata_store_url;
        }
        if let Some(operator_service_url) = self.operator_service_url {
            config.operator_service_url = operator_service_url;
        }
        if let Some(provider_key) = self.provider_key {
            config.provider_key = Some(provider_key);
        }
        config.log_level = self.log_level;

        Ok((config, self.command))
    }
}
