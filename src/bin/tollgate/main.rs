//! tollgate CLI entry point.

mod cli;

use clap::Parser;
use cli::{Cli, Command};
use std::sync::Arc;
use std::time::Duration;
use tollgate::asset::files;
use tollgate::asset::registry::{AssetRegistry, HttpAssetRegistry};
use tollgate::chain::rpc::HttpChainClient;
use tollgate::chain::signature::{decode_signature, recover_signer, ProviderAccount};
use tollgate::chain::{format_address, parse_address, parse_tx_hash};
use tollgate::payment::{TransferValidator, TransferValidatorConfig};
use tollgate::{Error, GatewayConfig, HttpProviderGateway};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    info!("tollgate v{}", env!("CARGO_PKG_VERSION"));

    let (config, command) = cli.into_config()?;

    match command {
        Command::VerifyTransfer {
            sender,
            receiver,
            token,
            amount,
            tx,
        } => {
            let validator = TransferValidator::new(
                Arc::new(HttpChainClient::new(&config.network_url, REQUEST_TIMEOUT)?),
                TransferValidatorConfig {
                    confirm_timeout: config.confirmation.timeout(),
                    poll_interval: config.confirmation.poll_interval(),
                    cache_capacity: config.cache_capacity,
                },
            );

            let expected = ethereum_types::U256::from_dec_str(&amount)
                .map_err(|_| Error::BadRequest(format!("amount {amount:?} is not decimal")))?;
            let value = validator
                .validate(
                    parse_address(&sender)?,
                    parse_address(&receiver)?,
                    parse_address(&token)?,
                    expected,
                    parse_tx_hash(&tx)?,
                )
                .await?;

            println!("transfer verified: {value} base units moved");
        }

        Command::RecoverSigner { message, signature } => {
            let signer = recover_signer(&message, &decode_signature(&signature)?)?;
            println!("{}", format_address(signer));
        }

        Command::AssetUrls { token, did } => {
            let account = provider_account(&config)?;
            let registry = HttpAssetRegistry::new(&config.metadata_store_url, REQUEST_TIMEOUT)?;

            let asset = registry.resolve(parse_address(&token)?, &did).await?;
            for url in files::asset_urls(&asset, &account)? {
                println!("{url}");
            }
        }

        Command::GrantAccess { request } => {
            let payload: serde_json::Value =
                serde_json::from_str(&std::fs::read_to_string(&request)?)?;
            let gateway = HttpProviderGateway::from_config(config)?;

            let grant = gateway.initiate_access(payload).await?;
            println!("{}", serde_json::to_string_pretty(&grant)?);
        }

        Command::ComputeJob { request } => {
            let payload: serde_json::Value =
                serde_json::from_str(&std::fs::read_to_string(&request)?)?;
            let gateway = HttpProviderGateway::from_config(config)?;

            let job = gateway.initiate_compute_job(payload).await?;
            println!("{}", serde_json::to_string_pretty(&job)?);
            info!(
                "submit to operator at {}",
                gateway.operator_compute_endpoint()
            );
        }

        Command::ShowConfig => {
            let mut printable = config;
            if printable.provider_key.is_some() {
                printable.provider_key = Some("<redacted>".to_string());
            }
            println!("{}", toml::to_string_pretty(&printable)?);
        }
    }

    Ok(())
}

fn provider_account(config: &GatewayConfig) -> Result<ProviderAccount, Error> {
    let key = config
        .provider_key
        .as_deref()
        .ok_or_else(|| Error::Config("provider key not configured".to_string()))?;
    ProviderAccount::from_hex(key)
}
