//! Shared fixtures: scripted chain, static registry, accounts, assets.

use ethereum_types::{H160, H256, U256};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tollgate::asset::files::encrypt_file_list;
use tollgate::asset::registry::AssetRegistry;
use tollgate::asset::{AlgorithmMetadata, Asset, MainMetadata, Metadata, Service, ServiceType};
use tollgate::chain::signature::ProviderAccount;
use tollgate::chain::{
    format_address, format_tx_hash, ChainClient, ChainError, TransferEvent, TxInfo,
};
use tollgate::compute::Container;
use tollgate::config::{ConfirmationConfig, GatewayConfig};
use tollgate::error::Error;
use tollgate::provider::ProviderGateway;

/// Standard test mnemonic account #0 - plays the consumer.
pub const CONSUMER_KEY: &str =
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Standard test mnemonic account #1 - plays the provider.
pub const PROVIDER_KEY: &str =
    "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

pub fn consumer_account() -> ProviderAccount {
    ProviderAccount::from_hex(CONSUMER_KEY).expect("consumer test key")
}

pub fn provider_account() -> ProviderAccount {
    ProviderAccount::from_hex(PROVIDER_KEY).expect("provider test key")
}

pub fn data_token() -> H160 {
    H160::repeat_byte(0xda)
}

pub fn algo_token() -> H160 {
    H160::repeat_byte(0xa1)
}

pub fn tx_hash(n: u8) -> H256 {
    H256::repeat_byte(n)
}

/// Hex signature of `message` by `account`, as requests carry it.
pub fn sig_hex(account: &ProviderAccount, message: &str) -> String {
    format!("0x{}", hex::encode(account.sign_message(message)))
}

#[derive(Default)]
struct ChainState {
    txs: HashMap<H256, TxInfo>,
    pending_polls: HashMap<H256, usize>,
    events: HashMap<(H160, u64, H160, H160), TransferEvent>,
    balances: HashMap<(H160, H160, u64), U256>,
    out_of_range: Vec<u64>,
}

/// In-process [`ChainClient`] scripted per test.
///
/// Counts every call so tests can assert that a rejection happened before
/// any chain access.
#[derive(Clone, Default)]
pub struct ScriptedChain {
    state: Arc<Mutex<ChainState>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_tx(&self, tx: H256, info: TxInfo) {
        self.state.lock().txs.insert(tx, info);
    }

    /// Script a transaction that reports no block for the first `polls`
    /// fetches, then confirms.
    pub fn add_pending_tx(&self, tx: H256, polls: usize, info: TxInfo) {
        let mut state = self.state.lock();
        state.txs.insert(tx, info);
        state.pending_polls.insert(tx, polls);
    }

    pub fn add_event(&self, token: H160, block: u64, event: TransferEvent) {
        self.state
            .lock()
            .events
            .insert((token, block, event.from, event.to), event);
    }

    /// File an event under an arbitrary query key, for scripting nodes
    /// whose filtered logs answer with mismatched parties.
    pub fn add_event_for_query(
        &self,
        token: H160,
        block: u64,
        query_from: H160,
        query_to: H160,
        event: TransferEvent,
    ) {
        self.state
            .lock()
            .events
            .insert((token, block, query_from, query_to), event);
    }

    pub fn set_balance(&self, token: H160, account: H160, block: u64, value: U256) {
        self.state
            .lock()
            .balances
            .insert((token, account, block), value);
    }

    pub fn mark_out_of_range(&self, block: u64) {
        self.state.lock().out_of_range.push(block);
    }

    /// Total chain calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ChainClient for ScriptedChain {
    async fn transaction(&self, tx: H256) -> Result<Option<TxInfo>, ChainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();

        let Some(info) = state.txs.get(&tx).cloned() else {
            return Ok(None);
        };
        if let Some(remaining) = state.pending_polls.get_mut(&tx) {
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(Some(TxInfo {
                    block_number: None,
                    ..info
                }));
            }
        }
        Ok(Some(info))
    }

    async fn transfer_event(
        &self,
        token: H160,
        block: u64,
        from: H160,
        to: H160,
    ) -> Result<Option<TransferEvent>, ChainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .state
            .lock()
            .events
            .get(&(token, block, from, to))
            .cloned())
    }

    async fn balance_at(
        &self,
        token: H160,
        account: H160,
        block: u64,
    ) -> Result<U256, ChainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock();
        if state.out_of_range.contains(&block) {
            return Err(ChainError::BlockOutOfRange(block));
        }
        Ok(state
            .balances
            .get(&(token, account, block))
            .copied()
            .unwrap_or_default())
    }
}

/// In-process [`AssetRegistry`] holding a fixed asset set.
#[derive(Clone, Default)]
pub struct StaticRegistry {
    assets: Arc<Mutex<HashMap<(H160, String), Asset>>>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, token: H160, asset: Asset) {
        self.assets
            .lock()
            .insert((token, asset.did.clone()), asset);
    }
}

impl AssetRegistry for StaticRegistry {
    async fn resolve(&self, token: H160, did: &str) -> Result<Asset, Error> {
        self.assets
            .lock()
            .get(&(token, did.to_string()))
            .cloned()
            .ok_or_else(|| Error::AssetNotFound {
                token: format_address(token),
                did: did.to_string(),
            })
    }
}

/// A data asset offering access (cost 10) and compute (cost 25) services,
/// with two encrypted download URLs.
pub fn data_asset(provider: &ProviderAccount) -> Asset {
    let files = r#"[{"url": "https://market.example/weather.csv"}, {"url": "https://market.example/stations.csv"}]"#;
    Asset {
        did: "did:op:weather".to_string(),
        data_token: format_address(data_token()),
        services: vec![
            Service {
                service_type: ServiceType::Access,
                index: 0,
                service_endpoint: "http://gateway:8030/api/v1/services/consume".to_string(),
                cost: "10".to_string(),
            },
            Service {
                service_type: ServiceType::Compute,
                index: 1,
                service_endpoint: "http://gateway:8030/api/v1/services/compute".to_string(),
                cost: "25".to_string(),
            },
        ],
        metadata: Metadata {
            main: MainMetadata {
                name: "weather data".to_string(),
                algorithm: None,
            },
        },
        encrypted_files: encrypt_file_list(files, provider).expect("encryptable fixture"),
    }
}

/// An algorithm asset with an access service (cost 5), a complete container
/// spec, and one encrypted code URL.
pub fn algo_asset(provider: &ProviderAccount) -> Asset {
    let files = r#"[{"url": "https://market.example/average.py"}]"#;
    Asset {
        did: "did:op:algo".to_string(),
        data_token: format_address(algo_token()),
        services: vec![Service {
            service_type: ServiceType::Access,
            index: 0,
            service_endpoint: "http://gateway:8030/api/v1/services/consume".to_string(),
            cost: "5".to_string(),
        }],
        metadata: Metadata {
            main: MainMetadata {
                name: "rolling average".to_string(),
                algorithm: Some(AlgorithmMetadata {
                    container: Container {
                        entrypoint: "python $ALGO".to_string(),
                        image: "python".to_string(),
                        tag: "3.11-slim".to_string(),
                    },
                }),
            },
        },
        encrypted_files: encrypt_file_list(files, provider).expect("encryptable fixture"),
    }
}

/// Gateway configuration pointed at the fixtures, with fast confirmation
/// polling.
pub fn test_config() -> GatewayConfig {
    GatewayConfig {
        network_url: "http://node.test:8545".to_string(),
        metadata_store_url: "http://metastore.test:5000".to_string(),
        operator_service_url: "http://operator.test:8050".to_string(),
        provider_key: Some(PROVIDER_KEY.to_string()),
        confirmation: ConfirmationConfig {
            timeout_secs: 1,
            poll_interval_ms: 10,
        },
        ..GatewayConfig::default()
    }
}

/// A gateway over the scripted collaborators.
pub fn gateway(
    chain: &ScriptedChain,
    registry: &StaticRegistry,
) -> ProviderGateway<ScriptedChain, StaticRegistry> {
    ProviderGateway::new(test_config(), chain.clone(), registry.clone())
        .expect("gateway should build")
}

/// Script a confirmed, fully consistent transfer: transaction, event, and
/// balance delta for `receiver` at `block`.
pub fn script_transfer(
    chain: &ScriptedChain,
    tx: H256,
    token: H160,
    from: H160,
    to: H160,
    value: U256,
    block: u64,
) {
    chain.add_tx(
        tx,
        TxInfo {
            from,
            to: Some(token),
            block_number: Some(block),
        },
    );
    chain.add_event(token, block, TransferEvent { from, to, value });
    chain.set_balance(token, to, block - 1, U256::zero());
    chain.set_balance(token, to, block, value);
}

/// A complete, valid download request against the data asset's access
/// service.
pub fn access_request(tx: H256) -> serde_json::Value {
    let consumer = consumer_account();
    serde_json::json!({
        "documentId": "did:op:weather",
        "serviceId": "0",
        "serviceType": "access",
        "dataToken": format_address(data_token()),
        "consumerAddress": consumer.address_hex(),
        "signature": sig_hex(&consumer, "did:op:weather"),
        "transferTxId": format_tx_hash(tx),
    })
}

/// A complete, valid compute request against the data asset's compute
/// service, with an inline algorithm.
pub fn compute_request_inline(tx: H256) -> serde_json::Value {
    let consumer = consumer_account();
    serde_json::json!({
        "documentId": "did:op:weather",
        "serviceId": "1",
        "serviceType": "compute",
        "dataToken": format_address(data_token()),
        "consumerAddress": consumer.address_hex(),
        "signature": sig_hex(&consumer, "did:op:weather"),
        "transferTxId": format_tx_hash(tx),
        "algorithmMeta": {
            "rawcode": "print('hello')",
            "container": {"entrypoint": "python $ALGO", "image": "python", "tag": "3.11-slim"}
        },
    })
}
