//! JSON-RPC implementation of [`ChainClient`].
//!
//! Speaks the standard Ethereum node API over HTTP: transactions via
//! `eth_getTransactionByHash`, transfer events via `eth_getLogs`, balances
//! via `eth_call` on the token's `balanceOf(address)`.

use crate::chain::{signature::keccak256, ChainClient, ChainError, TransferEvent, TxInfo};
use ethereum_types::{H160, H256, U256};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Function selector for `balanceOf(address)`.
const BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];

/// Node error fragments that mean "this block is not queryable here".
/// Geth says "missing trie node", Erigon/Nethermind variants mention
/// pruning, OpenEthereum raised an explicit out-of-range error.
const OUT_OF_RANGE_MARKERS: [&str; 4] = [
    "out of range",
    "missing trie node",
    "header not found",
    "pruned",
];

/// [`ChainClient`] backed by an Ethereum JSON-RPC endpoint.
pub struct HttpChainClient {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl HttpChainClient {
    /// Create a client for the node at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::Rpc`] if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Result<Self, ChainError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ChainError::Rpc(format!("failed to build http client: {e}")))?;
        Ok(Self {
            http,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        debug!(method, id, "chain rpc call");

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChainError::Rpc(format!("{method}: {e}")))?;

        let envelope: RpcEnvelope = response
            .json()
            .await
            .map_err(|e| ChainError::Malformed(format!("{method}: {e}")))?;

        if let Some(err) = envelope.error {
            return Err(ChainError::Rpc(format!(
                "{method}: {} (code {})",
                err.message, err.code
            )));
        }
        // A null result is a valid answer (e.g. unknown transaction)
        Ok(envelope.result.unwrap_or(Value::Null))
    }
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

impl ChainClient for HttpChainClient {
    async fn transaction(&self, tx: H256) -> Result<Option<TxInfo>, ChainError> {
        let result = self
            .call(
                "eth_getTransactionByHash",
                json!([format!("0x{}", hex::encode(tx.as_bytes()))]),
            )
            .await?;

        if result.is_null() {
            return Ok(None);
        }

        let from = result
            .get("from")
            .and_then(Value::as_str)
            .ok_or_else(|| ChainError::Malformed("transaction without from".into()))
            .and_then(parse_hex_address)?;
        let to = match result.get("to") {
            None | Some(Value::Null) => None,
            Some(v) => {
                let s = v
                    .as_str()
                    .ok_or_else(|| ChainError::Malformed("transaction to is not a string".into()))?;
                Some(parse_hex_address(s)?)
            }
        };
        let block_number = match result.get("blockNumber") {
            None | Some(Value::Null) => None,
            Some(v) => {
                let s = v.as_str().ok_or_else(|| {
                    ChainError::Malformed("transaction blockNumber is not a string".into())
                })?;
                Some(parse_hex_quantity(s)?)
            }
        };

        Ok(Some(TxInfo {
            from,
            to,
            block_number,
        }))
    }

    async fn transfer_event(
        &self,
        token: H160,
        block: u64,
        from: H160,
        to: H160,
    ) -> Result<Option<TransferEvent>, ChainError> {
        let block_tag = format!("0x{block:x}");
        let filter = json!([{
            "address": format!("0x{}", hex::encode(token.as_bytes())),
            "fromBlock": block_tag,
            "toBlock": block_tag,
            "topics": [
                format!("0x{}", hex::encode(transfer_topic().as_bytes())),
                format!("0x{}", hex::encode(address_topic(from).as_bytes())),
                format!("0x{}", hex::encode(address_topic(to).as_bytes())),
            ],
        }]);

        let result = self.call("eth_getLogs", filter).await?;
        let logs = result
            .as_array()
            .ok_or_else(|| ChainError::Malformed("eth_getLogs did not return a list".into()))?;

        let Some(log) = logs.first() else {
            return Ok(None);
        };
        decode_transfer_log(log).map(Some)
    }

    async fn balance_at(
        &self,
        token: H160,
        account: H160,
        block: u64,
    ) -> Result<U256, ChainError> {
        let mut data = Vec::with_capacity(36);
        data.extend_from_slice(&BALANCE_OF_SELECTOR);
        data.extend_from_slice(&[0u8; 12]);
        data.extend_from_slice(account.as_bytes());

        let params = json!([
            {
                "to": format!("0x{}", hex::encode(token.as_bytes())),
                "data": format!("0x{}", hex::encode(data)),
            },
            format!("0x{block:x}"),
        ]);

        let result = match self.call("eth_call", params).await {
            Ok(value) => value,
            Err(ChainError::Rpc(message)) if is_out_of_range(&message) => {
                return Err(ChainError::BlockOutOfRange(block));
            }
            Err(other) => return Err(other),
        };

        let s = result
            .as_str()
            .ok_or_else(|| ChainError::Malformed("eth_call result is not a string".into()))?;
        parse_hex_u256(s)
    }
}

/// Topic hash of `Transfer(address,address,uint256)`.
fn transfer_topic() -> H256 {
    keccak256(b"Transfer(address,address,uint256)")
}

/// An address left-padded to a 32-byte log topic.
fn address_topic(address: H160) -> H256 {
    let mut topic = [0u8; 32];
    topic[12..].copy_from_slice(address.as_bytes());
    H256(topic)
}

fn decode_transfer_log(log: &Value) -> Result<TransferEvent, ChainError> {
    let topics = log
        .get("topics")
        .and_then(Value::as_array)
        .ok_or_else(|| ChainError::Malformed("log without topics".into()))?;
    if topics.len() < 3 {
        return Err(ChainError::Malformed(format!(
            "transfer log has {} topics, expected 3",
            topics.len()
        )));
    }

    let from = topic_address(&topics[1])?;
    let to = topic_address(&topics[2])?;
    let value = log
        .get("data")
        .and_then(Value::as_str)
        .ok_or_else(|| ChainError::Malformed("transfer log without data".into()))
        .and_then(parse_hex_u256)?;

    Ok(TransferEvent { from, to, value })
}

fn topic_address(topic: &Value) -> Result<H160, ChainError> {
    let s = topic
        .as_str()
        .ok_or_else(|| ChainError::Malformed("log topic is not a string".into()))?;
    let bytes = hex::decode(s.trim_start_matches("0x"))
        .map_err(|e| ChainError::Malformed(format!("log topic {s}: {e}")))?;
    if bytes.len() != 32 {
        return Err(ChainError::Malformed(format!(
            "log topic {s}: expected 32 bytes, got {}",
            bytes.len()
        )));
    }
    Ok(H160::from_slice(&bytes[12..]))
}

fn parse_hex_address(s: &str) -> Result<H160, ChainError> {
    crate::chain::parse_address(s)
}

fn parse_hex_quantity(s: &str) -> Result<u64, ChainError> {
    u64::from_str_radix(s.trim_start_matches("0x"), 16)
        .map_err(|e| ChainError::Malformed(format!("quantity {s}: {e}")))
}

fn parse_hex_u256(s: &str) -> Result<U256, ChainError> {
    let raw = s.trim_start_matches("0x");
    if raw.is_empty() {
        return Ok(U256::zero());
    }
    U256::from_str_radix(raw, 16).map_err(|e| ChainError::Malformed(format!("uint {s}: {e}")))
}

fn is_out_of_range(message: &str) -> bool {
    let lower = message.to_lowercase();
    OUT_OF_RANGE_MARKERS
        .iter()
        .any(|marker| lower.contains(marker))
}
