//! Blockchain access for the gateway.
//!
//! The core never speaks to a node directly: everything goes through the
//! [`ChainClient`] trait, so validators can be exercised against in-process
//! fakes. [`rpc::HttpChainClient`] is the shipped JSON-RPC implementation.

pub mod rpc;
pub mod signature;

use ethereum_types::{H160, H256, U256};

/// A transaction as seen by the gateway.
///
/// `block_number` is `None` while the transaction is still pending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxInfo {
    /// Sender of the transaction.
    pub from: H160,
    /// Recipient (the token contract for a transfer call). `None` for
    /// contract-creation transactions.
    pub to: Option<H160>,
    /// Block the transaction was included in, once confirmed.
    pub block_number: Option<u64>,
}

/// A decoded ERC-20 `Transfer` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferEvent {
    /// Token sender.
    pub from: H160,
    /// Token receiver.
    pub to: H160,
    /// Transferred amount in token base units.
    pub value: U256,
}

/// Errors raised by chain reads.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChainError {
    /// The node cannot serve state queries for this block (pruned or not
    /// yet indexed). Callers may treat this as a degraded-mode signal for
    /// non-authoritative checks.
    #[error("block {0} is outside the node's queryable range")]
    BlockOutOfRange(u64),

    /// The node rejected the call or the transport failed.
    #[error("chain rpc error: {0}")]
    Rpc(String),

    /// The node answered with something the gateway cannot decode.
    #[error("malformed chain response: {0}")]
    Malformed(String),
}

/// Read-only blockchain capability consumed by the gate.
///
/// Implementations must raise [`ChainError::BlockOutOfRange`] for state
/// queries the node cannot serve, so the transfer validator can distinguish
/// the tolerated degraded path from real failures.
#[allow(async_fn_in_trait)]
pub trait ChainClient {
    /// Fetch a transaction by hash. `Ok(None)` when the node does not know
    /// the transaction.
    async fn transaction(&self, tx: H256) -> Result<Option<TxInfo>, ChainError>;

    /// Locate the `Transfer` event emitted by `token` in `block` for the
    /// `from` -> `to` pair, if any.
    async fn transfer_event(
        &self,
        token: H160,
        block: u64,
        from: H160,
        to: H160,
    ) -> Result<Option<TransferEvent>, ChainError>;

    /// `balanceOf(account)` on the `token` contract at a specific block.
    async fn balance_at(&self, token: H160, account: H160, block: u64)
        -> Result<U256, ChainError>;
}

/// Parse a 20-byte hex address, with or without the `0x` prefix.
///
/// # Errors
///
/// Returns [`ChainError::Malformed`] when the input is not 40 hex digits.
pub fn parse_address(s: &str) -> Result<H160, ChainError> {
    let raw = s.trim_start_matches("0x");
    let bytes = hex::decode(raw).map_err(|e| ChainError::Malformed(format!("address {s}: {e}")))?;
    if bytes.len() != 20 {
        return Err(ChainError::Malformed(format!(
            "address {s}: expected 20 bytes, got {}",
            bytes.len()
        )));
    }
    Ok(H160::from_slice(&bytes))
}

/// Parse a 32-byte hex transaction hash, with or without the `0x` prefix.
///
/// # Errors
///
/// Returns [`ChainError::Malformed`] when the input is not 64 hex digits.
pub fn parse_tx_hash(s: &str) -> Result<H256, ChainError> {
    let raw = s.trim_start_matches("0x");
    let bytes = hex::decode(raw).map_err(|e| ChainError::Malformed(format!("tx hash {s}: {e}")))?;
    if bytes.len() != 32 {
        return Err(ChainError::Malformed(format!(
            "tx hash {s}: expected 32 bytes, got {}",
            bytes.len()
        )));
    }
    Ok(H256::from_slice(&bytes))
}

/// Lowercase `0x`-prefixed rendering of an address.
///
/// `H160`'s `Display` abbreviates the middle bytes, which is unusable on the
/// wire; every serialized address goes through this instead.
#[must_use]
pub fn format_address(address: H160) -> String {
    format!("0x{}", hex::encode(address.as_bytes()))
}

/// Lowercase `0x`-prefixed rendering of a transaction hash.
#[must_use]
pub fn format_tx_hash(tx: H256) -> String {
    format!("0x{}", hex::encode(tx.as_bytes()))
}
