//! On-chain token transfer validation.
//!
//! A consumer claims a transaction paid for a service; [`TransferValidator`]
//! establishes that the claim holds before anything is released. The chain
//! is the authority: the transaction must exist, must be a call from the
//! consumer to the token contract, must be confirmed in a block whose
//! transfer event names the expected parties, and must move at least the
//! expected amount. The event value is additionally cross-checked against
//! the receiver's raw balance delta where the node can serve historical
//! state.

use crate::chain::{ChainClient, ChainError, TransferEvent};
use crate::payment::cache::VerifiedTransfers;
use ethereum_types::{H160, H256, U256};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, timeout};
use tracing::{debug, info, warn};

/// Errors raised by transfer validation.
///
/// Each check fails distinctly; the variant is enough to tell which link of
/// the chain of evidence broke.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// The node does not know the transaction.
    #[error("transaction {0:?} not found, or not yet submitted")]
    TransactionNotFound(H256),

    /// The transaction's sender/recipient do not match the expected
    /// consumer and token contract.
    #[error(
        "transaction {tx:?} parties do not match: sent from {from:?} to {to:?}, \
         expected the consumer calling the token contract"
    )]
    PartyMismatch {
        /// Claimed payment transaction.
        tx: H256,
        /// Actual transaction sender.
        from: H160,
        /// Actual transaction recipient.
        to: Option<H160>,
    },

    /// The transaction reports an unusable block number.
    #[error("transaction {tx:?} reports invalid block number {block}")]
    InvalidBlock {
        /// Claimed payment transaction.
        tx: H256,
        /// Block number the node reported.
        block: u64,
    },

    /// No matching transfer event in the confirmation block.
    #[error("no transfer event for transaction {tx:?} in block {block}")]
    EventNotFound {
        /// Claimed payment transaction.
        tx: H256,
        /// Block that was searched.
        block: u64,
    },

    /// A transfer event exists but names different parties.
    #[error(
        "transfer event parties {actual_from:?} -> {actual_to:?} do not match the \
         expected {expected_from:?} -> {expected_to:?}"
    )]
    EventPartyMismatch {
        /// Expected token sender.
        expected_from: H160,
        /// Expected token receiver.
        expected_to: H160,
        /// Token sender encoded in the event.
        actual_from: H160,
        /// Token receiver encoded in the event.
        actual_to: H160,
    },

    /// The receiver's balance delta across the confirmation block disagrees
    /// with the event value.
    #[error(
        "receiver balance moved from {previous} to {current}, which does not match \
         the transfer event value {event_value}"
    )]
    BalanceMismatch {
        /// Balance one block before confirmation.
        previous: U256,
        /// Balance at the confirmation block.
        current: U256,
        /// Amount the event claims was moved.
        event_value: U256,
    },

    /// The transfer moved fewer tokens than the service costs.
    #[error("transferred {actual} tokens, expected at least {expected}")]
    InsufficientAmount {
        /// Amount the event records.
        actual: U256,
        /// Amount the service requires.
        expected: U256,
    },

    /// The transaction did not reach a block within the wait budget.
    #[error("transaction {tx:?} was not confirmed within {timeout:?}")]
    ConfirmationTimeout {
        /// Claimed payment transaction.
        tx: H256,
        /// Wait budget that was exhausted.
        timeout: Duration,
    },

    /// A chain read failed.
    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Settings for the confirmation wait.
#[derive(Debug, Clone)]
pub struct TransferValidatorConfig {
    /// Overall budget for a pending transaction to reach a block.
    pub confirm_timeout: Duration,
    /// Poll interval while pending.
    pub poll_interval: Duration,
    /// Capacity of the verified-transfer cache.
    pub cache_capacity: usize,
}

impl Default for TransferValidatorConfig {
    fn default() -> Self {
        Self {
            confirm_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(100),
            cache_capacity: 10_000,
        }
    }
}

/// Validates claimed token payments against the chain.
///
/// Stateless apart from the verified-transfer cache; safe to call
/// repeatedly for the same transaction.
pub struct TransferValidator<C> {
    chain: Arc<C>,
    config: TransferValidatorConfig,
    verified: VerifiedTransfers,
}

impl<C> Clone for TransferValidator<C> {
    fn clone(&self) -> Self {
        Self {
            chain: Arc::clone(&self.chain),
            config: self.config.clone(),
            verified: self.verified.clone(),
        }
    }
}

impl<C: ChainClient> TransferValidator<C> {
    /// Create a validator over the given chain client.
    #[must_use]
    pub fn new(chain: Arc<C>, config: TransferValidatorConfig) -> Self {
        let verified = VerifiedTransfers::with_capacity(config.cache_capacity);
        Self {
            chain,
            config,
            verified,
        }
    }

    /// Cache of transfers that already passed validation.
    #[must_use]
    pub fn verified(&self) -> &VerifiedTransfers {
        &self.verified
    }

    /// Validate that `tx_id` transferred at least `expected_amount` of
    /// `token` from `sender` to `receiver`.
    ///
    /// Returns the amount the transfer event records.
    ///
    /// # Errors
    ///
    /// Returns the [`TransferError`] variant for the first check that
    /// fails; see the type for the full taxonomy.
    pub async fn validate(
        &self,
        sender: H160,
        receiver: H160,
        token: H160,
        expected_amount: U256,
        tx_id: H256,
    ) -> Result<U256, TransferError> {
        let key = (tx_id, sender, receiver, token);
        if let Some(value) = self.verified.verified_value(&key) {
            debug!(tx = ?tx_id, "transfer already verified");
            if value < expected_amount {
                return Err(TransferError::InsufficientAmount {
                    actual: value,
                    expected: expected_amount,
                });
            }
            return Ok(value);
        }

        let tx = self
            .chain
            .transaction(tx_id)
            .await?
            .ok_or(TransferError::TransactionNotFound(tx_id))?;

        // The payment must be the consumer calling the token contract; a
        // plain value transfer to the receiver proves nothing about tokens.
        if tx.from != sender || tx.to != Some(token) {
            return Err(TransferError::PartyMismatch {
                tx: tx_id,
                from: tx.from,
                to: tx.to,
            });
        }

        let block = match tx.block_number {
            Some(block) => block,
            None => self.wait_for_confirmation(tx_id).await?,
        };
        if block == 0 {
            return Err(TransferError::InvalidBlock { tx: tx_id, block });
        }

        let event = self
            .chain
            .transfer_event(token, block, sender, receiver)
            .await?
            .ok_or(TransferError::EventNotFound { tx: tx_id, block })?;
        if event.from != sender || event.to != receiver {
            return Err(TransferError::EventPartyMismatch {
                expected_from: sender,
                expected_to: receiver,
                actual_from: event.from,
                actual_to: event.to,
            });
        }

        self.cross_check_balance(token, receiver, block, &event)
            .await?;

        if event.value < expected_amount {
            return Err(TransferError::InsufficientAmount {
                actual: event.value,
                expected: expected_amount,
            });
        }

        info!(tx = ?tx_id, block, value = %event.value, "token transfer verified");
        self.verified.insert(key, event.value);
        Ok(event.value)
    }

    /// Poll until the transaction reaches a block, bounded by the
    /// configured timeout.
    async fn wait_for_confirmation(&self, tx_id: H256) -> Result<u64, TransferError> {
        debug!(tx = ?tx_id, "waiting for confirmation");

        let wait = async {
            let mut ticker = interval(self.config.poll_interval);
            loop {
                ticker.tick().await;
                // A transiently unknown transaction keeps the wait alive;
                // reorgs can briefly drop it back to the mempool.
                if let Some(info) = self.chain.transaction(tx_id).await? {
                    if let Some(block) = info.block_number {
                        return Ok(block);
                    }
                }
            }
        };

        match timeout(self.config.confirm_timeout, wait).await {
            Ok(result) => result,
            Err(_) => Err(TransferError::ConfirmationTimeout {
                tx: tx_id,
                timeout: self.config.confirm_timeout,
            }),
        }
    }

    /// Secondary validation: the receiver's balance across the confirmation
    /// block must move by exactly the event value. Skipped when the node
    /// cannot serve state for either block; the event remains authoritative.
    async fn cross_check_balance(
        &self,
        token: H160,
        receiver: H160,
        block: u64,
        event: &TransferEvent,
    ) -> Result<(), TransferError> {
        let balances = tokio::try_join!(
            self.chain.balance_at(token, receiver, block - 1),
            self.chain.balance_at(token, receiver, block),
        );

        let (previous, current) = match balances {
            Ok(pair) => pair,
            Err(ChainError::BlockOutOfRange(b)) => {
                warn!(
                    block = b,
                    "balance cross-check skipped: block outside the node's queryable range"
                );
                return Ok(());
            }
            Err(other) => return Err(other.into()),
        };

        if current.checked_sub(previous) != Some(event.value) {
            return Err(TransferError::BalanceMismatch {
                previous,
                current,
                event_value: event.value,
            });
        }
        Ok(())
    }
}
