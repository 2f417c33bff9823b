//! Gateway event system.

use ethereum_types::{H160, H256, U256};
use tokio::sync::broadcast;

/// Events emitted by the gateway.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    /// Gateway has started successfully.
    Started,

    /// A token transfer passed the full validation chain.
    TransferVerified {
        /// Payment transaction.
        tx: H256,
        /// Amount the transfer event recorded.
        value: U256,
    },

    /// A download request was validated and a URL released.
    AccessGranted {
        /// Asset identifier.
        did: String,
        /// Consumer the access was granted to.
        consumer: H160,
    },

    /// A compute-start handshake was counter-signed.
    ComputeStartAttested {
        /// Job owner.
        owner: H160,
    },

    /// A compute job specification was assembled and released.
    ComputeJobAssembled {
        /// Data asset the job runs against.
        did: String,
        /// Consumer owning the job.
        consumer: H160,
    },

    /// Error occurred.
    Error {
        /// Error message.
        message: String,
    },
}

/// Channel for receiving gateway events.
pub type GatewayEventsChannel = broadcast::Receiver<GatewayEvent>;

/// Sender for gateway events.
pub type GatewayEventsSender = broadcast::Sender<GatewayEvent>;

/// Create a new event channel pair.
#[must_use]
pub fn create_event_channel() -> (GatewayEventsSender, GatewayEventsChannel) {
    broadcast::channel(256)
}
