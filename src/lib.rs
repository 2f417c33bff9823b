//! Payment-gated data and compute provider gateway.
//!
//! Tollgate releases a data asset's download URL, or assembles a compute
//! job against it, only after three things check out:
//!
//! 1. the consumer's request signature recovers to the claimed address,
//! 2. the referenced on-chain transaction really moved the required number
//!    of service tokens from consumer to provider, and
//! 3. the requested service exists on the registered asset with the
//!    declared type.
//!
//! The crate is the gate itself: signature verification, transfer
//! validation (with bounded confirmation waiting and a balance-delta
//! cross-check), consume-request processing, and compute-job assembly.
//! HTTP routing sits outside; the chain node and metadata store are
//! reached through the [`chain::ChainClient`] and
//! [`asset::registry::AssetRegistry`] traits.

pub mod asset;
pub mod chain;
pub mod compute;
pub mod config;
pub mod consume;
pub mod error;
pub mod event;
pub mod payment;
pub mod provider;
pub mod request;

pub use config::GatewayConfig;
pub use error::{Error, Result};
pub use provider::{AccessGrant, HttpProviderGateway, ProviderGateway};
