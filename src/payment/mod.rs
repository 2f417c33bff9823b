//! Payment validation for the tollgate gateway.
//!
//! A request is only as good as the payment behind it. This module
//! establishes that a claimed on-chain token transfer really happened:
//!
//! ```text
//! claimed tx id
//!        │
//!        ▼
//! ┌─────────────────────┐
//! │ Verified-transfer   │
//! │ LRU cache           │
//! └─────────┬───────────┘
//!           │
//!    ┌──────┴──────┐
//!    │             │
//!   HIT          MISS
//!    │             │
//!    ▼             ▼
//! amount       fetch tx ── parties ── confirmation wait
//! re-check              (bounded) ── transfer event ──
//!                        balance delta ── amount ── cache + OK
//! ```

mod cache;
mod transfer;

pub use cache::{CacheStats, TransferKey, VerifiedTransfers};
pub use transfer::{TransferError, TransferValidator, TransferValidatorConfig};
