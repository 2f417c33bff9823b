//! Error types for the tollgate provider gateway.

use crate::chain::ChainError;
use crate::payment::TransferError;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for gateway operations.
///
/// Validation errors are deterministic for a given request and are never
/// retried locally; they carry enough context (field name, expected vs.
/// actual) to diagnose the rejected request.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required request field is missing or malformed. The message names
    /// the offending field.
    #[error("{0}")]
    BadRequest(String),

    /// The signature does not recover to the claimed address.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// On-chain transfer validation failed.
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// The resolved service's declared type disagrees with the requested one.
    #[error(
        "service {service_id} has type {actual} which does not match the requested \
         service type {requested}"
    )]
    ServiceTypeMismatch {
        /// Service index from the request.
        service_id: u32,
        /// Type the consumer asked for.
        requested: String,
        /// Type the asset actually declares.
        actual: String,
    },

    /// No asset is registered for the given data token and document id.
    #[error("no asset found for data token {token} and document {did}")]
    AssetNotFound {
        /// Payment token contract address (hex).
        token: String,
        /// Asset decentralized identifier.
        did: String,
    },

    /// The encrypted file list could not be decrypted.
    #[error("file list decryption failed: {0}")]
    Decryption(String),

    /// The decrypted file list is not a valid list of file descriptors.
    #[error("malformed file list: {0}")]
    MalformedFileList(String),

    /// Chain read failed.
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// Asset registry (metadata store) failure.
    #[error("asset registry error: {0}")]
    Registry(String),

    /// Configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build the `BadRequest` raised when a required field is absent.
    #[must_use]
    pub fn missing_field(field: &str, endpoint: &str) -> Self {
        Self::BadRequest(format!("\"{field}\" is required in the call to {endpoint}"))
    }
}
