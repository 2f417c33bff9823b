//! Asset registry (metadata store) client.
//!
//! The gateway resolves assets by `(data token, DID)` through the
//! [`AssetRegistry`] trait. [`HttpAssetRegistry`] is the shipped client for
//! the metadata store's DDO endpoint.

use crate::asset::Asset;
use crate::chain::{format_address, parse_address};
use crate::error::{Error, Result};
use ethereum_types::H160;
use std::time::Duration;
use tracing::debug;

/// Asset resolution capability consumed by the gate.
#[allow(async_fn_in_trait)]
pub trait AssetRegistry {
    /// Resolve the asset registered for `token` under `did`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AssetNotFound`] when no such asset is registered,
    /// or [`Error::Registry`] on transport/decoding failure.
    async fn resolve(&self, token: H160, did: &str) -> Result<Asset>;
}

/// [`AssetRegistry`] backed by a metadata store's HTTP API.
pub struct HttpAssetRegistry {
    http: reqwest::Client,
    base_url: String,
}

impl HttpAssetRegistry {
    /// Create a registry client for the metadata store at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Registry`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| Error::Registry(format!("failed to build http client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    fn ddo_url(&self, did: &str) -> String {
        format!(
            "{}/api/v1/assets/ddo/{did}",
            self.base_url.trim_end_matches('/')
        )
    }
}

impl AssetRegistry for HttpAssetRegistry {
    async fn resolve(&self, token: H160, did: &str) -> Result<Asset> {
        let url = self.ddo_url(did);
        debug!(%url, "resolving asset");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Registry(format!("metadata store unreachable: {e}")))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::AssetNotFound {
                token: format_address(token),
                did: did.to_string(),
            });
        }
        if !response.status().is_success() {
            return Err(Error::Registry(format!(
                "metadata store answered {} for {did}",
                response.status()
            )));
        }

        let asset: Asset = response
            .json()
            .await
            .map_err(|e| Error::Registry(format!("undecodable DDO for {did}: {e}")))?;

        // The DDO must belong to the token the consumer paid with
        let asset_token = parse_address(&asset.data_token)
            .map_err(|e| Error::Registry(format!("DDO for {did} has a bad data token: {e}")))?;
        if asset_token != token {
            return Err(Error::AssetNotFound {
                token: format_address(token),
                did: did.to_string(),
            });
        }

        Ok(asset)
    }
}
