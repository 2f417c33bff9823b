//! Asset and service model.
//!
//! An asset is a registered document (data set or algorithm) identified by a
//! DID and tied to a payment token contract. It offers purchasable services;
//! each service carries a cost in token base units and, for compute, the
//! endpoint of the operator that runs jobs against the asset.

pub mod files;
pub mod registry;

use crate::compute::Container;
use crate::error::{Error, Result};
use ethereum_types::U256;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Path suffix under which a provider serves asset endpoints. Compute
/// service endpoints are stripped back to their host part at this marker.
pub const ASSET_SERVICE_PATH: &str = "/api/v1/services";

/// Kind of a purchasable service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    /// Data download access.
    Access,
    /// Compute-to-data job execution.
    Compute,
    /// Asset metadata service.
    Metadata,
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Access => "access",
            Self::Compute => "compute",
            Self::Metadata => "metadata",
        };
        f.write_str(s)
    }
}

impl FromStr for ServiceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "access" => Ok(Self::Access),
            "compute" => Ok(Self::Compute),
            "metadata" => Ok(Self::Metadata),
            other => Err(Error::BadRequest(format!(
                "\"serviceType\" value {other:?} is not a known service type"
            ))),
        }
    }
}

/// A purchasable capability offered by an asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    /// Declared service kind.
    #[serde(rename = "type")]
    pub service_type: ServiceType,

    /// Position of this service in the asset's descriptor list.
    pub index: u32,

    /// Endpoint serving this service.
    #[serde(default)]
    pub service_endpoint: String,

    /// Cost in token base units, as a decimal string.
    #[serde(default)]
    pub cost: String,
}

impl Service {
    /// Cost of this service in token base units.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Registry`] when the descriptor's cost is not a
    /// decimal integer.
    pub fn cost(&self) -> Result<U256> {
        U256::from_dec_str(&self.cost).map_err(|_| {
            Error::Registry(format!(
                "service {} declares cost {:?}, which is not a valid token amount",
                self.index, self.cost
            ))
        })
    }
}

/// Descriptive metadata attached to an asset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    /// Primary metadata block.
    #[serde(default)]
    pub main: MainMetadata,
}

/// The `main` metadata block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MainMetadata {
    /// Human-readable asset name.
    #[serde(default)]
    pub name: String,

    /// Algorithm details, present only on algorithm assets.
    #[serde(default)]
    pub algorithm: Option<AlgorithmMetadata>,
}

/// Algorithm-specific metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgorithmMetadata {
    /// Container the algorithm runs in.
    pub container: Container,
}

/// A registered asset as resolved from the metadata store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    /// Decentralized identifier of the asset.
    pub did: String,

    /// Payment token contract address (hex) minted for this asset.
    pub data_token: String,

    /// Purchasable services.
    #[serde(default)]
    pub services: Vec<Service>,

    /// Descriptive metadata.
    #[serde(default)]
    pub metadata: Metadata,

    /// Encrypted file list, decryptable only by the provider account.
    #[serde(default)]
    pub encrypted_files: String,
}

impl Asset {
    /// Look up a service by its index.
    #[must_use]
    pub fn service_by_id(&self, index: u32) -> Option<&Service> {
        self.services.iter().find(|s| s.index == index)
    }

    /// Look up the first service of a given type.
    #[must_use]
    pub fn service_by_type(&self, service_type: ServiceType) -> Option<&Service> {
        self.services.iter().find(|s| s.service_type == service_type)
    }
}
