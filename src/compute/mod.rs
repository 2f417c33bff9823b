//! Compute job specification.
//!
//! The gateway turns a validated compute request into a declarative job
//! specification the execution backend consumes verbatim. The pipeline is
//! single-stage by design: one input set, one algorithm, one output
//! destination, fixed resource limits.

pub mod assembler;
mod validate;

pub use assembler::{build_stage, ComputeAssembler};
pub use validate::validate_algorithm;

use crate::error::{Error, Result};
use crate::request::RequestData;
use crate::chain::{parse_address, parse_tx_hash};
use ethereum_types::{H160, H256};
use serde::{Deserialize, Serialize};

/// Container an algorithm runs in. Must be fully specified before a job is
/// released.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    /// Command executed inside the image.
    #[serde(default)]
    pub entrypoint: String,
    /// Container image.
    #[serde(default)]
    pub image: String,
    /// Image tag.
    #[serde(default)]
    pub tag: String,
}

impl Container {
    /// Whether every field the runtime needs is present.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.entrypoint.is_empty() && !self.image.is_empty() && !self.tag.is_empty()
    }
}

/// Caller-supplied algorithm definition for the inline (unpaid) path.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlgorithmMeta {
    /// Where the algorithm code can be fetched.
    #[serde(default)]
    pub url: String,
    /// Inline source code, alternative to `url`.
    #[serde(default)]
    pub rawcode: String,
    /// Container the algorithm runs in.
    #[serde(default)]
    pub container: Container,
}

/// Where a job's algorithm comes from.
///
/// A tagged choice instead of sentinel empty-string fields: a DID-referenced
/// algorithm always carries the payment evidence needed to validate it,
/// while inline metadata is explicitly the unpaid path.
#[derive(Debug, Clone)]
pub enum AlgorithmSource {
    /// A registered algorithm asset, paid for by a token transfer.
    ByReference {
        /// Algorithm asset DID.
        did: String,
        /// Token contract the algorithm was paid with.
        token: H160,
        /// Payment transaction.
        tx_id: H256,
    },
    /// Caller-supplied algorithm metadata; no payment validation.
    Inline(AlgorithmMeta),
}

impl AlgorithmSource {
    /// Extract the algorithm source from a compute request.
    ///
    /// A present `algorithmDid` selects the by-reference path and requires
    /// both `algorithmDataToken` and `algorithmTransferTxId`; otherwise
    /// `algorithmMeta` must be supplied. These checks are local - no
    /// network call happens before they pass.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadRequest`] naming the missing or malformed field.
    pub fn from_request(data: &RequestData) -> Result<Self> {
        if let Some(did) = data.optional("algorithmDid") {
            let token_raw = data.require("algorithmDataToken").map_err(|_| {
                Error::BadRequest(
                    "\"algorithmDid\" requires both \"algorithmDataToken\" and \
                     \"algorithmTransferTxId\""
                        .to_string(),
                )
            })?;
            let tx_raw = data.require("algorithmTransferTxId").map_err(|_| {
                Error::BadRequest(
                    "\"algorithmDid\" requires both \"algorithmDataToken\" and \
                     \"algorithmTransferTxId\""
                        .to_string(),
                )
            })?;

            let token = parse_address(token_raw)
                .map_err(|e| Error::BadRequest(format!("\"algorithmDataToken\": {e}")))?;
            let tx_id = parse_tx_hash(tx_raw)
                .map_err(|e| Error::BadRequest(format!("\"algorithmTransferTxId\": {e}")))?;

            return Ok(Self::ByReference {
                did: did.to_string(),
                token,
                tx_id,
            });
        }

        let meta = data
            .optional_value("algorithmMeta")
            .ok_or_else(|| Error::missing_field("algorithmMeta", data.endpoint()))?;
        let meta: AlgorithmMeta = serde_json::from_value(meta.clone())
            .map_err(|e| Error::BadRequest(format!("\"algorithmMeta\" is malformed: {e}")))?;
        Ok(Self::Inline(meta))
    }
}

/// Fully resolved algorithm of a job stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgorithmDescriptor {
    /// DID of the algorithm asset; empty for inline algorithms.
    pub id: String,
    /// Where the code is fetched from; empty when `rawcode` is used.
    pub url: String,
    /// Inline source; empty when `url` is used.
    pub rawcode: String,
    /// Container the algorithm runs in.
    pub container: Container,
}

/// Resource limits of a stage. Fixed for every job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeLimits {
    /// Number of runtime instances.
    #[serde(rename = "Instances")]
    pub instances: u32,
    /// Scheduling namespace.
    pub namespace: String,
    /// Maximum runtime in seconds.
    pub maxtime: u64,
}

impl Default for ComputeLimits {
    fn default() -> Self {
        Self {
            instances: 1,
            namespace: "ocean-compute".to_string(),
            maxtime: 3600,
        }
    }
}

/// A data input consumed by a stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageInput {
    /// Position of this input.
    pub index: u32,
    /// DID of the data asset.
    pub id: String,
    /// Resolved download URLs.
    pub url: Vec<String>,
}

/// Where stage results go and how they are published.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputDescriptor {
    /// Chain node the publishing flow talks to.
    pub node_uri: String,
    /// Provider gateway handling the results.
    pub provider_uri: String,
    /// Provider gateway address.
    pub provider_address: String,
    /// Metadata attached to the published result.
    pub metadata: serde_json::Value,
    /// Metadata store the result is registered with.
    pub metadata_uri: String,
    /// Owner of the published result.
    pub owner: String,
    /// Whether to publish the job output.
    pub publish_output: u8,
    /// Whether to publish the algorithm log.
    pub publish_algorithm_log: u8,
    /// Addresses allowed to access the result.
    pub whitelist: Vec<String>,
}

/// One unit of the compute pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    /// Stage position.
    pub index: u32,
    /// Data inputs.
    pub input: Vec<StageInput>,
    /// Resource limits.
    pub compute: ComputeLimits,
    /// Algorithm to run.
    pub algorithm: AlgorithmDescriptor,
    /// Output destination.
    pub output: OutputDescriptor,
}

/// The declarative job body handed to the execution backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpecification {
    /// Pipeline stages; currently always exactly one.
    pub stages: Vec<Stage>,
}

/// Response body of the compute-start handshake.
///
/// The consumer proved intent with their signature; `provider_signature` is
/// the gateway's counter-attestation over `providerAddress + jobId +
/// documentId`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeStartBody {
    /// Gateway account address.
    pub provider_address: String,
    /// Job owner (the consumer), when supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Job identifier, when supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    /// Data asset the job runs against, when supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    /// Provider counter-signature.
    pub provider_signature: String,
}
