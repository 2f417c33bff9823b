//! Compute request assembly.
//!
//! Builds the pieces of a job specification from a validated request: the
//! mutual-attestation start body, the algorithm descriptor (with payment
//! validation for DID-referenced algorithms), the output descriptor, and
//! the stage itself.

use crate::asset::registry::AssetRegistry;
use crate::asset::{files, Asset, ServiceType, ASSET_SERVICE_PATH};
use crate::chain::signature::{decode_signature, verify_signature, ProviderAccount};
use crate::chain::{format_address, parse_address, ChainClient};
use crate::compute::{
    AlgorithmDescriptor, AlgorithmSource, ComputeLimits, ComputeStartBody, OutputDescriptor,
    Stage, StageInput,
};
use crate::config::GatewayConfig;
use crate::error::{Error, Result};
use crate::payment::TransferValidator;
use crate::request::RequestData;
use ethereum_types::H160;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

/// Assembles job-specification parts for compute endpoints.
pub struct ComputeAssembler<C, R> {
    registry: Arc<R>,
    validator: TransferValidator<C>,
    account: ProviderAccount,
    config: Arc<GatewayConfig>,
}

impl<C, R> Clone for ComputeAssembler<C, R> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            validator: self.validator.clone(),
            account: self.account.clone(),
            config: Arc::clone(&self.config),
        }
    }
}

/// Caller-supplied overrides for the stage output, merged over defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct OutputDef {
    node_uri: Option<String>,
    provider_uri: Option<String>,
    provider_address: Option<String>,
    metadata: Option<serde_json::Value>,
    metadata_uri: Option<String>,
    owner: Option<String>,
    publish_output: Option<u8>,
    publish_algorithm_log: Option<u8>,
    whitelist: Option<Vec<String>>,
}

impl<C: ChainClient, R: AssetRegistry> ComputeAssembler<C, R> {
    /// Create an assembler.
    #[must_use]
    pub fn new(
        registry: Arc<R>,
        validator: TransferValidator<C>,
        account: ProviderAccount,
        config: Arc<GatewayConfig>,
    ) -> Self {
        Self {
            registry,
            validator,
            account,
            config,
        }
    }

    /// Build the compute-start response body.
    ///
    /// The consumer's signature over `owner + jobId + documentId` proves
    /// request intent; the returned body carries the provider's
    /// counter-signature over `providerAddress + jobId + documentId` as
    /// receipt.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadRequest`] when `signature` or `consumerAddress`
    /// is missing, and [`Error::InvalidSignature`] when the consumer's
    /// signature does not verify.
    pub fn build_start_body(&self, data: &RequestData) -> Result<ComputeStartBody> {
        let signature = data.require("signature")?;
        let owner = data.require("consumerAddress")?;
        let job_id = data.optional("jobId");
        let document_id = data.optional("documentId");

        let consumer = parse_address(owner)
            .map_err(|e| Error::BadRequest(format!("\"consumerAddress\": {e}")))?;

        // Consumer attestation: the exact request strings are the message
        let consumer_message = format!(
            "{owner}{}{}",
            job_id.unwrap_or_default(),
            document_id.unwrap_or_default()
        );
        verify_signature(consumer, &decode_signature(signature)?, &consumer_message)?;

        // Provider counter-attestation
        let provider_address = self.account.address_hex();
        let provider_message = format!(
            "{provider_address}{}{}",
            job_id.unwrap_or_default(),
            document_id.unwrap_or_default()
        );
        let provider_signature =
            format!("0x{}", hex::encode(self.account.sign_message(&provider_message)));

        info!(owner, job_id = ?job_id, "compute start attested");

        Ok(ComputeStartBody {
            provider_address,
            owner: Some(owner.to_string()),
            job_id: job_id.map(str::to_string),
            document_id: document_id.map(str::to_string),
            provider_signature,
        })
    }

    /// Resolve an [`AlgorithmSource`] into a runnable descriptor.
    ///
    /// The by-reference path resolves the algorithm asset, validates the
    /// claimed token transfer against its access-service cost (paid to
    /// `receiver`, the provider account unless overridden), and recovers
    /// the first download URL. The inline path copies the caller's
    /// metadata through untouched - it is the unpaid path by design.
    ///
    /// # Errors
    ///
    /// Propagates resolution, payment-validation, and file-list failures.
    pub async fn build_algorithm(
        &self,
        consumer: H160,
        source: AlgorithmSource,
        receiver: Option<H160>,
    ) -> Result<AlgorithmDescriptor> {
        match source {
            AlgorithmSource::ByReference { did, token, tx_id } => {
                let receiver = receiver.unwrap_or_else(|| self.account.address());
                let asset = self.registry.resolve(token, &did).await?;

                let service = asset.service_by_type(ServiceType::Access).ok_or_else(|| {
                    Error::BadRequest(format!("algorithm asset {did} offers no access service"))
                })?;
                let expected_cost = service.cost()?;

                self.validator
                    .validate(consumer, receiver, token, expected_cost, tx_id)
                    .await?;

                let url = files::asset_url_at_index(0, &asset, &self.account)?;
                let container = asset
                    .metadata
                    .main
                    .algorithm
                    .as_ref()
                    .map(|a| a.container.clone())
                    .ok_or_else(|| {
                        Error::BadRequest(format!(
                            "algorithm asset {did} metadata declares no container"
                        ))
                    })?;

                debug!(%did, "algorithm resolved by reference");
                Ok(AlgorithmDescriptor {
                    id: did,
                    url,
                    rawcode: String::new(),
                    container,
                })
            }
            AlgorithmSource::Inline(meta) => Ok(AlgorithmDescriptor {
                id: String::new(),
                url: meta.url,
                rawcode: meta.rawcode,
                container: meta.container,
            }),
        }
    }

    /// Build the stage output descriptor, merging caller overrides over
    /// configuration- and asset-derived defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadRequest`] when the asset offers no compute
    /// service or the supplied output definition is malformed.
    pub fn build_output(
        &self,
        output_def: Option<&serde_json::Value>,
        asset: &Asset,
        owner: H160,
    ) -> Result<OutputDescriptor> {
        let def: OutputDef = match output_def {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| Error::BadRequest(format!("\"output\" is malformed: {e}")))?,
            None => OutputDef::default(),
        };

        let compute_service = asset.service_by_type(ServiceType::Compute).ok_or_else(|| {
            Error::BadRequest(format!("asset {} offers no compute service", asset.did))
        })?;

        // The service endpoint points at an asset-serving route; the
        // publishing flow wants the bare gateway URL.
        let endpoint = &compute_service.service_endpoint;
        let provider_uri = match endpoint.find(ASSET_SERVICE_PATH) {
            Some(pos) => endpoint[..pos].to_string(),
            None => endpoint.clone(),
        };

        Ok(OutputDescriptor {
            node_uri: def.node_uri.unwrap_or_else(|| self.config.network_url.clone()),
            provider_uri: def.provider_uri.unwrap_or(provider_uri),
            provider_address: def
                .provider_address
                .unwrap_or_else(|| self.account.address_hex()),
            metadata: def.metadata.unwrap_or_else(default_output_metadata),
            metadata_uri: def
                .metadata_uri
                .unwrap_or_else(|| self.config.metadata_store_url.clone()),
            owner: def.owner.unwrap_or_else(|| format_address(owner)),
            publish_output: def.publish_output.unwrap_or(1),
            publish_algorithm_log: def.publish_algorithm_log.unwrap_or(1),
            whitelist: def.whitelist.unwrap_or_default(),
        })
    }

}

/// Compose a stage from its parts.
///
/// The pipeline is single-stage and non-configurable: index 0, one runtime
/// instance, fixed namespace and runtime ceiling.
#[must_use]
pub fn build_stage(
    input: StageInput,
    algorithm: AlgorithmDescriptor,
    output: OutputDescriptor,
) -> Stage {
    Stage {
        index: 0,
        input: vec![input],
        compute: ComputeLimits::default(),
        algorithm,
        output,
    }
}

fn default_output_metadata() -> serde_json::Value {
    json!({
        "main": {
            "name": "Compute job output"
        },
        "additionalInformation": {
            "description": "Output from running the compute job."
        }
    })
}
