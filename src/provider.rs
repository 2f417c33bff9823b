//! The provider gateway facade.
//!
//! Wires configuration and the chain/registry collaborators into the three
//! gated operations: releasing a download URL, counter-signing a
//! compute-start handshake, and assembling a compute job specification.
//! Each operation is a single fail-fast pass; either the full validation
//! chain passes and something is released, or nothing is.

use crate::asset::registry::AssetRegistry;
use crate::asset::{files, ServiceType};
use crate::chain::signature::ProviderAccount;
use crate::chain::{format_address, parse_tx_hash, ChainClient};
use crate::compute::{
    build_stage, validate_algorithm, AlgorithmSource, ComputeAssembler, ComputeStartBody,
    JobSpecification, StageInput,
};
use crate::config::GatewayConfig;
use crate::consume::{ConsumeContext, ConsumeProcessor};
use crate::error::{Error, Result};
use crate::event::{create_event_channel, GatewayEvent, GatewayEventsChannel, GatewayEventsSender};
use crate::payment::{TransferValidator, TransferValidatorConfig};
use crate::request::RequestData;
use ethereum_types::U256;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// What a validated download request releases.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessGrant {
    /// Asset the access was granted for.
    pub did: String,
    /// Consumer the access was granted to.
    pub consumer_address: String,
    /// Resolved download URL.
    pub url: String,
    /// Amount the verified transfer moved, in token base units.
    pub verified_amount: String,
}

/// Payment-gated provider gateway.
///
/// Generic over the chain and registry collaborators so the whole gate can
/// run against in-process fakes in tests.
pub struct ProviderGateway<C, R> {
    config: Arc<GatewayConfig>,
    account: ProviderAccount,
    consume: ConsumeProcessor<R>,
    assembler: ComputeAssembler<C, R>,
    validator: TransferValidator<C>,
    events_tx: GatewayEventsSender,
}

impl<C: ChainClient, R: AssetRegistry> ProviderGateway<C, R> {
    /// Build a gateway from configuration and collaborators.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when no provider key is configured or the
    /// key is invalid.
    pub fn new(config: GatewayConfig, chain: C, registry: R) -> Result<Self> {
        let key = config
            .provider_key
            .as_deref()
            .ok_or_else(|| Error::Config("provider key not configured".to_string()))?;
        let account = ProviderAccount::from_hex(key)?;

        let config = Arc::new(config);
        let chain = Arc::new(chain);
        let registry = Arc::new(registry);

        let validator = TransferValidator::new(
            Arc::clone(&chain),
            TransferValidatorConfig {
                confirm_timeout: config.confirmation.timeout(),
                poll_interval: config.confirmation.poll_interval(),
                cache_capacity: config.cache_capacity,
            },
        );
        let consume = ConsumeProcessor::new(Arc::clone(&registry));
        let assembler = ComputeAssembler::new(
            Arc::clone(&registry),
            validator.clone(),
            account.clone(),
            Arc::clone(&config),
        );

        let (events_tx, _events_rx) = create_event_channel();
        let _ = events_tx.send(GatewayEvent::Started);

        info!(provider = %account.address_hex(), "gateway initialized");

        Ok(Self {
            config,
            account,
            consume,
            assembler,
            validator,
            events_tx,
        })
    }

    /// The gateway's provider account.
    #[must_use]
    pub fn account(&self) -> &ProviderAccount {
        &self.account
    }

    /// The gateway's configuration.
    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// The transfer validator, exposed for diagnostics (cache statistics).
    #[must_use]
    pub fn validator(&self) -> &TransferValidator<C> {
        &self.validator
    }

    /// Subscribe to gateway events.
    #[must_use]
    pub fn subscribe_events(&self) -> GatewayEventsChannel {
        self.events_tx.subscribe()
    }

    /// Validate a download request and release the asset URL.
    ///
    /// The request must name a purchased access service, carry a valid
    /// consumer signature over the document id, and reference a confirmed
    /// token transfer covering the service cost.
    ///
    /// # Errors
    ///
    /// Propagates every validation failure; nothing is released on error.
    pub async fn initiate_access(&self, request: serde_json::Value) -> Result<AccessGrant> {
        let data = RequestData::new(request, "download")?;
        let ctx = self
            .consume
            .process(&data, &["transferTxId"], true)
            .await?;

        if ctx.service.service_type != ServiceType::Access {
            return Err(Error::BadRequest(format!(
                "service {} of asset {} is not a download service",
                ctx.service.index, ctx.did
            )));
        }

        let amount = self.validate_service_payment(&data, &ctx).await?;

        let file_index = match data.optional("fileIndex") {
            Some(raw) => raw.parse().map_err(|_| {
                Error::BadRequest(format!("\"fileIndex\" value {raw:?} is not a valid index"))
            })?,
            None => 0,
        };
        let url = files::asset_url_at_index(file_index, &ctx.asset, &self.account)?;

        info!(did = %ctx.did, consumer = %format_address(ctx.consumer), "access granted");
        let _ = self.events_tx.send(GatewayEvent::AccessGranted {
            did: ctx.did.clone(),
            consumer: ctx.consumer,
        });

        Ok(AccessGrant {
            did: ctx.did,
            consumer_address: format_address(ctx.consumer),
            url,
            verified_amount: amount.to_string(),
        })
    }

    /// Counter-sign a compute-start handshake.
    ///
    /// # Errors
    ///
    /// Propagates field and signature validation failures.
    pub fn compute_start_body(&self, request: serde_json::Value) -> Result<ComputeStartBody> {
        let data = RequestData::new(request, "compute")?;
        let body = self.assembler.build_start_body(&data)?;

        if let Some(owner) = body.owner.as_deref() {
            if let Ok(owner) = crate::chain::parse_address(owner) {
                let _ = self
                    .events_tx
                    .send(GatewayEvent::ComputeStartAttested { owner });
            }
        }
        Ok(body)
    }

    /// Validate a compute request end to end and assemble the job
    /// specification for the execution backend.
    ///
    /// # Errors
    ///
    /// Propagates every validation failure; no partial job is released.
    pub async fn initiate_compute_job(
        &self,
        request: serde_json::Value,
    ) -> Result<JobSpecification> {
        let data = RequestData::new(request, "compute")?;
        let ctx = self
            .consume
            .process(&data, &["transferTxId"], true)
            .await?;

        if ctx.service.service_type != ServiceType::Compute {
            return Err(Error::BadRequest(format!(
                "service {} of asset {} is not a compute service",
                ctx.service.index, ctx.did
            )));
        }

        // Payment for the data asset itself
        self.validate_service_payment(&data, &ctx).await?;

        // Algorithm: paid reference or inline metadata
        let source = AlgorithmSource::from_request(&data)?;
        let algorithm_did = match &source {
            AlgorithmSource::ByReference { did, .. } => Some(did.clone()),
            AlgorithmSource::Inline(_) => None,
        };
        let algorithm = self
            .assembler
            .build_algorithm(ctx.consumer, source, None)
            .await?;
        validate_algorithm(&algorithm, algorithm_did.as_deref())?;

        let output =
            self.assembler
                .build_output(data.optional_value("output"), &ctx.asset, ctx.consumer)?;

        let input = StageInput {
            index: 0,
            id: ctx.did.clone(),
            url: files::asset_urls(&ctx.asset, &self.account)?,
        };

        let stage = build_stage(input, algorithm, output);

        info!(did = %ctx.did, consumer = %format_address(ctx.consumer), "compute job assembled");
        let _ = self.events_tx.send(GatewayEvent::ComputeJobAssembled {
            did: ctx.did,
            consumer: ctx.consumer,
        });

        Ok(JobSpecification {
            stages: vec![stage],
        })
    }

    /// Validate the request's claimed payment against the resolved
    /// service's cost. Payment goes to the provider account.
    async fn validate_service_payment(
        &self,
        data: &RequestData,
        ctx: &ConsumeContext,
    ) -> Result<U256> {
        let tx_id = parse_tx_hash(data.require("transferTxId")?)
            .map_err(|e| Error::BadRequest(format!("\"transferTxId\": {e}")))?;
        let expected = ctx.service.cost()?;

        let amount = self
            .validator
            .validate(
                ctx.consumer,
                self.account.address(),
                ctx.token,
                expected,
                tx_id,
            )
            .await?;

        let _ = self.events_tx.send(GatewayEvent::TransferVerified {
            tx: tx_id,
            value: amount,
        });
        Ok(amount)
    }

    /// Endpoint jobs are submitted to on the operator service.
    #[must_use]
    pub fn operator_compute_endpoint(&self) -> String {
        self.config.operator_compute_endpoint()
    }
}

/// Convenience alias used by binaries: a gateway over the shipped HTTP
/// collaborators.
pub type HttpProviderGateway =
    ProviderGateway<crate::chain::rpc::HttpChainClient, crate::asset::registry::HttpAssetRegistry>;

impl HttpProviderGateway {
    /// Build a gateway speaking JSON-RPC and metadata-store HTTP, per the
    /// given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on a missing provider key, or the
    /// underlying client construction errors.
    pub fn from_config(config: GatewayConfig) -> Result<Self> {
        let request_timeout = std::time::Duration::from_secs(30);
        let chain = crate::chain::rpc::HttpChainClient::new(&config.network_url, request_timeout)?;
        let registry = crate::asset::registry::HttpAssetRegistry::new(
            &config.metadata_store_url,
            request_timeout,
        )?;
        Self::new(config, chain, registry)
    }
}
