//! Consume-request processing.
//!
//! Every gated endpoint starts here: the request's required fields are
//! checked, the asset and purchased service are resolved, and the
//! consumer's signature over the document id is verified. Processing is a
//! single fail-fast pass; nothing is retried.

use crate::asset::registry::AssetRegistry;
use crate::asset::{Asset, Service, ServiceType};
use crate::chain::signature::{decode_signature, verify_signature};
use crate::chain::parse_address;
use crate::error::{Error, Result};
use crate::request::{RequestData, CONSUME_REQUIRED_FIELDS};
use ethereum_types::H160;
use std::sync::Arc;
use tracing::debug;

/// Everything a gated endpoint needs to know about a validated request.
#[derive(Debug, Clone)]
pub struct ConsumeContext {
    /// Resolved asset.
    pub asset: Asset,
    /// Purchased service.
    pub service: Service,
    /// Asset identifier from the request.
    pub did: String,
    /// Consumer's address.
    pub consumer: H160,
    /// Payment token contract address.
    pub token: H160,
}

/// Validates consume requests and resolves their asset and service.
pub struct ConsumeProcessor<R> {
    registry: Arc<R>,
}

impl<R> Clone for ConsumeProcessor<R> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<R: AssetRegistry> ConsumeProcessor<R> {
    /// Create a processor over the given registry.
    #[must_use]
    pub fn new(registry: Arc<R>) -> Self {
        Self { registry }
    }

    /// Validate `data` and resolve what it refers to.
    ///
    /// `additional_required` lists endpoint-specific fields that must be
    /// present beyond the consume base set; `require_signature` additionally
    /// demands a valid consumer signature over the document id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadRequest`] for missing fields,
    /// [`Error::AssetNotFound`] when resolution fails,
    /// [`Error::ServiceTypeMismatch`] when the asset's service disagrees
    /// with the requested type, and [`Error::InvalidSignature`] when
    /// signature verification fails.
    pub async fn process(
        &self,
        data: &RequestData,
        additional_required: &[&str],
        require_signature: bool,
    ) -> Result<ConsumeContext> {
        data.require_all(&CONSUME_REQUIRED_FIELDS)?;
        data.require_all(additional_required)?;
        if require_signature {
            data.require("signature")?;
        }

        let did = data.require("documentId")?.to_string();
        let token = parse_address(data.require("dataToken")?)
            .map_err(|e| Error::BadRequest(format!("\"dataToken\": {e}")))?;
        let consumer = parse_address(data.require("consumerAddress")?)
            .map_err(|e| Error::BadRequest(format!("\"consumerAddress\": {e}")))?;
        let service_id = data.require_index("serviceId")?;
        let requested: ServiceType = data.require("serviceType")?.parse()?;

        let asset = self.registry.resolve(token, &did).await?;
        let service = asset
            .service_by_id(service_id)
            .ok_or_else(|| {
                Error::BadRequest(format!(
                    "\"serviceId\" {service_id} does not exist on asset {did}"
                ))
            })?
            .clone();

        if service.service_type != requested {
            return Err(Error::ServiceTypeMismatch {
                service_id,
                requested: requested.to_string(),
                actual: service.service_type.to_string(),
            });
        }

        if require_signature {
            let signature = decode_signature(data.require("signature")?)?;
            verify_signature(consumer, &signature, &did)?;
        }

        debug!(%did, service = %service.service_type, "consume request validated");

        Ok(ConsumeContext {
            asset,
            service,
            did,
            consumer,
            token,
        })
    }
}
