//! Consume-request processing: field validation, asset/service resolution,
//! type agreement, and signature enforcement.

use crate::fixtures::{
    consumer_account, data_asset, data_token, provider_account, sig_hex, StaticRegistry,
};
use ethereum_types::H160;
use std::sync::Arc;
use tollgate::asset::ServiceType;
use tollgate::chain::format_address;
use tollgate::consume::ConsumeProcessor;
use tollgate::error::Error;
use tollgate::request::RequestData;

fn registry_with_data_asset() -> StaticRegistry {
    let registry = StaticRegistry::new();
    registry.add(data_token(), data_asset(&provider_account()));
    registry
}

fn processor(registry: &StaticRegistry) -> ConsumeProcessor<StaticRegistry> {
    ConsumeProcessor::new(Arc::new(registry.clone()))
}

fn base_request(service_type: &str) -> serde_json::Value {
    let consumer = consumer_account();
    serde_json::json!({
        "documentId": "did:op:weather",
        "serviceId": "0",
        "serviceType": service_type,
        "dataToken": format_address(data_token()),
        "consumerAddress": consumer.address_hex(),
        "signature": sig_hex(&consumer, "did:op:weather"),
    })
}

#[tokio::test]
async fn valid_access_request_resolves_asset_and_service() {
    let registry = registry_with_data_asset();
    let data = RequestData::new(base_request("access"), "download").expect("valid payload");

    let ctx = processor(&registry)
        .process(&data, &[], true)
        .await
        .expect("valid request should process");

    assert_eq!(ctx.did, "did:op:weather");
    assert_eq!(ctx.asset.did, "did:op:weather");
    assert_eq!(ctx.service.service_type, ServiceType::Access);
    assert_eq!(ctx.service.index, 0);
    assert_eq!(ctx.consumer, consumer_account().address());
    assert_eq!(ctx.token, data_token());
}

#[tokio::test]
async fn requested_type_disagreeing_with_declared_type_fails() {
    let registry = registry_with_data_asset();
    // serviceId 0 is declared "access"; the consumer claims "compute"
    let data = RequestData::new(base_request("compute"), "compute").expect("valid payload");

    let err = processor(&registry)
        .process(&data, &[], true)
        .await
        .unwrap_err();
    match err {
        Error::ServiceTypeMismatch {
            service_id,
            requested,
            actual,
        } => {
            assert_eq!(service_id, 0);
            assert_eq!(requested, "compute");
            assert_eq!(actual, "access");
        }
        other => panic!("expected ServiceTypeMismatch, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_base_field_is_named_in_the_error() {
    let registry = registry_with_data_asset();
    let mut payload = base_request("access");
    payload
        .as_object_mut()
        .expect("object payload")
        .remove("dataToken");
    let data = RequestData::new(payload, "download").expect("valid payload");

    let err = processor(&registry)
        .process(&data, &[], true)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("dataToken"), "got: {err}");
}

#[tokio::test]
async fn missing_additional_field_is_named_in_the_error() {
    let registry = registry_with_data_asset();
    let data = RequestData::new(base_request("access"), "download").expect("valid payload");

    let err = processor(&registry)
        .process(&data, &["transferTxId"], true)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("transferTxId"), "got: {err}");
}

#[tokio::test]
async fn signature_by_another_key_is_rejected() {
    let registry = registry_with_data_asset();
    let mut payload = base_request("access");
    // Signed by the provider key instead of the consumer
    payload["signature"] = serde_json::json!(sig_hex(&provider_account(), "did:op:weather"));
    let data = RequestData::new(payload, "download").expect("valid payload");

    let err = processor(&registry)
        .process(&data, &[], true)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidSignature(_)));
}

#[tokio::test]
async fn signature_over_wrong_document_is_rejected() {
    let registry = registry_with_data_asset();
    let mut payload = base_request("access");
    payload["signature"] = serde_json::json!(sig_hex(&consumer_account(), "did:op:other"));
    let data = RequestData::new(payload, "download").expect("valid payload");

    let err = processor(&registry)
        .process(&data, &[], true)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidSignature(_)));
}

#[tokio::test]
async fn signature_not_required_when_endpoint_says_so() {
    let registry = registry_with_data_asset();
    let mut payload = base_request("access");
    payload
        .as_object_mut()
        .expect("object payload")
        .remove("signature");
    let data = RequestData::new(payload, "initialize").expect("valid payload");

    processor(&registry)
        .process(&data, &[], false)
        .await
        .expect("signature-free endpoint should process");
}

#[tokio::test]
async fn unknown_document_fails_asset_not_found() {
    let registry = registry_with_data_asset();
    let consumer = consumer_account();
    let payload = serde_json::json!({
        "documentId": "did:op:unknown",
        "serviceId": "0",
        "serviceType": "access",
        "dataToken": format_address(data_token()),
        "consumerAddress": consumer.address_hex(),
        "signature": sig_hex(&consumer, "did:op:unknown"),
    });
    let data = RequestData::new(payload, "download").expect("valid payload");

    let err = processor(&registry)
        .process(&data, &[], true)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AssetNotFound { .. }));
}

#[tokio::test]
async fn unknown_token_fails_asset_not_found() {
    let registry = registry_with_data_asset();
    let consumer = consumer_account();
    let other_token = H160::repeat_byte(0x07);
    let payload = serde_json::json!({
        "documentId": "did:op:weather",
        "serviceId": "0",
        "serviceType": "access",
        "dataToken": format_address(other_token),
        "consumerAddress": consumer.address_hex(),
        "signature": sig_hex(&consumer, "did:op:weather"),
    });
    let data = RequestData::new(payload, "download").expect("valid payload");

    let err = processor(&registry)
        .process(&data, &[], true)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AssetNotFound { .. }));
}

#[tokio::test]
async fn service_id_absent_from_asset_is_bad_request() {
    let registry = registry_with_data_asset();
    let mut payload = base_request("access");
    payload["serviceId"] = serde_json::json!("9");
    let data = RequestData::new(payload, "download").expect("valid payload");

    let err = processor(&registry)
        .process(&data, &[], true)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::BadRequest(_)));
    assert!(err.to_string().contains("serviceId"));
}
