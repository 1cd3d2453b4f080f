//! Bulk responses produced by the resolver conform to the published schema.

mod common;

use common::*;
use scimbulk_core::BulkOperationRequest;
use serde_json::json;
use std::sync::Arc;

fn assert_conforms(instance: &serde_json::Value) {
    let schema: serde_json::Value =
        serde_json::from_str(include_str!("../../../schemas/BulkResponse.schema.json"))
            .expect("schema must parse");
    let validator = jsonschema::draft202012::options()
        .build(&schema)
        .expect("schema must compile");

    if !validator.is_valid(instance) {
        let mut msgs = Vec::new();
        for (idx, err) in validator.iter_errors(instance).take(20).enumerate() {
            msgs.push(format!("{}: {}", idx + 1, err));
        }
        panic!("bulk response did not validate: {}", msgs.join("; "));
    }
}

#[tokio::test]
async fn mixed_outcomes_validate() {
    let resolver = resolver(Arc::new(RecordingStore::new()));

    let report = resolver
        .resolve(
            &request(vec![
                BulkOperationRequest::create("/Users", "usr1", json!({ "userName": "alice" })),
                BulkOperationRequest::create("/Groups", "a", json!({ "members": [{ "value": "bulkId:b" }] })),
                BulkOperationRequest::create("/Groups", "b", json!({ "members": [{ "value": "bulkId:a" }] })),
                BulkOperationRequest::delete("/Users/bulkId:usr1").with_bulk_id("cleanup"),
                BulkOperationRequest::delete("/Users/missing"),
            ])
            .with_fail_on_errors(3),
        )
        .await
        .unwrap();

    let instance = serde_json::to_value(report.response()).expect("bulk response must serialize");
    assert_eq!(instance["Operations"].as_array().map(Vec::len), Some(5));
    assert_eq!(instance["Operations"][3]["bulkId"], "cleanup");
    assert_eq!(instance["Operations"][4]["status"], "404");
    assert_conforms(&instance);
}

#[tokio::test]
async fn batch_error_body_is_a_scim_error() {
    let resolver = resolver(Arc::new(RecordingStore::new()));
    let err = resolver
        .resolve(&request(vec![
            BulkOperationRequest::create("/Users", "dup", json!({})),
            BulkOperationRequest::create("/Users", "dup", json!({})),
        ]))
        .await
        .unwrap_err();

    let body = serde_json::to_value(err.to_scim_error()).unwrap();
    assert_eq!(body["schemas"], json!(["urn:ietf:params:scim:api:messages:2.0:Error"]));
    assert_eq!(body["status"], "409");
    assert_eq!(body["scimType"], "uniqueness");
}
