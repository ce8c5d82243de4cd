mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::json;

#[tokio::test]
async fn test_empty_store_lists_nothing() {
    let setup = TestSetup::new().await;

    let response = setup.send_get_request("/api/proofs").await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = setup.parse_response_body(response).await.unwrap();
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_listing_uses_wire_field_names() {
    let setup = TestSetup::new().await;
    let stored = setup
        .proof_storage
        .append(json!({ "claim": "x" }))
        .await
        .unwrap();

    let response = setup.send_get_request("/api/proofs").await.unwrap();
    let body = setup.parse_response_body(response).await.unwrap();

    let entry = &body[0];
    assert_eq!(entry["data"], json!({ "claim": "x" }));
    let received_at = entry["receivedAt"].as_str().expect("receivedAt string");
    assert_eq!(
        chrono::DateTime::parse_from_rfc3339(received_at).unwrap(),
        stored.received_at
    );
}

#[tokio::test]
async fn test_corrupted_store_fails_listing() {
    let setup = TestSetup::new().await;
    setup.write_raw_store("not json at all");

    let response = setup.send_get_request("/api/proofs").await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = setup.parse_response_body(response).await.unwrap();
    assert_eq!(body["error"]["code"], "store_corrupted");
    assert_eq!(body["allowRetry"], false);
}

#[tokio::test]
async fn test_deleted_store_fails_listing() {
    let setup = TestSetup::new().await;
    setup.delete_store();

    let response = setup.send_get_request("/api/proofs").await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
