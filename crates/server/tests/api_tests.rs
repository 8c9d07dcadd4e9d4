//! Approval API tests against the in-process application.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::TestFixture;

#[tokio::test]
async fn test_health() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/v1/health").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
}

#[tokio::test]
async fn test_status_reports_idle_scheduler() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/v1/status").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["scheduler_enabled"], false);
    assert_eq!(response.body["scheduler"]["state"], "idle");
    assert_eq!(response.body["decisions_handled"], 0);
    assert!(response.body["stages"].as_array().unwrap().len() >= 3);
}

#[tokio::test]
async fn test_list_and_get_approvals() {
    let fixture = TestFixture::new().await;
    let first = fixture.seed("https://example.com/first");
    fixture.seed("https://example.com/second");

    let response = fixture.get("/api/v1/approvals").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["total"], 2);
    assert_eq!(response.body["limit"], 100);
    assert_eq!(response.body["approvals"].as_array().unwrap().len(), 2);

    let response = fixture
        .get(&format!("/api/v1/approvals/{}", first.id))
        .await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["id"], first.id.as_str());
    assert_eq!(response.body["status"], "pending");
    assert_eq!(response.body["url"], "https://example.com/first");
}

#[tokio::test]
async fn test_list_pagination_and_filter() {
    let fixture = TestFixture::new().await;
    for n in 0..3 {
        fixture.seed(&format!("https://example.com/{}", n));
    }

    let response = fixture.get("/api/v1/approvals?limit=2&offset=0").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["approvals"].as_array().unwrap().len(), 2);
    assert_eq!(response.body["total"], 3);

    let response = fixture.get("/api/v1/approvals?status=approved").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["total"], 0);

    let response = fixture.get("/api/v1/approvals?status=bogus").await;
    assert_status!(response, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_unknown_approval_is_404() {
    let fixture = TestFixture::new().await;
    let response = fixture
        .get("/api/v1/approvals/00000000000000000000000000000000")
        .await;
    assert_status!(response, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_approve_publishes_once() {
    let fixture = TestFixture::new().await;
    let record = fixture.seed("https://example.com/story");
    let path = format!("/api/v1/approvals/{}/decision", record.id);

    let response = fixture
        .post(&path, json!({ "decision": "approve", "actor": "editor" }))
        .await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "approved");
    assert_eq!(response.body["outcome"]["type"], "published");
    assert_eq!(response.body["publish_url"], "https://t.me/mock/1");

    // A repeated press resolves to the stored outcome without publishing again.
    let response = fixture
        .post(&path, json!({ "decision": "approve", "actor": "editor" }))
        .await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["outcome"]["type"], "already_resolved");
    assert_eq!(fixture.publisher.published_count(), 1);

    let response = fixture.get(&format!("/api/v1/approvals/{}", record.id)).await;
    assert_eq!(response.body["status"], "approved");
    assert_eq!(response.body["resolved_by"], "editor");
}

#[tokio::test]
async fn test_decline_never_publishes() {
    let fixture = TestFixture::new().await;
    let record = fixture.seed("https://example.com/story");
    let path = format!("/api/v1/approvals/{}/decision", record.id);

    let response = fixture.post(&path, json!({ "decision": "decline" })).await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "declined");
    assert_eq!(response.body["outcome"]["type"], "declined");

    // Terminal statuses are never reversed.
    let response = fixture.post(&path, json!({ "decision": "approve" })).await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "declined");
    assert_eq!(fixture.publisher.published_count(), 0);
}

#[tokio::test]
async fn test_decision_for_unknown_item_is_404() {
    let fixture = TestFixture::new().await;
    let response = fixture
        .post(
            "/api/v1/approvals/00000000000000000000000000000000/decision",
            json!({ "decision": "approve" }),
        )
        .await;
    assert_status!(response, StatusCode::NOT_FOUND);
    assert_eq!(fixture.review.reports().len(), 1);
}

#[tokio::test]
async fn test_bad_decision_is_400() {
    let fixture = TestFixture::new().await;
    let record = fixture.seed("https://example.com/story");
    let path = format!("/api/v1/approvals/{}/decision", record.id);

    let response = fixture.post(&path, json!({ "decision": "maybe" })).await;
    assert_status!(response, StatusCode::BAD_REQUEST);

    let response = fixture.post_raw(&path, "{not json").await;
    assert!(response.status.is_client_error());
}

#[tokio::test]
async fn test_publish_failure_is_502_and_record_stays_pending() {
    let fixture = TestFixture::new().await;
    let record = fixture.seed("https://example.com/story");
    fixture.publisher.fail_next();

    let path = format!("/api/v1/approvals/{}/decision", record.id);
    let response = fixture.post(&path, json!({ "decision": "approve" })).await;
    assert_status!(response, StatusCode::BAD_GATEWAY);

    let response = fixture.get(&format!("/api/v1/approvals/{}", record.id)).await;
    assert_eq!(response.body["status"], "pending");

    // The reviewer can press again once the channel recovers.
    let response = fixture.post(&path, json!({ "decision": "approve" })).await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(fixture.publisher.published_count(), 1);
}

#[tokio::test]
async fn test_store_outage_is_503() {
    let fixture = TestFixture::new().await;
    let record = fixture.seed("https://example.com/story");
    fixture.store.fail_get(10);

    let path = format!("/api/v1/approvals/{}/decision", record.id);
    let response = fixture.post(&path, json!({ "decision": "approve" })).await;
    assert_status!(response, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(fixture.publisher.published_count(), 0);
}

#[tokio::test]
async fn test_decision_after_shutdown_is_503() {
    let mut fixture = TestFixture::new().await;
    let record = fixture.seed("https://example.com/story");
    fixture.stop_orchestrator().await;

    let path = format!("/api/v1/approvals/{}/decision", record.id);
    let response = fixture.post(&path, json!({ "decision": "approve" })).await;
    assert_status!(response, StatusCode::SERVICE_UNAVAILABLE);

    let response = fixture.get("/api/v1/status").await;
    assert_status!(response, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new().await;
    fixture.seed("https://example.com/story");
    fixture.get("/api/v1/health").await;

    let (status, body) = fixture.get_text("/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("newsroom_http_requests_total"));
    assert!(body.contains("newsroom_approvals_by_status{status=\"pending\"} 1"));
    assert!(body.contains("newsroom_orchestrator_up 1"));
}
