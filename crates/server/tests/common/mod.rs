//! Common test utilities for API testing with mocks.
//!
//! The fixture assembles the real application around a temp SQLite store
//! and mock surfaces, runs the execution context in the background and
//! drives the router in-process with `oneshot`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tower::ServiceExt;

use newsroom_core::testing::{FlakyStore, MockNotifier, MockPublisher, MockReviewSurface};
use newsroom_core::{
    load_config_from_str, ApprovalStore, OrchestratorHandle, PendingApproval,
    SqliteApprovalStore,
};
use newsroom_server::api::create_router;
use newsroom_server::app::{App, Surfaces};

/// Re-export fixtures for test convenience
pub use newsroom_core::testing::fixtures;

/// In-process application with controllable mocks.
pub struct TestFixture {
    pub router: Router,
    pub store: Arc<FlakyStore>,
    pub publisher: Arc<MockPublisher>,
    pub review: Arc<MockReviewSurface>,
    pub notifier: Arc<MockNotifier>,
    pub handle: OrchestratorHandle,
    orchestrator_task: JoinHandle<newsroom_core::orchestrator::ExecutionContext>,
    /// Keeps the database directory alive
    _temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Fixture with the scheduler disabled; only decisions and reads happen.
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let config = load_config_from_str(
            r#"
[scheduler]
enabled = false

[store.retry]
max_attempts = 3
initial_delay_ms = 1
"#,
        )
        .expect("Failed to parse test config");

        let store = Arc::new(FlakyStore::new(
            SqliteApprovalStore::new(&db_path).expect("Failed to create store"),
        ));
        let publisher = Arc::new(MockPublisher::new());
        let review = Arc::new(MockReviewSurface::new());
        let notifier = Arc::new(MockNotifier::new());

        let surfaces = Surfaces {
            review: review.clone(),
            notifier: notifier.clone(),
            publisher: publisher.clone(),
            telegram: None,
        };

        let app = App::assemble(config, store.clone() as Arc<dyn ApprovalStore>, surfaces);
        tokio::spawn(app.notify_writer.run());
        let handle = app.state.orchestrator().clone();
        let orchestrator_task = tokio::spawn(app.orchestrator.run());
        let router = create_router(app.state);

        Self {
            router,
            store,
            publisher,
            review,
            notifier,
            handle,
            orchestrator_task,
            _temp_dir: temp_dir,
        }
    }

    /// Insert a pending record straight into the durable store, as a
    /// pipeline run in an earlier process would have.
    pub fn seed(&self, url: &str) -> PendingApproval {
        let record = fixtures::pending(url);
        self.store.upsert(&record).expect("Failed to seed record")
    }

    /// Stop the execution context and wait for it to exit.
    pub async fn stop_orchestrator(&mut self) {
        self.handle.shutdown();
        (&mut self.orchestrator_task)
            .await
            .expect("Execution context panicked");
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Raw body, for testing malformed JSON.
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// Body as text (for the Prometheus endpoint).
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder().uri(path).body(Body::empty()).unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        self.send(request_builder.body(body).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
