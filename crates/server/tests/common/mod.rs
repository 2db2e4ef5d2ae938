//! Common test utilities for driving the status router with mocks.
//!
//! The fixture wires a real [`Manager`] around a mock *arr instance and a
//! mock download client, persists strikes to a temp dir, and exposes the
//! router for in-process requests.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use sweeparr_core::config::{JobConfig, JobDefaultsConfig};
use sweeparr_core::jobs::removal::{QueueJob, Stalled};
use sweeparr_core::testing::{MockArrClient, MockDownloadClient};
use sweeparr_core::{ArrKind, CycleError, Manager, RemovalPolicy, StrikeLedger};
use sweeparr_server::state::AppState;

/// Re-export fixtures for test convenience
pub use sweeparr_core::testing::fixtures;

pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    pub manager: Arc<Manager>,
    pub sonarr: Arc<MockArrClient>,
    pub qbit: Arc<MockDownloadClient>,
    /// Holds the strike file
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub text: String,
}

impl TestFixture {
    /// Fixture with the stalled job enabled at `max_strikes`.
    pub async fn new(max_strikes: u32) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let ledger = Arc::new(StrikeLedger::open(temp_dir.path().join("strikes.json")).await);

        let sonarr = Arc::new(MockArrClient::new("sonarr", ArrKind::Sonarr));
        let qbit = Arc::new(MockDownloadClient::new("qbit"));

        let mut manager = Manager::new(ledger, RemovalPolicy::remove_all(), false);
        manager.register_arr_client(Arc::clone(&sonarr) as Arc<dyn sweeparr_core::ArrClient>);
        manager.register_download_client(
            Arc::clone(&qbit) as Arc<dyn sweeparr_core::DownloadClient>
        );
        manager.register_job(QueueJob::new(
            Stalled,
            &JobConfig {
                enabled: true,
                max_strikes: Some(max_strikes),
                ..Default::default()
            },
            &JobDefaultsConfig::default(),
        ));

        let manager = Arc::new(manager);
        let state = Arc::new(AppState::new(Arc::clone(&manager)));
        let router = sweeparr_server::api::create_router(state);

        Self {
            router,
            manager,
            sonarr,
            qbit,
            temp_dir,
        }
    }

    pub async fn run_cycle(&self) -> Result<(), CycleError> {
        self.manager.run_all(&CancellationToken::new()).await
    }

    /// Send a GET request to the test router.
    pub async fn get(&self, path: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();

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

        let text = String::from_utf8_lossy(&body_bytes).to_string();
        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body, text }
    }
}
