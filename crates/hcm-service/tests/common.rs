//! Common test utilities for hcm-service integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum_test::TestServer;
use serde_json::{json, Value};

use hcm_cloud::testing::FakeCloud;
use hcm_cloud::AdapterRegistry;
use hcm_core::{CloudResource, ResourceKind, Scope, Vendor};
use hcm_service::{create_router, AppState, ServiceConfig};
use hcm_store::MemoryStore;
use hcm_task::RetryPolicy;

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Backing store, for asserting on synced rows.
    pub store: Arc<MemoryStore>,
    /// The scripted vendor behind `aws/vpc`.
    pub vpcs: Arc<FakeCloud>,
    /// State shared with the router.
    pub state: AppState,
    /// The service API key for `/v1` requests.
    pub service_api_key: String,
}

impl TestHarness {
    /// Create a new test harness with a fresh in-memory store.
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let vpcs = Arc::new(FakeCloud::new(Vendor::Aws, ResourceKind::Vpc));
        let adapters = AdapterRegistry::new().with(vpcs.clone());

        let service_api_key = "test-service-key".to_string();
        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            service_api_key: Some(service_api_key.clone()),
            retry: RetryPolicy {
                max_attempts: 2,
                initial_backoff_ms: 1,
                max_backoff_ms: 1,
            },
            ..ServiceConfig::default()
        };

        let state = AppState::new(store.clone(), Arc::new(adapters), config);
        let router: Router = create_router(state.clone());
        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            store,
            vpcs,
            state,
            service_api_key,
        }
    }

    /// The scope the fake VPCs live in.
    pub fn scope() -> Scope {
        Scope::new(Vendor::Aws, "acc-1", "us-east-1")
    }

    /// Seed VPCs at the vendor.
    pub fn seed_vpcs(&self, ids: &[&str]) {
        for id in ids {
            self.vpcs
                .insert(&Self::scope(), CloudResource::new(*id, format!("name-{id}")));
        }
    }

    /// `sync_resource` parameters for the fake VPCs.
    pub fn sync_params() -> Value {
        json!({
            "vendor": "aws",
            "account_id": "acc-1",
            "region": "us-east-1",
            "kind": "vpc"
        })
    }

    /// Submit a task and return its id.
    pub async fn submit(&self, name: &str, params: Value) -> String {
        let response = self
            .server
            .post("/v1/tasks")
            .add_header("x-api-key", self.service_api_key.clone())
            .json(&json!({ "name": name, "params": params }))
            .await;
        response.assert_status(axum::http::StatusCode::ACCEPTED);
        let body: Value = response.json();
        body["task_id"].as_str().expect("task_id").to_string()
    }

    /// Poll a task until it reaches a terminal state.
    pub async fn wait_for(&self, task_id: &str) -> Value {
        for _ in 0..200 {
            let response = self
                .server
                .get(&format!("/v1/tasks/{task_id}"))
                .add_header("x-api-key", self.service_api_key.clone())
                .await;
            response.assert_status_ok();
            let body: Value = response.json();
            if matches!(
                body["state"].as_str(),
                Some("succeeded" | "failed" | "cancelled")
            ) {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task {task_id} did not finish");
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
