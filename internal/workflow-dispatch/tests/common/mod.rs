//! Shared helpers for the workflow-dispatch integration tests.

// Each test binary uses a different subset of these helpers
#![allow(dead_code, clippy::allow_attributes)]

use std::sync::{Arc, Mutex};

use serde_json::Value;
use workflow_dispatch::proto::{TriggerWorkflowRequest, TriggerWorkflowResponse};
use workflow_dispatch::{
    AdminClient, ClientConfig, ExecutionContext, MockWorkflowService, RetryConfig,
};

/// Retries that finish in milliseconds.
pub fn fast_retries() -> RetryConfig {
    RetryConfig {
        num_retries: 3,
        min_delay_ms: 1,
        max_delay_s: 0.01,
    }
}

pub fn test_config(namespace: &str) -> ClientConfig {
    ClientConfig::new("test-token")
        .with_namespace(namespace)
        .with_retry(fast_retries())
}

pub fn client(service: MockWorkflowService) -> AdminClient {
    client_in_namespace(service, "")
}

pub fn client_in_namespace(service: MockWorkflowService, namespace: &str) -> AdminClient {
    AdminClient::builder()
        .config(test_config(namespace))
        .service(Arc::new(service))
        .build()
        .expect("client builds with a mock service")
}

pub fn step_context() -> ExecutionContext {
    ExecutionContext::new("run-parent", "step-1", "worker-1")
}

/// Every trigger request the mock has received, in arrival order.
#[derive(Clone, Default)]
pub struct Recorded {
    requests: Arc<Mutex<Vec<TriggerWorkflowRequest>>>,
}

impl Recorded {
    pub fn push(&self, request: TriggerWorkflowRequest) {
        self.requests
            .lock()
            .expect("recorder lock poisoned")
            .push(request);
    }

    pub fn take(&self) -> Vec<TriggerWorkflowRequest> {
        std::mem::take(&mut *self.requests.lock().expect("recorder lock poisoned"))
    }
}

/// A mock that accepts every trigger, records it, and names the run after
/// its spawn index.
pub fn recording_service(recorded: &Recorded) -> MockWorkflowService {
    let recorded = recorded.clone();
    let mut service = MockWorkflowService::new();
    service.expect_trigger_workflow().returning(move |request| {
        let workflow_run_id = format!("run-{}", request.child_index.unwrap_or(-1));
        recorded.push(request);
        Ok(TriggerWorkflowResponse { workflow_run_id })
    });
    service
}

pub fn input_of(request: &TriggerWorkflowRequest) -> Value {
    serde_json::from_str(&request.input).expect("trigger input is JSON")
}

pub fn single(mut requests: Vec<TriggerWorkflowRequest>) -> TriggerWorkflowRequest {
    assert_eq!(requests.len(), 1, "expected exactly one trigger call");
    requests.remove(0)
}
