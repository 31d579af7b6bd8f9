//! Workflow dispatch client.
//!
//! This crate registers, schedules, and triggers workflows on a remote
//! orchestration service. Triggers issued from inside a running step are
//! linked to that step and receive a deterministic spawn index, so replaying
//! the step spawns the same children with the same indices.
//!
//! # Example
//!
//! ```no_run
//! use workflow_dispatch::{
//!     AdminClient, ClientConfig, ExecutionContext, TriggerWorkflowOptions,
//! };
//!
//! # async fn example() -> Result<(), workflow_dispatch::DispatchError> {
//! let client = AdminClient::builder()
//!     .config(ClientConfig::new("your-api-token").with_namespace("staging"))
//!     .build()?;
//!
//! // Trigger a root run. Inside a step, pass the step's context instead.
//! let run = client
//!     .run_workflow(
//!         &ExecutionContext::root(),
//!         "send-invoice",
//!         &serde_json::json!({"invoice_id": 42}),
//!         &TriggerWorkflowOptions::default(),
//!     )
//!     .await?;
//!
//! tracing::info!(workflow_run_id = run.workflow_run_id(), "Triggered");
//! # Ok(())
//! # }
//! ```

mod blocking;
mod client;
mod config;
mod context;
mod error;
mod listener;
mod options;
pub mod proto;
mod request;
mod retries;
mod run_ref;
mod service;
mod spawn;
mod spawn_index;

pub use blocking::BlockingAdminClient;
pub use client::{AdminClient, AdminClientBuilder};
pub use config::{
    ClientConfig, DEFAULT_HOST_PORT, ENV_HOST_PORT, ENV_NAMESPACE, ENV_TLS, ENV_TOKEN,
    normalize_namespace,
};
pub use context::ExecutionContext;
pub use error::{DispatchError, DispatchResult};
pub use listener::{
    ListenerCell, PooledWorkflowRunListener, RunEventListenerClient, RunSubscription,
    WorkflowRunEvent, WorkflowRunEventKind,
};
pub use options::{
    AdditionalMetadata, RateLimitDuration, Schedule, ScheduleTriggerWorkflowOptions,
    TriggerWorkflowOptions, WorkflowRunTriggerConfig,
};
pub use request::{
    TriggerRequestBuilder, build_put_workflow_request, build_schedule_request,
    qualify_workflow_name,
};
pub use retries::RetryConfig;
pub use run_ref::WorkflowRunRef;
pub use service::{GrpcWorkflowService, WorkflowService};
pub use spawn::{ChildTriggerWorkflowOptions, ChildWorkflowRun, StepSpawner};
pub use spawn_index::SpawnIndexTable;

#[cfg(any(test, feature = "test-support"))]
pub use service::MockWorkflowService;
