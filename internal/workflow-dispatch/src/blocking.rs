//! Synchronous facade over [`AdminClient`].
//!
//! The blocking client owns a Tokio runtime and drives the async client on it,
//! so both forms share one implementation of every operation.

use std::sync::Arc;

use serde::Serialize;
use tokio::runtime::Runtime;

use crate::client::AdminClient;
use crate::config::ClientConfig;
use crate::context::ExecutionContext;
use crate::error::DispatchResult;
use crate::listener::PooledWorkflowRunListener;
use crate::options::{
    RateLimitDuration, Schedule, ScheduleTriggerWorkflowOptions, TriggerWorkflowOptions,
    WorkflowRunTriggerConfig,
};
use crate::proto::{CreateWorkflowVersionRequest, CreateWorkflowVersionResponse, WorkflowVersion};
use crate::run_ref::WorkflowRunRef;
use crate::service::WorkflowService;

/// Blocking version of [`AdminClient`].
///
/// Must not be used from inside an async context; `block_on` panics there.
#[derive(Debug, Clone)]
pub struct BlockingAdminClient {
    inner: AdminClient,
    runtime: Arc<Runtime>,
}

fn build_runtime() -> DispatchResult<Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("workflow-dispatch")
        .enable_all()
        .build()?)
}

impl BlockingAdminClient {
    /// Creates a client connected to `config.host_port`.
    pub fn new(config: ClientConfig) -> DispatchResult<Self> {
        let runtime = build_runtime()?;
        // The gRPC channel spawns its worker onto the current runtime.
        let inner = {
            let _guard = runtime.enter();
            AdminClient::builder().config(config).build()?
        };
        Ok(Self {
            inner,
            runtime: Arc::new(runtime),
        })
    }

    /// Creates a client on top of a custom transport.
    pub fn with_service(
        config: ClientConfig,
        service: Arc<dyn WorkflowService>,
    ) -> DispatchResult<Self> {
        let inner = AdminClient::builder()
            .config(config)
            .service(service)
            .build()?;
        Self::from_client(inner)
    }

    /// Wraps an existing async client; the two share all state.
    pub fn from_client(inner: AdminClient) -> DispatchResult<Self> {
        Ok(Self {
            inner,
            runtime: Arc::new(build_runtime()?),
        })
    }

    pub fn as_async(&self) -> &AdminClient {
        &self.inner
    }

    pub fn listener(&self) -> Arc<PooledWorkflowRunListener> {
        self.inner.listener()
    }

    pub fn put_workflow(
        &self,
        name: &str,
        definition: CreateWorkflowVersionRequest,
        overrides: Option<&CreateWorkflowVersionRequest>,
    ) -> DispatchResult<CreateWorkflowVersionResponse> {
        self.runtime
            .block_on(self.inner.put_workflow(name, definition, overrides))
    }

    pub fn put_rate_limit(
        &self,
        key: &str,
        limit: i32,
        duration: RateLimitDuration,
    ) -> DispatchResult<()> {
        self.runtime
            .block_on(self.inner.put_rate_limit(key, limit, duration))
    }

    pub fn schedule_workflow<I: Serialize + Sync + ?Sized>(
        &self,
        workflow_name: &str,
        schedules: &[Schedule],
        input: &I,
        options: &ScheduleTriggerWorkflowOptions,
    ) -> DispatchResult<WorkflowVersion> {
        self.runtime.block_on(
            self.inner
                .schedule_workflow(workflow_name, schedules, input, options),
        )
    }

    pub fn run_workflow<I: Serialize + Sync + ?Sized>(
        &self,
        ctx: &ExecutionContext,
        workflow_name: &str,
        input: &I,
        options: &TriggerWorkflowOptions,
    ) -> DispatchResult<WorkflowRunRef> {
        self.runtime
            .block_on(self.inner.run_workflow(ctx, workflow_name, input, options))
    }

    pub fn run_workflows(
        &self,
        ctx: &ExecutionContext,
        workflows: &[WorkflowRunTriggerConfig],
    ) -> DispatchResult<Vec<WorkflowRunRef>> {
        self.runtime
            .block_on(self.inner.run_workflows(ctx, workflows))
    }

    pub fn get_workflow_run(&self, workflow_run_id: impl Into<String>) -> WorkflowRunRef {
        self.inner.get_workflow_run(workflow_run_id)
    }
}
