//! Workflow dispatch client implementation.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::instrument;

use crate::config::ClientConfig;
use crate::context::ExecutionContext;
use crate::error::{DispatchError, DispatchResult};
use crate::listener::{ListenerCell, PooledWorkflowRunListener, RunEventListenerClient};
use crate::options::{
    RateLimitDuration, Schedule, ScheduleTriggerWorkflowOptions, TriggerWorkflowOptions,
    WorkflowRunTriggerConfig,
};
use crate::proto::{
    self, BulkTriggerWorkflowRequest, CreateWorkflowVersionRequest, CreateWorkflowVersionResponse,
    PutRateLimitRequest, WorkflowVersion,
};
use crate::request::{
    TriggerRequestBuilder, build_put_workflow_request, build_schedule_request,
};
use crate::run_ref::WorkflowRunRef;
use crate::service::{GrpcWorkflowService, WorkflowService};
use crate::spawn_index::SpawnIndexTable;

// =============================================================================
// Client Builder
// =============================================================================

/// Builder for creating an [`AdminClient`].
#[derive(Default)]
pub struct AdminClientBuilder {
    config: Option<ClientConfig>,
    service: Option<Arc<dyn WorkflowService>>,
    spawn_indices: Option<Arc<SpawnIndexTable>>,
}

impl AdminClientBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the client configuration. Required.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets a custom transport.
    ///
    /// If not set, a gRPC channel to `config.host_port` is created.
    pub fn service(mut self, service: Arc<dyn WorkflowService>) -> Self {
        self.service = Some(service);
        self
    }

    /// Shares a spawn index table with other clients.
    ///
    /// By default every client gets its own table.
    pub fn spawn_indices(mut self, spawn_indices: Arc<SpawnIndexTable>) -> Self {
        self.spawn_indices = Some(spawn_indices);
        self
    }

    /// Builds the [`AdminClient`].
    ///
    /// When no custom service is set this must run inside a Tokio runtime,
    /// since the gRPC channel spawns its connection task there.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration is not set
    /// - The service endpoint is invalid
    pub fn build(self) -> Result<AdminClient, DispatchError> {
        let config = self
            .config
            .ok_or_else(|| DispatchError::Config("client configuration is required".to_string()))?;
        let service: Arc<dyn WorkflowService> = match self.service {
            Some(service) => service,
            None => Arc::new(GrpcWorkflowService::connect_lazy(&config)?),
        };
        let listener_client = Arc::new(RunEventListenerClient::new(&config));

        Ok(AdminClient {
            config: Arc::new(config),
            service,
            spawn_indices: self.spawn_indices.unwrap_or_default(),
            listener: Arc::new(ListenerCell::new()),
            listener_client,
        })
    }
}

// =============================================================================
// Client
// =============================================================================

/// Client for registering, scheduling, and triggering workflows.
///
/// Cloning is cheap; clones share the transport, the spawn index table, and
/// the pooled listener.
#[derive(Clone)]
pub struct AdminClient {
    config: Arc<ClientConfig>,
    service: Arc<dyn WorkflowService>,
    spawn_indices: Arc<SpawnIndexTable>,
    listener: Arc<ListenerCell>,
    listener_client: Arc<RunEventListenerClient>,
}

impl fmt::Debug for AdminClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminClient")
            .field("host_port", &self.config.host_port)
            .field("namespace", &self.config.namespace)
            .finish_non_exhaustive()
    }
}

impl AdminClient {
    /// Creates a new builder for constructing an [`AdminClient`].
    pub fn builder() -> AdminClientBuilder {
        AdminClientBuilder::new()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn namespace(&self) -> &str {
        &self.config.namespace
    }

    pub fn spawn_indices(&self) -> &Arc<SpawnIndexTable> {
        &self.spawn_indices
    }

    /// Returns the pooled run listener, creating it on first use.
    pub fn listener(&self) -> Arc<PooledWorkflowRunListener> {
        self.listener.get_or_create(&self.config)
    }

    fn run_ref(&self, workflow_run_id: String) -> WorkflowRunRef {
        WorkflowRunRef::new(
            workflow_run_id,
            self.listener(),
            Arc::clone(&self.listener_client),
        )
    }

    // -------------------------------------------------------------------------
    // Registration
    // -------------------------------------------------------------------------

    /// Registers a workflow version.
    ///
    /// Fields set in `overrides` win over `definition`; the name is always
    /// `name`.
    pub async fn put_workflow(
        &self,
        name: &str,
        definition: CreateWorkflowVersionRequest,
        overrides: Option<&CreateWorkflowVersionRequest>,
    ) -> DispatchResult<CreateWorkflowVersionResponse> {
        let request = build_put_workflow_request(name, definition, overrides)?;
        tracing::debug!(workflow_name = %request.name, "Registering workflow");
        self.config
            .retry
            .call("put_workflow", || self.service.put_workflow(request.clone()))
            .await
    }

    /// Creates or updates a rate limit.
    pub async fn put_rate_limit(
        &self,
        key: &str,
        limit: i32,
        duration: RateLimitDuration,
    ) -> DispatchResult<()> {
        let request = PutRateLimitRequest {
            key: key.to_string(),
            limit,
            duration: proto::RateLimitDuration::from(duration) as i32,
        };
        tracing::debug!(key, limit, %duration, "Putting rate limit");
        self.config
            .retry
            .call("put_rate_limit", || self.service.put_rate_limit(request.clone()))
            .await?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Scheduling
    // -------------------------------------------------------------------------

    /// Schedules runs of `workflow_name` at each of `schedules`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::DedupeViolation`] if the service reports the
    /// schedule already exists, and [`DispatchError::Validation`] for an
    /// invalid schedule (before anything is sent).
    #[instrument(skip_all, fields(workflow_name = %workflow_name))]
    pub async fn schedule_workflow<I: Serialize + Sync + ?Sized>(
        &self,
        workflow_name: &str,
        schedules: &[Schedule],
        input: &I,
        options: &ScheduleTriggerWorkflowOptions,
    ) -> DispatchResult<WorkflowVersion> {
        let request = build_schedule_request(
            workflow_name,
            schedules,
            input,
            options,
            &self.config.namespace,
        )?;
        self.config
            .retry
            .call("schedule_workflow", || {
                self.service.schedule_workflow(request.clone())
            })
            .await
    }

    // -------------------------------------------------------------------------
    // Triggering
    // -------------------------------------------------------------------------

    fn request_builder(&self) -> TriggerRequestBuilder<'_> {
        TriggerRequestBuilder::new(&self.config.namespace, &self.spawn_indices)
    }

    /// Triggers one run of `workflow_name`.
    ///
    /// Parent linkage, spawn index, and worker pinning are resolved from
    /// `options` and `ctx`. A spawn index allocated here stays consumed even
    /// if the call later fails.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::DedupeViolation`] if a run with the same
    /// deduplication value already exists.
    #[instrument(skip_all, fields(workflow_name = %workflow_name))]
    pub async fn run_workflow<I: Serialize + Sync + ?Sized>(
        &self,
        ctx: &ExecutionContext,
        workflow_name: &str,
        input: &I,
        options: &TriggerWorkflowOptions,
    ) -> DispatchResult<WorkflowRunRef> {
        let request = self
            .request_builder()
            .build(workflow_name, input, options, ctx)?;
        tracing::debug!(
            name = %request.name,
            parent_id = ?request.parent_id,
            child_index = ?request.child_index,
            "Triggering workflow"
        );

        let response = self
            .config
            .retry
            .call("trigger_workflow", || {
                self.service.trigger_workflow(request.clone())
            })
            .await?;
        Ok(self.run_ref(response.workflow_run_id))
    }

    /// Triggers several runs in one call.
    ///
    /// The spawn indices for the whole batch are reserved together, so
    /// concurrent batches from the same parent never interleave.
    #[instrument(skip_all, fields(count = workflows.len()))]
    pub async fn run_workflows(
        &self,
        ctx: &ExecutionContext,
        workflows: &[WorkflowRunTriggerConfig],
    ) -> DispatchResult<Vec<WorkflowRunRef>> {
        let request = BulkTriggerWorkflowRequest {
            workflows: self.request_builder().build_bulk(workflows, ctx)?,
        };

        let response = self
            .config
            .retry
            .call("bulk_trigger_workflow", || {
                self.service.bulk_trigger_workflow(request.clone())
            })
            .await?;
        if response.workflow_run_ids.len() != request.workflows.len() {
            tracing::warn!(
                requested = request.workflows.len(),
                returned = response.workflow_run_ids.len(),
                "Bulk trigger returned an unexpected number of run ids"
            );
        }

        Ok(response
            .workflow_run_ids
            .into_iter()
            .map(|id| self.run_ref(id))
            .collect())
    }

    /// Returns a handle for a run triggered earlier, without a remote call.
    pub fn get_workflow_run(&self, workflow_run_id: impl Into<String>) -> WorkflowRunRef {
        self.run_ref(workflow_run_id.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::MockWorkflowService;

    fn client_with(service: MockWorkflowService) -> AdminClient {
        AdminClient::builder()
            .config(ClientConfig::new("token").with_namespace("ns"))
            .service(Arc::new(service))
            .build()
            .expect("client builds")
    }

    #[test]
    fn test_build_fails_without_config() {
        let result = AdminClient::builder()
            .service(Arc::new(MockWorkflowService::new()))
            .build();
        assert!(
            matches!(result, Err(DispatchError::Config(_))),
            "Building without a config should fail with a Config error"
        );
    }

    #[test]
    fn test_get_workflow_run_makes_no_call_and_creates_listener() {
        let client = client_with(MockWorkflowService::new());
        assert!(client.listener.get().is_none());

        let first = client.get_workflow_run("run-1");
        let second = client.get_workflow_run("run-2");

        assert_eq!(first.workflow_run_id(), "run-1");
        assert!(Arc::ptr_eq(first.listener(), second.listener()));
        assert!(Arc::ptr_eq(first.listener(), &client.listener()));
    }

    #[tokio::test]
    async fn test_abandoned_run_lookups_do_not_accumulate() {
        let client = client_with(MockWorkflowService::new());
        for i in 0..100 {
            let run = client.get_workflow_run(format!("run-{i}"));
            let waited =
                tokio::time::timeout(std::time::Duration::from_millis(1), run.result()).await;
            assert!(waited.is_err());
        }
        assert_eq!(client.listener().observed_runs(), 0);
    }

    #[test]
    fn test_clients_do_not_share_spawn_indices_by_default() {
        let a = client_with(MockWorkflowService::new());
        let b = client_with(MockWorkflowService::new());
        a.spawn_indices().allocate(Some("run"));
        assert_eq!(b.spawn_indices().peek("run"), None);
        assert_eq!(a.clone().spawn_indices().peek("run"), Some(1));
    }
}
