//! Transport to the orchestration service.
//!
//! [`WorkflowService`] is the seam between request assembly and the wire.
//! [`GrpcWorkflowService`] speaks gRPC over a lazily connected tonic channel;
//! tests substitute `MockWorkflowService`.

use async_trait::async_trait;
use http::uri::PathAndQuery;
use secrecy::{ExposeSecret, SecretString};
use tonic::client::Grpc;
use tonic::metadata::MetadataValue;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tonic::{Request, Status};
use tonic_prost::ProstCodec;

use crate::config::ClientConfig;
use crate::error::DispatchError;
use crate::proto::{
    BulkTriggerWorkflowRequest, BulkTriggerWorkflowResponse, CreateWorkflowVersionRequest,
    CreateWorkflowVersionResponse, PutRateLimitRequest, PutRateLimitResponse,
    ScheduleWorkflowRequest, TriggerWorkflowRequest, TriggerWorkflowResponse, WorkflowVersion,
};

#[cfg(any(test, feature = "test-support"))]
use mockall::automock;

const PUT_WORKFLOW: &str = "/v1.AdminService/PutWorkflow";
const PUT_RATE_LIMIT: &str = "/WorkflowService/PutRateLimit";
const SCHEDULE_WORKFLOW: &str = "/WorkflowService/ScheduleWorkflow";
const TRIGGER_WORKFLOW: &str = "/WorkflowService/TriggerWorkflow";
const BULK_TRIGGER_WORKFLOW: &str = "/WorkflowService/BulkTriggerWorkflow";

/// Remote operations of the orchestration service.
///
/// Implementations return the raw transport status on failure; retries and
/// conflict classification happen in the client.
#[cfg_attr(any(test, feature = "test-support"), automock)]
#[async_trait]
pub trait WorkflowService: Send + Sync + 'static {
    async fn put_workflow(
        &self,
        request: CreateWorkflowVersionRequest,
    ) -> Result<CreateWorkflowVersionResponse, Status>;

    async fn put_rate_limit(
        &self,
        request: PutRateLimitRequest,
    ) -> Result<PutRateLimitResponse, Status>;

    async fn schedule_workflow(
        &self,
        request: ScheduleWorkflowRequest,
    ) -> Result<WorkflowVersion, Status>;

    async fn trigger_workflow(
        &self,
        request: TriggerWorkflowRequest,
    ) -> Result<TriggerWorkflowResponse, Status>;

    async fn bulk_trigger_workflow(
        &self,
        request: BulkTriggerWorkflowRequest,
    ) -> Result<BulkTriggerWorkflowResponse, Status>;
}

/// gRPC implementation of [`WorkflowService`].
#[derive(Clone)]
pub struct GrpcWorkflowService {
    grpc: Grpc<Channel>,
    token: SecretString,
}

impl std::fmt::Debug for GrpcWorkflowService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrpcWorkflowService").finish_non_exhaustive()
    }
}

impl GrpcWorkflowService {
    /// Creates a service for the configured endpoint.
    ///
    /// The connection is established on first use. This must be called from
    /// within a Tokio runtime.
    pub fn connect_lazy(config: &ClientConfig) -> Result<Self, DispatchError> {
        let scheme = if config.tls { "https" } else { "http" };
        let mut endpoint = Endpoint::from_shared(format!("{scheme}://{}", config.host_port))?;
        if config.tls {
            endpoint = endpoint.tls_config(ClientTlsConfig::new().with_native_roots())?;
        }
        tracing::debug!(host_port = %config.host_port, tls = config.tls, "Creating workflow service channel");
        Ok(Self::from_channel(endpoint.connect_lazy(), config.token.clone()))
    }

    pub fn from_channel(channel: Channel, token: SecretString) -> Self {
        Self {
            grpc: Grpc::new(channel),
            token,
        }
    }

    async fn unary<Req, Resp>(&self, path: &'static str, message: Req) -> Result<Resp, Status>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        let mut request = Request::new(message);
        let auth = MetadataValue::try_from(format!("Bearer {}", self.token.expose_secret()))
            .map_err(|e| Status::unauthenticated(format!("Invalid API token: {e}")))?;
        request.metadata_mut().insert("authorization", auth);

        let mut grpc = self.grpc.clone();
        grpc.ready()
            .await
            .map_err(|e| Status::unavailable(format!("Service was not ready: {e}")))?;
        let response = grpc
            .unary(request, PathAndQuery::from_static(path), ProstCodec::default())
            .await?;
        Ok(response.into_inner())
    }
}

#[async_trait]
impl WorkflowService for GrpcWorkflowService {
    async fn put_workflow(
        &self,
        request: CreateWorkflowVersionRequest,
    ) -> Result<CreateWorkflowVersionResponse, Status> {
        self.unary(PUT_WORKFLOW, request).await
    }

    async fn put_rate_limit(
        &self,
        request: PutRateLimitRequest,
    ) -> Result<PutRateLimitResponse, Status> {
        self.unary(PUT_RATE_LIMIT, request).await
    }

    async fn schedule_workflow(
        &self,
        request: ScheduleWorkflowRequest,
    ) -> Result<WorkflowVersion, Status> {
        self.unary(SCHEDULE_WORKFLOW, request).await
    }

    async fn trigger_workflow(
        &self,
        request: TriggerWorkflowRequest,
    ) -> Result<TriggerWorkflowResponse, Status> {
        self.unary(TRIGGER_WORKFLOW, request).await
    }

    async fn bulk_trigger_workflow(
        &self,
        request: BulkTriggerWorkflowRequest,
    ) -> Result<BulkTriggerWorkflowResponse, Status> {
        self.unary(BULK_TRIGGER_WORKFLOW, request).await
    }
}
