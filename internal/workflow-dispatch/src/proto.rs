//! Wire messages exchanged with the orchestration service.
//!
//! These mirror the service's protobuf contracts (`WorkflowService` and
//! `v1.AdminService`). Field numbers must never be reused.

pub use prost_types::Timestamp;

// =============================================================================
// Workflow registration (v1.AdminService)
// =============================================================================

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateWorkflowVersionRequest {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub description: String,
    #[prost(string, tag = "3")]
    pub version: String,
    #[prost(string, repeated, tag = "4")]
    pub event_triggers: Vec<String>,
    #[prost(string, repeated, tag = "5")]
    pub cron_triggers: Vec<String>,
    #[prost(message, repeated, tag = "6")]
    pub tasks: Vec<CreateTaskOpts>,
    #[prost(message, optional, tag = "7")]
    pub concurrency: Option<Concurrency>,
    #[prost(string, optional, tag = "8")]
    pub cron_input: Option<String>,
    #[prost(message, optional, tag = "9")]
    pub on_failure_task: Option<CreateTaskOpts>,
    #[prost(enumeration = "StickyStrategy", optional, tag = "10")]
    pub sticky: Option<i32>,
    #[prost(int32, optional, tag = "11")]
    pub default_priority: Option<i32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateTaskOpts {
    #[prost(string, tag = "1")]
    pub readable_id: String,
    #[prost(string, tag = "2")]
    pub action: String,
    #[prost(string, tag = "3")]
    pub timeout: String,
    #[prost(string, tag = "4")]
    pub inputs: String,
    #[prost(string, repeated, tag = "5")]
    pub parents: Vec<String>,
    #[prost(int32, tag = "6")]
    pub retries: i32,
    #[prost(float, optional, tag = "9")]
    pub backoff_factor: Option<f32>,
    #[prost(int32, optional, tag = "10")]
    pub backoff_max_seconds: Option<i32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Concurrency {
    #[prost(string, tag = "1")]
    pub expression: String,
    #[prost(int32, optional, tag = "2")]
    pub max_runs: Option<i32>,
    #[prost(enumeration = "ConcurrencyLimitStrategy", optional, tag = "3")]
    pub limit_strategy: Option<i32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ConcurrencyLimitStrategy {
    CancelInProgress = 0,
    DropNewest = 1,
    QueueNewest = 2,
    GroupRoundRobin = 3,
    CancelNewest = 4,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum StickyStrategy {
    Soft = 0,
    Hard = 1,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateWorkflowVersionResponse {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub workflow_id: String,
}

// =============================================================================
// Rate limits
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum RateLimitDuration {
    Second = 0,
    Minute = 1,
    Hour = 2,
    Day = 3,
    Week = 4,
    Month = 5,
    Year = 6,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PutRateLimitRequest {
    #[prost(string, tag = "1")]
    pub key: String,
    #[prost(int32, tag = "2")]
    pub limit: i32,
    #[prost(enumeration = "RateLimitDuration", tag = "3")]
    pub duration: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PutRateLimitResponse {}

// =============================================================================
// Scheduling
// =============================================================================

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ScheduleWorkflowRequest {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(message, repeated, tag = "2")]
    pub schedules: Vec<Timestamp>,
    #[prost(string, tag = "3")]
    pub input: String,
    #[prost(string, optional, tag = "4")]
    pub parent_id: Option<String>,
    #[prost(string, optional, tag = "5")]
    pub parent_step_run_id: Option<String>,
    #[prost(int32, optional, tag = "6")]
    pub child_index: Option<i32>,
    #[prost(string, optional, tag = "7")]
    pub child_key: Option<String>,
    #[prost(string, optional, tag = "8")]
    pub additional_metadata: Option<String>,
    #[prost(int32, optional, tag = "9")]
    pub priority: Option<i32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WorkflowVersion {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(message, optional, tag = "2")]
    pub created_at: Option<Timestamp>,
    #[prost(message, optional, tag = "3")]
    pub updated_at: Option<Timestamp>,
    #[prost(string, tag = "5")]
    pub version: String,
    #[prost(int32, tag = "6")]
    pub order: i32,
    #[prost(string, tag = "7")]
    pub workflow_id: String,
}

// =============================================================================
// Triggering
// =============================================================================

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TriggerWorkflowRequest {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub input: String,
    #[prost(string, optional, tag = "3")]
    pub parent_id: Option<String>,
    #[prost(string, optional, tag = "4")]
    pub parent_step_run_id: Option<String>,
    #[prost(int32, optional, tag = "5")]
    pub child_index: Option<i32>,
    #[prost(string, optional, tag = "6")]
    pub child_key: Option<String>,
    #[prost(string, optional, tag = "7")]
    pub additional_metadata: Option<String>,
    #[prost(string, optional, tag = "8")]
    pub desired_worker_id: Option<String>,
    #[prost(int32, optional, tag = "9")]
    pub priority: Option<i32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TriggerWorkflowResponse {
    #[prost(string, tag = "1")]
    pub workflow_run_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BulkTriggerWorkflowRequest {
    #[prost(message, repeated, tag = "1")]
    pub workflows: Vec<TriggerWorkflowRequest>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BulkTriggerWorkflowResponse {
    #[prost(string, repeated, tag = "1")]
    pub workflow_run_ids: Vec<String>,
}
