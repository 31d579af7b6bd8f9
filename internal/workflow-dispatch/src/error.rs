//! Error types for the workflow dispatch client.

use thiserror::Error;
use tonic::Code;

/// Errors that can occur when dispatching workflows.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The input payload or metadata could not be serialized to JSON.
    #[error("Error encoding payload: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The service rejected the request because a run (or schedule) with the
    /// same deduplication value already exists.
    #[error("Deduplication violation: {0}")]
    DedupeViolation(String),

    /// Any other failure returned by the transport.
    #[error("Transport error ({}): {}", .0.code(), .0.message())]
    Transport(Box<tonic::Status>),

    /// A caller-supplied value was rejected before any call was made.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing or invalid client configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The service endpoint could not be parsed or configured.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(#[from] tonic::transport::Error),

    /// The runtime backing the blocking client could not be created.
    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),

    /// A batch spawn was requested with nothing in it.
    #[error("no child workflows to spawn")]
    NoChildWorkflows,

    /// The observed workflow run finished with an error.
    #[error("Workflow run {workflow_run_id} failed: {error}")]
    RunFailed {
        workflow_run_id: String,
        error: String,
    },

    /// The observed workflow run was cancelled.
    #[error("Workflow run {0} was cancelled")]
    RunCancelled(String),

    /// The pooled listener stopped delivering events for a run.
    #[error("Listener closed before workflow run {0} finished")]
    ListenerClosed(String),
}

impl DispatchError {
    /// Classifies a transport status.
    ///
    /// `ALREADY_EXISTS` is the service's conflict signal for deduplicated
    /// triggers and schedules, so it becomes [`DispatchError::DedupeViolation`]
    /// carrying the status message verbatim.
    pub fn from_status(status: tonic::Status) -> Self {
        if status.code() == Code::AlreadyExists {
            Self::DedupeViolation(status.message().to_string())
        } else {
            Self::Transport(Box::new(status))
        }
    }

    pub fn is_dedupe_violation(&self) -> bool {
        matches!(self, Self::DedupeViolation(_))
    }

    /// Returns the transport status code, if this error came from the transport.
    pub fn status_code(&self) -> Option<Code> {
        match self {
            Self::Transport(status) => Some(status.code()),
            Self::DedupeViolation(_) => Some(Code::AlreadyExists),
            _ => None,
        }
    }

    /// Whether the retry policy may attempt the call again.
    ///
    /// Only transient transport failures qualify. Deduplication conflicts and
    /// local build errors are surfaced immediately.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(status) => matches!(
                status.code(),
                Code::Unavailable
                    | Code::DeadlineExceeded
                    | Code::ResourceExhausted
                    | Code::Aborted
                    | Code::Internal
                    | Code::Unknown
            ),
            _ => false,
        }
    }
}

impl From<tonic::Status> for DispatchError {
    fn from(status: tonic::Status) -> Self {
        Self::from_status(status)
    }
}

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;
