//! Handles to dispatched workflow runs.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;

use crate::error::DispatchError;
use crate::listener::{
    PooledWorkflowRunListener, RunEventListenerClient, RunSubscription, WorkflowRunEventKind,
};

/// Handle to a dispatched workflow run.
///
/// The listeners are shared with the client that produced this handle;
/// dropping the handle does not affect them.
#[derive(Debug, Clone)]
pub struct WorkflowRunRef {
    workflow_run_id: String,
    workflow_listener: Arc<PooledWorkflowRunListener>,
    workflow_run_event_listener: Arc<RunEventListenerClient>,
}

impl WorkflowRunRef {
    pub(crate) fn new(
        workflow_run_id: String,
        workflow_listener: Arc<PooledWorkflowRunListener>,
        workflow_run_event_listener: Arc<RunEventListenerClient>,
    ) -> Self {
        Self {
            workflow_run_id,
            workflow_listener,
            workflow_run_event_listener,
        }
    }

    pub fn workflow_run_id(&self) -> &str {
        &self.workflow_run_id
    }

    pub fn listener(&self) -> &Arc<PooledWorkflowRunListener> {
        &self.workflow_listener
    }

    pub fn event_listener(&self) -> &RunEventListenerClient {
        &self.workflow_run_event_listener
    }

    /// Subscribes to the events of this run on the pooled listener.
    pub fn subscribe(&self) -> RunSubscription {
        self.workflow_listener.subscribe(&self.workflow_run_id)
    }

    /// Waits for the run to finish and returns its output.
    ///
    /// Resolves once whoever consumes the service's event stream publishes a
    /// terminal event for this run on the pooled listener. Dropping the
    /// future stops observing the run.
    pub async fn result(&self) -> Result<Value, DispatchError> {
        let mut events = self.subscribe();
        loop {
            match events.recv().await {
                Ok(event) => match event.kind {
                    WorkflowRunEventKind::Started => {}
                    WorkflowRunEventKind::Completed { output } => return Ok(output),
                    WorkflowRunEventKind::Failed { error } => {
                        return Err(DispatchError::RunFailed {
                            workflow_run_id: self.workflow_run_id.clone(),
                            error,
                        });
                    }
                    WorkflowRunEventKind::Cancelled => {
                        return Err(DispatchError::RunCancelled(self.workflow_run_id.clone()));
                    }
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        workflow_run_id = %self.workflow_run_id,
                        skipped,
                        "Workflow run observer lagged behind"
                    );
                }
                Err(RecvError::Closed) => {
                    return Err(DispatchError::ListenerClosed(self.workflow_run_id.clone()));
                }
            }
        }
    }
}
