//! Shared observers for triggered workflow runs.

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::config::ClientConfig;

/// An update about one workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRunEvent {
    pub workflow_run_id: String,
    #[serde(flatten)]
    pub kind: WorkflowRunEventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowRunEventKind {
    Started,
    Completed { output: Value },
    Failed { error: String },
    Cancelled,
}

impl WorkflowRunEventKind {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Started)
    }
}

/// Fans run events from one upstream subscription out to every local
/// observer.
///
/// One instance is shared by all [`WorkflowRunRef`](crate::WorkflowRunRef)s
/// of a client. The task reading the service's event stream calls
/// [`publish`](Self::publish); observers call [`subscribe`](Self::subscribe).
#[derive(Debug)]
pub struct PooledWorkflowRunListener {
    channels: DashMap<String, broadcast::Sender<WorkflowRunEvent>>,
    capacity: usize,
}

impl PooledWorkflowRunListener {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            channels: DashMap::new(),
            capacity: config.listener_capacity.max(1),
        }
    }

    /// Subscribes to events for `workflow_run_id`.
    ///
    /// Only events published after this call are delivered. The run's channel
    /// is dropped when its last subscription goes away.
    pub fn subscribe(self: &Arc<Self>, workflow_run_id: &str) -> RunSubscription {
        let receiver = self
            .channels
            .entry(workflow_run_id.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();
        RunSubscription {
            listener: Arc::clone(self),
            workflow_run_id: workflow_run_id.to_string(),
            receiver: Some(receiver),
        }
    }

    /// Delivers `event` to the observers of its run and returns how many
    /// received it. The channel for a run is dropped after a terminal event.
    pub fn publish(&self, event: WorkflowRunEvent) -> usize {
        let terminal = event.kind.is_terminal();
        let run_id = event.workflow_run_id.clone();
        let delivered = match self.channels.get(&run_id) {
            Some(sender) => sender.send(event).unwrap_or(0),
            None => 0,
        };
        if terminal {
            self.channels.remove(&run_id);
        }
        delivered
    }

    /// Number of runs currently being observed.
    pub fn observed_runs(&self) -> usize {
        self.channels.len()
    }

    fn release(&self, workflow_run_id: &str) {
        self.channels
            .remove_if(workflow_run_id, |_, sender| sender.receiver_count() == 0);
    }
}

/// Events of one run, as seen by one observer.
#[derive(Debug)]
pub struct RunSubscription {
    listener: Arc<PooledWorkflowRunListener>,
    workflow_run_id: String,
    // Only `None` while dropping.
    receiver: Option<broadcast::Receiver<WorkflowRunEvent>>,
}

impl RunSubscription {
    pub fn workflow_run_id(&self) -> &str {
        &self.workflow_run_id
    }

    /// Receives the next event of the run.
    ///
    /// Fails with [`RecvError::Closed`] once a terminal event has been
    /// delivered, and with [`RecvError::Lagged`] if this observer fell behind.
    pub async fn recv(&mut self) -> Result<WorkflowRunEvent, RecvError> {
        match self.receiver.as_mut() {
            Some(receiver) => receiver.recv().await,
            None => Err(RecvError::Closed),
        }
    }
}

impl Drop for RunSubscription {
    fn drop(&mut self) {
        drop(self.receiver.take());
        self.listener.release(&self.workflow_run_id);
    }
}

/// Create-once holder for the pooled listener of a client.
///
/// The first caller constructs the listener; concurrent first callers block
/// until it is ready and every caller gets the same instance. Construction
/// does not depend on any runtime, so the cell behaves the same from threads
/// and from async tasks.
#[derive(Debug, Default)]
pub struct ListenerCell {
    listener: OnceLock<Arc<PooledWorkflowRunListener>>,
}

impl ListenerCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&self, config: &ClientConfig) -> Arc<PooledWorkflowRunListener> {
        self.get_or_create_with(|| PooledWorkflowRunListener::new(config))
    }

    pub fn get_or_create_with(
        &self,
        create: impl FnOnce() -> PooledWorkflowRunListener,
    ) -> Arc<PooledWorkflowRunListener> {
        Arc::clone(self.listener.get_or_init(|| {
            tracing::debug!("Creating pooled workflow run listener");
            Arc::new(create())
        }))
    }

    /// Returns the listener if it has already been created.
    pub fn get(&self) -> Option<Arc<PooledWorkflowRunListener>> {
        self.listener.get().cloned()
    }
}

/// Client for the service's per-run event stream.
///
/// Handed to callers unmodified through
/// [`WorkflowRunRef::event_listener`](crate::WorkflowRunRef::event_listener).
#[derive(Debug, Clone)]
pub struct RunEventListenerClient {
    host_port: String,
    namespace: String,
}

impl RunEventListenerClient {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            host_port: config.host_port.clone(),
            namespace: config.namespace.clone(),
        }
    }

    pub fn host_port(&self) -> &str {
        &self.host_port
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}
