//! Child workflow spawning from inside a running step.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::AdminClient;
use crate::context::ExecutionContext;
use crate::error::{DispatchError, DispatchResult};
use crate::options::{AdditionalMetadata, TriggerWorkflowOptions, WorkflowRunTriggerConfig};
use crate::run_ref::WorkflowRunRef;

/// Options a step may set on the children it spawns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChildTriggerWorkflowOptions {
    pub additional_metadata: AdditionalMetadata,
    /// Run the child on the same worker as the spawning step.
    pub sticky: bool,
}

/// One child of a [`StepSpawner::spawn_workflows`] batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildWorkflowRun {
    pub workflow_name: String,
    pub input: Value,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub options: ChildTriggerWorkflowOptions,
}

/// Spawns child workflows of the step described by an [`ExecutionContext`].
///
/// Children are linked to the step's run and step run. Spawn indices come
/// from the client's allocator, so replays of the step issue the same
/// sequence of indices.
#[derive(Debug)]
pub struct StepSpawner<'a> {
    client: &'a AdminClient,
    ctx: ExecutionContext,
}

impl<'a> StepSpawner<'a> {
    pub fn new(client: &'a AdminClient, ctx: ExecutionContext) -> Self {
        Self { client, ctx }
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.ctx
    }

    fn trigger_options(
        &self,
        key: Option<String>,
        options: ChildTriggerWorkflowOptions,
    ) -> TriggerWorkflowOptions {
        TriggerWorkflowOptions {
            parent_id: self.ctx.workflow_run_id().map(str::to_string),
            parent_step_run_id: self.ctx.step_run_id().map(str::to_string),
            child_key: key,
            sticky: options.sticky,
            additional_metadata: options.additional_metadata,
            ..Default::default()
        }
    }

    pub async fn spawn_workflow<I: Serialize + Sync + ?Sized>(
        &self,
        workflow_name: &str,
        input: &I,
        key: Option<String>,
        options: ChildTriggerWorkflowOptions,
    ) -> DispatchResult<WorkflowRunRef> {
        let options = self.trigger_options(key, options);
        self.client
            .run_workflow(&self.ctx, workflow_name, input, &options)
            .await
    }

    /// Spawns a batch of children in one call.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::NoChildWorkflows`] for an empty batch.
    pub async fn spawn_workflows(
        &self,
        children: Vec<ChildWorkflowRun>,
    ) -> DispatchResult<Vec<WorkflowRunRef>> {
        if children.is_empty() {
            return Err(DispatchError::NoChildWorkflows);
        }
        let workflows: Vec<_> = children
            .into_iter()
            .map(|child| {
                WorkflowRunTriggerConfig::new(child.workflow_name, child.input)
                    .with_options(self.trigger_options(child.key, child.options))
            })
            .collect();
        self.client.run_workflows(&self.ctx, &workflows).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::config::ClientConfig;
    use crate::proto::{BulkTriggerWorkflowResponse, TriggerWorkflowResponse};
    use crate::service::MockWorkflowService;

    fn client(service: MockWorkflowService) -> AdminClient {
        AdminClient::builder()
            .config(ClientConfig::new("token"))
            .service(Arc::new(service))
            .build()
            .expect("client builds")
    }

    fn step() -> ExecutionContext {
        ExecutionContext::new("run-parent", "step-1", "worker-9")
    }

    #[tokio::test]
    async fn test_empty_batch_is_rejected_without_a_call() {
        let mut service = MockWorkflowService::new();
        service.expect_bulk_trigger_workflow().never();
        let client = client(service);

        let err = StepSpawner::new(&client, step())
            .spawn_workflows(Vec::new())
            .await
            .expect_err("empty batch");
        assert!(matches!(err, DispatchError::NoChildWorkflows), "{err:?}");
        assert_eq!(client.spawn_indices().peek("run-parent"), None);
    }

    #[tokio::test]
    async fn test_sticky_child_is_pinned_and_linked() {
        let mut service = MockWorkflowService::new();
        service
            .expect_trigger_workflow()
            .withf(|req| {
                req.parent_id.as_deref() == Some("run-parent")
                    && req.parent_step_run_id.as_deref() == Some("step-1")
                    && req.desired_worker_id.as_deref() == Some("worker-9")
                    && req.child_key.as_deref() == Some("charge")
                    && req.child_index == Some(0)
            })
            .times(1)
            .returning(|_| {
                Ok(TriggerWorkflowResponse {
                    workflow_run_id: "child-1".to_string(),
                })
            });
        let client = client(service);

        let run = StepSpawner::new(&client, step())
            .spawn_workflow(
                "charge-card",
                &json!({"amount": 5}),
                Some("charge".to_string()),
                ChildTriggerWorkflowOptions {
                    sticky: true,
                    ..Default::default()
                },
            )
            .await
            .expect("spawned");
        assert_eq!(run.workflow_run_id(), "child-1");
    }

    #[tokio::test]
    async fn test_batch_children_get_consecutive_indices() {
        let mut service = MockWorkflowService::new();
        service
            .expect_bulk_trigger_workflow()
            .withf(|req| {
                let indices: Vec<_> = req.workflows.iter().map(|w| w.child_index).collect();
                indices == vec![Some(0), Some(1)]
                    && req.workflows.iter().all(|w| w.desired_worker_id.is_none())
            })
            .times(1)
            .returning(|_| {
                Ok(BulkTriggerWorkflowResponse {
                    workflow_run_ids: vec!["a".to_string(), "b".to_string()],
                })
            });
        let client = client(service);

        let runs = StepSpawner::new(&client, step())
            .spawn_workflows(vec![
                ChildWorkflowRun {
                    workflow_name: "a".to_string(),
                    input: json!({}),
                    key: None,
                    options: ChildTriggerWorkflowOptions::default(),
                },
                ChildWorkflowRun {
                    workflow_name: "b".to_string(),
                    input: json!({}),
                    key: Some("b-key".to_string()),
                    options: ChildTriggerWorkflowOptions::default(),
                },
            ])
            .await
            .expect("spawned");
        assert_eq!(runs.len(), 2);
        assert_eq!(client.spawn_indices().peek("run-parent"), Some(2));
    }
}
