//! Assembly of transport requests from caller options.
//!
//! Nothing in here touches the network. The only side effect is spawn index
//! allocation for triggers that do not carry an explicit `child_index`.

use prost::Message;
use serde::Serialize;

use crate::context::{ExecutionContext, non_empty};
use crate::error::{DispatchError, DispatchResult};
use crate::options::{
    AdditionalMetadata, Schedule, ScheduleTriggerWorkflowOptions, TriggerWorkflowOptions,
    WorkflowRunTriggerConfig,
};
use crate::proto::{CreateWorkflowVersionRequest, ScheduleWorkflowRequest, TriggerWorkflowRequest};
use crate::spawn_index::SpawnIndexTable;

/// Prefixes `name` with the effective namespace.
///
/// The effective namespace is `namespace_override` when set, otherwise the
/// client namespace. Names that already start with the client namespace are
/// returned unchanged; with an empty client namespace that is every name, so
/// an override only applies to clients that have a namespace of their own.
/// Names already carrying the effective namespace are also left alone, which
/// makes qualifying twice a no-op.
pub fn qualify_workflow_name(
    name: &str,
    namespace_override: Option<&str>,
    client_namespace: &str,
) -> String {
    let namespace = non_empty(namespace_override).unwrap_or(client_namespace);
    let already_qualified = name.starts_with(namespace) || name.starts_with(client_namespace);
    if namespace.is_empty() || already_qualified {
        name.to_string()
    } else {
        format!("{namespace}{name}")
    }
}

/// Builds trigger requests for one client.
pub struct TriggerRequestBuilder<'a> {
    namespace: &'a str,
    spawn_indices: &'a SpawnIndexTable,
}

/// A trigger with everything resolved except, possibly, its spawn index.
struct PreparedTrigger {
    request: TriggerWorkflowRequest,
    needs_index: bool,
}

impl<'a> TriggerRequestBuilder<'a> {
    pub fn new(namespace: &'a str, spawn_indices: &'a SpawnIndexTable) -> Self {
        Self {
            namespace,
            spawn_indices,
        }
    }

    /// Builds a single trigger request, allocating a spawn index for the
    /// calling run unless `options.child_index` is set.
    pub fn build<I: Serialize + ?Sized>(
        &self,
        workflow_name: &str,
        input: &I,
        options: &TriggerWorkflowOptions,
        ctx: &ExecutionContext,
    ) -> DispatchResult<TriggerWorkflowRequest> {
        let PreparedTrigger {
            mut request,
            needs_index,
        } = self.prepare(workflow_name, input, options, ctx)?;
        if needs_index {
            let index = self.spawn_indices.allocate(ctx.workflow_run_id());
            request.child_index = Some(wire_index(index)?);
        }
        Ok(request)
    }

    /// Builds every request of a bulk trigger.
    ///
    /// All items are serialized before any index is allocated, and the
    /// indices for the batch are reserved in one step, so a batch always
    /// receives a contiguous run of indices in item order.
    pub fn build_bulk(
        &self,
        workflows: &[WorkflowRunTriggerConfig],
        ctx: &ExecutionContext,
    ) -> DispatchResult<Vec<TriggerWorkflowRequest>> {
        let prepared = workflows
            .iter()
            .map(|w| self.prepare(&w.workflow_name, &w.input, &w.options, ctx))
            .collect::<DispatchResult<Vec<_>>>()?;

        let needed = prepared.iter().filter(|p| p.needs_index).count();
        let needed = u32::try_from(needed).map_err(|_| {
            DispatchError::Validation(format!("Too many workflows in one batch: {needed}"))
        })?;
        let mut reserved = self.spawn_indices.reserve(ctx.workflow_run_id(), needed);

        let mut requests = Vec::with_capacity(prepared.len());
        for PreparedTrigger {
            mut request,
            needs_index,
        } in prepared
        {
            if needs_index && let Some(index) = reserved.next() {
                request.child_index = Some(wire_index(index)?);
            }
            requests.push(request);
        }
        Ok(requests)
    }

    fn prepare<I: Serialize + ?Sized>(
        &self,
        workflow_name: &str,
        input: &I,
        options: &TriggerWorkflowOptions,
        ctx: &ExecutionContext,
    ) -> DispatchResult<PreparedTrigger> {
        let input = serde_json::to_string(input)?;
        let additional_metadata = serialize_metadata(&options.additional_metadata)?;

        let parent_id = non_empty(options.parent_id.as_deref()).or(ctx.workflow_run_id());
        let parent_step_run_id =
            non_empty(options.parent_step_run_id.as_deref()).or(ctx.step_run_id());
        let desired_worker_id = if options.sticky {
            non_empty(options.desired_worker_id.as_deref()).or(ctx.worker_id())
        } else {
            None
        };
        let child_key = non_empty(options.child_key.as_deref()).or(non_empty(options.key.as_deref()));
        let child_index = options.child_index.map(wire_index).transpose()?;

        let request = TriggerWorkflowRequest {
            name: qualify_workflow_name(workflow_name, options.namespace.as_deref(), self.namespace),
            input,
            parent_id: parent_id.map(str::to_string),
            parent_step_run_id: parent_step_run_id.map(str::to_string),
            child_index,
            child_key: child_key.map(str::to_string),
            additional_metadata,
            desired_worker_id: desired_worker_id.map(str::to_string),
            priority: options.priority,
        };

        Ok(PreparedTrigger {
            request,
            needs_index: child_index.is_none(),
        })
    }
}

/// Builds a schedule request. Schedules are validated before anything else.
pub fn build_schedule_request<I: Serialize + ?Sized>(
    workflow_name: &str,
    schedules: &[Schedule],
    input: &I,
    options: &ScheduleTriggerWorkflowOptions,
    client_namespace: &str,
) -> DispatchResult<ScheduleWorkflowRequest> {
    let schedules = schedules
        .iter()
        .map(Schedule::to_timestamp)
        .collect::<DispatchResult<Vec<_>>>()?;

    Ok(ScheduleWorkflowRequest {
        name: qualify_workflow_name(workflow_name, options.namespace.as_deref(), client_namespace),
        schedules,
        input: serde_json::to_string(input)?,
        parent_id: options.parent_id.clone(),
        parent_step_run_id: options.parent_step_run_id.clone(),
        child_index: options.child_index.map(wire_index).transpose()?,
        child_key: options.child_key.clone(),
        additional_metadata: serialize_metadata(&options.additional_metadata)?,
        priority: options.priority,
    })
}

/// Merges `overrides` into `definition` with protobuf merge semantics and
/// forces the workflow name.
///
/// Scalar fields set in `overrides` replace those in `definition`, repeated
/// fields are appended, and nested messages are merged recursively.
pub fn build_put_workflow_request(
    name: &str,
    mut definition: CreateWorkflowVersionRequest,
    overrides: Option<&CreateWorkflowVersionRequest>,
) -> DispatchResult<CreateWorkflowVersionRequest> {
    if let Some(overrides) = overrides {
        definition
            .merge(overrides.encode_to_vec().as_slice())
            .map_err(|e| {
                DispatchError::Validation(format!("Could not merge workflow overrides: {e}"))
            })?;
    }
    definition.name = name.to_string();
    Ok(definition)
}

fn serialize_metadata(metadata: &AdditionalMetadata) -> DispatchResult<Option<String>> {
    if metadata.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::to_string(metadata)?))
}

fn wire_index(index: u32) -> DispatchResult<i32> {
    i32::try_from(index)
        .map_err(|_| DispatchError::Validation(format!("Child index {index} is out of range")))
}
