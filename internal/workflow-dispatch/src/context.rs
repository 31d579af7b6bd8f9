//! Execution context captured from the step that issues a trigger.

/// Identifiers of the step run a trigger is issued from.
///
/// The surrounding worker builds this from the action it is executing and
/// passes it to every trigger call. Outside of a running step, use
/// [`ExecutionContext::root`], which leaves every field empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionContext {
    pub workflow_run_id: Option<String>,
    pub step_run_id: Option<String>,
    pub worker_id: Option<String>,
}

impl ExecutionContext {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn new(
        workflow_run_id: impl Into<String>,
        step_run_id: impl Into<String>,
        worker_id: impl Into<String>,
    ) -> Self {
        Self {
            workflow_run_id: Some(workflow_run_id.into()),
            step_run_id: Some(step_run_id.into()),
            worker_id: Some(worker_id.into()),
        }
    }

    pub fn workflow_run_id(&self) -> Option<&str> {
        non_empty(self.workflow_run_id.as_deref())
    }

    pub fn step_run_id(&self) -> Option<&str> {
        non_empty(self.step_run_id.as_deref())
    }

    pub fn worker_id(&self) -> Option<&str> {
        non_empty(self.worker_id.as_deref())
    }

    /// Whether this context belongs to a running step.
    pub fn is_root(&self) -> bool {
        self.workflow_run_id().is_none()
    }
}

/// Treats empty strings the same as missing values.
pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
