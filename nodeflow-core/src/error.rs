use thiserror::Error;

/// Errors observed by a flow's `on_error` handlers or returned from a run.
#[derive(Debug, Error)]
pub enum FlowError {
    /// Returned by a sync step or handed to a step's completion.
    #[error(transparent)]
    Action(#[from] anyhow::Error),

    /// A `goto` whose name is not registered in any reachable label scope.
    #[error("goto target not found: {0}")]
    LabelNotFound(String),

    /// `run_bound` was called on a lineage that never had a context bound.
    #[error("no context bound to this flow; pass one to `run` or call `bind` first")]
    Unbound,

    /// The task driving the run panicked or was torn down by the runtime.
    #[error("flow run aborted: {0}")]
    Aborted(String),
}

impl FlowError {
    pub fn is_label_not_found(&self) -> bool {
        matches!(self, FlowError::LabelNotFound(_))
    }

    /// The underlying step error, if this came from a step.
    pub fn action_error(&self) -> Option<&anyhow::Error> {
        match self {
            FlowError::Action(err) => Some(err),
            _ => None,
        }
    }
}

pub type Result<T, E = FlowError> = std::result::Result<T, E>;
