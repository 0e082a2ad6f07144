//! # NodeFlow Logger
//!
//! Logging and tracing support for NodeFlow flows

use nodeflow_context::FlowContext;
use nodeflow_core::FlowError;
use std::fmt::Debug;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[cfg(test)]
mod tests;

/// Logger for NodeFlow flows
pub struct Logger {
    pub trace_id: String,
}

impl Logger {
    /// Create a new logger
    pub fn new() -> Self {
        Self {
            trace_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create a logger with a specific trace ID
    pub fn with_trace_id(trace_id: String) -> Self {
        Self { trace_id }
    }

    /// Create a logger that reports under a context's trace ID
    pub fn for_context(context: &FlowContext) -> Self {
        Self::with_trace_id(context.trace_id.clone())
    }

    /// Install a fmt subscriber filtered by `RUST_LOG`.
    ///
    /// Returns `false` when a global subscriber was already installed.
    pub fn init_tracing() -> bool {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init()
            .is_ok()
    }

    pub fn info(&self, message: &str) {
        info!(trace_id = %self.trace_id, "{}", message);
    }

    pub fn warn(&self, message: &str) {
        warn!(trace_id = %self.trace_id, "{}", message);
    }

    pub fn error(&self, message: &str) {
        error!(trace_id = %self.trace_id, "{}", message);
    }

    pub fn debug(&self, message: &str) {
        debug!(trace_id = %self.trace_id, "{}", message);
    }

    /// An `on_error` handler that logs every error it observes.
    pub fn error_handler<C: 'static>(&self) -> impl Fn(&FlowError, &C) + Send + Sync + 'static {
        let trace_id = self.trace_id.clone();
        move |err: &FlowError, _ctx: &C| {
            if err.is_label_not_found() {
                error!(trace_id = %trace_id, error = %err, "flow jumped to an unknown label");
            } else {
                error!(trace_id = %trace_id, error = %err, "flow step failed");
            }
        }
    }

    /// An `always` handler that logs how each chain segment ended.
    pub fn cleanup_handler<V, C>(&self) -> impl Fn(Option<&V>, &C) + Send + Sync + 'static
    where
        V: Debug + 'static,
        C: 'static,
    {
        let trace_id = self.trace_id.clone();
        move |value: Option<&V>, _ctx: &C| match value {
            Some(value) => info!(trace_id = %trace_id, value = ?value, "flow segment completed"),
            None => warn!(trace_id = %trace_id, "flow segment ended without a value"),
        }
    }

    /// Log the variables held by a context
    pub fn log_context_summary(&self, context: &FlowContext) {
        let variables = context.variables();
        info!(
            trace_id = %context.trace_id,
            variables = variables.len(),
            "Flow context summary"
        );

        let mut keys: Vec<_> = variables.keys().collect();
        keys.sort();
        for key in keys {
            debug!(trace_id = %context.trace_id, key = %key, value = %variables[key]);
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}
