//! # NodeFlow Context
//!
//! Default execution context handed to every step and handler of a run.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

#[cfg(test)]
mod tests;

/// Cloneable handle to shared run state.
///
/// Clones share the same variables, so a context bound to a flow and the
/// copies handed to steps all observe each other's writes. Steps run
/// synchronously, so the state sits behind a blocking mutex.
#[derive(Debug, Clone)]
pub struct FlowContext {
    pub trace_id: String,
    state: Arc<Mutex<ContextState>>,
}

#[derive(Debug, Default)]
struct ContextState {
    variables: HashMap<String, String>,
    snapshots: HashMap<String, HashMap<String, String>>,
}

impl Default for FlowContext {
    fn default() -> Self {
        Self::new_with_trace_id(Uuid::new_v4().to_string())
    }
}

impl FlowContext {
    pub fn new_with_trace_id(trace_id: String) -> Self {
        Self {
            trace_id,
            state: Arc::new(Mutex::new(ContextState::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, ContextState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_variable(&self, key: impl Into<String>, value: impl Into<String>) {
        let (key, value) = (key.into(), value.into());
        tracing::debug!(trace_id = %self.trace_id, key = %key, value = %value, "set variable");

        self.state().variables.insert(key, value);
    }

    pub fn get_variable(&self, key: &str) -> Option<String> {
        self.state().variables.get(key).cloned()
    }

    pub fn remove_variable(&self, key: &str) -> Option<String> {
        self.state().variables.remove(key)
    }

    /// Adds one to an integer variable (missing or non-numeric counts as 0)
    /// and returns the new value.
    pub fn increment(&self, key: &str) -> i64 {
        let mut state = self.state();
        let next = state
            .variables
            .get(key)
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(0)
            + 1;
        state.variables.insert(key.to_string(), next.to_string());
        next
    }

    /// Copy of all variables.
    pub fn variables(&self) -> HashMap<String, String> {
        self.state().variables.clone()
    }

    /// 创建快照
    pub fn create_snapshot(&self, snapshot_id: &str) -> Result<(), String> {
        let mut state = self.state();
        if state.snapshots.contains_key(snapshot_id) {
            return Err(format!("Snapshot with id '{snapshot_id}' already exists"));
        }

        let variables = state.variables.clone();
        state.snapshots.insert(snapshot_id.to_string(), variables);

        tracing::info!(trace_id = %self.trace_id, snapshot = %snapshot_id, "Created snapshot");

        Ok(())
    }

    /// 回滚到快照
    pub fn rollback_to_snapshot(&self, snapshot_id: &str) -> Result<(), String> {
        let mut state = self.state();
        let snapshot = state
            .snapshots
            .get(snapshot_id)
            .ok_or_else(|| format!("Snapshot '{snapshot_id}' not found"))?
            .clone();

        let old_variables_count = state.variables.len();
        state.variables = snapshot;

        tracing::info!(
            trace_id = %self.trace_id,
            snapshot = %snapshot_id,
            old_variables = old_variables_count,
            new_variables = state.variables.len(),
            "Rolled back to snapshot"
        );

        Ok(())
    }

    /// 删除快照
    pub fn remove_snapshot(&self, snapshot_id: &str) -> Result<(), String> {
        self.state()
            .snapshots
            .remove(snapshot_id)
            .ok_or_else(|| format!("Snapshot '{snapshot_id}' not found"))?;

        tracing::info!(trace_id = %self.trace_id, snapshot = %snapshot_id, "Removed snapshot");

        Ok(())
    }
}
