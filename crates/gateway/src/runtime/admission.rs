//! Per-(project, agent) admission control.
//!
//! Admission is advisory, not a lock: a race may admit two tasks, and the
//! worker's idempotent status writes tolerate that. The API layer surfaces
//! a rejection as HTTP 429.

use std::sync::Arc;

use arbor_store::Store;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AdmissionGate
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct AdmissionGate {
    store: Arc<Store>,
}

impl AdmissionGate {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Number of assistant tasks still in `{queued, processing}` for the
    /// pair.
    pub fn active_task_count(&self, project_id: &str, agent_id: &str) -> usize {
        self.store.active_assistant_tasks(project_id, agent_id)
    }

    /// The admission predicate: at most one live assistant task per
    /// `(project, agent)`.
    pub fn has_active_task(&self, project_id: &str, agent_id: &str) -> bool {
        self.active_task_count(project_id, agent_id) > 0
    }
}
