use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const AGENT_TASK_QUEUE: &str = "agent.task";
pub const TRAINING_JOB_QUEUE: &str = "training.job";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Queue payloads
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Carrier for one dispatched task pair. Consumers observe the pair
/// already persisted — the dispatcher publishes after both inserts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTaskMessage {
    /// The user task holding the prompt.
    pub task_id: String,
    /// The assistant task the worker drives through the status machine.
    pub assistant_task_id: String,
    pub agent_id: String,
    /// Lower-cased project id.
    pub project_id: String,
    pub content: String,
    /// Task metadata, preserved end to end (orchestrator correlation ids
    /// ride here).
    #[serde(default)]
    pub metadata: serde_json::Map<String, Value>,
}

/// Carrier for one long-running data-scan job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingJobMessage {
    pub training_id: String,
    pub project_id: String,
    pub project_name: String,
    #[serde(default)]
    pub data_source_ids: Vec<String>,
}
