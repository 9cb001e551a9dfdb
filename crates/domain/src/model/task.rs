use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{impl_document, new_id};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Task status
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    fn rank(self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Processing => 1,
            Self::Completed | Self::Failed => 2,
        }
    }

    /// Status writes are monotonic: queued → processing → terminal.
    /// Backward or duplicate writes must be dropped by the caller.
    pub fn can_advance_to(self, next: TaskStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskRole {
    User,
    Assistant,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Task
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The unit of work. Created in user/assistant pairs by the dispatcher;
/// only the assistant half moves through the status machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub project_id: String,
    pub agent_id: String,
    pub role: TaskRole,
    /// For the user half: the prompt. For the assistant half: the final
    /// response once complete.
    pub content: String,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_task_id: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
impl_document!(Task);

impl Task {
    pub fn user(
        project_id: &str,
        agent_id: &str,
        content: &str,
        metadata: serde_json::Map<String, Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            project_id: project_id.to_string(),
            agent_id: agent_id.to_string(),
            role: TaskRole::User,
            content: content.to_string(),
            status: TaskStatus::Queued,
            related_task_id: None,
            metadata,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The assistant half, linked back to its user task.
    pub fn assistant(
        project_id: &str,
        agent_id: &str,
        user_task_id: &str,
        metadata: serde_json::Map<String, Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            project_id: project_id.to_string(),
            agent_id: agent_id.to_string(),
            role: TaskRole::Assistant,
            content: String::new(),
            status: TaskStatus::Queued,
            related_task_id: Some(user_task_id.to_string()),
            metadata,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the task has been asked to cancel (flag set by the API layer,
    /// polled by the worker's cancellation oracle).
    pub fn cancel_requested(&self) -> bool {
        self.metadata
            .get("cancel_requested")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}
