use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{impl_document, new_id};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Conversation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A multi-turn thread. The `session_id` mirrors the cache entry so the
/// thread can resume server-side history after a cache miss.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub project_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub message_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
impl_document!(Conversation);

impl Conversation {
    pub fn new(id: &str, project_id: &str, agent_id: Option<&str>) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            project_id: project_id.to_string(),
            agent_id: agent_id.map(str::to_string),
            message_ids: Vec::new(),
            session_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One SSE-visible event row, kept for audit/replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    /// SSE event type (`message_chunk`, `tool_use`, `tool_result`,
    /// `result`, `error`).
    pub event_type: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
impl_document!(Message);

impl Message {
    pub fn new(conversation_id: &str, event_type: &str, payload: Value) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            conversation_id: conversation_id.to_string(),
            event_type: event_type.to_string(),
            payload,
            created_at: now,
            updated_at: now,
        }
    }
}
