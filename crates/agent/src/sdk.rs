use std::collections::HashMap;
use std::path::PathBuf;
use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use arbor_domain::Result;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Event model
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One content block inside an assistant message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Thinking {
        thinking: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: Value,
    },
}

/// Events the SDK emits while a query runs. The last `Text` block is the
/// provisional answer; a terminal `Result` overrides it when `result` is
/// present and carries the resumable session id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    Assistant {
        content: Vec<ContentBlock>,
    },
    Result {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<String>,
        #[serde(default)]
        duration_ms: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        #[serde(default)]
        is_error: bool,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Query options
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-query options handed to the SDK.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub model: String,
    pub max_turns: u32,
    /// Workspace working directory the query runs inside.
    pub cwd: Option<PathBuf>,
    /// Environment variable overrides injected into the sandbox.
    pub env: HashMap<String, String>,
    /// MCP server configuration passed through to the SDK.
    pub mcp_servers: serde_json::Map<String, Value>,
    /// Tool names the sandbox permits.
    pub allowed_tools: Vec<String>,
    /// Resume an upstream session (multi-turn conversations).
    pub resume_session_id: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SDK contract
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub type EventStream = Pin<Box<dyn Stream<Item = Result<AgentEvent>> + Send>>;

/// The external LLM SDK, reduced to its one operation. Every event the
/// stream yields is a suspension boundary — dropping the stream closes the
/// upstream query.
#[async_trait]
pub trait AgentSdk: Send + Sync {
    async fn query(&self, prompt: &str, options: &QueryOptions) -> Result<EventStream>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_block_tagged_serialization() {
        let block = ContentBlock::ToolUse {
            id: "tu-1".into(),
            name: "Read".into(),
            input: serde_json::json!({"path": "a.txt"}),
        };
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "tool_use");
        assert_eq!(json["name"], "Read");
    }

    #[test]
    fn result_event_round_trip() {
        let event = AgentEvent::Result {
            result: Some("hi".into()),
            duration_ms: 42,
            session_id: Some("S1".into()),
            is_error: false,
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: AgentEvent = serde_json::from_str(&json).unwrap();
        match back {
            AgentEvent::Result {
                result, session_id, ..
            } => {
                assert_eq!(result.as_deref(), Some("hi"));
                assert_eq!(session_id.as_deref(), Some("S1"));
            }
            _ => panic!("wrong variant"),
        }
    }
}
