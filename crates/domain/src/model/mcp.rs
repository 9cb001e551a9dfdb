use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{impl_document, new_id};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// MCP gateway
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Groups MCP tools published from a project's agents behind one API key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpGateway {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub api_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
impl_document!(McpGateway);

impl McpGateway {
    pub fn new(project_id: &str, name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            project_id: project_id.to_string(),
            name: name.to_string(),
            api_key: format!("gw_{}", uuid::Uuid::new_v4().simple()),
            created_at: now,
            updated_at: now,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// MCP tool
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum McpToolStatus {
    Generating,
    Ready,
    Failed,
}

/// An MCP tool derived from a source agent. Created `generating`; the
/// metadata orchestrator flips it to `ready` (or `failed`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpTool {
    pub id: String,
    pub gateway_id: String,
    /// The agent this tool fronts.
    pub agent_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub description: String,
    /// JSON Schema for the tool's input. Populated when `status = ready`.
    #[serde(default)]
    pub input_schema: Value,
    #[serde(default)]
    pub output_format: String,
    pub status: McpToolStatus,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub metadata: serde_json::Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
impl_document!(McpTool);

impl McpTool {
    pub fn new(gateway_id: &str, agent_id: &str, tool_name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            gateway_id: gateway_id.to_string(),
            agent_id: agent_id.to_string(),
            tool_name: tool_name.to_string(),
            description: String::new(),
            input_schema: Value::Null,
            output_format: String::new(),
            status: McpToolStatus::Generating,
            enabled: false,
            metadata: serde_json::Map::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// One invocation of a published MCP tool (audit record).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub id: String,
    pub tool_id: String,
    #[serde(default)]
    pub arguments: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
impl_document!(ToolInvocation);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_tool_starts_generating_and_disabled() {
        let tool = McpTool::new("gw-1", "agent-1", "summarize");
        assert_eq!(tool.status, McpToolStatus::Generating);
        assert!(!tool.enabled);
        assert!(tool.input_schema.is_null());
    }

    #[test]
    fn gateway_mints_api_key() {
        let gw = McpGateway::new("proj", "main");
        assert!(gw.api_key.starts_with("gw_"));
        assert!(gw.api_key.len() > 10);
    }

    #[test]
    fn tool_status_serialization() {
        assert_eq!(
            serde_json::to_string(&McpToolStatus::Generating).unwrap(),
            "\"generating\""
        );
    }
}
