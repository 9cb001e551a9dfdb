use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{impl_document, new_id};

/// Hard cap on agent instruction length.
pub const MAX_INSTRUCTIONS_LEN: usize = 20_000;

/// Number of prior instruction/output-format snapshots retained per agent.
pub const MAX_VERSIONS: usize = 30;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Capabilities
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Closed set of agent capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Capability {
    #[serde(rename = "Data Harmonization")]
    DataHarmonization,
    #[serde(rename = "Pipeline Optimization")]
    PipelineOptimization,
    #[serde(rename = "Business Intelligence")]
    BusinessIntelligence,
    #[serde(rename = "Feature Engineering")]
    FeatureEngineering,
    #[serde(rename = "Data Debugging")]
    DataDebugging,
    #[serde(rename = "Data Understanding")]
    DataUnderstanding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Enabled,
    Disabled,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Version log
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Snapshot of an agent's prompt state before a mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentVersion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_format: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Agent
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A prompt + output format + capability bundle scoped to one project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub project_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default)]
    pub task_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default)]
    pub output_format: String,
    pub state: AgentState,
    #[serde(default)]
    pub deployed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
    /// Open metadata map; `mcp_gateways` holds the enabled gateway links.
    #[serde(default)]
    pub metadata: serde_json::Map<String, Value>,
    /// Prior prompt snapshots, newest first, capped at [`MAX_VERSIONS`].
    #[serde(default)]
    pub versions: Vec<AgentVersion>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
impl_document!(Agent);

impl Agent {
    pub fn new(project_id: &str, name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            project_id: project_id.to_string(),
            name: name.to_string(),
            description: None,
            owner: None,
            task_count: 0,
            instructions: None,
            output_format: String::new(),
            state: AgentState::Disabled,
            deployed: false,
            api_key: None,
            capabilities: Vec::new(),
            metadata: serde_json::Map::new(),
            versions: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Snapshot the current instructions/output format into the version log
    /// before a mutation. Empty snapshots are skipped; the log stays
    /// newest-first and never exceeds [`MAX_VERSIONS`] entries.
    pub fn record_version(&mut self, updated_by: Option<&str>) {
        let instructions = self.instructions.clone().unwrap_or_default();
        if instructions.is_empty() && self.output_format.is_empty() {
            return;
        }
        let entry = AgentVersion {
            instructions: Some(instructions),
            output_format: Some(self.output_format.clone()),
            created_at: Utc::now(),
            updated_by: updated_by.map(str::to_string),
        };
        self.versions.insert(0, entry);
        self.versions.truncate(MAX_VERSIONS);
    }

    /// Append a gateway link to `metadata.mcp_gateways`, deduplicating on
    /// `(gateway_id, tool_id)`. Returns false when the link already exists.
    pub fn add_gateway_link(&mut self, gateway_id: &str, tool_id: &str) -> bool {
        let entries = self
            .metadata
            .entry("mcp_gateways".to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        let Value::Array(list) = entries else {
            *entries = Value::Array(Vec::new());
            return self.add_gateway_link(gateway_id, tool_id);
        };

        let exists = list.iter().any(|e| {
            e.get("gateway_id").and_then(Value::as_str) == Some(gateway_id)
                && e.get("tool_id").and_then(Value::as_str) == Some(tool_id)
        });
        if exists {
            return false;
        }

        list.push(serde_json::json!({
            "gateway_id": gateway_id,
            "tool_id": tool_id,
            "enabled_at": Utc::now().to_rfc3339(),
        }));
        true
    }
}

/// Reject over-long instruction text before it is stored.
pub fn validate_instructions(instructions: &str) -> crate::Result<()> {
    if instructions.len() > MAX_INSTRUCTIONS_LEN {
        return Err(crate::Error::Validation(format!(
            "instructions exceed {MAX_INSTRUCTIONS_LEN} characters"
        )));
    }
    Ok(())
}
