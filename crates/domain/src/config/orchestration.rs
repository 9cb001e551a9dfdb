use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Orchestrator wiring
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Agent/project identities the background orchestrators depend on.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OrchestrationConfig {
    /// Dedicated agent that synthesizes MCP tool metadata.
    #[serde(default)]
    pub metadata_agent_id: Option<String>,
    /// Project hosting the metadata synthesis agent.
    #[serde(default)]
    pub metadata_project_id: Option<String>,
    /// Project hosting per-tenant documentation agents.
    #[serde(default)]
    pub docs_project_id: Option<String>,
    /// Agent used to grade evaluation test cases.
    #[serde(default)]
    pub grading_agent_id: Option<String>,
    /// Project hosting the grading agent.
    #[serde(default)]
    pub grading_project_id: Option<String>,
}

impl OrchestrationConfig {
    pub fn from_env() -> Self {
        let read = |var: &str| std::env::var(var).ok().filter(|v| !v.is_empty());
        Self {
            metadata_agent_id: read("MCP_TOOL_METADATA_GENERATION_AGENT_ID"),
            metadata_project_id: read("MCP_TOOL_METADATA_GENERATION_PROJECT_ID"),
            docs_project_id: read("DOCUMENTATION_PROJECT_ID"),
            grading_agent_id: read("GRADING_AGENT_ID"),
            grading_project_id: read("GRADING_PROJECT_ID"),
        }
    }
}
