//! Agent management: create, update (with version snapshots), and the
//! version history view.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use serde_json::Value;

use arbor_domain::model::{validate_instructions, Agent, AgentState, Capability};

use crate::state::AppState;

use super::error_response;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /projects/:id/agents
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct AgentCreate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub output_format: Option<String>,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
    #[serde(default)]
    pub metadata: Option<serde_json::Map<String, Value>>,
}

pub async fn create_agent(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(body): Json<AgentCreate>,
) -> impl IntoResponse {
    if state.store.projects.get(&project_id).is_none() {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("project '{project_id}' not found") })),
        )
            .into_response();
    }
    if body.name.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "agent name must not be empty" })),
        )
            .into_response();
    }
    if let Some(instructions) = &body.instructions {
        if let Err(e) = validate_instructions(instructions) {
            return error_response(&e).into_response();
        }
    }

    let mut agent = Agent::new(&project_id, body.name.trim());
    agent.description = body.description;
    agent.instructions = body.instructions;
    agent.output_format = body.output_format.unwrap_or_default();
    agent.capabilities = body.capabilities;
    if let Some(metadata) = body.metadata {
        agent.metadata = metadata;
    }

    match state.store.agents.insert(agent.clone()) {
        Ok(_) => (StatusCode::CREATED, Json(serde_json::json!(agent))).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// PATCH /projects/:id/agents/:id
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct AgentUpdate {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub output_format: Option<String>,
    #[serde(default)]
    pub state: Option<AgentState>,
    #[serde(default)]
    pub deployed: Option<bool>,
    #[serde(default)]
    pub capabilities: Option<Vec<Capability>>,
    /// Recorded on the version snapshot.
    #[serde(default)]
    pub updated_by: Option<String>,
}

pub async fn update_agent(
    State(state): State<AppState>,
    Path((project_id, agent_id)): Path<(String, String)>,
    Json(body): Json<AgentUpdate>,
) -> impl IntoResponse {
    match state.store.agent_in_project(&project_id, &agent_id) {
        Ok(_) => {}
        Err(e) => return error_response(&e).into_response(),
    }
    if let Some(instructions) = &body.instructions {
        if let Err(e) = validate_instructions(instructions) {
            return error_response(&e).into_response();
        }
    }

    // A prompt mutation snapshots the previous state first.
    let prompt_changed = body.instructions.is_some() || body.output_format.is_some();
    state.store.agents.update(&agent_id, |agent| {
        if prompt_changed {
            agent.record_version(body.updated_by.as_deref());
        }
        if let Some(description) = body.description.clone() {
            agent.description = Some(description);
        }
        if let Some(instructions) = body.instructions.clone() {
            agent.instructions = Some(instructions);
        }
        if let Some(output_format) = body.output_format.clone() {
            agent.output_format = output_format;
        }
        if let Some(agent_state) = body.state {
            agent.state = agent_state;
        }
        if let Some(deployed) = body.deployed {
            agent.deployed = deployed;
        }
        if let Some(capabilities) = body.capabilities.clone() {
            agent.capabilities = capabilities;
        }
    });

    match state.store.agents.get(&agent_id) {
        Some(agent) => Json(serde_json::json!(agent)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("agent '{agent_id}' not found") })),
        )
            .into_response(),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /projects/:id/agents/:id/versions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn agent_versions(
    State(state): State<AppState>,
    Path((project_id, agent_id)): Path<(String, String)>,
) -> impl IntoResponse {
    match state.store.agent_in_project(&project_id, &agent_id) {
        Ok(agent) => Json(serde_json::json!({
            "versions": agent.versions,
            "total_count": agent.versions.len(),
        }))
        .into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}
