//! Workflow triggers: evaluation runs, project.md generation, and MCP
//! tool creation. Each endpoint validates ownership, records the new
//! state, and hands the long-running work to a background orchestrator.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;

use arbor_domain::model::{EvaluationRun, McpTool};
use arbor_store::parse_object_url;

use crate::runtime::{DocOrchestrator, EvalOrchestrator, ToolMetaOrchestrator};
use crate::state::AppState;

fn not_found(what: &str) -> axum::response::Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": format!("{what} not found") })),
    )
        .into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /projects/:id/evaluations/:id/runs
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn start_evaluation_run(
    State(state): State<AppState>,
    Path((project_id, evaluation_id)): Path<(String, String)>,
) -> axum::response::Response {
    let Some(evaluation) = state.store.evaluations.get(&evaluation_id) else {
        return not_found("evaluation");
    };
    if !evaluation.project_id.eq_ignore_ascii_case(&project_id) {
        return not_found("evaluation");
    }
    if evaluation.test_cases.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "evaluation has no test cases" })),
        )
            .into_response();
    }

    // The grading agent comes from configuration, defaulting to grading
    // within the evaluation's own project with the target agent's peer.
    let orchestration = &state.config.orchestration;
    let Some(grading_agent_id) = orchestration.grading_agent_id.clone() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "GRADING_AGENT_ID is not configured" })),
        )
            .into_response();
    };
    let grading_project_id = orchestration
        .grading_project_id
        .clone()
        .unwrap_or_else(|| evaluation.project_id.clone());

    let run = EvaluationRun::new(&evaluation, &grading_agent_id, &grading_project_id);
    let run_id = run.id.clone();
    if let Err(e) = state.store.evaluation_runs.insert(run) {
        return super::error_response(&e).into_response();
    }

    let orchestrator = EvalOrchestrator::new(state.store.clone(), state.dispatcher.clone());
    let spawned_run_id = run_id.clone();
    tokio::spawn(async move {
        orchestrator.run(&spawned_run_id).await;
    });

    (
        StatusCode::CREATED,
        Json(serde_json::json!({ "run_id": run_id, "status": "queued" })),
    )
        .into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /projects/:id/trainings/:id/projectmd
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn generate_projectmd(
    State(state): State<AppState>,
    Path((project_id, training_id)): Path<(String, String)>,
) -> axum::response::Response {
    let Some(training) = state.store.trainings.get(&training_id) else {
        return not_found("training");
    };
    if !training.project_id.eq_ignore_ascii_case(&project_id) {
        return not_found("training");
    }

    let orchestrator = DocOrchestrator::new(
        state.store.clone(),
        state.dispatcher.clone(),
        state.artifacts.clone(),
        state.config.clone(),
    );
    let spawned_training_id = training_id.clone();
    tokio::spawn(async move {
        orchestrator.generate(&spawned_training_id).await;
    });

    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "training_id": training_id,
            "projectmd_status": "in_progress",
        })),
    )
        .into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /projects/:id/trainings/latest/projectmd
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Serve the most recently generated project.md body verbatim.
pub async fn latest_projectmd(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> axum::response::Response {
    let mut trainings = state
        .store
        .trainings
        .find(|t| t.project_id.eq_ignore_ascii_case(&project_id) && t.projectmd.s3_url.is_some());
    trainings.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let Some(training) = trainings.into_iter().next() else {
        return not_found("generated project.md");
    };
    let Some((bucket, key)) = training
        .projectmd
        .s3_url
        .as_deref()
        .and_then(parse_object_url)
    else {
        return not_found("generated project.md");
    };

    match state.artifacts.get(&bucket, &key).await {
        Ok(Some(body)) => (
            StatusCode::OK,
            [("content-type", "text/markdown; charset=utf-8")],
            body,
        )
            .into_response(),
        Ok(None) => not_found("generated project.md"),
        Err(e) => super::error_response(&e).into_response(),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /projects/:id/gateways/:id/tools
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct ToolCreate {
    pub agent_id: String,
    pub tool_name: String,
}

pub async fn create_tool(
    State(state): State<AppState>,
    Path((project_id, gateway_id)): Path<(String, String)>,
    Json(body): Json<ToolCreate>,
) -> axum::response::Response {
    let Some(gateway) = state.store.gateways.get(&gateway_id) else {
        return not_found("gateway");
    };
    if !gateway.project_id.eq_ignore_ascii_case(&project_id) {
        return not_found("gateway");
    }
    if state.store.agents.get(&body.agent_id).is_none() {
        return not_found("agent");
    }

    let tool = McpTool::new(&gateway_id, &body.agent_id, &body.tool_name);
    let tool_id = tool.id.clone();
    if let Err(e) = state.store.mcp_tools.insert(tool.clone()) {
        return super::error_response(&e).into_response();
    }

    let orchestrator = ToolMetaOrchestrator::new(
        state.store.clone(),
        state.dispatcher.clone(),
        state.config.clone(),
    );
    let spawned_tool_id = tool_id.clone();
    tokio::spawn(async move {
        orchestrator.generate(&spawned_tool_id).await;
    });

    (StatusCode::CREATED, Json(serde_json::json!(tool))).into_response()
}
