//! HTTP surface: ACP-compatible run submission, conversation streaming,
//! project lifecycle + folder uploads, and the workflow triggers.

pub mod agents;
pub mod conversations;
pub mod projects;
pub mod runs;
pub mod workflows;

use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use arbor_domain::Error;

use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Router
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        // ACP task submission
        .route("/api/v1/runs", post(runs::create_run))
        .route("/api/v1/runs/:run_id", get(runs::get_run))
        // Conversation streaming
        .route(
            "/conversations/:conversation_id/messages",
            post(conversations::send_message),
        )
        .route(
            "/conversations/:conversation_id/interrupt",
            post(conversations::interrupt),
        )
        .route(
            "/conversations/:conversation_id/session",
            delete(conversations::disconnect),
        )
        // Projects + project-scoped resources
        .route("/projects", post(projects::create_project))
        .route("/projects/:project_id", delete(projects::delete_project))
        .route(
            "/projects/:project_id/folders",
            post(projects::upload_folder),
        )
        .route(
            "/projects/:project_id/trainings",
            post(projects::create_training),
        )
        .route(
            "/projects/:project_id/data-sources",
            post(projects::create_data_source),
        )
        .route(
            "/projects/:project_id/gateways",
            post(projects::create_gateway),
        )
        // Agents
        .route("/projects/:project_id/agents", post(agents::create_agent))
        .route(
            "/projects/:project_id/agents/:agent_id",
            axum::routing::patch(agents::update_agent),
        )
        .route(
            "/projects/:project_id/agents/:agent_id/versions",
            get(agents::agent_versions),
        )
        // Workflow triggers
        .route(
            "/projects/:project_id/evaluations/:evaluation_id/runs",
            post(workflows::start_evaluation_run),
        )
        .route(
            "/projects/:project_id/trainings/:training_id/projectmd",
            post(workflows::generate_projectmd),
        )
        .route(
            "/projects/:project_id/trainings/latest/projectmd",
            get(workflows::latest_projectmd),
        )
        .route(
            "/projects/:project_id/gateways/:gateway_id/tools",
            post(workflows::create_tool),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Error mapping
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Map a domain error onto its HTTP status + JSON body.
pub(crate) fn error_response(err: &Error) -> (StatusCode, Json<serde_json::Value>) {
    let status = match err {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::Conflict(_) => StatusCode::CONFLICT,
        Error::Throttled(_) => StatusCode::TOO_MANY_REQUESTS,
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(serde_json::json!({ "error": err.to_string() })))
}
