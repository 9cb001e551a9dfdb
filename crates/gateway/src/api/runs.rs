//! ACP-compatible task submission.
//!
//! - `POST /api/v1/runs`          — create a run for an agent
//! - `GET  /api/v1/runs/:run_id`  — current status + output

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use arbor_domain::model::{TaskRole, TaskStatus};

use crate::state::AppState;

use super::error_response;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Protocol shapes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize, Serialize)]
pub struct MessagePart {
    pub content_type: String,
    pub content: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct AcpMessage {
    pub parts: Vec<MessagePart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct RunCreate {
    /// Per the protocol this is `agent_name`; it carries the agent id.
    pub agent_name: String,
    #[serde(default)]
    pub session_id: Option<String>,
    pub input: Vec<AcpMessage>,
    #[serde(default)]
    pub mode: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Run {
    pub agent_name: String,
    pub run_id: String,
    pub status: &'static str,
    pub output: Vec<AcpMessage>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

fn acp_status(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Queued => "created",
        TaskStatus::Processing => "in-progress",
        TaskStatus::Completed => "completed",
        TaskStatus::Failed => "failed",
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /api/v1/runs
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn create_run(
    State(state): State<AppState>,
    Json(body): Json<RunCreate>,
) -> impl IntoResponse {
    let agent_id = body.agent_name.clone();
    let Some(agent) = state.store.agents.get(&agent_id) else {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("agent '{agent_id}' not found") })),
        )
            .into_response();
    };

    // Concatenate every text part into one prompt.
    let mut content = String::new();
    for message in &body.input {
        for part in &message.parts {
            if part.content_type.starts_with("text/") {
                content.push_str(&part.content);
                content.push('\n');
            }
        }
    }
    let content = content.trim().to_string();
    if content.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "input contains no text parts" })),
        )
            .into_response();
    }

    let mut metadata = serde_json::Map::new();
    metadata.insert(
        "acp".into(),
        serde_json::json!({
            "session_id": body.session_id,
            "mode": body.mode.as_deref().unwrap_or("async"),
            "original_format": "acp",
            "version": "v1",
        }),
    );

    match state
        .dispatcher
        .create_task(&agent.project_id, &agent_id, &content, metadata)
        .await
    {
        Ok(pair) => {
            let created_at = state
                .store
                .tasks
                .get(&pair.user_task_id)
                .map(|t| t.created_at)
                .unwrap_or_else(Utc::now);
            let run = Run {
                agent_name: agent_id,
                run_id: pair.assistant_task_id,
                status: "created",
                output: Vec::new(),
                created_at,
                finished_at: None,
                error: None,
            };
            (StatusCode::CREATED, Json(run)).into_response()
        }
        Err(e) => error_response(&e).into_response(),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /api/v1/runs/:run_id
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn get_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> impl IntoResponse {
    let Some(assistant) = state.store.tasks.get(&run_id) else {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("run '{run_id}' not found") })),
        )
            .into_response();
    };
    if assistant.role != TaskRole::Assistant || assistant.related_task_id.is_none() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "invalid run id" })),
        )
            .into_response();
    }
    let user = assistant
        .related_task_id
        .as_deref()
        .and_then(|id| state.store.tasks.get(id));

    let status = acp_status(assistant.status);
    let mut output = Vec::new();
    if !assistant.content.is_empty() {
        output.push(AcpMessage {
            parts: vec![MessagePart {
                content_type: "text/plain".into(),
                content: assistant.content.clone(),
            }],
            created_at: Some(assistant.created_at),
            completed_at: assistant.completed_at,
        });
    }

    let error = (status == "failed").then(|| {
        serde_json::json!({
            "code": "failed",
            "message": assistant
                .metadata
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or(""),
        })
    });

    let run = Run {
        agent_name: assistant.agent_id.clone(),
        run_id,
        status,
        output,
        created_at: user.map(|u| u.created_at).unwrap_or(assistant.created_at),
        finished_at: assistant.completed_at,
        error,
    };
    Json(run).into_response()
}
