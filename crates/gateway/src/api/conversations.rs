//! Conversation streaming: one live runner per message, fanned out to the
//! caller as Server-Sent Events.
//!
//! - `POST   /conversations/:id/messages`  — send a message, stream events
//! - `POST   /conversations/:id/interrupt` — cancel a streaming message
//! - `DELETE /conversations/:id/session`   — cancel all runners + drop the
//!   cached session

use std::collections::HashMap;
use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json};
use futures_util::stream::Stream;
use serde::Deserialize;
use serde_json::Value;

use arbor_agent::{AgentRunner, QueryOptions, StreamEvent};
use arbor_domain::model::Message;

use crate::runtime::worker::agent_mcp_tools;
use crate::state::AppState;

use super::error_response;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request shapes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub project_id: String,
    #[serde(default)]
    pub agent_id: Option<String>,
    /// Explicit SDK session to resume; falls back to the session cache.
    #[serde(default)]
    pub session_id: Option<String>,
    pub message_id: String,
    pub content: String,
    /// Ad-hoc overrides (model, instructions, output_format).
    #[serde(default)]
    pub agent_config: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct InterruptRequest {
    pub message_id: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /conversations/:id/messages (SSE)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn send_message(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Json(request): Json<SendMessageRequest>,
) -> axum::response::Response {
    // Resolve the agent when one is named; a missing agent is a hard 404.
    let agent = match &request.agent_id {
        Some(agent_id) => match state.store.agents.get(agent_id) {
            Some(agent) => Some(agent),
            None => {
                return (
                    StatusCode::NOT_FOUND,
                    Json(serde_json::json!({ "error": format!("agent '{agent_id}' not found") })),
                )
                    .into_response();
            }
        },
        None => None,
    };

    let conversation = state.store.resolve_conversation(
        &conversation_id,
        &request.project_id,
        request.agent_id.as_deref(),
    );
    let session_id = request
        .session_id
        .clone()
        .or_else(|| state.sessions.get(&conversation_id))
        .or(conversation.session_id);

    // Per-conversation workspace with the sandbox policy.
    let mcp_servers = state.config.mcp.server_entries();
    let mcp_tools = agent.as_ref().map(agent_mcp_tools).unwrap_or_default();
    let workspace = match state.workspaces.provision(
        &request.project_id,
        &conversation_id,
        &mcp_servers,
        &mcp_tools,
    ) {
        Ok(workspace) => workspace,
        Err(e) => return error_response(&e).into_response(),
    };

    // Ad-hoc overrides beat the stored agent definition.
    let overrides = request.agent_config.clone().unwrap_or(Value::Null);
    let model = overrides
        .get("model")
        .and_then(Value::as_str)
        .unwrap_or(&state.config.llm.default_model)
        .to_string();
    let instructions = overrides
        .get("instructions")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| agent.as_ref().and_then(|a| a.instructions.clone()))
        .unwrap_or_default();
    let output_format = overrides
        .get("output_format")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| agent.as_ref().map(|a| a.output_format.clone()))
        .unwrap_or_default();

    let mut env = HashMap::new();
    if let Some(api_key) = &state.config.llm.api_key {
        env.insert("ANTHROPIC_API_KEY".to_string(), api_key.clone());
    }
    env.insert("ARBOR_PROJECT_ID".to_string(), request.project_id.clone());

    let options = QueryOptions {
        model,
        max_turns: state.config.llm.default_max_turns,
        cwd: Some(workspace.work_dir.clone()),
        env,
        mcp_servers,
        allowed_tools: mcp_tools,
        resume_session_id: session_id.clone(),
    };

    // Register the runner so the interrupt endpoint can reach it.
    let token = state
        .active_runners
        .register(&conversation_id, &request.message_id);
    let runner = AgentRunner::new(state.sdk.clone(), options);
    let rx = runner.stream(&request.content, &instructions, &output_format, token);

    let stream = make_message_stream(
        state,
        workspace,
        rx,
        conversation_id,
        request.message_id,
        session_id,
    );
    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// Wrap runner events into SSE envelopes, persist each as a conversation
/// message, and tear down the runner registration + workspace at the end.
fn make_message_stream(
    state: AppState,
    workspace: crate::workspace::Workspace,
    mut rx: tokio::sync::mpsc::Receiver<StreamEvent>,
    conversation_id: String,
    message_id: String,
    initial_session: Option<String>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        let mut current_session = initial_session;

        while let Some(event) = rx.recv().await {
            // A terminal result may carry a fresh session id — persist it
            // so the next message resumes upstream history.
            if let StreamEvent::Result { session_id: Some(sid), .. } = &event {
                current_session = Some(sid.clone());
                state.sessions.set(&conversation_id, sid);
                state.store.conversations.update(&conversation_id, |c| {
                    c.session_id = Some(sid.clone());
                });
            }

            let event_type = event.event_type();
            let mut data = serde_json::to_value(&event).unwrap_or_default();
            if let Value::Object(map) = &mut data {
                map.remove("type");
                map.insert("message_id".into(), Value::String(message_id.clone()));
                map.insert(
                    "conversation_id".into(),
                    Value::String(conversation_id.clone()),
                );
                map.insert(
                    "session_id".into(),
                    current_session
                        .clone()
                        .map(Value::String)
                        .unwrap_or(Value::Null),
                );
            }

            state
                .store
                .append_message(Message::new(&conversation_id, event_type, data.clone()));

            yield Ok(Event::default().event(event_type).data(data.to_string()));
        }

        state.active_runners.unregister(&conversation_id, &message_id);
        // Workspace guard drops here, removing the tree.
        drop(workspace);
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /conversations/:id/interrupt
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Flip the cancel flag for one streaming message. Returns immediately;
/// the runner terminates within one poll interval, preserving partial
/// content.
pub async fn interrupt(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Json(request): Json<InterruptRequest>,
) -> impl IntoResponse {
    if state
        .active_runners
        .interrupt(&conversation_id, &request.message_id)
    {
        Json(serde_json::json!({
            "message_id": request.message_id,
            "status": "interrupted",
        }))
        .into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "error": format!("no active response found for message {}", request.message_id),
            })),
        )
            .into_response()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DELETE /conversations/:id/session
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Cancel every live runner for the conversation and drop the cached
/// session id.
pub async fn disconnect(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> impl IntoResponse {
    let disconnected = state.active_runners.interrupt_conversation(&conversation_id);
    state.sessions.delete(&conversation_id);
    state.store.conversations.update(&conversation_id, |c| {
        c.session_id = None;
    });

    tracing::info!(
        conversation_id,
        disconnected,
        "conversation session disconnected"
    );
    Json(serde_json::json!({
        "conversation_id": conversation_id,
        "sessions_disconnected": disconnected,
    }))
}
