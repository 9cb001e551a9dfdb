//! Broker consumer: executes one `agent.task` delivery end to end —
//! workspace provisioning, SDK invocation with retry and cancellation,
//! idempotent status writes, session caching, and the audit envelope.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Notify;
use tracing::Instrument;

use arbor_agent::{
    AgentRunner, AgentSdk, CancellationOracle, QueryOptions, RunOutcome, TASK_CANCELLED_MESSAGE,
};
use arbor_broker::{AgentTaskMessage, Broker, Delivery};
use arbor_cache::SessionCache;
use arbor_domain::config::Config;
use arbor_domain::model::{Agent, TaskStatus};
use arbor_domain::Result;
use arbor_store::{ArtifactStore, Store};

use crate::workspace::WorkspaceManager;

/// Attempts per invocation before the task goes terminal `failed`.
const MAX_RUN_ATTEMPTS: u32 = 3;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Cancellation oracle
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Store-backed oracle: the API layer flags `cancel_requested` on the
/// assistant task; the runner polls it every ≥5 s.
struct StoreCancelOracle {
    store: Arc<Store>,
    task_id: String,
}

#[async_trait]
impl CancellationOracle for StoreCancelOracle {
    async fn is_cancelled(&self) -> bool {
        self.store
            .tasks
            .get(&self.task_id)
            .map(|t| t.cancel_requested())
            .unwrap_or(false)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TaskWorker
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct TaskWorker {
    store: Arc<Store>,
    broker: Arc<dyn Broker>,
    sessions: Arc<SessionCache>,
    artifacts: Arc<dyn ArtifactStore>,
    sdk: Arc<dyn AgentSdk>,
    config: Arc<Config>,
    workspaces: WorkspaceManager,
    cancel_check_interval: Duration,
}

impl TaskWorker {
    pub fn new(
        store: Arc<Store>,
        broker: Arc<dyn Broker>,
        sessions: Arc<SessionCache>,
        artifacts: Arc<dyn ArtifactStore>,
        sdk: Arc<dyn AgentSdk>,
        config: Arc<Config>,
    ) -> Self {
        let workspaces = WorkspaceManager::new(config.workspace.clone());
        Self {
            store,
            broker,
            sessions,
            artifacts,
            sdk,
            config,
            workspaces,
            cancel_check_interval: Duration::from_secs(5),
        }
    }

    /// Shrink the oracle poll interval (tests).
    pub fn with_cancel_check_interval(mut self, interval: Duration) -> Self {
        self.cancel_check_interval = interval;
        self
    }

    /// Consume deliveries until shutdown.
    pub async fn run(self: Arc<Self>, shutdown: Arc<Notify>) {
        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    tracing::info!("task worker shutting down");
                    break;
                }
                delivery = self.broker.consume_agent_task() => {
                    match delivery {
                        Some(delivery) => self.handle(delivery).await,
                        None => break,
                    }
                }
            }
        }
    }

    /// Process one delivery: ACK on success or terminal failure, NACK
    /// (requeue) only on transport errors.
    pub async fn handle(&self, delivery: Delivery<AgentTaskMessage>) {
        let span = tracing::info_span!(
            "task_worker",
            assistant_task_id = %delivery.message.assistant_task_id,
            agent_id = %delivery.message.agent_id,
            attempt = delivery.attempt,
        );
        match self.execute(&delivery.message).instrument(span).await {
            Ok(()) => self.broker.ack_agent_task(delivery).await,
            Err(e) if e.is_retryable() => {
                tracing::warn!(error = %e, "transport error — requeueing delivery");
                self.broker.nack_agent_task(delivery).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "task execution failed terminally");
                self.fail_task(&delivery.message.assistant_task_id, &e.to_string());
                self.broker.ack_agent_task(delivery).await;
            }
        }
    }

    async fn execute(&self, msg: &AgentTaskMessage) -> Result<()> {
        // 1. Load agent and project; missing either is a terminal failure
        //    for the assistant task, not a requeue.
        let Some(agent) = self.store.agents.get(&msg.agent_id) else {
            self.fail_task(
                &msg.assistant_task_id,
                &format!("not_found: agent {}", msg.agent_id),
            );
            return Ok(());
        };
        let project_exists = self.store.projects.get(&msg.project_id).is_some()
            || self
                .store
                .projects
                .count(|p| p.id.eq_ignore_ascii_case(&msg.project_id))
                > 0;
        if !project_exists {
            self.fail_task(
                &msg.assistant_task_id,
                &format!("not_found: project {}", msg.project_id),
            );
            return Ok(());
        }

        // 2. Claim the task. A redelivered message whose task already went
        //    terminal is a no-op (at-least-once tolerance).
        if !self
            .store
            .advance_task_status(&msg.assistant_task_id, TaskStatus::Processing, None)
        {
            tracing::info!("assistant task not claimable — skipping duplicate delivery");
            return Ok(());
        }

        // 3. Workspace scope: the conversation when one exists, otherwise
        //    the assistant task itself.
        let scope = msg
            .metadata
            .get("conversation_id")
            .and_then(Value::as_str)
            .unwrap_or(&msg.assistant_task_id)
            .to_string();

        let mcp_servers = self.config.mcp.server_entries();
        let mcp_tools = agent_mcp_tools(&agent);
        let workspace =
            self.workspaces
                .provision(&msg.project_id, &scope, &mcp_servers, &mcp_tools)?;

        // 4. Build options.
        let mut env = HashMap::new();
        if let Some(api_key) = &self.config.llm.api_key {
            env.insert("ANTHROPIC_API_KEY".to_string(), api_key.clone());
        }
        let effective_project = msg
            .metadata
            .get("override_project_id")
            .and_then(Value::as_str)
            .unwrap_or(&msg.project_id);
        env.insert("ARBOR_PROJECT_ID".to_string(), effective_project.to_string());

        let options = QueryOptions {
            model: agent
                .metadata
                .get("model")
                .and_then(Value::as_str)
                .unwrap_or(&self.config.llm.default_model)
                .to_string(),
            max_turns: self.config.llm.default_max_turns,
            cwd: Some(workspace.work_dir.clone()),
            env,
            mcp_servers,
            allowed_tools: mcp_tools,
            resume_session_id: self.sessions.get(&scope),
        };

        // 5. Invoke with retry + cancellation.
        let oracle = StoreCancelOracle {
            store: self.store.clone(),
            task_id: msg.assistant_task_id.clone(),
        };
        let runner = AgentRunner::new(self.sdk.clone(), options)
            .with_cancel_check_interval(self.cancel_check_interval);
        let outcome = runner
            .run(
                &msg.content,
                agent.instructions.as_deref().unwrap_or(""),
                &agent.output_format,
                Some(&oracle),
                MAX_RUN_ATTEMPTS,
            )
            .await;

        // 6. Finalise the assistant task. The paired user task is never
        //    mutated by the worker.
        if outcome.cancelled {
            self.store.advance_task_status(
                &msg.assistant_task_id,
                TaskStatus::Failed,
                Some(TASK_CANCELLED_MESSAGE),
            );
            self.store
                .set_task_error(&msg.assistant_task_id, "cancelled");
        } else if outcome.is_error {
            self.store.advance_task_status(
                &msg.assistant_task_id,
                TaskStatus::Failed,
                Some(&outcome.generation),
            );
            self.store
                .set_task_error(&msg.assistant_task_id, &outcome.generation);
        } else {
            self.store.advance_task_status(
                &msg.assistant_task_id,
                TaskStatus::Completed,
                Some(&outcome.generation),
            );
        }

        // 7. Persist the session id so the next turn resumes upstream
        //    history.
        if let Some(session_id) = &outcome.session_id {
            self.sessions.set(&scope, session_id);
            self.store.conversations.update(&scope, |c| {
                c.session_id = Some(session_id.clone());
            });
        }

        // 8. Audit envelope (best-effort; never fails the task).
        self.upload_audit(msg, &outcome).await;

        // Workspace guard drops here, removing the tree.
        Ok(())
    }

    fn fail_task(&self, task_id: &str, error: &str) {
        self.store
            .advance_task_status(task_id, TaskStatus::Failed, None);
        self.store.set_task_error(task_id, error);
    }

    async fn upload_audit(&self, msg: &AgentTaskMessage, outcome: &RunOutcome) {
        let key = format!(
            "audit/{}/{}/{}.json",
            msg.project_id.to_lowercase(),
            msg.agent_id,
            msg.assistant_task_id,
        );
        let envelope = serde_json::json!({
            "task_id": msg.task_id,
            "assistant_task_id": msg.assistant_task_id,
            "agent_id": msg.agent_id,
            "project_id": msg.project_id,
            "attempts": outcome.attempts,
            "cancelled": outcome.cancelled,
            "is_error": outcome.is_error,
            "messages": outcome.messages,
        });
        let body = serde_json::to_vec(&envelope).unwrap_or_default();
        if let Err(e) = self
            .artifacts
            .put(&self.config.artifacts.audit_bucket, &key, &body)
            .await
        {
            tracing::warn!(error = %e, key, "audit envelope upload failed");
        }
    }
}

/// MCP tool names granted to an agent (from its metadata).
pub(crate) fn agent_mcp_tools(agent: &Agent) -> Vec<String> {
    agent
        .metadata
        .get("mcp_tools")
        .and_then(Value::as_array)
        .map(|tools| {
            tools
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
