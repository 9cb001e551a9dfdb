//! Project documentation generation: submit one task to the documentation
//! agent, await completion, upload the body to the artifact store, record
//! the URL on the training record.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;

use arbor_domain::config::Config;
use arbor_domain::model::{Agent, AgentState, ProjectMdStatus, TaskStatus};
use arbor_store::{ArtifactStore, Store};

use super::dispatch::Dispatcher;

/// 1 s poll, 1800 iterations — a 30 minute ceiling.
const POLL_INTERVAL: Duration = Duration::from_secs(1);
const MAX_POLLS: u32 = 1800;

const DOCUMENTATION_PROMPT: &str = "Please provide your claude.md now.";
const DOCUMENTATION_AGENT_NAME: &str = "documentation";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DocOrchestrator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct DocOrchestrator {
    store: Arc<Store>,
    dispatcher: Arc<Dispatcher>,
    artifacts: Arc<dyn ArtifactStore>,
    config: Arc<Config>,
    poll_interval: Duration,
    max_polls: u32,
}

impl DocOrchestrator {
    pub fn new(
        store: Arc<Store>,
        dispatcher: Arc<Dispatcher>,
        artifacts: Arc<dyn ArtifactStore>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            store,
            dispatcher,
            artifacts,
            config,
            poll_interval: POLL_INTERVAL,
            max_polls: MAX_POLLS,
        }
    }

    /// Shrink the poll cadence/ceiling (tests).
    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls;
        self
    }

    /// Generate project.md for one training.
    pub async fn generate(&self, training_id: &str) {
        let Some(training) = self.store.trainings.get(training_id) else {
            tracing::error!(training_id, "training not found");
            return;
        };

        tracing::info!(training_id, "starting project.md generation");
        self.store.trainings.update(training_id, |t| {
            t.projectmd.status = Some(ProjectMdStatus::InProgress);
            t.projectmd.started_at = Some(Utc::now());
        });

        // The documentation agent lives in the configured docs project
        // (falling back to the training's own project) and is created
        // lazily on first use.
        let docs_project_id = self
            .config
            .orchestration
            .docs_project_id
            .clone()
            .unwrap_or_else(|| training.project_id.clone());
        let agent = match self.resolve_documentation_agent(&docs_project_id) {
            Ok(agent) => agent,
            Err(e) => {
                self.mark_failed(training_id, &e);
                return;
            }
        };
        self.store.trainings.update(training_id, |t| {
            t.projectmd.documentation_agent_id = Some(agent.id.clone());
            t.projectmd.documentation_project_id = Some(docs_project_id.clone());
        });

        // Submit the single documentation task. The agent is hosted under
        // the docs project; override_project_id points tooling back at the
        // training's project.
        let mut metadata = serde_json::Map::new();
        metadata.insert(
            "training_id".into(),
            Value::String(training_id.to_string()),
        );
        metadata.insert(
            "override_project_id".into(),
            Value::String(training.project_id.clone()),
        );
        metadata.insert(
            "task_type".into(),
            Value::String("project_md_generation".into()),
        );

        let pair = match self
            .dispatcher
            .enqueue_pair(&docs_project_id, &agent.id, DOCUMENTATION_PROMPT, metadata)
            .await
        {
            Ok(pair) => pair,
            Err(e) => {
                self.mark_failed(
                    training_id,
                    &format!("Failed to create documentation task: {e}"),
                );
                return;
            }
        };

        // Poll until the assistant task completes.
        for _ in 0..self.max_polls {
            let Some(task) = self.store.tasks.get(&pair.assistant_task_id) else {
                self.mark_failed(training_id, "documentation task disappeared");
                return;
            };
            match task.status {
                TaskStatus::Completed => {
                    self.upload(training_id, &training.project_id, &task.content)
                        .await;
                    return;
                }
                TaskStatus::Failed => {
                    let reason = task
                        .metadata
                        .get("error")
                        .and_then(Value::as_str)
                        .unwrap_or("documentation task failed");
                    self.mark_failed(training_id, reason);
                    return;
                }
                _ => tokio::time::sleep(self.poll_interval).await,
            }
        }

        self.mark_failed(training_id, "Project.md generation timed out");
    }

    /// Find (or lazily create) the docs project's documentation agent.
    fn resolve_documentation_agent(&self, docs_project_id: &str) -> Result<Agent, String> {
        if let Some(agent) = self
            .store
            .agent_by_name(docs_project_id, DOCUMENTATION_AGENT_NAME)
        {
            return Ok(agent);
        }

        let mut agent = Agent::new(docs_project_id, DOCUMENTATION_AGENT_NAME);
        agent.description = Some("Generates project documentation (claude.md)".into());
        agent.instructions = Some(
            "You are a documentation agent. When asked, produce a complete, well-structured \
             claude.md describing the project's data sources, conventions and usage."
                .into(),
        );
        agent.output_format = "markdown".into();
        agent.state = AgentState::Enabled;
        agent.deployed = true;

        tracing::info!(project_id = docs_project_id, "creating documentation agent");
        let cloned = agent.clone();
        self.store
            .agents
            .insert(agent)
            .map(|_| cloned)
            .map_err(|e| format!("failed to create documentation agent: {e}"))
    }

    async fn upload(&self, training_id: &str, project_id: &str, body: &str) {
        let key = format!("artifacts/{project_id}/trainings/{training_id}/projectmd.md");
        match self
            .artifacts
            .put(
                &self.config.artifacts.artifact_bucket,
                &key,
                body.as_bytes(),
            )
            .await
        {
            Ok(url) => {
                tracing::info!(training_id, %url, "project.md uploaded");
                self.store.trainings.update(training_id, |t| {
                    t.projectmd.status = Some(ProjectMdStatus::Completed);
                    t.projectmd.s3_url = Some(url.clone());
                    t.projectmd.completed_at = Some(Utc::now());
                });
            }
            Err(e) => {
                self.mark_failed(training_id, &format!("Failed to upload to S3: {e}"));
            }
        }
    }

    fn mark_failed(&self, training_id: &str, error: &str) {
        tracing::error!(training_id, error, "project.md generation failed");
        self.store.trainings.update(training_id, |t| {
            t.projectmd.status = Some(ProjectMdStatus::Failed);
            t.projectmd.error_message = Some(error.to_string());
            t.projectmd.completed_at = Some(Utc::now());
        });
    }
}
