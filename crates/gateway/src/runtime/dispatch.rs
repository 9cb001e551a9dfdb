//! Task dispatch: creates the user/assistant task pair, checks admission,
//! and publishes the broker message carrying both ids.

use std::sync::Arc;

use serde_json::Value;

use arbor_broker::{AgentTaskMessage, Broker};
use arbor_domain::model::Task;
use arbor_domain::{Error, Result};
use arbor_store::Store;

use super::admission::AdmissionGate;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Task pair
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The two documents one user message produces.
#[derive(Debug, Clone)]
pub struct TaskPair {
    pub user_task_id: String,
    pub assistant_task_id: String,
    /// Lower-cased project id used for every downstream reference.
    pub project_id: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Dispatcher
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct Dispatcher {
    store: Arc<Store>,
    broker: Arc<dyn Broker>,
    admission: AdmissionGate,
}

impl Dispatcher {
    pub fn new(store: Arc<Store>, broker: Arc<dyn Broker>) -> Self {
        let admission = AdmissionGate::new(store.clone());
        Self {
            store,
            broker,
            admission,
        }
    }

    /// REST-facing task creation: verifies the agent, applies admission
    /// control, then persists and publishes the pair.
    pub async fn create_task(
        &self,
        project_id: &str,
        agent_id: &str,
        content: &str,
        metadata: serde_json::Map<String, Value>,
    ) -> Result<TaskPair> {
        self.store.agent_in_project(project_id, agent_id)?;

        let active = self.admission.active_task_count(project_id, agent_id);
        if active > 0 {
            return Err(Error::Throttled(format!(
                "agent already has {active} active task(s); wait for completion \
                 before submitting new requests"
            )));
        }

        self.enqueue_pair(project_id, agent_id, content, metadata)
            .await
    }

    /// Orchestrator-facing path: persist and publish a pair without the
    /// admission check (fan-outs intentionally run many tasks per agent).
    ///
    /// The pair is inserted before publication — a failed publish leaves
    /// both documents `queued` for a janitor sweep to republish or fail.
    pub async fn enqueue_pair(
        &self,
        project_id: &str,
        agent_id: &str,
        content: &str,
        metadata: serde_json::Map<String, Value>,
    ) -> Result<TaskPair> {
        let project_id = project_id.to_lowercase();

        let user_task = Task::user(&project_id, agent_id, content, metadata.clone());
        let assistant_task = Task::assistant(&project_id, agent_id, &user_task.id, metadata.clone());
        let pair = TaskPair {
            user_task_id: user_task.id.clone(),
            assistant_task_id: assistant_task.id.clone(),
            project_id: project_id.clone(),
        };

        self.store.tasks.insert(user_task)?;
        self.store.tasks.insert(assistant_task)?;
        self.store.agents.update(agent_id, |a| a.task_count += 1);

        tracing::info!(
            project_id = %pair.project_id,
            agent_id,
            user_task_id = %pair.user_task_id,
            assistant_task_id = %pair.assistant_task_id,
            "task pair created"
        );

        self.broker
            .publish_agent_task(AgentTaskMessage {
                task_id: pair.user_task_id.clone(),
                assistant_task_id: pair.assistant_task_id.clone(),
                agent_id: agent_id.to_string(),
                project_id: pair.project_id.clone(),
                content: content.to_string(),
                metadata,
            })
            .await?;

        Ok(pair)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
