use chrono::Utc;

use arbor_domain::model::{
    Agent, Conversation, DataSource, Evaluation, EvaluationRun, FolderUpload, McpGateway,
    McpTool, Message, Project, Task, TaskRole, TaskStatus, ToolInvocation, Training,
};
use arbor_domain::{Error, Result};

use crate::collection::Collection;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The authoritative shared state: one collection per entity plus the
/// cross-entity queries the runtime needs. Cloning is cheap only via `Arc`;
/// the store itself is shared, never copied.
pub struct Store {
    pub projects: Collection<Project>,
    pub agents: Collection<Agent>,
    pub tasks: Collection<Task>,
    pub conversations: Collection<Conversation>,
    pub messages: Collection<Message>,
    pub trainings: Collection<Training>,
    pub evaluations: Collection<Evaluation>,
    pub evaluation_runs: Collection<EvaluationRun>,
    pub gateways: Collection<McpGateway>,
    pub mcp_tools: Collection<McpTool>,
    pub tool_invocations: Collection<ToolInvocation>,
    pub data_sources: Collection<DataSource>,
    pub folder_uploads: Collection<FolderUpload>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self {
            projects: Collection::new("projects"),
            agents: Collection::new("agents"),
            tasks: Collection::new("tasks"),
            conversations: Collection::new("conversations"),
            messages: Collection::new("messages"),
            trainings: Collection::new("trainings"),
            evaluations: Collection::new("evaluations"),
            evaluation_runs: Collection::new("evaluation_runs"),
            gateways: Collection::new("mcp_gateways"),
            mcp_tools: Collection::new("mcp_tools"),
            tool_invocations: Collection::new("tool_invocations"),
            data_sources: Collection::new("data_sources"),
            folder_uploads: Collection::new("folder_uploads"),
        }
    }

    // ── Projects ──────────────────────────────────────────────────────

    /// Insert a project, enforcing `(organization_id, name)` uniqueness.
    pub fn insert_project(&self, project: Project) -> Result<String> {
        let duplicate = self.projects.count(|p| {
            p.organization_id == project.organization_id && p.name == project.name
        }) > 0;
        if duplicate {
            return Err(Error::Conflict(format!(
                "project '{}' already exists in organization {}",
                project.name, project.organization_id
            )));
        }
        self.projects.insert(project)
    }

    // ── Agents ────────────────────────────────────────────────────────

    /// Fetch an agent and verify it belongs to the given project
    /// (project-id comparison is case-insensitive, since task paths
    /// normalise ids to lower case).
    pub fn agent_in_project(&self, project_id: &str, agent_id: &str) -> Result<Agent> {
        let agent = self
            .agents
            .get(agent_id)
            .ok_or_else(|| Error::NotFound(format!("agent {agent_id}")))?;
        if !agent.project_id.eq_ignore_ascii_case(project_id) {
            return Err(Error::NotFound(format!(
                "agent {agent_id} does not belong to project {project_id}"
            )));
        }
        Ok(agent)
    }

    /// Look up an agent by name within a project.
    pub fn agent_by_name(&self, project_id: &str, name: &str) -> Option<Agent> {
        self.agents
            .find(|a| a.project_id.eq_ignore_ascii_case(project_id) && a.name == name)
            .into_iter()
            .next()
    }

    // ── Tasks ─────────────────────────────────────────────────────────

    /// Count of live assistant tasks for `(project, agent)` — the admission
    /// predicate input.
    pub fn active_assistant_tasks(&self, project_id: &str, agent_id: &str) -> usize {
        self.tasks.count(|t| {
            t.role == TaskRole::Assistant
                && t.agent_id == agent_id
                && t.project_id.eq_ignore_ascii_case(project_id)
                && !t.status.is_terminal()
        })
    }

    /// Advance a task's status, honouring the monotonic DAG: out-of-order
    /// writes are dropped and reported as `false`. Terminal transitions set
    /// `completed_at`; `content` overwrites the task body when provided.
    pub fn advance_task_status(
        &self,
        task_id: &str,
        next: TaskStatus,
        content: Option<&str>,
    ) -> bool {
        let mut advanced = false;
        self.tasks.update(task_id, |t| {
            if !t.status.can_advance_to(next) {
                return;
            }
            t.status = next;
            if let Some(body) = content {
                t.content = body.to_string();
            }
            if next.is_terminal() {
                t.completed_at = Some(Utc::now());
            }
            advanced = true;
        });
        advanced
    }

    /// Record an error message on a task's metadata.
    pub fn set_task_error(&self, task_id: &str, error: &str) {
        self.tasks.update(task_id, |t| {
            t.metadata
                .insert("error".into(), serde_json::Value::String(error.into()));
        });
    }

    /// Flag a task for cancellation; the worker's oracle observes this.
    pub fn request_task_cancel(&self, task_id: &str) -> bool {
        self.tasks.update(task_id, |t| {
            t.metadata
                .insert("cancel_requested".into(), serde_json::Value::Bool(true));
        })
    }

    // ── Conversations ─────────────────────────────────────────────────

    /// Fetch or create the conversation record for an SSE stream.
    pub fn resolve_conversation(
        &self,
        conversation_id: &str,
        project_id: &str,
        agent_id: Option<&str>,
    ) -> Conversation {
        if let Some(existing) = self.conversations.get(conversation_id) {
            return existing;
        }
        let conversation = Conversation::new(conversation_id, project_id, agent_id);
        // A race here inserts twice; the second insert loses and re-reads.
        match self.conversations.insert(conversation.clone()) {
            Ok(_) => conversation,
            Err(_) => self
                .conversations
                .get(conversation_id)
                .unwrap_or(conversation),
        }
    }

    /// Append an SSE event row to a conversation's audit log.
    pub fn append_message(&self, message: Message) {
        let conversation_id = message.conversation_id.clone();
        let message_id = message.id.clone();
        if self.messages.insert(message).is_ok() {
            self.conversations.update(&conversation_id, |c| {
                c.message_ids.push(message_id);
            });
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
