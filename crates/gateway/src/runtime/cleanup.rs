//! Cascade deletion of a project's resources, leaf to root, after the
//! project document itself is removed. Per-step failures are recorded and
//! never abort later steps.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use arbor_domain::config::ArtifactConfig;
use arbor_store::{ArtifactStore, Store};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Report
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupStatus {
    Completed,
    Partial,
}

/// Outcome of one cascade deletion.
#[derive(Debug, Clone, Serialize)]
pub struct CleanupReport {
    pub project_id: String,
    pub status: CleanupStatus,
    /// Deleted-document counts per collection, in execution order keys.
    pub deletions: BTreeMap<&'static str, usize>,
    /// Artifact objects removed across both prefixes.
    pub artifact_objects_deleted: usize,
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CleanupService
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct CleanupService {
    store: Arc<Store>,
    artifacts: Arc<dyn ArtifactStore>,
    config: ArtifactConfig,
}

impl CleanupService {
    pub fn new(store: Arc<Store>, artifacts: Arc<dyn ArtifactStore>, config: ArtifactConfig) -> Self {
        Self {
            store,
            artifacts,
            config,
        }
    }

    /// Delete everything a project owned. Order is leaf → root so no step
    /// orphans records a later step needs to enumerate.
    pub async fn cascade_delete(&self, project_id: &str) -> CleanupReport {
        let started_at = Utc::now();
        tracing::info!(project_id, "starting cascade deletion");

        let mut deletions: BTreeMap<&'static str, usize> = BTreeMap::new();
        let mut errors: Vec<String> = Vec::new();

        // Artifact prefixes first: audit trails and project artifacts.
        let mut artifact_objects_deleted = 0;
        let audit_prefix = format!("audit/{}/", project_id.to_lowercase());
        match self
            .artifacts
            .delete_prefix(&self.config.audit_bucket, &audit_prefix)
            .await
        {
            Ok(count) => artifact_objects_deleted += count,
            Err(e) => errors.push(format!("audit trails deletion failed: {e}")),
        }
        let artifacts_prefix = format!("artifacts/{project_id}/");
        match self
            .artifacts
            .delete_prefix(&self.config.artifact_bucket, &artifacts_prefix)
            .await
        {
            Ok(count) => artifact_objects_deleted += count,
            Err(e) => errors.push(format!("artifacts deletion failed: {e}")),
        }

        // Database resources, leaf to root. Parent-id sets are collected
        // before their owners are removed.
        let project_match =
            |candidate: &str| -> bool { candidate.eq_ignore_ascii_case(project_id) };

        let gateway_ids: Vec<String> = self
            .store
            .gateways
            .find(|g| project_match(&g.project_id))
            .into_iter()
            .map(|g| g.id)
            .collect();
        let tool_ids: Vec<String> = self
            .store
            .mcp_tools
            .find(|t| gateway_ids.contains(&t.gateway_id))
            .into_iter()
            .map(|t| t.id)
            .collect();

        deletions.insert(
            "tool_invocations",
            self.store
                .tool_invocations
                .delete_where(|i| tool_ids.contains(&i.tool_id)),
        );
        deletions.insert(
            "mcp_tools",
            self.store
                .mcp_tools
                .delete_where(|t| gateway_ids.contains(&t.gateway_id)),
        );
        deletions.insert(
            "mcp_gateways",
            self.store
                .gateways
                .delete_where(|g| project_match(&g.project_id)),
        );
        deletions.insert(
            "tasks",
            self.store
                .tasks
                .delete_where(|t| project_match(&t.project_id)),
        );
        deletions.insert(
            "evaluation_runs",
            self.store
                .evaluation_runs
                .delete_where(|r| project_match(&r.project_id)),
        );
        deletions.insert(
            "evaluations",
            self.store
                .evaluations
                .delete_where(|e| project_match(&e.project_id)),
        );
        deletions.insert(
            "trainings",
            self.store
                .trainings
                .delete_where(|t| project_match(&t.project_id)),
        );
        deletions.insert(
            "data_sources",
            self.store
                .data_sources
                .delete_where(|d| project_match(&d.project_id)),
        );
        deletions.insert(
            "agents",
            self.store
                .agents
                .delete_where(|a| project_match(&a.project_id)),
        );

        let completed_at = Utc::now();
        let status = if errors.is_empty() {
            CleanupStatus::Completed
        } else {
            CleanupStatus::Partial
        };
        tracing::info!(
            project_id,
            ?status,
            artifact_objects_deleted,
            duration_ms = (completed_at - started_at).num_milliseconds(),
            "cascade deletion finished"
        );

        CleanupReport {
            project_id: project_id.to_string(),
            status,
            deletions,
            artifact_objects_deleted,
            errors,
            started_at,
            completed_at,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
