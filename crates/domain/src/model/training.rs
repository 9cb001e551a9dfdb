use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{impl_document, new_id};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Training
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
}

impl TrainingStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectMdStatus {
    InProgress,
    Completed,
    Failed,
}

/// Embedded sub-state for project.md generation. All fields start unset;
/// the documentation orchestrator fills them in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectMdState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ProjectMdStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation_agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation_project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// A long-running data-scan job plus its documentation sub-state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Training {
    pub id: String,
    pub project_id: String,
    #[serde(default)]
    pub data_source_ids: Vec<String>,
    pub status: TrainingStatus,
    /// Scan progress, 0–100.
    #[serde(default)]
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub projectmd: ProjectMdState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
impl_document!(Training);

impl Training {
    pub fn new(project_id: &str, data_source_ids: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            project_id: project_id.to_string(),
            data_source_ids,
            status: TrainingStatus::Queued,
            progress: 0,
            error: None,
            projectmd: ProjectMdState::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_training_has_no_projectmd_state() {
        let t = Training::new("proj", vec!["ds-1".into()]);
        assert_eq!(t.status, TrainingStatus::Queued);
        assert!(t.projectmd.status.is_none());
        assert!(t.projectmd.s3_url.is_none());
    }

    #[test]
    fn projectmd_status_serialization() {
        assert_eq!(
            serde_json::to_string(&ProjectMdStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
    }

    #[test]
    fn empty_projectmd_serializes_compactly() {
        let t = Training::new("proj", vec![]);
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["projectmd"], serde_json::json!({}));
    }
}
