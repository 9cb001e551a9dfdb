use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{impl_document, new_id};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Project
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Tenancy root. Owns agents, tasks, trainings, evaluations, gateways,
/// data sources and folder uploads; deleting a project cascades through
/// the cleanup service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub organization_id: String,
    /// Unique within the organization; enforced before insert.
    pub name: String,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
impl_document!(Project);

impl Project {
    pub fn new(organization_id: &str, name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            organization_id: organization_id.to_string(),
            name: name.to_string(),
            members: Vec::new(),
            api_key: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Document;

    #[test]
    fn new_project_has_fresh_id_and_timestamps() {
        let p = Project::new("org-1", "analytics");
        assert!(!p.id.is_empty());
        assert_eq!(p.organization_id, "org-1");
        assert_eq!(p.name, "analytics");
        assert!(p.members.is_empty());
    }

    #[test]
    fn touch_advances_updated_at() {
        let mut p = Project::new("org-1", "analytics");
        let before = p.updated_at;
        std::thread::sleep(std::time::Duration::from_millis(2));
        p.touch();
        assert!(p.updated_at > before);
    }
}
