use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{impl_document, new_id};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Folder upload
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One file within an uploaded folder tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderFile {
    pub relative_path: String,
    pub file_size: u64,
    pub content_type: String,
    pub s3_key: String,
    /// Directory depth (0 for root-level files).
    pub depth: u32,
    /// Parent directory, empty for root-level files.
    #[serde(default)]
    pub parent_path: String,
}

/// Manifest of an uploaded folder tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderUpload {
    pub id: String,
    pub project_id: String,
    pub name: String,
    #[serde(default)]
    pub files: Vec<FolderFile>,
    pub total_files: usize,
    pub total_size: u64,
    pub max_depth: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
impl_document!(FolderUpload);

impl FolderUpload {
    /// Build the manifest from validated files, deriving the totals.
    pub fn new(project_id: &str, name: &str, files: Vec<FolderFile>) -> Self {
        let now = Utc::now();
        let total_files = files.len();
        let total_size = files.iter().map(|f| f.file_size).sum();
        let max_depth = files.iter().map(|f| f.depth).max().unwrap_or(0);
        Self {
            id: new_id(),
            project_id: project_id.to_string(),
            name: name.to_string(),
            files,
            total_files,
            total_size,
            max_depth,
            created_at: now,
            updated_at: now,
        }
    }
}
