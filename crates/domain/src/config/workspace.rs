use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::env_or;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Workspace
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-conversation workspace provisioning settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Root under which `<project>/<conversation>/work_dir` trees are built.
    #[serde(default = "d_base_path")]
    pub base_path: PathBuf,
    /// Template directory holding `CLAUDE.md` and `skills/` to copy into
    /// each workspace. Missing templates degrade to a minimal stub.
    #[serde(default = "d_template_path")]
    pub template_path: PathBuf,
    /// Whether the sandbox block is enabled in generated settings.
    #[serde(default = "d_true")]
    pub sandbox_enabled: bool,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            base_path: d_base_path(),
            template_path: d_template_path(),
            sandbox_enabled: true,
        }
    }
}

impl WorkspaceConfig {
    pub fn from_env() -> Self {
        Self {
            base_path: PathBuf::from(env_or("WORKSPACE_BASE_PATH", "/data/workspaces")),
            template_path: PathBuf::from(env_or("WORKSPACE_TEMPLATE_PATH", "/app/.claude")),
            sandbox_enabled: env_or("SANDBOX_ENABLED", "true") != "false",
        }
    }
}

fn d_base_path() -> PathBuf {
    PathBuf::from("/data/workspaces")
}
fn d_template_path() -> PathBuf {
    PathBuf::from("/app/.claude")
}
fn d_true() -> bool {
    true
}
