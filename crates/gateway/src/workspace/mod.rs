//! Per-conversation workspace provisioning.
//!
//! Each task runs inside an isolated directory tree:
//!
//! ```text
//! <base>/<project>/<conversation_or_task>/work_dir/
//!     output/
//!     .claude/
//!         CLAUDE.md        (copied from the template)
//!         settings.json    (sandbox + permissions + mcpServers)
//!         skills/<name>/…  (copied from the template skills folder)
//! ```
//!
//! The tree is removed on every exit path — the [`Workspace`] guard cleans
//! up on drop.

pub mod settings;

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use arbor_domain::config::WorkspaceConfig;
use arbor_domain::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Workspace
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A provisioned workspace. Owned by exactly one runner for its lifetime;
/// the backing directory is removed when the guard drops.
pub struct Workspace {
    root: PathBuf,
    pub work_dir: PathBuf,
    pub claude_dir: PathBuf,
    pub skills_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Workspace {
    /// Skills available in this workspace (directories with a SKILL.md).
    pub fn available_skills(&self) -> Vec<String> {
        let mut skills = Vec::new();
        if let Ok(entries) = std::fs::read_dir(&self.skills_dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() && path.join("SKILL.md").exists() {
                    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                        skills.push(name.to_string());
                    }
                }
            }
        }
        skills.sort();
        skills
    }

    /// Remove the workspace tree now instead of waiting for drop.
    pub fn cleanup(self) {
        // Drop does the work.
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.root.exists() {
            if let Err(e) = std::fs::remove_dir_all(&self.root) {
                tracing::warn!(
                    path = %self.root.display(),
                    error = %e,
                    "failed to clean up workspace"
                );
            } else {
                tracing::debug!(path = %self.root.display(), "workspace removed");
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// WorkspaceManager
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Builds workspace trees under the configured base path.
pub struct WorkspaceManager {
    config: WorkspaceConfig,
}

impl WorkspaceManager {
    pub fn new(config: WorkspaceConfig) -> Self {
        Self { config }
    }

    /// Create the directory tree for `(project, scope)` and populate the
    /// `.claude` folder: template CLAUDE.md, generated settings.json, and
    /// template skills.
    pub fn provision(
        &self,
        project_id: &str,
        scope_id: &str,
        mcp_servers: &Map<String, Value>,
        mcp_tools: &[String],
    ) -> Result<Workspace> {
        let root = self.config.base_path.join(project_id).join(scope_id);
        let work_dir = root.join("work_dir");
        let claude_dir = work_dir.join(".claude");
        let skills_dir = claude_dir.join("skills");
        let output_dir = work_dir.join("output");

        for dir in [&work_dir, &claude_dir, &skills_dir, &output_dir] {
            std::fs::create_dir_all(dir)
                .map_err(|e| Error::Other(format!("creating {}: {e}", dir.display())))?;
        }

        self.write_claude_md(&claude_dir)?;
        self.write_settings(&claude_dir, &work_dir, mcp_servers, mcp_tools)?;
        self.copy_skills(&skills_dir);

        tracing::info!(
            project_id,
            scope_id,
            work_dir = %work_dir.display(),
            mcp_servers = mcp_servers.len(),
            mcp_tools = mcp_tools.len(),
            "workspace provisioned"
        );

        Ok(Workspace {
            root,
            work_dir,
            claude_dir,
            skills_dir,
            output_dir,
        })
    }

    fn write_claude_md(&self, claude_dir: &Path) -> Result<()> {
        let target = claude_dir.join("CLAUDE.md");
        let template = self.config.template_path.join("CLAUDE.md");
        if template.exists() {
            std::fs::copy(&template, &target)
                .map_err(|e| Error::Other(format!("copying CLAUDE.md template: {e}")))?;
        } else {
            tracing::warn!(
                template = %template.display(),
                "CLAUDE.md template missing; writing stub"
            );
            std::fs::write(&target, "# Arbor Agent\n\nNo CLAUDE.md template found.\n")
                .map_err(|e| Error::Other(format!("writing CLAUDE.md stub: {e}")))?;
        }
        Ok(())
    }

    fn write_settings(
        &self,
        claude_dir: &Path,
        work_dir: &Path,
        mcp_servers: &Map<String, Value>,
        mcp_tools: &[String],
    ) -> Result<()> {
        let rendered = settings::render_settings(
            work_dir,
            mcp_tools,
            mcp_servers,
            self.config.sandbox_enabled,
        );
        std::fs::write(claude_dir.join("settings.json"), rendered)
            .map_err(|e| Error::Other(format!("writing settings.json: {e}")))?;
        Ok(())
    }

    /// Copy template skills (directories containing SKILL.md). Individual
    /// copy failures are logged, not fatal.
    fn copy_skills(&self, skills_dir: &Path) {
        let source = self.config.template_path.join("skills");
        let Ok(entries) = std::fs::read_dir(&source) else {
            tracing::debug!(source = %source.display(), "no template skills directory");
            return;
        };
        for entry in entries.flatten() {
            let skill_path = entry.path();
            if !skill_path.is_dir() || !skill_path.join("SKILL.md").exists() {
                continue;
            }
            let Some(name) = skill_path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let dest = skills_dir.join(name);
            if let Err(e) = copy_dir(&skill_path, &dest) {
                tracing::warn!(skill = name, error = %e, "failed to copy skill");
            }
        }
    }
}

fn copy_dir(source: &Path, dest: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dest)?;
    for entry in std::fs::read_dir(source)? {
        let entry = entry?;
        let from = entry.path();
        let to = dest.join(entry.file_name());
        if from.is_dir() {
            copy_dir(&from, &to)?;
        } else {
            std::fs::copy(&from, &to)?;
        }
    }
    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(base: &Path, template: &Path) -> WorkspaceManager {
        WorkspaceManager::new(WorkspaceConfig {
            base_path: base.to_path_buf(),
            template_path: template.to_path_buf(),
            sandbox_enabled: true,
        })
    }

    #[test]
    fn provision_builds_expected_tree() {
        let base = tempfile::tempdir().unwrap();
        let template = tempfile::tempdir().unwrap();
        std::fs::write(template.path().join("CLAUDE.md"), "# Template").unwrap();

        let ws = manager(base.path(), template.path())
            .provision("proj", "conv-1", &Map::new(), &[])
            .unwrap();

        assert!(ws.work_dir.ends_with("proj/conv-1/work_dir"));
        assert!(ws.output_dir.is_dir());
        assert!(ws.skills_dir.is_dir());
        assert_eq!(
            std::fs::read_to_string(ws.claude_dir.join("CLAUDE.md")).unwrap(),
            "# Template"
        );
        let settings: Value = serde_json::from_str(
            &std::fs::read_to_string(ws.claude_dir.join("settings.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(settings["sandbox"]["enabled"], true);
    }

    #[test]
    fn missing_template_degrades_to_stub() {
        let base = tempfile::tempdir().unwrap();
        let template = tempfile::tempdir().unwrap();

        let ws = manager(base.path(), template.path())
            .provision("proj", "task-1", &Map::new(), &[])
            .unwrap();
        let body = std::fs::read_to_string(ws.claude_dir.join("CLAUDE.md")).unwrap();
        assert!(body.contains("No CLAUDE.md template found"));
    }

    #[test]
    fn skills_copied_when_present() {
        let base = tempfile::tempdir().unwrap();
        let template = tempfile::tempdir().unwrap();
        let skill = template.path().join("skills/csv-analysis");
        std::fs::create_dir_all(&skill).unwrap();
        std::fs::write(skill.join("SKILL.md"), "# csv").unwrap();
        std::fs::write(skill.join("helper.py"), "pass").unwrap();
        // A directory without SKILL.md is skipped.
        std::fs::create_dir_all(template.path().join("skills/not-a-skill")).unwrap();

        let ws = manager(base.path(), template.path())
            .provision("proj", "conv", &Map::new(), &[])
            .unwrap();

        assert_eq!(ws.available_skills(), vec!["csv-analysis"]);
        assert!(ws.skills_dir.join("csv-analysis/helper.py").exists());
    }

    #[test]
    fn drop_removes_tree() {
        let base = tempfile::tempdir().unwrap();
        let template = tempfile::tempdir().unwrap();

        let root;
        {
            let ws = manager(base.path(), template.path())
                .provision("proj", "conv", &Map::new(), &[])
                .unwrap();
            root = ws.work_dir.parent().unwrap().to_path_buf();
            assert!(root.exists());
        }
        assert!(!root.exists());
    }

    #[test]
    fn settings_include_mcp_configuration() {
        let base = tempfile::tempdir().unwrap();
        let template = tempfile::tempdir().unwrap();
        let mut servers = Map::new();
        servers.insert(
            "arbor".into(),
            serde_json::json!({"type": "http", "url": "http://mcp:9000", "timeout": 300000}),
        );

        let ws = manager(base.path(), template.path())
            .provision("proj", "conv", &servers, &["mcp__arbor__get_context".into()])
            .unwrap();

        let settings: Value = serde_json::from_str(
            &std::fs::read_to_string(ws.claude_dir.join("settings.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(settings["mcpServers"]["arbor"]["url"], "http://mcp:9000");
        let allow = settings["permissions"]["allow"].as_array().unwrap();
        assert!(allow.contains(&serde_json::json!("mcp__arbor__get_context")));
    }
}
