//! Sandbox policy generation for workspace `settings.json` files.
//!
//! Generation is pure: identical `(work_dir, mcp_tools, mcp_servers)`
//! inputs produce byte-identical output.

use std::path::Path;

use serde_json::{json, Map, Value};

/// Tool scopes granted inside the working directory.
const SCOPED_TOOLS: [&str; 4] = ["Read", "Write", "Bash", "Python"];

/// Paths denied to every scoped tool: parent directories, shared system
/// locations, home trees, env files and local secrets.
const DENIED_PATHS: [&str; 8] = [
    "../**",
    "/tmp/**",
    "/app/**",
    "/Users/**",
    "/home/**",
    ".env",
    ".env.*",
    "./secrets/**",
];

/// Build the sandbox + permissions policy object.
pub fn build_settings(
    work_dir: &Path,
    mcp_tools: &[String],
    mcp_servers: &Map<String, Value>,
    sandbox_enabled: bool,
) -> Value {
    let work_dir = work_dir.display();

    let mut allow: Vec<String> = SCOPED_TOOLS
        .iter()
        .map(|tool| format!("{tool}({work_dir}/**)"))
        .collect();
    allow.extend(mcp_tools.iter().cloned());

    // Every scoped tool carries the full deny set.
    let deny: Vec<String> = SCOPED_TOOLS
        .iter()
        .flat_map(|tool| {
            DENIED_PATHS
                .iter()
                .map(move |path| format!("{tool}({path})"))
        })
        .collect();

    let mut settings = json!({
        "sandbox": {
            "enabled": sandbox_enabled,
            "autoAllowBashIfSandboxed": true,
            "excludedCommands": ["docker"],
            "network": {
                "allowLocalBinding": true
            }
        },
        "permissions": {
            "allow": allow,
            "deny": deny
        }
    });

    if !mcp_servers.is_empty() {
        settings["mcpServers"] = Value::Object(mcp_servers.clone());
    }

    settings
}

/// Serialize the policy for writing to disk.
pub fn render_settings(
    work_dir: &Path,
    mcp_tools: &[String],
    mcp_servers: &Map<String, Value>,
    sandbox_enabled: bool,
) -> String {
    let settings = build_settings(work_dir, mcp_tools, mcp_servers, sandbox_enabled);
    serde_json::to_string_pretty(&settings).unwrap_or_else(|_| "{}".to_string())
}
