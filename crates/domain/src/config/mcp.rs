use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::env_parse;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// MCP servers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// MCP server endpoints injected into each workspace's sandbox file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    /// Server name → base URL. Written into `settings.json` under
    /// `mcpServers` together with the timeout.
    #[serde(default)]
    pub servers: HashMap<String, String>,
    /// Per-call timeout in milliseconds.
    #[serde(default = "d_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            servers: HashMap::new(),
            timeout_ms: d_timeout_ms(),
        }
    }
}

impl McpConfig {
    pub fn from_env() -> Self {
        let mut servers = HashMap::new();
        // Known server endpoints; each is optional.
        for (name, var) in [
            ("arbor", "ARBOR_MCP_SERVER_URL"),
            ("db", "DB_MCP_SERVER_URL"),
            ("tools", "TOOLS_MCP_SERVER_URL"),
        ] {
            if let Ok(url) = std::env::var(var) {
                if !url.is_empty() {
                    servers.insert(name.to_string(), url);
                }
            }
        }
        Self {
            servers,
            timeout_ms: env_parse("MCP_TIMEOUT", d_timeout_ms()),
        }
    }

    /// Render the `mcpServers` object for a workspace `settings.json`.
    pub fn server_entries(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut map = serde_json::Map::new();
        let mut names: Vec<_> = self.servers.keys().collect();
        names.sort();
        for name in names {
            map.insert(
                name.clone(),
                serde_json::json!({
                    "type": "http",
                    "url": self.servers[name],
                    "timeout": self.timeout_ms,
                }),
            );
        }
        map
    }
}

fn d_timeout_ms() -> u64 {
    300_000
}
