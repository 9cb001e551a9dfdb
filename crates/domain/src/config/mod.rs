mod llm;
mod mcp;
mod messaging;
mod orchestration;
mod server;
mod storage;
mod uploads;
mod workspace;

pub use llm::*;
pub use mcp::*;
pub use messaging::*;
pub use orchestration::*;
pub use server::*;
pub use storage::*;
pub use uploads::*;
pub use workspace::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Platform configuration, assembled from the environment.
///
/// Every section has working defaults so a bare `Config::default()` is a
/// runnable dev configuration; `Config::from_env()` overlays the documented
/// environment variables on top of those defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub artifacts: ArtifactConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub mcp: McpConfig,
    #[serde(default)]
    pub uploads: UploadsConfig,
    #[serde(default)]
    pub orchestration: OrchestrationConfig,
}

impl Config {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig::from_env(),
            llm: LlmConfig::from_env(),
            store: StoreConfig::from_env(),
            cache: CacheConfig::from_env(),
            broker: BrokerConfig::from_env(),
            artifacts: ArtifactConfig::from_env(),
            workspace: WorkspaceConfig::from_env(),
            mcp: McpConfig::from_env(),
            uploads: UploadsConfig::default(),
            orchestration: OrchestrationConfig::from_env(),
        }
    }
}

/// Read an environment variable, falling back to a default.
pub(crate) fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read an environment variable and parse it, falling back on absence or
/// parse failure.
pub(crate) fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }

        if self.server.host.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.host".into(),
                message: "host must not be empty".into(),
            });
        }

        if self.llm.default_model.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "llm.default_model".into(),
                message: "default model must not be empty".into(),
            });
        }

        if self.llm.default_max_turns == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "llm.default_max_turns".into(),
                message: "max turns must be greater than 0".into(),
            });
        }

        if self.llm.api_key.is_none() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "llm.api_key".into(),
                message: "ANTHROPIC_API_KEY is unset — agent invocations will fail".into(),
            });
        }

        if self.broker.max_delivery_attempts == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "broker.max_delivery_attempts".into(),
                message: "delivery attempts must be greater than 0".into(),
            });
        }

        if self.cache.session_ttl_secs == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "cache.session_ttl_secs".into(),
                message: "session TTL must be greater than 0".into(),
            });
        }

        if self.workspace.base_path.as_os_str().is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "workspace.base_path".into(),
                message: "workspace base path must not be empty".into(),
            });
        }

        if self.mcp.timeout_ms == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "mcp.timeout_ms".into(),
                message: "MCP timeout must be greater than 0".into(),
            });
        }

        for (field, value) in [
            ("uploads.max_file_size", self.uploads.max_file_size),
            ("uploads.max_folder_size", self.uploads.max_folder_size),
        ] {
            if value == 0 {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: field.into(),
                    message: "size limit must be greater than 0".into(),
                });
            }
        }

        if self.orchestration.metadata_agent_id.is_none() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "orchestration.metadata_agent_id".into(),
                message: "MCP_TOOL_METADATA_GENERATION_AGENT_ID is unset — \
                          tool metadata synthesis is disabled"
                    .into(),
            });
        }

        errors
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
