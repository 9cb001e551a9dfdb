use serde::{Deserialize, Serialize};

use super::{env_or, env_parse};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM / agent SDK
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Settings for the external agent SDK invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API key for the upstream model provider. Never serialized back out.
    #[serde(skip_serializing, default)]
    pub api_key: Option<String>,
    /// Model identifier passed to every query unless an agent overrides it.
    #[serde(default = "d_default_model")]
    pub default_model: String,
    /// Maximum agentic turns per query.
    #[serde(default = "d_max_turns")]
    pub default_max_turns: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_model: d_default_model(),
            default_max_turns: d_max_turns(),
        }
    }
}

impl LlmConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("ANTHROPIC_API_KEY").ok().filter(|v| !v.is_empty()),
            default_model: env_or("DEFAULT_MODEL", &d_default_model()),
            default_max_turns: env_parse("DEFAULT_MAX_TURNS", d_max_turns()),
        }
    }
}

fn d_default_model() -> String {
    "claude-sonnet-4-20250514".into()
}
fn d_max_turns() -> u32 {
    15
}
