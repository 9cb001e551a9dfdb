//! MCP tool metadata synthesis: ask a dedicated agent to describe a source
//! agent as an MCP tool, extract the JSON envelope from its response, and
//! flip the tool record to `ready`.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use arbor_domain::config::Config;
use arbor_domain::model::{Agent, McpToolStatus, TaskStatus};
use arbor_store::Store;

use super::dispatch::Dispatcher;

/// 5 s poll with a 300 s ceiling.
const POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_POLLS: u32 = 60;

/// Keys the synthesized envelope must carry.
const REQUIRED_FIELDS: [&str; 4] = ["tool_name", "description", "input_schema", "output_format"];

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// JSON extraction
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Strip stray backticks around quoted field names/values:
/// `"`tool_name`"` → `"tool_name"`.
fn clean_backticks(content: &str) -> String {
    let re = regex::Regex::new(r#""`([^`"]+)`""#).expect("static regex");
    re.replace_all(content, "\"$1\"").into_owned()
}

/// Pull a JSON object out of a model response: fenced ```json block first,
/// then the whole (cleaned) content, then any balanced object substring.
pub fn extract_json(content: &str) -> Option<String> {
    let fenced = regex::Regex::new(r"(?s)```json\s*\n(.*?)\n```").expect("static regex");
    if let Some(caps) = fenced.captures(content) {
        let cleaned = clean_backticks(caps[1].trim());
        if serde_json::from_str::<Value>(&cleaned).is_ok() {
            return Some(cleaned);
        }
    }

    let cleaned = clean_backticks(content.trim());
    if serde_json::from_str::<Value>(&cleaned).is_ok() {
        return Some(cleaned);
    }

    let balanced =
        regex::Regex::new(r"(?s)\{[^{}]*(?:\{[^{}]*\}[^{}]*)*\}").expect("static regex");
    for m in balanced.find_iter(content) {
        let candidate = clean_backticks(m.as_str());
        if serde_json::from_str::<Value>(&candidate).is_ok() {
            return Some(candidate);
        }
    }
    None
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Synthesis prompt
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn metadata_prompt(source: &Agent, tool_name: &str) -> String {
    let capabilities = if source.capabilities.is_empty() {
        "General purpose".to_string()
    } else {
        source
            .capabilities
            .iter()
            .map(|c| serde_json::to_value(c).ok().and_then(|v| v.as_str().map(String::from)))
            .map(|c| c.unwrap_or_default())
            .collect::<Vec<_>>()
            .join(", ")
    };

    format!(
        "You are an expert at converting AI agents into MCP (Model Context Protocol) tools.\n\
         Generate comprehensive metadata for an MCP tool based on the following agent information:\n\
         \n\
         AGENT INFORMATION:\n\
         - Name: {name}\n\
         - Description: {description}\n\
         - Instructions: {instructions}\n\
         - Capabilities: {capabilities}\n\
         - Output Format: {output_format}\n\
         - Tool Name: {tool_name}\n\
         \n\
         TASK: Generate metadata for this MCP tool that external applications can use.\n\
         \n\
         REQUIREMENTS:\n\
         - Create a clear, professional description (1-2 sentences)\n\
         - Design input schema following JSON Schema specification (an object with \
           \"type\", \"properties\" and \"required\")\n\
         - Consider the agent's capabilities when defining parameters\n\
         - Make the tool useful for external MCP clients\n\
         - Output format should match the agent's specified format\n\
         \n\
         Respond with a JSON object containing exactly these keys: \
         \"tool_name\", \"description\", \"input_schema\", \"output_format\".\n\
         \n\
         Generate the metadata now:",
        name = source.name,
        description = source.description.as_deref().unwrap_or("No description provided"),
        instructions = source.instructions.as_deref().unwrap_or("No specific instructions"),
        output_format = source.output_format,
    )
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ToolMetaOrchestrator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct ToolMetaOrchestrator {
    store: Arc<Store>,
    dispatcher: Arc<Dispatcher>,
    config: Arc<Config>,
    poll_interval: Duration,
    max_polls: u32,
}

impl ToolMetaOrchestrator {
    pub fn new(store: Arc<Store>, dispatcher: Arc<Dispatcher>, config: Arc<Config>) -> Self {
        Self {
            store,
            dispatcher,
            config,
            poll_interval: POLL_INTERVAL,
            max_polls: MAX_POLLS,
        }
    }

    /// Shrink the poll cadence/ceiling (tests).
    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls;
        self
    }

    /// Synthesize metadata for one tool and flip it `ready` (or `failed`).
    pub async fn generate(&self, tool_id: &str) {
        let Some(tool) = self.store.mcp_tools.get(tool_id) else {
            tracing::error!(tool_id, "tool not found");
            return;
        };
        let Some(source_agent) = self.store.agents.get(&tool.agent_id) else {
            self.mark_failed(tool_id, &format!("source agent {} not found", tool.agent_id));
            return;
        };

        self.store.mcp_tools.update(tool_id, |t| {
            t.status = McpToolStatus::Generating;
        });

        let (Some(metadata_agent_id), Some(metadata_project_id)) = (
            self.config.orchestration.metadata_agent_id.clone(),
            self.config.orchestration.metadata_project_id.clone(),
        ) else {
            self.mark_failed(
                tool_id,
                "MCP_TOOL_METADATA_GENERATION_AGENT_ID and \
                 MCP_TOOL_METADATA_GENERATION_PROJECT_ID are required",
            );
            return;
        };
        if self.store.agents.get(&metadata_agent_id).is_none() {
            self.mark_failed(
                tool_id,
                &format!("metadata generation agent {metadata_agent_id} not found"),
            );
            return;
        }

        let prompt = metadata_prompt(&source_agent, &tool.tool_name);
        let mut metadata = serde_json::Map::new();
        metadata.insert("tool_id".into(), Value::String(tool_id.to_string()));
        metadata.insert(
            "source_agent_id".into(),
            Value::String(tool.agent_id.clone()),
        );
        metadata.insert("gateway_id".into(), Value::String(tool.gateway_id.clone()));
        metadata.insert(
            "task_type".into(),
            Value::String("metadata_generation".into()),
        );

        let pair = match self
            .dispatcher
            .enqueue_pair(&metadata_project_id, &metadata_agent_id, &prompt, metadata)
            .await
        {
            Ok(pair) => pair,
            Err(e) => {
                self.mark_failed(tool_id, &format!("failed to create metadata task: {e}"));
                return;
            }
        };

        for _ in 0..self.max_polls {
            let Some(task) = self.store.tasks.get(&pair.assistant_task_id) else {
                self.mark_failed(tool_id, "metadata generation task not found");
                return;
            };
            match task.status {
                TaskStatus::Completed => {
                    self.apply_metadata(tool_id, &tool.gateway_id, &tool.agent_id, &task.content);
                    return;
                }
                TaskStatus::Failed => {
                    let reason = task
                        .metadata
                        .get("error")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown error");
                    self.mark_failed(tool_id, &format!("metadata generation failed: {reason}"));
                    return;
                }
                _ => tokio::time::sleep(self.poll_interval).await,
            }
        }

        self.mark_failed(tool_id, "Metadata generation timed out");
    }

    /// Parse, validate and apply the synthesized envelope.
    fn apply_metadata(&self, tool_id: &str, gateway_id: &str, source_agent_id: &str, content: &str) {
        let Some(json_content) = extract_json(content) else {
            self.mark_failed(tool_id, "failed to extract valid JSON from response");
            return;
        };
        let envelope: Value = match serde_json::from_str(&json_content) {
            Ok(v) => v,
            Err(e) => {
                self.mark_failed(tool_id, &format!("invalid JSON envelope: {e}"));
                return;
            }
        };

        let missing: Vec<&str> = REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|field| envelope.get(field).is_none())
            .collect();
        if !missing.is_empty() {
            self.mark_failed(
                tool_id,
                &format!("response missing required fields: {}", missing.join(", ")),
            );
            return;
        }

        // A ready tool must carry a usable JSON Schema.
        let schema = &envelope["input_schema"];
        if !schema.is_object() || schema.get("type").is_none() || schema.get("properties").is_none()
        {
            self.mark_failed(
                tool_id,
                "input_schema is not a JSON Schema object with type and properties",
            );
            return;
        }

        self.store.mcp_tools.update(tool_id, |t| {
            t.tool_name = envelope["tool_name"].as_str().unwrap_or(&t.tool_name).to_string();
            t.description = envelope["description"].as_str().unwrap_or_default().to_string();
            t.input_schema = envelope["input_schema"].clone();
            t.output_format = envelope["output_format"]
                .as_str()
                .unwrap_or_default()
                .to_string();
            t.status = McpToolStatus::Ready;
            t.enabled = true;
        });

        // Record the published tool on the source agent (deduplicated).
        self.store.agents.update(source_agent_id, |agent| {
            if agent.add_gateway_link(gateway_id, tool_id) {
                tracing::info!(
                    agent_id = source_agent_id,
                    gateway_id,
                    tool_id,
                    "gateway link added to agent metadata"
                );
            }
        });

        tracing::info!(tool_id, "tool metadata applied — tool is ready");
    }

    fn mark_failed(&self, tool_id: &str, error: &str) {
        tracing::error!(tool_id, error, "tool metadata synthesis failed");
        self.store.mcp_tools.update(tool_id, |t| {
            t.status = McpToolStatus::Failed;
            t.metadata
                .insert("error_message".into(), Value::String(error.to_string()));
        });
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_fenced_json_block() {
        let content = "Here is the metadata:\n```json\n{\"tool_name\": \"sum\"}\n```\nDone.";
        let json = extract_json(content).unwrap();
        assert_eq!(json, "{\"tool_name\": \"sum\"}");
    }

    #[test]
    fn extracts_bare_object() {
        let content = r#"{"tool_name": "sum", "description": "adds"}"#;
        assert!(extract_json(content).is_some());
    }

    #[test]
    fn extracts_embedded_object() {
        let content = "Sure! The envelope is {\"tool_name\": \"sum\"} as requested.";
        let json = extract_json(content).unwrap();
        assert_eq!(json, "{\"tool_name\": \"sum\"}");
    }

    #[test]
    fn cleans_backticked_field_names() {
        let content = "```json\n{\"`tool_name`\": \"sum\"}\n```";
        let json = extract_json(content).unwrap();
        assert_eq!(json, "{\"tool_name\": \"sum\"}");
    }

    #[test]
    fn nested_objects_survive_extraction() {
        let content = "prefix {\"input_schema\": {\"type\": \"object\", \"properties\": {}}} suffix";
        let json = extract_json(content).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["input_schema"]["type"], "object");
    }

    #[test]
    fn no_json_yields_none() {
        assert!(extract_json("I could not produce metadata.").is_none());
    }

    #[test]
    fn prompt_embeds_agent_fields() {
        let mut agent = Agent::new("proj", "sum");
        agent.description = Some("adds numbers".into());
        agent.instructions = Some("add numbers".into());
        agent.output_format = "number".into();

        let prompt = metadata_prompt(&agent, "sum_tool");
        assert!(prompt.contains("- Name: sum"));
        assert!(prompt.contains("- Description: adds numbers"));
        assert!(prompt.contains("- Instructions: add numbers"));
        assert!(prompt.contains("- Capabilities: General purpose"));
        assert!(prompt.contains("- Output Format: number"));
        assert!(prompt.contains("- Tool Name: sum_tool"));
        assert!(prompt.contains("\"tool_name\", \"description\", \"input_schema\", \"output_format\""));
    }
}
