use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::cancel::{CancelToken, CancellationOracle};
use crate::prompt::{build_prompt, retry_prompt, DEFAULT_ERROR_MESSAGE, TASK_CANCELLED_MESSAGE};
use crate::sdk::{AgentEvent, AgentSdk, ContentBlock, QueryOptions};

/// Default cadence for cancellation-oracle polls.
const CANCEL_CHECK_INTERVAL: Duration = Duration::from_secs(5);

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Run outcome
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Result of a (possibly retried) agent run.
#[derive(Debug)]
pub struct RunOutcome {
    /// The final answer, or an error/cancellation sentinel.
    pub generation: String,
    /// Every event observed, concatenated across retry attempts — the
    /// audit trail consumers persist.
    pub messages: Vec<AgentEvent>,
    pub cancelled: bool,
    pub is_error: bool,
    /// Session id from the SDK's terminal event, for conversation resume.
    pub session_id: Option<String>,
    pub attempts: u32,
}

/// Whether a generation is the error sentinel that triggers a retry.
fn is_error_sentinel(generation: &str) -> bool {
    if generation == DEFAULT_ERROR_MESSAGE {
        return true;
    }
    let lower = generation.to_lowercase();
    lower.contains("something went wrong") || lower.contains("execution failed")
}

struct Invocation {
    generation: String,
    messages: Vec<AgentEvent>,
    session_id: Option<String>,
    cancelled: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Streaming events (SSE-visible)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Events surfaced to SSE clients for one streamed message.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    MessageChunk {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: Value,
    },
    Result {
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        duration_ms: u64,
        is_error: bool,
    },
    Error {
        message: String,
    },
}

impl StreamEvent {
    /// The SSE `event:` name for this payload.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::MessageChunk { .. } => "message_chunk",
            Self::ToolUse { .. } => "tool_use",
            Self::ToolResult { .. } => "tool_result",
            Self::Result { .. } => "result",
            Self::Error { .. } => "error",
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AgentRunner
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Drives one SDK query to completion: builds the prompt, polls the
/// cancellation oracle between events, retries on the error sentinel, and
/// extracts the final answer + session id from the event stream.
pub struct AgentRunner {
    sdk: Arc<dyn AgentSdk>,
    options: QueryOptions,
    cancel_check_interval: Duration,
}

impl AgentRunner {
    pub fn new(sdk: Arc<dyn AgentSdk>, options: QueryOptions) -> Self {
        Self {
            sdk,
            options,
            cancel_check_interval: CANCEL_CHECK_INTERVAL,
        }
    }

    /// Shrink the oracle poll interval (tests).
    pub fn with_cancel_check_interval(mut self, interval: Duration) -> Self {
        self.cancel_check_interval = interval;
        self
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    // ── Blocking run with retry ───────────────────────────────────────

    /// Execute the query, retrying up to `max_attempts` times total when
    /// the answer is the error sentinel. Cancellation is never retried.
    pub async fn run(
        &self,
        question: &str,
        context: &str,
        output_format: &str,
        oracle: Option<&dyn CancellationOracle>,
        max_attempts: u32,
    ) -> RunOutcome {
        let user_prompt = build_prompt(question, context, output_format);
        let max_attempts = max_attempts.max(1);
        let mut last_error: Option<String> = None;
        let mut all_messages: Vec<AgentEvent> = Vec::new();

        for attempt in 1..=max_attempts {
            let prompt = match &last_error {
                Some(error) if attempt > 1 => {
                    tracing::info!(attempt, max_attempts, "retrying agent invocation");
                    retry_prompt(&user_prompt, attempt, max_attempts, error)
                }
                _ => user_prompt.clone(),
            };

            let invocation = self.invoke(&prompt, oracle).await;
            all_messages.extend(invocation.messages);

            if invocation.cancelled {
                return RunOutcome {
                    generation: TASK_CANCELLED_MESSAGE.to_string(),
                    messages: all_messages,
                    cancelled: true,
                    is_error: false,
                    session_id: invocation.session_id,
                    attempts: attempt,
                };
            }

            if is_error_sentinel(&invocation.generation) {
                tracing::warn!(
                    attempt,
                    max_attempts,
                    preview = %invocation.generation.chars().take(200).collect::<String>(),
                    "agent attempt failed"
                );
                last_error = Some(invocation.generation.clone());
                if attempt < max_attempts {
                    continue;
                }
                return RunOutcome {
                    generation: invocation.generation,
                    messages: all_messages,
                    cancelled: false,
                    is_error: true,
                    session_id: invocation.session_id,
                    attempts: attempt,
                };
            }

            tracing::info!(attempt, "agent invocation completed");
            return RunOutcome {
                generation: invocation.generation,
                messages: all_messages,
                cancelled: false,
                is_error: false,
                session_id: invocation.session_id,
                attempts: attempt,
            };
        }

        RunOutcome {
            generation: DEFAULT_ERROR_MESSAGE.to_string(),
            messages: all_messages,
            cancelled: false,
            is_error: true,
            session_id: None,
            attempts: max_attempts,
        }
    }

    /// One SDK invocation. Stream errors degrade to the error sentinel so
    /// the retry loop can decide what to do.
    async fn invoke(&self, prompt: &str, oracle: Option<&dyn CancellationOracle>) -> Invocation {
        let started = Instant::now();
        let mut messages: Vec<AgentEvent> = Vec::new();
        let mut final_result = String::new();
        let mut session_id: Option<String> = None;
        let mut tool_count = 0usize;
        let mut last_check: Option<Instant> = None;

        let mut stream = match self.sdk.query(prompt, &self.options).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!(error = %e, "agent query failed to start");
                return Invocation {
                    generation: DEFAULT_ERROR_MESSAGE.to_string(),
                    messages,
                    session_id,
                    cancelled: false,
                };
            }
        };

        while let Some(item) = stream.next().await {
            // Poll the oracle at most once per interval; the first event
            // always checks so pre-cancelled runs stop immediately.
            if let Some(oracle) = oracle {
                let due = last_check.is_none_or(|t| t.elapsed() >= self.cancel_check_interval);
                if due {
                    last_check = Some(Instant::now());
                    if oracle.is_cancelled().await {
                        tracing::info!("task cancelled — closing event stream");
                        return Invocation {
                            generation: TASK_CANCELLED_MESSAGE.to_string(),
                            messages,
                            session_id,
                            cancelled: true,
                        };
                    }
                }
            }

            match item {
                Ok(event) => {
                    messages.push(event.clone());
                    match event {
                        AgentEvent::Assistant { content } => {
                            for block in content {
                                match block {
                                    ContentBlock::Text { text } => final_result = text,
                                    ContentBlock::ToolUse { name, .. } => {
                                        tool_count += 1;
                                        tracing::debug!(tool = %name, "tool use");
                                    }
                                    _ => {}
                                }
                            }
                        }
                        AgentEvent::Result {
                            result,
                            duration_ms,
                            session_id: sid,
                            ..
                        } => {
                            if let Some(result) = result {
                                final_result = result;
                            }
                            if sid.is_some() {
                                session_id = sid;
                            }
                            tracing::info!(
                                events = messages.len(),
                                tools = tool_count,
                                duration_ms,
                                "query completed"
                            );
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "error in agent event stream");
                    return Invocation {
                        generation: DEFAULT_ERROR_MESSAGE.to_string(),
                        messages,
                        session_id,
                        cancelled: false,
                    };
                }
            }
        }

        tracing::debug!(elapsed_ms = started.elapsed().as_millis() as u64, "stream drained");
        Invocation {
            generation: if final_result.is_empty() {
                DEFAULT_ERROR_MESSAGE.to_string()
            } else {
                final_result
            },
            messages,
            session_id,
            cancelled: false,
        }
    }

    // ── Streaming run (SSE) ───────────────────────────────────────────

    /// Stream one query as SSE-visible events. No retry on this path —
    /// errors surface to the client as an `error` event. Cancellation ends
    /// the stream with a `result` event carrying the cancellation notice.
    pub fn stream(
        &self,
        question: &str,
        context: &str,
        output_format: &str,
        cancel: CancelToken,
    ) -> mpsc::Receiver<StreamEvent> {
        let (tx, rx) = mpsc::channel(64);
        let sdk = self.sdk.clone();
        let options = self.options.clone();
        let interval = self.cancel_check_interval;
        let prompt = build_prompt(question, context, output_format);

        tokio::spawn(async move {
            let started = Instant::now();
            let mut stream = match sdk.query(&prompt, &options).await {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = tx
                        .send(StreamEvent::Error {
                            message: e.to_string(),
                        })
                        .await;
                    return;
                }
            };

            let mut session_id: Option<String> = None;
            let mut last_check: Option<Instant> = None;

            while let Some(item) = stream.next().await {
                let due = last_check.is_none_or(|t| t.elapsed() >= interval);
                if due {
                    last_check = Some(Instant::now());
                    if cancel.is_cancelled() {
                        let _ = tx
                            .send(StreamEvent::Result {
                                result: Some(TASK_CANCELLED_MESSAGE.to_string()),
                                session_id: session_id.clone(),
                                duration_ms: started.elapsed().as_millis() as u64,
                                is_error: true,
                            })
                            .await;
                        return;
                    }
                }

                match item {
                    Ok(AgentEvent::Assistant { content }) => {
                        for block in content {
                            let event = match block {
                                ContentBlock::Text { text } => {
                                    Some(StreamEvent::MessageChunk { text })
                                }
                                ContentBlock::ToolUse { id, name, input } => {
                                    Some(StreamEvent::ToolUse { id, name, input })
                                }
                                ContentBlock::ToolResult {
                                    tool_use_id,
                                    content,
                                } => Some(StreamEvent::ToolResult {
                                    tool_use_id,
                                    content,
                                }),
                                ContentBlock::Thinking { .. } => None,
                            };
                            if let Some(event) = event {
                                if tx.send(event).await.is_err() {
                                    return; // client went away
                                }
                            }
                        }
                    }
                    Ok(AgentEvent::Result {
                        result,
                        duration_ms,
                        session_id: sid,
                        is_error,
                    }) => {
                        if sid.is_some() {
                            session_id = sid;
                        }
                        let _ = tx
                            .send(StreamEvent::Result {
                                result,
                                session_id: session_id.clone(),
                                duration_ms,
                                is_error,
                            })
                            .await;
                    }
                    Err(e) => {
                        let _ = tx
                            .send(StreamEvent::Error {
                                message: e.to_string(),
                            })
                            .await;
                        return;
                    }
                }
            }
        });

        rx
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
