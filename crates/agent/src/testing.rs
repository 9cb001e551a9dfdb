//! Scripted SDK double for tests: each `query` pops the next script and
//! replays it as an event stream, recording the prompt it was given.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use arbor_domain::{Error, Result};

use crate::sdk::{AgentEvent, AgentSdk, ContentBlock, EventStream, QueryOptions};

enum Script {
    Events(Vec<AgentEvent>),
    /// The stream fails mid-flight with this message.
    Failure(String),
}

/// In-memory [`AgentSdk`] whose responses are queued up by the test.
#[derive(Default)]
pub struct ScriptedSdk {
    scripts: Mutex<VecDeque<Script>>,
    prompts: Mutex<Vec<String>>,
    event_delay: Mutex<Duration>,
}

impl ScriptedSdk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay between replayed events (lets cancellation tests interleave).
    pub fn set_event_delay(&self, delay: Duration) {
        *self.event_delay.lock() = delay;
    }

    /// Queue an arbitrary event script for the next query.
    pub fn push_script(&self, events: Vec<AgentEvent>) {
        self.scripts.lock().push_back(Script::Events(events));
    }

    /// Queue a canonical text reply: one assistant message followed by a
    /// terminal result echoing the same text.
    pub fn push_reply(&self, text: &str, session_id: Option<&str>) {
        self.push_script(vec![
            AgentEvent::Assistant {
                content: vec![ContentBlock::Text { text: text.into() }],
            },
            AgentEvent::Result {
                result: Some(text.into()),
                duration_ms: 5,
                session_id: session_id.map(str::to_string),
                is_error: false,
            },
        ]);
    }

    /// Queue a stream that errors out.
    pub fn push_failure(&self, message: &str) {
        self.scripts
            .lock()
            .push_back(Script::Failure(message.into()));
    }

    /// Prompts observed so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    /// Number of queued scripts not yet consumed.
    pub fn remaining_scripts(&self) -> usize {
        self.scripts.lock().len()
    }
}

#[async_trait]
impl AgentSdk for ScriptedSdk {
    async fn query(&self, prompt: &str, _options: &QueryOptions) -> Result<EventStream> {
        self.prompts.lock().push(prompt.to_string());
        let script = self
            .scripts
            .lock()
            .pop_front()
            .ok_or_else(|| Error::Transport("no scripted response queued".into()))?;
        let delay = *self.event_delay.lock();

        let stream = async_stream::stream! {
            match script {
                Script::Events(events) => {
                    for event in events {
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                        yield Ok(event);
                    }
                }
                Script::Failure(message) => {
                    yield Err(Error::Model(message));
                }
            }
        };
        Ok(Box::pin(stream))
    }
}
