//! Process-wide map of live streaming runners, keyed
//! `{conversation_id}:{message_id}`, so the interrupt endpoint can flip a
//! runner's cancel flag without holding any reference to the stream.

use std::collections::HashMap;

use parking_lot::Mutex;

use arbor_agent::CancelToken;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ActiveRunnerMap
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Default)]
pub struct ActiveRunnerMap {
    tokens: Mutex<HashMap<String, CancelToken>>,
}

fn runner_key(conversation_id: &str, message_id: &str) -> String {
    format!("{conversation_id}:{message_id}")
}

impl ActiveRunnerMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a live runner and hand back its cancel token.
    pub fn register(&self, conversation_id: &str, message_id: &str) -> CancelToken {
        let token = CancelToken::new();
        self.tokens
            .lock()
            .insert(runner_key(conversation_id, message_id), token.clone());
        token
    }

    /// Remove a runner when its stream ends.
    pub fn unregister(&self, conversation_id: &str, message_id: &str) {
        self.tokens
            .lock()
            .remove(&runner_key(conversation_id, message_id));
    }

    /// Interrupt one message's runner. Returns false when nothing is live.
    pub fn interrupt(&self, conversation_id: &str, message_id: &str) -> bool {
        if let Some(token) = self
            .tokens
            .lock()
            .get(&runner_key(conversation_id, message_id))
        {
            token.cancel();
            return true;
        }
        false
    }

    /// Interrupt every live runner for a conversation; returns how many
    /// were signalled.
    pub fn interrupt_conversation(&self, conversation_id: &str) -> usize {
        let prefix = format!("{conversation_id}:");
        let tokens = self.tokens.lock();
        let mut signalled = 0;
        for (key, token) in tokens.iter() {
            if key.starts_with(&prefix) {
                token.cancel();
                signalled += 1;
            }
        }
        signalled
    }

    pub fn active_count(&self) -> usize {
        self.tokens.lock().len()
    }
}
