use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session cache
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct SessionEntry {
    session_id: String,
    expires_at: Instant,
}

/// Conversation-id → SDK-session-id cache with a TTL (default 24 h).
///
/// Session ids flow out of the SDK's terminal event and back into this cache
/// so the next message in the same conversation resumes server-side history.
pub struct SessionCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, SessionEntry>>,
}

impl SessionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Look up the cached session id, dropping the entry if it expired.
    pub fn get(&self, conversation_id: &str) -> Option<String> {
        {
            let entries = self.entries.read();
            match entries.get(conversation_id) {
                Some(e) if e.expires_at > Instant::now() => return Some(e.session_id.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        // Entry exists but expired.
        self.entries.write().remove(conversation_id);
        None
    }

    /// Store (or refresh) the session id for a conversation.
    pub fn set(&self, conversation_id: &str, session_id: &str) {
        self.entries.write().insert(
            conversation_id.to_string(),
            SessionEntry {
                session_id: session_id.to_string(),
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    pub fn delete(&self, conversation_id: &str) -> bool {
        self.entries.write().remove(conversation_id).is_some()
    }

    /// Drop all expired entries; returns the purge count.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_delete() {
        let cache = SessionCache::new(Duration::from_secs(60));
        assert!(cache.get("conv-1").is_none());

        cache.set("conv-1", "sess-a");
        assert_eq!(cache.get("conv-1").as_deref(), Some("sess-a"));

        // Overwrite refreshes the value.
        cache.set("conv-1", "sess-b");
        assert_eq!(cache.get("conv-1").as_deref(), Some("sess-b"));

        assert!(cache.delete("conv-1"));
        assert!(!cache.delete("conv-1"));
        assert!(cache.get("conv-1").is_none());
    }

    #[test]
    fn expired_entry_is_dropped_on_get() {
        let cache = SessionCache::new(Duration::from_millis(10));
        cache.set("conv-1", "sess-a");
        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.get("conv-1").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn purge_expired_sweeps() {
        let cache = SessionCache::new(Duration::from_millis(10));
        cache.set("a", "1");
        cache.set("b", "2");
        std::thread::sleep(Duration::from_millis(20));
        cache.set("c", "3");

        assert_eq!(cache.purge_expired(), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("c").as_deref(), Some("3"));
    }
}
