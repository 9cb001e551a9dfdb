use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TTL + LRU cache
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct Entry<V> {
    value: V,
    created_at: Instant,
    last_used: Instant,
}

/// Lookup outcome. Expired values are handed back to the caller so any
/// disposer (e.g. a provider client's `cleanup`) can run.
pub enum Lookup<V> {
    Hit(V),
    Expired(V),
    Miss,
}

/// Bounded cache with per-entry TTL and least-recently-used eviction.
///
/// The cache never runs disposers itself — `insert`, `get` and
/// `purge_expired` return displaced values for the caller to tear down.
pub struct TtlLruCache<K: Eq + Hash + Clone, V: Clone> {
    ttl: Duration,
    max_size: usize,
    entries: Mutex<HashMap<K, Entry<V>>>,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlLruCache<K, V> {
    pub fn new(ttl: Duration, max_size: usize) -> Self {
        Self {
            ttl,
            max_size: max_size.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Insert a value. When the cache is full, the least-recently-used
    /// entry is evicted and returned for disposal.
    pub fn insert(&self, key: K, value: V) -> Option<(K, V)> {
        let mut entries = self.entries.lock();
        let now = Instant::now();

        let mut evicted = None;
        if !entries.contains_key(&key) && entries.len() >= self.max_size {
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone())
            {
                if let Some(entry) = entries.remove(&oldest) {
                    evicted = Some((oldest, entry.value));
                }
            }
        }

        entries.insert(
            key,
            Entry {
                value,
                created_at: now,
                last_used: now,
            },
        );
        evicted
    }

    /// Look up a value, refreshing its LRU position on a hit. An expired
    /// entry is removed and returned as [`Lookup::Expired`].
    pub fn get(&self, key: &K) -> Lookup<V> {
        let mut entries = self.entries.lock();
        let now = Instant::now();

        let expired = match entries.get_mut(key) {
            Some(entry) if now.duration_since(entry.created_at) < self.ttl => {
                entry.last_used = now;
                return Lookup::Hit(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            if let Some(entry) = entries.remove(key) {
                return Lookup::Expired(entry.value);
            }
        }
        Lookup::Miss
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.entries.lock().remove(key).map(|e| e.value)
    }

    /// Remove all expired entries and return them for disposal.
    pub fn purge_expired(&self) -> Vec<(K, V)> {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        let expired_keys: Vec<K> = entries
            .iter()
            .filter(|(_, e)| now.duration_since(e.created_at) >= self.ttl)
            .map(|(k, _)| k.clone())
            .collect();
        expired_keys
            .into_iter()
            .filter_map(|k| entries.remove(&k).map(|e| (k, e.value)))
            .collect()
    }

    /// Drain every entry (shutdown path).
    pub fn drain(&self) -> Vec<(K, V)> {
        self.entries
            .lock()
            .drain()
            .map(|(k, e)| (k, e.value))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
