use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use sha2::{Digest, Sha256};

use arbor_cache::{Lookup, TtlLruCache};
use arbor_domain::Result;
use arbor_store::Store;

use crate::client::{ProviderClient, ProviderKind};
use crate::credentials::CredentialFetcher;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config fingerprint
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Short stable hash of a provider config, so rotated credentials mint a
/// new cache entry instead of reusing a stale client.
pub fn config_fingerprint(config: &Value) -> String {
    let canonical = serde_json::to_string(config).unwrap_or_default();
    let digest = Sha256::digest(canonical.as_bytes());
    hex::encode(&digest[..4])
}

type ClientKey = (String, ProviderKind, String);

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Provider registry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Lazy per-project provider client factory with a TTL'd connection cache.
///
/// Lookups key on `(project, kind, config fingerprint)`. Expired or
/// LRU-evicted clients have their `cleanup` hook run before being dropped.
pub struct ProviderRegistry {
    credentials: CredentialFetcher,
    cache: TtlLruCache<ClientKey, Arc<ProviderClient>>,
}

impl ProviderRegistry {
    pub fn new(store: Arc<Store>, ttl: Duration, max_size: usize) -> Self {
        Self {
            credentials: CredentialFetcher::new(store),
            cache: TtlLruCache::new(ttl, max_size),
        }
    }

    /// Resolve a live client for `(project, kind)`, constructing and
    /// initializing one on a cache miss.
    pub async fn get_client(
        &self,
        project_id: &str,
        kind: ProviderKind,
    ) -> Result<Arc<ProviderClient>> {
        let config = self.credentials.fetch(project_id, kind)?;
        let key: ClientKey = (
            project_id.to_lowercase(),
            kind,
            config_fingerprint(&config),
        );

        match self.cache.get(&key) {
            Lookup::Hit(client) => return Ok(client),
            Lookup::Expired(stale) => stale.cleanup(),
            Lookup::Miss => {}
        }

        let client = Arc::new(ProviderClient::new(kind, config)?);
        client.initialize().await?;
        tracing::info!(project_id, provider = %kind, "constructed provider client");

        if let Some((_, evicted)) = self.cache.insert(key, client.clone()) {
            evicted.cleanup();
        }
        Ok(client)
    }

    /// Number of live cached clients.
    pub fn cached_clients(&self) -> usize {
        self.cache.len()
    }

    /// Dispose expired clients (periodic sweep).
    pub fn purge_expired(&self) -> usize {
        let expired = self.cache.purge_expired();
        let count = expired.len();
        for (_, client) in expired {
            client.cleanup();
        }
        count
    }

    /// Dispose every cached client (shutdown).
    pub fn shutdown(&self) {
        for (_, client) in self.cache.drain() {
            client.cleanup();
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_domain::model::DataSource;

    fn store_with_looker() -> Arc<Store> {
        let store = Arc::new(Store::new());
        store
            .data_sources
            .insert(DataSource::new(
                "proj",
                "looker",
                serde_json::json!({
                    "base_url": "https://looker.example.com",
                    "client_id": "id",
                    "client_secret": "secret",
                }),
            ))
            .unwrap();
        store
    }

    #[test]
    fn fingerprint_is_stable_and_config_sensitive() {
        let a = serde_json::json!({"base_url": "https://x", "token": "1"});
        let b = serde_json::json!({"base_url": "https://x", "token": "2"});
        assert_eq!(config_fingerprint(&a), config_fingerprint(&a));
        assert_ne!(config_fingerprint(&a), config_fingerprint(&b));
        assert_eq!(config_fingerprint(&a).len(), 8);
    }

    #[tokio::test]
    async fn get_client_caches_by_key() {
        let registry = ProviderRegistry::new(store_with_looker(), Duration::from_secs(60), 10);

        let first = registry
            .get_client("proj", ProviderKind::Looker)
            .await
            .unwrap();
        let second = registry
            .get_client("proj", ProviderKind::Looker)
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.cached_clients(), 1);
        assert!(first.is_initialized());
    }

    #[tokio::test]
    async fn rotated_credentials_mint_a_new_client() {
        let store = store_with_looker();
        let registry = ProviderRegistry::new(store.clone(), Duration::from_secs(60), 10);

        let first = registry
            .get_client("proj", ProviderKind::Looker)
            .await
            .unwrap();

        // Rotate the secret; the fingerprint changes and a fresh client is
        // constructed under a new key.
        let source_id = store
            .data_sources
            .find(|_| true)
            .into_iter()
            .next()
            .unwrap()
            .id;
        store.data_sources.update(&source_id, |d| {
            d.config["client_secret"] = serde_json::Value::String("rotated".into());
        });

        let second = registry
            .get_client("proj", ProviderKind::Looker)
            .await
            .unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(registry.cached_clients(), 2);
    }

    #[tokio::test]
    async fn expired_client_is_cleaned_up() {
        let registry = ProviderRegistry::new(store_with_looker(), Duration::from_millis(10), 10);

        let first = registry
            .get_client("proj", ProviderKind::Looker)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let second = registry
            .get_client("proj", ProviderKind::Looker)
            .await
            .unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        // The stale client's disposer ran.
        assert!(first.is_closed());
    }

    #[tokio::test]
    async fn missing_data_source_propagates_not_found() {
        let registry = ProviderRegistry::new(Arc::new(Store::new()), Duration::from_secs(60), 10);
        assert!(registry
            .get_client("proj", ProviderKind::Jira)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn shutdown_disposes_everything() {
        let registry = ProviderRegistry::new(store_with_looker(), Duration::from_secs(60), 10);
        let client = registry
            .get_client("proj", ProviderKind::Looker)
            .await
            .unwrap();
        registry.shutdown();
        assert!(client.is_closed());
        assert_eq!(registry.cached_clients(), 0);
    }
}
