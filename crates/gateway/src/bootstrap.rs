//! Application assembly: wire the stores, caches, broker, dispatcher and
//! SDK into an [`AppState`], and spawn the broker consumers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use arbor_agent::{AgentSdk, EventStream, QueryOptions};
use arbor_broker::InMemoryBroker;
use arbor_cache::SessionCache;
use arbor_domain::config::Config;
use arbor_domain::{Error, Result};
use arbor_providers::ProviderRegistry;
use arbor_store::{ArtifactStore, FsArtifactStore, Store};

use crate::runtime::{ActiveRunnerMap, Dispatcher, TaskWorker};
use crate::state::AppState;
use crate::workspace::WorkspaceManager;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Unconfigured SDK
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Placeholder SDK used when no real agent SDK adapter is injected. The
/// gateway still boots (mirrors an allow-none startup policy); task
/// execution fails with a clear message until an adapter is wired in.
pub struct UnconfiguredSdk;

#[async_trait]
impl AgentSdk for UnconfiguredSdk {
    async fn query(&self, _prompt: &str, _options: &QueryOptions) -> Result<EventStream> {
        Err(Error::Model(
            "no agent SDK adapter configured — set ANTHROPIC_API_KEY and install \
             the SDK sidecar"
                .into(),
        ))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Assembly
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Build the shared state from a configuration and an SDK adapter.
pub fn build_state(config: Config, sdk: Arc<dyn AgentSdk>) -> AppState {
    let config = Arc::new(config);
    let store = Arc::new(Store::new());
    let sessions = Arc::new(SessionCache::new(Duration::from_secs(
        config.cache.session_ttl_secs,
    )));
    let broker = Arc::new(InMemoryBroker::new(config.broker.max_delivery_attempts));
    let artifacts: Arc<dyn ArtifactStore> = Arc::new(FsArtifactStore::new(
        config.workspace.base_path.join(".artifacts"),
    ));
    let dispatcher = Arc::new(Dispatcher::new(store.clone(), broker.clone()));
    let providers = Arc::new(ProviderRegistry::new(
        store.clone(),
        Duration::from_secs(config.cache.client_ttl_secs),
        config.cache.client_max_size,
    ));
    let workspaces = Arc::new(WorkspaceManager::new(config.workspace.clone()));

    AppState {
        config,
        store,
        sessions,
        broker,
        artifacts,
        sdk,
        dispatcher,
        active_runners: Arc::new(ActiveRunnerMap::new()),
        workspaces,
        providers,
    }
}

/// Spawn the configured number of broker consumers. Returns the shutdown
/// handle that stops them.
pub fn spawn_workers(state: &AppState) -> Arc<Notify> {
    let shutdown = Arc::new(Notify::new());
    for index in 0..state.config.server.worker_count.max(1) {
        let worker = Arc::new(TaskWorker::new(
            state.store.clone(),
            state.broker.clone(),
            state.sessions.clone(),
            state.artifacts.clone(),
            state.sdk.clone(),
            state.config.clone(),
        ));
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            tracing::info!(worker = index, "task worker started");
            worker.run(shutdown).await;
        });
    }
    shutdown
}
