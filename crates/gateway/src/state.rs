use std::sync::Arc;

use arbor_agent::AgentSdk;
use arbor_broker::Broker;
use arbor_cache::SessionCache;
use arbor_domain::config::Config;
use arbor_providers::ProviderRegistry;
use arbor_store::{ArtifactStore, Store};

use crate::runtime::{ActiveRunnerMap, Dispatcher};
use crate::workspace::WorkspaceManager;

/// Shared application state passed to all API handlers.
///
/// Fields are grouped by concern:
/// - **Core services** — config, store, caches, broker, artifact store
/// - **Execution** — the agent SDK and the dispatcher
/// - **Streaming** — the live-runner registry and workspace factory
/// - **Integrations** — the catalog-provider registry
#[derive(Clone)]
pub struct AppState {
    // ── Core services ─────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub store: Arc<Store>,
    pub sessions: Arc<SessionCache>,
    pub broker: Arc<dyn Broker>,
    pub artifacts: Arc<dyn ArtifactStore>,

    // ── Execution ─────────────────────────────────────────────────────
    pub sdk: Arc<dyn AgentSdk>,
    pub dispatcher: Arc<Dispatcher>,

    // ── Streaming ─────────────────────────────────────────────────────
    pub active_runners: Arc<ActiveRunnerMap>,
    pub workspaces: Arc<WorkspaceManager>,

    // ── Integrations ──────────────────────────────────────────────────
    pub providers: Arc<ProviderRegistry>,
}
