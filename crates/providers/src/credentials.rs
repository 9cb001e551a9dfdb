use std::sync::Arc;

use serde_json::Value;

use arbor_domain::{Error, Result};
use arbor_store::Store;

use crate::client::ProviderKind;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Credential fetcher
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Pure read over the store: resolve the provider config registered for a
/// `(project, provider)` pair from its data-source record.
pub struct CredentialFetcher {
    store: Arc<Store>,
}

impl CredentialFetcher {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn fetch(&self, project_id: &str, kind: ProviderKind) -> Result<Value> {
        self.store
            .data_sources
            .find(|d| {
                d.project_id.eq_ignore_ascii_case(project_id) && d.source_type == kind.as_str()
            })
            .into_iter()
            .next()
            .map(|d| d.config)
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "no {kind} data source configured for project {project_id}"
                ))
            })
    }
}
