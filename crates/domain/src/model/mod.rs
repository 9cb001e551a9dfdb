//! Entity model for the platform.
//!
//! Every record carries a stable string `id` plus `created_at` /
//! `updated_at` timestamps. Cross-entity references are id-only — no record
//! holds another record, so all traversal goes through the store.

mod agent;
mod conversation;
mod evaluation;
mod mcp;
mod project;
mod task;
mod training;
mod upload;

pub use agent::*;
pub use conversation::*;
pub use evaluation::*;
pub use mcp::*;
pub use project::*;
pub use task::*;
pub use training::*;
pub use upload::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Mint a fresh entity id.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A persistable record: stable id plus a touchable `updated_at`.
pub trait Document: Clone + Send + Sync + 'static {
    fn id(&self) -> &str;
    fn touch(&mut self);
}

macro_rules! impl_document {
    ($ty:ty) => {
        impl crate::model::Document for $ty {
            fn id(&self) -> &str {
                &self.id
            }
            fn touch(&mut self) {
                self.updated_at = chrono::Utc::now();
            }
        }
    };
}
pub(crate) use impl_document;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Data sources
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An external data-source registration carrying provider credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSource {
    pub id: String,
    pub project_id: String,
    /// Provider discriminator, e.g. `"looker"` or `"s3"`.
    pub source_type: String,
    /// Provider-specific connection config (validated by the registry).
    pub config: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
impl_document!(DataSource);

impl DataSource {
    pub fn new(project_id: &str, source_type: &str, config: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            project_id: project_id.to_string(),
            source_type: source_type.to_string(),
            config,
            created_at: now,
            updated_at: now,
        }
    }
}
