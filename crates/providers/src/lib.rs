//! Catalog-provider adapters and their per-project registry.
//!
//! Providers expose a uniform contract — `initialize`, `call(operation,
//! args)`, `cleanup` — behind a provider-kind tagged union. The registry
//! constructs clients lazily from store-held credentials and caches them
//! with a TTL, disposing evicted clients.

mod client;
mod credentials;
mod registry;

pub use client::{ProviderClient, ProviderKind};
pub use credentials::CredentialFetcher;
pub use registry::{config_fingerprint, ProviderRegistry};
