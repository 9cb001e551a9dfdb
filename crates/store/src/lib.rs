//! Durable persistence for the platform: a small document-store interface
//! (insert / get / find / update / delete / count) with one collection per
//! entity, plus the blob-side artifact store.
//!
//! Atomicity is limited to single-document patches; `update` is a
//! partial-merge closure and always bumps `updated_at`.

pub mod artifact;
mod collection;
mod store;

pub use artifact::{
    object_url, parse_object_url, ArtifactStore, FsArtifactStore, InMemoryArtifactStore,
};
pub use collection::Collection;
pub use store::Store;
