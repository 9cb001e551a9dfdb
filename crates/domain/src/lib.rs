//! Shared domain types for the Arbor platform: the entity model, the
//! environment-driven configuration, the shared error type, and the pure
//! validation helpers used by the upload surface.

pub mod config;
pub mod error;
pub mod model;
pub mod uploads;

pub use error::{Error, Result};
