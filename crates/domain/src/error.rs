/// Shared error type used across all Arbor crates.
///
/// Variants mirror the error kinds the HTTP layer maps onto status codes:
/// `NotFound` → 404, `Conflict` → 409, `Throttled` → 429, `Validation` → 400,
/// everything else → 500. Transport errors are the only retryable kind.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("throttled: {0}")]
    Throttled(String),

    #[error("validation: {0}")]
    Validation(String),

    #[error("transport: {0}")]
    Transport(String),

    #[error("model error: {0}")]
    Model(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("artifact store: {0}")]
    Artifact(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the broker consumer should requeue the message that produced
    /// this error. Only transport-level failures are retried; everything
    /// else becomes a terminal task state.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_is_retryable() {
        assert!(Error::Transport("broker down".into()).is_retryable());
        assert!(Error::Io(std::io::Error::other("disk")).is_retryable());
    }

    #[test]
    fn terminal_kinds_are_not_retryable() {
        assert!(!Error::Model("empty response".into()).is_retryable());
        assert!(!Error::Cancelled("user".into()).is_retryable());
        assert!(!Error::Timeout("ceiling".into()).is_retryable());
        assert!(!Error::NotFound("agent".into()).is_retryable());
    }

    #[test]
    fn display_includes_kind() {
        let e = Error::Throttled("agent busy".into());
        assert_eq!(e.to_string(), "throttled: agent busy");
    }
}
