use serde::{Deserialize, Serialize};

use super::{env_or, env_parse};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Document store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "d_store_uri")]
    pub uri: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { uri: d_store_uri() }
    }
}

impl StoreConfig {
    pub fn from_env() -> Self {
        Self {
            uri: env_or("MONGODB_URI", &d_store_uri()),
        }
    }
}

fn d_store_uri() -> String {
    "mongodb://localhost:27017/arbor".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Key-value cache
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "d_cache_url")]
    pub url: String,
    /// Session-id cache TTL (default 24 h).
    #[serde(default = "d_session_ttl")]
    pub session_ttl_secs: u64,
    /// Provider client cache TTL (default 1 h).
    #[serde(default = "d_client_ttl")]
    pub client_ttl_secs: u64,
    /// Provider client cache max size.
    #[serde(default = "d_client_max")]
    pub client_max_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            url: d_cache_url(),
            session_ttl_secs: d_session_ttl(),
            client_ttl_secs: d_client_ttl(),
            client_max_size: d_client_max(),
        }
    }
}

impl CacheConfig {
    pub fn from_env() -> Self {
        Self {
            url: env_or("REDIS_URL", &d_cache_url()),
            session_ttl_secs: env_parse("SESSION_CACHE_TTL_SECS", d_session_ttl()),
            client_ttl_secs: env_parse("CLIENT_CACHE_TTL_SECS", d_client_ttl()),
            client_max_size: env_parse("CLIENT_CACHE_MAX_SIZE", d_client_max()),
        }
    }
}

fn d_cache_url() -> String {
    "redis://localhost:6379".into()
}
fn d_session_ttl() -> u64 {
    86_400
}
fn d_client_ttl() -> u64 {
    3_600
}
fn d_client_max() -> usize {
    100
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Artifact store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactConfig {
    /// Bucket holding runner audit envelopes.
    #[serde(default = "d_audit_bucket")]
    pub audit_bucket: String,
    /// Bucket holding project artifacts (projectmd, folder uploads).
    #[serde(default = "d_artifact_bucket")]
    pub artifact_bucket: String,
    #[serde(default = "d_region")]
    pub region: String,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            audit_bucket: d_audit_bucket(),
            artifact_bucket: d_artifact_bucket(),
            region: d_region(),
        }
    }
}

impl ArtifactConfig {
    pub fn from_env() -> Self {
        Self {
            audit_bucket: env_or("TASK_AUDIT_TRAIL_S3_BUCKET_NAME", &d_audit_bucket()),
            artifact_bucket: env_or("S3_BUCKET_NAME", &d_artifact_bucket()),
            region: env_or("S3_REGION", &d_region()),
        }
    }
}

fn d_audit_bucket() -> String {
    "arbor-agents-audit-trails".into()
}
fn d_artifact_bucket() -> String {
    "arbor-artifacts".into()
}
fn d_region() -> String {
    "us-east-1".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_defaults() {
        let cfg = CacheConfig::default();
        assert_eq!(cfg.session_ttl_secs, 86_400);
        assert_eq!(cfg.client_ttl_secs, 3_600);
        assert_eq!(cfg.client_max_size, 100);
    }

    #[test]
    fn artifact_defaults() {
        let cfg = ArtifactConfig::default();
        assert_eq!(cfg.audit_bucket, "arbor-agents-audit-trails");
        assert_eq!(cfg.artifact_bucket, "arbor-artifacts");
    }
}
