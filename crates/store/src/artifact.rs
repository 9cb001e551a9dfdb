//! Blob storage for audit envelopes, project.md documents and folder
//! uploads. The trait is S3-shaped (bucket + key + prefix deletion); the
//! in-memory backend drives the test suites, the filesystem backend backs
//! local deployments.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::RwLock;

use arbor_domain::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// URL forms
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Canonical object URL: `s3://bucket/key`.
pub fn object_url(bucket: &str, key: &str) -> String {
    format!("s3://{bucket}/{key}")
}

/// Parse either `s3://bucket/key` or
/// `https://bucket.s3.region.amazonaws.com/key` into `(bucket, key)`.
pub fn parse_object_url(url: &str) -> Option<(String, String)> {
    if let Some(rest) = url.strip_prefix("s3://") {
        let (bucket, key) = rest.split_once('/')?;
        if bucket.is_empty() || key.is_empty() {
            return None;
        }
        return Some((bucket.to_string(), key.to_string()));
    }
    if let Some(rest) = url.strip_prefix("https://") {
        let (host, key) = rest.split_once('/')?;
        let bucket = host.split(".s3.").next()?;
        if bucket == host || bucket.is_empty() || key.is_empty() {
            return None;
        }
        return Some((bucket.to_string(), key.to_string()));
    }
    None
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ArtifactStore trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Write an object; returns its `s3://` URL.
    async fn put(&self, bucket: &str, key: &str, body: &[u8]) -> Result<String>;

    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>>;

    /// List keys under a prefix.
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>>;

    /// Delete every object under a prefix; returns the deleted count.
    async fn delete_prefix(&self, bucket: &str, prefix: &str) -> Result<usize>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// In-memory backend
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// In-memory artifact backend for tests and short-lived runs.
#[derive(Default)]
pub struct InMemoryArtifactStore {
    buckets: RwLock<HashMap<String, BTreeMap<String, Vec<u8>>>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn put(&self, bucket: &str, key: &str, body: &[u8]) -> Result<String> {
        self.buckets
            .write()
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), body.to_vec());
        Ok(object_url(bucket, key))
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .buckets
            .read()
            .get(bucket)
            .and_then(|b| b.get(key).cloned()))
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .buckets
            .read()
            .get(bucket)
            .map(|b| {
                b.keys()
                    .filter(|k| k.starts_with(prefix))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete_prefix(&self, bucket: &str, prefix: &str) -> Result<usize> {
        let mut buckets = self.buckets.write();
        let Some(b) = buckets.get_mut(bucket) else {
            return Ok(0);
        };
        let before = b.len();
        b.retain(|k, _| !k.starts_with(prefix));
        Ok(before - b.len())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Filesystem backend
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Filesystem-backed artifact store: `<root>/<bucket>/<key>`.
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.root.join(bucket).join(key)
    }

    fn walk(dir: &std::path::Path, base: &std::path::Path, out: &mut Vec<String>) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                Self::walk(&path, base, out);
            } else if let Ok(rel) = path.strip_prefix(base) {
                out.push(rel.to_string_lossy().replace('\\', "/"));
            }
        }
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn put(&self, bucket: &str, key: &str, body: &[u8]) -> Result<String> {
        let path = self.object_path(bucket, key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Artifact(format!("creating {}: {e}", parent.display())))?;
        }
        std::fs::write(&path, body)
            .map_err(|e| Error::Artifact(format!("writing {}: {e}", path.display())))?;
        Ok(object_url(bucket, key))
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.object_path(bucket, key);
        match std::fs::read(&path) {
            Ok(body) => Ok(Some(body)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Artifact(format!("reading {}: {e}", path.display()))),
        }
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let base = self.root.join(bucket);
        let mut keys = Vec::new();
        Self::walk(&base, &base, &mut keys);
        keys.retain(|k| k.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }

    async fn delete_prefix(&self, bucket: &str, prefix: &str) -> Result<usize> {
        let keys = self.list(bucket, prefix).await?;
        let mut deleted = 0;
        for key in &keys {
            let path = self.object_path(bucket, key);
            if std::fs::remove_file(&path).is_ok() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
