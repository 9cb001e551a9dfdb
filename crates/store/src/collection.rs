use std::collections::HashMap;

use parking_lot::RwLock;

use arbor_domain::model::Document;
use arbor_domain::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Collection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One named set of documents. Every store operation the platform uses is
/// expressible against this interface, which keeps every consumer
/// unit-testable against the in-memory implementation.
pub struct Collection<T: Document> {
    name: &'static str,
    docs: RwLock<HashMap<String, T>>,
}

impl<T: Document> Collection<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            docs: RwLock::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Insert a document. Returns its id; rejects duplicate ids.
    pub fn insert(&self, doc: T) -> Result<String> {
        let id = doc.id().to_string();
        let mut docs = self.docs.write();
        if docs.contains_key(&id) {
            return Err(Error::Conflict(format!(
                "{}: document {id} already exists",
                self.name
            )));
        }
        docs.insert(id.clone(), doc);
        Ok(id)
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.docs.read().get(id).cloned()
    }

    /// All documents matching the filter (unordered).
    pub fn find<F>(&self, filter: F) -> Vec<T>
    where
        F: Fn(&T) -> bool,
    {
        self.docs.read().values().filter(|d| filter(d)).cloned().collect()
    }

    pub fn count<F>(&self, filter: F) -> usize
    where
        F: Fn(&T) -> bool,
    {
        self.docs.read().values().filter(|d| filter(d)).count()
    }

    /// Partial-merge patch: mutate the document in place. Always bumps
    /// `updated_at`. Returns false when the document is missing.
    pub fn update<F>(&self, id: &str, patch: F) -> bool
    where
        F: FnOnce(&mut T),
    {
        let mut docs = self.docs.write();
        if let Some(doc) = docs.get_mut(id) {
            patch(doc);
            doc.touch();
            return true;
        }
        false
    }

    pub fn delete(&self, id: &str) -> bool {
        self.docs.write().remove(id).is_some()
    }

    /// Delete everything matching the filter; returns the removed count.
    pub fn delete_where<F>(&self, filter: F) -> usize
    where
        F: Fn(&T) -> bool,
    {
        let mut docs = self.docs.write();
        let before = docs.len();
        docs.retain(|_, d| !filter(d));
        before - docs.len()
    }

    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
