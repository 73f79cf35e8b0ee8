//! Session-scoped document store.
//!
//! Holds every document the user has uploaded or loaded as an example, keyed
//! by display name, for the lifetime of the session. Insertion order is
//! preserved so the first upload can become the default active document.

use uuid::Uuid;

use crate::models::Document;

/// In-memory, insertion-ordered document store.
///
/// Document counts in a session are tiny, so lookups scan a `Vec` rather
/// than maintaining a side index.
#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: Vec<Document>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document, assigning it a fresh identity token.
    ///
    /// If a document with the same name already exists the store is left
    /// unchanged and the existing document's identity is returned, so
    /// repeated questions keep hitting the warm pipeline cache.
    pub fn insert(&mut self, name: &str, bytes: Vec<u8>) -> String {
        if let Some(existing) = self.get(name) {
            return existing.identity.clone();
        }
        let identity = Uuid::new_v4().to_string();
        self.documents.push(Document {
            name: name.to_string(),
            identity: identity.clone(),
            bytes,
        });
        identity
    }

    pub fn get(&self, name: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Display names in insertion order.
    pub fn names(&self) -> Vec<String> {
        self.documents.iter().map(|d| d.name.clone()).collect()
    }

    /// Name of the first inserted document, if any.
    pub fn first_name(&self) -> Option<&str> {
        self.documents.first().map(|d| d.name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }
}
