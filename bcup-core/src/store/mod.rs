/*!
Document database access.

Backups and restores only need three things from the database: the names of
its collections, the documents of one collection, and a way to overwrite one
document. [`DocumentStore`] is that capability; implementations exist for the
Firestore REST API and for an in-process map.
*/

#[cfg(feature = "rest")]
pub mod rest;
pub mod token;

use crate::codec::Document;
use crate::{BcupError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Mutex;

#[cfg(feature = "rest")]
pub use rest::RestDocumentStore;
pub use token::{AccessToken, CachingTokenProvider, StaticTokenProvider, TokenProvider, TokenSource};

/// Name of the identifier field carried by every document
pub const ID_FIELD: &str = "id";

/// The document database as seen by backup and restore
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Names of the top-level collections
    async fn list_collection_names(&self) -> Result<Vec<String>>;

    /// All documents of a collection, each with its identifier under `id`
    async fn list_documents(&self, collection: &str) -> Result<Vec<Document>>;

    /// Create or fully overwrite one document.
    ///
    /// `fields` must not contain `id`; the identifier is addressed separately.
    async fn write_document(&self, collection: &str, id: &str, fields: &Document) -> Result<()>;
}

/// Attach an identifier to a field map, `id` first
pub fn with_id(id: &str, fields: Document) -> Document {
    let mut document = Document::new();
    document.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
    for (name, value) in fields {
        if name != ID_FIELD {
            document.insert(name, value);
        }
    }
    document
}

/// In-process document store
///
/// Collections keep their creation order. Individual collections or documents
/// can be marked as failing to exercise partial-failure handling.
#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: Mutex<Vec<(String, Vec<Document>)>>,
    failing: Mutex<HashSet<String>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a collection with documents (each should carry `id`)
    pub fn with_collection<S: Into<String>>(self, name: S, documents: Vec<Document>) -> Self {
        {
            let mut collections = self.collections.lock().unwrap_or_else(|e| e.into_inner());
            collections.push((name.into(), documents));
        }
        self
    }

    /// Make reads of `collection`, or writes of `collection/id`, fail
    pub fn fail_on<S: Into<String>>(self, target: S) -> Self {
        self.failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(target.into());
        self
    }

    /// Current contents of a collection
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        let collections = self.collections.lock().unwrap_or_else(|e| e.into_inner());
        collections
            .iter()
            .find(|(name, _)| name == collection)
            .map(|(_, documents)| documents.clone())
            .unwrap_or_default()
    }

    fn check(&self, target: &str) -> Result<()> {
        let failing = self.failing.lock().unwrap_or_else(|e| e.into_inner());
        if failing.contains(target) {
            return Err(BcupError::upstream(target, "simulated failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn list_collection_names(&self) -> Result<Vec<String>> {
        let collections = self.collections.lock().unwrap_or_else(|e| e.into_inner());
        Ok(collections.iter().map(|(name, _)| name.clone()).collect())
    }

    async fn list_documents(&self, collection: &str) -> Result<Vec<Document>> {
        self.check(collection)?;
        Ok(self.documents(collection))
    }

    async fn write_document(&self, collection: &str, id: &str, fields: &Document) -> Result<()> {
        self.check(&format!("{collection}/{id}"))?;

        let document = with_id(id, fields.clone());
        let mut collections = self.collections.lock().unwrap_or_else(|e| e.into_inner());
        let index = match collections.iter().position(|(name, _)| name == collection) {
            Some(index) => index,
            None => {
                collections.push((collection.to_string(), Vec::new()));
                collections.len() - 1
            }
        };

        let documents = &mut collections[index].1;
        let existing = documents
            .iter()
            .position(|doc| doc.get(ID_FIELD).and_then(Value::as_str) == Some(id));
        match existing {
            Some(position) => documents[position] = document,
            None => documents.push(document),
        }
        Ok(())
    }
}
