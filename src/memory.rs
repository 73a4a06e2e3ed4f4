//! In-memory service implementations for testing.
//!
//! Deterministic stand-ins for the labeling service, file store and document
//! store, with switches to make any of them fail. Data lives in `HashMap`s
//! and `Vec`s behind `std::sync::RwLock`.
//!
//! [`InMemoryDocumentStore`] approximates the remote full-text search: a
//! document matches a `search` query when the attribute (a string or an
//! array of strings) contains any of the query's whitespace-separated words
//! exactly. Without a `limit` query at most 25 documents are returned,
//! mirroring the remote store's default page size.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::models::{new_id, RawLabel};
use crate::traits::{DocumentStore, FileStore, ImageLabeler, Query};

const DEFAULT_LIST_LIMIT: usize = 25;

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============ Labeler ============

/// Returns a fixed label list for every image.
pub struct InMemoryLabeler {
    labels: Vec<RawLabel>,
    fail: bool,
    calls: AtomicUsize,
}

impl InMemoryLabeler {
    pub fn new(labels: Vec<RawLabel>) -> Self {
        Self {
            labels,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// A labeler whose every call fails.
    pub fn failing() -> Self {
        Self {
            labels: Vec::new(),
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `detect_labels` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageLabeler for InMemoryLabeler {
    async fn detect_labels(
        &self,
        image: &[u8],
        max_labels: u32,
        min_confidence: f32,
    ) -> Result<Vec<RawLabel>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            bail!("labeling service unavailable");
        }
        if image.is_empty() {
            bail!("image must not be empty");
        }
        Ok(self
            .labels
            .iter()
            .filter(|l| l.confidence >= f64::from(min_confidence))
            .take(max_labels as usize)
            .cloned()
            .collect())
    }
}

// ============ File store ============

/// A file held by [`InMemoryFileStore`].
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub id: String,
    pub bucket_id: String,
    pub filename: String,
    pub size: usize,
}

/// Keeps uploaded file metadata in memory.
pub struct InMemoryFileStore {
    base_url: String,
    files: RwLock<Vec<StoredFile>>,
    fail: bool,
}

impl InMemoryFileStore {
    pub fn new() -> Self {
        Self {
            base_url: "http://files.local".to_string(),
            files: RwLock::new(Vec::new()),
            fail: false,
        }
    }

    /// A store whose uploads always fail.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn files(&self) -> Vec<StoredFile> {
        read(&self.files).clone()
    }
}

impl Default for InMemoryFileStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileStore for InMemoryFileStore {
    async fn upload_file(&self, bytes: &[u8], filename: &str, bucket_id: &str) -> Result<String> {
        if self.fail {
            bail!("file store unavailable");
        }
        let id = new_id();
        write(&self.files).push(StoredFile {
            id: id.clone(),
            bucket_id: bucket_id.to_string(),
            filename: filename.to_string(),
            size: bytes.len(),
        });
        Ok(id)
    }

    fn view_url(&self, bucket_id: &str, file_id: &str) -> String {
        format!("{}/{}/{}", self.base_url, bucket_id, file_id)
    }
}

// ============ Document store ============

/// Keeps documents per `(database, collection)` in insertion order.
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<(String, String), Vec<Value>>>,
    failing_collections: RwLock<HashSet<String>>,
    list_calls: AtomicUsize,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            failing_collections: RwLock::new(HashSet::new()),
            list_calls: AtomicUsize::new(0),
        }
    }

    /// Make every operation on `collection_id` fail.
    pub fn fail_collection(&self, collection_id: &str) {
        write(&self.failing_collections).insert(collection_id.to_string());
    }

    /// All documents in a collection, in insertion order.
    pub fn documents(&self, database_id: &str, collection_id: &str) -> Vec<Value> {
        read(&self.collections)
            .get(&(database_id.to_string(), collection_id.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Number of `list_documents` calls made so far.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn check_available(&self, collection_id: &str) -> Result<()> {
        if read(&self.failing_collections).contains(collection_id) {
            bail!("document store unavailable for collection {}", collection_id);
        }
        Ok(())
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether `doc[attribute]` contains any of the words of `value`.
fn matches_search(doc: &Value, attribute: &str, value: &str) -> bool {
    let words: Vec<&str> = value.split_whitespace().collect();
    match doc.get(attribute) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .any(|item| words.contains(&item)),
        Some(Value::String(text)) => text.split_whitespace().any(|w| words.contains(&w)),
        _ => false,
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn create_document(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: &str,
        data: &Value,
    ) -> Result<Value> {
        self.check_available(collection_id)?;

        let Value::Object(fields) = data else {
            bail!("document data must be a JSON object");
        };

        let mut doc = fields.clone();
        doc.insert("$id".into(), Value::from(document_id));
        doc.insert("$databaseId".into(), Value::from(database_id));
        doc.insert("$collectionId".into(), Value::from(collection_id));
        doc.insert(
            "$createdAt".into(),
            Value::from(chrono::Utc::now().to_rfc3339()),
        );
        let doc = Value::Object(doc);

        let mut collections = write(&self.collections);
        let docs = collections
            .entry((database_id.to_string(), collection_id.to_string()))
            .or_default();
        if docs.iter().any(|d| d["$id"] == document_id) {
            bail!("document {} already exists", document_id);
        }
        docs.push(doc.clone());
        Ok(doc)
    }

    async fn list_documents(
        &self,
        database_id: &str,
        collection_id: &str,
        queries: &[Query],
    ) -> Result<Vec<Value>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available(collection_id)?;

        let mut limit = DEFAULT_LIST_LIMIT;
        let mut results = self.documents(database_id, collection_id);
        for query in queries {
            match query {
                Query::Search { attribute, value } => {
                    results.retain(|doc| matches_search(doc, attribute, value));
                }
                Query::Limit(n) => limit = *n,
            }
        }
        results.truncate(limit);
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_labeler_applies_thresholds() {
        let labeler = InMemoryLabeler::new(vec![
            RawLabel::new("Dog", 99.0, &[]),
            RawLabel::new("Grass", 60.0, &[]),
            RawLabel::new("Pet", 90.0, &[]),
            RawLabel::new("Animal", 88.0, &[]),
        ]);
        let labels = labeler.detect_labels(b"img", 2, 75.0).await.unwrap();
        let names: Vec<&str> = labels.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Dog", "Pet"]);
        assert_eq!(labeler.calls(), 1);
    }

    #[tokio::test]
    async fn test_failing_labeler() {
        let labeler = InMemoryLabeler::failing();
        assert!(labeler.detect_labels(b"img", 10, 75.0).await.is_err());
        assert_eq!(labeler.calls(), 1);
    }

    #[tokio::test]
    async fn test_create_adds_system_fields() {
        let store = InMemoryDocumentStore::new();
        let doc = store
            .create_document("db", "posts", "p1", &json!({"caption": "hi"}))
            .await
            .unwrap();
        assert_eq!(doc["$id"], "p1");
        assert_eq!(doc["$collectionId"], "posts");
        assert_eq!(doc["caption"], "hi");
        assert!(doc.get("$createdAt").is_some());
        assert_eq!(store.documents("db", "posts").len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let store = InMemoryDocumentStore::new();
        store
            .create_document("db", "posts", "p1", &json!({}))
            .await
            .unwrap();
        assert!(store
            .create_document("db", "posts", "p1", &json!({}))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_search_matches_any_word() {
        let store = InMemoryDocumentStore::new();
        for (id, tags) in [
            ("a", json!(["Dog"])),
            ("b", json!(["Bird"])),
            ("c", json!(["Cat", "Kitten"])),
        ] {
            store
                .create_document("db", "posts", id, &json!({ "ai_tags": tags }))
                .await
                .unwrap();
        }

        let found = store
            .list_documents("db", "posts", &[Query::search("ai_tags", "Dog Cat")])
            .await
            .unwrap();
        let ids: Vec<&str> = found.iter().map(|d| d["$id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(store.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_limit() {
        let store = InMemoryDocumentStore::new();
        for i in 0..30 {
            store
                .create_document("db", "posts", &format!("p{}", i), &json!({"ai_tags": ["Dog"]}))
                .await
                .unwrap();
        }
        let default_page = store.list_documents("db", "posts", &[]).await.unwrap();
        assert_eq!(default_page.len(), 25);

        let limited = store
            .list_documents("db", "posts", &[Query::limit(3)])
            .await
            .unwrap();
        assert_eq!(limited.len(), 3);
    }

    #[tokio::test]
    async fn test_failing_collection() {
        let store = InMemoryDocumentStore::new();
        store.fail_collection("details");
        assert!(store
            .create_document("db", "details", "d1", &json!({}))
            .await
            .is_err());
        assert!(store
            .create_document("db", "posts", "p1", &json!({}))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_file_store_records_uploads() {
        let files = InMemoryFileStore::new();
        let id = files.upload_file(b"abc", "rex.jpg", "images").await.unwrap();
        let stored = files.files();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, id);
        assert_eq!(stored[0].size, 3);
        assert_eq!(files.view_url("images", &id), format!("http://files.local/images/{}", id));
    }
}
