//! Service traits for the external collaborators.
//!
//! The orchestrators in [`ingest`](crate::ingest) and
//! [`search`](crate::search) talk to the outside world only through these
//! three traits, so the remote clients can be swapped for the in-memory
//! implementations in [`memory`](crate::memory) under test.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌────────────────┐
//! │ ImageLabeler │   │  FileStore   │   │ DocumentStore  │
//! │ (Rekognition)│   │  (Appwrite)  │   │   (Appwrite)   │
//! └──────┬───────┘   └──────┬───────┘   └───────┬────────┘
//!        └──────────────────┼───────────────────┘
//!                           ▼
//!                  Services → ingest / search
//! ```

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::appwrite::AppwriteClient;
use crate::config::Config;
use crate::models::RawLabel;
use crate::rekognition::RekognitionClient;

/// An image-labeling backend.
#[async_trait]
pub trait ImageLabeler: Send + Sync {
    /// Detect up to `max_labels` labels with at least `min_confidence`
    /// percent confidence in `image`.
    async fn detect_labels(
        &self,
        image: &[u8],
        max_labels: u32,
        min_confidence: f32,
    ) -> Result<Vec<RawLabel>>;
}

/// A bucketed file store.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Upload `bytes` as `filename` into `bucket_id`, returning the new file id.
    async fn upload_file(&self, bytes: &[u8], filename: &str, bucket_id: &str) -> Result<String>;

    /// Public URL at which the file can be viewed.
    fn view_url(&self, bucket_id: &str, file_id: &str) -> String;
}

/// A document database organised as databases → collections → documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a document with id `document_id` from the JSON object `data`.
    ///
    /// Returns the stored document, including its `$id` and any system
    /// attributes the store adds.
    async fn create_document(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: &str,
        data: &Value,
    ) -> Result<Value>;

    /// List documents matching all `queries`.
    async fn list_documents(
        &self,
        database_id: &str,
        collection_id: &str,
        queries: &[Query],
    ) -> Result<Vec<Value>>;
}

/// A document store query.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Full-text search of `attribute` for any of the space-separated words
    /// in `value`.
    Search { attribute: String, value: String },
    /// Return at most this many documents.
    Limit(usize),
}

impl Query {
    pub fn search(attribute: &str, value: impl Into<String>) -> Self {
        Query::Search {
            attribute: attribute.to_string(),
            value: value.into(),
        }
    }

    pub fn limit(n: usize) -> Self {
        Query::Limit(n)
    }

    /// JSON wire form, e.g. `{"method":"limit","values":[25]}`.
    pub fn to_json(&self) -> Value {
        match self {
            Query::Search { attribute, value } => json!({
                "method": "search",
                "attribute": attribute,
                "values": [value],
            }),
            Query::Limit(n) => json!({
                "method": "limit",
                "values": [n],
            }),
        }
    }
}

/// Client handles shared by all request handlers.
///
/// Constructed once at startup and injected; cheap to clone.
#[derive(Clone)]
pub struct Services {
    pub config: Arc<Config>,
    pub labeler: Arc<dyn ImageLabeler>,
    pub files: Arc<dyn FileStore>,
    pub documents: Arc<dyn DocumentStore>,
}

impl Services {
    pub fn new(
        config: Arc<Config>,
        labeler: Arc<dyn ImageLabeler>,
        files: Arc<dyn FileStore>,
        documents: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            config,
            labeler,
            files,
            documents,
        }
    }

    /// Build clients for the remote services named in `config`.
    ///
    /// One `reqwest` client (and its connection pool) is shared by all of
    /// them.
    pub fn connect(config: Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http.timeout_secs))
            .build()?;

        let labeler = Arc::new(RekognitionClient::new(http.clone(), &config.aws));
        let appwrite = Arc::new(AppwriteClient::new(http, &config.appwrite));

        Ok(Self::new(
            Arc::new(config),
            labeler,
            appwrite.clone(),
            appwrite,
        ))
    }
}
