//! Appwrite Storage and Databases client.
//!
//! Talks to the Appwrite REST API over `reqwest` with a server API key and
//! implements both [`FileStore`] and [`DocumentStore`].
//!
//! # Endpoints
//!
//! | Method | Path | Used for |
//! |--------|------|----------|
//! | `POST` | `/storage/buckets/{bucket}/files` | image upload (multipart) |
//! | `POST` | `/databases/{db}/collections/{coll}/documents` | create post / details |
//! | `GET`  | `/databases/{db}/collections/{coll}/documents` | search posts |
//!
//! Every request carries the `X-Appwrite-Project` and `X-Appwrite-Key`
//! headers. Queries are passed as repeated `queries[]` parameters holding
//! the JSON form of [`Query`].

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::Value;

use crate::config::AppwriteConfig;
use crate::models::new_id;
use crate::traits::{DocumentStore, FileStore, Query};

/// An Appwrite project client.
pub struct AppwriteClient {
    http: reqwest::Client,
    endpoint: String,
    project_id: String,
    api_key: String,
}

#[derive(Deserialize)]
struct FileRecord {
    #[serde(rename = "$id")]
    id: String,
}

#[derive(Deserialize)]
struct DocumentList {
    #[serde(default)]
    documents: Vec<Value>,
}

impl AppwriteClient {
    pub fn new(http: reqwest::Client, appwrite: &AppwriteConfig) -> Self {
        Self {
            http,
            endpoint: appwrite.endpoint.trim_end_matches('/').to_string(),
            project_id: appwrite.project_id.clone(),
            api_key: appwrite.api_key.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, self.url(path))
            .header("X-Appwrite-Project", &self.project_id)
            .header("X-Appwrite-Key", &self.api_key)
    }
}

/// Turn a non-2xx response into an error carrying the status and body.
async fn ensure_success(resp: reqwest::Response, action: &str) -> Result<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    bail!(
        "Appwrite {} failed (HTTP {}): {}",
        action,
        status,
        body.chars().take(500).collect::<String>()
    );
}

fn documents_path(database_id: &str, collection_id: &str) -> String {
    format!(
        "/databases/{}/collections/{}/documents",
        database_id, collection_id
    )
}

fn encode_queries(queries: &[Query]) -> Vec<(&'static str, String)> {
    queries
        .iter()
        .map(|q| ("queries[]", q.to_json().to_string()))
        .collect()
}

#[async_trait]
impl FileStore for AppwriteClient {
    async fn upload_file(&self, bytes: &[u8], filename: &str, bucket_id: &str) -> Result<String> {
        let form = Form::new()
            .text("fileId", new_id())
            .part("file", Part::bytes(bytes.to_vec()).file_name(filename.to_string()));

        let path = format!("/storage/buckets/{}/files", bucket_id);
        let resp = self
            .request(reqwest::Method::POST, &path)
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("Failed to upload '{}' to bucket {}", filename, bucket_id))?;
        let resp = ensure_success(resp, "file upload").await?;

        let record: FileRecord = resp
            .json()
            .await
            .context("Invalid Appwrite file upload response")?;
        Ok(record.id)
    }

    fn view_url(&self, bucket_id: &str, file_id: &str) -> String {
        format!(
            "{}/storage/buckets/{}/files/{}/view?project={}",
            self.endpoint, bucket_id, file_id, self.project_id
        )
    }
}

#[async_trait]
impl DocumentStore for AppwriteClient {
    async fn create_document(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: &str,
        data: &Value,
    ) -> Result<Value> {
        let body = serde_json::json!({
            "documentId": document_id,
            "data": data,
        });

        let resp = self
            .request(
                reqwest::Method::POST,
                &documents_path(database_id, collection_id),
            )
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to create document in collection {}", collection_id))?;
        let resp = ensure_success(resp, "create document").await?;

        resp.json()
            .await
            .context("Invalid Appwrite create document response")
    }

    async fn list_documents(
        &self,
        database_id: &str,
        collection_id: &str,
        queries: &[Query],
    ) -> Result<Vec<Value>> {
        let resp = self
            .request(
                reqwest::Method::GET,
                &documents_path(database_id, collection_id),
            )
            .query(&encode_queries(queries))
            .send()
            .await
            .with_context(|| format!("Failed to list documents in collection {}", collection_id))?;
        let resp = ensure_success(resp, "list documents").await?;

        let list: DocumentList = resp
            .json()
            .await
            .context("Invalid Appwrite list documents response")?;
        Ok(list.documents)
    }
}
