//! Image analysis and post creation.
//!
//! # Pipeline
//!
//! ```text
//! image ──▶ ImageLabeler ──▶ filter_relevant_labels ──▶ ai_tags
//!   │                                                     │
//!   └──▶ FileStore (upload + view URL) ──▶ Post ◀─────────┘
//!                                           │
//!                     DocumentStore ◀───────┤ posts collection
//!                     DocumentStore ◀── PostDetails (details collection)
//! ```
//!
//! Each step runs only after the previous one succeeded; the first failure
//! aborts the rest. Nothing is rolled back: if the details write fails the
//! post stays in the posts collection without details. Its id is logged at
//! `error` level so it can be found later.

use anyhow::Context;
use serde_json::{Map, Value};
use tracing::{error, info, warn};

use crate::error::ServiceError;
use crate::labels::{animal_tags, filter_relevant_labels};
use crate::models::{new_id, ImageUpload, Label, PostDocument, PostSubmission};
use crate::traits::Services;

/// Run the labeling service on an image and return every label it reports,
/// unfiltered.
pub async fn analyze_image(services: &Services, image: &[u8]) -> Result<Vec<Label>, ServiceError> {
    if image.is_empty() {
        return Err(ServiceError::invalid("No file was uploaded."));
    }

    let labeling = &services.config.labeling;
    let raw = services
        .labeler
        .detect_labels(image, labeling.max_labels, labeling.min_confidence)
        .await
        .context("image labeling failed")?;

    let labels: Vec<Label> = raw.iter().map(Label::from).collect();
    info!(count = labels.len(), "image analysis completed");
    Ok(labels)
}

/// Label an image, store it, and create the post and its details record.
///
/// Returns the created post document.
pub async fn create_post_with_analysis(
    services: &Services,
    submission: &PostSubmission,
    image: &ImageUpload,
) -> Result<PostDocument, ServiceError> {
    if image.bytes.is_empty() {
        return Err(ServiceError::invalid("No image file was uploaded."));
    }

    let config = &services.config;
    let appwrite = &config.appwrite;

    let raw = services
        .labeler
        .detect_labels(
            &image.bytes,
            config.labeling.max_labels,
            config.labeling.min_confidence,
        )
        .await
        .context("image labeling failed")?;
    let ai_tags = filter_relevant_labels(&raw, animal_tags());
    info!(?ai_tags, "relevant labels detected");

    let file_id = services
        .files
        .upload_file(&image.bytes, &image.filename, &appwrite.bucket_id)
        .await
        .context("image upload failed")?;
    let image_url = services.files.view_url(&appwrite.bucket_id, &file_id);
    info!(%file_id, %image_url, "image stored");

    let post = submission.to_post(ai_tags, file_id, image_url);
    let post_data = serde_json::to_value(&post).context("failed to encode post")?;
    let post_id = new_id();
    let created = services
        .documents
        .create_document(
            &appwrite.database_id,
            &appwrite.post_collection_id,
            &post_id,
            &post_data,
        )
        .await
        .context("post creation failed")?;
    let post_doc = stored_post(created, post_data, &post_id);
    let post_id = post_doc.id().unwrap_or(&post_id).to_string();
    info!(%post_id, "post created");

    let details = submission.to_details(&post_id);
    let details_data = serde_json::to_value(&details).context("failed to encode post details")?;
    if let Err(e) = services
        .documents
        .create_document(
            &appwrite.database_id,
            &appwrite.details_collection_id,
            &new_id(),
            &details_data,
        )
        .await
    {
        error!(%post_id, "post details creation failed; post left without details");
        return Err(e.context("post details creation failed").into());
    }
    info!(%post_id, "post details created");

    Ok(post_doc)
}

/// The created post as the store returned it. A response that is not a JSON
/// object is replaced by the data that was written plus its `$id`.
fn stored_post(created: Value, written: Value, post_id: &str) -> PostDocument {
    PostDocument::try_from(created).unwrap_or_else(|e| {
        warn!(%post_id, "unexpected post creation response: {:#}", e);
        let mut fields = match written {
            Value::Object(fields) => fields,
            _ => Map::new(),
        };
        fields.insert("$id".to_string(), Value::from(post_id));
        PostDocument(fields)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryDocumentStore, InMemoryFileStore, InMemoryLabeler};
    use crate::models::RawLabel;
    use crate::test_support::test_config;
    use crate::traits::{DocumentStore, Query};
    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;

    /// Stores documents but answers post creation with a non-object body.
    struct BareCreateResponse(InMemoryDocumentStore);

    #[async_trait]
    impl DocumentStore for BareCreateResponse {
        async fn create_document(
            &self,
            database_id: &str,
            collection_id: &str,
            document_id: &str,
            data: &Value,
        ) -> Result<Value> {
            let doc = self
                .0
                .create_document(database_id, collection_id, document_id, data)
                .await?;
            if collection_id == "posts" {
                return Ok(Value::String("created".into()));
            }
            Ok(doc)
        }

        async fn list_documents(
            &self,
            database_id: &str,
            collection_id: &str,
            queries: &[Query],
        ) -> Result<Vec<Value>> {
            self.0.list_documents(database_id, collection_id, queries).await
        }
    }

    struct Fixture {
        services: Services,
        labeler: Arc<InMemoryLabeler>,
        files: Arc<InMemoryFileStore>,
        documents: Arc<InMemoryDocumentStore>,
    }

    fn fixture(labeler: InMemoryLabeler, files: InMemoryFileStore) -> Fixture {
        let labeler = Arc::new(labeler);
        let files = Arc::new(files);
        let documents = Arc::new(InMemoryDocumentStore::new());
        let services = Services::new(
            Arc::new(test_config()),
            labeler.clone(),
            files.clone(),
            documents.clone(),
        );
        Fixture {
            services,
            labeler,
            files,
            documents,
        }
    }

    fn dog_labels() -> InMemoryLabeler {
        InMemoryLabeler::new(vec![
            RawLabel::new("Dog", 98.123, &["Pet", "Animal"]),
            RawLabel::new("Grass", 90.0, &["Plant"]),
            RawLabel::new("Beagle", 85.0, &["Dog"]),
        ])
    }

    fn upload() -> ImageUpload {
        ImageUpload {
            filename: "rex.jpg".into(),
            bytes: vec![0xFF, 0xD8, 0xFF],
        }
    }

    fn submission() -> PostSubmission {
        let mut form = PostSubmission::default();
        form.set_field("creator", "user-1".into());
        form.set_field("mascota", "Rex".into());
        form.set_field("tags", "lost".into());
        form.set_field("reward", "100".into());
        form.set_field("adoptionFee", "15".into());
        form
    }

    #[tokio::test]
    async fn test_analyze_returns_all_labels() {
        let fx = fixture(dog_labels(), InMemoryFileStore::new());
        let labels = analyze_image(&fx.services, b"img").await.unwrap();
        let names: Vec<&str> = labels.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Dog", "Grass", "Beagle"]);
        assert!((labels[0].confidence - 98.12).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_analyze_rejects_empty_image() {
        let fx = fixture(dog_labels(), InMemoryFileStore::new());
        let err = analyze_image(&fx.services, b"").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert_eq!(fx.labeler.calls(), 0);
    }

    #[tokio::test]
    async fn test_create_post_full_pipeline() {
        let fx = fixture(dog_labels(), InMemoryFileStore::new());
        let post = create_post_with_analysis(&fx.services, &submission(), &upload())
            .await
            .unwrap();

        assert_eq!(post.ai_tags().collect::<Vec<_>>(), vec!["Dog", "Beagle"]);
        assert_eq!(post.0["mascota"], "Rex");
        assert_eq!(post.0["tags"], json!(["lost"]));
        assert!(post.0.contains_key("$createdAt"));

        let files = fx.files.files();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].filename, "rex.jpg");
        assert_eq!(files[0].bucket_id, "images");
        assert_eq!(post.0["imageIds"], json!([files[0].id]));
        assert_eq!(
            post.0["imageUrls"],
            json!([format!("http://files.local/images/{}", files[0].id)])
        );

        assert_eq!(fx.documents.documents("db", "posts").len(), 1);
        let details = fx.documents.documents("db", "details");
        assert_eq!(details.len(), 1);
        assert_eq!(details[0]["post"], post.id().unwrap());
        assert_eq!(details[0]["reward"], "100");
        assert_eq!(details[0]["adoptionFee"], 15.0);
    }

    #[tokio::test]
    async fn test_labeling_failure_creates_nothing() {
        let fx = fixture(InMemoryLabeler::failing(), InMemoryFileStore::new());
        let err = create_post_with_analysis(&fx.services, &submission(), &upload())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Remote(_)));
        assert!(fx.files.files().is_empty());
        assert!(fx.documents.documents("db", "posts").is_empty());
        assert!(fx.documents.documents("db", "details").is_empty());
    }

    #[tokio::test]
    async fn test_upload_failure_creates_no_documents() {
        let fx = fixture(dog_labels(), InMemoryFileStore::failing());
        let err = create_post_with_analysis(&fx.services, &submission(), &upload())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Remote(_)));
        assert!(fx.documents.documents("db", "posts").is_empty());
    }

    #[tokio::test]
    async fn test_details_failure_leaves_orphan_post() {
        let fx = fixture(dog_labels(), InMemoryFileStore::new());
        fx.documents.fail_collection("details");
        let err = create_post_with_analysis(&fx.services, &submission(), &upload())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Remote(_)));
        assert!(err.to_string().contains("post details creation failed"));
        assert_eq!(fx.documents.documents("db", "posts").len(), 1);
        assert!(fx.documents.documents("db", "details").is_empty());
    }

    #[tokio::test]
    async fn test_create_rejects_empty_image() {
        let fx = fixture(dog_labels(), InMemoryFileStore::new());
        let empty = ImageUpload {
            filename: "empty.jpg".into(),
            bytes: Vec::new(),
        };
        let err = create_post_with_analysis(&fx.services, &submission(), &empty)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert_eq!(fx.labeler.calls(), 0);
    }

    #[tokio::test]
    async fn test_unexpected_create_response_still_writes_details() {
        let documents = Arc::new(BareCreateResponse(InMemoryDocumentStore::new()));
        let services = Services::new(
            Arc::new(test_config()),
            Arc::new(dog_labels()),
            Arc::new(InMemoryFileStore::new()),
            documents.clone(),
        );

        let post = create_post_with_analysis(&services, &submission(), &upload())
            .await
            .unwrap();

        let posts = documents.0.documents("db", "posts");
        let details = documents.0.documents("db", "details");
        assert_eq!(posts.len(), 1);
        assert_eq!(details.len(), 1);
        assert_eq!(post.id(), posts[0]["$id"].as_str());
        assert_eq!(details[0]["post"], posts[0]["$id"]);
        assert_eq!(post.0["mascota"], "Rex");
    }
}
