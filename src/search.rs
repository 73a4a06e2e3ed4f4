//! Tag search over stored posts.
//!
//! The document store narrows the posts collection to posts whose `ai_tags`
//! match any of the search terms (its own full-text search); the results
//! are then ranked locally with [`score_and_rank`].

use anyhow::Context;
use tracing::info;

use crate::error::ServiceError;
use crate::models::PostDocument;
use crate::relevance::{score_and_rank, ScoredPost};
use crate::traits::{Query, Services};

/// Find posts tagged with any of `terms`, most relevant first.
///
/// # Errors
///
/// - [`ServiceError::InvalidInput`] if `terms` is empty; the store is not
///   queried.
/// - [`ServiceError::Remote`] if the store call fails or returns documents
///   that are not posts.
pub async fn search_by_tags(
    services: &Services,
    terms: &[String],
) -> Result<Vec<ScoredPost>, ServiceError> {
    if terms.is_empty() {
        return Err(ServiceError::invalid("No labels were provided for the search."));
    }
    info!(?terms, "searching posts by tags");

    let appwrite = &services.config.appwrite;
    let queries = [
        Query::search("ai_tags", terms.join(" ")),
        Query::limit(services.config.search.limit),
    ];
    let documents = services
        .documents
        .list_documents(&appwrite.database_id, &appwrite.post_collection_id, &queries)
        .await
        .context("post search failed")?;
    info!(count = documents.len(), "document store returned candidates");

    let posts = documents
        .into_iter()
        .map(PostDocument::try_from)
        .collect::<anyhow::Result<Vec<_>>>()
        .context("document store returned a malformed post")?;

    Ok(score_and_rank(terms, &posts)?)
}
