//! Error type returned by the orchestrators.
//!
//! Only two outcomes matter to callers: the request itself was invalid, or
//! something downstream failed. The HTTP layer maps these to 400 and 500.

/// Failure of an ingestion or search operation.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The caller supplied bad input (missing file, no search terms, ...).
    #[error("{0}")]
    InvalidInput(String),
    /// A labeling, file store or document store call failed.
    #[error(transparent)]
    Remote(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ServiceError::InvalidInput(message.into())
    }
}
