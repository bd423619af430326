use thiserror::Error;

#[derive(Error, Debug)]
pub enum VectorStoreError {
    #[error("collection already exists: {0}")]
    CollectionExists(String),
    #[error("collection not found: {0}")]
    CollectionNotFound(String),
    #[error("invalid dimension: {0}")]
    InvalidDimension(String),
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),
    #[error("index not built for collection: {0}")]
    IndexNotBuilt(String),
    #[error("backend error: {0}")]
    Backend(String),
    #[error("backend request failed: {0}")]
    Reqwest(#[from] reqwest::Error),
}

impl From<VectorStoreError> for common::error::CoreError {
    fn from(err: VectorStoreError) -> Self {
        match err {
            VectorStoreError::InvalidDimension(msg) | VectorStoreError::DimensionMismatch(msg) => {
                common::error::CoreError::Validation(msg)
            }
            VectorStoreError::CollectionNotFound(name) => {
                common::error::CoreError::NotFound(format!("collection '{name}'"))
            }
            VectorStoreError::CollectionExists(name) => {
                common::error::CoreError::Configuration(format!("collection '{name}' already exists"))
            }
            VectorStoreError::IndexNotBuilt(name) => {
                common::error::CoreError::Internal(format!("index not built for '{name}'"))
            }
            VectorStoreError::Backend(msg) => common::error::CoreError::Internal(msg),
            VectorStoreError::Reqwest(e) => common::error::CoreError::Reqwest(e),
        }
    }
}
