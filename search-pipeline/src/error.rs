use common::error::CoreError;
use thiserror::Error;

/// Top-level failure kinds a caller of `execute` can see. Rewrite and
/// evaluation failures never reach here — they soft-fail inside the
/// pipeline and show up as a degraded field on `SearchResult` instead.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("retrieval failed: {0}")]
    Retrieval(CoreError),

    #[error("generation failed: {0}")]
    Generation(CoreError),
}

impl From<SearchError> for CoreError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::Retrieval(inner) | SearchError::Generation(inner) => inner,
        }
    }
}
