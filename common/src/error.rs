use async_openai::error::OpenAIError;
use thiserror::Error;
use tokio::task::JoinError;

/// The taxonomy from the error-handling design: every failure a component can
/// surface to a caller collapses into one of these kinds before it crosses a
/// crate boundary.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("transient upstream error: {0}")]
    TransientUpstream(#[from] TransientKind),

    #[error("permanent upstream error: {0}")]
    PermanentUpstream(#[from] PermanentKind),

    #[error("degraded result: {0}")]
    DegradedResult(String),

    #[error("database error: {0}")]
    Database(#[from] surrealdb::Error),

    #[error("OpenAI error: {0}")]
    OpenAI(#[from] OpenAIError),

    #[error("task join error: {0}")]
    Join(#[from] JoinError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("internal service error: {0}")]
    Internal(String),
}

/// Retried internally by the provider itself; surfaced only after retry
/// exhaustion.
#[derive(Error, Debug, Clone)]
pub enum TransientKind {
    #[error("rate limited{}", retry_after.map(|s| format!(" (retry after {s}s)")).unwrap_or_default())]
    RateLimited { retry_after: Option<u64> },
    #[error("timeout")]
    Timeout,
}

/// Not retried; propagate straight to the caller.
#[derive(Error, Debug, Clone)]
pub enum PermanentKind {
    #[error("authentication failed")]
    AuthFailed,
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("response parse error: {0}")]
    ResponseParseError(String),
    #[error("upstream error {code}: {body_excerpt}")]
    UpstreamError { code: u16, body_excerpt: String },
}

impl CoreError {
    /// Bounds an upstream response body to a fixed excerpt length so error
    /// messages never leak full provider payloads.
    pub fn upstream(code: u16, body: &str) -> Self {
        let body_excerpt: String = body.chars().take(256).collect();
        Self::PermanentUpstream(PermanentKind::UpstreamError { code, body_excerpt })
    }
}
