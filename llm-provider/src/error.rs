use common::error::{CoreError, PermanentKind, TransientKind};
use thiserror::Error;

/// Provider-facing error shape, collapsed into the core taxonomy
/// (`TransientUpstream` / `PermanentUpstream`) at every provider boundary
/// so callers never branch on provider-specific error types.
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    #[error("transient: {0}")]
    Transient(TransientKind),
    #[error("permanent: {0}")]
    Permanent(PermanentKind),
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("provider misconfigured: {0}")]
    ProviderMisconfigured(String),
}

impl From<ProviderError> for CoreError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Transient(kind) => CoreError::TransientUpstream(kind),
            ProviderError::Permanent(kind) => CoreError::PermanentUpstream(kind),
            ProviderError::UnknownProvider(name) => {
                CoreError::Configuration(format!("unknown provider: {name}"))
            }
            ProviderError::ProviderMisconfigured(msg) => CoreError::Configuration(msg),
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Transient(TransientKind::Timeout)
        } else {
            ProviderError::Permanent(PermanentKind::UpstreamError {
                code: err.status().map(|s| s.as_u16()).unwrap_or(0),
                body_excerpt: err.to_string().chars().take(256).collect(),
            })
        }
    }
}

impl From<async_openai::error::OpenAIError> for ProviderError {
    fn from(err: async_openai::error::OpenAIError) -> Self {
        match &err {
            async_openai::error::OpenAIError::ApiError(api_err) => {
                match api_err.code.as_deref() {
                    Some("rate_limit_exceeded") => {
                        ProviderError::Transient(TransientKind::RateLimited { retry_after: None })
                    }
                    Some("invalid_api_key") => ProviderError::Permanent(PermanentKind::AuthFailed),
                    _ => ProviderError::Permanent(PermanentKind::UpstreamError {
                        code: 0,
                        body_excerpt: api_err.message.chars().take(256).collect(),
                    }),
                }
            }
            other => ProviderError::Permanent(PermanentKind::ResponseParseError(
                other.to_string().chars().take(256).collect(),
            )),
        }
    }
}
