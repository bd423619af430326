use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum TemplateError {
    #[error("missing template variable: {0}")]
    MissingVariable(String),
    #[error("invalid variable '{name}': {reason}")]
    InvalidVariable { name: String, reason: String },
    #[error("invalid LLM parameters: {0}")]
    InvalidParameters(String),
}

impl From<TemplateError> for common::error::CoreError {
    fn from(err: TemplateError) -> Self {
        common::error::CoreError::Validation(err.to_string())
    }
}
