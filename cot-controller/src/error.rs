use common::error::CoreError;
use thiserror::Error;

/// Failures that can end a CoT run early. Low-quality answers are not an
/// error — they are handled in-state by the retry/FAIL_SOFT path — so this
/// taxonomy only covers failures that leave the controller with nothing to
/// return.
#[derive(Error, Debug)]
pub enum CotError {
    #[error("decomposition failed: {0}")]
    Decomposition(CoreError),

    #[error("retrieval failed: {0}")]
    Retrieval(CoreError),

    #[error("step setup failed: {0}")]
    StepSetup(CoreError),

    #[error("generation exhausted all retries: {0}")]
    GenerationExhausted(CoreError),

    #[error("synthesis failed: {0}")]
    Synthesis(CoreError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl From<CotError> for CoreError {
    fn from(err: CotError) -> Self {
        match err {
            CotError::Decomposition(inner)
            | CotError::Retrieval(inner)
            | CotError::StepSetup(inner)
            | CotError::GenerationExhausted(inner)
            | CotError::Synthesis(inner)
            | CotError::Core(inner) => inner,
        }
    }
}
