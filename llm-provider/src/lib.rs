pub mod embedding;
pub mod error;
pub mod factory;
pub mod llm;
mod retry;

pub use embedding::{DeterministicTestEmbeddingProvider, EmbeddingProvider, OpenAiEmbeddingProvider};
pub use error::ProviderError;
pub use factory::ProviderFactory;
pub use llm::{GenerateDelta, GenerateResult, LlmProvider, OpenAiLlmProvider, RestChatProvider, RestDialect, Usage};
