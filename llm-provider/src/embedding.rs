use async_openai::{
    config::OpenAIConfig,
    types::{CreateEmbeddingRequestArgs, EmbeddingInput},
    Client,
};
use async_trait::async_trait;
use common::error::PermanentKind;

use crate::error::ProviderError;
use crate::retry::with_retry;

pub const DEFAULT_EMBEDDING_BATCH_SIZE: usize = 96;

/// Embedding backend contract: output length and order mirror the
/// input, every vector shares one dimension. Batching and retry live behind
/// this trait so callers never see a raw HTTP failure.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;

    fn dimension(&self) -> usize;
}

pub struct OpenAiEmbeddingProvider {
    client: Client<OpenAIConfig>,
    model: String,
    dimension: usize,
    batch_size: usize,
}

impl OpenAiEmbeddingProvider {
    pub fn new(client: Client<OpenAIConfig>, model: impl Into<String>, dimension: usize) -> Self {
        Self {
            client,
            model: model.into(),
            dimension,
            batch_size: DEFAULT_EMBEDDING_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    async fn embed_chunk(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, ProviderError> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(EmbeddingInput::StringArray(texts.clone()))
            .build()
            .map_err(ProviderError::from)?;

        let response = with_retry(|| {
            let client = &self.client;
            let request = request.clone();
            async move { client.embeddings().create(request).await.map_err(ProviderError::from) }
        })
        .await?;

        let mut vectors: Vec<(u32, Vec<f32>)> = response
            .data
            .into_iter()
            .map(|d| (d.index, d.embedding))
            .collect();
        vectors.sort_by_key(|(index, _)| *index);

        if vectors.len() != texts.len() {
            return Err(ProviderError::Permanent(PermanentKind::ResponseParseError(
                format!("expected {} embeddings, got {}", texts.len(), vectors.len()),
            )));
        }

        for (_, vector) in &vectors {
            if vector.len() != self.dimension {
                return Err(ProviderError::Permanent(PermanentKind::ResponseParseError(format!(
                    "embedding dimension {} does not match configured {}",
                    vector.len(),
                    self.dimension
                ))));
            }
        }

        Ok(vectors.into_iter().map(|(_, v)| v).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            out.extend(self.embed_chunk(chunk.to_vec()).await?);
        }
        Ok(out)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// A trivial deterministic embedder for tests: each text maps to a
/// fixed-dimension vector derived from its byte sum, so equal inputs embed
/// identically without a network call.
pub struct DeterministicTestEmbeddingProvider {
    dimension: usize,
}

impl DeterministicTestEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl EmbeddingProvider for DeterministicTestEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Ok(texts
            .iter()
            .map(|text| {
                let seed: u32 = text.bytes().map(u32::from).sum();
                (0..self.dimension)
                    .map(|i| ((seed as usize + i) % 997) as f32 / 997.0)
                    .collect()
            })
            .collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
