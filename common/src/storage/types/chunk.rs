use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A contiguous segment of a document with metadata. Produced by the
/// ingestion collaborator; read-only to this core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub chunk_id: String,
    pub text: String,
    pub document_id: String,
    /// Monotonic within a document.
    pub chunk_index: u32,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Chunk {
    pub fn new(
        chunk_id: impl Into<String>,
        text: impl Into<String>,
        document_id: impl Into<String>,
        chunk_index: u32,
    ) -> Self {
        Self {
            chunk_id: chunk_id.into(),
            text: text.into(),
            document_id: document_id.into(),
            chunk_index,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A `Chunk` with a non-empty embedding vector, enforced at construction so
/// downstream code never has to re-check for an empty embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub embeddings: Vec<f32>,
}

impl EmbeddedChunk {
    pub fn new(chunk: Chunk, embeddings: Vec<f32>) -> Result<Self, CoreError> {
        if embeddings.is_empty() {
            return Err(CoreError::Validation(
                "EmbeddedChunk requires a non-empty embedding vector".to_string(),
            ));
        }
        Ok(Self { chunk, embeddings })
    }

    /// Validates the embedding dimension against a collection's configured
    /// dimension before a backend call.
    pub fn check_dimension(&self, expected: usize) -> Result<(), CoreError> {
        if self.embeddings.len() != expected {
            return Err(CoreError::Validation(format!(
                "dimension mismatch: chunk has {}, collection expects {expected}",
                self.embeddings.len()
            )));
        }
        Ok(())
    }
}

/// A scored retrieval hit. Scores are monotone with similarity under the
/// collection's metric: higher = more similar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResult {
    pub chunk: Chunk,
    pub score: f32,
}

/// A document owned by exactly one collection; an ordered sequence of
/// chunks. Owned and maintained by the ingestion collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: String,
    pub collection_id: String,
    pub name: String,
    pub chunks: Vec<Chunk>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_chunk_rejects_empty_vector() {
        let chunk = Chunk::new("c1", "text", "doc1", 0);
        let err = EmbeddedChunk::new(chunk, vec![]).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn embedded_chunk_round_trips_through_dimension_check() {
        let chunk = Chunk::new("c1", "text", "doc1", 0);
        let embedded = EmbeddedChunk::new(chunk, vec![0.1, 0.2, 0.3]).unwrap();
        assert!(embedded.check_dimension(3).is_ok());
        assert!(embedded.check_dimension(4).is_err());
    }
}
