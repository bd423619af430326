pub mod drivers;
mod error;
mod lease;

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use common::storage::types::{
    chunk::{EmbeddedChunk, QueryResult},
    collection::Metric,
};
use serde::{Deserialize, Serialize};

pub use error::VectorStoreError;
pub use lease::{ConnectionLease, ConnectionPool};

/// Chunks are grouped into batches of this size before a backend call,
/// unless the backend config overrides it.
pub const DEFAULT_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone)]
pub struct CollectionConfig {
    pub name: String,
    pub dimension: usize,
    pub metric: Metric,
    pub index_kind: String,
    pub index_params: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Flat,
    IvfFlat { nlist: usize },
    Hnsw { m: u32, ef_construction: u32 },
}

/// Informative index-selection guide below, exposed as a pure function
/// so a collection-creation caller can pick a sane default without
/// duplicating the thresholds.
pub fn recommend_index_kind(n: usize) -> IndexKind {
    if n <= 10_000 {
        IndexKind::Flat
    } else if n <= 1_000_000 {
        let nlist = (n as f64).sqrt().round() as usize;
        IndexKind::IvfFlat { nlist: nlist.max(1) }
    } else {
        IndexKind::Hnsw {
            m: 16,
            ef_construction: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionStats {
    pub count: u64,
    pub dimension: usize,
    pub index_kind: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorDbResponse {
    Healthy,
    Unreachable,
}

/// Outcome of a batched insert: IDs that made it in, and which batches
/// failed. Partial-failure policy is atomic per-batch — a failing
/// batch does not roll back batches that already committed.
#[derive(Debug, Clone, Default)]
pub struct AddDocumentsOutcome {
    pub inserted_ids: Vec<String>,
    pub failed_batches: Vec<(usize, String)>,
}

impl AddDocumentsOutcome {
    pub fn is_full_success(&self) -> bool {
        self.failed_batches.is_empty()
    }
}

/// Typed insertion/search over embedded chunks, polymorphic over backend
/// drivers. Validation (dimension, embeddings-present) happens at
/// this boundary, before any backend call, so failures are typed and cheap.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn create_collection(&self, config: CollectionConfig) -> Result<(), VectorStoreError>;

    async fn delete_collection(&self, name: &str) -> Result<(), VectorStoreError>;

    async fn add_documents(
        &self,
        collection: &str,
        chunks: Vec<EmbeddedChunk>,
    ) -> Result<AddDocumentsOutcome, VectorStoreError>;

    async fn search(
        &self,
        collection: &str,
        query_embedding: Vec<f32>,
        top_k: usize,
        expr: Option<&str>,
    ) -> Result<Vec<QueryResult>, VectorStoreError>;

    async fn health_check(&self, timeout: Duration) -> Result<VectorDbResponse, VectorStoreError>;

    async fn get_collection_stats(&self, name: &str) -> Result<CollectionStats, VectorStoreError>;
}

/// Validates that every chunk shares the collection's configured dimension
/// before any backend call.
pub fn validate_batch_dimension(
    chunks: &[EmbeddedChunk],
    expected_dimension: usize,
) -> Result<(), VectorStoreError> {
    for chunk in chunks {
        if chunk.embeddings.len() != expected_dimension {
            return Err(VectorStoreError::DimensionMismatch(format!(
                "chunk {} has dimension {}, collection expects {expected_dimension}",
                chunk.chunk.chunk_id,
                chunk.embeddings.len()
            )));
        }
    }
    Ok(())
}

/// Splits chunks into fixed-size batches, preserving
/// order so batch index `i` maps predictably onto `failed_batches`.
pub fn batch_chunks(chunks: Vec<EmbeddedChunk>, batch_size: usize) -> Vec<Vec<EmbeddedChunk>> {
    let batch_size = batch_size.max(1);
    chunks
        .chunks(batch_size)
        .map(<[EmbeddedChunk]>::to_vec)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_selection_matches_thresholds() {
        assert_eq!(recommend_index_kind(100), IndexKind::Flat);
        assert_eq!(recommend_index_kind(10_000), IndexKind::Flat);
        assert!(matches!(
            recommend_index_kind(50_000),
            IndexKind::IvfFlat { .. }
        ));
        assert!(matches!(
            recommend_index_kind(2_000_000),
            IndexKind::Hnsw { m: 16, ef_construction: 200 }
        ));
    }

    #[test]
    fn batch_chunks_preserves_order_and_size() {
        use common::storage::types::chunk::Chunk;
        let chunks: Vec<EmbeddedChunk> = (0..250)
            .map(|i| {
                EmbeddedChunk::new(
                    Chunk::new(format!("c{i}"), "text", "doc1", i),
                    vec![0.0; 4],
                )
                .unwrap()
            })
            .collect();
        let batches = batch_chunks(chunks, 100);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].len(), 100);
        assert_eq!(batches[2].len(), 50);
        assert_eq!(batches[0][0].chunk.chunk_id, "c0");
    }

    #[test]
    fn validate_batch_dimension_rejects_mismatch() {
        use common::storage::types::chunk::Chunk;
        let chunk = EmbeddedChunk::new(Chunk::new("c0", "text", "doc1", 0), vec![0.0; 3]).unwrap();
        assert!(validate_batch_dimension(&[chunk.clone()], 3).is_ok());
        assert!(validate_batch_dimension(&[chunk], 4).is_err());
    }
}
