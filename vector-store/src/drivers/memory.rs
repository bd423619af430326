use std::{
    collections::HashMap,
    sync::Mutex,
    time::Duration,
};

use async_trait::async_trait;
use common::storage::types::{
    chunk::{EmbeddedChunk, QueryResult},
    collection::Metric,
};

use crate::{
    batch_chunks, validate_batch_dimension, AddDocumentsOutcome, CollectionConfig,
    CollectionStats, VectorDbResponse, VectorStore, VectorStoreError, DEFAULT_BATCH_SIZE,
};

struct CollectionData {
    config: CollectionConfig,
    chunks: Vec<EmbeddedChunk>,
}

/// In-process `VectorStore` used by tests and by any caller that wants the
/// contract without a live Milvus, mirroring how this workspace keeps an
/// in-memory SurrealDB fixture (`SurrealDbClient::memory`) alongside the real
/// backend rather than mocking the trait.
#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: Mutex<HashMap<String, CollectionData>>,
    batch_size: usize,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            collections: Mutex::new(HashMap::new()),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(batch_size: usize) -> Self {
        Self {
            collections: Mutex::new(HashMap::new()),
            batch_size,
        }
    }
}

fn similarity(metric: Metric, query: &[f32], candidate: &[f32]) -> f32 {
    match metric {
        Metric::Cosine => {
            let dot: f32 = query.iter().zip(candidate).map(|(a, b)| a * b).sum();
            let norm_q: f32 = query.iter().map(|v| v * v).sum::<f32>().sqrt();
            let norm_c: f32 = candidate.iter().map(|v| v * v).sum::<f32>().sqrt();
            if norm_q == 0.0 || norm_c == 0.0 {
                0.0
            } else {
                dot / (norm_q * norm_c)
            }
        }
        Metric::Ip => query.iter().zip(candidate).map(|(a, b)| a * b).sum(),
        Metric::L2 => {
            let dist: f32 = query
                .iter()
                .zip(candidate)
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f32>()
                .sqrt();
            -dist
        }
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn create_collection(&self, config: CollectionConfig) -> Result<(), VectorStoreError> {
        if config.dimension == 0 {
            return Err(VectorStoreError::InvalidDimension(format!(
                "collection '{}' must have dimension > 0",
                config.name
            )));
        }
        let mut collections = self.collections.lock().expect("lock poisoned");
        if collections.contains_key(&config.name) {
            return Err(VectorStoreError::CollectionExists(config.name));
        }
        collections.insert(
            config.name.clone(),
            CollectionData {
                config,
                chunks: Vec::new(),
            },
        );
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<(), VectorStoreError> {
        let mut collections = self.collections.lock().expect("lock poisoned");
        collections
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| VectorStoreError::CollectionNotFound(name.to_string()))
    }

    async fn add_documents(
        &self,
        collection: &str,
        chunks: Vec<EmbeddedChunk>,
    ) -> Result<AddDocumentsOutcome, VectorStoreError> {
        let dimension = {
            let collections = self.collections.lock().expect("lock poisoned");
            collections
                .get(collection)
                .map(|c| c.config.dimension)
                .ok_or_else(|| VectorStoreError::CollectionNotFound(collection.to_string()))?
        };
        validate_batch_dimension(&chunks, dimension)?;

        let batch_size = self.batch_size.max(1);
        let batches = batch_chunks(chunks, batch_size);
        let mut outcome = AddDocumentsOutcome::default();

        let mut collections = self.collections.lock().expect("lock poisoned");
        let Some(data) = collections.get_mut(collection) else {
            return Err(VectorStoreError::CollectionNotFound(collection.to_string()));
        };
        for batch in batches {
            outcome
                .inserted_ids
                .extend(batch.iter().map(|c| c.chunk.chunk_id.clone()));
            data.chunks.extend(batch);
        }

        Ok(outcome)
    }

    async fn search(
        &self,
        collection: &str,
        query_embedding: Vec<f32>,
        top_k: usize,
        expr: Option<&str>,
    ) -> Result<Vec<QueryResult>, VectorStoreError> {
        let collections = self.collections.lock().expect("lock poisoned");
        let data = collections
            .get(collection)
            .ok_or_else(|| VectorStoreError::CollectionNotFound(collection.to_string()))?;

        if query_embedding.len() != data.config.dimension {
            return Err(VectorStoreError::DimensionMismatch(format!(
                "query embedding has dimension {}, collection expects {}",
                query_embedding.len(),
                data.config.dimension
            )));
        }

        // `expr` supports only the trivial `metadata.<key>=<value>` filter in
        // this in-memory driver; Milvus's boolean expression language is not
        // reproduced here.
        let filter = expr.and_then(|e| e.strip_prefix("metadata.")).and_then(|rest| {
            let (key, value) = rest.split_once('=')?;
            Some((key.to_string(), value.trim_matches('"').to_string()))
        });

        let mut results: Vec<QueryResult> = data
            .chunks
            .iter()
            .filter(|c| match &filter {
                Some((key, value)) => c.chunk.metadata.get(key) == Some(value),
                None => true,
            })
            .map(|c| QueryResult {
                chunk: c.chunk.clone(),
                score: similarity(data.config.metric, &query_embedding, &c.embeddings),
            })
            .collect();

        // Descending score, deterministic tie-break on (chunk_index, document_id)
        // so repeated queries over an unchanged index are stable.
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk.chunk_index.cmp(&b.chunk.chunk_index))
                .then_with(|| a.chunk.document_id.cmp(&b.chunk.document_id))
        });
        results.truncate(top_k);
        Ok(results)
    }

    async fn health_check(&self, _timeout: Duration) -> Result<VectorDbResponse, VectorStoreError> {
        Ok(VectorDbResponse::Healthy)
    }

    async fn get_collection_stats(&self, name: &str) -> Result<CollectionStats, VectorStoreError> {
        let collections = self.collections.lock().expect("lock poisoned");
        let data = collections
            .get(name)
            .ok_or_else(|| VectorStoreError::CollectionNotFound(name.to_string()))?;
        Ok(CollectionStats {
            count: data.chunks.len() as u64,
            dimension: data.config.dimension,
            index_kind: data.config.index_kind.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::storage::types::chunk::Chunk;

    fn config(name: &str, dimension: usize) -> CollectionConfig {
        CollectionConfig {
            name: name.to_string(),
            dimension,
            metric: Metric::Cosine,
            index_kind: "FLAT".to_string(),
            index_params: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn create_collection_rejects_duplicate_name() {
        let store = InMemoryVectorStore::new();
        store.create_collection(config("docs", 3)).await.unwrap();
        let err = store.create_collection(config("docs", 3)).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::CollectionExists(_)));
    }

    #[tokio::test]
    async fn add_documents_rejects_dimension_mismatch_before_insert() {
        let store = InMemoryVectorStore::new();
        store.create_collection(config("docs", 3)).await.unwrap();
        let bad = EmbeddedChunk::new(Chunk::new("c1", "t", "d1", 0), vec![0.0, 0.0]).unwrap();
        let err = store.add_documents("docs", vec![bad]).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::DimensionMismatch(_)));
        let stats = store.get_collection_stats("docs").await.unwrap();
        assert_eq!(stats.count, 0);
    }

    #[tokio::test]
    async fn search_orders_by_descending_score_with_deterministic_tie_break() {
        let store = InMemoryVectorStore::new();
        store.create_collection(config("docs", 2)).await.unwrap();
        let chunks = vec![
            EmbeddedChunk::new(Chunk::new("c1", "t", "doc-b", 1), vec![1.0, 0.0]).unwrap(),
            EmbeddedChunk::new(Chunk::new("c2", "t", "doc-a", 1), vec![1.0, 0.0]).unwrap(),
            EmbeddedChunk::new(Chunk::new("c3", "t", "doc-z", 0), vec![1.0, 0.0]).unwrap(),
        ];
        store.add_documents("docs", chunks).await.unwrap();

        let results = store.search("docs", vec![1.0, 0.0], 10, None).await.unwrap();
        // All three tie on score 1.0: chunk_index 0 sorts first, then
        // document_id ascending among the chunk_index==1 pair.
        assert_eq!(results[0].chunk.chunk_id, "c3");
        assert_eq!(results[1].chunk.chunk_id, "c2");
        assert_eq!(results[2].chunk.chunk_id, "c1");
    }

    #[tokio::test]
    async fn search_respects_metadata_filter_expression() {
        let store = InMemoryVectorStore::new();
        store.create_collection(config("docs", 2)).await.unwrap();
        let mut metadata = HashMap::new();
        metadata.insert("lang".to_string(), "en".to_string());
        let matching = EmbeddedChunk::new(
            Chunk::new("c1", "t", "d1", 0).with_metadata(metadata),
            vec![1.0, 0.0],
        )
        .unwrap();
        let other = EmbeddedChunk::new(Chunk::new("c2", "t", "d2", 0), vec![1.0, 0.0]).unwrap();
        store.add_documents("docs", vec![matching, other]).await.unwrap();

        let results = store
            .search("docs", vec![1.0, 0.0], 10, Some("metadata.lang=\"en\""))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.chunk_id, "c1");
    }

    #[tokio::test]
    async fn delete_collection_then_search_is_not_found() {
        let store = InMemoryVectorStore::new();
        store.create_collection(config("docs", 2)).await.unwrap();
        store.delete_collection("docs").await.unwrap();
        let err = store.search("docs", vec![1.0, 0.0], 1, None).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::CollectionNotFound(_)));
    }
}
