use common::{error::CoreError, repository::CollectionRepository, storage::types::chunk::QueryResult};
use llm_provider::EmbeddingProvider;
use tracing::instrument;
use vector_store::VectorStore;

/// Turns a query string into ranked chunks. Embedding, dimension
/// verification, and the backend call are sequential suspension points
/// within one pipeline execution — this type holds no per-call state,
/// so concurrent callers share it freely.
pub struct Retriever<'a> {
    embeddings: &'a dyn EmbeddingProvider,
    vector_store: &'a dyn VectorStore,
    collections: &'a CollectionRepository,
}

impl<'a> Retriever<'a> {
    pub fn new(
        embeddings: &'a dyn EmbeddingProvider,
        vector_store: &'a dyn VectorStore,
        collections: &'a CollectionRepository,
    ) -> Self {
        Self { embeddings, vector_store, collections }
    }

    /// 1. Embed query. 2. Fetch collection metadata, verify dimension.
    /// 3. Call the vector store with the combined filter. 4. Return results
    /// in descending-score order (the vector store already guarantees this,
    /// with no duplicate chunk ids).
    #[instrument(skip_all, fields(collection_id = %collection_id, top_k))]
    pub async fn search(
        &self,
        query_text: &str,
        collection_id: &str,
        top_k: usize,
        filters: Option<&str>,
    ) -> Result<Vec<QueryResult>, CoreError> {
        let collection = self
            .collections
            .get(collection_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("collection '{collection_id}'")))?;

        let mut query_embedding = self
            .embeddings
            .embed_batch(&[query_text.to_string()])
            .await
            .map_err(CoreError::from)?;
        let query_embedding = query_embedding
            .pop()
            .ok_or_else(|| CoreError::Internal("embedding provider returned no vector".to_string()))?;

        if query_embedding.len() != collection.dimension {
            return Err(CoreError::Validation(format!(
                "query embedding dimension {} does not match collection dimension {}",
                query_embedding.len(),
                collection.dimension
            )));
        }

        let results = self
            .vector_store
            .search(&collection.name, query_embedding, top_k, filters)
            .await?;
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::storage::{db::SurrealDbClient, types::collection::Metric};
    use llm_provider::DeterministicTestEmbeddingProvider;
    use std::{collections::HashMap, sync::Arc};
    use uuid::Uuid;
    use vector_store::{drivers::memory::InMemoryVectorStore, CollectionConfig};

    async fn memory_db() -> Arc<SurrealDbClient> {
        let database = Uuid::new_v4().to_string();
        let db = SurrealDbClient::memory("test_ns", &database).await.unwrap();
        db.ensure_initialized().await.unwrap();
        Arc::new(db)
    }

    #[tokio::test]
    async fn search_rejects_dimension_mismatch_before_backend_call() {
        let db = memory_db().await;
        let collections = CollectionRepository::new(db);
        let collection = common::storage::types::collection::Collection {
            id: "docs".to_string(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            name: "docs".to_string(),
            vector_backend: "memory".to_string(),
            dimension: 8,
            metric: Metric::Cosine,
            index_kind: "FLAT".to_string(),
            index_params: HashMap::new(),
            owner_id: "user:1".to_string(),
        };
        collections.create(collection).await.unwrap();

        let embeddings = DeterministicTestEmbeddingProvider::new(4);
        let store = InMemoryVectorStore::new();
        store
            .create_collection(CollectionConfig {
                name: "docs".to_string(),
                dimension: 8,
                metric: Metric::Cosine,
                index_kind: "FLAT".to_string(),
                index_params: HashMap::new(),
            })
            .await
            .unwrap();

        let retriever = Retriever::new(&embeddings, &store, &collections);
        let err = retriever.search("a question", "docs", 5, None).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }
}
