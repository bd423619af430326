use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use common::storage::types::chunk::{Chunk, EmbeddedChunk, QueryResult};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::instrument;

use crate::{
    batch_chunks, validate_batch_dimension, AddDocumentsOutcome, CollectionConfig,
    CollectionStats, VectorDbResponse, VectorStore, VectorStoreError, DEFAULT_BATCH_SIZE,
};

/// Driver for Milvus's RESTful v2 API, the mandatory backend for this store.
/// No maintained Rust client crate covers Milvus, so this talks to it the
/// same way the rest of this workspace talks to other HTTP services: a
/// plain `reqwest::Client` against the documented JSON API, rather than
/// inventing or vendoring a gRPC binding.
pub struct MilvusVectorStore {
    client: Client,
    base_url: String,
    token: String,
    batch_size: usize,
}

impl MilvusVectorStore {
    pub fn new(host: &str, port: u16, token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: format!("http://{host}:{port}"),
            token: token.into(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    fn request(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(&self.token)
            .header("Content-Type", "application/json")
    }

    async fn post_json(&self, path: &str, body: Value) -> Result<Value, VectorStoreError> {
        let response = self.request(path).json(&body).send().await?;
        let status = response.status();
        let payload: Value = response.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            return Err(VectorStoreError::Backend(format!(
                "milvus {path} returned {status}: {payload}"
            )));
        }
        let code = payload.get("code").and_then(Value::as_i64).unwrap_or(0);
        if code != 0 {
            let message = payload
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown milvus error");
            return Err(VectorStoreError::Backend(format!("milvus error {code}: {message}")));
        }
        Ok(payload)
    }
}

#[async_trait]
impl VectorStore for MilvusVectorStore {
    #[instrument(skip(self, config), fields(collection = %config.name))]
    async fn create_collection(&self, config: CollectionConfig) -> Result<(), VectorStoreError> {
        if config.dimension == 0 {
            return Err(VectorStoreError::InvalidDimension(format!(
                "collection '{}' must have dimension > 0",
                config.name
            )));
        }

        let describe = self
            .post_json(
                "/v2/vectordb/collections/describe",
                json!({ "collectionName": config.name }),
            )
            .await;
        if describe.is_ok() {
            return Err(VectorStoreError::CollectionExists(config.name));
        }

        self.post_json(
            "/v2/vectordb/collections/create",
            json!({
                "collectionName": config.name,
                "dimension": config.dimension,
                "metricType": metric_type_name(&config),
                "indexParams": config.index_params,
            }),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_collection(&self, name: &str) -> Result<(), VectorStoreError> {
        self.post_json("/v2/vectordb/collections/drop", json!({ "collectionName": name }))
            .await
            .map_err(|_| VectorStoreError::CollectionNotFound(name.to_string()))?;
        Ok(())
    }

    #[instrument(skip(self, chunks), fields(collection, batch_count))]
    async fn add_documents(
        &self,
        collection: &str,
        chunks: Vec<EmbeddedChunk>,
    ) -> Result<AddDocumentsOutcome, VectorStoreError> {
        let stats = self.get_collection_stats(collection).await?;
        validate_batch_dimension(&chunks, stats.dimension)?;

        let batches = batch_chunks(chunks, self.batch_size);
        let mut outcome = AddDocumentsOutcome::default();

        for (batch_index, batch) in batches.into_iter().enumerate() {
            let data: Vec<Value> = batch
                .iter()
                .map(|c| {
                    json!({
                        "chunk_id": c.chunk.chunk_id,
                        "vector": c.embeddings,
                        "text": c.chunk.text,
                        "document_id": c.chunk.document_id,
                        "chunk_index": c.chunk.chunk_index,
                        "metadata": c.chunk.metadata,
                    })
                })
                .collect();

            match self
                .post_json(
                    "/v2/vectordb/entities/insert",
                    json!({ "collectionName": collection, "data": data }),
                )
                .await
            {
                Ok(_) => {
                    outcome
                        .inserted_ids
                        .extend(batch.into_iter().map(|c| c.chunk.chunk_id));
                }
                Err(e) => outcome.failed_batches.push((batch_index, e.to_string())),
            }
        }

        Ok(outcome)
    }

    #[instrument(skip(self, query_embedding), fields(collection, top_k))]
    async fn search(
        &self,
        collection: &str,
        query_embedding: Vec<f32>,
        top_k: usize,
        expr: Option<&str>,
    ) -> Result<Vec<QueryResult>, VectorStoreError> {
        let mut body = json!({
            "collectionName": collection,
            "data": [query_embedding],
            "limit": top_k,
            "outputFields": ["chunk_id", "text", "document_id", "chunk_index", "metadata"],
        });
        if let Some(expr) = expr {
            body["filter"] = Value::String(expr.to_string());
        }

        let payload = self
            .post_json("/v2/vectordb/entities/search", body)
            .await
            .map_err(|e| match e {
                VectorStoreError::Backend(msg) if msg.contains("error 65535") => {
                    VectorStoreError::IndexNotBuilt(collection.to_string())
                }
                other => other,
            })?;

        let hits = payload
            .get("data")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut results: Vec<QueryResult> = hits
            .into_iter()
            .filter_map(|hit| {
                let chunk_id = hit.get("chunk_id")?.as_str()?.to_string();
                let text = hit.get("text").and_then(Value::as_str).unwrap_or_default().to_string();
                let document_id = hit
                    .get("document_id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let chunk_index = hit.get("chunk_index").and_then(Value::as_u64).unwrap_or(0) as u32;
                let score = hit.get("distance").and_then(Value::as_f64)? as f32;
                let metadata: HashMap<String, String> = hit
                    .get("metadata")
                    .and_then(|m| serde_json::from_value(m.clone()).ok())
                    .unwrap_or_default();

                Some(QueryResult {
                    chunk: Chunk::new(chunk_id, text, document_id, chunk_index).with_metadata(metadata),
                    score,
                })
            })
            .collect();

        // Milvus already returns results in descending-similarity order for
        // COSINE/IP; guard the contract explicitly rather than trust it.
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        Ok(results)
    }

    async fn health_check(&self, timeout: Duration) -> Result<VectorDbResponse, VectorStoreError> {
        let request = self.client.get(format!("{}/healthz", self.base_url)).send();
        match tokio::time::timeout(timeout, request).await {
            Ok(Ok(response)) if response.status().is_success() => Ok(VectorDbResponse::Healthy),
            _ => Ok(VectorDbResponse::Unreachable),
        }
    }

    async fn get_collection_stats(&self, name: &str) -> Result<CollectionStats, VectorStoreError> {
        let payload = self
            .post_json("/v2/vectordb/collections/describe", json!({ "collectionName": name }))
            .await
            .map_err(|_| VectorStoreError::CollectionNotFound(name.to_string()))?;

        let data = payload.get("data").unwrap_or(&Value::Null);
        let dimension = data.get("dimension").and_then(Value::as_u64).unwrap_or(0) as usize;
        let count = data.get("rowCount").and_then(Value::as_u64).unwrap_or(0);
        let index_kind = data
            .get("indexKind")
            .and_then(Value::as_str)
            .unwrap_or("FLAT")
            .to_string();

        Ok(CollectionStats { count, dimension, index_kind })
    }
}

fn metric_type_name(config: &CollectionConfig) -> &'static str {
    use common::storage::types::collection::Metric;
    match config.metric {
        Metric::L2 => "L2",
        Metric::Cosine => "COSINE",
        Metric::Ip => "IP",
    }
}
