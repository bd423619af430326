pub mod error;
pub mod evaluator;

use std::{collections::HashMap, time::Instant};

use common::storage::types::{chunk::QueryResult, prompt_template::TemplateType};
use cot_controller::{CotConfig, CotController, StepResult};
use llm_provider::LlmProvider;
use retrieval_pipeline::{HistoryTurn, QueryRewriter, Retriever};
use serde::{Deserialize, Serialize};
use template_service::TemplateService;
use tracing::instrument;

pub use error::SearchError;
pub use evaluator::{EvaluationResult, Evaluator};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub chunk_id: String,
    pub document_id: String,
    pub text: String,
    pub score: f32,
}

impl From<&QueryResult> for Citation {
    fn from(result: &QueryResult) -> Self {
        Self {
            chunk_id: result.chunk.chunk_id.clone(),
            document_id: result.chunk.document_id.clone(),
            text: result.chunk.text.clone(),
            score: result.score,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchInput {
    pub question: String,
    pub collection_id: String,
    pub user_id: String,
    pub history: Vec<HistoryTurn>,
    pub top_k: Option<usize>,
    pub cot_enabled: bool,
    pub cot_config: Option<CotConfig>,
    pub evaluation_enabled: bool,
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub evaluation: Option<EvaluationResult>,
    pub timings_by_stage: HashMap<String, u64>,
    pub cot_steps: Option<Vec<StepResult>>,
}

const DEFAULT_TOP_K: usize = 5;

/// The single entry point this core exposes. Wires rewrite → retrieval →
/// template assembly → generation (optionally via chain-of-thought) →
/// evaluation, and is the one place failure kinds get decided: retrieval
/// and generation failures propagate, rewrite and evaluation degrade in
/// place.
pub struct SearchPipeline<'a> {
    retriever: &'a Retriever<'a>,
    templates: &'a TemplateService,
    llm: &'a dyn LlmProvider,
}

impl<'a> SearchPipeline<'a> {
    pub fn new(retriever: &'a Retriever<'a>, templates: &'a TemplateService, llm: &'a dyn LlmProvider) -> Self {
        Self { retriever, templates, llm }
    }

    #[instrument(skip_all, fields(user_id = %input.user_id, collection_id = %input.collection_id, cot_enabled = input.cot_enabled))]
    pub async fn execute(&self, input: SearchInput) -> Result<SearchResult, SearchError> {
        let mut timings_by_stage = HashMap::new();
        let parameters = self
            .templates
            .resolve_parameters(&input.user_id)
            .await
            .map_err(SearchError::Retrieval)?;

        let rewriter = QueryRewriter::new(self.llm);
        let rewrite_start = Instant::now();
        let question = rewriter.rewrite(&input.question, &input.history, &parameters).await;
        timings_by_stage.insert("rewrite".to_string(), elapsed_ms(rewrite_start));

        let top_k = input.top_k.unwrap_or(DEFAULT_TOP_K);
        let retrieve_start = Instant::now();
        let retrieved = self
            .retriever
            .search(&question, &input.collection_id, top_k, None)
            .await
            .map_err(SearchError::Retrieval)?;
        timings_by_stage.insert("retrieve".to_string(), elapsed_ms(retrieve_start));

        let assemble_start = Instant::now();
        let template =
            self.templates.resolve_template(&input.user_id, Some(&input.collection_id), TemplateType::RagQuery)
                .await
                .map_err(SearchError::Retrieval)?;
        let context = self
            .templates
            .apply_context_strategy(&template, &retrieved, Some((self.llm, &parameters)))
            .await
            .map_err(|err| SearchError::Retrieval(err.into()))?;
        let mut variables = HashMap::new();
        variables.insert("question".to_string(), serde_json::Value::String(question.clone()));
        variables.insert("context".to_string(), serde_json::Value::String(context.clone()));
        let prompt = self
            .templates
            .format(&template, &variables, true)
            .await
            .map_err(|err| SearchError::Retrieval(err.into()))?;
        timings_by_stage.insert("assemble".to_string(), elapsed_ms(assemble_start));

        let generate_start = Instant::now();
        let (answer, cot_steps) = if input.cot_enabled {
            let cot_config = input.cot_config.unwrap_or_default();
            let controller = CotController::new(self.retriever, self.templates, self.llm);
            let result = controller
                .run(&question, &input.collection_id, &input.user_id, &parameters, &cot_config)
                .await
                .map_err(|err| SearchError::Generation(err.into()))?;
            (result.answer, Some(result.steps))
        } else {
            let result = self
                .llm
                .generate(&prompt, &parameters)
                .await
                .map_err(|err| SearchError::Generation(err.into()))?;
            (result.text, None)
        };
        timings_by_stage.insert("generate".to_string(), elapsed_ms(generate_start));

        let evaluation = if input.evaluation_enabled {
            let evaluate_start = Instant::now();
            let evaluator = Evaluator::new(self.templates, self.llm);
            let outcome = evaluator.evaluate(&input.user_id, &question, &answer, &context, &parameters).await;
            timings_by_stage.insert("evaluate".to_string(), elapsed_ms(evaluate_start));
            match outcome {
                Ok(result) => Some(result),
                Err(err) => {
                    tracing::warn!(%err, "evaluation failed, returning degraded result");
                    None
                }
            }
        } else {
            None
        };

        let citations = dedupe_citations(&retrieved);

        Ok(SearchResult { answer, citations, evaluation, timings_by_stage, cot_steps })
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Preserves original retrieval order while dropping later duplicates by
/// chunk id.
fn dedupe_citations(results: &[QueryResult]) -> Vec<Citation> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(results.len());
    for result in results {
        if seen.insert(result.chunk.chunk_id.clone()) {
            out.push(Citation::from(result));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use common::{
        repository::{CollectionRepository, ParametersRepository, TemplateRepository},
        storage::{
            db::SurrealDbClient,
            types::{
                collection::{Collection, Metric},
                llm_parameters::LLMParameters,
                prompt_template::{ContextStrategy, PromptTemplate},
                provider_config::Timeouts,
            },
        },
    };
    use futures::stream::BoxStream;
    use llm_provider::{DeterministicTestEmbeddingProvider, GenerateDelta, GenerateResult, ProviderError};
    use std::sync::Arc;
    use uuid::Uuid;
    use vector_store::{drivers::memory::InMemoryVectorStore, CollectionConfig, VectorStore};

    async fn memory_db() -> Arc<SurrealDbClient> {
        let database = Uuid::new_v4().to_string();
        let db = SurrealDbClient::memory("test_ns", &database).await.unwrap();
        db.ensure_initialized().await.unwrap();
        Arc::new(db)
    }

    fn parameters(id: &str, owner: &str) -> LLMParameters {
        LLMParameters {
            id: id.to_string(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            owner_id: owner.to_string(),
            name: "default".to_string(),
            temperature: 0.2,
            max_new_tokens: 128,
            top_p: 1.0,
            top_k: 40,
            repetition_penalty: 1.0,
            stop_sequences: vec![],
            is_default: true,
        }
    }

    fn rag_template() -> PromptTemplate {
        PromptTemplate {
            id: "rag_sys".to_string(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            owner_id: "system".to_string(),
            collection_id: None,
            name: "rag_sys".to_string(),
            template_type: TemplateType::RagQuery,
            system_prompt: "Answer using only the provided context.".to_string(),
            template_format: "{context}\n{question}".to_string(),
            input_variables: HashMap::new(),
            validation_schema: None,
            context_strategy: ContextStrategy::Concatenate { separator: "\n".to_string(), max_chunks: 5 },
            is_default: true,
        }
    }

    struct ScriptedProvider;

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn generate(
            &self,
            _prompt: &str,
            _parameters: &LLMParameters,
        ) -> Result<GenerateResult, ProviderError> {
            Ok(GenerateResult { text: "IBM's revenue in 2022 was $60.5 billion.".to_string(), usage: Default::default() })
        }

        async fn generate_stream(
            &self,
            _prompt: &str,
            _parameters: &LLMParameters,
        ) -> Result<BoxStream<'static, Result<GenerateDelta, ProviderError>>, ProviderError> {
            unimplemented!()
        }

        fn count_tokens(&self, text: &str) -> usize {
            text.len()
        }

        fn timeouts(&self) -> Timeouts {
            Default::default()
        }
    }

    async fn seeded_pipeline_parts(
        db: Arc<SurrealDbClient>,
    ) -> (CollectionRepository, InMemoryVectorStore, DeterministicTestEmbeddingProvider, TemplateService) {
        let collections = CollectionRepository::new(db.clone());
        collections
            .create(Collection {
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
            })
            .await
            .unwrap();

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

        let embeddings = DeterministicTestEmbeddingProvider::new(8);

        let templates = TemplateRepository::new(db.clone());
        templates.create(rag_template()).await.unwrap();
        let parameters_repo = ParametersRepository::new(db.clone());
        parameters_repo.create(parameters("p1", "user:1")).await.unwrap();
        let template_service = TemplateService::new(templates, parameters_repo);

        (collections, store, embeddings, template_service)
    }

    #[tokio::test]
    async fn execute_without_cot_returns_single_generation_and_citations() {
        let db = memory_db().await;
        let (collections, store, embeddings, template_service) = seeded_pipeline_parts(db).await;
        let retriever = Retriever::new(&embeddings, &store, &collections);
        let llm = ScriptedProvider;
        let pipeline = SearchPipeline::new(&retriever, &template_service, &llm);

        let input = SearchInput {
            question: "What was IBM's revenue in 2022?".to_string(),
            collection_id: "docs".to_string(),
            user_id: "user:1".to_string(),
            history: vec![],
            top_k: Some(3),
            cot_enabled: false,
            cot_config: None,
            evaluation_enabled: false,
        };

        let result = pipeline.execute(input).await.unwrap();
        assert_eq!(result.answer, "IBM's revenue in 2022 was $60.5 billion.");
        assert!(result.cot_steps.is_none());
        assert!(result.evaluation.is_none());
        assert!(result.timings_by_stage.contains_key("generate"));
    }

    #[tokio::test]
    async fn execute_deduplicates_citations_by_chunk_id() {
        let results = vec![
            QueryResult { chunk: common::storage::types::chunk::Chunk::new("c1", "a", "doc1", 0), score: 0.9 },
            QueryResult { chunk: common::storage::types::chunk::Chunk::new("c1", "a", "doc1", 0), score: 0.9 },
            QueryResult { chunk: common::storage::types::chunk::Chunk::new("c2", "b", "doc1", 1), score: 0.5 },
        ];
        let citations = dedupe_citations(&results);
        assert_eq!(citations.len(), 2);
        assert_eq!(citations[0].chunk_id, "c1");
        assert_eq!(citations[1].chunk_id, "c2");
    }
}
