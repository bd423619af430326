use common::storage::types::{chunk::QueryResult, llm_parameters::LLMParameters, prompt_template::TemplateType};
use llm_provider::LlmProvider;
use retrieval_pipeline::Retriever;
use template_service::TemplateService;
use tracing::instrument;

use crate::{
    decompose::{classify_simple, decompose_questions},
    error::CotError,
    parser::{parse_response, ParsedAnswer},
    quality,
};

#[derive(Debug, Clone, Copy)]
pub struct CotConfig {
    pub max_reasoning_depth: u32,
    pub quality_threshold: f32,
    pub max_retries: u32,
    pub top_k: usize,
}

impl Default for CotConfig {
    fn default() -> Self {
        Self { max_reasoning_depth: 3, quality_threshold: 0.6, max_retries: 2, top_k: 5 }
    }
}

#[derive(Debug, Clone)]
pub struct StepResult {
    pub sub_question: String,
    pub answer: String,
    pub quality: f32,
    pub attempts: u32,
    pub citations: Vec<QueryResult>,
}

#[derive(Debug, Clone)]
pub struct CotResult {
    pub answer: String,
    pub steps: Vec<StepResult>,
    pub citations: Vec<QueryResult>,
}

/// Orchestrates DECOMPOSE → (STEP → SCORE → (ACCEPT|RETRY))* → SYNTHESIZE.
/// Holds references only — the same controller instance is reused across
/// concurrent pipeline executions, each carrying its own state on the stack.
pub struct CotController<'a> {
    retriever: &'a Retriever<'a>,
    templates: &'a TemplateService,
    llm: &'a dyn LlmProvider,
}

impl<'a> CotController<'a> {
    pub fn new(retriever: &'a Retriever<'a>, templates: &'a TemplateService, llm: &'a dyn LlmProvider) -> Self {
        Self { retriever, templates, llm }
    }

    #[instrument(skip_all, fields(user_id = %user_id, collection_id = %collection_id, max_reasoning_depth = config.max_reasoning_depth))]
    pub async fn run(
        &self,
        question: &str,
        collection_id: &str,
        user_id: &str,
        parameters: &LLMParameters,
        config: &CotConfig,
    ) -> Result<CotResult, CotError> {
        let sub_questions = if config.max_reasoning_depth <= 1 || classify_simple(question) {
            vec![question.to_string()]
        } else {
            self.decompose(question, user_id, parameters).await?
        };

        let mut steps = Vec::with_capacity(sub_questions.len());
        for sub_question in &sub_questions {
            let step = self.run_step(sub_question, collection_id, user_id, parameters, config).await?;
            steps.push(step);
        }

        let answer = if steps.len() == 1 {
            steps[0].answer.clone()
        } else {
            self.synthesize(question, &steps, user_id, parameters).await?
        };

        let citations = dedupe_citations(steps.iter().flat_map(|s| s.citations.iter().cloned()));

        Ok(CotResult { answer, steps, citations })
    }

    async fn decompose(
        &self,
        question: &str,
        user_id: &str,
        parameters: &LLMParameters,
    ) -> Result<Vec<String>, CotError> {
        let template = self
            .templates
            .resolve_template(user_id, None, TemplateType::CotDecomposition)
            .await
            .map_err(CotError::Decomposition)?;

        let mut variables = std::collections::HashMap::new();
        variables.insert("question".to_string(), serde_json::Value::String(question.to_string()));
        let prompt = self
            .templates
            .format(&template, &variables, false)
            .await
            .map_err(|err| CotError::Decomposition(err.into()))?;

        let result = self
            .llm
            .generate(&prompt, parameters)
            .await
            .map_err(|err| CotError::Decomposition(err.into()))?;

        let sub_questions = decompose_questions(&result.text);
        if sub_questions.is_empty() {
            Ok(vec![question.to_string()])
        } else {
            Ok(sub_questions)
        }
    }

    async fn run_step(
        &self,
        sub_question: &str,
        collection_id: &str,
        user_id: &str,
        parameters: &LLMParameters,
        config: &CotConfig,
    ) -> Result<StepResult, CotError> {
        let citations = self
            .retriever
            .search(sub_question, collection_id, config.top_k, None)
            .await
            .map_err(CotError::Retrieval)?;

        let template = self
            .templates
            .resolve_template(user_id, Some(collection_id), TemplateType::RagQuery)
            .await
            .map_err(CotError::StepSetup)?;

        let context = self
            .templates
            .apply_context_strategy(&template, &citations, Some((self.llm, parameters)))
            .await
            .map_err(|err| CotError::StepSetup(err.into()))?;

        let mut best: Option<(ParsedAnswer, f32)> = None;
        let mut attempts_used = 0;

        for attempt in 0..=config.max_retries {
            attempts_used = attempt + 1;
            let clarifying = if attempt == 0 {
                String::new()
            } else {
                "\n\nThe previous answer was unclear or malformed. Answer again, directly and concisely, with no reasoning preamble.".to_string()
            };
            let prompt = format!(
                "{}\n\nContext:\n{}\n\nQuestion: {}{}",
                template.system_prompt, context, sub_question, clarifying
            );

            let mut attempt_parameters = parameters.clone();
            attempt_parameters.temperature = parameters.temperature_for_attempt(attempt);

            let generated = self.llm.generate(&prompt, &attempt_parameters).await;
            let parsed = match generated {
                Ok(result) => parse_response(&result.text),
                Err(err) => {
                    if attempt == config.max_retries {
                        return Err(CotError::GenerationExhausted(err.into()));
                    }
                    tracing::warn!(%err, attempt, "CoT step generation failed, retrying");
                    continue;
                }
            };

            let score = quality::score(&parsed, sub_question);
            let is_better = best.as_ref().map(|(_, best_score)| score > *best_score).unwrap_or(true);
            if is_better {
                best = Some((parsed, score));
            }

            if score >= config.quality_threshold {
                break;
            }
        }

        let (parsed, quality) = best.ok_or_else(|| {
            CotError::GenerationExhausted(common::error::CoreError::Internal(
                "CoT step produced no attempts".to_string(),
            ))
        })?;

        Ok(StepResult {
            sub_question: sub_question.to_string(),
            answer: parsed.text,
            quality,
            attempts: attempts_used,
            citations,
        })
    }

    async fn synthesize(
        &self,
        question: &str,
        steps: &[StepResult],
        user_id: &str,
        parameters: &LLMParameters,
    ) -> Result<String, CotError> {
        let template = self
            .templates
            .resolve_template(user_id, None, TemplateType::QuestionGeneration)
            .await
            .map_err(CotError::Synthesis)?;

        let step_summary = steps
            .iter()
            .enumerate()
            .map(|(i, step)| format!("{}. {}\n   {}", i + 1, step.sub_question, step.answer))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "{}\n\nOriginal question: {}\n\nReasoning steps and their answers:\n{}\n\nSynthesize a single, direct final answer.",
            template.system_prompt, question, step_summary
        );

        let result =
            self.llm.generate(&prompt, parameters).await.map_err(|err| CotError::Synthesis(err.into()))?;
        let parsed = parse_response(&result.text);
        Ok(parsed.text)
    }
}

/// Preserves first-seen order while dropping later duplicates by chunk id.
fn dedupe_citations(results: impl Iterator<Item = QueryResult>) -> Vec<QueryResult> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for result in results {
        if seen.insert(result.chunk.chunk_id.clone()) {
            out.push(result);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use common::{
        repository::CollectionRepository,
        storage::{
            db::SurrealDbClient,
            types::{
                collection::{Collection, Metric},
                prompt_template::ContextStrategy,
            },
        },
    };
    use futures::stream::BoxStream;
    use llm_provider::{DeterministicTestEmbeddingProvider, GenerateDelta, GenerateResult, ProviderError};
    use std::{collections::HashMap, sync::Arc};
    use uuid::Uuid;
    use vector_store::{drivers::memory::InMemoryVectorStore, CollectionConfig, VectorStore};

    async fn memory_db() -> Arc<SurrealDbClient> {
        let database = Uuid::new_v4().to_string();
        let db = SurrealDbClient::memory("test_ns", &database).await.unwrap();
        db.ensure_initialized().await.unwrap();
        Arc::new(db)
    }

    fn parameters() -> LLMParameters {
        LLMParameters {
            id: "p1".to_string(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            owner_id: "user:1".to_string(),
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

    fn rag_template() -> common::storage::types::prompt_template::PromptTemplate {
        common::storage::types::prompt_template::PromptTemplate {
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

    /// Always answers cleanly inside an `<answer>` tag, regardless of prompt —
    /// enough to exercise the single-step ACCEPT path without a network call.
    struct ScriptedProvider;

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn generate(
            &self,
            _prompt: &str,
            _parameters: &LLMParameters,
        ) -> Result<GenerateResult, ProviderError> {
            Ok(GenerateResult {
                text: "<answer>IBM's revenue in 2022 was $60.5 billion.</answer>".to_string(),
                usage: Default::default(),
            })
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

        fn timeouts(&self) -> common::storage::types::provider_config::Timeouts {
            Default::default()
        }
    }

    #[tokio::test]
    async fn single_step_run_accepts_clean_answer_on_first_attempt() {
        let db = memory_db().await;
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
        let retriever = Retriever::new(&embeddings, &store, &collections);

        let templates = common::repository::TemplateRepository::new(db.clone());
        templates.create(rag_template()).await.unwrap();
        let parameters_repo = common::repository::ParametersRepository::new(db.clone());
        parameters_repo.create(parameters()).await.unwrap();
        let template_service = TemplateService::new(templates, parameters_repo);

        let llm = ScriptedProvider;
        let controller = CotController::new(&retriever, &template_service, &llm);
        let config = CotConfig { max_reasoning_depth: 1, ..CotConfig::default() };

        let result = controller
            .run("What was IBM's revenue in 2022?", "docs", "user:1", &parameters(), &config)
            .await
            .unwrap();

        assert_eq!(result.steps.len(), 1);
        assert_eq!(result.answer, "IBM's revenue in 2022 was $60.5 billion.");
        assert!(result.steps[0].quality >= config.quality_threshold);
    }
}
