use common::storage::types::{conversation::Role, llm_parameters::LLMParameters};
use llm_provider::LlmProvider;

/// A single turn of conversation history, as the caller of `rewrite` sees it
/// — independent of the `ConversationMessage` storage type so this crate
/// doesn't need a database handle just to rewrite a question.
#[derive(Debug, Clone)]
pub struct HistoryTurn {
    pub role: Role,
    pub content: String,
}

/// Markers that, when they open a question, suggest it refers out to prior
/// turns rather than standing alone.
const ANAPHORA_MARKERS: &[&str] = &[
    "it", "its", "that", "those", "this", "these", "they", "them", "he", "she", "him", "her",
    "also", "and what about", "what about",
];

const REWRITE_TEMPLATE: &str = "Given the conversation history below, rewrite the final user question as a standalone question that can be understood without the history. Return only the rewritten question.\n\nHistory:\n{history}\n\nQuestion: {question}";

/// Produces a standalone form of a question given prior turns.
/// Self-contained questions (no history, or no anaphora) pass through
/// unchanged to avoid an LLM call; failures fall back to the original
/// question rather than failing the pipeline.
pub struct QueryRewriter<'a> {
    provider: &'a dyn LlmProvider,
}

impl<'a> QueryRewriter<'a> {
    pub fn new(provider: &'a dyn LlmProvider) -> Self {
        Self { provider }
    }

    pub async fn rewrite(
        &self,
        current_question: &str,
        history: &[HistoryTurn],
        parameters: &LLMParameters,
    ) -> String {
        if history.is_empty() || is_self_contained(current_question) {
            return current_question.to_string();
        }

        let history_text = history
            .iter()
            .map(|turn| format!("{:?}: {}", turn.role, turn.content))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = REWRITE_TEMPLATE
            .replace("{history}", &history_text)
            .replace("{question}", current_question);

        match self.provider.generate(&prompt, parameters).await {
            Ok(result) => {
                let rewritten = result.text.trim();
                if rewritten.is_empty() {
                    current_question.to_string()
                } else {
                    rewritten.to_string()
                }
            }
            Err(err) => {
                tracing::warn!(%err, "query rewrite failed, falling back to original question");
                current_question.to_string()
            }
        }
    }
}

/// Heuristic self-containment check: a question is treated as already
/// standalone unless it opens with (or is built almost entirely around) a
/// pronoun/anaphora marker that would need prior context to resolve.
fn is_self_contained(question: &str) -> bool {
    let lowered = question.to_lowercase();
    let first_word = lowered.split_whitespace().next().unwrap_or("");
    !ANAPHORA_MARKERS.iter().any(|marker| first_word == *marker || lowered.starts_with(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> LLMParameters {
        LLMParameters {
            id: "p1".to_string(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            owner_id: "user:1".to_string(),
            name: "default".to_string(),
            temperature: 0.0,
            max_new_tokens: 64,
            top_p: 1.0,
            top_k: 40,
            repetition_penalty: 1.0,
            stop_sequences: vec![],
            is_default: true,
        }
    }

    struct FailingProvider;
    #[async_trait::async_trait]
    impl LlmProvider for FailingProvider {
        async fn generate(
            &self,
            _prompt: &str,
            _parameters: &LLMParameters,
        ) -> Result<llm_provider::GenerateResult, llm_provider::ProviderError> {
            Err(llm_provider::ProviderError::Permanent(
                common::error::PermanentKind::ModelUnavailable("down".to_string()),
            ))
        }
        async fn generate_stream(
            &self,
            _prompt: &str,
            _parameters: &LLMParameters,
        ) -> Result<
            futures::stream::BoxStream<'static, Result<llm_provider::GenerateDelta, llm_provider::ProviderError>>,
            llm_provider::ProviderError,
        > {
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
    async fn empty_history_passes_through_unchanged() {
        let provider = FailingProvider;
        let rewriter = QueryRewriter::new(&provider);
        let result = rewriter.rewrite("What is RAG?", &[], &params()).await;
        assert_eq!(result, "What is RAG?");
    }

    #[tokio::test]
    async fn provider_failure_falls_back_to_original_question() {
        let provider = FailingProvider;
        let rewriter = QueryRewriter::new(&provider);
        let history = vec![HistoryTurn { role: Role::User, content: "Tell me about IBM".to_string() }];
        let result = rewriter.rewrite("What about its revenue?", &history, &params()).await;
        assert_eq!(result, "What about its revenue?");
    }

    #[test]
    fn self_contained_question_is_detected() {
        assert!(is_self_contained("What was IBM's revenue in 2022?"));
        assert!(!is_self_contained("What about its revenue?"));
    }
}
