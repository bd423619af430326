use common::storage::types::{
    chunk::QueryResult,
    prompt_template::{ContextStrategy, PriorityOrdering, TruncateEnd},
};
use llm_provider::LlmProvider;

use crate::cache::FormatCache;
use crate::error::TemplateError;

/// Realises a `ContextStrategy` over ranked chunks into prompt text.
pub async fn apply_context_strategy(
    strategy: &ContextStrategy,
    chunks: &[QueryResult],
    synthesis_provider: Option<(&dyn LlmProvider, &common::storage::types::llm_parameters::LLMParameters)>,
    cache: Option<&FormatCache>,
) -> Result<String, TemplateError> {
    match strategy {
        ContextStrategy::Concatenate { separator, max_chunks } => {
            Ok(chunks
                .iter()
                .take(*max_chunks)
                .map(|c| c.chunk.text.as_str())
                .collect::<Vec<_>>()
                .join(separator))
        }
        ContextStrategy::Priority { max_chunks, ordering } => {
            let mut ordered: Vec<&QueryResult> = chunks.iter().collect();
            if matches!(ordering, PriorityOrdering::Relevance) {
                ordered.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
            }
            Ok(ordered
                .into_iter()
                .take(*max_chunks)
                .map(|c| c.chunk.text.as_str())
                .collect::<Vec<_>>()
                .join("\n"))
        }
        ContextStrategy::Truncate { max_length, end } => {
            let joined = chunks.iter().map(|c| c.chunk.text.as_str()).collect::<Vec<_>>().join("\n");
            Ok(truncate(&joined, *max_length, *end))
        }
        ContextStrategy::Summarize { max_length } => {
            let joined = chunks.iter().map(|c| c.chunk.text.as_str()).collect::<Vec<_>>().join("\n");
            summarize(&joined, *max_length, synthesis_provider, cache).await
        }
    }
}

fn truncate(text: &str, max_length: usize, end: TruncateEnd) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_length {
        return text.to_string();
    }
    match end {
        TruncateEnd::End => chars[..max_length].iter().collect(),
        TruncateEnd::Start => chars[chars.len() - max_length..].iter().collect(),
        TruncateEnd::Middle => {
            let half = max_length / 2;
            let head: String = chars[..half].iter().collect();
            let tail: String = chars[chars.len() - (max_length - half)..].iter().collect();
            format!("{head}...{tail}")
        }
    }
}

const SUMMARY_TEMPLATE: &str = "Summarize the following context in under {max_length} characters, preserving all facts and figures:\n\n{context}";

async fn summarize(
    text: &str,
    max_length: usize,
    provider: Option<(&dyn LlmProvider, &common::storage::types::llm_parameters::LLMParameters)>,
    cache: Option<&FormatCache>,
) -> Result<String, TemplateError> {
    let cache_key = FormatCache::key("summarize", &format!("{max_length}:{text}"));
    if let Some(cache) = cache {
        if let Some(hit) = cache.get(&cache_key).await {
            return Ok(hit);
        }
    }

    let Some((provider, parameters)) = provider else {
        // No synthesis provider wired (e.g. a unit test exercising only the
        // other strategies): fall back to a plain truncation rather than
        // failing the whole context-assembly call.
        return Ok(truncate(text, max_length, TruncateEnd::End));
    };

    let prompt = SUMMARY_TEMPLATE
        .replace("{max_length}", &max_length.to_string())
        .replace("{context}", text);

    let result = provider
        .generate(&prompt, parameters)
        .await
        .map_err(|e| TemplateError::InvalidVariable {
            name: "context".to_string(),
            reason: format!("summarization call failed: {e}"),
        })?;

    if let Some(cache) = cache {
        cache.put(cache_key, result.text.clone()).await;
    }
    Ok(result.text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::storage::types::chunk::Chunk;

    fn qr(text: &str, score: f32) -> QueryResult {
        QueryResult { chunk: Chunk::new("c1", text, "d1", 0), score }
    }

    #[tokio::test]
    async fn concatenate_joins_first_n_in_order() {
        let chunks = vec![qr("a", 0.1), qr("b", 0.9), qr("c", 0.5)];
        let strategy = ContextStrategy::Concatenate { separator: "|".to_string(), max_chunks: 2 };
        let result = apply_context_strategy(&strategy, &chunks, None, None).await.unwrap();
        assert_eq!(result, "a|b");
    }

    #[tokio::test]
    async fn priority_sorts_by_score_descending() {
        let chunks = vec![qr("low", 0.1), qr("high", 0.9)];
        let strategy = ContextStrategy::Priority { max_chunks: 2, ordering: PriorityOrdering::Relevance };
        let result = apply_context_strategy(&strategy, &chunks, None, None).await.unwrap();
        assert_eq!(result, "high\nlow");
    }

    #[tokio::test]
    async fn truncate_cuts_to_max_length_at_end() {
        let chunks = vec![qr("abcdefghij", 0.0)];
        let strategy = ContextStrategy::Truncate { max_length: 5, end: TruncateEnd::End };
        let result = apply_context_strategy(&strategy, &chunks, None, None).await.unwrap();
        assert_eq!(result, "abcde");
    }

    #[tokio::test]
    async fn summarize_without_provider_falls_back_to_truncate() {
        let chunks = vec![qr("abcdefghij", 0.0)];
        let strategy = ContextStrategy::Summarize { max_length: 4 };
        let result = apply_context_strategy(&strategy, &chunks, None, None).await.unwrap();
        assert_eq!(result, "abcd");
    }
}
