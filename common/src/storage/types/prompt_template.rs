use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::stored_object;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TemplateType {
    RagQuery,
    QuestionGeneration,
    ResponseEvaluation,
    CotDecomposition,
    Custom,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TruncateEnd {
    Start,
    Middle,
    End,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PriorityOrdering {
    Relevance,
    DocumentOrder,
}

/// The policy that converts ranked chunks into a bounded-length prompt
/// context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContextStrategy {
    Concatenate {
        separator: String,
        max_chunks: usize,
    },
    Truncate {
        max_length: usize,
        end: TruncateEnd,
    },
    Priority {
        max_chunks: usize,
        ordering: PriorityOrdering,
    },
    Summarize {
        max_length: usize,
    },
}

stored_object!(PromptTemplate, "prompt_template", {
    owner_id: String,
    collection_id: Option<String>,
    name: String,
    template_type: TemplateType,
    system_prompt: String,
    /// `{var}` placeholders; `{{`/`}}` escape to literal braces.
    template_format: String,
    /// Variable name -> human-readable description.
    input_variables: HashMap<String, String>,
    validation_schema: Option<serde_json::Value>,
    context_strategy: ContextStrategy,
    /// Exactly one default per (owner, collection?, type); see
    /// `template-service`'s atomic swap.
    is_default: bool
});
