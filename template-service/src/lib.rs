pub mod cache;
pub mod context_strategy;
pub mod error;
pub mod format;
pub mod parameters;

use std::collections::HashMap;
use std::sync::Arc;

use common::{
    error::CoreError,
    repository::{ParametersRepository, TemplateRepository},
    storage::types::{
        chunk::QueryResult,
        llm_parameters::LLMParameters,
        prompt_template::{PromptTemplate, TemplateType},
    },
};
use llm_provider::LlmProvider;
use serde_json::Value;

pub use cache::FormatCache;
pub use error::TemplateError;

/// Resolves templates/parameters and realises them into prompt
/// text. Holds the repositories plus a process-wide format cache so
/// repeated `format` calls with identical (template, variables) are free.
#[derive(Clone)]
pub struct TemplateService {
    templates: TemplateRepository,
    parameters: ParametersRepository,
    cache: FormatCache,
}

impl TemplateService {
    pub fn new(templates: TemplateRepository, parameters: ParametersRepository) -> Self {
        Self { templates, parameters, cache: FormatCache::new() }
    }

    pub async fn resolve_template(
        &self,
        user_id: &str,
        collection_id: Option<&str>,
        template_type: TemplateType,
    ) -> Result<PromptTemplate, CoreError> {
        self.templates.resolve(user_id, collection_id, template_type).await
    }

    pub async fn resolve_parameters(&self, user_id: &str) -> Result<LLMParameters, CoreError> {
        self.parameters.resolve(user_id).await
    }

    /// Validates `variables` against the template's `input_variables` and
    /// optional `validation_schema`, then replaces placeholders. Cached by
    /// SHA-256(template.id ⊕ variables) when `use_cache` is set.
    pub async fn format(
        &self,
        template: &PromptTemplate,
        variables: &HashMap<String, Value>,
        use_cache: bool,
    ) -> Result<String, TemplateError> {
        let variables_repr = serde_json::to_string(variables).unwrap_or_default();
        let cache_key = FormatCache::key(&template.id, &variables_repr);

        if use_cache {
            if let Some(hit) = self.cache.get(&cache_key).await {
                return Ok(hit);
            }
        }

        format::validate_against_schema(template.validation_schema.as_ref(), variables)?;
        let rendered = format::format_template(&template.template_format, &template.input_variables, variables)?;

        if use_cache {
            self.cache.put(cache_key, rendered.clone()).await;
        }
        Ok(rendered)
    }

    pub async fn apply_context_strategy(
        &self,
        template: &PromptTemplate,
        chunks: &[QueryResult],
        synthesis_provider: Option<(&dyn LlmProvider, &LLMParameters)>,
    ) -> Result<String, TemplateError> {
        context_strategy::apply_context_strategy(
            &template.context_strategy,
            chunks,
            synthesis_provider,
            Some(&self.cache),
        )
        .await
    }
}

/// Convenience constructor shared by crates assembling the full
/// dependency-injection container (search-pipeline, cot-controller) from a
/// single database handle.
pub fn from_db(db: Arc<common::storage::db::SurrealDbClient>) -> TemplateService {
    TemplateService::new(TemplateRepository::new(db.clone()), ParametersRepository::new(db))
}
