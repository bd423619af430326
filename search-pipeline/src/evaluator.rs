use common::{
    error::CoreError,
    storage::types::{llm_parameters::LLMParameters, prompt_template::TemplateType},
};
use llm_provider::LlmProvider;
use serde::Deserialize;
use template_service::TemplateService;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct EvaluationResult {
    pub faithfulness: f32,
    pub relevance: f32,
    pub groundedness: f32,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A read-only judge over (question, answer, context). Never persists
/// anything and never mutates the result it scores — a failed evaluation
/// must be safe to simply discard.
pub struct Evaluator<'a> {
    templates: &'a TemplateService,
    llm: &'a dyn LlmProvider,
}

impl<'a> Evaluator<'a> {
    pub fn new(templates: &'a TemplateService, llm: &'a dyn LlmProvider) -> Self {
        Self { templates, llm }
    }

    pub async fn evaluate(
        &self,
        user_id: &str,
        question: &str,
        answer: &str,
        context: &str,
        parameters: &LLMParameters,
    ) -> Result<EvaluationResult, CoreError> {
        let template = self.templates.resolve_template(user_id, None, TemplateType::ResponseEvaluation).await?;

        let mut variables = std::collections::HashMap::new();
        variables.insert("question".to_string(), serde_json::Value::String(question.to_string()));
        variables.insert("answer".to_string(), serde_json::Value::String(answer.to_string()));
        variables.insert("context".to_string(), serde_json::Value::String(context.to_string()));
        let prompt = self.templates.format(&template, &variables, false).await?;

        let result = self.llm.generate(&prompt, parameters).await?;
        parse_evaluation(&result.text)
    }
}

fn parse_evaluation(raw: &str) -> Result<EvaluationResult, CoreError> {
    let trimmed = raw.trim();
    let start = trimmed
        .find('{')
        .ok_or_else(|| CoreError::Internal("evaluation response contained no JSON object".to_string()))?;
    let end = trimmed
        .rfind('}')
        .ok_or_else(|| CoreError::Internal("evaluation response contained no JSON object".to_string()))?;
    if end <= start {
        return Err(CoreError::Internal("evaluation response contained no JSON object".to_string()));
    }
    let parsed: EvaluationResult = serde_json::from_str(&trimmed[start..=end])
        .map_err(|err| CoreError::Internal(format!("evaluation response did not match schema: {err}")))?;
    for (name, value) in [
        ("faithfulness", parsed.faithfulness),
        ("relevance", parsed.relevance),
        ("groundedness", parsed.groundedness),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(CoreError::Internal(format!("evaluation field '{name}' out of [0,1] range: {value}")));
        }
    }
    Ok(parsed)
}
