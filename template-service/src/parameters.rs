use common::storage::types::llm_parameters::LLMParameters;

use crate::error::TemplateError;

/// A provider's advertised cap on `max_new_tokens`; validation against it is
/// the caller's job (the provider isn't known until the factory resolves it), but the
/// clamp/range checks that don't need a provider happen here.
pub fn validate_parameters(parameters: &LLMParameters, model_cap: Option<u32>) -> Result<(), TemplateError> {
    if !(0.0..=2.0).contains(&parameters.temperature) {
        return Err(TemplateError::InvalidParameters(format!(
            "temperature {} out of range [0, 2]",
            parameters.temperature
        )));
    }
    if parameters.max_new_tokens == 0 {
        return Err(TemplateError::InvalidParameters("max_new_tokens must be > 0".to_string()));
    }
    if let Some(cap) = model_cap {
        if parameters.max_new_tokens > cap {
            return Err(TemplateError::InvalidParameters(format!(
                "max_new_tokens {} exceeds model cap {cap}",
                parameters.max_new_tokens
            )));
        }
    }
    if !(0.0..=1.0).contains(&parameters.top_p) || parameters.top_p == 0.0 {
        return Err(TemplateError::InvalidParameters(format!(
            "top_p {} out of range (0, 1]",
            parameters.top_p
        )));
    }
    if !(1..=1000).contains(&parameters.top_k) {
        return Err(TemplateError::InvalidParameters(format!(
            "top_k {} out of range [1, 1000]",
            parameters.top_k
        )));
    }
    if !(1.0..=2.0).contains(&parameters.repetition_penalty) {
        return Err(TemplateError::InvalidParameters(format!(
            "repetition_penalty {} out of range [1, 2]",
            parameters.repetition_penalty
        )));
    }
    Ok(())
}

/// Clamps out-of-range numeric fields in place rather than rejecting them,
/// for callers that want best-effort normalisation instead of a hard error.
pub fn clamp_parameters(parameters: &mut LLMParameters) {
    parameters.temperature = parameters.temperature.clamp(0.0, 2.0);
    parameters.top_p = parameters.top_p.clamp(f32::EPSILON, 1.0);
    parameters.top_k = parameters.top_k.clamp(1, 1000);
    parameters.repetition_penalty = parameters.repetition_penalty.clamp(1.0, 2.0);
    parameters.max_new_tokens = parameters.max_new_tokens.max(1);
}
