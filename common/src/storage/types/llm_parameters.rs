use crate::stored_object;

stored_object!(LLMParameters, "llm_parameters", {
    owner_id: String,
    name: String,
    /// ∈ [0, 2].
    temperature: f32,
    /// ∈ [1, provider_cap].
    max_new_tokens: u32,
    /// ∈ (0, 1].
    top_p: f32,
    /// ∈ [1, 1000].
    top_k: u32,
    /// ∈ [1, 2].
    repetition_penalty: f32,
    stop_sequences: Vec<String>,
    /// Exactly one default per (owner, type); see `template-service`'s
    /// atomic swap.
    is_default: bool
});

impl LLMParameters {
    /// Attempt-dependent temperature schedule used by the CoT retry loop
    ///: `base_temp + 0.1 * attempt`, clamped at 1.5.
    pub fn temperature_for_attempt(&self, attempt: u32) -> f32 {
        (self.temperature + 0.1 * attempt as f32).min(1.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn params(temperature: f32) -> LLMParameters {
        LLMParameters {
            id: "p1".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            owner_id: "user:1".to_string(),
            name: "default".to_string(),
            temperature,
            max_new_tokens: 512,
            top_p: 1.0,
            top_k: 40,
            repetition_penalty: 1.0,
            stop_sequences: vec![],
            is_default: true,
        }
    }

    #[test]
    fn temperature_schedule_clamps_at_one_point_five() {
        let p = params(1.4);
        assert!((p.temperature_for_attempt(0) - 1.4).abs() < 1e-6);
        assert!((p.temperature_for_attempt(1) - 1.5).abs() < 1e-6);
        assert!((p.temperature_for_attempt(5) - 1.5).abs() < 1e-6);
    }
}
