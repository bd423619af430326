use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use common::storage::types::llm_parameters::LLMParameters;
use common::storage::types::provider_config::{Credentials, ProviderConfig, Timeouts};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::ProviderError;
use crate::retry::with_retry;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct GenerateResult {
    pub text: String,
    pub usage: Usage,
}

#[derive(Debug, Clone)]
pub struct GenerateDelta {
    pub delta: String,
    pub usage: Option<Usage>,
}

/// Unified surface over concrete chat-completion providers. `generate`
/// is pure with respect to (prompt, parameters, model, provider version)
/// modulo temperature sampling — implementations must not carry mutable
/// state that changes that tuple's meaning between calls.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        parameters: &LLMParameters,
    ) -> Result<GenerateResult, ProviderError>;

    async fn generate_stream(
        &self,
        prompt: &str,
        parameters: &LLMParameters,
    ) -> Result<BoxStream<'static, Result<GenerateDelta, ProviderError>>, ProviderError>;

    fn count_tokens(&self, text: &str) -> usize;

    fn timeouts(&self) -> Timeouts;
}

pub struct OpenAiLlmProvider {
    client: Client<OpenAIConfig>,
    model: String,
    timeouts: Timeouts,
}

impl OpenAiLlmProvider {
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        build_openai_provider(&config.api_url, config.credentials.clone(), config.model_id.clone(), config.timeouts)
    }
}

fn build_openai_provider(
    api_url: &str,
    credentials: Credentials,
    model: String,
    timeouts: Timeouts,
) -> Result<OpenAiLlmProvider, ProviderError> {
    let http_client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(timeouts.connect_secs))
        .timeout(Duration::from_secs(timeouts.read_secs))
        .build()
        .map_err(ProviderError::from)?;

    let openai_config = OpenAIConfig::new()
        .with_api_base(api_url)
        .with_api_key(credentials.expose());
    let client = Client::with_http_client(http_client).with_config(openai_config);

    Ok(OpenAiLlmProvider { client, model, timeouts })
}

#[async_trait]
impl LlmProvider for OpenAiLlmProvider {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn generate(
        &self,
        prompt: &str,
        parameters: &LLMParameters,
    ) -> Result<GenerateResult, ProviderError> {
        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(&self.model)
            .temperature(parameters.temperature)
            .top_p(parameters.top_p)
            .max_tokens(parameters.max_new_tokens)
            .messages([
                ChatCompletionRequestSystemMessage::from("You are a precise, grounded assistant.")
                    .into(),
                ChatCompletionRequestUserMessage::from(prompt).into(),
            ]);
        if !parameters.stop_sequences.is_empty() {
            builder.stop(parameters.stop_sequences.clone());
        }
        let request = builder.build().map_err(ProviderError::from)?;

        let response = with_retry(|| {
            let client = &self.client;
            let request = request.clone();
            async move { client.chat().create(request).await.map_err(ProviderError::from) }
        })
        .await?;

        let text = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| {
                ProviderError::Permanent(common::error::PermanentKind::ResponseParseError(
                    "no content in chat completion response".to_string(),
                ))
            })?;

        let usage = response
            .usage
            .map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(GenerateResult { text, usage })
    }

    async fn generate_stream(
        &self,
        _prompt: &str,
        _parameters: &LLMParameters,
    ) -> Result<BoxStream<'static, Result<GenerateDelta, ProviderError>>, ProviderError> {
        // Streaming wiring mirrors `generate` but over
        // `client.chat().create_stream(..)`; omitted here because nothing in
        // this core consumes partial deltas yet (the search pipeline and CoT
        // controller both await a complete `GenerateResult`).
        Err(ProviderError::Permanent(common::error::PermanentKind::ModelUnavailable(
            "streaming not wired for this provider".to_string(),
        )))
    }

    fn count_tokens(&self, text: &str) -> usize {
        // Approximation (no tokenizer dependency survives in this workspace):
        // OpenAI's cl100k family averages ~4 chars/token for English prose.
        (text.chars().count() / 4).max(1)
    }

    fn timeouts(&self) -> Timeouts {
        self.timeouts
    }
}

/// WatsonX and Anthropic speak REST dialects `async-openai` does not model,
/// so both drivers go through a small shared JSON client rather than through
/// `async_openai::Client`.
pub struct RestChatProvider {
    http: reqwest::Client,
    base_url: String,
    credentials: Credentials,
    model: String,
    timeouts: Timeouts,
    dialect: RestDialect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestDialect {
    WatsonX,
    Anthropic,
}

impl RestChatProvider {
    pub fn new(
        dialect: RestDialect,
        base_url: impl Into<String>,
        credentials: Credentials,
        model: impl Into<String>,
        timeouts: Timeouts,
    ) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .timeout(Duration::from_secs(timeouts.read_secs))
            .build()
            .map_err(ProviderError::from)?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            credentials,
            model: model.into(),
            timeouts,
            dialect,
        })
    }

    fn request_body(&self, prompt: &str, parameters: &LLMParameters) -> serde_json::Value {
        match self.dialect {
            RestDialect::WatsonX => serde_json::json!({
                "model_id": self.model,
                "input": prompt,
                "parameters": {
                    "temperature": parameters.temperature,
                    "top_p": parameters.top_p,
                    "top_k": parameters.top_k,
                    "max_new_tokens": parameters.max_new_tokens,
                    "repetition_penalty": parameters.repetition_penalty,
                    "stop_sequences": parameters.stop_sequences,
                },
            }),
            RestDialect::Anthropic => serde_json::json!({
                "model": self.model,
                "max_tokens": parameters.max_new_tokens,
                "temperature": parameters.temperature,
                "top_p": parameters.top_p,
                "stop_sequences": parameters.stop_sequences,
                "messages": [{ "role": "user", "content": prompt }],
            }),
        }
    }

    fn path(&self) -> &'static str {
        match self.dialect {
            RestDialect::WatsonX => "/ml/v1/text/generation?version=2024-01-01",
            RestDialect::Anthropic => "/v1/messages",
        }
    }

    fn parse_response(&self, body: serde_json::Value) -> Result<GenerateResult, ProviderError> {
        match self.dialect {
            RestDialect::WatsonX => {
                let text = body
                    .get("results")
                    .and_then(|r| r.get(0))
                    .and_then(|r| r.get("generated_text"))
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| {
                        ProviderError::Permanent(common::error::PermanentKind::ResponseParseError(
                            "missing generated_text in watsonx response".to_string(),
                        ))
                    })?
                    .to_string();
                let usage = body
                    .get("results")
                    .and_then(|r| r.get(0))
                    .map(|r| Usage {
                        prompt_tokens: r.get("input_token_count").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
                        completion_tokens: r.get("generated_token_count").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
                    })
                    .unwrap_or_default();
                Ok(GenerateResult { text, usage })
            }
            RestDialect::Anthropic => {
                let text = body
                    .get("content")
                    .and_then(|c| c.get(0))
                    .and_then(|c| c.get("text"))
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| {
                        ProviderError::Permanent(common::error::PermanentKind::ResponseParseError(
                            "missing content[0].text in anthropic response".to_string(),
                        ))
                    })?
                    .to_string();
                let usage = body
                    .get("usage")
                    .map(|u| Usage {
                        prompt_tokens: u.get("input_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
                        completion_tokens: u.get("output_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
                    })
                    .unwrap_or_default();
                Ok(GenerateResult { text, usage })
            }
        }
    }
}

#[async_trait]
impl LlmProvider for RestChatProvider {
    #[instrument(skip_all, fields(base_url = %self.base_url))]
    async fn generate(
        &self,
        prompt: &str,
        parameters: &LLMParameters,
    ) -> Result<GenerateResult, ProviderError> {
        let body = self.request_body(prompt, parameters);
        let url = format!("{}{}", self.base_url, self.path());

        let response = with_retry(|| {
            let http = &self.http;
            let url = url.clone();
            let body = body.clone();
            let token = self.credentials.expose().to_string();
            let dialect = self.dialect;
            async move {
                let mut request = http.post(&url).json(&body);
                request = match dialect {
                    RestDialect::WatsonX => request.bearer_auth(token),
                    RestDialect::Anthropic => request
                        .header("x-api-key", token)
                        .header("anthropic-version", "2023-06-01"),
                };
                let response = request.send().await?;
                let status = response.status();
                if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    let retry_after = response
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse().ok());
                    return Err(ProviderError::Transient(
                        common::error::TransientKind::RateLimited { retry_after },
                    ));
                }
                if status == reqwest::StatusCode::UNAUTHORIZED {
                    return Err(ProviderError::Permanent(common::error::PermanentKind::AuthFailed));
                }
                if !status.is_success() {
                    let body_excerpt: String = response.text().await.unwrap_or_default().chars().take(256).collect();
                    return Err(ProviderError::Permanent(common::error::PermanentKind::UpstreamError {
                        code: status.as_u16(),
                        body_excerpt,
                    }));
                }
                response.json::<serde_json::Value>().await.map_err(ProviderError::from)
            }
        })
        .await?;

        self.parse_response(response)
    }

    async fn generate_stream(
        &self,
        _prompt: &str,
        _parameters: &LLMParameters,
    ) -> Result<BoxStream<'static, Result<GenerateDelta, ProviderError>>, ProviderError> {
        Err(ProviderError::Permanent(common::error::PermanentKind::ModelUnavailable(
            "streaming not wired for this provider".to_string(),
        )))
    }

    fn count_tokens(&self, text: &str) -> usize {
        (text.chars().count() / 4).max(1)
    }

    fn timeouts(&self) -> Timeouts {
        self.timeouts
    }
}
