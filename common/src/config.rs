use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Clone, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VectorDbKind {
    Milvus,
    Memory,
}

fn default_vector_db_kind() -> VectorDbKind {
    VectorDbKind::Milvus
}

#[derive(Clone, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Text,
}

fn default_log_format() -> LogFormat {
    LogFormat::Text
}

/// Process-wide configuration, loaded once at startup. Per-provider
/// credentials are deliberately absent here beyond the bootstrap default
/// provider — live `ProviderConfig` records are resolved through the
/// repository abstraction and cached by the Provider Factory, matching
/// the "no durable credential host" non-goal.
#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    pub surrealdb_address: String,
    pub surrealdb_username: String,
    pub surrealdb_password: String,
    pub surrealdb_namespace: String,
    pub surrealdb_database: String,

    pub vector_db_host: String,
    pub vector_db_port: u16,
    #[serde(default = "default_vector_db_kind")]
    pub vector_db_kind: VectorDbKind,

    pub embedding_dim: usize,

    #[serde(default = "default_llm_provider")]
    pub llm_default_provider: String,

    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,

    #[serde(default = "default_cot_max_reasoning_depth")]
    pub cot_max_reasoning_depth: u32,
    #[serde(default = "default_cot_quality_threshold")]
    pub cot_quality_threshold: f32,
    #[serde(default = "default_cot_max_retries")]
    pub cot_max_retries: u32,

    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,

    pub openai_api_key: String,
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,
}

fn default_llm_provider() -> String {
    "openai".to_string()
}

fn default_concurrency_limit() -> usize {
    10
}

fn default_cot_max_reasoning_depth() -> u32 {
    3
}

fn default_cot_quality_threshold() -> f32 {
    0.6
}

fn default_cot_max_retries() -> u32 {
    3
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}
