use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use common::storage::types::provider_config::ProviderConfig;
use tokio::sync::{RwLock, Semaphore};

use crate::error::ProviderError;
use crate::llm::{LlmProvider, OpenAiLlmProvider, RestChatProvider, RestDialect};

struct CachedProvider {
    provider: Arc<dyn LlmProvider>,
    concurrency: Arc<Semaphore>,
    config_updated_at: DateTime<Utc>,
}

/// Singleton per database session. Caches provider instances keyed by
/// name; a cache entry is invalidated when the backing `ProviderConfig`'s
/// `updated_at` moves forward, so credential/model rotation takes effect
/// without a restart. Reads take a read lock; `get` only takes the write
/// lock on a cache miss or stale entry.
pub struct ProviderFactory {
    cache: RwLock<HashMap<String, CachedProvider>>,
}

impl Default for ProviderFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderFactory {
    pub fn new() -> Self {
        Self { cache: RwLock::new(HashMap::new()) }
    }

    pub async fn get(
        &self,
        config: &ProviderConfig,
    ) -> Result<(Arc<dyn LlmProvider>, Arc<Semaphore>), ProviderError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.get(&config.provider_name) {
                if cached.config_updated_at == config.updated_at {
                    return Ok((cached.provider.clone(), cached.concurrency.clone()));
                }
            }
        }

        if !config.active {
            return Err(ProviderError::ProviderMisconfigured(format!(
                "provider '{}' is not active",
                config.provider_name
            )));
        }

        let provider = build_provider(config)?;
        let concurrency = Arc::new(Semaphore::new(config.concurrency_limit.max(1)));

        let mut cache = self.cache.write().await;
        cache.insert(
            config.provider_name.clone(),
            CachedProvider {
                provider: provider.clone(),
                concurrency: concurrency.clone(),
                config_updated_at: config.updated_at,
            },
        );
        Ok((provider, concurrency))
    }

    /// Drops every cached provider instance, releasing pooled HTTP
    /// connections (scoped acquisition by contract) and clearing the cache.
    pub async fn cleanup_all(&self) {
        self.cache.write().await.clear();
    }
}

fn build_provider(config: &ProviderConfig) -> Result<Arc<dyn LlmProvider>, ProviderError> {
    match config.provider_name.as_str() {
        "openai" => Ok(Arc::new(OpenAiLlmProvider::from_config(config)?)),
        "watsonx" => Ok(Arc::new(RestChatProvider::new(
            RestDialect::WatsonX,
            config.api_url.clone(),
            config.credentials.clone(),
            config.model_id.clone(),
            config.timeouts,
        )?)),
        "anthropic" => Ok(Arc::new(RestChatProvider::new(
            RestDialect::Anthropic,
            config.api_url.clone(),
            config.credentials.clone(),
            config.model_id.clone(),
            config.timeouts,
        )?)),
        other => Err(ProviderError::UnknownProvider(other.to_string())),
    }
}
