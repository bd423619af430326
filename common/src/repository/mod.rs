//! The repository abstraction the core consumes: CRUD plus "get default
//! for (scope, type)" and "set default (atomic swap)" over SurrealDB-backed
//! entities. Consistency is read-after-write within a request because every
//! operation here goes through a single `Surreal` session.

use std::sync::Arc;

use crate::{
    error::CoreError,
    storage::{
        db::SurrealDbClient,
        types::{
            collection::Collection,
            llm_parameters::LLMParameters,
            prompt_template::{PromptTemplate, TemplateType},
            provider_config::ProviderConfig,
        },
    },
};

#[derive(Clone)]
pub struct CollectionRepository {
    db: Arc<SurrealDbClient>,
}

impl CollectionRepository {
    pub fn new(db: Arc<SurrealDbClient>) -> Self {
        Self { db }
    }

    pub async fn get(&self, id: &str) -> Result<Option<Collection>, CoreError> {
        Ok(self.db.get_item(id).await?)
    }

    pub async fn create(&self, collection: Collection) -> Result<Collection, CoreError> {
        self.db
            .store_item(collection)
            .await?
            .ok_or_else(|| CoreError::Internal("collection creation returned no record".to_string()))
    }

    pub async fn delete(&self, id: &str) -> Result<Option<Collection>, CoreError> {
        Ok(self.db.delete_item(id).await?)
    }
}

#[derive(Clone)]
pub struct TemplateRepository {
    db: Arc<SurrealDbClient>,
}

impl TemplateRepository {
    pub fn new(db: Arc<SurrealDbClient>) -> Self {
        Self { db }
    }

    /// Lookup order: (user, collection, type, default) → (user, null,
    /// type, default) → system default for type (owner_id = "system").
    pub async fn resolve(
        &self,
        user_id: &str,
        collection_id: Option<&str>,
        template_type: TemplateType,
    ) -> Result<PromptTemplate, CoreError> {
        if let Some(collection_id) = collection_id {
            if let Some(t) = self
                .find_default(Some(user_id), Some(collection_id), template_type)
                .await?
            {
                return Ok(t);
            }
        }
        if let Some(t) = self.find_default(Some(user_id), None, template_type).await? {
            return Ok(t);
        }
        self.find_default(Some("system"), None, template_type)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("no system default template for {template_type:?}")))
    }

    async fn find_default(
        &self,
        owner_id: Option<&str>,
        collection_id: Option<&str>,
        template_type: TemplateType,
    ) -> Result<Option<PromptTemplate>, CoreError> {
        let all: Vec<PromptTemplate> = self.db.get_all_stored_items().await?;
        Ok(all.into_iter().find(|t| {
            t.is_default
                && t.template_type == template_type
                && owner_id.map_or(true, |o| t.owner_id == o)
                && collection_id == t.collection_id.as_deref()
        }))
    }

    /// Atomically clears the previous default for the (owner, collection?,
    /// type) scope and marks `new_default_id` as the default — no moment is
    /// observable with zero or two defaults.
    pub async fn set_default(
        &self,
        owner_id: &str,
        collection_id: Option<&str>,
        template_type: TemplateType,
        new_default_id: &str,
    ) -> Result<(), CoreError> {
        let mut all: Vec<PromptTemplate> = self.db.get_all_stored_items().await?;
        all.retain(|t| {
            t.owner_id == owner_id
                && t.collection_id.as_deref() == collection_id
                && t.template_type == template_type
        });

        self.db
            .client
            .query("BEGIN TRANSACTION")
            .await
            .map_err(CoreError::Database)?;
        let result = async {
            for t in &all {
                let should_be_default = t.id == new_default_id;
                if t.is_default != should_be_default {
                    self.db
                        .client
                        .query("UPDATE type::thing('prompt_template', $id) SET is_default = $is_default")
                        .bind(("id", t.id.clone()))
                        .bind(("is_default", should_be_default))
                        .await?;
                }
            }
            Ok::<_, surrealdb::Error>(())
        }
        .await;

        match result {
            Ok(()) => {
                self.db
                    .client
                    .query("COMMIT TRANSACTION")
                    .await
                    .map_err(CoreError::Database)?;
                Ok(())
            }
            Err(e) => {
                let _ = self.db.client.query("CANCEL TRANSACTION").await;
                Err(CoreError::Database(e))
            }
        }
    }

    pub async fn get(&self, id: &str) -> Result<Option<PromptTemplate>, CoreError> {
        Ok(self.db.get_item(id).await?)
    }

    pub async fn create(&self, template: PromptTemplate) -> Result<PromptTemplate, CoreError> {
        self.db
            .store_item(template)
            .await?
            .ok_or_else(|| CoreError::Internal("template creation returned no record".to_string()))
    }
}

#[derive(Clone)]
pub struct ParametersRepository {
    db: Arc<SurrealDbClient>,
}

impl ParametersRepository {
    pub fn new(db: Arc<SurrealDbClient>) -> Self {
        Self { db }
    }

    /// Resolution order: per-user → system-default.
    pub async fn resolve(&self, user_id: &str) -> Result<LLMParameters, CoreError> {
        let all: Vec<LLMParameters> = self.db.get_all_stored_items().await?;
        if let Some(p) = all
            .iter()
            .find(|p| p.is_default && p.owner_id == user_id)
            .cloned()
        {
            return Ok(p);
        }
        all.into_iter()
            .find(|p| p.is_default && p.owner_id == "system")
            .ok_or_else(|| CoreError::NotFound("no system default LLM parameters".to_string()))
    }

    pub async fn set_default(&self, owner_id: &str, new_default_id: &str) -> Result<(), CoreError> {
        let mut all: Vec<LLMParameters> = self.db.get_all_stored_items().await?;
        all.retain(|p| p.owner_id == owner_id);

        self.db
            .client
            .query("BEGIN TRANSACTION")
            .await
            .map_err(CoreError::Database)?;
        let result = async {
            for p in &all {
                let should_be_default = p.id == new_default_id;
                if p.is_default != should_be_default {
                    self.db
                        .client
                        .query("UPDATE type::thing('llm_parameters', $id) SET is_default = $is_default")
                        .bind(("id", p.id.clone()))
                        .bind(("is_default", should_be_default))
                        .await?;
                }
            }
            Ok::<_, surrealdb::Error>(())
        }
        .await;

        match result {
            Ok(()) => {
                self.db
                    .client
                    .query("COMMIT TRANSACTION")
                    .await
                    .map_err(CoreError::Database)?;
                Ok(())
            }
            Err(e) => {
                let _ = self.db.client.query("CANCEL TRANSACTION").await;
                Err(CoreError::Database(e))
            }
        }
    }

    pub async fn create(&self, parameters: LLMParameters) -> Result<LLMParameters, CoreError> {
        self.db
            .store_item(parameters)
            .await?
            .ok_or_else(|| CoreError::Internal("parameters creation returned no record".to_string()))
    }
}

#[derive(Clone)]
pub struct ProviderConfigRepository {
    db: Arc<SurrealDbClient>,
}

impl ProviderConfigRepository {
    pub fn new(db: Arc<SurrealDbClient>) -> Self {
        Self { db }
    }

    pub async fn get_by_name(&self, provider_name: &str) -> Result<Option<ProviderConfig>, CoreError> {
        let all: Vec<ProviderConfig> = self.db.get_all_stored_items().await?;
        Ok(all.into_iter().find(|p| p.provider_name == provider_name))
    }

    pub async fn upsert(&self, config: ProviderConfig) -> Result<ProviderConfig, CoreError> {
        self.db
            .store_item(config)
            .await?
            .ok_or_else(|| CoreError::Internal("provider config upsert returned no record".to_string()))
    }
}
