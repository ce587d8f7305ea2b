use std::collections::HashMap;

use tokio::sync::RwLock;

use callbridge_core::domain::mapping::{CorrelationKey, MappingRecord};
use callbridge_core::domain::webhook::WebhookConfig;

use super::{MappingRepository, RepositoryError, WebhookConfigRepository};

type MappingKey = (String, String);

#[derive(Default)]
pub struct InMemoryMappingRepository {
    records: RwLock<HashMap<MappingKey, MappingRecord>>,
}

impl InMemoryMappingRepository {
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl MappingRepository for InMemoryMappingRepository {
    async fn get(
        &self,
        integration_id: &str,
        key: &CorrelationKey,
    ) -> Result<Option<MappingRecord>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records.get(&(integration_id.to_string(), key.0.clone())).cloned())
    }

    async fn upsert(
        &self,
        integration_id: &str,
        key: &CorrelationKey,
        record: MappingRecord,
    ) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        records.insert((integration_id.to_string(), key.0.clone()), record);
        Ok(())
    }

    async fn delete(
        &self,
        integration_id: &str,
        key: &CorrelationKey,
    ) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        records.remove(&(integration_id.to_string(), key.0.clone()));
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryWebhookConfigRepository {
    configs: RwLock<HashMap<String, WebhookConfig>>,
}

#[async_trait::async_trait]
impl WebhookConfigRepository for InMemoryWebhookConfigRepository {
    async fn load(&self, integration_id: &str) -> Result<WebhookConfig, RepositoryError> {
        let configs = self.configs.read().await;
        Ok(configs.get(integration_id).cloned().unwrap_or_default())
    }

    async fn save(
        &self,
        integration_id: &str,
        config: &WebhookConfig,
    ) -> Result<(), RepositoryError> {
        let mut configs = self.configs.write().await;
        configs.insert(integration_id.to_string(), config.clone());
        Ok(())
    }

    async fn clear(&self, integration_id: &str) -> Result<(), RepositoryError> {
        let mut configs = self.configs.write().await;
        configs.remove(integration_id);
        Ok(())
    }
}
