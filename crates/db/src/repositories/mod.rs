use async_trait::async_trait;
use thiserror::Error;

use callbridge_core::domain::mapping::{CorrelationKey, MappingRecord};
use callbridge_core::domain::webhook::WebhookConfig;
use callbridge_core::errors::SyncError;

pub mod mapping;
pub mod memory;
pub mod webhook_config;

pub use mapping::SqlMappingRepository;
pub use memory::{InMemoryMappingRepository, InMemoryWebhookConfigRepository};
pub use webhook_config::SqlWebhookConfigRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for SyncError {
    fn from(value: RepositoryError) -> Self {
        SyncError::Persistence(value.to_string())
    }
}

/// Durable links between entities of the two systems, scoped per integration.
///
/// `upsert` replaces any existing row for the key; there is never more than
/// one record per `(integration_id, key)`.
#[async_trait]
pub trait MappingRepository: Send + Sync {
    async fn get(
        &self,
        integration_id: &str,
        key: &CorrelationKey,
    ) -> Result<Option<MappingRecord>, RepositoryError>;

    async fn upsert(
        &self,
        integration_id: &str,
        key: &CorrelationKey,
        record: MappingRecord,
    ) -> Result<(), RepositoryError>;

    /// Deleting an absent key is not an error.
    async fn delete(&self, integration_id: &str, key: &CorrelationKey)
        -> Result<(), RepositoryError>;
}

/// Stored webhook subscriptions per integration. A missing config loads as
/// an empty [`WebhookConfig`].
#[async_trait]
pub trait WebhookConfigRepository: Send + Sync {
    async fn load(&self, integration_id: &str) -> Result<WebhookConfig, RepositoryError>;
    async fn save(&self, integration_id: &str, config: &WebhookConfig)
        -> Result<(), RepositoryError>;
    async fn clear(&self, integration_id: &str) -> Result<(), RepositoryError>;
}
