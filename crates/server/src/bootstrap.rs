use std::sync::Arc;

use callbridge_core::config::{AppConfig, ConfigError, LoadOptions};
use callbridge_db::{
    connect_with_config, migrations, DbPool, SqlMappingRepository, SqlWebhookConfigRepository,
    WebhookConfigRepository,
};
use callbridge_sync::{
    BulkSyncCoordinator, ContactSyncer, EventRouter, RegistrationSettings, WorkDispatcher,
    WebhookRegistrationManager,
};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::info;

use crate::collaborators::Collaborators;
use crate::queue::{channel, Envelope, LocalQueue};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub webhook_configs: Arc<dyn WebhookConfigRepository>,
    pub queue: LocalQueue,
    pub work_receiver: mpsc::UnboundedReceiver<Envelope>,
    pub dispatcher: Arc<WorkDispatcher>,
    pub bulk: Arc<BulkSyncCoordinator>,
    pub registration: Option<Arc<WebhookRegistrationManager>>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let collaborators = Collaborators::unconfigured(&config);
    bootstrap_with_clients(config, collaborators).await
}

/// Connects storage, applies migrations, and wires the sync services around
/// the given remote collaborators.
pub async fn bootstrap_with_clients(
    config: AppConfig,
    collaborators: Collaborators,
) -> Result<Application, BootstrapError> {
    info!(
        event_name = "server.bootstrap.start",
        correlation_id = "bootstrap",
        crm_provider = %config.crm.provider,
        "starting application bootstrap"
    );

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "server.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "server.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let mappings = Arc::new(SqlMappingRepository::new(db_pool.clone()));
    let webhook_configs: Arc<dyn WebhookConfigRepository> =
        Arc::new(SqlWebhookConfigRepository::new(db_pool.clone()));
    let (queue, work_receiver) = channel();

    let router = EventRouter::new(
        collaborators.crm.clone(),
        collaborators.telephony.clone(),
        mappings.clone(),
        collaborators.analytics.clone(),
        config.telephony.inbox_base_url.clone(),
    );
    let bulk = Arc::new(BulkSyncCoordinator::new(
        collaborators.crm.clone(),
        ContactSyncer::new(collaborators.telephony.clone(), mappings),
        Arc::new(queue.clone()),
        config.sync.page_destination.clone(),
        config.sync.page_limit,
    ));
    let dispatcher = Arc::new(WorkDispatcher::new(Arc::new(router), bulk.clone()));

    let registration = match RegistrationSettings::from_config(&config) {
        Ok(settings) => Some(Arc::new(WebhookRegistrationManager::new(
            collaborators.telephony.clone(),
            collaborators.crm.clone(),
            webhook_configs.clone(),
            collaborators.messages.clone(),
            settings,
        ))),
        Err(reason) => {
            info!(
                event_name = "server.bootstrap.registration_disabled",
                correlation_id = "bootstrap",
                reason = %reason,
                "webhook registration disabled"
            );
            None
        }
    };

    Ok(Application {
        config,
        db_pool,
        webhook_configs,
        queue,
        work_receiver,
        dispatcher,
        bulk,
        registration,
    })
}
