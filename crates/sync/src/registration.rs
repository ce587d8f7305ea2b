//! Webhook Registration Manager
//!
//! Provisions the webhook subscriptions an integration needs on both
//! platforms. The telephony side is mandatory and is either fully provisioned
//! or rolled back; the CRM side is optional and may fail on its own.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use callbridge_core::config::AppConfig;
use callbridge_core::domain::webhook::{
    Platform, SideState, WebhookConfig, WebhookDescriptor, WebhookKind,
};
use callbridge_core::errors::{ClientError, SyncError};
use callbridge_core::ports::{
    CrmClient, IntegrationMessage, IntegrationMessages, SubscriptionRequest, TelephonyClient,
};
use callbridge_db::{RepositoryError, WebhookConfigRepository};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistrationSettings {
    /// Public base URL the remote platforms deliver to.
    pub webhook_base_url: String,
    /// Telephony phone-number IDs to subscribe. Empty means every number.
    pub phone_number_ids: Vec<String>,
    pub resource_chunk_size: usize,
    pub sync_transcripts: bool,
}

impl RegistrationSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self, RegistrationError> {
        let base = config.server.public_base_url.as_deref().ok_or_else(|| {
            RegistrationError::Configuration(
                "server.public_base_url is required to register webhooks".to_string(),
            )
        })?;

        Ok(Self {
            webhook_base_url: base.trim_end_matches('/').to_string(),
            phone_number_ids: config.telephony.phone_number_ids.clone(),
            resource_chunk_size: config.sync.resource_chunk_size,
            sync_transcripts: config.telephony.sync_transcripts,
        })
    }

    pub fn required_kinds(&self, platform: Platform) -> Vec<WebhookKind> {
        match platform {
            Platform::Telephony => {
                let mut kinds =
                    vec![WebhookKind::Calls, WebhookKind::CallSummaries, WebhookKind::Messages];
                if self.sync_transcripts {
                    kinds.push(WebhookKind::CallTranscripts);
                }
                kinds
            }
            Platform::Crm => vec![WebhookKind::Records],
        }
    }

    fn webhook_url(&self, platform: Platform, integration_id: &str) -> String {
        format!("{}/webhooks/{}/{integration_id}", self.webhook_base_url, platform.as_str())
    }

    fn resource_chunks(&self, platform: Platform) -> Vec<Vec<String>> {
        if platform == Platform::Crm || self.phone_number_ids.is_empty() {
            return vec![Vec::new()];
        }
        self.phone_number_ids
            .chunks(self.resource_chunk_size.max(1))
            .map(<[String]>::to_vec)
            .collect()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RegistrationState {
    #[default]
    Unconfigured,
    Configuring,
    Configured,
    PartiallyConfigured,
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetupStatus {
    Success,
    /// Telephony is configured but the optional CRM side is not.
    Partial,
    AlreadyConfigured,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SetupReport {
    pub status: SetupStatus,
    pub state: RegistrationState,
    pub created: usize,
    pub removed_orphans: usize,
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("mandatory telephony webhooks could not be provisioned (missing: {})", kind_list(.missing))]
    MandatorySideFailed { missing: Vec<WebhookKind> },
    #[error("webhook config persistence failed: {0}")]
    Persistence(#[from] RepositoryError),
    #[error("registration is misconfigured: {0}")]
    Configuration(String),
}

impl From<RegistrationError> for SyncError {
    fn from(value: RegistrationError) -> Self {
        match value {
            RegistrationError::Persistence(error) => error.into(),
            other => SyncError::PartialProvisioning(other.to_string()),
        }
    }
}

fn kind_list(kinds: &[WebhookKind]) -> String {
    kinds.iter().map(WebhookKind::as_str).collect::<Vec<_>>().join(", ")
}

fn missing_kinds(descriptors: &[WebhookDescriptor], required: &[WebhookKind]) -> Vec<WebhookKind> {
    required
        .iter()
        .filter(|kind| !descriptors.iter().any(|descriptor| descriptor.kind == **kind))
        .copied()
        .collect()
}

pub struct WebhookRegistrationManager {
    telephony: Arc<dyn TelephonyClient>,
    crm: Arc<dyn CrmClient>,
    store: Arc<dyn WebhookConfigRepository>,
    messages: Arc<dyn IntegrationMessages>,
    settings: RegistrationSettings,
    states: RwLock<HashMap<String, RegistrationState>>,
    /// Setup and teardown of one integration never overlap.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl WebhookRegistrationManager {
    pub fn new(
        telephony: Arc<dyn TelephonyClient>,
        crm: Arc<dyn CrmClient>,
        store: Arc<dyn WebhookConfigRepository>,
        messages: Arc<dyn IntegrationMessages>,
        settings: RegistrationSettings,
    ) -> Self {
        Self {
            telephony,
            crm,
            store,
            messages,
            settings,
            states: RwLock::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub async fn state(&self, integration_id: &str) -> RegistrationState {
        self.states.read().await.get(integration_id).copied().unwrap_or_default()
    }

    async fn set_state(&self, integration_id: &str, state: RegistrationState) {
        self.states.write().await.insert(integration_id.to_string(), state);
    }

    async fn integration_lock(&self, integration_id: &str) -> Arc<Mutex<()>> {
        self.locks.lock().await.entry(integration_id.to_string()).or_default().clone()
    }

    /// Concurrent calls for the same integration run one after the other; the
    /// later call sees the first one's stored config.
    pub async fn setup(&self, integration_id: &str) -> Result<SetupReport, RegistrationError> {
        let lock = self.integration_lock(integration_id).await;
        let _guard = lock.lock().await;
        self.setup_exclusive(integration_id).await
    }

    async fn setup_exclusive(
        &self,
        integration_id: &str,
    ) -> Result<SetupReport, RegistrationError> {
        let mut config = match self.store.load(integration_id).await {
            Ok(config) => config,
            Err(error) => {
                self.set_state(integration_id, RegistrationState::Failed).await;
                return Err(error.into());
            }
        };

        let pending_before = config.retired.len();
        let mut removed_orphans = self.retry_retired(integration_id, &mut config).await;

        let telephony_required = self.settings.required_kinds(Platform::Telephony);
        let crm_required = self.settings.required_kinds(Platform::Crm);
        let telephony_state = config.side_state(Platform::Telephony, &telephony_required);
        let crm_state = config.side_state(Platform::Crm, &crm_required);

        if telephony_state == SideState::Complete && crm_state == SideState::Complete {
            if config.retired.len() != pending_before {
                if let Err(error) = self.store.save(integration_id, &config).await {
                    self.set_state(integration_id, RegistrationState::Failed).await;
                    return Err(error.into());
                }
            }
            self.set_state(integration_id, RegistrationState::Configured).await;
            info!(
                event_name = "sync.registration.already_configured",
                integration_id,
                removed_orphans,
                "webhooks already provisioned"
            );
            return Ok(SetupReport {
                status: SetupStatus::AlreadyConfigured,
                state: RegistrationState::Configured,
                created: 0,
                removed_orphans,
            });
        }

        self.set_state(integration_id, RegistrationState::Configuring).await;

        let sides = [(Platform::Telephony, telephony_state), (Platform::Crm, crm_state)];
        for (platform, state) in sides {
            if state == SideState::Partial {
                let orphans = std::mem::take(config.side_mut(platform));
                let attempted = orphans.len();
                let kept = self
                    .delete_descriptors(
                        integration_id,
                        platform,
                        orphans,
                        "sync.registration.orphan_delete_failed",
                    )
                    .await;
                removed_orphans += attempted - kept.len();
                config.retire(platform, kept);
            }
        }

        let (telephony_created, crm_created) = tokio::join!(
            async {
                if telephony_state == SideState::Complete {
                    Vec::new()
                } else {
                    self.provision(integration_id, Platform::Telephony, &telephony_required).await
                }
            },
            async {
                if crm_state == SideState::Complete {
                    Vec::new()
                } else {
                    self.provision(integration_id, Platform::Crm, &crm_required).await
                }
            },
        );

        let telephony_missing = if telephony_state == SideState::Complete {
            Vec::new()
        } else {
            missing_kinds(&telephony_created, &telephony_required)
        };
        let crm_missing = if crm_state == SideState::Complete {
            Vec::new()
        } else {
            missing_kinds(&crm_created, &crm_required)
        };

        if !telephony_missing.is_empty() {
            return self
                .fail_mandatory(
                    integration_id,
                    config,
                    telephony_created,
                    crm_created,
                    telephony_missing,
                )
                .await;
        }

        let mut created = telephony_created.len();
        config.telephony.extend(telephony_created);

        let (status, state) = if crm_missing.is_empty() {
            created += crm_created.len();
            config.crm.extend(crm_created);
            (SetupStatus::Success, RegistrationState::Configured)
        } else {
            let kept = self
                .delete_descriptors(
                    integration_id,
                    Platform::Crm,
                    crm_created,
                    "sync.registration.rollback_failed",
                )
                .await;
            config.retire(Platform::Crm, kept);
            self.notify(
                integration_id,
                IntegrationMessage::warning(
                    "CRM webhooks unavailable",
                    format!(
                        "Calls and messages will sync, but CRM changes will not reach the phone \
                         system until setup is retried (missing: {}).",
                        kind_list(&crm_missing)
                    ),
                ),
            )
            .await;
            (SetupStatus::Partial, RegistrationState::PartiallyConfigured)
        };

        if let Err(error) = self.store.save(integration_id, &config).await {
            self.set_state(integration_id, RegistrationState::Failed).await;
            return Err(error.into());
        }
        self.set_state(integration_id, state).await;

        info!(
            event_name = "sync.registration.completed",
            integration_id,
            status = ?status,
            created,
            removed_orphans,
            pending_deletions = config.retired.len(),
            "webhook setup finished"
        );
        Ok(SetupReport { status, state, created, removed_orphans })
    }

    /// Deletes every stored descriptor remotely and clears the stored config.
    /// Descriptors whose deletion fails stay stored as retired so a later
    /// teardown or setup retries them. Returns how many remote deletions
    /// succeeded.
    pub async fn teardown(&self, integration_id: &str) -> Result<usize, RegistrationError> {
        let lock = self.integration_lock(integration_id).await;
        let _guard = lock.lock().await;

        let mut config = self.store.load(integration_id).await?;
        let mut removed = self.retry_retired(integration_id, &mut config).await;
        for platform in [Platform::Telephony, Platform::Crm] {
            let descriptors = std::mem::take(config.side_mut(platform));
            let attempted = descriptors.len();
            let kept = self
                .delete_descriptors(
                    integration_id,
                    platform,
                    descriptors,
                    "sync.registration.teardown_delete_failed",
                )
                .await;
            removed += attempted - kept.len();
            config.retire(platform, kept);
        }

        if config.is_empty() {
            self.store.clear(integration_id).await?;
        } else {
            self.store.save(integration_id, &config).await?;
        }
        self.set_state(integration_id, RegistrationState::Unconfigured).await;

        info!(
            event_name = "sync.registration.teardown",
            integration_id,
            removed,
            pending_deletions = config.retired.len(),
            "webhooks removed"
        );
        Ok(removed)
    }

    async fn fail_mandatory(
        &self,
        integration_id: &str,
        mut config: WebhookConfig,
        telephony_created: Vec<WebhookDescriptor>,
        crm_created: Vec<WebhookDescriptor>,
        missing: Vec<WebhookKind>,
    ) -> Result<SetupReport, RegistrationError> {
        warn!(
            event_name = "sync.registration.mandatory_failed",
            integration_id,
            missing = %kind_list(&missing),
            rolled_back = telephony_created.len() + crm_created.len(),
            "telephony webhooks incomplete, rolling back"
        );

        let kept = self
            .delete_descriptors(
                integration_id,
                Platform::Telephony,
                telephony_created,
                "sync.registration.rollback_failed",
            )
            .await;
        config.retire(Platform::Telephony, kept);
        let kept = self
            .delete_descriptors(
                integration_id,
                Platform::Crm,
                crm_created,
                "sync.registration.rollback_failed",
            )
            .await;
        config.retire(Platform::Crm, kept);

        self.notify(
            integration_id,
            IntegrationMessage::error(
                "Phone system webhooks could not be created",
                format!(
                    "Calls and messages will not sync until setup succeeds (missing: {}).",
                    kind_list(&missing)
                ),
            ),
        )
        .await;

        self.set_state(integration_id, RegistrationState::Failed).await;
        self.store.save(integration_id, &config).await?;
        Err(RegistrationError::MandatorySideFailed { missing })
    }

    /// Retries remote deletion of retired descriptors; the ones that still
    /// fail stay retired. Returns how many were deleted.
    async fn retry_retired(&self, integration_id: &str, config: &mut WebhookConfig) -> usize {
        let pending = std::mem::take(&mut config.retired);
        let mut deleted = 0;
        for entry in pending {
            match self.delete_remote(entry.platform, &entry.descriptor.id).await {
                Ok(()) => deleted += 1,
                Err(error) => {
                    warn!(
                        event_name = "sync.registration.retired_delete_failed",
                        integration_id,
                        platform = entry.platform.as_str(),
                        webhook_id = %entry.descriptor.id,
                        error = %error,
                        "retired webhook subscription is still live"
                    );
                    config.retired.push(entry);
                }
            }
        }
        deleted
    }

    /// Creates one subscription per resource chunk and kind. Failures are
    /// logged and the remaining creations still run.
    async fn provision(
        &self,
        integration_id: &str,
        platform: Platform,
        required: &[WebhookKind],
    ) -> Vec<WebhookDescriptor> {
        let url = self.settings.webhook_url(platform, integration_id);
        let mut created = Vec::new();

        for resource_ids in self.settings.resource_chunks(platform) {
            for kind in required {
                let request = SubscriptionRequest {
                    kind: *kind,
                    url: url.clone(),
                    events: kind.subscribed_events().iter().map(ToString::to_string).collect(),
                    resource_ids: resource_ids.clone(),
                };
                let result = match platform {
                    Platform::Telephony => self.telephony.create_webhook_subscription(&request).await,
                    Platform::Crm => self.crm.create_webhook_subscription(&request).await,
                };
                match result {
                    Ok(descriptor) => created.push(descriptor.into_inner()),
                    Err(error) => warn!(
                        event_name = "sync.registration.create_failed",
                        integration_id,
                        platform = platform.as_str(),
                        kind = kind.as_str(),
                        resources = resource_ids.len(),
                        error = %error,
                        "webhook subscription was not created"
                    ),
                }
            }
        }

        created
    }

    /// Best-effort remote deletion. Each failure is logged and the
    /// descriptors that are still live are returned.
    async fn delete_descriptors(
        &self,
        integration_id: &str,
        platform: Platform,
        descriptors: Vec<WebhookDescriptor>,
        failure_event: &'static str,
    ) -> Vec<WebhookDescriptor> {
        let mut kept = Vec::new();
        for descriptor in descriptors {
            if let Err(error) = self.delete_remote(platform, &descriptor.id).await {
                warn!(
                    event_name = failure_event,
                    integration_id,
                    platform = platform.as_str(),
                    webhook_id = %descriptor.id,
                    error = %error,
                    "webhook subscription was not deleted"
                );
                kept.push(descriptor);
            }
        }
        kept
    }

    /// A subscription the remote side no longer knows counts as deleted.
    async fn delete_remote(&self, platform: Platform, webhook_id: &str) -> Result<(), ClientError> {
        let result = match platform {
            Platform::Telephony => self.telephony.delete_webhook_subscription(webhook_id).await,
            Platform::Crm => self.crm.delete_webhook_subscription(webhook_id).await,
        };
        match result {
            Err(ClientError::NotFound { .. }) => Ok(()),
            other => other,
        }
    }

    async fn notify(&self, integration_id: &str, message: IntegrationMessage) {
        if let Err(error) = self.messages.post(integration_id, message).await {
            warn!(
                event_name = "sync.registration.message_failed",
                integration_id,
                error = %error,
                "integration message was not posted"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use chrono::Utc;

    use callbridge_core::domain::note::NoteStrategy;
    use callbridge_core::domain::webhook::{
        Platform, WebhookConfig, WebhookDescriptor, WebhookKind,
    };
    use callbridge_core::ports::Severity;
    use callbridge_db::{InMemoryWebhookConfigRepository, WebhookConfigRepository};

    use super::{
        RegistrationError, RegistrationSettings, RegistrationState, SetupStatus,
        WebhookRegistrationManager,
    };
    use crate::testing::{FakeCrm, FakeTelephony, RecordingMessages};

    struct Harness {
        telephony: Arc<FakeTelephony>,
        crm: Arc<FakeCrm>,
        store: Arc<InMemoryWebhookConfigRepository>,
        messages: Arc<RecordingMessages>,
        manager: WebhookRegistrationManager,
    }

    fn settings() -> RegistrationSettings {
        RegistrationSettings {
            webhook_base_url: "https://bridge.example.com".to_string(),
            phone_number_ids: vec!["PN-1".to_string()],
            resource_chunk_size: 10,
            sync_transcripts: false,
        }
    }

    fn harness_with(
        telephony: FakeTelephony,
        crm: FakeCrm,
        settings: RegistrationSettings,
    ) -> Harness {
        let telephony = Arc::new(telephony);
        let crm = Arc::new(crm);
        let store = Arc::new(InMemoryWebhookConfigRepository::default());
        let messages = Arc::new(RecordingMessages::default());
        let manager = WebhookRegistrationManager::new(
            telephony.clone(),
            crm.clone(),
            store.clone(),
            messages.clone(),
            settings,
        );
        Harness { telephony, crm, store, messages, manager }
    }

    fn harness() -> Harness {
        harness_with(FakeTelephony::default(), FakeCrm::new(NoteStrategy::UpdateInPlace), settings())
    }

    fn stored(id: &str, kind: WebhookKind) -> WebhookDescriptor {
        WebhookDescriptor {
            id: id.to_string(),
            kind,
            key: format!("key-{id}").into(),
            resource_ids: vec!["PN-1".to_string()],
            url: "https://bridge.example.com/webhooks/telephony/int-1".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn second_setup_makes_no_remote_calls() {
        let h = harness();

        let first = h.manager.setup("int-1").await.expect("first setup");
        let second = h.manager.setup("int-1").await.expect("second setup");

        assert_eq!(first.status, SetupStatus::Success);
        assert_eq!(first.created, 4);
        assert_eq!(second.status, SetupStatus::AlreadyConfigured);
        assert_eq!(second.created, 0);
        assert_eq!(h.telephony.created_webhook_count(), 3);
        assert_eq!(h.crm.created_webhooks.lock().expect("crm").len(), 1);
        assert_eq!(h.manager.state("int-1").await, RegistrationState::Configured);
    }

    #[tokio::test]
    async fn partial_side_is_cleared_and_recreated() {
        let h = harness();
        let seeded = WebhookConfig {
            telephony: vec![
                stored("old-1", WebhookKind::Calls),
                stored("old-2", WebhookKind::Messages),
            ],
            crm: vec![stored("crm-old", WebhookKind::Records)],
            retired: Vec::new(),
        };
        h.store.save("int-1", &seeded).await.expect("seed");

        let report = h.manager.setup("int-1").await.expect("setup");

        assert_eq!(report.removed_orphans, 2);
        assert_eq!(h.telephony.deleted_webhooks(), vec!["old-1".to_string(), "old-2".to_string()]);
        assert_eq!(h.telephony.created_webhook_count(), 3);
        assert!(h.crm.created_webhooks.lock().expect("crm").is_empty());

        let config = h.store.load("int-1").await.expect("load");
        assert_eq!(config.telephony.len(), 3);
        assert_eq!(config.crm.len(), 1);
        assert_eq!(config.crm[0].id, "crm-old");
    }

    #[tokio::test]
    async fn crm_failure_leaves_telephony_configured() {
        let h = harness();
        h.crm.fail_webhooks.store(true, Ordering::SeqCst);

        let report = h.manager.setup("int-1").await.expect("partial setup is not an error");

        assert_eq!(report.status, SetupStatus::Partial);
        assert_eq!(report.state, RegistrationState::PartiallyConfigured);
        let config = h.store.load("int-1").await.expect("load");
        assert_eq!(config.telephony.len(), 3);
        assert!(config.crm.is_empty());
        assert!(h.telephony.deleted_webhooks().is_empty());

        let posted = h.messages.posted();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].1.severity, Severity::Warning);
    }

    #[tokio::test]
    async fn telephony_failure_rolls_back_both_sides() {
        let h = harness_with(
            FakeTelephony::default().failing_kind(WebhookKind::CallSummaries),
            FakeCrm::new(NoteStrategy::UpdateInPlace),
            settings(),
        );

        let error = h.manager.setup("int-1").await.expect_err("mandatory side failed");

        match error {
            RegistrationError::MandatorySideFailed { missing } => {
                assert_eq!(missing, vec![WebhookKind::CallSummaries]);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(h.telephony.created_webhook_count(), 2);
        assert_eq!(h.telephony.deleted_webhooks().len(), 2);
        assert_eq!(
            *h.crm.deleted_webhooks.lock().expect("crm"),
            h.crm.created_webhooks.lock().expect("crm").clone()
        );
        assert!(h.store.load("int-1").await.expect("load").is_empty());
        assert_eq!(h.manager.state("int-1").await, RegistrationState::Failed);

        let posted = h.messages.posted();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].1.severity, Severity::Error);
    }

    #[tokio::test]
    async fn phone_numbers_are_chunked_per_kind() {
        let settings = RegistrationSettings {
            phone_number_ids: (1..=25).map(|n| format!("PN-{n}")).collect(),
            sync_transcripts: true,
            ..settings()
        };
        let h = harness_with(
            FakeTelephony::default(),
            FakeCrm::new(NoteStrategy::UpdateInPlace),
            settings,
        );

        h.manager.setup("int-1").await.expect("setup");

        let created = h.telephony.created_webhooks.lock().expect("telephony").clone();
        assert_eq!(created.len(), 12);
        let chunk_sizes: Vec<usize> = created
            .iter()
            .filter(|(kind, _)| *kind == WebhookKind::CallTranscripts)
            .map(|(_, ids)| ids.len())
            .collect();
        assert_eq!(chunk_sizes, vec![10, 10, 5]);
    }

    #[tokio::test]
    async fn teardown_deletes_everything_stored() {
        let h = harness();
        h.manager.setup("int-1").await.expect("setup");

        let removed = h.manager.teardown("int-1").await.expect("teardown");

        assert_eq!(removed, 4);
        assert!(h.store.load("int-1").await.expect("load").is_empty());
        assert_eq!(h.manager.state("int-1").await, RegistrationState::Unconfigured);
    }

    #[tokio::test]
    async fn concurrent_setups_provision_once() {
        let h = harness();

        let (a, b) = tokio::join!(h.manager.setup("int-1"), h.manager.setup("int-1"));

        let statuses = [a.expect("first setup").status, b.expect("second setup").status];
        assert!(statuses.contains(&SetupStatus::Success));
        assert!(statuses.contains(&SetupStatus::AlreadyConfigured));
        assert_eq!(h.telephony.created_webhook_count(), 3);
        assert_eq!(h.store.load("int-1").await.expect("load").telephony.len(), 3);
        assert_eq!(h.manager.teardown("int-1").await.expect("teardown"), 4);
    }

    #[tokio::test]
    async fn undeletable_orphan_stays_tracked_until_teardown() {
        let h = harness_with(
            FakeTelephony::default().undeletable_webhook("stuck-1"),
            FakeCrm::new(NoteStrategy::UpdateInPlace),
            settings(),
        );
        let seeded = WebhookConfig {
            telephony: vec![stored("stuck-1", WebhookKind::Calls)],
            ..WebhookConfig::default()
        };
        h.store.save("int-1", &seeded).await.expect("seed");

        let report = h.manager.setup("int-1").await.expect("orphan failure is not an error");

        assert_eq!(report.status, SetupStatus::Success);
        assert_eq!(report.removed_orphans, 0);
        let config = h.store.load("int-1").await.expect("load");
        assert_eq!(config.telephony.len(), 3);
        assert!(config.telephony.iter().all(|descriptor| descriptor.id != "stuck-1"));
        assert_eq!(config.retired.len(), 1);
        assert_eq!(config.retired[0].descriptor.id, "stuck-1");

        h.telephony.undeletable_webhooks.lock().expect("telephony").clear();
        let removed = h.manager.teardown("int-1").await.expect("teardown");

        assert_eq!(removed, 5);
        assert!(h.telephony.deleted_webhooks().contains(&"stuck-1".to_string()));
        assert!(h.store.load("int-1").await.expect("load").is_empty());
    }

    #[tokio::test]
    async fn failed_rollback_is_logged_and_kept_for_retry() {
        let h = harness_with(
            FakeTelephony::default()
                .failing_kind(WebhookKind::CallSummaries)
                .undeletable_webhook("tel-wh-2"),
            FakeCrm::new(NoteStrategy::UpdateInPlace),
            settings(),
        );

        let error = h.manager.setup("int-1").await.expect_err("mandatory side failed");

        assert!(matches!(error, RegistrationError::MandatorySideFailed { .. }));
        assert_eq!(h.telephony.deleted_webhooks(), vec!["tel-wh-1".to_string()]);
        let config = h.store.load("int-1").await.expect("load");
        assert!(config.telephony.is_empty());
        let retired: Vec<_> =
            config.retired.iter().map(|entry| entry.descriptor.id.as_str()).collect();
        assert_eq!(retired, vec!["tel-wh-2"]);

        h.telephony.undeletable_webhooks.lock().expect("telephony").clear();
        h.telephony.failing_kinds.lock().expect("telephony").clear();
        let report = h.manager.setup("int-1").await.expect("retry");

        assert_eq!(report.status, SetupStatus::Success);
        assert_eq!(report.removed_orphans, 1);
        assert!(h.store.load("int-1").await.expect("load").retired.is_empty());
    }

    #[test]
    fn webhook_url_joins_public_base_without_double_slash() {
        let mut config = callbridge_core::config::AppConfig::default();
        config.server.public_base_url = Some("https://bridge.example.com/".to_string());

        let settings = RegistrationSettings::from_config(&config).expect("settings");

        assert_eq!(
            settings.webhook_url(Platform::Telephony, "int-1"),
            "https://bridge.example.com/webhooks/telephony/int-1"
        );
    }

    #[test]
    fn settings_require_a_public_base_url() {
        let config = callbridge_core::config::AppConfig::default();

        let error = RegistrationSettings::from_config(&config).expect_err("no public url");

        assert!(matches!(error, RegistrationError::Configuration(_)));
    }
}
