//! Routes verified webhooks to the handler for their source and event type.

mod crm;
mod telephony;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use callbridge_core::domain::contact::ObjectKind;
use callbridge_core::domain::mapping::MappingAction;
use callbridge_core::domain::webhook::Platform;
use callbridge_core::errors::{ClientError, SyncError};
use callbridge_core::ports::{AnalyticsEvent, AnalyticsSink, CrmClient, TelephonyClient};
use callbridge_db::MappingRepository;

use crate::contacts::ContactSyncer;
use crate::enrichment::CallEnrichmentWorkflow;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProcessingResult {
    /// A counterpart record was written and its mapping upserted.
    Synced { action: MappingAction, record_id: String },
    /// A counterpart record and its mapping were removed.
    Removed { record_id: String },
    /// Acknowledged without side effects.
    Skipped { reason: String },
}

impl ProcessingResult {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped { reason: reason.into() }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Synced { .. } => "synced",
            Self::Removed { .. } => "removed",
            Self::Skipped { .. } => "skipped",
        }
    }
}

/// CRM object ID to object family. Entries never change once resolved, so
/// the cache only grows.
#[derive(Default)]
pub struct ObjectTypeCache {
    entries: RwLock<HashMap<String, ObjectKind>>,
}

impl ObjectTypeCache {
    pub async fn resolve(
        &self,
        object_id: &str,
        crm: &dyn CrmClient,
    ) -> Result<ObjectKind, ClientError> {
        if let Some(kind) = self.entries.read().await.get(object_id) {
            return Ok(kind.clone());
        }

        let kind = crm.resolve_object_kind(object_id).await?.into_inner();
        self.entries.write().await.insert(object_id.to_string(), kind.clone());
        Ok(kind)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

pub struct EventRouter {
    crm: Arc<dyn CrmClient>,
    contacts: ContactSyncer,
    enrichment: CallEnrichmentWorkflow,
    mappings: Arc<dyn MappingRepository>,
    analytics: Arc<dyn AnalyticsSink>,
    object_types: ObjectTypeCache,
}

impl EventRouter {
    pub fn new(
        crm: Arc<dyn CrmClient>,
        telephony: Arc<dyn TelephonyClient>,
        mappings: Arc<dyn MappingRepository>,
        analytics: Arc<dyn AnalyticsSink>,
        inbox_base_url: impl Into<String>,
    ) -> Self {
        Self {
            contacts: ContactSyncer::new(telephony.clone(), mappings.clone()),
            enrichment: CallEnrichmentWorkflow::new(
                crm.clone(),
                telephony,
                mappings.clone(),
                inbox_base_url,
            ),
            crm,
            mappings,
            analytics,
            object_types: ObjectTypeCache::default(),
        }
    }

    pub fn object_types(&self) -> &ObjectTypeCache {
        &self.object_types
    }

    pub async fn route(
        &self,
        integration_id: &str,
        source: Platform,
        event: &Value,
    ) -> Result<ProcessingResult, SyncError> {
        let event_type = event_type(event)
            .ok_or_else(|| SyncError::InvalidEvent("event has no type".to_string()))?;

        let result = match source {
            Platform::Telephony => self.route_telephony(integration_id, event_type, event).await,
            Platform::Crm => self.route_crm(integration_id, event_type, event).await,
        };

        match &result {
            Ok(ProcessingResult::Skipped { reason }) => debug!(
                event_name = "sync.router.skipped",
                integration_id,
                source = source.as_str(),
                event_type,
                reason = %reason,
                "event acknowledged without changes"
            ),
            Ok(outcome) => info!(
                event_name = "sync.router.processed",
                integration_id,
                source = source.as_str(),
                event_type,
                outcome = outcome.label(),
                "event processed"
            ),
            Err(error) => warn!(
                event_name = "sync.router.failed",
                integration_id,
                source = source.as_str(),
                event_type,
                retryable = error.is_retryable(),
                error = %error,
                "event processing failed"
            ),
        }

        if let Ok(outcome) = &result {
            self.emit_analytics(integration_id, source, event_type, outcome).await;
        }

        result
    }

    async fn emit_analytics(
        &self,
        integration_id: &str,
        source: Platform,
        event_type: &str,
        outcome: &ProcessingResult,
    ) {
        let event = AnalyticsEvent {
            name: "webhook.processed".to_string(),
            integration_id: integration_id.to_string(),
            properties: json!({
                "source": source.as_str(),
                "event_type": event_type,
                "outcome": outcome.label(),
            }),
        };
        if let Err(error) = self.analytics.record(event).await {
            warn!(
                event_name = "sync.router.analytics_failed",
                integration_id,
                error = %error,
                "analytics event dropped"
            );
        }
    }
}

fn event_type(event: &Value) -> Option<&str> {
    ["type", "event_type", "eventType"]
        .iter()
        .find_map(|key| event.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
