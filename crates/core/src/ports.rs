//! Narrow interfaces to the collaborators this crate does not implement: the
//! CRM and telephony REST clients, the queue transport, the operator-facing
//! integration message channel and the analytics sink.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::call::{Call, PhoneNumber, Recording, TelephonyUser, Voicemail};
use crate::domain::contact::{ContactDraft, CrmRecord, ObjectKind, TelephonyContact};
use crate::domain::note::{CrmNote, NoteDraft, NoteStrategy};
use crate::domain::sync::{ListQuery, RecordPage, WorkItem};
use crate::domain::webhook::{WebhookDescriptor, WebhookKind};
use crate::errors::ClientError;

/// Normalized response envelope returned by every client call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Data<T> {
    pub data: T,
}

impl<T> Data<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }

    pub fn into_inner(self) -> T {
        self.data
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscriptionRequest {
    pub kind: WebhookKind,
    pub url: String,
    pub events: Vec<String>,
    pub resource_ids: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContactQuery {
    pub external_ids: Vec<String>,
    pub page_token: Option<String>,
    pub limit: u32,
}

#[async_trait]
pub trait CrmClient: Send + Sync {
    /// Note reconciliation capability, fixed for the lifetime of the client.
    fn note_strategy(&self) -> NoteStrategy;

    async fn get_record(&self, kind: &ObjectKind, id: &str) -> Result<Data<CrmRecord>, ClientError>;
    async fn list_records(
        &self,
        kind: &ObjectKind,
        query: &ListQuery,
    ) -> Result<Data<RecordPage<CrmRecord>>, ClientError>;
    async fn create_record(
        &self,
        kind: &ObjectKind,
        attributes: &Value,
    ) -> Result<Data<CrmRecord>, ClientError>;
    async fn update_record(
        &self,
        kind: &ObjectKind,
        id: &str,
        attributes: &Value,
    ) -> Result<Data<CrmRecord>, ClientError>;
    async fn delete_record(&self, kind: &ObjectKind, id: &str) -> Result<(), ClientError>;

    async fn create_note(&self, note: &NoteDraft) -> Result<Data<CrmNote>, ClientError>;
    async fn update_note(&self, note_id: &str, note: &NoteDraft)
        -> Result<Data<CrmNote>, ClientError>;
    async fn delete_note(&self, note_id: &str) -> Result<(), ClientError>;

    async fn create_webhook_subscription(
        &self,
        request: &SubscriptionRequest,
    ) -> Result<Data<WebhookDescriptor>, ClientError>;
    async fn delete_webhook_subscription(&self, subscription_id: &str) -> Result<(), ClientError>;

    async fn find_person_by_phone(&self, phone: &str)
        -> Result<Data<Option<CrmRecord>>, ClientError>;
    /// Resolves a CRM object identifier (as carried by some webhook payloads)
    /// to the object family it names.
    async fn resolve_object_kind(&self, object_id: &str) -> Result<Data<ObjectKind>, ClientError>;
}

#[async_trait]
pub trait TelephonyClient: Send + Sync {
    async fn get_call(&self, call_id: &str) -> Result<Data<Call>, ClientError>;
    async fn get_call_recordings(&self, call_id: &str) -> Result<Data<Vec<Recording>>, ClientError>;
    async fn get_call_voicemails(&self, call_id: &str)
        -> Result<Data<Option<Voicemail>>, ClientError>;
    async fn get_phone_number(&self, phone_number_id: &str)
        -> Result<Data<PhoneNumber>, ClientError>;
    async fn get_user(&self, user_id: &str) -> Result<Data<TelephonyUser>, ClientError>;

    async fn list_contacts(
        &self,
        query: &ContactQuery,
    ) -> Result<Data<Vec<TelephonyContact>>, ClientError>;
    async fn create_contact(&self, contact: &ContactDraft)
        -> Result<Data<TelephonyContact>, ClientError>;
    async fn update_contact(
        &self,
        contact_id: &str,
        contact: &ContactDraft,
    ) -> Result<Data<TelephonyContact>, ClientError>;
    async fn delete_contact(&self, contact_id: &str) -> Result<(), ClientError>;

    async fn create_webhook_subscription(
        &self,
        request: &SubscriptionRequest,
    ) -> Result<Data<WebhookDescriptor>, ClientError>;
    async fn delete_webhook_subscription(&self, subscription_id: &str) -> Result<(), ClientError>;
}

#[async_trait]
pub trait QueueTransport: Send + Sync {
    async fn batch_send(&self, items: Vec<WorkItem>, destination: &str) -> Result<(), ClientError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

/// Structured message for the operator-facing integration UI.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationMessage {
    pub severity: Severity,
    pub title: String,
    pub detail: String,
    pub created_at: DateTime<Utc>,
}

impl IntegrationMessage {
    pub fn warning(title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(Severity::Warning, title, detail)
    }

    pub fn error(title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(Severity::Error, title, detail)
    }

    fn new(severity: Severity, title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self { severity, title: title.into(), detail: detail.into(), created_at: Utc::now() }
    }
}

#[async_trait]
pub trait IntegrationMessages: Send + Sync {
    async fn post(&self, integration_id: &str, message: IntegrationMessage)
        -> Result<(), ClientError>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub name: String,
    pub integration_id: String,
    pub properties: Value,
}

#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn record(&self, event: AnalyticsEvent) -> Result<(), ClientError>;
}

/// Sink used when no analytics backend is configured.
#[derive(Default)]
pub struct NoopAnalytics;

#[async_trait]
impl AnalyticsSink for NoopAnalytics {
    async fn record(&self, _event: AnalyticsEvent) -> Result<(), ClientError> {
        Ok(())
    }
}
