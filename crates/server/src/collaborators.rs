//! Collaborators used when no CRM or telephony client is plugged in.
//!
//! Every remote call fails with `ClientError::Unsupported`, which the sync
//! layer reports as a retryable downstream failure. Operator messages go to
//! the log.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, warn};

use callbridge_core::config::AppConfig;
use callbridge_core::domain::call::{Call, PhoneNumber, Recording, TelephonyUser, Voicemail};
use callbridge_core::domain::contact::{ContactDraft, CrmRecord, ObjectKind, TelephonyContact};
use callbridge_core::domain::note::{CrmNote, NoteDraft, NoteStrategy};
use callbridge_core::domain::sync::{ListQuery, RecordPage};
use callbridge_core::domain::webhook::WebhookDescriptor;
use callbridge_core::errors::ClientError;
use callbridge_core::ports::{
    AnalyticsSink, ContactQuery, CrmClient, Data, IntegrationMessage, IntegrationMessages,
    NoopAnalytics, Severity, SubscriptionRequest, TelephonyClient,
};

/// Remote collaborators the sync layer talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub crm: Arc<dyn CrmClient>,
    pub telephony: Arc<dyn TelephonyClient>,
    pub messages: Arc<dyn IntegrationMessages>,
    pub analytics: Arc<dyn AnalyticsSink>,
}

impl Collaborators {
    pub fn unconfigured(config: &AppConfig) -> Self {
        Self {
            crm: Arc::new(UnconfiguredCrm {
                provider: config.crm.provider.clone(),
                note_strategy: config.crm.note_strategy,
            }),
            telephony: Arc::new(UnconfiguredTelephony),
            messages: Arc::new(LogMessages),
            analytics: Arc::new(NoopAnalytics),
        }
    }
}

fn unsupported<T>(operation: &str) -> Result<T, ClientError> {
    Err(ClientError::Unsupported(format!("no client configured for `{operation}`")))
}

pub struct UnconfiguredCrm {
    provider: String,
    note_strategy: NoteStrategy,
}

#[async_trait]
impl CrmClient for UnconfiguredCrm {
    fn note_strategy(&self) -> NoteStrategy {
        self.note_strategy
    }

    async fn get_record(
        &self,
        _kind: &ObjectKind,
        _id: &str,
    ) -> Result<Data<CrmRecord>, ClientError> {
        unsupported(&format!("{}.get_record", self.provider))
    }

    async fn list_records(
        &self,
        _kind: &ObjectKind,
        _query: &ListQuery,
    ) -> Result<Data<RecordPage<CrmRecord>>, ClientError> {
        unsupported(&format!("{}.list_records", self.provider))
    }

    async fn create_record(
        &self,
        _kind: &ObjectKind,
        _attributes: &Value,
    ) -> Result<Data<CrmRecord>, ClientError> {
        unsupported(&format!("{}.create_record", self.provider))
    }

    async fn update_record(
        &self,
        _kind: &ObjectKind,
        _id: &str,
        _attributes: &Value,
    ) -> Result<Data<CrmRecord>, ClientError> {
        unsupported(&format!("{}.update_record", self.provider))
    }

    async fn delete_record(&self, _kind: &ObjectKind, _id: &str) -> Result<(), ClientError> {
        unsupported(&format!("{}.delete_record", self.provider))
    }

    async fn create_note(&self, _note: &NoteDraft) -> Result<Data<CrmNote>, ClientError> {
        unsupported(&format!("{}.create_note", self.provider))
    }

    async fn update_note(
        &self,
        _note_id: &str,
        _note: &NoteDraft,
    ) -> Result<Data<CrmNote>, ClientError> {
        unsupported(&format!("{}.update_note", self.provider))
    }

    async fn delete_note(&self, _note_id: &str) -> Result<(), ClientError> {
        unsupported(&format!("{}.delete_note", self.provider))
    }

    async fn create_webhook_subscription(
        &self,
        _request: &SubscriptionRequest,
    ) -> Result<Data<WebhookDescriptor>, ClientError> {
        unsupported(&format!("{}.create_webhook_subscription", self.provider))
    }

    async fn delete_webhook_subscription(&self, _subscription_id: &str) -> Result<(), ClientError> {
        unsupported(&format!("{}.delete_webhook_subscription", self.provider))
    }

    async fn find_person_by_phone(
        &self,
        _phone: &str,
    ) -> Result<Data<Option<CrmRecord>>, ClientError> {
        unsupported(&format!("{}.find_person_by_phone", self.provider))
    }

    async fn resolve_object_kind(&self, _object_id: &str) -> Result<Data<ObjectKind>, ClientError> {
        unsupported(&format!("{}.resolve_object_kind", self.provider))
    }
}

pub struct UnconfiguredTelephony;

#[async_trait]
impl TelephonyClient for UnconfiguredTelephony {
    async fn get_call(&self, _call_id: &str) -> Result<Data<Call>, ClientError> {
        unsupported("telephony.get_call")
    }

    async fn get_call_recordings(
        &self,
        _call_id: &str,
    ) -> Result<Data<Vec<Recording>>, ClientError> {
        unsupported("telephony.get_call_recordings")
    }

    async fn get_call_voicemails(
        &self,
        _call_id: &str,
    ) -> Result<Data<Option<Voicemail>>, ClientError> {
        unsupported("telephony.get_call_voicemails")
    }

    async fn get_phone_number(
        &self,
        _phone_number_id: &str,
    ) -> Result<Data<PhoneNumber>, ClientError> {
        unsupported("telephony.get_phone_number")
    }

    async fn get_user(&self, _user_id: &str) -> Result<Data<TelephonyUser>, ClientError> {
        unsupported("telephony.get_user")
    }

    async fn list_contacts(
        &self,
        _query: &ContactQuery,
    ) -> Result<Data<Vec<TelephonyContact>>, ClientError> {
        unsupported("telephony.list_contacts")
    }

    async fn create_contact(
        &self,
        _contact: &ContactDraft,
    ) -> Result<Data<TelephonyContact>, ClientError> {
        unsupported("telephony.create_contact")
    }

    async fn update_contact(
        &self,
        _contact_id: &str,
        _contact: &ContactDraft,
    ) -> Result<Data<TelephonyContact>, ClientError> {
        unsupported("telephony.update_contact")
    }

    async fn delete_contact(&self, _contact_id: &str) -> Result<(), ClientError> {
        unsupported("telephony.delete_contact")
    }

    async fn create_webhook_subscription(
        &self,
        _request: &SubscriptionRequest,
    ) -> Result<Data<WebhookDescriptor>, ClientError> {
        unsupported("telephony.create_webhook_subscription")
    }

    async fn delete_webhook_subscription(&self, _subscription_id: &str) -> Result<(), ClientError> {
        unsupported("telephony.delete_webhook_subscription")
    }
}

/// Writes operator messages to the log instead of an integration UI.
pub struct LogMessages;

#[async_trait]
impl IntegrationMessages for LogMessages {
    async fn post(
        &self,
        integration_id: &str,
        message: IntegrationMessage,
    ) -> Result<(), ClientError> {
        match message.severity {
            Severity::Warning => warn!(
                event_name = "server.integration.message",
                integration_id,
                title = %message.title,
                detail = %message.detail,
                "integration warning"
            ),
            Severity::Error => error!(
                event_name = "server.integration.message",
                integration_id,
                title = %message.title,
                detail = %message.detail,
                "integration error"
            ),
        }
        Ok(())
    }
}
