//! Recording fakes for the remote collaborators.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use callbridge_core::domain::call::{Call, PhoneNumber, Recording, TelephonyUser, Voicemail};
use callbridge_core::domain::contact::{
    ContactDraft, CrmPerson, CrmRecord, ObjectKind, TelephonyContact,
};
use callbridge_core::domain::note::{CrmNote, NoteDraft, NoteStrategy};
use callbridge_core::domain::sync::{ListQuery, PageCursor, RecordPage, WorkItem};
use callbridge_core::domain::webhook::{WebhookDescriptor, WebhookKind};
use callbridge_core::errors::ClientError;
use callbridge_core::ports::{
    AnalyticsEvent, AnalyticsSink, ContactQuery, CrmClient, Data, IntegrationMessage,
    IntegrationMessages, QueueTransport, SubscriptionRequest, TelephonyClient,
};

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().expect("fake state lock")
}

fn descriptor(id: String, request: &SubscriptionRequest) -> WebhookDescriptor {
    WebhookDescriptor {
        id: id.clone(),
        kind: request.kind,
        key: format!("key-{id}").into(),
        resource_ids: request.resource_ids.clone(),
        url: request.url.clone(),
        created_at: Utc::now(),
    }
}

pub struct FakeCrm {
    strategy: NoteStrategy,
    pub records: Mutex<HashMap<String, CrmRecord>>,
    pub notes: Mutex<HashMap<String, NoteDraft>>,
    pub operations: Mutex<Vec<String>>,
    pub object_kinds: Mutex<HashMap<String, ObjectKind>>,
    pub resolve_calls: AtomicUsize,
    pub pages: Mutex<Vec<RecordPage<CrmRecord>>>,
    pub list_queries: Mutex<Vec<ListQuery>>,
    pub created_webhooks: Mutex<Vec<String>>,
    pub deleted_webhooks: Mutex<Vec<String>>,
    pub fail_create_note: AtomicBool,
    pub fail_delete_note: AtomicBool,
    pub fail_get_record: AtomicBool,
    pub fail_webhooks: AtomicBool,
    next_id: AtomicUsize,
}

impl FakeCrm {
    pub fn new(strategy: NoteStrategy) -> Self {
        Self {
            strategy,
            records: Mutex::new(HashMap::new()),
            notes: Mutex::new(HashMap::new()),
            operations: Mutex::new(Vec::new()),
            object_kinds: Mutex::new(HashMap::new()),
            resolve_calls: AtomicUsize::new(0),
            pages: Mutex::new(Vec::new()),
            list_queries: Mutex::new(Vec::new()),
            created_webhooks: Mutex::new(Vec::new()),
            deleted_webhooks: Mutex::new(Vec::new()),
            fail_create_note: AtomicBool::new(false),
            fail_delete_note: AtomicBool::new(false),
            fail_get_record: AtomicBool::new(false),
            fail_webhooks: AtomicBool::new(false),
            next_id: AtomicUsize::new(1),
        }
    }

    pub fn with_person(self, id: &str, attributes: Value) -> Self {
        lock(&self.records).insert(
            id.to_string(),
            CrmRecord { id: id.to_string(), kind: ObjectKind::Person, attributes, updated_at: None },
        );
        self
    }

    pub fn with_object_kind(self, object_id: &str, kind: ObjectKind) -> Self {
        lock(&self.object_kinds).insert(object_id.to_string(), kind);
        self
    }

    pub fn with_page(self, page: RecordPage<CrmRecord>) -> Self {
        lock(&self.pages).push(page);
        self
    }

    pub fn operations(&self) -> Vec<String> {
        lock(&self.operations).clone()
    }

    pub fn note_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = lock(&self.notes).keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn note(&self, id: &str) -> Option<NoteDraft> {
        lock(&self.notes).get(id).cloned()
    }

    fn next(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn record(&self, operation: String) {
        lock(&self.operations).push(operation);
    }
}

#[async_trait]
impl CrmClient for FakeCrm {
    fn note_strategy(&self) -> NoteStrategy {
        self.strategy
    }

    async fn get_record(&self, kind: &ObjectKind, id: &str) -> Result<Data<CrmRecord>, ClientError> {
        self.record(format!("get_record:{id}"));
        if self.fail_get_record.load(Ordering::SeqCst) {
            return Err(ClientError::Remote("crm unavailable".to_string()));
        }
        lock(&self.records)
            .get(id)
            .filter(|record| &record.kind == kind)
            .cloned()
            .map(Data::new)
            .ok_or_else(|| ClientError::not_found(kind.as_str(), id))
    }

    async fn list_records(
        &self,
        _kind: &ObjectKind,
        query: &ListQuery,
    ) -> Result<Data<RecordPage<CrmRecord>>, ClientError> {
        lock(&self.list_queries).push(query.clone());
        let index = match &query.cursor {
            Some(PageCursor::Page(page)) => *page as usize,
            Some(PageCursor::Token(token)) => token
                .trim_start_matches("cursor-")
                .parse::<usize>()
                .map_err(|_| ClientError::Remote(format!("bad cursor {token}")))?,
            None => 0,
        };
        lock(&self.pages)
            .get(index)
            .cloned()
            .map(Data::new)
            .ok_or_else(|| ClientError::Remote(format!("no page {index}")))
    }

    async fn create_record(
        &self,
        kind: &ObjectKind,
        attributes: &Value,
    ) -> Result<Data<CrmRecord>, ClientError> {
        let id = self.next("rec");
        let record =
            CrmRecord { id: id.clone(), kind: kind.clone(), attributes: attributes.clone(), updated_at: None };
        lock(&self.records).insert(id, record.clone());
        Ok(Data::new(record))
    }

    async fn update_record(
        &self,
        kind: &ObjectKind,
        id: &str,
        attributes: &Value,
    ) -> Result<Data<CrmRecord>, ClientError> {
        let mut records = lock(&self.records);
        let record = records.get_mut(id).ok_or_else(|| ClientError::not_found(kind.as_str(), id))?;
        record.attributes = attributes.clone();
        Ok(Data::new(record.clone()))
    }

    async fn delete_record(&self, kind: &ObjectKind, id: &str) -> Result<(), ClientError> {
        lock(&self.records)
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ClientError::not_found(kind.as_str(), id))
    }

    async fn create_note(&self, note: &NoteDraft) -> Result<Data<CrmNote>, ClientError> {
        if self.fail_create_note.load(Ordering::SeqCst) {
            self.record("create_note:failed".to_string());
            return Err(ClientError::Remote("note creation rejected".to_string()));
        }
        let id = self.next("note");
        self.record(format!("create_note:{id}"));
        lock(&self.notes).insert(id.clone(), note.clone());
        Ok(Data::new(CrmNote { id, parent_record_id: note.parent_record_id.clone() }))
    }

    async fn update_note(
        &self,
        note_id: &str,
        note: &NoteDraft,
    ) -> Result<Data<CrmNote>, ClientError> {
        self.record(format!("update_note:{note_id}"));
        let mut notes = lock(&self.notes);
        let existing = notes.get_mut(note_id).ok_or_else(|| ClientError::not_found("note", note_id))?;
        *existing = note.clone();
        Ok(Data::new(CrmNote {
            id: note_id.to_string(),
            parent_record_id: note.parent_record_id.clone(),
        }))
    }

    async fn delete_note(&self, note_id: &str) -> Result<(), ClientError> {
        self.record(format!("delete_note:{note_id}"));
        if self.fail_delete_note.load(Ordering::SeqCst) {
            return Err(ClientError::Remote("note deletion rejected".to_string()));
        }
        lock(&self.notes)
            .remove(note_id)
            .map(|_| ())
            .ok_or_else(|| ClientError::not_found("note", note_id))
    }

    async fn create_webhook_subscription(
        &self,
        request: &SubscriptionRequest,
    ) -> Result<Data<WebhookDescriptor>, ClientError> {
        if self.fail_webhooks.load(Ordering::SeqCst) {
            return Err(ClientError::Remote("crm webhook endpoint unavailable".to_string()));
        }
        let id = self.next("crm-wh");
        lock(&self.created_webhooks).push(id.clone());
        Ok(Data::new(descriptor(id, request)))
    }

    async fn delete_webhook_subscription(&self, subscription_id: &str) -> Result<(), ClientError> {
        lock(&self.deleted_webhooks).push(subscription_id.to_string());
        Ok(())
    }

    async fn find_person_by_phone(
        &self,
        phone: &str,
    ) -> Result<Data<Option<CrmRecord>>, ClientError> {
        let found = lock(&self.records)
            .values()
            .filter(|record| record.kind == ObjectKind::Person)
            .find(|record| {
                CrmPerson::from_record(record).phone_numbers.iter().any(|number| number == phone)
            })
            .cloned();
        Ok(Data::new(found))
    }

    async fn resolve_object_kind(&self, object_id: &str) -> Result<Data<ObjectKind>, ClientError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.object_kinds)
            .get(object_id)
            .cloned()
            .map(Data::new)
            .ok_or_else(|| ClientError::not_found("object", object_id))
    }
}

pub struct FakeTelephony {
    pub calls: Mutex<HashMap<String, Call>>,
    pub recordings: Mutex<HashMap<String, Vec<Recording>>>,
    pub voicemails: Mutex<HashMap<String, Voicemail>>,
    pub contacts: Mutex<HashMap<String, ContactDraft>>,
    pub operations: Mutex<Vec<String>>,
    pub created_webhooks: Mutex<Vec<(WebhookKind, Vec<String>)>>,
    pub deleted_webhooks: Mutex<Vec<String>>,
    pub failing_kinds: Mutex<HashSet<WebhookKind>>,
    pub undeletable_webhooks: Mutex<HashSet<String>>,
    pub fail_recordings: AtomicBool,
    pub fail_voicemail: AtomicBool,
    next_id: AtomicUsize,
}

impl Default for FakeTelephony {
    fn default() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
            recordings: Mutex::new(HashMap::new()),
            voicemails: Mutex::new(HashMap::new()),
            contacts: Mutex::new(HashMap::new()),
            operations: Mutex::new(Vec::new()),
            created_webhooks: Mutex::new(Vec::new()),
            deleted_webhooks: Mutex::new(Vec::new()),
            failing_kinds: Mutex::new(HashSet::new()),
            undeletable_webhooks: Mutex::new(HashSet::new()),
            fail_recordings: AtomicBool::new(false),
            fail_voicemail: AtomicBool::new(false),
            next_id: AtomicUsize::new(1),
        }
    }
}

impl FakeTelephony {
    pub fn with_call(self, call: Call) -> Self {
        lock(&self.calls).insert(call.id.clone(), call);
        self
    }

    pub fn with_recording(self, call_id: &str, recording: Recording) -> Self {
        lock(&self.recordings).entry(call_id.to_string()).or_default().push(recording);
        self
    }

    pub fn with_voicemail(self, call_id: &str, voicemail: Voicemail) -> Self {
        lock(&self.voicemails).insert(call_id.to_string(), voicemail);
        self
    }

    pub fn failing_kind(self, kind: WebhookKind) -> Self {
        lock(&self.failing_kinds).insert(kind);
        self
    }

    pub fn undeletable_webhook(self, webhook_id: &str) -> Self {
        lock(&self.undeletable_webhooks).insert(webhook_id.to_string());
        self
    }

    pub fn operations(&self) -> Vec<String> {
        lock(&self.operations).clone()
    }

    pub fn created_webhook_count(&self) -> usize {
        lock(&self.created_webhooks).len()
    }

    pub fn deleted_webhooks(&self) -> Vec<String> {
        lock(&self.deleted_webhooks).clone()
    }

    fn next(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn record(&self, operation: String) {
        lock(&self.operations).push(operation);
    }
}

#[async_trait]
impl TelephonyClient for FakeTelephony {
    async fn get_call(&self, call_id: &str) -> Result<Data<Call>, ClientError> {
        self.record(format!("get_call:{call_id}"));
        lock(&self.calls)
            .get(call_id)
            .cloned()
            .map(Data::new)
            .ok_or_else(|| ClientError::not_found("call", call_id))
    }

    async fn get_call_recordings(&self, call_id: &str) -> Result<Data<Vec<Recording>>, ClientError> {
        if self.fail_recordings.load(Ordering::SeqCst) {
            return Err(ClientError::Remote("recordings unavailable".to_string()));
        }
        Ok(Data::new(lock(&self.recordings).get(call_id).cloned().unwrap_or_default()))
    }

    async fn get_call_voicemails(
        &self,
        call_id: &str,
    ) -> Result<Data<Option<Voicemail>>, ClientError> {
        if self.fail_voicemail.load(Ordering::SeqCst) {
            return Err(ClientError::Remote("voicemail unavailable".to_string()));
        }
        Ok(Data::new(lock(&self.voicemails).get(call_id).cloned()))
    }

    async fn get_phone_number(
        &self,
        phone_number_id: &str,
    ) -> Result<Data<PhoneNumber>, ClientError> {
        Ok(Data::new(PhoneNumber {
            id: phone_number_id.to_string(),
            number: "+15550009999".to_string(),
            name: Some("Sales".to_string()),
        }))
    }

    async fn get_user(&self, user_id: &str) -> Result<Data<TelephonyUser>, ClientError> {
        Err(ClientError::not_found("user", user_id))
    }

    async fn list_contacts(
        &self,
        query: &ContactQuery,
    ) -> Result<Data<Vec<TelephonyContact>>, ClientError> {
        let contacts = lock(&self.contacts)
            .iter()
            .filter(|(_, draft)| query.external_ids.contains(&draft.external_id))
            .map(|(id, draft)| TelephonyContact { id: id.clone(), fields: draft.clone() })
            .collect();
        Ok(Data::new(contacts))
    }

    async fn create_contact(
        &self,
        contact: &ContactDraft,
    ) -> Result<Data<TelephonyContact>, ClientError> {
        let id = self.next("contact");
        self.record(format!("create_contact:{id}"));
        lock(&self.contacts).insert(id.clone(), contact.clone());
        Ok(Data::new(TelephonyContact { id, fields: contact.clone() }))
    }

    async fn update_contact(
        &self,
        contact_id: &str,
        contact: &ContactDraft,
    ) -> Result<Data<TelephonyContact>, ClientError> {
        self.record(format!("update_contact:{contact_id}"));
        let mut contacts = lock(&self.contacts);
        let existing =
            contacts.get_mut(contact_id).ok_or_else(|| ClientError::not_found("contact", contact_id))?;
        *existing = contact.clone();
        Ok(Data::new(TelephonyContact { id: contact_id.to_string(), fields: contact.clone() }))
    }

    async fn delete_contact(&self, contact_id: &str) -> Result<(), ClientError> {
        self.record(format!("delete_contact:{contact_id}"));
        lock(&self.contacts)
            .remove(contact_id)
            .map(|_| ())
            .ok_or_else(|| ClientError::not_found("contact", contact_id))
    }

    async fn create_webhook_subscription(
        &self,
        request: &SubscriptionRequest,
    ) -> Result<Data<WebhookDescriptor>, ClientError> {
        // Lets a concurrent caller interleave.
        tokio::task::yield_now().await;
        if lock(&self.failing_kinds).contains(&request.kind) {
            return Err(ClientError::Remote(format!("{} webhook rejected", request.kind)));
        }
        let id = self.next("tel-wh");
        lock(&self.created_webhooks).push((request.kind, request.resource_ids.clone()));
        Ok(Data::new(descriptor(id, request)))
    }

    async fn delete_webhook_subscription(&self, subscription_id: &str) -> Result<(), ClientError> {
        if lock(&self.undeletable_webhooks).contains(subscription_id) {
            return Err(ClientError::Remote("503 service unavailable".to_string()));
        }
        lock(&self.deleted_webhooks).push(subscription_id.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingQueue {
    pub sent: Mutex<Vec<(String, Vec<WorkItem>)>>,
}

impl RecordingQueue {
    pub fn sent(&self) -> Vec<(String, Vec<WorkItem>)> {
        lock(&self.sent).clone()
    }
}

#[async_trait]
impl QueueTransport for RecordingQueue {
    async fn batch_send(&self, items: Vec<WorkItem>, destination: &str) -> Result<(), ClientError> {
        lock(&self.sent).push((destination.to_string(), items));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingMessages {
    pub posted: Mutex<Vec<(String, IntegrationMessage)>>,
}

impl RecordingMessages {
    pub fn posted(&self) -> Vec<(String, IntegrationMessage)> {
        lock(&self.posted).clone()
    }
}

#[async_trait]
impl IntegrationMessages for RecordingMessages {
    async fn post(
        &self,
        integration_id: &str,
        message: IntegrationMessage,
    ) -> Result<(), ClientError> {
        lock(&self.posted).push((integration_id.to_string(), message));
        Ok(())
    }
}

/// Analytics sink that always fails, used to prove emission is best-effort.
#[derive(Default)]
pub struct FailingAnalytics {
    pub attempts: AtomicUsize,
}

#[async_trait]
impl AnalyticsSink for FailingAnalytics {
    async fn record(&self, _event: AnalyticsEvent) -> Result<(), ClientError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(ClientError::Remote("analytics offline".to_string()))
    }
}
