//! Bulk sync of CRM people into the telephony contact book.
//!
//! The first page is fetched and processed inline; the rest of the job is
//! fanned out as `FetchPage` work items through the queue transport.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{info, warn};

use callbridge_core::domain::contact::{CrmPerson, CrmRecord, ObjectKind};
use callbridge_core::domain::mapping::SyncMethod;
use callbridge_core::domain::sync::{PageCursor, PageFetch, RecordBatch, RecordPage};
use callbridge_core::errors::SyncError;
use callbridge_core::fanout::{plan_next_cursor, plan_pages, PageTemplate};
use callbridge_core::ports::{CrmClient, QueueTransport};

use crate::contacts::ContactSyncer;
use crate::router::ProcessingResult;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BulkSyncStart {
    pub job_id: String,
    pub first_page_records: usize,
    pub planned_items: usize,
}

/// Per-record tally for one processed page or batch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PageOutcome {
    pub job_id: String,
    pub synced: usize,
    pub skipped: usize,
    pub failed: usize,
    pub follow_up: bool,
}

pub struct BulkSyncCoordinator {
    crm: Arc<dyn CrmClient>,
    contacts: ContactSyncer,
    queue: Arc<dyn QueueTransport>,
    page_destination: String,
    page_limit: u32,
}

impl BulkSyncCoordinator {
    pub fn new(
        crm: Arc<dyn CrmClient>,
        contacts: ContactSyncer,
        queue: Arc<dyn QueueTransport>,
        page_destination: impl Into<String>,
        page_limit: u32,
    ) -> Self {
        Self { crm, contacts, queue, page_destination: page_destination.into(), page_limit }
    }

    pub async fn start_sync(
        &self,
        integration_id: &str,
        object_type: &str,
        sync_method: SyncMethod,
        modified_since: Option<DateTime<Utc>>,
    ) -> Result<BulkSyncStart, SyncError> {
        let kind = supported_kind(object_type)?;
        let mut template =
            PageTemplate::new(integration_id, kind.as_str(), self.page_limit, sync_method);
        if let Some(since) = modified_since {
            template = template.modified_since(since);
        }

        let first = template.fetch(PageCursor::Page(0));
        let page = self.crm.list_records(&kind, &first.list_query()).await?.into_inner();
        let first_page_records = page.records.len();
        let outcome = self.process_records(&first, &page.records).await;

        let items = match page.total_pages {
            Some(total) => plan_pages(1, total, &template),
            None => plan_next_cursor(page.next.as_ref(), &template).into_iter().collect(),
        };
        let planned_items = items.len();
        if !items.is_empty() {
            self.queue.batch_send(items, &self.page_destination).await?;
        }

        info!(
            event_name = "sync.bulk.started",
            integration_id,
            job_id = %template.job_id,
            object_type = kind.as_str(),
            sync_method = sync_method.as_str(),
            first_page_records,
            synced = outcome.synced,
            failed = outcome.failed,
            planned_items,
            "bulk sync started"
        );

        Ok(BulkSyncStart { job_id: template.job_id, first_page_records, planned_items })
    }

    /// Fetches and processes one planned page. Listings that report a page
    /// total were fully planned up front; only the others chain a follow-up.
    pub async fn handle_page(&self, fetch: &PageFetch) -> Result<PageOutcome, SyncError> {
        let kind = supported_kind(&fetch.object_type)?;
        let page: RecordPage<CrmRecord> =
            self.crm.list_records(&kind, &fetch.list_query()).await?.into_inner();
        let mut outcome = self.process_records(fetch, &page.records).await;

        if page.total_pages.is_none() {
            if let Some(item) = plan_next_cursor(page.next.as_ref(), &template_of(fetch)) {
                self.queue.batch_send(vec![item], &self.page_destination).await?;
                outcome.follow_up = true;
            }
        }

        info!(
            event_name = "sync.bulk.page_processed",
            integration_id = %fetch.integration_id,
            job_id = %fetch.job_id,
            synced = outcome.synced,
            skipped = outcome.skipped,
            failed = outcome.failed,
            follow_up = outcome.follow_up,
            "bulk sync page processed"
        );
        Ok(outcome)
    }

    /// Processes records that were already fetched by the producer.
    pub async fn handle_batch(&self, batch: &RecordBatch) -> Result<PageOutcome, SyncError> {
        supported_kind(&batch.object_type)?;
        let sync_method = if batch.is_webhook { SyncMethod::Webhook } else { batch.sync_method };
        let mut outcome = PageOutcome { job_id: batch.job_id.clone(), ..PageOutcome::default() };

        for value in &batch.records {
            let Some(person) = person_from_value(value) else {
                outcome.failed += 1;
                warn!(
                    event_name = "sync.bulk.record_invalid",
                    integration_id = %batch.integration_id,
                    job_id = %batch.job_id,
                    "batch record has no id"
                );
                continue;
            };
            self.push(&batch.integration_id, &batch.job_id, &person, sync_method, &mut outcome)
                .await;
        }

        info!(
            event_name = "sync.bulk.batch_processed",
            integration_id = %batch.integration_id,
            job_id = %batch.job_id,
            total_in_page = batch.total_in_page,
            synced = outcome.synced,
            skipped = outcome.skipped,
            failed = outcome.failed,
            "bulk sync batch processed"
        );
        Ok(outcome)
    }

    async fn process_records(&self, fetch: &PageFetch, records: &[CrmRecord]) -> PageOutcome {
        let mut outcome = PageOutcome { job_id: fetch.job_id.clone(), ..PageOutcome::default() };
        for record in records {
            let person = CrmPerson::from_record(record);
            self.push(&fetch.integration_id, &fetch.job_id, &person, fetch.sync_method, &mut outcome)
                .await;
        }
        outcome
    }

    async fn push(
        &self,
        integration_id: &str,
        job_id: &str,
        person: &CrmPerson,
        sync_method: SyncMethod,
        outcome: &mut PageOutcome,
    ) {
        match self.contacts.push_person(integration_id, person, sync_method, false).await {
            Ok(ProcessingResult::Skipped { .. }) => outcome.skipped += 1,
            Ok(_) => outcome.synced += 1,
            Err(error) => {
                outcome.failed += 1;
                warn!(
                    event_name = "sync.bulk.record_failed",
                    integration_id,
                    job_id,
                    record_id = %person.id,
                    retryable = error.is_retryable(),
                    error = %error,
                    "record was not synced"
                );
            }
        }
    }
}

fn supported_kind(object_type: &str) -> Result<ObjectKind, SyncError> {
    match ObjectKind::parse(object_type) {
        ObjectKind::Person => Ok(ObjectKind::Person),
        other => Err(SyncError::InvalidEvent(format!(
            "bulk sync does not support `{}` records",
            other.as_str()
        ))),
    }
}

fn template_of(fetch: &PageFetch) -> PageTemplate {
    PageTemplate {
        integration_id: fetch.integration_id.clone(),
        job_id: fetch.job_id.clone(),
        object_type: fetch.object_type.clone(),
        limit: fetch.limit,
        modified_since: fetch.modified_since,
        sort: fetch.sort,
        sync_method: fetch.sync_method,
    }
}

fn person_from_value(value: &Value) -> Option<CrmPerson> {
    let id = value
        .get("id")
        .and_then(|id| id.as_str().or_else(|| id.get("record_id").and_then(Value::as_str)))
        .filter(|id| !id.trim().is_empty())?;
    let attributes = ["values", "attributes"]
        .iter()
        .find_map(|key| value.get(*key))
        .unwrap_or(value);
    Some(CrmPerson::from_attributes(id, attributes))
}
