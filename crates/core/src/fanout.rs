//! Queue fan-out planning for bulk syncs.
//!
//! Planning is pure: the functions here only build [`WorkItem`]s. Submitting
//! them is the job of a [`crate::ports::QueueTransport`] chosen by the caller.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::mapping::SyncMethod;
use crate::domain::sync::{PageCursor, PageFetch, RawBatch, RecordBatch, SortOrder, WorkItem};

/// Parameters shared by every page of one bulk sync job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageTemplate {
    pub integration_id: String,
    pub job_id: String,
    pub object_type: String,
    pub limit: u32,
    pub modified_since: Option<DateTime<Utc>>,
    pub sort: SortOrder,
    pub sync_method: SyncMethod,
}

impl PageTemplate {
    pub fn new(
        integration_id: impl Into<String>,
        object_type: impl Into<String>,
        limit: u32,
        sync_method: SyncMethod,
    ) -> Self {
        Self {
            integration_id: integration_id.into(),
            job_id: Uuid::new_v4().to_string(),
            object_type: object_type.into(),
            limit,
            modified_since: None,
            sort: SortOrder::default(),
            sync_method,
        }
    }

    pub fn modified_since(mut self, since: DateTime<Utc>) -> Self {
        self.modified_since = Some(since);
        self
    }

    pub fn fetch(&self, cursor: PageCursor) -> PageFetch {
        PageFetch {
            integration_id: self.integration_id.clone(),
            job_id: self.job_id.clone(),
            object_type: self.object_type.clone(),
            cursor,
            limit: self.limit,
            modified_since: self.modified_since,
            sort: self.sort,
            sync_method: self.sync_method,
        }
    }
}

/// One `FetchPage` item per page in `start_page..total_pages`, ascending.
pub fn plan_pages(start_page: u32, total_pages: u32, template: &PageTemplate) -> Vec<WorkItem> {
    (start_page..total_pages)
        .map(|page| WorkItem::FetchPage(template.fetch(PageCursor::Page(page))))
        .collect()
}

/// Follow-up fetch for cursor-paged listings; an exhausted cursor plans nothing.
pub fn plan_next_cursor(cursor: Option<&PageCursor>, template: &PageTemplate) -> Option<WorkItem> {
    cursor.map(|cursor| WorkItem::FetchPage(template.fetch(cursor.clone())))
}

/// Normalizes ad-hoc batches into uniform `ProcessBatch` items.
pub fn plan_batches(raw_batches: Vec<RawBatch>) -> Vec<WorkItem> {
    raw_batches
        .into_iter()
        .map(|raw| {
            let total_in_page = raw.total_in_page.unwrap_or(raw.records.len());
            WorkItem::ProcessBatch(RecordBatch {
                integration_id: raw.integration_id,
                job_id: raw.job_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
                object_type: raw.object_type,
                records: raw.records,
                total_in_page,
                is_webhook: raw.is_webhook.unwrap_or(false),
                sync_method: raw.sync_method.unwrap_or(SyncMethod::Backfill),
            })
        })
        .collect()
}
