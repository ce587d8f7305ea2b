//! Executes queued work items.

use std::sync::Arc;

use tracing::debug;

use callbridge_core::domain::sync::WorkItem;
use callbridge_core::errors::SyncError;

use crate::bulk::{BulkSyncCoordinator, PageOutcome};
use crate::router::{EventRouter, ProcessingResult};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkOutcome {
    Routed(ProcessingResult),
    PageProcessed(PageOutcome),
    BatchProcessed(PageOutcome),
}

pub struct WorkDispatcher {
    router: Arc<EventRouter>,
    bulk: Arc<BulkSyncCoordinator>,
}

impl WorkDispatcher {
    pub fn new(router: Arc<EventRouter>, bulk: Arc<BulkSyncCoordinator>) -> Self {
        Self { router, bulk }
    }

    /// Runs one item. Errors where `SyncError::is_retryable` holds should be
    /// redelivered by the transport.
    pub async fn dispatch(&self, item: WorkItem) -> Result<WorkOutcome, SyncError> {
        debug!(event_name = "sync.worker.dispatch", kind = item.kind(), "dispatching work item");
        match item {
            WorkItem::ProcessWebhook(webhook) => self
                .router
                .route(&webhook.integration_id, webhook.source, &webhook.event)
                .await
                .map(WorkOutcome::Routed),
            WorkItem::FetchPage(fetch) => {
                self.bulk.handle_page(&fetch).await.map(WorkOutcome::PageProcessed)
            }
            WorkItem::ProcessBatch(batch) => {
                self.bulk.handle_batch(&batch).await.map(WorkOutcome::BatchProcessed)
            }
        }
    }
}
