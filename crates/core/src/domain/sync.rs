use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::mapping::SyncMethod;
use crate::domain::webhook::Platform;

/// Position in a paginated CRM listing. An absent cursor (`None` wherever an
/// `Option<PageCursor>` appears) means there are no further pages.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageCursor {
    /// Zero-based page index for offset-paged CRMs.
    Page(u32),
    /// Opaque continuation token for cursor-paged CRMs.
    Token(String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Query passed to `CrmClient::list_records`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListQuery {
    pub cursor: Option<PageCursor>,
    pub limit: u32,
    pub modified_since: Option<DateTime<Utc>>,
    pub sort: SortOrder,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPage<T> {
    pub records: Vec<T>,
    pub next: Option<PageCursor>,
    pub total_pages: Option<u32>,
}

/// Work item asking a worker to fetch and process one page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageFetch {
    pub integration_id: String,
    pub job_id: String,
    pub object_type: String,
    pub cursor: PageCursor,
    pub limit: u32,
    pub modified_since: Option<DateTime<Utc>>,
    pub sort: SortOrder,
    pub sync_method: SyncMethod,
}

impl PageFetch {
    pub fn list_query(&self) -> ListQuery {
        ListQuery {
            cursor: Some(self.cursor.clone()),
            limit: self.limit,
            modified_since: self.modified_since,
            sort: self.sort,
        }
    }
}

/// Already-fetched records to process without another remote listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordBatch {
    pub integration_id: String,
    pub job_id: String,
    pub object_type: String,
    pub records: Vec<Value>,
    pub total_in_page: usize,
    pub is_webhook: bool,
    pub sync_method: SyncMethod,
}

/// Loosely shaped batch as handed over by ad-hoc producers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBatch {
    pub integration_id: String,
    #[serde(default)]
    pub job_id: Option<String>,
    pub object_type: String,
    #[serde(default)]
    pub records: Vec<Value>,
    #[serde(default)]
    pub total_in_page: Option<usize>,
    #[serde(default)]
    pub is_webhook: Option<bool>,
    #[serde(default)]
    pub sync_method: Option<SyncMethod>,
}

/// Verified inbound webhook waiting to be routed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundWebhook {
    pub integration_id: String,
    pub source: Platform,
    pub event: Value,
    pub received_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkItem {
    FetchPage(PageFetch),
    ProcessBatch(RecordBatch),
    ProcessWebhook(InboundWebhook),
}

impl WorkItem {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FetchPage(_) => "fetch_page",
            Self::ProcessBatch(_) => "process_batch",
            Self::ProcessWebhook(_) => "process_webhook",
        }
    }
}
