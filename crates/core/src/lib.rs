pub mod config;
pub mod domain;
pub mod errors;
pub mod fanout;
pub mod ports;
pub mod signature;

pub use domain::mapping::{CorrelationKey, MappingAction, MappingRecord, SyncMethod};
pub use domain::webhook::{Platform, WebhookConfig, WebhookDescriptor, WebhookKind};
pub use errors::{AuthError, ClientError, InterfaceError, SyncError};
pub use fanout::{plan_batches, plan_next_cursor, plan_pages, PageTemplate};
pub use signature::{CrmSignatureVerifier, SignatureVerifier, VerifiedSignature};
