pub mod bulk;
pub mod contacts;
pub mod enrichment;
pub mod registration;
pub mod router;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use bulk::{BulkSyncCoordinator, BulkSyncStart, PageOutcome};
pub use contacts::ContactSyncer;
pub use enrichment::{CallEnrichmentWorkflow, EnrichmentOutcome};
pub use registration::{
    RegistrationError, RegistrationSettings, RegistrationState, SetupReport, SetupStatus,
    WebhookRegistrationManager,
};
pub use router::{EventRouter, ObjectTypeCache, ProcessingResult};
pub use worker::{WorkDispatcher, WorkOutcome};
