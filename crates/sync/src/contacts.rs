//! Pushes CRM people to the telephony contact book and keeps the
//! `person:<id>` mappings current.

use std::sync::Arc;

use tracing::{debug, warn};

use callbridge_core::domain::contact::{ContactDraft, CrmPerson};
use callbridge_core::domain::mapping::{CorrelationKey, MappingAction, MappingRecord, SyncMethod};
use callbridge_core::errors::{ClientError, SyncError};
use callbridge_core::ports::{ContactQuery, TelephonyClient};
use callbridge_db::MappingRepository;

use crate::router::ProcessingResult;

pub struct ContactSyncer {
    telephony: Arc<dyn TelephonyClient>,
    mappings: Arc<dyn MappingRepository>,
}

impl ContactSyncer {
    pub fn new(telephony: Arc<dyn TelephonyClient>, mappings: Arc<dyn MappingRepository>) -> Self {
        Self { telephony, mappings }
    }

    /// Creates or updates the telephony contact for `person`.
    ///
    /// Without a mapping, a contact already tagged with the person's ID is
    /// adopted instead of creating a duplicate.
    pub async fn push_person(
        &self,
        integration_id: &str,
        person: &CrmPerson,
        sync_method: SyncMethod,
        merged: bool,
    ) -> Result<ProcessingResult, SyncError> {
        if !person.has_contact_channel() {
            debug!(
                event_name = "sync.contacts.skipped",
                integration_id,
                record_id = %person.id,
                "person has neither phone number nor email"
            );
            return Ok(ProcessingResult::skipped("person has no phone number or email"));
        }

        let key = CorrelationKey::person(&person.id);
        let draft = ContactDraft::from(person);
        let existing = match self.mappings.get(integration_id, &key).await? {
            Some(mapping) => Some(mapping.external_id),
            None => self.find_tagged_contact(&person.id).await?,
        };

        let (contact_id, action) = match existing {
            Some(contact_id) => match self.telephony.update_contact(&contact_id, &draft).await {
                Ok(updated) => (updated.into_inner().id, MappingAction::Updated),
                Err(ClientError::NotFound { .. }) => {
                    warn!(
                        event_name = "sync.contacts.stale_mapping",
                        integration_id,
                        record_id = %person.id,
                        contact_id = %contact_id,
                        "mapped contact no longer exists, recreating"
                    );
                    let created = self.telephony.create_contact(&draft).await?.into_inner();
                    (created.id, MappingAction::Created)
                }
                Err(error) => return Err(error.into()),
            },
            None => {
                let created = self.telephony.create_contact(&draft).await?.into_inner();
                (created.id, MappingAction::Created)
            }
        };
        let action = if merged { MappingAction::Merged } else { action };

        self.mappings
            .upsert(integration_id, &key, MappingRecord::new(&contact_id, sync_method, action))
            .await?;

        Ok(ProcessingResult::Synced { action, record_id: contact_id })
    }

    /// Deletes the counterpart contact and the mapping. An already missing
    /// contact still clears the mapping.
    pub async fn remove_person(
        &self,
        integration_id: &str,
        record_id: &str,
    ) -> Result<ProcessingResult, SyncError> {
        let key = CorrelationKey::person(record_id);
        let Some(mapping) = self.mappings.get(integration_id, &key).await? else {
            return Ok(ProcessingResult::skipped("person has no mapped contact"));
        };

        match self.telephony.delete_contact(&mapping.external_id).await {
            Ok(()) | Err(ClientError::NotFound { .. }) => {}
            Err(error) => return Err(error.into()),
        }
        self.mappings.delete(integration_id, &key).await?;

        Ok(ProcessingResult::Removed { record_id: mapping.external_id })
    }

    async fn find_tagged_contact(&self, record_id: &str) -> Result<Option<String>, SyncError> {
        let query =
            ContactQuery { external_ids: vec![record_id.to_string()], page_token: None, limit: 1 };
        let contacts = self.telephony.list_contacts(&query).await?.into_inner();
        Ok(contacts.into_iter().next().map(|contact| contact.id))
    }
}
