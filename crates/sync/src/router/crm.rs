use serde_json::Value;
use tracing::debug;

use callbridge_core::domain::contact::{CrmPerson, CrmRecord, ObjectKind};
use callbridge_core::domain::mapping::SyncMethod;
use callbridge_core::errors::{ClientError, SyncError};

use super::{EventRouter, ProcessingResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CrmAction {
    Created,
    Updated,
    Merged,
    Deleted,
}

impl CrmAction {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "created" | "create" | "added" => Some(Self::Created),
            "updated" | "update" | "changed" => Some(Self::Updated),
            "merged" | "merge" => Some(Self::Merged),
            "deleted" | "delete" | "removed" => Some(Self::Deleted),
            _ => None,
        }
    }
}

/// Splits `action.object` or `object.action` into its parts.
fn split_event_type(event_type: &str) -> Option<(CrmAction, &str)> {
    let (left, right) = event_type.split_once('.')?;
    if let Some(action) = CrmAction::parse(left) {
        return Some((action, right));
    }
    CrmAction::parse(right).map(|action| (action, left))
}

fn is_generic_object(object: &str) -> bool {
    matches!(object.trim().to_ascii_lowercase().as_str(), "record" | "records" | "object")
}

fn text_field<'a>(event: &'a Value, paths: &[&[&str]]) -> Option<&'a str> {
    paths.iter().find_map(|path| {
        path.iter()
            .try_fold(event, |value, key| value.get(*key))
            .and_then(Value::as_str)
            .filter(|value| !value.trim().is_empty())
    })
}

fn record_id(event: &Value) -> Option<&str> {
    text_field(event, &[&["record_id"], &["id", "record_id"], &["data", "id"], &["id"]])
}

fn object_id(event: &Value) -> Option<&str> {
    text_field(event, &[&["object_id"], &["id", "object_id"], &["data", "object_id"]])
}

fn merged_away_id(event: &Value) -> Option<&str> {
    text_field(
        event,
        &[&["merged_record_id"], &["duplicate_record_id"], &["id", "merged_record_id"]],
    )
}

fn payload_attributes(event: &Value) -> Option<&Value> {
    ["record", "values", "attributes"]
        .iter()
        .find_map(|key| event.get(*key))
        .or_else(|| event.get("data").and_then(|data| data.get("values")))
        .filter(|value| value.is_object())
}

impl EventRouter {
    pub(super) async fn route_crm(
        &self,
        integration_id: &str,
        event_type: &str,
        event: &Value,
    ) -> Result<ProcessingResult, SyncError> {
        let Some((action, object)) = split_event_type(event_type) else {
            return Ok(ProcessingResult::skipped(format!("unrecognized CRM event `{event_type}`")));
        };

        let kind = if is_generic_object(object) {
            let Some(object_id) = object_id(event) else {
                return Ok(ProcessingResult::skipped("CRM event names no object type"));
            };
            self.object_types.resolve(object_id, self.crm.as_ref()).await?
        } else {
            ObjectKind::parse(object)
        };

        if kind != ObjectKind::Person {
            return Ok(ProcessingResult::skipped(format!(
                "CRM object `{}` is not synced",
                kind.as_str()
            )));
        }

        let record_id = record_id(event)
            .ok_or_else(|| SyncError::InvalidEvent("CRM event carries no record id".to_string()))?;

        match action {
            CrmAction::Created | CrmAction::Updated => {
                self.sync_person(integration_id, record_id, event, false).await
            }
            CrmAction::Merged => {
                let result = self.sync_person(integration_id, record_id, event, true).await?;
                if let Some(merged_away) = merged_away_id(event).filter(|id| *id != record_id) {
                    self.contacts.remove_person(integration_id, merged_away).await?;
                }
                Ok(result)
            }
            CrmAction::Deleted => self.contacts.remove_person(integration_id, record_id).await,
        }
    }

    /// Loads authoritative person state. A record that is already gone falls
    /// back to the payload when the webhook carried one.
    async fn sync_person(
        &self,
        integration_id: &str,
        record_id: &str,
        event: &Value,
        merged: bool,
    ) -> Result<ProcessingResult, SyncError> {
        let record = match self.crm.get_record(&ObjectKind::Person, record_id).await {
            Ok(record) => record.into_inner(),
            Err(ClientError::NotFound { .. }) => match payload_attributes(event) {
                Some(attributes) => {
                    debug!(
                        event_name = "sync.router.payload_fallback",
                        integration_id,
                        record_id,
                        "person not found remotely, using webhook payload"
                    );
                    CrmRecord {
                        id: record_id.to_string(),
                        kind: ObjectKind::Person,
                        attributes: attributes.clone(),
                        updated_at: None,
                    }
                }
                None => return Ok(ProcessingResult::skipped("person no longer exists")),
            },
            Err(error) => return Err(error.into()),
        };

        let person = CrmPerson::from_record(&record);
        self.contacts.push_person(integration_id, &person, SyncMethod::Webhook, merged).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use serde_json::json;

    use callbridge_core::domain::contact::ObjectKind;
    use callbridge_core::domain::mapping::{CorrelationKey, MappingAction, SyncMethod};
    use callbridge_core::domain::note::NoteStrategy;
    use callbridge_core::domain::webhook::Platform;
    use callbridge_core::ports::NoopAnalytics;
    use callbridge_db::{InMemoryMappingRepository, MappingRepository};

    use super::{split_event_type, CrmAction};
    use crate::router::{EventRouter, ProcessingResult};
    use crate::testing::{FakeCrm, FakeTelephony};

    struct Harness {
        crm: Arc<FakeCrm>,
        telephony: Arc<FakeTelephony>,
        mappings: Arc<InMemoryMappingRepository>,
        router: EventRouter,
    }

    fn harness(crm: FakeCrm) -> Harness {
        let crm = Arc::new(crm);
        let telephony = Arc::new(FakeTelephony::default());
        let mappings = Arc::new(InMemoryMappingRepository::default());
        let router = EventRouter::new(
            crm.clone(),
            telephony.clone(),
            mappings.clone(),
            Arc::new(NoopAnalytics),
            "https://my.openphone.com/inbox",
        );
        Harness { crm, telephony, mappings, router }
    }

    fn ada() -> FakeCrm {
        FakeCrm::new(NoteStrategy::UpdateInPlace).with_person(
            "rec-1",
            json!({"name": "Ada Lovelace", "phone_numbers": ["+15550001111"]}),
        )
    }

    #[test]
    fn compound_types_split_in_either_order() {
        assert_eq!(split_event_type("updated.person"), Some((CrmAction::Updated, "person")));
        assert_eq!(split_event_type("record.merged"), Some((CrmAction::Merged, "record")));
        assert_eq!(split_event_type("person"), None);
        assert_eq!(split_event_type("archived.person"), None);
    }

    #[tokio::test]
    async fn person_update_syncs_contact_with_webhook_mapping() {
        let h = harness(ada());

        let result = h
            .router
            .route("int-1", Platform::Crm, &json!({"type": "updated.person", "record_id": "rec-1"}))
            .await
            .expect("route");

        assert!(matches!(result, ProcessingResult::Synced { action: MappingAction::Created, .. }));
        let mapping = h
            .mappings
            .get("int-1", &CorrelationKey::person("rec-1"))
            .await
            .expect("get")
            .expect("mapping");
        assert_eq!(mapping.sync_method, SyncMethod::Webhook);
        assert!(h.crm.operations().contains(&"get_record:rec-1".to_string()));
    }

    #[tokio::test]
    async fn unknown_objects_are_skipped() {
        let h = harness(ada());

        let result = h
            .router
            .route("int-1", Platform::Crm, &json!({"type": "updated.deal", "record_id": "deal-1"}))
            .await
            .expect("route");

        assert!(result.is_skipped());
        assert!(h.crm.operations().is_empty());
    }

    #[tokio::test]
    async fn generic_records_resolve_object_type_through_the_cache() {
        let h = harness(ada().with_object_kind("obj-people", ObjectKind::Person));
        let event = json!({
            "type": "record.updated",
            "id": {"object_id": "obj-people", "record_id": "rec-1"}
        });

        h.router.route("int-1", Platform::Crm, &event).await.expect("first");
        let second = h.router.route("int-1", Platform::Crm, &event).await.expect("second");

        assert!(matches!(second, ProcessingResult::Synced { action: MappingAction::Updated, .. }));
        assert_eq!(h.crm.resolve_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.router.object_types().len().await, 1);
    }

    #[tokio::test]
    async fn missing_record_falls_back_to_payload() {
        let h = harness(FakeCrm::new(NoteStrategy::UpdateInPlace));
        let event = json!({
            "type": "created.person",
            "record_id": "rec-7",
            "record": {"name": "Grace Hopper", "phone_numbers": ["+15550007777"]}
        });

        let result = h.router.route("int-1", Platform::Crm, &event).await.expect("route");

        assert!(matches!(result, ProcessingResult::Synced { .. }));
        let contacts = h.telephony.contacts.lock().expect("contacts");
        let contact = contacts.values().next().expect("contact");
        assert_eq!(contact.first_name.as_deref(), Some("Grace"));
        assert_eq!(contact.external_id, "rec-7");
    }

    #[tokio::test]
    async fn missing_record_without_payload_is_skipped() {
        let h = harness(FakeCrm::new(NoteStrategy::UpdateInPlace));

        let result = h
            .router
            .route("int-1", Platform::Crm, &json!({"type": "updated.person", "record_id": "rec-8"}))
            .await
            .expect("route");

        assert!(result.is_skipped());
    }

    #[tokio::test]
    async fn downstream_failures_propagate_for_retry() {
        let h = harness(ada());
        h.crm.fail_get_record.store(true, Ordering::SeqCst);

        let error = h
            .router
            .route("int-1", Platform::Crm, &json!({"type": "updated.person", "record_id": "rec-1"}))
            .await
            .expect_err("downstream failure");

        assert!(error.is_retryable());
        assert!(h.mappings.is_empty().await);
    }

    #[tokio::test]
    async fn delete_removes_contact_and_mapping_without_fetching() {
        let h = harness(ada());
        h.router
            .route("int-1", Platform::Crm, &json!({"type": "created.person", "record_id": "rec-1"}))
            .await
            .expect("create");

        let result = h
            .router
            .route("int-1", Platform::Crm, &json!({"type": "deleted.person", "record_id": "rec-1"}))
            .await
            .expect("delete");

        assert_eq!(result, ProcessingResult::Removed { record_id: "contact-1".to_string() });
        assert!(h.mappings.is_empty().await);
        assert_eq!(
            h.crm.operations().iter().filter(|op| op.starts_with("get_record")).count(),
            1
        );
    }

    #[tokio::test]
    async fn merge_updates_survivor_and_removes_merged_away_mapping() {
        let h = harness(ada().with_person(
            "rec-2",
            json!({"name": "Ada L.", "phone_numbers": ["+15550002222"]}),
        ));
        for id in ["rec-1", "rec-2"] {
            h.router
                .route("int-1", Platform::Crm, &json!({"type": "created.person", "record_id": id}))
                .await
                .expect("seed");
        }

        let result = h
            .router
            .route(
                "int-1",
                Platform::Crm,
                &json!({"type": "merged.person", "record_id": "rec-1", "merged_record_id": "rec-2"}),
            )
            .await
            .expect("merge");

        assert!(matches!(result, ProcessingResult::Synced { action: MappingAction::Merged, .. }));
        assert!(h
            .mappings
            .get("int-1", &CorrelationKey::person("rec-2"))
            .await
            .expect("get")
            .is_none());
        assert_eq!(h.mappings.len().await, 1);
        assert_eq!(h.telephony.contacts.lock().expect("contacts").len(), 1);
    }
}
