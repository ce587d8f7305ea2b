use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier used to look up a [`MappingRecord`].
///
/// Keys are namespaced by entity family so that a telephony call ID can never
/// collide with a CRM record ID that happens to share the same string.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationKey(pub String);

impl CorrelationKey {
    pub fn call(call_id: &str) -> Self {
        Self(format!("call:{call_id}"))
    }

    pub fn message(message_id: &str) -> Self {
        Self(format!("message:{message_id}"))
    }

    pub fn person(record_id: &str) -> Self {
        Self(format!("person:{record_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMethod {
    Webhook,
    Poll,
    Backfill,
}

impl SyncMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Webhook => "webhook",
            Self::Poll => "poll",
            Self::Backfill => "backfill",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "webhook" => Some(Self::Webhook),
            "poll" => Some(Self::Poll),
            "backfill" => Some(Self::Backfill),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingAction {
    Created,
    Updated,
    Merged,
    NoteCreated,
    NoteEnriched,
    MessageLogged,
}

impl MappingAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Merged => "merged",
            Self::NoteCreated => "note_created",
            Self::NoteEnriched => "note_enriched",
            Self::MessageLogged => "message_logged",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "created" => Some(Self::Created),
            "updated" => Some(Self::Updated),
            "merged" => Some(Self::Merged),
            "note_created" => Some(Self::NoteCreated),
            "note_enriched" => Some(Self::NoteEnriched),
            "message_logged" => Some(Self::MessageLogged),
            _ => None,
        }
    }
}

/// Link between an entity in one system and its counterpart in the other.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRecord {
    pub external_id: String,
    pub note_id: Option<String>,
    pub last_synced_at: DateTime<Utc>,
    pub sync_method: SyncMethod,
    pub action: MappingAction,
    pub enriched_at: Option<DateTime<Utc>>,
    pub extra: Value,
}

impl MappingRecord {
    pub fn new(
        external_id: impl Into<String>,
        sync_method: SyncMethod,
        action: MappingAction,
    ) -> Self {
        Self {
            external_id: external_id.into(),
            note_id: None,
            last_synced_at: Utc::now(),
            sync_method,
            action,
            enriched_at: None,
            extra: Value::Null,
        }
    }

    pub fn with_note(mut self, note_id: impl Into<String>) -> Self {
        self.note_id = Some(note_id.into());
        self
    }

    pub fn with_extra(mut self, extra: Value) -> Self {
        self.extra = extra;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{CorrelationKey, MappingAction, SyncMethod};

    #[test]
    fn sync_method_round_trips_from_storage_encoding() {
        for method in [SyncMethod::Webhook, SyncMethod::Poll, SyncMethod::Backfill] {
            assert_eq!(SyncMethod::parse(method.as_str()), Some(method));
        }
    }

    #[test]
    fn mapping_action_round_trips_from_storage_encoding() {
        let cases = [
            MappingAction::Created,
            MappingAction::Updated,
            MappingAction::Merged,
            MappingAction::NoteCreated,
            MappingAction::NoteEnriched,
            MappingAction::MessageLogged,
        ];

        for action in cases {
            assert_eq!(MappingAction::parse(action.as_str()), Some(action));
        }
    }

    #[test]
    fn correlation_keys_are_namespaced_per_entity_family() {
        assert_ne!(CorrelationKey::call("42"), CorrelationKey::message("42"));
        assert_eq!(CorrelationKey::person("rec-1").as_str(), "person:rec-1");
    }
}
