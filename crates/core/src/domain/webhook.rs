use std::fmt;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// External system on either side of the bridge.
///
/// Used both as the source of an inbound webhook and as the side a webhook
/// subscription is provisioned on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Telephony,
    Crm,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Telephony => "telephony",
            Self::Crm => "crm",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "telephony" | "openphone" => Some(Self::Telephony),
            "crm" => Some(Self::Crm),
            _ => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Family of events a webhook subscription delivers.
///
/// On the telephony side each kind owns its own signing key, so the kind is
/// also the bucket used to pick verification secrets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookKind {
    Calls,
    CallSummaries,
    CallTranscripts,
    Messages,
    Records,
}

impl WebhookKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Calls => "calls",
            Self::CallSummaries => "call_summaries",
            Self::CallTranscripts => "call_transcripts",
            Self::Messages => "messages",
            Self::Records => "records",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "calls" => Some(Self::Calls),
            "call_summaries" => Some(Self::CallSummaries),
            "call_transcripts" => Some(Self::CallTranscripts),
            "messages" => Some(Self::Messages),
            "records" => Some(Self::Records),
            _ => None,
        }
    }

    /// Buckets a telephony event type. Unknown types yield `None`; callers must
    /// not guess a default bucket.
    pub fn for_telephony_event(event_type: &str) -> Option<Self> {
        match event_type.trim() {
            "call.completed" | "call.ringing" | "call.recording.completed" => Some(Self::Calls),
            "call.summary.completed" => Some(Self::CallSummaries),
            "call.transcript.completed" => Some(Self::CallTranscripts),
            "message.received" | "message.delivered" => Some(Self::Messages),
            _ => None,
        }
    }

    /// Event types requested when subscribing for this kind.
    pub fn subscribed_events(&self) -> &'static [&'static str] {
        match self {
            Self::Calls => &["call.completed", "call.ringing", "call.recording.completed"],
            Self::CallSummaries => &["call.summary.completed"],
            Self::CallTranscripts => &["call.transcript.completed"],
            Self::Messages => &["message.received", "message.delivered"],
            Self::Records => &["record.created", "record.updated", "record.deleted", "record.merged"],
        }
    }
}

impl fmt::Display for WebhookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One remote webhook subscription. `key` is the signing secret handed out by
/// the remote system and is redacted from `Debug` output.
#[derive(Clone, Debug)]
pub struct WebhookDescriptor {
    pub id: String,
    pub kind: WebhookKind,
    pub key: SecretString,
    pub resource_ids: Vec<String>,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SideState {
    Empty,
    Partial,
    Complete,
}

/// A subscription that is no longer wanted but whose remote deletion has
/// not succeeded yet. Its key is not trusted for verification.
#[derive(Clone, Debug)]
pub struct RetiredWebhook {
    pub platform: Platform,
    pub descriptor: WebhookDescriptor,
}

/// Stored webhook descriptors for one integration instance.
#[derive(Clone, Debug, Default)]
pub struct WebhookConfig {
    pub telephony: Vec<WebhookDescriptor>,
    pub crm: Vec<WebhookDescriptor>,
    /// Retried on every setup and teardown until the remote delete succeeds.
    pub retired: Vec<RetiredWebhook>,
}

impl WebhookConfig {
    pub fn side(&self, platform: Platform) -> &[WebhookDescriptor] {
        match platform {
            Platform::Telephony => &self.telephony,
            Platform::Crm => &self.crm,
        }
    }

    pub fn side_mut(&mut self, platform: Platform) -> &mut Vec<WebhookDescriptor> {
        match platform {
            Platform::Telephony => &mut self.telephony,
            Platform::Crm => &mut self.crm,
        }
    }

    /// A side is complete only when every required kind has a descriptor.
    pub fn side_state(&self, platform: Platform, required: &[WebhookKind]) -> SideState {
        let descriptors = self.side(platform);
        if descriptors.is_empty() {
            return SideState::Empty;
        }
        let complete = required
            .iter()
            .all(|kind| descriptors.iter().any(|descriptor| descriptor.kind == *kind));
        if complete {
            SideState::Complete
        } else {
            SideState::Partial
        }
    }

    pub fn retire(&mut self, platform: Platform, descriptors: Vec<WebhookDescriptor>) {
        self.retired.extend(
            descriptors.into_iter().map(|descriptor| RetiredWebhook { platform, descriptor }),
        );
    }

    pub fn is_empty(&self) -> bool {
        self.telephony.is_empty() && self.crm.is_empty() && self.retired.is_empty()
    }
}
