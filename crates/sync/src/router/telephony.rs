use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use callbridge_core::domain::call::{Call, CallInsights, Direction, Message, TranscriptLine};
use callbridge_core::domain::contact::CrmPerson;
use callbridge_core::domain::mapping::{CorrelationKey, MappingAction, MappingRecord, SyncMethod};
use callbridge_core::domain::note::NoteDraft;
use callbridge_core::errors::SyncError;

use super::{EventRouter, ProcessingResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryObject {
    call_id: String,
    #[serde(default)]
    summary: Vec<String>,
    #[serde(default)]
    next_steps: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranscriptObject {
    call_id: String,
    #[serde(default)]
    dialogue: Vec<TranscriptLine>,
}

/// Telephony webhooks wrap the resource as `data.object`.
fn event_object<T: for<'de> Deserialize<'de>>(event: &Value) -> Result<T, SyncError> {
    let object = event
        .get("data")
        .and_then(|data| data.get("object"))
        .cloned()
        .ok_or_else(|| SyncError::InvalidEvent("telephony event has no data.object".to_string()))?;
    serde_json::from_value(object)
        .map_err(|error| SyncError::InvalidEvent(format!("unexpected telephony payload: {error}")))
}

impl EventRouter {
    pub(super) async fn route_telephony(
        &self,
        integration_id: &str,
        event_type: &str,
        event: &Value,
    ) -> Result<ProcessingResult, SyncError> {
        match event_type {
            "call.completed" => {
                let call: Call = event_object(event)?;
                self.enrichment.record_completed_call(integration_id, &call).await
            }
            "call.recording.completed" => {
                let call: Call = event_object(event)?;
                self.enrich(integration_id, &call.id, CallInsights::default()).await
            }
            "call.summary.completed" => {
                let summary: SummaryObject = event_object(event)?;
                let insights = CallInsights {
                    summary: summary.summary,
                    next_steps: summary.next_steps,
                    transcript: Vec::new(),
                };
                self.enrich(integration_id, &summary.call_id, insights).await
            }
            "call.transcript.completed" => {
                let transcript: TranscriptObject = event_object(event)?;
                let insights = CallInsights { transcript: transcript.dialogue, ..CallInsights::default() };
                self.enrich(integration_id, &transcript.call_id, insights).await
            }
            "message.received" | "message.delivered" => {
                let message: Message = event_object(event)?;
                self.log_message(integration_id, &message).await
            }
            "call.ringing" => Ok(ProcessingResult::skipped("ringing calls are not synced")),
            other => Ok(ProcessingResult::skipped(format!("unhandled telephony event `{other}`"))),
        }
    }

    async fn enrich(
        &self,
        integration_id: &str,
        call_id: &str,
        insights: CallInsights,
    ) -> Result<ProcessingResult, SyncError> {
        match self.enrichment.enrich_call_note(integration_id, call_id, insights).await? {
            Some(outcome) => Ok(ProcessingResult::Synced {
                action: MappingAction::NoteEnriched,
                record_id: outcome.note_id,
            }),
            None => Ok(ProcessingResult::skipped("no CRM person matches the call participant")),
        }
    }

    /// Logs a text message as a CRM note on the matched person, once per
    /// message ID.
    async fn log_message(
        &self,
        integration_id: &str,
        message: &Message,
    ) -> Result<ProcessingResult, SyncError> {
        let key = CorrelationKey::message(&message.id);
        if self.mappings.get(integration_id, &key).await?.is_some() {
            return Ok(ProcessingResult::skipped("message already logged"));
        }

        let Some(number) = message.counterpart_number() else {
            return Ok(ProcessingResult::skipped("message has no counterpart number"));
        };
        let Some(record) = self.crm.find_person_by_phone(number).await?.into_inner() else {
            return Ok(ProcessingResult::skipped("no CRM person matches the message participant"));
        };

        let person = CrmPerson::from_record(&record);
        let title = match message.direction {
            Direction::Incoming => format!("Text from {}", person.display_name()),
            Direction::Outgoing => format!("Text to {}", person.display_name()),
        };
        let mut content = format!(
            "**{}** {number}\n\n{}",
            if message.direction == Direction::Incoming { "From" } else { "To" },
            message.text.as_deref().unwrap_or("(no text)")
        );
        if let Some(sent_at) = message.created_at {
            content.push_str(&format!("\n\n_{}_", sent_at.format("%Y-%m-%d %H:%M UTC")));
        }

        let note = self
            .crm
            .create_note(&NoteDraft { parent_record_id: record.id.clone(), title, content })
            .await?
            .into_inner();

        let mapping = MappingRecord::new(&record.id, SyncMethod::Webhook, MappingAction::MessageLogged)
            .with_note(&note.id)
            .with_extra(json!({ "phone_number_id": message.phone_number_id }));
        self.mappings.upsert(integration_id, &key, mapping).await?;

        info!(
            event_name = "sync.router.message_logged",
            integration_id,
            message_id = %message.id,
            note_id = %note.id,
            "message logged to CRM"
        );
        Ok(ProcessingResult::Synced { action: MappingAction::MessageLogged, record_id: note.id })
    }
}
