//! Three-phase call note workflow.
//!
//! Phase 1 writes an initial note as soon as a call completes. Phase 2 gathers
//! recordings, voicemail and AI insights once they become available, and
//! Phase 3 reconciles the enriched content with the note written in Phase 1
//! using the CRM's [`NoteStrategy`].

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use callbridge_core::domain::call::{Call, CallInsights, Direction, Recording, Voicemail};
use callbridge_core::domain::contact::{CrmPerson, CrmRecord};
use callbridge_core::domain::mapping::{CorrelationKey, MappingAction, MappingRecord, SyncMethod};
use callbridge_core::domain::note::{NoteDraft, NoteStrategy};
use callbridge_core::errors::{ClientError, SyncError};
use callbridge_core::ports::{CrmClient, TelephonyClient};
use callbridge_db::MappingRepository;

use crate::router::ProcessingResult;

/// Result of Phases 2 and 3 for one call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnrichmentOutcome {
    pub note_id: String,
    pub old_note_id: Option<String>,
    pub recordings_count: usize,
    pub has_voicemail: bool,
}

/// Line and agent details shown in the note header. Both are best-effort.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct CallContext {
    line: Option<String>,
    agent: Option<String>,
}

pub struct CallEnrichmentWorkflow {
    crm: Arc<dyn CrmClient>,
    telephony: Arc<dyn TelephonyClient>,
    mappings: Arc<dyn MappingRepository>,
    strategy: NoteStrategy,
    inbox_base_url: String,
}

impl CallEnrichmentWorkflow {
    pub fn new(
        crm: Arc<dyn CrmClient>,
        telephony: Arc<dyn TelephonyClient>,
        mappings: Arc<dyn MappingRepository>,
        inbox_base_url: impl Into<String>,
    ) -> Self {
        let strategy = crm.note_strategy();
        Self { crm, telephony, mappings, strategy, inbox_base_url: inbox_base_url.into() }
    }

    /// Phase 1. Replays of the same call are skipped by the mapping lookup.
    pub async fn record_completed_call(
        &self,
        integration_id: &str,
        call: &Call,
    ) -> Result<ProcessingResult, SyncError> {
        let key = CorrelationKey::call(&call.id);
        if let Some(existing) = self.mappings.get(integration_id, &key).await? {
            debug!(
                event_name = "sync.enrichment.phase1_replay",
                integration_id,
                call_id = %call.id,
                note_id = existing.note_id.as_deref().unwrap_or("none"),
                "call already recorded"
            );
            return Ok(ProcessingResult::skipped("call already recorded"));
        }

        let Some(person) = self.match_person(call).await? else {
            return Ok(ProcessingResult::skipped("no CRM person matches the call participant"));
        };

        let context = self.call_context(call).await;
        let draft = NoteDraft {
            parent_record_id: person.id.clone(),
            title: note_title(call, &CrmPerson::from_record(&person)),
            content: initial_content(call, &context, &self.deep_link(call)),
        };
        let note = self.crm.create_note(&draft).await?.into_inner();

        let record = MappingRecord::new(&person.id, SyncMethod::Webhook, MappingAction::NoteCreated)
            .with_note(&note.id)
            .with_extra(json!({ "call": call }));
        self.mappings.upsert(integration_id, &key, record).await?;

        info!(
            event_name = "sync.enrichment.note_created",
            integration_id,
            call_id = %call.id,
            note_id = %note.id,
            "initial call note created"
        );
        Ok(ProcessingResult::Synced { action: MappingAction::NoteCreated, record_id: note.id })
    }

    /// Phases 2 and 3. Insights from earlier enrichment runs are kept, so a
    /// transcript arriving after the summary does not drop the summary.
    ///
    /// Returns `Ok(None)` when no CRM person matches the call.
    pub async fn enrich_call_note(
        &self,
        integration_id: &str,
        call_id: &str,
        insights: CallInsights,
    ) -> Result<Option<EnrichmentOutcome>, SyncError> {
        let key = CorrelationKey::call(call_id);
        let mapping = self.mappings.get(integration_id, &key).await?;

        let (call, parent_record_id, mut stored) = match &mapping {
            Some(mapping) => {
                let call = match stored_call(&mapping.extra) {
                    Some(call) => call,
                    None => self.telephony.get_call(call_id).await?.into_inner(),
                };
                (call, mapping.external_id.clone(), stored_insights(&mapping.extra))
            }
            None => {
                debug!(
                    event_name = "sync.enrichment.phase2_before_phase1",
                    integration_id,
                    call_id,
                    "no initial note yet, fetching call on demand"
                );
                let call = self.telephony.get_call(call_id).await?.into_inner();
                let Some(person) = self.match_person(&call).await? else {
                    return Ok(None);
                };
                (call, person.id, CallInsights::default())
            }
        };
        merge_insights(&mut stored, insights);

        let (recordings, voicemail, context) = tokio::join!(
            self.telephony.get_call_recordings(call_id),
            self.telephony.get_call_voicemails(call_id),
            self.call_context(&call),
        );
        let recordings = recordings.map(|data| data.into_inner()).unwrap_or_else(|error| {
            warn!(
                event_name = "sync.enrichment.recordings_unavailable",
                integration_id,
                call_id,
                error = %error,
                "continuing without recordings"
            );
            Vec::new()
        });
        let voicemail = voicemail.map(|data| data.into_inner()).unwrap_or_else(|error| {
            warn!(
                event_name = "sync.enrichment.voicemail_unavailable",
                integration_id,
                call_id,
                error = %error,
                "continuing without voicemail"
            );
            None
        });

        let draft = NoteDraft {
            parent_record_id: parent_record_id.clone(),
            title: enriched_title(&call),
            content: enriched_content(
                &call,
                &context,
                &recordings,
                voicemail.as_ref(),
                &stored,
                &self.deep_link(&call),
            ),
        };

        let old_note_id = mapping.as_ref().and_then(|mapping| mapping.note_id.clone());
        let extra = json!({ "call": call, "insights": stored });
        let note_id = self
            .reconcile_note(integration_id, &key, &parent_record_id, old_note_id.as_deref(), &draft, extra)
            .await?;

        info!(
            event_name = "sync.enrichment.note_enriched",
            integration_id,
            call_id,
            note_id = %note_id,
            strategy = self.strategy.as_str(),
            recordings = recordings.len(),
            has_voicemail = voicemail.is_some(),
            "call note enriched"
        );

        Ok(Some(EnrichmentOutcome {
            note_id,
            old_note_id,
            recordings_count: recordings.len(),
            has_voicemail: voicemail.is_some(),
        }))
    }

    /// Phase 3. The mapping always ends up pointing at the surviving note;
    /// with `CreateThenDelete` it is written before the old note is deleted.
    async fn reconcile_note(
        &self,
        integration_id: &str,
        key: &CorrelationKey,
        parent_record_id: &str,
        old_note_id: Option<&str>,
        draft: &NoteDraft,
        extra: Value,
    ) -> Result<String, SyncError> {
        let note_id = match (self.strategy, old_note_id) {
            (NoteStrategy::UpdateInPlace, Some(old_note_id)) => {
                match self.crm.update_note(old_note_id, draft).await {
                    Ok(note) => note.into_inner().id,
                    Err(ClientError::NotFound { .. }) => {
                        self.crm.create_note(draft).await?.into_inner().id
                    }
                    Err(error) => return Err(error.into()),
                }
            }
            _ => self.crm.create_note(draft).await?.into_inner().id,
        };

        let mut record =
            MappingRecord::new(parent_record_id, SyncMethod::Webhook, MappingAction::NoteEnriched)
                .with_note(&note_id)
                .with_extra(extra);
        record.enriched_at = Some(Utc::now());
        self.mappings.upsert(integration_id, key, record).await?;

        if let (NoteStrategy::CreateThenDelete, Some(old_note_id)) = (self.strategy, old_note_id) {
            if old_note_id != note_id {
                if let Err(error) = self.crm.delete_note(old_note_id).await {
                    warn!(
                        event_name = "sync.enrichment.old_note_delete_failed",
                        integration_id,
                        note_id = %note_id,
                        old_note_id,
                        error = %error,
                        "replacement note kept, previous note left in place"
                    );
                }
            }
        }

        Ok(note_id)
    }

    async fn match_person(&self, call: &Call) -> Result<Option<CrmRecord>, SyncError> {
        let Some(number) = call.counterpart_number() else {
            return Ok(None);
        };
        Ok(self.crm.find_person_by_phone(number).await?.into_inner())
    }

    async fn call_context(&self, call: &Call) -> CallContext {
        let line = self.telephony.get_phone_number(&call.phone_number_id);
        let agent = async {
            match &call.user_id {
                Some(user_id) => Some(self.telephony.get_user(user_id).await),
                None => None,
            }
        };
        let (line, agent) = tokio::join!(line, agent);

        CallContext {
            line: line.ok().map(|data| {
                let number = data.into_inner();
                match number.name {
                    Some(name) => format!("{name} ({})", number.number),
                    None => number.number,
                }
            }),
            agent: agent.and_then(Result::ok).map(|data| data.into_inner().display_name()),
        }
    }

    fn deep_link(&self, call: &Call) -> String {
        format!(
            "{}/{}/c/{}",
            self.inbox_base_url.trim_end_matches('/'),
            call.phone_number_id,
            call.id
        )
    }
}

fn stored_call(extra: &Value) -> Option<Call> {
    extra.get("call").cloned().and_then(|value| serde_json::from_value(value).ok())
}

fn stored_insights(extra: &Value) -> CallInsights {
    extra
        .get("insights")
        .cloned()
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or_default()
}

fn merge_insights(stored: &mut CallInsights, incoming: CallInsights) {
    if !incoming.summary.is_empty() {
        stored.summary = incoming.summary;
    }
    if !incoming.next_steps.is_empty() {
        stored.next_steps = incoming.next_steps;
    }
    if !incoming.transcript.is_empty() {
        stored.transcript = incoming.transcript;
    }
}

fn note_title(call: &Call, person: &CrmPerson) -> String {
    let name = person.display_name();
    if call.is_missed() {
        format!("Missed call from {name}")
    } else {
        match call.direction {
            Direction::Incoming => format!("Call from {name}"),
            Direction::Outgoing => format!("Call to {name}"),
        }
    }
}

fn enriched_title(call: &Call) -> String {
    let label = if call.is_missed() { "Missed call" } else { "Call" };
    match call.counterpart_number() {
        Some(number) => format!("{label} summary ({number})"),
        None => format!("{label} summary"),
    }
}

fn format_duration(seconds: u64) -> String {
    match (seconds / 60, seconds % 60) {
        (0, secs) => format!("{secs}s"),
        (mins, 0) => format!("{mins}m"),
        (mins, secs) => format!("{mins}m {secs}s"),
    }
}

fn header(call: &Call, context: &CallContext) -> String {
    let heading = if call.is_missed() {
        "Missed call".to_string()
    } else {
        format!("{} call", capitalize(call.direction.as_str()))
    };

    let mut lines = vec![format!("## {heading}"), String::new()];
    if let Some(from) = &call.from {
        lines.push(format!("- **From:** {from}"));
    }
    if let Some(to) = &call.to {
        lines.push(format!("- **To:** {to}"));
    }
    if let Some(line) = &context.line {
        lines.push(format!("- **Line:** {line}"));
    }
    if let Some(agent) = &context.agent {
        lines.push(format!("- **Handled by:** {agent}"));
    }
    if let Some(duration) = call.duration {
        lines.push(format!("- **Duration:** {}", format_duration(duration)));
    }
    if let Some(status) = &call.status {
        lines.push(format!("- **Status:** {status}"));
    }
    if let Some(completed_at) = call.completed_at.or(call.created_at) {
        lines.push(format!("- **When:** {}", completed_at.format("%Y-%m-%d %H:%M UTC")));
    }
    lines.join("\n")
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn initial_content(call: &Call, context: &CallContext, deep_link: &str) -> String {
    format!("{}\n\n[Open in inbox]({deep_link})\n", header(call, context))
}

fn enriched_content(
    call: &Call,
    context: &CallContext,
    recordings: &[Recording],
    voicemail: Option<&Voicemail>,
    insights: &CallInsights,
    deep_link: &str,
) -> String {
    let mut sections = vec![header(call, context)];

    let recording_lines: Vec<String> = recordings
        .iter()
        .enumerate()
        .filter_map(|(index, recording)| {
            recording.url.as_ref().map(|url| match recording.duration {
                Some(duration) => {
                    format!("- [Recording {}]({url}) ({})", index + 1, format_duration(duration))
                }
                None => format!("- [Recording {}]({url})", index + 1),
            })
        })
        .collect();
    if !recording_lines.is_empty() {
        sections.push(format!("### Recordings\n\n{}", recording_lines.join("\n")));
    }

    if let Some(voicemail) = voicemail {
        let mut body = Vec::new();
        if let Some(transcript) = voicemail.transcript.as_deref().filter(|text| !text.is_empty()) {
            body.push(format!("> {transcript}"));
        }
        if let Some(url) = &voicemail.url {
            body.push(format!("[Listen to voicemail]({url})"));
        }
        if !body.is_empty() {
            sections.push(format!("### Voicemail\n\n{}", body.join("\n\n")));
        }
    }

    if !insights.summary.is_empty() {
        sections.push(format!("### Summary\n\n{}", bullets(&insights.summary)));
    }
    if !insights.next_steps.is_empty() {
        sections.push(format!("### Next steps\n\n{}", bullets(&insights.next_steps)));
    }
    if !insights.transcript.is_empty() {
        let lines: Vec<String> = insights
            .transcript
            .iter()
            .map(|line| match &line.identifier {
                Some(speaker) => format!("**{speaker}:** {}", line.content),
                None => line.content.clone(),
            })
            .collect();
        sections.push(format!("### Transcript\n\n{}", lines.join("\n\n")));
    }

    sections.push(format!("[Open in inbox]({deep_link})"));
    format!("{}\n", sections.join("\n\n"))
}

fn bullets(items: &[String]) -> String {
    items.iter().map(|item| format!("- {item}")).collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use serde_json::json;

    use callbridge_core::domain::call::{Call, CallInsights, Direction, Recording, Voicemail};
    use callbridge_core::domain::mapping::{CorrelationKey, MappingAction};
    use callbridge_core::domain::note::NoteStrategy;
    use callbridge_db::{InMemoryMappingRepository, MappingRepository};

    use super::{format_duration, CallEnrichmentWorkflow};
    use crate::router::ProcessingResult;
    use crate::testing::{FakeCrm, FakeTelephony};

    const INBOX: &str = "https://my.openphone.com/inbox";

    fn call() -> Call {
        Call {
            id: "AC-1".to_string(),
            phone_number_id: "PN-1".to_string(),
            user_id: None,
            direction: Direction::Incoming,
            status: Some("completed".to_string()),
            from: Some("+15550001111".to_string()),
            to: Some("+15550009999".to_string()),
            participants: Vec::new(),
            duration: Some(192),
            created_at: None,
            completed_at: None,
        }
    }

    fn crm(strategy: NoteStrategy) -> Arc<FakeCrm> {
        Arc::new(FakeCrm::new(strategy).with_person(
            "person-1",
            json!({"name": "Ada Lovelace", "phone_numbers": ["+15550001111"]}),
        ))
    }

    struct Harness {
        crm: Arc<FakeCrm>,
        telephony: Arc<FakeTelephony>,
        mappings: Arc<InMemoryMappingRepository>,
        workflow: CallEnrichmentWorkflow,
    }

    fn harness(strategy: NoteStrategy, telephony: FakeTelephony) -> Harness {
        let crm = crm(strategy);
        let telephony = Arc::new(telephony.with_call(call()));
        let mappings = Arc::new(InMemoryMappingRepository::default());
        let workflow =
            CallEnrichmentWorkflow::new(crm.clone(), telephony.clone(), mappings.clone(), INBOX);
        Harness { crm, telephony, mappings, workflow }
    }

    fn summary() -> CallInsights {
        CallInsights {
            summary: vec!["Asked about pricing".to_string()],
            next_steps: vec!["Send proposal".to_string()],
            transcript: Vec::new(),
        }
    }

    #[tokio::test]
    async fn phase_one_replay_creates_one_note_and_one_mapping() {
        let h = harness(NoteStrategy::UpdateInPlace, FakeTelephony::default());

        let first = h.workflow.record_completed_call("int-1", &call()).await.expect("first run");
        let second = h.workflow.record_completed_call("int-1", &call()).await.expect("replay");

        assert!(matches!(first, ProcessingResult::Synced { action: MappingAction::NoteCreated, .. }));
        assert!(second.is_skipped());
        assert_eq!(h.crm.note_ids().len(), 1);
        assert_eq!(h.mappings.len().await, 1);
    }

    #[tokio::test]
    async fn phase_one_note_carries_header_and_deep_link() {
        let h = harness(NoteStrategy::UpdateInPlace, FakeTelephony::default());
        h.workflow.record_completed_call("int-1", &call()).await.expect("phase one");

        let note = h.crm.note("note-1").expect("note");
        assert_eq!(note.parent_record_id, "person-1");
        assert_eq!(note.title, "Call from Ada Lovelace");
        assert!(note.content.contains("- **Duration:** 3m 12s"));
        assert!(note.content.contains("- **Line:** Sales (+15550009999)"));
        assert!(note.content.contains("https://my.openphone.com/inbox/PN-1/c/AC-1"));
    }

    #[tokio::test]
    async fn phase_one_skips_calls_without_matching_person() {
        let h = harness(NoteStrategy::UpdateInPlace, FakeTelephony::default());
        let mut stranger = call();
        stranger.from = Some("+15550004444".to_string());

        let result = h.workflow.record_completed_call("int-1", &stranger).await.expect("run");

        assert!(result.is_skipped());
        assert!(h.crm.note_ids().is_empty());
    }

    #[tokio::test]
    async fn update_in_place_keeps_the_note_id() {
        let telephony = FakeTelephony::default().with_recording(
            "AC-1",
            Recording {
                id: "RC-1".to_string(),
                url: Some("https://files.example.com/rc-1.mp3".to_string()),
                duration: Some(65),
                status: Some("completed".to_string()),
            },
        );
        let h = harness(NoteStrategy::UpdateInPlace, telephony);
        h.workflow.record_completed_call("int-1", &call()).await.expect("phase one");

        let outcome = h
            .workflow
            .enrich_call_note("int-1", "AC-1", summary())
            .await
            .expect("enrich")
            .expect("outcome");

        assert_eq!(outcome.note_id, "note-1");
        assert_eq!(outcome.old_note_id.as_deref(), Some("note-1"));
        assert_eq!(outcome.recordings_count, 1);
        let note = h.crm.note("note-1").expect("note");
        assert!(note.content.contains("[Recording 1](https://files.example.com/rc-1.mp3) (1m 5s)"));
        assert!(note.content.contains("### Summary\n\n- Asked about pricing"));
        assert!(note.content.contains("### Next steps\n\n- Send proposal"));

        let mapping = h
            .mappings
            .get("int-1", &CorrelationKey::call("AC-1"))
            .await
            .expect("get")
            .expect("mapping");
        assert_eq!(mapping.action, MappingAction::NoteEnriched);
        assert!(mapping.enriched_at.is_some());
    }

    #[tokio::test]
    async fn create_then_delete_replaces_the_note() {
        let h = harness(NoteStrategy::CreateThenDelete, FakeTelephony::default());
        h.workflow.record_completed_call("int-1", &call()).await.expect("phase one");

        let outcome = h
            .workflow
            .enrich_call_note("int-1", "AC-1", summary())
            .await
            .expect("enrich")
            .expect("outcome");

        assert_eq!(outcome.note_id, "note-2");
        assert_eq!(outcome.old_note_id.as_deref(), Some("note-1"));
        assert_eq!(h.crm.note_ids(), vec!["note-2".to_string()]);
        let operations = h.crm.operations();
        let created = operations.iter().position(|op| op == "create_note:note-2").expect("create");
        let deleted = operations.iter().position(|op| op == "delete_note:note-1").expect("delete");
        assert!(created < deleted);
    }

    #[tokio::test]
    async fn create_then_delete_never_deletes_when_creation_fails() {
        let h = harness(NoteStrategy::CreateThenDelete, FakeTelephony::default());
        h.workflow.record_completed_call("int-1", &call()).await.expect("phase one");
        h.crm.fail_create_note.store(true, Ordering::SeqCst);

        let error = h.workflow.enrich_call_note("int-1", "AC-1", summary()).await;

        assert!(error.is_err());
        assert!(!h.crm.operations().iter().any(|op| op.starts_with("delete_note")));
        assert_eq!(h.crm.note_ids(), vec!["note-1".to_string()]);
        let mapping = h
            .mappings
            .get("int-1", &CorrelationKey::call("AC-1"))
            .await
            .expect("get")
            .expect("mapping");
        assert_eq!(mapping.note_id.as_deref(), Some("note-1"));
    }

    #[tokio::test]
    async fn failed_old_note_delete_still_maps_the_new_note() {
        let h = harness(NoteStrategy::CreateThenDelete, FakeTelephony::default());
        h.workflow.record_completed_call("int-1", &call()).await.expect("phase one");
        h.crm.fail_delete_note.store(true, Ordering::SeqCst);

        let outcome = h
            .workflow
            .enrich_call_note("int-1", "AC-1", summary())
            .await
            .expect("enrich succeeds")
            .expect("outcome");

        assert_eq!(outcome.note_id, "note-2");
        let mapping = h
            .mappings
            .get("int-1", &CorrelationKey::call("AC-1"))
            .await
            .expect("get")
            .expect("mapping");
        assert_eq!(mapping.note_id.as_deref(), Some("note-2"));
    }

    #[tokio::test]
    async fn recording_and_voicemail_failures_degrade() {
        let telephony = FakeTelephony::default().with_voicemail(
            "AC-1",
            Voicemail { url: None, transcript: Some("Call me back".to_string()), duration: None },
        );
        telephony.fail_recordings.store(true, Ordering::SeqCst);
        let h = harness(NoteStrategy::UpdateInPlace, telephony);
        h.workflow.record_completed_call("int-1", &call()).await.expect("phase one");

        let outcome = h
            .workflow
            .enrich_call_note("int-1", "AC-1", CallInsights::default())
            .await
            .expect("enrich")
            .expect("outcome");
        assert_eq!(outcome.recordings_count, 0);
        assert!(outcome.has_voicemail);
        assert!(h.crm.note("note-1").expect("note").content.contains("> Call me back"));

        h.telephony.fail_voicemail.store(true, Ordering::SeqCst);
        let outcome = h
            .workflow
            .enrich_call_note("int-1", "AC-1", CallInsights::default())
            .await
            .expect("enrich again")
            .expect("outcome");
        assert!(!outcome.has_voicemail);
    }

    #[tokio::test]
    async fn phase_two_before_phase_one_creates_enriched_note_and_phase_one_skips() {
        let h = harness(NoteStrategy::UpdateInPlace, FakeTelephony::default());

        let outcome = h
            .workflow
            .enrich_call_note("int-1", "AC-1", summary())
            .await
            .expect("enrich")
            .expect("outcome");
        assert_eq!(outcome.old_note_id, None);
        assert!(h.telephony.operations().contains(&"get_call:AC-1".to_string()));

        let late = h.workflow.record_completed_call("int-1", &call()).await.expect("phase one");
        assert!(late.is_skipped());
        assert_eq!(h.crm.note_ids().len(), 1);
    }

    #[tokio::test]
    async fn later_transcript_keeps_earlier_summary() {
        let h = harness(NoteStrategy::UpdateInPlace, FakeTelephony::default());
        h.workflow.record_completed_call("int-1", &call()).await.expect("phase one");
        h.workflow.enrich_call_note("int-1", "AC-1", summary()).await.expect("summary");

        let transcript: CallInsights = serde_json::from_value(json!({
            "transcript": [{"identifier": "+15550001111", "content": "Hi there"}]
        }))
        .expect("insights");
        h.workflow.enrich_call_note("int-1", "AC-1", transcript).await.expect("transcript");

        let content = h.crm.note("note-1").expect("note").content;
        assert!(content.contains("- Asked about pricing"));
        assert!(content.contains("**+15550001111:** Hi there"));
        assert!(!h.telephony.operations().contains(&"get_call:AC-1".to_string()));
    }

    #[test]
    fn durations_are_compact() {
        assert_eq!(format_duration(45), "45s");
        assert_eq!(format_duration(120), "2m");
        assert_eq!(format_duration(192), "3m 12s");
    }
}
