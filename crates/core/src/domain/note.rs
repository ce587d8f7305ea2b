use serde::{Deserialize, Serialize};

/// How a CRM adapter reconciles an enriched note with the note created when
/// the call completed. Fixed per CRM integration at construction time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteStrategy {
    /// The CRM can modify an existing note; the note ID stays stable.
    UpdateInPlace,
    /// The CRM cannot modify notes. The replacement is created first and the
    /// old note is deleted only after the replacement exists.
    CreateThenDelete,
}

impl NoteStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UpdateInPlace => "update_in_place",
            Self::CreateThenDelete => "create_then_delete",
        }
    }
}

impl std::str::FromStr for NoteStrategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "update_in_place" | "update" => Ok(Self::UpdateInPlace),
            "create_then_delete" | "recreate" => Ok(Self::CreateThenDelete),
            other => Err(format!(
                "unsupported note strategy `{other}` (expected update_in_place|create_then_delete)"
            )),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteDraft {
    /// CRM record the note is attached to.
    pub parent_record_id: String,
    pub title: String,
    /// Markdown body.
    pub content: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrmNote {
    pub id: String,
    pub parent_record_id: String,
}
