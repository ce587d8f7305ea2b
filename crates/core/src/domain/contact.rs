use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// CRM object families the bridge knows how to sync.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Person,
    Note,
    Other(String),
}

impl ObjectKind {
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "person" | "persons" | "people" | "contact" | "contacts" => Self::Person,
            "note" | "notes" => Self::Note,
            _ => Self::Other(normalized),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Person => "person",
            Self::Note => "note",
            Self::Other(name) => name.as_str(),
        }
    }
}

/// Raw CRM record as returned by the CRM client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrmRecord {
    pub id: String,
    pub kind: ObjectKind,
    #[serde(default)]
    pub attributes: Value,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrmPerson {
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub emails: Vec<String>,
    pub phone_numbers: Vec<String>,
    pub company: Option<String>,
    pub role: Option<String>,
}

impl CrmPerson {
    pub fn from_record(record: &CrmRecord) -> Self {
        Self::from_attributes(&record.id, &record.attributes)
    }

    /// Reads a person out of a loosely shaped attribute bag. CRM payloads
    /// disagree on casing and on whether multi-valued fields are plain strings
    /// or objects, so every field is looked up under several aliases.
    pub fn from_attributes(id: &str, attributes: &Value) -> Self {
        let mut first_name = first_text(attributes, &["first_name", "firstName", "given_name"]);
        let mut last_name = first_text(attributes, &["last_name", "lastName", "family_name"]);
        if first_name.is_none() && last_name.is_none() {
            if let Some(full_name) = first_text(attributes, &["name", "full_name", "fullName"]) {
                let mut parts = full_name.splitn(2, ' ');
                first_name = parts.next().map(str::to_string);
                last_name = parts.next().map(|value| value.trim().to_string());
            }
        }

        Self {
            id: id.to_string(),
            first_name,
            last_name,
            emails: all_texts(
                attributes,
                &["email_addresses", "emails", "email"],
                &["email_address", "value", "email"],
            ),
            phone_numbers: all_texts(
                attributes,
                &["phone_numbers", "phones", "phone"],
                &["phone_number", "original_phone_number", "value", "number"],
            ),
            company: first_text(attributes, &["company", "company_name", "organization"]),
            role: first_text(attributes, &["job_title", "jobTitle", "role", "title"]),
        }
    }

    pub fn has_contact_channel(&self) -> bool {
        !self.phone_numbers.is_empty() || !self.emails.is_empty()
    }

    pub fn display_name(&self) -> String {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if name.is_empty() {
            self.emails.first().cloned().unwrap_or_else(|| self.id.clone())
        } else {
            name
        }
    }
}

/// Contact shape written to the telephony platform.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactDraft {
    pub external_id: String,
    pub source: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub role: Option<String>,
    pub emails: Vec<String>,
    pub phone_numbers: Vec<String>,
}

impl From<&CrmPerson> for ContactDraft {
    fn from(person: &CrmPerson) -> Self {
        Self {
            external_id: person.id.clone(),
            source: "callbridge".to_string(),
            first_name: person.first_name.clone(),
            last_name: person.last_name.clone(),
            company: person.company.clone(),
            role: person.role.clone(),
            emails: person.emails.clone(),
            phone_numbers: person.phone_numbers.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelephonyContact {
    pub id: String,
    #[serde(flatten)]
    pub fields: ContactDraft,
}

fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::String(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(value) => Some(value.to_string()),
        Value::Array(items) => items.iter().find_map(text_value),
        Value::Object(map) => map.get("value").and_then(text_value),
        Value::Null | Value::Bool(_) => None,
    }
}

fn first_text(attributes: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| attributes.get(*key).and_then(text_value))
}

fn all_texts(attributes: &Value, keys: &[&str], nested_keys: &[&str]) -> Vec<String> {
    let Some(value) = keys.iter().find_map(|key| attributes.get(*key)) else {
        return Vec::new();
    };

    let items: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };

    let mut values = Vec::new();
    for item in items {
        let text = match item {
            Value::Object(map) => {
                nested_keys.iter().find_map(|key| map.get(*key).and_then(text_value))
            }
            other => text_value(other),
        };
        if let Some(text) = text {
            if !values.contains(&text) {
                values.push(text);
            }
        }
    }
    values
}
