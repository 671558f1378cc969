//! Domain types for gransync.
//!
//! These mirror the parts of Granola's API payloads that the sync reads. Every
//! field is optional and defaulted so that schema drift on the server side never
//! fails a whole listing. API request/response wrappers live in `api::types`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

// ============================================================================
// Document Types
// ============================================================================

/// A meeting document
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Document {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub deleted_at: Option<String>,
    #[serde(default)]
    pub notes_plain: Option<String>,
    #[serde(default)]
    pub notes_markdown: Option<String>,
    #[serde(default)]
    pub people: Option<DocumentPeople>,
    #[serde(default)]
    pub google_calendar_event: Option<CalendarEvent>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl Document {
    pub fn title_or_untitled(&self) -> &str {
        match self.title.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => t,
            _ => "Untitled",
        }
    }

    /// The notes body to carry verbatim into the artifact, if any.
    pub fn notes_body(&self) -> Option<&str> {
        [self.notes_markdown.as_deref(), self.notes_plain.as_deref()]
            .into_iter()
            .flatten()
            .find(|n| !n.trim().is_empty())
    }
}

/// People associated with a meeting
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DocumentPeople {
    #[serde(default)]
    pub creator: Option<DocumentAttendee>,
    #[serde(default)]
    pub attendees: Option<Vec<DocumentAttendee>>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// Attendee information in a document
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DocumentAttendee {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub details: Option<AttendeeDetails>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl DocumentAttendee {
    pub fn full_name(&self) -> Option<&str> {
        self.details
            .as_ref()
            .and_then(|d| d.person.as_ref())
            .and_then(|p| p.name.as_ref())
            .and_then(|n| n.full_name.as_deref())
    }
}

/// Attendee details
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AttendeeDetails {
    #[serde(default)]
    pub person: Option<PersonDetails>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// Person details within attendee
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PersonDetails {
    #[serde(default)]
    pub name: Option<PersonName>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// Person name
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PersonName {
    #[serde(rename = "fullName", default)]
    pub full_name: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

// ============================================================================
// Calendar Types
// ============================================================================

/// The calendar event a document was recorded against
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CalendarEvent {
    #[serde(default)]
    pub start: Option<EventDateTime>,
    #[serde(default)]
    pub end: Option<EventDateTime>,
    #[serde(default)]
    pub attendees: Option<Vec<EventAttendee>>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// Date/time with timezone
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EventDateTime {
    #[serde(default, rename = "dateTime")]
    pub date_time: Option<String>,
    #[serde(default, rename = "timeZone")]
    pub time_zone: Option<String>,
}

/// Event attendee
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EventAttendee {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, alias = "displayName")]
    pub display_name: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

// ============================================================================
// Transcript Types
// ============================================================================

/// Which side of the call an utterance was captured from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    /// Local microphone: the operator
    You,
    Other,
}

impl Speaker {
    pub fn from_source(source: Option<&str>) -> Self {
        match source {
            Some("microphone") => Speaker::You,
            _ => Speaker::Other,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Speaker::You => "You",
            Speaker::Other => "Other",
        }
    }
}

/// A transcript utterance
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TranscriptUtterance {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub document_id: Option<String>,
    #[serde(default)]
    pub start_timestamp: Option<String>,
    #[serde(default)]
    pub end_timestamp: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl TranscriptUtterance {
    pub fn speaker(&self) -> Speaker {
        Speaker::from_source(self.source.as_deref())
    }
}

// ============================================================================
// Folder Types
// ============================================================================

/// A named remote grouping of documents ("document list" in Granola)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FolderMembership {
    pub name: String,
    pub document_ids: Vec<String>,
}
