//! Markdown rendering of one document and its transcript.
//!
//! Output depends only on the inputs and the [`RenderProfile`]; the profile
//! varies per machine (operator name, display timezone), never per document.

use std::collections::HashSet;

use chrono::{DateTime, FixedOffset};

use super::filename::document_date;
use crate::models::{Document, TranscriptUtterance};

pub const SOURCE_NAME: &str = "Granola";
pub const NO_TRANSCRIPT: &str = "_No transcript available._";

/// Per-machine rendering inputs.
#[derive(Debug, Clone)]
pub struct RenderProfile {
    pub operator: String,
    /// Attendees at this domain get no `(domain)` annotation
    pub own_domain: Option<String>,
    pub tz: FixedOffset,
}

/// An attendee after merging the document's and calendar's lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attendee {
    pub name: String,
    pub email: Option<String>,
}

impl Attendee {
    pub fn domain(&self) -> Option<String> {
        let (_, domain) = self.email.as_deref()?.rsplit_once('@')?;
        let domain = domain.trim().to_lowercase();
        (!domain.is_empty()).then_some(domain)
    }
}

/// Attendees from `people.attendees`, or the calendar event when the document
/// has none, deduplicated by email (else by name), first occurrence kept.
pub fn attendees(doc: &Document) -> Vec<Attendee> {
    let from_people: Vec<Attendee> = doc
        .people
        .as_ref()
        .and_then(|p| p.attendees.as_ref())
        .into_iter()
        .flatten()
        .filter_map(|a| {
            let email = non_empty(a.email.as_deref());
            let name = non_empty(a.full_name())
                .or_else(|| non_empty(a.name.as_deref()))
                .or_else(|| email.clone())?;
            Some(Attendee { name, email })
        })
        .collect();

    let candidates = if from_people.is_empty() {
        doc.google_calendar_event
            .as_ref()
            .and_then(|e| e.attendees.as_ref())
            .into_iter()
            .flatten()
            .filter_map(|a| {
                let email = non_empty(a.email.as_deref());
                let name = non_empty(a.display_name.as_deref()).or_else(|| email.clone())?;
                Some(Attendee { name, email })
            })
            .collect()
    } else {
        from_people
    };

    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|a| {
            let key = a.email.as_deref().unwrap_or(&a.name).to_lowercase();
            seen.insert(key)
        })
        .collect()
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn parse_in(ts: Option<&str>, tz: &FixedOffset) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(ts?).ok().map(|dt| dt.with_timezone(tz))
}

/// `HH:MM - HH:MM` from the calendar event, when it has a start time.
fn event_time(doc: &Document, tz: &FixedOffset) -> Option<String> {
    let event = doc.google_calendar_event.as_ref()?;
    let start = parse_in(event.start.as_ref()?.date_time.as_deref(), tz)?;
    let end = event
        .end
        .as_ref()
        .and_then(|e| parse_in(e.date_time.as_deref(), tz));
    Some(match end {
        Some(end) => format!("{} - {}", start.format("%H:%M"), end.format("%H:%M")),
        None => start.format("%H:%M").to_string(),
    })
}

fn transcript_line(utterance: &TranscriptUtterance, tz: &FixedOffset) -> Option<String> {
    let text = non_empty(utterance.text.as_deref())?;
    let stamp = parse_in(utterance.start_timestamp.as_deref(), tz)
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string());
    Some(format!("**[{}] {}:** {}", stamp, utterance.speaker().label(), text))
}

/// Calendar date of `created_at` in the display zone, matching the `**Time:**`
/// line and transcript stamps. Falls back to the file-name date.
fn heading_date(doc: &Document, tz: &FixedOffset) -> String {
    parse_in(doc.created_at.as_deref(), tz)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| document_date(doc))
}

/// Render the artifact text.
pub fn render_document(
    doc: &Document,
    transcript: Option<&[TranscriptUtterance]>,
    profile: &RenderProfile,
) -> String {
    let mut lines = vec![
        format!("# {}", doc.title_or_untitled()),
        String::new(),
        format!("**Date:** {}", heading_date(doc, &profile.tz)),
    ];
    if let Some(time) = event_time(doc, &profile.tz) {
        lines.push(format!("**Time:** {}", time));
    }
    lines.push(format!("**Recorded by:** {}", profile.operator));
    lines.push(format!("**Source:** {}", SOURCE_NAME));
    lines.push(format!("**Granola ID:** {}", doc.id.as_deref().unwrap_or("")));

    let own_domain = profile.own_domain.as_deref().map(str::to_lowercase);
    let people = attendees(doc);
    if !people.is_empty() {
        lines.extend([String::new(), "## Attendees".to_string(), String::new()]);
        for person in &people {
            lines.push(match person.domain().filter(|d| Some(d) != own_domain.as_ref()) {
                Some(domain) => format!("- {} ({})", person.name, domain),
                None => format!("- {}", person.name),
            });
        }
    }

    if let Some(notes) = doc.notes_body() {
        lines.extend([String::new(), "## Notes".to_string(), String::new()]);
        lines.push(notes.trim_end().to_string());
    }

    lines.extend([String::new(), "## Transcript".to_string(), String::new()]);
    let utterances: Vec<String> = transcript
        .into_iter()
        .flatten()
        .filter_map(|u| transcript_line(u, &profile.tz))
        .collect();
    if utterances.is_empty() {
        lines.push(NO_TRANSCRIPT.to_string());
    } else {
        lines.push(utterances.join("\n\n"));
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CalendarEvent, DocumentAttendee, DocumentPeople, EventAttendee, EventDateTime};

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn profile() -> RenderProfile {
        RenderProfile {
            operator: "Dana".to_string(),
            own_domain: Some("Example.com".to_string()),
            tz: utc(),
        }
    }

    fn utterance(ts: &str, source: &str, text: &str) -> TranscriptUtterance {
        TranscriptUtterance {
            start_timestamp: Some(ts.to_string()),
            source: Some(source.to_string()),
            text: Some(text.to_string()),
            ..Default::default()
        }
    }

    fn person(name: Option<&str>, email: Option<&str>) -> DocumentAttendee {
        DocumentAttendee {
            name: name.map(str::to_string),
            email: email.map(str::to_string),
            ..Default::default()
        }
    }

    fn weekly() -> Document {
        Document {
            id: Some("d1".to_string()),
            title: Some("Loblaw Weekly".to_string()),
            created_at: Some("2024-01-10T15:00:00Z".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn renders_minimal_document_with_transcript() {
        let transcript = vec![
            utterance("2024-01-10T15:00:05Z", "microphone", "Morning all."),
            utterance("2024-01-10T15:00:09Z", "system", "Hi Dana."),
        ];
        let text = render_document(&weekly(), Some(&transcript), &profile());

        assert_eq!(
            text,
            "# Loblaw Weekly\n\n\
             **Date:** 2024-01-10\n\
             **Recorded by:** Dana\n\
             **Source:** Granola\n\
             **Granola ID:** d1\n\
             \n## Transcript\n\n\
             **[15:00:05] You:** Morning all.\n\n\
             **[15:00:09] Other:** Hi Dana.\n"
        );
    }

    #[test]
    fn absent_and_empty_transcripts_get_placeholder() {
        let none = render_document(&weekly(), None, &profile());
        assert!(none.ends_with(&format!("## Transcript\n\n{}\n", NO_TRANSCRIPT)));

        let empty = render_document(&weekly(), Some(&[]), &profile());
        assert_eq!(none, empty);
    }

    #[test]
    fn is_deterministic() {
        let transcript = vec![utterance("2024-01-10T15:00:05Z", "microphone", "x")];
        let a = render_document(&weekly(), Some(&transcript), &profile());
        let b = render_document(&weekly(), Some(&transcript), &profile());
        assert_eq!(a, b);
    }

    #[test]
    fn event_time_in_profile_timezone() {
        let mut doc = weekly();
        doc.google_calendar_event = Some(CalendarEvent {
            start: Some(EventDateTime {
                date_time: Some("2024-01-10T10:00:00-05:00".to_string()),
                time_zone: None,
            }),
            end: Some(EventDateTime {
                date_time: Some("2024-01-10T10:30:00-05:00".to_string()),
                time_zone: None,
            }),
            ..Default::default()
        });

        let text = render_document(&doc, None, &profile());
        assert!(text.contains("**Time:** 15:00 - 15:30\n"));

        let toronto = RenderProfile {
            tz: FixedOffset::west_opt(5 * 3600).unwrap(),
            ..profile()
        };
        let text = render_document(&doc, None, &toronto);
        assert!(text.contains("**Time:** 10:00 - 10:30\n"));
    }

    #[test]
    fn heading_date_follows_display_zone() {
        let mut doc = weekly();
        doc.created_at = Some("2024-01-11T02:00:00Z".to_string());
        let toronto = RenderProfile {
            tz: FixedOffset::west_opt(5 * 3600).unwrap(),
            ..profile()
        };

        assert!(render_document(&doc, None, &toronto).contains("**Date:** 2024-01-10\n"));
        assert!(render_document(&doc, None, &profile()).contains("**Date:** 2024-01-11\n"));
        assert_eq!(document_date(&doc), "2024-01-11");
    }

    #[test]
    fn heading_date_falls_back_for_unparseable_created_at() {
        let mut doc = weekly();
        doc.created_at = Some("2024-01-10 sometime".to_string());
        assert!(render_document(&doc, None, &profile()).contains("**Date:** 2024-01-10\n"));
    }

    #[test]
    fn no_time_line_without_event() {
        assert!(!render_document(&weekly(), None, &profile()).contains("**Time:**"));
    }

    #[test]
    fn attendees_deduplicated_and_annotated() {
        let mut doc = weekly();
        doc.people = Some(DocumentPeople {
            attendees: Some(vec![
                person(Some("Bob Jones"), Some("bob@loblaw.ca")),
                person(Some("Robert Jones"), Some("BOB@loblaw.ca")),
                person(Some("Dana"), Some("dana@example.com")),
                person(Some("Pat"), None),
                person(Some("pat"), None),
            ]),
            ..Default::default()
        });

        let text = render_document(&doc, None, &profile());
        assert!(text.contains(
            "## Attendees\n\n- Bob Jones (loblaw.ca)\n- Dana\n- Pat\n"
        ));
        assert!(!text.contains("Robert"));
    }

    #[test]
    fn attendees_fall_back_to_calendar_event() {
        let mut doc = weekly();
        doc.google_calendar_event = Some(CalendarEvent {
            attendees: Some(vec![
                EventAttendee {
                    email: Some("kim@loblaw.ca".to_string()),
                    display_name: Some("Kim".to_string()),
                    ..Default::default()
                },
                EventAttendee {
                    email: Some("lee@loblaw.ca".to_string()),
                    ..Default::default()
                },
            ]),
            ..Default::default()
        });

        let people = attendees(&doc);
        assert_eq!(people.len(), 2);
        assert_eq!(people[0].name, "Kim");
        assert_eq!(people[1].name, "lee@loblaw.ca");
    }

    #[test]
    fn notes_are_verbatim() {
        let mut doc = weekly();
        doc.notes_markdown = Some("- Pricing **up** 3%\n- Next: promo calendar\n".to_string());
        let text = render_document(&doc, None, &profile());
        assert!(text.contains("## Notes\n\n- Pricing **up** 3%\n- Next: promo calendar\n\n## Transcript"));
    }

    #[test]
    fn blank_utterances_skipped_and_bad_timestamps_marked() {
        let transcript = vec![
            utterance("2024-01-10T15:00:05Z", "microphone", "   "),
            utterance("not a time", "system", "Still here"),
        ];
        let text = render_document(&weekly(), Some(&transcript), &profile());
        assert!(text.contains("**[--:--:--] Other:** Still here\n"));
        assert!(!text.contains("You:"));
    }
}
