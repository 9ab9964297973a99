//! Append-only, timestamped appointment notes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bookings_core::Actor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnnotationKind {
    Cancel,
    Reschedule,
    Note,
}

/// A single note entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub kind: AnnotationKind,
    pub text: String,
    pub recorded_at: DateTime<Utc>,
    pub recorded_by: Actor,
}

impl Annotation {
    /// Single-line rendering (`CANCEL: reason`, `RESCHEDULE: reason`, or the text).
    pub fn render(&self) -> String {
        match self.kind {
            AnnotationKind::Cancel => format!("CANCEL: {}", self.text),
            AnnotationKind::Reschedule => format!("RESCHEDULE: {}", self.text),
            AnnotationKind::Note => self.text.clone(),
        }
    }
}

/// Ordered note history of an appointment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Notes(Vec<Annotation>);

impl Notes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_annotations(annotations: Vec<Annotation>) -> Self {
        Self(annotations)
    }

    pub(crate) fn append(&mut self, kind: AnnotationKind, text: impl Into<String>, actor: &Actor, at: DateTime<Utc>) {
        self.0.push(Annotation {
            kind,
            text: text.into(),
            recorded_at: at,
            recorded_by: actor.clone(),
        });
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Flat text form, one newline-terminated line per annotation.
    pub fn to_text(&self) -> String {
        self.0.iter().map(|a| a.render() + "\n").collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_rendering_prefixes_kinds() {
        let actor = Actor::new("u");
        let now = Utc::now();
        let mut notes = Notes::new();
        notes.append(AnnotationKind::Note, "bring x-rays", &actor, now);
        notes.append(AnnotationKind::Reschedule, "doctor sick", &actor, now);
        notes.append(AnnotationKind::Cancel, "no longer needed", &actor, now);

        assert_eq!(
            notes.to_text(),
            "bring x-rays\nRESCHEDULE: doctor sick\nCANCEL: no longer needed\n"
        );
        assert_eq!(notes.len(), 3);
    }

    #[test]
    fn notes_serialise_as_list() {
        let mut notes = Notes::new();
        notes.append(AnnotationKind::Cancel, "r", &Actor::new("u"), Utc::now());

        let json = serde_json::to_value(&notes).unwrap();
        assert_eq!(json[0]["kind"], "CANCEL");
        assert_eq!(json[0]["recorded_by"], "u");
    }
}
