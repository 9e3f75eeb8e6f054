//! Add-class workflow: `Editing -> Validating -> Rejected | Accepted -> Idle`.
//!
//! The form owns the raw user input. Validation runs in a fixed order and the
//! first failure wins: missing fields, unparseable times, inverted range, then
//! schedule conflicts. On acceptance day and section stay selected so the
//! next lecture for the same section is quicker to enter.

use crate::error::AttendifyError;
use crate::schedule::{check_conflict, LectureSlot, Weekday};
use crate::timefmt::parse_clock;
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LectureDraft {
    pub day: Weekday,
    pub section: String,
    pub start: String,
    pub end: String,
    pub subject: String,
    pub room: String,
}

/// Fields supplied by one edit; `None` leaves the current value alone.
#[derive(Debug, Clone, Default)]
pub struct DraftPatch {
    pub day: Option<Weekday>,
    pub section: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub subject: Option<String>,
    pub room: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormState {
    Idle,
    Editing,
    Validating,
    Rejected(AttendifyError),
}

impl FormState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormState::Idle => "idle",
            FormState::Editing => "editing",
            FormState::Validating => "validating",
            FormState::Rejected(_) => "rejected",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LectureForm {
    draft: LectureDraft,
    state: FormState,
}

impl LectureForm {
    pub fn new(default_section: &str) -> Self {
        Self {
            draft: LectureDraft {
                day: Weekday::Monday,
                section: default_section.to_string(),
                start: String::new(),
                end: String::new(),
                subject: String::new(),
                room: String::new(),
            },
            state: FormState::Idle,
        }
    }

    pub fn draft(&self) -> &LectureDraft {
        &self.draft
    }

    pub fn state(&self) -> &FormState {
        &self.state
    }

    pub fn edit(&mut self, patch: DraftPatch) {
        let d = &mut self.draft;
        if let Some(day) = patch.day {
            d.day = day;
        }
        if let Some(v) = patch.section {
            d.section = v;
        }
        if let Some(v) = patch.start {
            d.start = v;
        }
        if let Some(v) = patch.end {
            d.end = v;
        }
        if let Some(v) = patch.subject {
            d.subject = v;
        }
        if let Some(v) = patch.room {
            d.room = v;
        }
        self.state = FormState::Editing;
    }

    /// Validates the draft against `existing` and builds the slot to insert.
    ///
    /// On failure the form moves to `Rejected` and nothing else changes. On
    /// success it stays in `Validating` until [`accept`](Self::accept) or
    /// [`reject`](Self::reject) reports the store outcome.
    pub fn validate(
        &mut self,
        existing: &[LectureSlot],
        faculty_id: Option<&str>,
    ) -> Result<LectureSlot, AttendifyError> {
        self.state = FormState::Validating;
        match self.build_slot(existing, faculty_id) {
            Ok(slot) => Ok(slot),
            Err(e) => {
                self.state = FormState::Rejected(e.clone());
                Err(e)
            }
        }
    }

    fn build_slot(
        &self,
        existing: &[LectureSlot],
        faculty_id: Option<&str>,
    ) -> Result<LectureSlot, AttendifyError> {
        let d = &self.draft;
        let missing: Vec<String> = [
            ("section", &d.section),
            ("subject", &d.subject),
            ("room", &d.room),
            ("startTime", &d.start),
            ("endTime", &d.end),
        ]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(k, _)| k.to_string())
        .collect();
        if !missing.is_empty() {
            return Err(AttendifyError::MissingFields { fields: missing });
        }

        let start = parse_clock(&d.start)?;
        let end = parse_clock(&d.end)?;
        if end <= start {
            return Err(AttendifyError::InvalidRange);
        }

        let slot = LectureSlot {
            id: Uuid::new_v4().to_string(),
            day: d.day,
            start,
            end,
            subject: d.subject.trim().to_string(),
            room: d.room.trim().to_string(),
            section: d.section.trim().to_string(),
            faculty_id: faculty_id.map(|s| s.to_string()),
        };
        check_conflict(&slot, existing)?;
        Ok(slot)
    }

    /// The slot was stored: blank the per-lecture fields, keep day and section.
    pub fn accept(&mut self) {
        self.draft.start.clear();
        self.draft.end.clear();
        self.draft.subject.clear();
        self.draft.room.clear();
        self.state = FormState::Idle;
    }

    /// The store refused the slot; keep the draft so the user can retry.
    pub fn reject(&mut self, error: AttendifyError) {
        self.state = FormState::Rejected(error);
    }

    pub fn to_json(&self) -> serde_json::Value {
        let d = &self.draft;
        let rejection = match &self.state {
            FormState::Rejected(e) => json!({ "code": e.code(), "message": e.to_string() }),
            _ => serde_json::Value::Null,
        };
        json!({
            "state": self.state.as_str(),
            "rejection": rejection,
            "draft": {
                "day": d.day.as_str(),
                "section": d.section,
                "startTime": d.start,
                "endTime": d.end,
                "subject": d.subject,
                "room": d.room
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(day: Weekday, start: &str, end: &str) -> DraftPatch {
        DraftPatch {
            day: Some(day),
            section: Some("CS-301".to_string()),
            start: Some(start.to_string()),
            end: Some(end.to_string()),
            subject: Some("Data Structures".to_string()),
            room: Some("Room 204".to_string()),
        }
    }

    #[test]
    fn missing_fields_win_over_everything_else() {
        let mut form = LectureForm::new("CS-301");
        form.edit(DraftPatch {
            start: Some("11:00".to_string()),
            end: Some("10:00".to_string()),
            ..DraftPatch::default()
        });
        let e = form.validate(&[], None).unwrap_err();
        assert_eq!(
            e,
            AttendifyError::MissingFields {
                fields: vec!["subject".to_string(), "room".to_string()]
            }
        );
        assert!(matches!(form.state(), FormState::Rejected(_)));
    }

    #[test]
    fn inverted_or_empty_range_is_rejected() {
        let mut form = LectureForm::new("CS-301");
        form.edit(filled(Weekday::Monday, "10:00", "10:00"));
        assert_eq!(form.validate(&[], None).unwrap_err(), AttendifyError::InvalidRange);
        form.edit(filled(Weekday::Monday, "10:00", "09:00"));
        assert_eq!(form.validate(&[], None).unwrap_err(), AttendifyError::InvalidRange);
    }

    #[test]
    fn bad_time_text_is_reported() {
        let mut form = LectureForm::new("CS-301");
        form.edit(filled(Weekday::Monday, "quarter past", "10:00"));
        assert_eq!(form.validate(&[], None).unwrap_err().code(), "invalid_time");
    }

    #[test]
    fn accepted_slot_keeps_day_and_section_sticky() {
        let mut form = LectureForm::new("CS-301");
        form.edit(filled(Weekday::Thursday, "14:45", "16:15"));
        let slot = form.validate(&[], Some("fac-1")).expect("valid");
        assert_eq!(slot.day, Weekday::Thursday);
        assert_eq!(slot.start.to_string(), "14:45");
        assert_eq!(slot.faculty_id.as_deref(), Some("fac-1"));
        assert!(!slot.id.is_empty());
        assert_eq!(form.state(), &FormState::Validating);

        form.accept();
        assert_eq!(form.state(), &FormState::Idle);
        let d = form.draft();
        assert_eq!(d.day, Weekday::Thursday);
        assert_eq!(d.section, "CS-301");
        assert!(d.subject.is_empty() && d.room.is_empty());
        assert!(d.start.is_empty() && d.end.is_empty());
    }

    #[test]
    fn conflict_rejects_and_preserves_draft() {
        let mut form = LectureForm::new("CS-301");
        form.edit(filled(Weekday::Monday, "09:00", "10:00"));
        let first = form.validate(&[], None).expect("first fits");
        form.accept();

        form.edit(filled(Weekday::Monday, "09:30", "10:30"));
        let e = form.validate(std::slice::from_ref(&first), None).unwrap_err();
        assert_eq!(e.code(), "conflict");
        assert_eq!(form.draft().start, "09:30");

        form.edit(DraftPatch {
            start: Some("10:00".to_string()),
            end: Some("11:00".to_string()),
            ..DraftPatch::default()
        });
        assert_eq!(form.state(), &FormState::Editing);
        assert!(form.validate(&[first], None).is_ok());
    }

    #[test]
    fn store_rejection_keeps_draft_for_retry() {
        let mut form = LectureForm::new("IT-501");
        form.edit(filled(Weekday::Friday, "08:00", "09:00"));
        form.validate(&[], None).expect("valid");
        form.reject(AttendifyError::RemoteWrite {
            message: "locked".to_string(),
        });
        assert_eq!(form.draft().subject, "Data Structures");
        assert_eq!(form.to_json()["state"], "rejected");
        assert_eq!(form.to_json()["rejection"]["code"], "remote_write_failed");
    }
}
