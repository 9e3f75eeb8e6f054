use crate::error::AttendifyError;
use crate::timefmt::{to_12_hour, ClockTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Teaching days, in display order. There are no Sunday lectures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl Weekday {
    pub const ALL: [Weekday; 6] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        let t = s.trim();
        Self::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(t))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Weekday::Monday => "Monday",
            Weekday::Tuesday => "Tuesday",
            Weekday::Wednesday => "Wednesday",
            Weekday::Thursday => "Thursday",
            Weekday::Friday => "Friday",
            Weekday::Saturday => "Saturday",
        }
    }

    /// Maps a calendar weekday; Sunday has no teaching day.
    pub fn from_chrono(d: chrono::Weekday) -> Option<Self> {
        match d {
            chrono::Weekday::Mon => Some(Weekday::Monday),
            chrono::Weekday::Tue => Some(Weekday::Tuesday),
            chrono::Weekday::Wed => Some(Weekday::Wednesday),
            chrono::Weekday::Thu => Some(Weekday::Thursday),
            chrono::Weekday::Fri => Some(Weekday::Friday),
            chrono::Weekday::Sat => Some(Weekday::Saturday),
            chrono::Weekday::Sun => None,
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scheduled lecture for a section. Replaced, never edited in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LectureSlot {
    pub id: String,
    pub day: Weekday,
    pub start: ClockTime,
    pub end: ClockTime,
    pub subject: String,
    pub room: String,
    pub section: String,
    pub faculty_id: Option<String>,
}

impl LectureSlot {
    /// Half-open `[start, end)` overlap; touching endpoints do not overlap.
    pub fn overlaps(&self, other: &LectureSlot) -> bool {
        intervals_overlap(self.start, self.end, other.start, other.end)
    }

    /// Same section on the same day.
    pub fn shares_day_with(&self, other: &LectureSlot) -> bool {
        self.day == other.day && self.section == other.section
    }

    /// Human-readable label used in conflict messages.
    pub fn describe(&self) -> String {
        format!(
            "{} {} - {} ({})",
            self.subject,
            to_12_hour(self.start),
            to_12_hour(self.end),
            self.room
        )
    }
}

pub fn intervals_overlap(s1: ClockTime, e1: ClockTime, s2: ClockTime, e2: ClockTime) -> bool {
    s1 < e2 && s2 < e1
}

/// First existing slot of the same section and day that overlaps `candidate`.
pub fn find_conflict<'a>(
    candidate: &LectureSlot,
    existing: &'a [LectureSlot],
) -> Option<&'a LectureSlot> {
    existing
        .iter()
        .filter(|s| s.id != candidate.id)
        .find(|s| s.shares_day_with(candidate) && s.overlaps(candidate))
}

pub fn has_conflict(candidate: &LectureSlot, existing: &[LectureSlot]) -> bool {
    find_conflict(candidate, existing).is_some()
}

/// `Ok(())` when `candidate` fits, otherwise a `Conflict` naming the collision.
pub fn check_conflict(
    candidate: &LectureSlot,
    existing: &[LectureSlot],
) -> Result<(), AttendifyError> {
    match find_conflict(candidate, existing) {
        None => Ok(()),
        Some(hit) => Err(AttendifyError::Conflict {
            day: candidate.day.to_string(),
            section: candidate.section.clone(),
            existing: hit.describe(),
        }),
    }
}

/// A section's slots grouped by day in Monday..Saturday order, each day
/// sorted by start time. Empty days are left out.
pub fn group_by_day(slots: &[LectureSlot], section: &str) -> Vec<(Weekday, Vec<LectureSlot>)> {
    Weekday::ALL
        .into_iter()
        .filter_map(|day| {
            let mut day_slots: Vec<LectureSlot> = slots
                .iter()
                .filter(|s| s.section == section && s.day == day)
                .cloned()
                .collect();
            if day_slots.is_empty() {
                return None;
            }
            day_slots.sort_by_key(|s| (s.start, s.end));
            Some((day, day_slots))
        })
        .collect()
}
