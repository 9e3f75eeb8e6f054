//! Attendance marking session and derived statistics.
//!
//! A [`MarkingSession`] holds one tri-state status per roster member for a
//! `(section, date)` pair. Statuses start `Pending`; toggling cycles
//! Pending -> Present -> Absent -> Present ... and never returns to Pending.
//! Submitting is split into [`MarkingSession::begin_submit`] and
//! [`MarkingSession::finish_submit`] so the in-flight window is explicit:
//! nothing can be toggled or re-submitted while a write is outstanding, and a
//! completion for a session that has since been replaced is ignored.

use crate::error::AttendifyError;
use crate::store::AttendanceStore;
use chrono::NaiveDate;
use serde_json::json;
use std::collections::HashMap;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttendanceStatus {
    Present,
    Absent,
    Pending,
}

impl AttendanceStatus {
    pub fn toggled(self) -> Self {
        match self {
            AttendanceStatus::Pending => AttendanceStatus::Present,
            AttendanceStatus::Present => AttendanceStatus::Absent,
            AttendanceStatus::Absent => AttendanceStatus::Present,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Pending => "pending",
        }
    }

    pub fn from_stored(present: bool) -> Self {
        if present {
            AttendanceStatus::Present
        } else {
            AttendanceStatus::Absent
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub student_id: String,
    pub name: String,
    pub registration_number: String,
}

/// A resolved status ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAttendanceRecord {
    pub student_id: String,
    pub date: NaiveDate,
    pub status: bool,
    pub marked_by: String,
    pub section_ref: String,
    pub subject: Option<String>,
}

/// A persisted attendance row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceRecord {
    pub id: String,
    pub student_id: String,
    pub date: NaiveDate,
    pub status: bool,
    pub marked_by: String,
    pub section_ref: String,
    pub subject: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredStatus {
    pub student_id: String,
    pub status: bool,
}

/// Aggregate view over stored records. Recomputed on every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttendanceStats {
    pub total: usize,
    pub present: usize,
    pub absent: usize,
    pub percentage: u32,
}

impl AttendanceStats {
    pub fn from_statuses<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = bool>,
    {
        let mut present = 0;
        let mut absent = 0;
        for s in statuses {
            if s {
                present += 1;
            } else {
                absent += 1;
            }
        }
        let total = present + absent;
        Self {
            total,
            present,
            absent,
            percentage: percentage(present, total),
        }
    }

    pub fn from_records(records: &[AttendanceRecord]) -> Self {
        Self::from_statuses(records.iter().map(|r| r.status))
    }

    pub fn to_json(self) -> serde_json::Value {
        json!({
            "total": self.total,
            "present": self.present,
            "absent": self.absent,
            "percentage": self.percentage
        })
    }
}

/// `round(100 * part / total)`, 0 when `total` is 0.
pub fn percentage(part: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((part as f64) * 100.0 / (total as f64)).round() as u32
}

/// Live counts for the open session, including undecided students.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTally {
    pub total: usize,
    pub present: usize,
    pub absent: usize,
    pub pending: usize,
}

/// Issued by `begin_submit`; hand it back to `finish_submit` with the outcome.
#[derive(Debug, Clone)]
pub struct SubmitTicket {
    generation: u64,
    pub records: Vec<NewAttendanceRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Applied,
    /// The session was replaced while the write was outstanding.
    Stale,
}

#[derive(Debug, Clone)]
pub struct MarkingSession {
    generation: u64,
    section: String,
    date: NaiveDate,
    subject: Option<String>,
    roster: Vec<RosterEntry>,
    statuses: HashMap<String, AttendanceStatus>,
    previous: HashMap<String, bool>,
    in_flight: bool,
}

impl MarkingSession {
    pub fn open(
        generation: u64,
        section: &str,
        date: NaiveDate,
        subject: Option<String>,
        roster: Vec<RosterEntry>,
        previous: Vec<StoredStatus>,
    ) -> Self {
        let statuses = roster
            .iter()
            .map(|r| (r.student_id.clone(), AttendanceStatus::Pending))
            .collect();
        let previous = previous
            .into_iter()
            .map(|p| (p.student_id, p.status))
            .collect();
        Self {
            generation,
            section: section.to_string(),
            date,
            subject,
            roster,
            statuses,
            previous,
            in_flight: false,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn section(&self) -> &str {
        &self.section
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn roster(&self) -> &[RosterEntry] {
        &self.roster
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn status_of(&self, student_id: &str) -> Option<AttendanceStatus> {
        self.statuses.get(student_id).copied()
    }

    pub fn toggle(&mut self, student_id: &str) -> Result<AttendanceStatus, AttendifyError> {
        if self.in_flight {
            return Err(AttendifyError::SubmitInProgress);
        }
        let Some(status) = self.statuses.get_mut(student_id) else {
            return Err(AttendifyError::UnknownStudent {
                student_id: student_id.to_string(),
            });
        };
        *status = status.toggled();
        Ok(*status)
    }

    /// Overwrites every status with `Present`, whatever it was before.
    pub fn mark_all_present(&mut self) -> Result<(), AttendifyError> {
        if self.in_flight {
            return Err(AttendifyError::SubmitInProgress);
        }
        for status in self.statuses.values_mut() {
            *status = AttendanceStatus::Present;
        }
        Ok(())
    }

    pub fn tally(&self) -> SessionTally {
        let mut t = SessionTally {
            total: self.roster.len(),
            present: 0,
            absent: 0,
            pending: 0,
        };
        for status in self.statuses.values() {
            match status {
                AttendanceStatus::Present => t.present += 1,
                AttendanceStatus::Absent => t.absent += 1,
                AttendanceStatus::Pending => t.pending += 1,
            }
        }
        t
    }

    /// Checks completeness and, if it holds, enters the in-flight state.
    ///
    /// Refusals leave the session exactly as it was.
    pub fn begin_submit(&mut self, marked_by: &str) -> Result<SubmitTicket, AttendifyError> {
        if self.in_flight {
            return Err(AttendifyError::SubmitInProgress);
        }
        if self.roster.is_empty() {
            return Err(AttendifyError::EmptyRoster);
        }
        let pending = self.tally().pending;
        if pending > 0 {
            return Err(AttendifyError::IncompleteAttendance { pending });
        }

        let records = self
            .roster
            .iter()
            .map(|r| NewAttendanceRecord {
                student_id: r.student_id.clone(),
                date: self.date,
                status: self.status_of(&r.student_id) == Some(AttendanceStatus::Present),
                marked_by: marked_by.to_string(),
                section_ref: self.section.clone(),
                subject: self.subject.clone(),
            })
            .collect();
        self.in_flight = true;
        Ok(SubmitTicket {
            generation: self.generation,
            records,
        })
    }

    /// Applies the store outcome for `ticket`.
    ///
    /// A ticket from another generation is ignored. On success statuses reset
    /// to `Pending` and the written values become the `previous` snapshot; on
    /// failure statuses are left untouched and the error is returned.
    pub fn finish_submit(
        &mut self,
        ticket: SubmitTicket,
        outcome: Result<(), AttendifyError>,
    ) -> Result<SubmitOutcome, AttendifyError> {
        if ticket.generation != self.generation {
            warn!(
                ticket = ticket.generation,
                current = self.generation,
                "ignoring late submit result for a replaced session"
            );
            return Ok(SubmitOutcome::Stale);
        }
        self.in_flight = false;
        outcome?;
        for r in ticket.records {
            self.previous.insert(r.student_id, r.status);
        }
        for status in self.statuses.values_mut() {
            *status = AttendanceStatus::Pending;
        }
        Ok(SubmitOutcome::Applied)
    }

    pub fn to_json(&self) -> serde_json::Value {
        let tally = self.tally();
        let students: Vec<serde_json::Value> = self
            .roster
            .iter()
            .map(|r| {
                let status = self
                    .status_of(&r.student_id)
                    .unwrap_or(AttendanceStatus::Pending);
                json!({
                    "studentId": r.student_id,
                    "name": r.name,
                    "registrationNumber": r.registration_number,
                    "status": status.as_str(),
                    "previous": self.previous.get(&r.student_id)
                        .map(|p| AttendanceStatus::from_stored(*p).as_str())
                })
            })
            .collect();
        json!({
            "section": self.section,
            "date": self.date.to_string(),
            "subject": self.subject,
            "submitting": self.in_flight,
            "students": students,
            "tally": {
                "total": tally.total,
                "present": tally.present,
                "absent": tally.absent,
                "pending": tally.pending
            }
        })
    }
}

/// Runs the full submit against `store`: gate, write, then settle the session.
///
/// Returns statistics for the batch that was written.
pub fn submit<S: AttendanceStore + ?Sized>(
    session: &mut MarkingSession,
    store: &S,
    marked_by: &str,
) -> Result<AttendanceStats, AttendifyError> {
    let ticket = session.begin_submit(marked_by)?;
    let stats = AttendanceStats::from_statuses(ticket.records.iter().map(|r| r.status));
    let write = store.upsert_attendance(&ticket.records);
    if let Err(e) = &write {
        warn!(section = %session.section(), error = %e, "attendance write failed");
    }
    session.finish_submit(ticket, write)?;
    info!(
        section = %session.section(),
        date = %session.date(),
        present = stats.present,
        absent = stats.absent,
        "attendance submitted"
    );
    Ok(stats)
}
