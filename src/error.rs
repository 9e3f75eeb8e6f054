//! Error taxonomy shared by the timetable and attendance workflows.

use thiserror::Error;

/// Every failure a user action can produce. None of these are fatal; each is
/// recoverable by correcting input and retrying.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AttendifyError {
    /// One or more required form fields were blank
    #[error("missing required fields: {}", fields.join(", "))]
    MissingFields { fields: Vec<String> },

    /// A time field could not be parsed as "HH:MM" or "hh:mm AM/PM"
    #[error("invalid time: {value:?}")]
    InvalidTime { value: String },

    /// End time is not strictly after start time
    #[error("end time must be after start time")]
    InvalidRange,

    /// The candidate slot overlaps an existing slot of the same section and day
    #[error("{section} already has {existing} on {day}")]
    Conflict {
        day: String,
        section: String,
        existing: String,
    },

    /// Submit refused because some students are still pending
    #[error("{pending} student(s) still pending")]
    IncompleteAttendance { pending: usize },

    /// Submit refused because the roster has nobody on it
    #[error("roster is empty")]
    EmptyRoster,

    /// The backing store rejected a request
    #[error("data store error: {message}")]
    RemoteWrite { message: String },

    /// A submit for this marking session is still awaiting the store
    #[error("a submit is already in progress")]
    SubmitInProgress,

    /// No roster has been opened for marking
    #[error("no attendance session is open")]
    NoActiveSession,

    /// Student id is not on the open roster
    #[error("student {student_id} is not on this roster")]
    UnknownStudent { student_id: String },

    #[error("sign in first")]
    NotAuthenticated,

    #[error("{action} requires {required} role")]
    Forbidden {
        action: String,
        required: &'static str,
    },
}

impl AttendifyError {
    /// Stable machine-readable code used in the IPC error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            AttendifyError::MissingFields { .. } => "missing_fields",
            AttendifyError::InvalidTime { .. } => "invalid_time",
            AttendifyError::InvalidRange => "invalid_range",
            AttendifyError::Conflict { .. } => "conflict",
            AttendifyError::IncompleteAttendance { .. } => "incomplete_attendance",
            AttendifyError::EmptyRoster => "empty_roster",
            AttendifyError::RemoteWrite { .. } => "remote_write_failed",
            AttendifyError::SubmitInProgress => "submit_in_progress",
            AttendifyError::NoActiveSession => "no_marking_session",
            AttendifyError::UnknownStudent { .. } => "not_found",
            AttendifyError::NotAuthenticated => "not_authenticated",
            AttendifyError::Forbidden { .. } => "forbidden",
        }
    }

    /// Returns true for errors caught by local validation, before any store call.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AttendifyError::MissingFields { .. }
                | AttendifyError::InvalidTime { .. }
                | AttendifyError::InvalidRange
                | AttendifyError::Conflict { .. }
                | AttendifyError::IncompleteAttendance { .. }
                | AttendifyError::EmptyRoster
        )
    }

    /// Structured details for the IPC envelope, where the variant carries any.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            AttendifyError::MissingFields { fields } => {
                Some(serde_json::json!({ "fields": fields }))
            }
            AttendifyError::Conflict {
                day,
                section,
                existing,
            } => Some(serde_json::json!({
                "day": day,
                "section": section,
                "existing": existing
            })),
            AttendifyError::IncompleteAttendance { pending } => {
                Some(serde_json::json!({ "pending": pending }))
            }
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for AttendifyError {
    fn from(err: rusqlite::Error) -> Self {
        AttendifyError::RemoteWrite {
            message: err.to_string(),
        }
    }
}
