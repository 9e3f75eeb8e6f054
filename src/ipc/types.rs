use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::attendance::MarkingSession;
use crate::lecture_form::LectureForm;
use crate::session::Session;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Default)]
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub session: Session,
    /// The roster currently being marked, if any.
    pub marking: Option<MarkingSession>,
    /// Add-class draft; created lazily from the configured default section.
    pub form: Option<LectureForm>,
    /// Bumped each time a marking session is opened or dropped.
    pub next_generation: u64,
}

impl AppState {
    /// Drops per-workspace working state. Late submit tickets from the old
    /// session will no longer match.
    pub fn reset_workflows(&mut self) {
        self.marking = None;
        self.form = None;
        self.next_generation += 1;
    }
}
