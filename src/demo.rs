//! Demo workspace contents. Seeding is idempotent: rows are keyed by fixed ids
//! and anything already present is left alone.

use crate::error::AttendifyError;
use crate::schedule::{has_conflict, LectureSlot, Weekday};
use crate::store::{AttendanceStore, SqliteStore};
use crate::timefmt::parse_clock;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use tracing::{info, warn};

pub const DEMO_FACULTY_ID: &str = "demo-faculty-1";

// (id, name, enrollment, semester, branch, section)
const STUDENTS: &[(&str, &str, &str, &str, &str, &str)] = &[
    ("demo-student-1", "John Doe", "EN12001", "5th", "Computer Science", "CS-301"),
    ("demo-student-2", "Jane Smith", "EN12002", "5th", "Computer Science", "CS-301"),
    ("demo-student-3", "Michael Johnson", "EN12003", "5th", "Computer Science", "CS-301"),
    ("demo-student-4", "Emily Davis", "EN12004", "5th", "Computer Science", "CS-301"),
    ("demo-student-5", "Robert Wilson", "EN12005", "7th", "Information Technology", "IT-501"),
    ("demo-student-6", "Sarah Brown", "EN12006", "7th", "Information Technology", "IT-501"),
    ("demo-student-7", "David Lee", "EN12007", "7th", "Information Technology", "IT-501"),
    ("demo-student-8", "Lisa Taylor", "EN12008", "1st", "Electronics", "EC-101"),
    ("demo-student-9", "Student User", "EN12345", "4th", "Computer Science", "CS-301"),
];

// (id, name, email, phone, department, subjects)
const FACULTY: &[(&str, &str, &str, &str, &str, &[&str])] = &[
    (
        DEMO_FACULTY_ID,
        "Faculty User",
        "faculty@example.com",
        "555-0100",
        "Computer Science",
        &["Data Structures", "Database Systems", "Operating Systems"],
    ),
    (
        "demo-faculty-2",
        "Priya Raman",
        "priya.raman@example.com",
        "555-0101",
        "Information Technology",
        &["Cloud Computing", "Data Analytics"],
    ),
];

// Stored the way the original timetable held them: 12-hour text.
// (id, day, start, end, subject, room, section, faculty)
const SLOTS: &[(&str, Weekday, &str, &str, &str, &str, &str, &str)] = &[
    ("demo-slot-1", Weekday::Monday, "09:00 AM", "10:30 AM", "Data Structures", "Room 204", "CS-301", DEMO_FACULTY_ID),
    ("demo-slot-2", Weekday::Monday, "10:45 AM", "12:15 PM", "Database Systems", "Lab 3", "CS-301", DEMO_FACULTY_ID),
    ("demo-slot-3", Weekday::Tuesday, "09:00 AM", "10:30 AM", "Computer Networks", "Room 105", "CS-301", DEMO_FACULTY_ID),
    ("demo-slot-4", Weekday::Wednesday, "01:00 PM", "02:30 PM", "Operating Systems", "Lab 1", "CS-301", DEMO_FACULTY_ID),
    ("demo-slot-5", Weekday::Thursday, "02:45 PM", "04:15 PM", "Software Engineering", "Room 302", "CS-301", DEMO_FACULTY_ID),
    ("demo-slot-6", Weekday::Monday, "01:00 PM", "02:30 PM", "Data Analytics", "Lab 4", "IT-501", "demo-faculty-2"),
    ("demo-slot-7", Weekday::Tuesday, "10:45 AM", "12:15 PM", "Cloud Computing", "Room 201", "IT-501", "demo-faculty-2"),
    ("demo-slot-8", Weekday::Thursday, "09:00 AM", "10:30 AM", "Mobile App Development", "Lab 2", "IT-501", "demo-faculty-2"),
];

pub const SECTIONS: &[&str] = &["CS-301", "IT-501", "EC-101"];

fn email_for(name: &str) -> String {
    format!("{}@example.edu", name.to_ascii_lowercase().replace(' ', "."))
}

/// Inserts whatever demo rows are missing and reports how many were added.
pub fn seed(conn: &Connection) -> Result<serde_json::Value, AttendifyError> {
    let now = Utc::now().to_rfc3339();
    let tx = conn.unchecked_transaction()?;

    let mut students = 0usize;
    for (id, name, enrollment, semester, branch, section) in STUDENTS {
        students += tx.execute(
            "INSERT INTO students(id, name, email, enrollment_number, semester, branch, section, created_at)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT DO NOTHING",
            (id, name, email_for(name), enrollment, semester, branch, section, &now),
        )?;
    }

    let mut faculty = 0usize;
    for (id, name, email, phone, department, subjects) in FACULTY {
        let subjects_json = serde_json::to_string(subjects).unwrap_or_else(|_| "[]".to_string());
        faculty += tx.execute(
            "INSERT INTO faculty(id, name, email, phone, department, subjects_json, created_at)
             VALUES(?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO NOTHING",
            (id, name, email, phone, department, subjects_json, &now),
        )?;
    }
    tx.commit()?;

    let store = SqliteStore::new(conn);
    let mut slots = 0usize;
    for (id, day, start, end, subject, room, section, faculty_id) in SLOTS {
        let exists: Option<i64> = conn
            .query_row("SELECT 1 FROM timetable WHERE id = ?", [id], |r| r.get(0))
            .optional()?;
        if exists.is_some() {
            continue;
        }
        let slot = LectureSlot {
            id: id.to_string(),
            day: *day,
            start: parse_clock(start)?,
            end: parse_clock(end)?,
            subject: subject.to_string(),
            room: room.to_string(),
            section: section.to_string(),
            faculty_id: Some(faculty_id.to_string()),
        };
        let existing = store.fetch_timetable(Some(section))?;
        if has_conflict(&slot, &existing) {
            warn!(slot = %id, section = %section, "demo slot collides with existing timetable; skipped");
            continue;
        }
        store.insert_lecture_slot(&slot)?;
        slots += 1;
    }

    info!(students, faculty, slots, "demo data seeded");
    Ok(json!({
        "sections": SECTIONS,
        "inserted": { "students": students, "faculty": faculty, "slots": slots }
    }))
}
