//! Per-role landing summaries.

use crate::attendance::{percentage, AttendanceStats};
use crate::error::AttendifyError;
use crate::schedule::{LectureSlot, Weekday};
use crate::session::{Role, User};
use crate::store::{AttendanceStore, SqliteStore};
use crate::timefmt::to_12_hour;
use chrono::{Datelike, NaiveDateTime, Timelike};
use rusqlite::Connection;
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminDashboard {
    pub total_students: usize,
    pub total_faculty: usize,
    pub departments: usize,
    pub total_slots: usize,
    pub overall_percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacultyDashboard {
    pub my_slots: usize,
    pub my_students: usize,
    pub today: Vec<LectureSlot>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentDashboard {
    pub section: String,
    pub stats: AttendanceStats,
    pub today: Vec<LectureSlot>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dashboard {
    Admin(AdminDashboard),
    Faculty(FacultyDashboard),
    Student(StudentDashboard),
}

pub fn greeting(now: NaiveDateTime) -> &'static str {
    match now.hour() {
        0..=11 => "Good Morning",
        12..=17 => "Good Afternoon",
        _ => "Good Evening",
    }
}

fn count(conn: &Connection, sql: &str) -> Result<usize, AttendifyError> {
    let n: i64 = conn.query_row(sql, [], |r| r.get(0))?;
    Ok(n.max(0) as usize)
}

/// Slots on `now`'s weekday, earliest first. Sundays have none.
fn todays(mut slots: Vec<LectureSlot>, now: NaiveDateTime) -> Vec<LectureSlot> {
    let Some(today) = Weekday::from_chrono(now.weekday()) else {
        return Vec::new();
    };
    slots.retain(|s| s.day == today);
    slots.sort_by_key(|s| (s.start, s.end));
    slots
}

impl Dashboard {
    pub fn load(conn: &Connection, user: &User, now: NaiveDateTime) -> Result<Self, AttendifyError> {
        match user.role {
            Role::Admin => Self::load_admin(conn).map(Dashboard::Admin),
            Role::Faculty => Self::load_faculty(conn, user, now).map(Dashboard::Faculty),
            Role::Student => Self::load_student(conn, user, now).map(Dashboard::Student),
        }
    }

    fn load_admin(conn: &Connection) -> Result<AdminDashboard, AttendifyError> {
        let (present, total): (i64, i64) = conn.query_row(
            "SELECT COALESCE(SUM(CASE WHEN status != 0 THEN 1 ELSE 0 END), 0), COUNT(*)
             FROM attendance",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?;
        Ok(AdminDashboard {
            total_students: count(conn, "SELECT COUNT(*) FROM students")?,
            total_faculty: count(conn, "SELECT COUNT(*) FROM faculty")?,
            departments: count(conn, "SELECT COUNT(DISTINCT department) FROM faculty")?,
            total_slots: count(conn, "SELECT COUNT(*) FROM timetable")?,
            overall_percentage: percentage(present.max(0) as usize, total.max(0) as usize),
        })
    }

    fn load_faculty(
        conn: &Connection,
        user: &User,
        now: NaiveDateTime,
    ) -> Result<FacultyDashboard, AttendifyError> {
        let mine: Vec<LectureSlot> = SqliteStore::new(conn)
            .fetch_timetable(None)?
            .into_iter()
            .filter(|s| s.faculty_id.as_deref() == Some(user.id.as_str()))
            .collect();
        let my_students: i64 = conn.query_row(
            "SELECT COUNT(*) FROM students
             WHERE section IN (SELECT DISTINCT section FROM timetable WHERE faculty_id = ?)",
            [&user.id],
            |r| r.get(0),
        )?;
        Ok(FacultyDashboard {
            my_slots: mine.len(),
            my_students: my_students.max(0) as usize,
            today: todays(mine, now),
        })
    }

    fn load_student(
        conn: &Connection,
        user: &User,
        now: NaiveDateTime,
    ) -> Result<StudentDashboard, AttendifyError> {
        let store = SqliteStore::new(conn);
        let section = user.section.clone().unwrap_or_default();
        let student_id = store.student_id_for(user)?;
        let records = store.records_for(None, Some(&student_id))?;
        let slots = store.fetch_timetable(Some(&section))?;
        Ok(StudentDashboard {
            section,
            stats: AttendanceStats::from_records(&records),
            today: todays(slots, now),
        })
    }

    pub fn role(&self) -> Role {
        match self {
            Dashboard::Admin(_) => Role::Admin,
            Dashboard::Faculty(_) => Role::Faculty,
            Dashboard::Student(_) => Role::Student,
        }
    }

    pub fn to_json(&self, user: &User, now: NaiveDateTime) -> serde_json::Value {
        let mut out = json!({
            "role": self.role().as_str(),
            "greeting": greeting(now),
            "name": user.name,
            "date": now.date().to_string(),
        });
        let cards = match self {
            Dashboard::Admin(d) => json!({
                "totalStudents": d.total_students,
                "totalFaculty": d.total_faculty,
                "departments": d.departments,
                "totalSlots": d.total_slots,
                "overallPercentage": d.overall_percentage
            }),
            Dashboard::Faculty(d) => json!({
                "mySlots": d.my_slots,
                "myStudents": d.my_students,
                "today": slots_json(&d.today)
            }),
            Dashboard::Student(d) => json!({
                "section": d.section,
                "stats": d.stats.to_json(),
                "today": slots_json(&d.today)
            }),
        };
        out["cards"] = cards;
        out
    }
}

fn slots_json(slots: &[LectureSlot]) -> Vec<serde_json::Value> {
    slots
        .iter()
        .map(|s| {
            json!({
                "id": s.id,
                "subject": s.subject,
                "room": s.room,
                "section": s.section,
                "startTime": to_12_hour(s.start),
                "endTime": to_12_hour(s.end)
            })
        })
        .collect()
}
