//! Data-access collaborator for the domain workflows.
//!
//! Domain code talks to [`AttendanceStore`]; [`SqliteStore`] is the workspace
//! implementation.

use crate::attendance::{AttendanceRecord, NewAttendanceRecord, RosterEntry, StoredStatus};
use crate::error::AttendifyError;
use crate::schedule::{check_conflict, LectureSlot, Weekday};
use crate::session::User;
use crate::timefmt::ClockTime;
use chrono::{NaiveDate, Utc};
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use tracing::{debug, warn};
use uuid::Uuid;

pub trait AttendanceStore {
    fn fetch_roster(&self, section: &str) -> Result<Vec<RosterEntry>, AttendifyError>;

    fn fetch_attendance(
        &self,
        student_ids: &[String],
        date: NaiveDate,
    ) -> Result<Vec<StoredStatus>, AttendifyError>;

    /// Writes all records or none of them.
    fn upsert_attendance(&self, records: &[NewAttendanceRecord]) -> Result<(), AttendifyError>;

    fn fetch_timetable(&self, section: Option<&str>) -> Result<Vec<LectureSlot>, AttendifyError>;

    fn insert_lecture_slot(&self, slot: &LectureSlot) -> Result<LectureSlot, AttendifyError>;
}

pub struct SqliteStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Stored attendance, newest first, narrowed by section and/or student.
    pub fn records_for(
        &self,
        section: Option<&str>,
        student_id: Option<&str>,
    ) -> Result<Vec<AttendanceRecord>, AttendifyError> {
        let mut sql = String::from(
            "SELECT id, student_id, date, status, marked_by, section_ref, subject
             FROM attendance
             WHERE 1 = 1",
        );
        let mut args: Vec<String> = Vec::new();
        if let Some(s) = section {
            sql.push_str(" AND section_ref = ?");
            args.push(s.to_string());
        }
        if let Some(id) = student_id {
            sql.push_str(" AND student_id = ?");
            args.push(id.to_string());
        }
        sql.push_str(" ORDER BY date DESC, student_id");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(args.iter()), |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, i64>(3)?,
                    r.get::<_, String>(4)?,
                    r.get::<_, String>(5)?,
                    r.get::<_, Option<String>>(6)?,
                ))
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;

        let mut out = Vec::with_capacity(rows.len());
        for (id, student_id, date, status, marked_by, section_ref, subject) in rows {
            let Ok(date) = NaiveDate::parse_from_str(&date, "%Y-%m-%d") else {
                warn!(record = %id, date = %date, "skipping attendance row with bad date");
                continue;
            };
            out.push(AttendanceRecord {
                id,
                student_id,
                date,
                status: status != 0,
                marked_by,
                section_ref,
                subject,
            });
        }
        Ok(out)
    }

    /// The students-table id behind a student identity. Identities that carry
    /// an enrollment number are resolved through it; otherwise the identity
    /// id is taken to be the student id.
    pub fn student_id_for(&self, user: &User) -> Result<String, AttendifyError> {
        let Some(enrollment) = user.enrollment_number.as_deref() else {
            return Ok(user.id.clone());
        };
        let found: Option<String> = self
            .conn
            .query_row(
                "SELECT id FROM students WHERE enrollment_number = ?",
                [enrollment],
                |r| r.get(0),
            )
            .optional()?;
        Ok(found.unwrap_or_else(|| user.id.clone()))
    }

    /// Present/total counts per student, for students with at least one record.
    pub fn counts_by_student(&self) -> Result<Vec<(String, usize, usize)>, AttendifyError> {
        let mut stmt = self.conn.prepare(
            "SELECT student_id, SUM(CASE WHEN status != 0 THEN 1 ELSE 0 END), COUNT(*)
             FROM attendance
             GROUP BY student_id",
        )?;
        let rows = stmt
            .query_map([], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, i64>(1)? as usize,
                    r.get::<_, i64>(2)? as usize,
                ))
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
        Ok(rows)
    }
}

fn slot_from_row(r: &Row<'_>) -> rusqlite::Result<(String, String, i64, i64, String, String, String, Option<String>)> {
    Ok((
        r.get(0)?,
        r.get(1)?,
        r.get(2)?,
        r.get(3)?,
        r.get(4)?,
        r.get(5)?,
        r.get(6)?,
        r.get(7)?,
    ))
}

fn read_slots(conn: &Connection, section: Option<&str>) -> Result<Vec<LectureSlot>, AttendifyError> {
    let mut sql = String::from(
        "SELECT id, day, start_minute, end_minute, subject, room, section, faculty_id
         FROM timetable",
    );
    let mut args: Vec<&str> = Vec::new();
    if let Some(s) = section {
        sql.push_str(" WHERE section = ?");
        args.push(s);
    }
    sql.push_str(" ORDER BY section, start_minute");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(args.iter()), slot_from_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;

    let mut slots = Vec::with_capacity(rows.len());
    for (id, day, start, end, subject, room, section, faculty_id) in rows {
        let day_parsed = Weekday::parse(&day);
        let start_t = u16::try_from(start).ok().and_then(ClockTime::from_minutes);
        let end_t = u16::try_from(end).ok().and_then(ClockTime::from_minutes);
        let (Some(day), Some(start), Some(end)) = (day_parsed, start_t, end_t) else {
            warn!(slot = %id, day = %day, start, end, "skipping malformed timetable row");
            continue;
        };
        slots.push(LectureSlot {
            id,
            day,
            start,
            end,
            subject,
            room,
            section,
            faculty_id,
        });
    }
    Ok(slots)
}

impl AttendanceStore for SqliteStore<'_> {
    fn fetch_roster(&self, section: &str) -> Result<Vec<RosterEntry>, AttendifyError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, enrollment_number
             FROM students
             WHERE section = ?
             ORDER BY name",
        )?;
        let roster = stmt
            .query_map([section], |r| {
                Ok(RosterEntry {
                    student_id: r.get(0)?,
                    name: r.get(1)?,
                    registration_number: r.get(2)?,
                })
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
        Ok(roster)
    }

    fn fetch_attendance(
        &self,
        student_ids: &[String],
        date: NaiveDate,
    ) -> Result<Vec<StoredStatus>, AttendifyError> {
        if student_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; student_ids.len()].join(", ");
        let sql = format!(
            "SELECT student_id, status FROM attendance WHERE date = ? AND student_id IN ({})",
            placeholders
        );
        let date_s = date.format("%Y-%m-%d").to_string();
        let args = std::iter::once(&date_s).chain(student_ids.iter());
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(args), |r| {
                Ok(StoredStatus {
                    student_id: r.get(0)?,
                    status: r.get::<_, i64>(1)? != 0,
                })
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
        Ok(rows)
    }

    fn upsert_attendance(&self, records: &[NewAttendanceRecord]) -> Result<(), AttendifyError> {
        let tx = self.conn.unchecked_transaction()?;
        let now = Utc::now().to_rfc3339();
        {
            let mut stmt = tx.prepare(
                "INSERT INTO attendance(id, student_id, date, status, marked_by, section_ref, subject, created_at)
                 VALUES(?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(student_id, date) DO UPDATE SET
                   status = excluded.status,
                   marked_by = excluded.marked_by,
                   section_ref = excluded.section_ref,
                   subject = excluded.subject",
            )?;
            for r in records {
                stmt.execute((
                    Uuid::new_v4().to_string(),
                    &r.student_id,
                    r.date.format("%Y-%m-%d").to_string(),
                    r.status as i64,
                    &r.marked_by,
                    &r.section_ref,
                    &r.subject,
                    &now,
                ))?;
            }
        }
        // Dropping an uncommitted transaction rolls it back.
        tx.commit()?;
        debug!(rows = records.len(), "attendance upserted");
        Ok(())
    }

    fn fetch_timetable(&self, section: Option<&str>) -> Result<Vec<LectureSlot>, AttendifyError> {
        read_slots(self.conn, section)
    }

    fn insert_lecture_slot(&self, slot: &LectureSlot) -> Result<LectureSlot, AttendifyError> {
        let tx = self.conn.unchecked_transaction()?;
        let existing = read_slots(&tx, Some(&slot.section))?;
        check_conflict(slot, &existing)?;
        tx.execute(
            "INSERT INTO timetable(id, section, day, start_minute, end_minute, subject, room, faculty_id, created_at)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                &slot.id,
                &slot.section,
                slot.day.as_str(),
                slot.start.minutes() as i64,
                slot.end.minutes() as i64,
                &slot.subject,
                &slot.room,
                &slot.faculty_id,
                Utc::now().to_rfc3339(),
            ),
        )?;
        tx.commit()?;
        Ok(slot.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::timefmt::parse_clock;

    fn add_student(conn: &Connection, id: &str, name: &str, section: &str) {
        conn.execute(
            "INSERT INTO students(id, name, email, enrollment_number, semester, branch, section, created_at)
             VALUES(?, ?, ?, ?, '5', 'CSE', ?, '')",
            (id, name, format!("{id}@example.edu"), format!("EN-{id}"), section),
        )
        .expect("student");
    }

    fn record(student_id: &str, date: NaiveDate, status: bool) -> NewAttendanceRecord {
        NewAttendanceRecord {
            student_id: student_id.to_string(),
            date,
            status,
            marked_by: "fac-1".to_string(),
            section_ref: "CS-301".to_string(),
            subject: None,
        }
    }

    #[test]
    fn resubmitting_same_day_keeps_one_row_per_student() {
        let conn = db::open_in_memory().expect("db");
        add_student(&conn, "s1", "Ann", "CS-301");
        add_student(&conn, "s2", "Ben", "CS-301");
        let store = SqliteStore::new(&conn);
        let day = NaiveDate::from_ymd_opt(2025, 4, 21).unwrap();

        store
            .upsert_attendance(&[record("s1", day, true), record("s2", day, true)])
            .unwrap();
        store
            .upsert_attendance(&[record("s1", day, false), record("s2", day, true)])
            .unwrap();

        let rows = store.records_for(Some("CS-301"), None).unwrap();
        assert_eq!(rows.len(), 2);
        let s1 = rows.iter().find(|r| r.student_id == "s1").unwrap();
        assert!(!s1.status);

        let prev = store
            .fetch_attendance(&["s1".to_string(), "s2".to_string()], day)
            .unwrap();
        assert_eq!(prev.len(), 2);
    }

    #[test]
    fn failed_batch_writes_nothing() {
        let conn = db::open_in_memory().expect("db");
        add_student(&conn, "s1", "Ann", "CS-301");
        let store = SqliteStore::new(&conn);
        let day = NaiveDate::from_ymd_opt(2025, 4, 21).unwrap();
        // "ghost" violates the students foreign key.
        let e = store
            .upsert_attendance(&[record("s1", day, true), record("ghost", day, true)])
            .unwrap_err();
        assert_eq!(e.code(), "remote_write_failed");
        assert!(store.records_for(None, None).unwrap().is_empty());
    }

    #[test]
    fn roster_is_scoped_to_section() {
        let conn = db::open_in_memory().expect("db");
        add_student(&conn, "s1", "Zed", "CS-301");
        add_student(&conn, "s2", "Amy", "CS-301");
        add_student(&conn, "s3", "Max", "IT-501");
        let roster = SqliteStore::new(&conn).fetch_roster("CS-301").unwrap();
        let names: Vec<&str> = roster.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Amy", "Zed"]);
    }

    #[test]
    fn slot_insert_rechecks_conflicts() {
        let conn = db::open_in_memory().expect("db");
        let store = SqliteStore::new(&conn);
        let mk = |id: &str, start: &str, end: &str| LectureSlot {
            id: id.to_string(),
            day: Weekday::Monday,
            start: parse_clock(start).unwrap(),
            end: parse_clock(end).unwrap(),
            subject: "Data Structures".to_string(),
            room: "Room 204".to_string(),
            section: "CS-301".to_string(),
            faculty_id: Some("fac-1".to_string()),
        };
        store.insert_lecture_slot(&mk("a", "09:00 AM", "10:00 AM")).unwrap();
        store.insert_lecture_slot(&mk("b", "10:00", "11:00")).unwrap();
        let e = store.insert_lecture_slot(&mk("c", "10:30", "11:30")).unwrap_err();
        assert_eq!(e.code(), "conflict");

        let slots = store.fetch_timetable(Some("CS-301")).unwrap();
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].start.to_string(), "09:00");
        assert_eq!(slots[1].faculty_id.as_deref(), Some("fac-1"));
        assert!(store.fetch_timetable(Some("IT-501")).unwrap().is_empty());
    }
}
