use crate::attendance::percentage;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::handlers::setup::attendance_setup;
use crate::ipc::helpers::{get_str_array, opt_str, require_db, required_fields};
use crate::ipc::types::{AppState, Request};
use crate::store::SqliteStore;
use chrono::Utc;
use rusqlite::{params_from_iter, OptionalExtension};
use serde_json::json;
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct StudentRow {
    id: String,
    name: String,
    email: String,
    enrollment_number: String,
    semester: String,
    branch: String,
    section: String,
}

impl StudentRow {
    fn matches(&self, needle: &str) -> bool {
        [&self.name, &self.email, &self.enrollment_number]
            .iter()
            .any(|f| f.to_lowercase().contains(needle))
    }
}

fn students_list(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    state.session.require_staff("students.list")?;
    let conn = require_db(&state.db)?;
    let section = opt_str(&req.params, "section");
    let search = opt_str(&req.params, "search").map(|s| s.to_lowercase());

    let mut sql = String::from(
        "SELECT id, name, email, enrollment_number, semester, branch, section FROM students",
    );
    let mut args: Vec<String> = Vec::new();
    if let Some(s) = &section {
        sql.push_str(" WHERE section = ?");
        args.push(s.clone());
    }
    sql.push_str(" ORDER BY section, name");

    let mut stmt = conn.prepare(&sql).map_err(HandlerErr::query)?;
    let rows = stmt
        .query_map(params_from_iter(args.iter()), |r| {
            Ok(StudentRow {
                id: r.get(0)?,
                name: r.get(1)?,
                email: r.get(2)?,
                enrollment_number: r.get(3)?,
                semester: r.get(4)?,
                branch: r.get(5)?,
                section: r.get(6)?,
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(HandlerErr::query)?;

    let counts: HashMap<String, (usize, usize)> = SqliteStore::new(conn)
        .counts_by_student()?
        .into_iter()
        .map(|(id, present, total)| (id, (present, total)))
        .collect();
    let threshold = attendance_setup(conn)
        .map_err(HandlerErr::query)?
        .low_attendance_threshold;

    let students: Vec<serde_json::Value> = rows
        .into_iter()
        .filter(|s| search.as_deref().map_or(true, |n| s.matches(n)))
        .map(|s| {
            let (present, total) = counts.get(&s.id).copied().unwrap_or((0, 0));
            let pct = percentage(present, total);
            json!({
                "id": s.id,
                "name": s.name,
                "email": s.email,
                "enrollmentNumber": s.enrollment_number,
                "semester": s.semester,
                "branch": s.branch,
                "section": s.section,
                "attendance": { "present": present, "total": total, "percentage": pct },
                // Students with no records yet are not flagged.
                "lowAttendance": total > 0 && pct < threshold
            })
        })
        .collect();

    Ok(json!({ "students": students, "lowAttendanceThreshold": threshold }))
}

fn students_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    state.session.require_staff("students.create")?;
    let conn = require_db(&state.db)?;
    let fields = required_fields(
        &req.params,
        &["name", "email", "enrollmentNumber", "semester", "branch", "section"],
    )?;
    let [name, email, enrollment, semester, branch, section]: [String; 6] = fields
        .try_into()
        .map_err(|_| HandlerErr::bad_params("unexpected field count"))?;
    if !email.contains('@') {
        return Err(HandlerErr::bad_params("email must be an email address"));
    }

    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM students WHERE enrollment_number = ?",
            [&enrollment],
            |r| r.get(0),
        )
        .optional()
        .map_err(HandlerErr::query)?;
    if let Some(id) = existing {
        return Err(HandlerErr::new(
            "duplicate",
            format!("enrollment number {} is already registered", enrollment),
        )
        .with_details(json!({ "studentId": id })));
    }

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO students(id, name, email, enrollment_number, semester, branch, section, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (&id, &name, &email, &enrollment, &semester, &branch, &section, Utc::now().to_rfc3339()),
    )
    .map_err(|e| {
        HandlerErr::new("db_insert_failed", e.to_string()).with_details(json!({ "table": "students" }))
    })?;
    info!(student = %id, section = %section, "student created");

    Ok(json!({
        "student": {
            "id": id,
            "name": name,
            "email": email,
            "enrollmentNumber": enrollment,
            "semester": semester,
            "branch": branch,
            "section": section
        }
    }))
}

fn students_delete(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    state.session.require_staff("students.delete")?;
    let ids = get_str_array(&req.params, "ids")?;
    if ids.is_empty() {
        return Err(HandlerErr::bad_params("ids must not be empty"));
    }
    let conn = require_db(&state.db)?;
    let placeholders = vec!["?"; ids.len()].join(", ");

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    // Attendance references students, so it goes first.
    let removed_records = tx
        .execute(
            &format!("DELETE FROM attendance WHERE student_id IN ({})", placeholders),
            params_from_iter(ids.iter()),
        )
        .map_err(|e| HandlerErr::new("db_delete_failed", e.to_string()))?;
    let deleted = tx
        .execute(
            &format!("DELETE FROM students WHERE id IN ({})", placeholders),
            params_from_iter(ids.iter()),
        )
        .map_err(|e| HandlerErr::new("db_delete_failed", e.to_string()))?;
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;

    let roster_touched = state
        .marking
        .as_ref()
        .is_some_and(|m| m.roster().iter().any(|r| ids.contains(&r.student_id)));
    if roster_touched {
        state.marking = None;
        state.next_generation += 1;
    }
    info!(deleted, removed_records, "students deleted");

    Ok(json!({
        "deleted": deleted,
        "attendanceRemoved": removed_records,
        "markingClosed": roster_touched
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(respond(&req.id, students_list(state, req))),
        "students.create" => Some(respond(&req.id, students_create(state, req))),
        "students.delete" => Some(respond(&req.id, students_delete(state, req))),
        _ => None,
    }
}
