use crate::attendance::{self, AttendanceStats, MarkingSession};
use crate::error::AttendifyError;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::handlers::setup::timetable_setup;
use crate::ipc::helpers::{date_param, get_required_str, opt_str, require_db};
use crate::ipc::types::{AppState, Request};
use crate::session::Role;
use crate::store::{AttendanceStore, SqliteStore};
use rusqlite::Connection;
use serde_json::json;
use std::collections::HashMap;
use tracing::info;

fn marking_mut(marking: &mut Option<MarkingSession>) -> Result<&mut MarkingSession, HandlerErr> {
    marking
        .as_mut()
        .ok_or_else(|| AttendifyError::NoActiveSession.into())
}

fn attendance_open(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    state.session.require_staff("attendance.open")?;
    let conn = require_db(&state.db)?;
    let section = match opt_str(&req.params, "section") {
        Some(s) => s,
        None => timetable_setup(conn).map_err(HandlerErr::query)?.default_section,
    };
    let date = date_param(&req.params)?;
    let subject = opt_str(&req.params, "subject");

    let store = SqliteStore::new(conn);
    let roster = store.fetch_roster(&section)?;
    let ids: Vec<String> = roster.iter().map(|r| r.student_id.clone()).collect();
    let previous = store.fetch_attendance(&ids, date)?;

    state.next_generation += 1;
    let session = MarkingSession::open(state.next_generation, &section, date, subject, roster, previous);
    info!(
        section = %section,
        date = %date,
        students = session.roster().len(),
        generation = session.generation(),
        "marking session opened"
    );
    let out = json!({ "session": session.to_json() });
    state.marking = Some(session);
    Ok(out)
}

fn attendance_toggle(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    state.session.require_staff("attendance.toggle")?;
    let student_id = get_required_str(&req.params, "studentId")?;
    let session = marking_mut(&mut state.marking)?;
    let status = session.toggle(&student_id)?;
    Ok(json!({
        "studentId": student_id,
        "status": status.as_str(),
        "session": session.to_json()
    }))
}

fn attendance_mark_all(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    state.session.require_staff("attendance.markAllPresent")?;
    let session = marking_mut(&mut state.marking)?;
    session.mark_all_present()?;
    Ok(json!({ "session": session.to_json() }))
}

fn attendance_submit(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let user = state.session.require_staff("attendance.submit")?;
    let conn = require_db(&state.db)?;
    let session = marking_mut(&mut state.marking)?;
    let stats = attendance::submit(session, &SqliteStore::new(conn), &user.id)?;
    Ok(json!({ "stats": stats.to_json(), "session": session.to_json() }))
}

fn attendance_session(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    state.session.require_staff("attendance.session")?;
    let session = marking_mut(&mut state.marking)?;
    Ok(json!({ "session": session.to_json() }))
}

fn student_names(conn: &Connection) -> Result<HashMap<String, (String, String)>, HandlerErr> {
    let mut stmt = conn
        .prepare("SELECT id, name, enrollment_number FROM students")
        .map_err(HandlerErr::query)?;
    let rows = stmt
        .query_map([], |r| {
            Ok((
                r.get::<_, String>(0)?,
                (r.get::<_, String>(1)?, r.get::<_, String>(2)?),
            ))
        })
        .and_then(|it| it.collect::<Result<HashMap<_, _>, _>>())
        .map_err(HandlerErr::query)?;
    Ok(rows)
}

fn attendance_history(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let user = state.session.require_user()?;
    let conn = require_db(&state.db)?;
    let store = SqliteStore::new(conn);

    let records = match user.role {
        // Students only ever see their own records, whatever they ask for.
        Role::Student => {
            let own = store.student_id_for(user)?;
            store.records_for(None, Some(&own))?
        }
        Role::Admin | Role::Faculty => {
            let section = opt_str(&req.params, "section");
            let student = opt_str(&req.params, "studentId");
            store.records_for(section.as_deref(), student.as_deref())?
        }
    };

    let names = student_names(conn)?;
    let stats = AttendanceStats::from_records(&records);
    let rows: Vec<serde_json::Value> = records
        .iter()
        .map(|r| {
            let (name, enrollment) = names
                .get(&r.student_id)
                .cloned()
                .unwrap_or_default();
            json!({
                "id": r.id,
                "studentId": r.student_id,
                "studentName": name,
                "enrollmentNumber": enrollment,
                "date": r.date.to_string(),
                "status": if r.status { "present" } else { "absent" },
                "markedBy": r.marked_by,
                "section": r.section_ref,
                "subject": r.subject
            })
        })
        .collect();

    Ok(json!({ "records": rows, "stats": stats.to_json() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.open" => Some(respond(&req.id, attendance_open(state, req))),
        "attendance.toggle" => Some(respond(&req.id, attendance_toggle(state, req))),
        "attendance.markAllPresent" => Some(respond(&req.id, attendance_mark_all(state))),
        "attendance.submit" => Some(respond(&req.id, attendance_submit(state))),
        "attendance.session" => Some(respond(&req.id, attendance_session(state))),
        "attendance.history" => Some(respond(&req.id, attendance_history(state, req))),
        _ => None,
    }
}
