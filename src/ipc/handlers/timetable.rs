use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::handlers::setup::timetable_setup;
use crate::ipc::helpers::{opt_str, require_db};
use crate::ipc::types::{AppState, Request};
use crate::lecture_form::{DraftPatch, LectureForm};
use crate::schedule::{group_by_day, LectureSlot, Weekday};
use crate::session::Role;
use crate::store::{AttendanceStore, SqliteStore};
use crate::timefmt::DisplayFormat;
use rusqlite::Connection;
use serde_json::json;
use tracing::{info, warn};

fn slot_json(slot: &LectureSlot, fmt: DisplayFormat) -> serde_json::Value {
    json!({
        "id": slot.id,
        "day": slot.day.as_str(),
        "startTime": fmt.render(slot.start),
        "endTime": fmt.render(slot.end),
        "startMinute": slot.start.minutes(),
        "endMinute": slot.end.minutes(),
        "subject": slot.subject,
        "room": slot.room,
        "section": slot.section,
        "facultyId": slot.faculty_id
    })
}

fn known_sections(conn: &Connection) -> Result<Vec<String>, HandlerErr> {
    let mut stmt = conn
        .prepare(
            "SELECT section FROM timetable
             UNION
             SELECT section FROM students
             ORDER BY 1",
        )
        .map_err(HandlerErr::query)?;
    stmt.query_map([], |r| r.get(0))
        .and_then(|it| it.collect::<Result<Vec<String>, _>>())
        .map_err(HandlerErr::query)
}

fn timetable_list(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let user = state.session.require_user()?;
    let conn = require_db(&state.db)?;
    let setup = timetable_setup(conn).map_err(HandlerErr::query)?;

    // Students only ever see their own section.
    let section = match user.role {
        Role::Student => user.section.clone().unwrap_or_default(),
        Role::Admin | Role::Faculty => {
            opt_str(&req.params, "section").unwrap_or_else(|| setup.default_section.clone())
        }
    };
    let fmt = setup.format();

    let slots = SqliteStore::new(conn).fetch_timetable(Some(&section))?;
    let days: Vec<serde_json::Value> = group_by_day(&slots, &section)
        .into_iter()
        .map(|(day, slots)| {
            json!({
                "day": day.as_str(),
                "slots": slots.iter().map(|s| slot_json(s, fmt)).collect::<Vec<_>>()
            })
        })
        .collect();

    Ok(json!({
        "section": section,
        "displayFormat": fmt.as_str(),
        "sections": known_sections(conn)?,
        "days": days
    }))
}

fn ensure_form<'a>(
    form: &'a mut Option<LectureForm>,
    conn: &Connection,
) -> Result<&'a mut LectureForm, HandlerErr> {
    if form.is_none() {
        let setup = timetable_setup(conn).map_err(HandlerErr::query)?;
        *form = Some(LectureForm::new(&setup.default_section));
    }
    form.as_mut()
        .ok_or_else(|| HandlerErr::new("internal", "lecture form unavailable"))
}

fn draft_patch(params: &serde_json::Value) -> Result<DraftPatch, HandlerErr> {
    let text = |k: &str| params.get(k).and_then(|v| v.as_str()).map(|s| s.to_string());
    let day = match text("day") {
        None => None,
        Some(raw) => Some(
            Weekday::parse(&raw)
                .ok_or_else(|| HandlerErr::bad_params(format!("unknown day: {}", raw)))?,
        ),
    };
    Ok(DraftPatch {
        day,
        section: text("section"),
        start: text("startTime"),
        end: text("endTime"),
        subject: text("subject"),
        room: text("room"),
    })
}

fn has_patch_fields(params: &serde_json::Value) -> bool {
    ["day", "section", "startTime", "endTime", "subject", "room"]
        .iter()
        .any(|k| params.get(k).is_some())
}

fn timetable_form(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    state.session.require_staff("timetable.form")?;
    let conn = require_db(&state.db)?;
    let form = ensure_form(&mut state.form, conn)?;
    if has_patch_fields(&req.params) {
        form.edit(draft_patch(&req.params)?);
    }
    Ok(json!({ "form": form.to_json() }))
}

fn timetable_add(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let user = state.session.require_staff("timetable.add")?;
    let conn = require_db(&state.db)?;
    let fmt = timetable_setup(conn).map_err(HandlerErr::query)?.format();
    let form = ensure_form(&mut state.form, conn)?;
    form.edit(draft_patch(&req.params)?);

    let store = SqliteStore::new(conn);
    let section = form.draft().section.trim().to_string();
    let existing = store.fetch_timetable(Some(&section))?;
    let slot = match form.validate(&existing, Some(&user.id)) {
        Ok(slot) => slot,
        Err(e) => {
            if e.is_validation() {
                info!(section = %section, reason = e.code(), "lecture rejected");
            } else {
                warn!(section = %section, error = %e, "lecture validation failed");
            }
            return Err(e.into());
        }
    };

    match store.insert_lecture_slot(&slot) {
        Ok(saved) => {
            form.accept();
            info!(
                slot = %saved.id,
                section = %saved.section,
                day = saved.day.as_str(),
                start = %saved.start,
                end = %saved.end,
                "lecture added"
            );
            Ok(json!({ "slot": slot_json(&saved, fmt), "form": form.to_json() }))
        }
        Err(e) => {
            warn!(section = %section, error = %e, "lecture insert failed");
            form.reject(e.clone());
            Err(e.into())
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "timetable.list" => Some(respond(&req.id, timetable_list(state, req))),
        "timetable.form" => Some(respond(&req.id, timetable_form(state, req))),
        "timetable.add" => Some(respond(&req.id, timetable_add(state, req))),
        _ => None,
    }
}
