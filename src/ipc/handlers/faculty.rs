use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{get_str_array, opt_str, require_db, required_fields};
use crate::ipc::types::{AppState, Request};
use chrono::Utc;
use rusqlite::params_from_iter;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Department {
    ComputerScience,
    InformationTechnology,
    Electronics,
    Mechanical,
    Civil,
}

impl Department {
    const ALL: [Department; 5] = [
        Department::ComputerScience,
        Department::InformationTechnology,
        Department::Electronics,
        Department::Mechanical,
        Department::Civil,
    ];

    fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s.trim()))
    }

    fn as_str(self) -> &'static str {
        match self {
            Department::ComputerScience => "Computer Science",
            Department::InformationTechnology => "Information Technology",
            Department::Electronics => "Electronics",
            Department::Mechanical => "Mechanical",
            Department::Civil => "Civil",
        }
    }
}

/// Trims and drops blanks; a repeated subject (case-insensitive) is an error.
fn normalize_subjects(raw: Vec<String>) -> Result<Vec<String>, String> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for s in raw {
        let s = s.trim().to_string();
        if s.is_empty() {
            continue;
        }
        if out.iter().any(|e| e.eq_ignore_ascii_case(&s)) {
            return Err(s);
        }
        out.push(s);
    }
    Ok(out)
}

fn faculty_list(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    state.session.require_staff("faculty.list")?;
    let conn = require_db(&state.db)?;
    let search = opt_str(&req.params, "search").map(|s| s.to_lowercase());

    let mut stmt = conn
        .prepare(
            "SELECT id, name, email, phone, department, subjects_json
             FROM faculty
             ORDER BY name",
        )
        .map_err(HandlerErr::query)?;
    let rows = stmt
        .query_map([], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, Option<String>>(3)?,
                r.get::<_, String>(4)?,
                r.get::<_, String>(5)?,
            ))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(HandlerErr::query)?;

    let mut faculty = Vec::new();
    for (id, name, email, phone, department, subjects_json) in rows {
        if let Some(n) = &search {
            let hit = [&name, &email, &department]
                .iter()
                .any(|f| f.to_lowercase().contains(n.as_str()));
            if !hit {
                continue;
            }
        }
        let subjects: Vec<String> = serde_json::from_str(&subjects_json).unwrap_or_else(|e| {
            warn!(faculty = %id, error = %e, "unreadable subjects list");
            Vec::new()
        });
        faculty.push(json!({
            "id": id,
            "name": name,
            "email": email,
            "phone": phone,
            "department": department,
            "subjects": subjects
        }));
    }
    Ok(json!({ "faculty": faculty }))
}

fn faculty_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    state.session.require_admin("faculty.create")?;
    let conn = require_db(&state.db)?;
    let p = &req.params;
    let fields = required_fields(p, &["name", "email", "department"])?;
    let [name, email, department_raw]: [String; 3] = fields
        .try_into()
        .map_err(|_| HandlerErr::bad_params("unexpected field count"))?;
    let Some(department) = Department::parse(&department_raw) else {
        let allowed: Vec<&str> = Department::ALL.iter().map(|d| d.as_str()).collect();
        return Err(HandlerErr::bad_params(format!("unknown department: {}", department_raw))
            .with_details(json!({ "allowed": allowed })));
    };
    let raw_subjects = if p.get("subjects").is_some() {
        get_str_array(p, "subjects")?
    } else {
        Vec::new()
    };
    let subjects = normalize_subjects(raw_subjects).map_err(|dup| {
        HandlerErr::new("duplicate", format!("subject listed twice: {}", dup))
            .with_details(json!({ "subject": dup }))
    })?;
    let phone = opt_str(p, "phone");

    let id = Uuid::new_v4().to_string();
    let subjects_json = serde_json::to_string(&subjects).map_err(|e| HandlerErr::bad_params(e.to_string()))?;
    conn.execute(
        "INSERT INTO faculty(id, name, email, phone, department, subjects_json, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &id,
            &name,
            &email,
            &phone,
            department.as_str(),
            &subjects_json,
            Utc::now().to_rfc3339(),
        ),
    )
    .map_err(|e| {
        HandlerErr::new("db_insert_failed", e.to_string()).with_details(json!({ "table": "faculty" }))
    })?;
    info!(faculty = %id, department = department.as_str(), "faculty created");

    Ok(json!({
        "faculty": {
            "id": id,
            "name": name,
            "email": email,
            "phone": phone,
            "department": department.as_str(),
            "subjects": subjects
        }
    }))
}

fn faculty_delete(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    state.session.require_admin("faculty.delete")?;
    let ids = get_str_array(&req.params, "ids")?;
    if ids.is_empty() {
        return Err(HandlerErr::bad_params("ids must not be empty"));
    }
    let conn = require_db(&state.db)?;
    let placeholders = vec!["?"; ids.len()].join(", ");

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    // Their lectures stay on the timetable without an owner.
    tx.execute(
        &format!("UPDATE timetable SET faculty_id = NULL WHERE faculty_id IN ({})", placeholders),
        params_from_iter(ids.iter()),
    )
    .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;
    let deleted = tx
        .execute(
            &format!("DELETE FROM faculty WHERE id IN ({})", placeholders),
            params_from_iter(ids.iter()),
        )
        .map_err(|e| HandlerErr::new("db_delete_failed", e.to_string()))?;
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;
    info!(deleted, "faculty deleted");
    Ok(json!({ "deleted": deleted }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "faculty.list" => Some(respond(&req.id, faculty_list(state, req))),
        "faculty.create" => Some(respond(&req.id, faculty_create(state, req))),
        "faculty.delete" => Some(respond(&req.id, faculty_delete(state, req))),
        _ => None,
    }
}
