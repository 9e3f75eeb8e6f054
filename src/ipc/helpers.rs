use crate::error::AttendifyError;
use crate::ipc::error::HandlerErr;
use chrono::{Local, NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use serde_json::Value;

pub fn require_db(db: &Option<Connection>) -> Result<&Connection, HandlerErr> {
    db.as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

/// Trimmed string param; blank counts as absent.
pub fn opt_str(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn get_required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    opt_str(params, key).ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

/// Collects every blank field up front so the caller can report them together.
pub fn required_fields(params: &Value, keys: &[&str]) -> Result<Vec<String>, AttendifyError> {
    let mut values = Vec::with_capacity(keys.len());
    let mut missing = Vec::new();
    for k in keys {
        match opt_str(params, k) {
            Some(v) => values.push(v),
            None => missing.push(k.to_string()),
        }
    }
    if !missing.is_empty() {
        return Err(AttendifyError::MissingFields { fields: missing });
    }
    Ok(values)
}

pub fn get_str_array(params: &Value, key: &str) -> Result<Vec<String>, HandlerErr> {
    let Some(arr) = params.get(key).and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params(format!("{} must be an array", key)));
    };
    arr.iter()
        .map(|v| {
            v.as_str()
                .map(|s| s.to_string())
                .ok_or_else(|| HandlerErr::bad_params(format!("{} must contain strings", key)))
        })
        .collect()
}

/// `params.date` as YYYY-MM-DD, defaulting to today.
pub fn date_param(params: &Value) -> Result<NaiveDate, HandlerErr> {
    match opt_str(params, "date") {
        None => Ok(Local::now().date_naive()),
        Some(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .map_err(|_| HandlerErr::bad_params("date must be YYYY-MM-DD")),
    }
}

/// `params.now` as an ISO local timestamp, defaulting to the wall clock.
pub fn now_param(params: &Value) -> Result<NaiveDateTime, HandlerErr> {
    match opt_str(params, "now") {
        None => Ok(Local::now().naive_local()),
        Some(s) => NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S")
            .or_else(|_| NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M"))
            .map_err(|_| HandlerErr::bad_params("now must be YYYY-MM-DDTHH:MM[:SS]")),
    }
}
