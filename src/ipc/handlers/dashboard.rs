use crate::dashboard::Dashboard;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{now_param, require_db};
use crate::ipc::types::{AppState, Request};

fn dashboard_get(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let user = state.session.require_user()?;
    let conn = require_db(&state.db)?;
    let now = now_param(&req.params)?;
    let dashboard = Dashboard::load(conn, user, now)?;
    Ok(dashboard.to_json(user, now))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "dashboard.get" => Some(respond(&req.id, dashboard_get(state, req))),
        _ => None,
    }
}
