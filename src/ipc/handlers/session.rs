use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{get_required_str, opt_str};
use crate::ipc::types::{AppState, Request};
use crate::session::{Role, User};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

fn sign_in(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let p = &req.params;
    let role_raw = get_required_str(p, "role")?;
    let Some(role) = Role::parse(&role_raw) else {
        return Err(HandlerErr::bad_params("role must be one of: admin, faculty, student"));
    };
    let user = User {
        id: opt_str(p, "id").unwrap_or_else(|| Uuid::new_v4().to_string()),
        name: get_required_str(p, "name")?,
        email: get_required_str(p, "email")?,
        role,
        section: opt_str(p, "section"),
        enrollment_number: opt_str(p, "enrollmentNumber"),
    };
    state.session.sign_in(user)?;
    // A different identity must not inherit the previous user's marking session.
    state.reset_workflows();
    let user = state.session.require_user()?;
    info!(user = %user.id, role = user.role.as_str(), "signed in");
    Ok(json!({ "user": user.to_json() }))
}

fn sign_out(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    if let Some(u) = state.session.user() {
        info!(user = %u.id, "signed out");
    }
    state.session.sign_out();
    state.reset_workflows();
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "session.signIn" => Some(respond(&req.id, sign_in(state, req))),
        "session.signOut" => Some(respond(&req.id, sign_out(state))),
        "session.get" => Some(respond(&req.id, Ok(state.session.to_json()))),
        _ => None,
    }
}
