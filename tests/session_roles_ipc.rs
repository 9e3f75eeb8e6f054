mod test_support;

use serde_json::json;
use test_support::{open_workspace, request_err, request_ok, sign_in, spawn_sidecar};

#[test]
fn signed_out_callers_are_turned_away() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = open_workspace(&mut stdin, &mut reader, "attendify-session-anon");

    let s = request_ok(&mut stdin, &mut reader, "1", "session.get", json!({}));
    assert_eq!(s["authenticated"], false);

    for (i, method) in ["timetable.list", "dashboard.get", "attendance.history", "students.list"]
        .iter()
        .enumerate()
    {
        let code = request_err(&mut stdin, &mut reader, &i.to_string(), method, json!({}));
        assert_eq!(code, "not_authenticated", "{method}");
    }

    let code = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "session.signIn",
        json!({ "name": "Sam", "email": "sam@example.edu", "role": "student" }),
    );
    assert_eq!(code, "missing_fields");

    let code = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "session.signIn",
        json!({ "name": "Sam", "email": "sam@example.edu", "role": "janitor" }),
    );
    assert_eq!(code, "bad_params");
}

#[test]
fn students_cannot_edit_timetable_or_mark_attendance() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = open_workspace(&mut stdin, &mut reader, "attendify-session-student");
    let _ = request_ok(&mut stdin, &mut reader, "1", "workspace.seedDemo", json!({}));
    let signed = sign_in(&mut stdin, &mut reader, "stu-1", "student", Some("IT-501"));
    assert_eq!(signed["user"]["role"], "student");

    for (i, method) in [
        "timetable.add",
        "timetable.form",
        "attendance.open",
        "attendance.toggle",
        "attendance.markAllPresent",
        "attendance.submit",
        "students.list",
        "students.create",
        "faculty.list",
        "faculty.create",
    ]
    .iter()
    .enumerate()
    {
        let code = request_err(&mut stdin, &mut reader, &format!("deny-{i}"), method, json!({}));
        assert_eq!(code, "forbidden", "{method}");
    }

    let code = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "setup.update",
        json!({ "section": "attendance", "patch": { "lowAttendanceThreshold": 50 } }),
    );
    assert_eq!(code, "forbidden");

    // The section param is ignored; students get their own.
    let list = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "timetable.list",
        json!({ "section": "CS-301" }),
    );
    assert_eq!(list["section"], "IT-501");
    let subjects: Vec<String> = list["days"]
        .as_array()
        .expect("days")
        .iter()
        .flat_map(|d| d["slots"].as_array().cloned().unwrap_or_default())
        .filter_map(|s| s["subject"].as_str().map(|v| v.to_string()))
        .collect();
    assert_eq!(
        subjects,
        vec!["Data Analytics", "Cloud Computing", "Mobile App Development"]
    );

    let out = request_ok(&mut stdin, &mut reader, "4", "session.signOut", json!({}));
    assert_eq!(out["ok"], true);
    let code = request_err(&mut stdin, &mut reader, "5", "timetable.list", json!({}));
    assert_eq!(code, "not_authenticated");
}

#[test]
fn signing_in_again_drops_the_open_marking_session() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = open_workspace(&mut stdin, &mut reader, "attendify-session-switch");
    let _ = request_ok(&mut stdin, &mut reader, "1", "workspace.seedDemo", json!({}));
    let _ = sign_in(&mut stdin, &mut reader, "fac-1", "faculty", None);
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "attendance.open",
        json!({ "section": "CS-301", "date": "2025-04-21" }),
    );
    let health = request_ok(&mut stdin, &mut reader, "3", "health", json!({}));
    assert_eq!(health["markingOpen"], true);

    let _ = sign_in(&mut stdin, &mut reader, "fac-2", "faculty", None);
    let code = request_err(&mut stdin, &mut reader, "4", "attendance.session", json!({}));
    assert_eq!(code, "no_marking_session");
}
