mod test_support;

use serde_json::json;
use test_support::{open_workspace, request, request_err, request_ok, sign_in, spawn_sidecar};

fn student(name: &str, enrollment: &str, section: &str) -> serde_json::Value {
    json!({
        "name": name,
        "email": format!("{}@example.edu", name.to_lowercase().replace(' ', ".")),
        "enrollmentNumber": enrollment,
        "semester": "5th",
        "branch": "Computer Science",
        "section": section
    })
}

#[test]
fn students_create_validates_and_list_filters() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = open_workspace(&mut stdin, &mut reader, "attendify-students-crud");
    let _ = sign_in(&mut stdin, &mut reader, "admin-1", "admin", None);

    let resp = request(
        &mut stdin,
        &mut reader,
        "1",
        "students.create",
        json!({ "name": "Ann Archer", "section": "CS-301" }),
    );
    assert_eq!(resp["error"]["code"], "missing_fields");
    assert_eq!(
        resp["error"]["details"]["fields"],
        json!(["email", "enrollmentNumber", "semester", "branch"])
    );

    let ann = request_ok(&mut stdin, &mut reader, "2", "students.create", student("Ann Archer", "EN100", "CS-301"));
    let ann_id = ann["student"]["id"].as_str().expect("id").to_string();
    let _ = request_ok(&mut stdin, &mut reader, "3", "students.create", student("Ben Brook", "EN200", "IT-501"));

    let code = request_err(&mut stdin, &mut reader, "4", "students.create", student("Ann Again", "EN100", "CS-301"));
    assert_eq!(code, "duplicate");

    let all = request_ok(&mut stdin, &mut reader, "5", "students.list", json!({}));
    assert_eq!(all["students"].as_array().map(|s| s.len()), Some(2));

    let it = request_ok(&mut stdin, &mut reader, "6", "students.list", json!({ "section": "IT-501" }));
    let it = it["students"].as_array().expect("students").clone();
    assert_eq!(it.len(), 1);
    assert_eq!(it[0]["name"], "Ben Brook");

    let by_enrollment = request_ok(&mut stdin, &mut reader, "7", "students.list", json!({ "search": "en1" }));
    let found = by_enrollment["students"].as_array().expect("students").clone();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["id"], ann_id.as_str());
    assert_eq!(found[0]["lowAttendance"], false);

    let by_email = request_ok(&mut stdin, &mut reader, "8", "students.list", json!({ "search": "BEN.BROOK@" }));
    assert_eq!(by_email["students"].as_array().map(|s| s.len()), Some(1));
}

#[test]
fn low_attendance_flag_and_cascading_delete() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = open_workspace(&mut stdin, &mut reader, "attendify-students-low");
    let _ = sign_in(&mut stdin, &mut reader, "fac-1", "faculty", None);

    let ann = request_ok(&mut stdin, &mut reader, "1", "students.create", student("Ann Archer", "EN100", "CS-301"));
    let ann_id = ann["student"]["id"].as_str().expect("id").to_string();
    let ben = request_ok(&mut stdin, &mut reader, "2", "students.create", student("Ben Brook", "EN200", "CS-301"));
    let ben_id = ben["student"]["id"].as_str().expect("id").to_string();

    for (i, date) in ["2025-04-21", "2025-04-22"].iter().enumerate() {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("open-{i}"),
            "attendance.open",
            json!({ "section": "CS-301", "date": date }),
        );
        let _ = request_ok(&mut stdin, &mut reader, "all", "attendance.markAllPresent", json!({}));
        // Ann is absent both days.
        let _ = request_ok(&mut stdin, &mut reader, "t", "attendance.toggle", json!({ "studentId": ann_id }));
        let _ = request_ok(&mut stdin, &mut reader, "s", "attendance.submit", json!({}));
    }

    let list = request_ok(&mut stdin, &mut reader, "3", "students.list", json!({ "section": "CS-301" }));
    let students = list["students"].as_array().expect("students").clone();
    let ann_row = students.iter().find(|s| s["id"] == ann_id.as_str()).expect("ann");
    let ben_row = students.iter().find(|s| s["id"] == ben_id.as_str()).expect("ben");
    assert_eq!(ann_row["attendance"]["percentage"], 0);
    assert_eq!(ann_row["lowAttendance"], true);
    assert_eq!(ben_row["attendance"]["total"], 2);
    assert_eq!(ben_row["lowAttendance"], false);

    let deleted = request_ok(&mut stdin, &mut reader, "4", "students.delete", json!({ "ids": [ann_id] }));
    assert_eq!(deleted["deleted"], 1);
    assert_eq!(deleted["attendanceRemoved"], 2);

    let history = request_ok(&mut stdin, &mut reader, "5", "attendance.history", json!({ "section": "CS-301" }));
    let records = history["records"].as_array().expect("records");
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r["studentId"] == ben_id.as_str()));
}

#[test]
fn faculty_roster_is_admin_managed() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = open_workspace(&mut stdin, &mut reader, "attendify-faculty-crud");
    let _ = sign_in(&mut stdin, &mut reader, "admin-1", "admin", None);

    let base = json!({
        "name": "Grace Hopper",
        "email": "grace@example.edu",
        "department": "Computer Science",
        "subjects": ["Compilers", "Data Structures"]
    });

    let mut bad_dept = base.clone();
    bad_dept["department"] = json!("Astrology");
    let code = request_err(&mut stdin, &mut reader, "1", "faculty.create", bad_dept);
    assert_eq!(code, "bad_params");

    let mut dup = base.clone();
    dup["subjects"] = json!(["Compilers", "compilers"]);
    let code = request_err(&mut stdin, &mut reader, "2", "faculty.create", dup);
    assert_eq!(code, "duplicate");

    let created = request_ok(&mut stdin, &mut reader, "3", "faculty.create", base);
    let fac_id = created["faculty"]["id"].as_str().expect("id").to_string();
    assert_eq!(created["faculty"]["subjects"], json!(["Compilers", "Data Structures"]));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "faculty.create",
        json!({ "name": "Alan Turing", "email": "alan@example.edu", "department": "electronics" }),
    );

    let cs = request_ok(&mut stdin, &mut reader, "5", "faculty.list", json!({ "search": "computer" }));
    let cs = cs["faculty"].as_array().expect("faculty").clone();
    assert_eq!(cs.len(), 1);
    assert_eq!(cs[0]["name"], "Grace Hopper");

    let _ = sign_in(&mut stdin, &mut reader, "fac-1", "faculty", None);
    let listed = request_ok(&mut stdin, &mut reader, "6", "faculty.list", json!({}));
    assert_eq!(listed["faculty"].as_array().map(|f| f.len()), Some(2));
    let code = request_err(&mut stdin, &mut reader, "7", "faculty.delete", json!({ "ids": [fac_id] }));
    assert_eq!(code, "forbidden");

    let _ = sign_in(&mut stdin, &mut reader, "admin-1", "admin", None);
    let deleted = request_ok(&mut stdin, &mut reader, "8", "faculty.delete", json!({ "ids": [fac_id] }));
    assert_eq!(deleted["deleted"], 1);
}
