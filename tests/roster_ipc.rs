mod test_support;

use serde_json::json;
use test_support::{error_code, request_err, request_ok, spawn_sidecar, str_field, workspace_with_class};

#[test]
fn csv_import_archive_restore_and_export() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let class_id = workspace_with_class(&mut stdin, &mut reader, "classroomd-roster-csv");

    let csv = "Full Name,Email Address,Student ID\n\
               Ada Lovelace,ada@example.org,S1\n\
               ,nobody@example.org,S9\n\
               Grace Hopper,grace@example.org,S2\n\
               Ada Again,ADA@example.org,S3\n";
    let imported = request_ok(
        &mut stdin,
        &mut reader,
        "i1",
        "students.importCsv",
        json!({ "classId": class_id, "csv": csv }),
    );
    assert_eq!(imported["imported"], json!(2));
    assert_eq!(imported["duplicates"], json!(["Ada Again"]));
    assert_eq!(imported["skippedLines"], json!([3]));
    let ada = imported["students"]
        .as_array()
        .expect("students")
        .iter()
        .find(|s| s["name"] == json!("Ada Lovelace"))
        .map(|s| str_field(s, "id").to_string())
        .expect("ada imported");

    let listed = request_ok(&mut stdin, &mut reader, "l1", "students.list", json!({ "classId": class_id }));
    assert_eq!(listed["activeCount"], json!(2));

    let archived = request_ok(
        &mut stdin,
        &mut reader,
        "a1",
        "students.archive",
        json!({ "classId": class_id, "studentId": ada }),
    );
    assert_eq!(archived["changed"], json!(true));
    assert_eq!(archived["student"]["isActive"], json!(false));

    let listed = request_ok(&mut stdin, &mut reader, "l2", "students.list", json!({ "classId": class_id }));
    assert_eq!(listed["activeCount"], json!(1));
    assert_eq!(listed["archived"].as_array().map(|a| a.len()), Some(1));

    let classes = request_ok(&mut stdin, &mut reader, "c1", "classes.list", json!({}));
    assert_eq!(classes["classes"][0]["activeStudentCount"], json!(1));

    let exported = request_ok(&mut stdin, &mut reader, "e1", "students.exportCsv", json!({ "classId": class_id }));
    let text = exported["csv"].as_str().expect("csv");
    assert!(text.contains("Grace Hopper"));
    assert!(!text.contains("Ada Lovelace"));

    let again = request_ok(
        &mut stdin,
        &mut reader,
        "a2",
        "students.archive",
        json!({ "classId": class_id, "studentId": ada }),
    );
    assert_eq!(again["changed"], json!(false));

    request_ok(
        &mut stdin,
        &mut reader,
        "r1",
        "students.restore",
        json!({ "classId": class_id, "studentId": ada }),
    );
    let exported = request_ok(&mut stdin, &mut reader, "e2", "students.exportCsv", json!({ "classId": class_id }));
    assert!(exported["csv"].as_str().expect("csv").contains("Ada Lovelace"));

    let analytics = request_ok(&mut stdin, &mut reader, "an", "analytics.class", json!({ "classId": class_id }));
    assert_eq!(analytics["activeStudents"], json!(2));

    let _ = child.kill();
}

#[test]
fn enrollment_approval_creates_placeholder_student() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let class_id = workspace_with_class(&mut stdin, &mut reader, "classroomd-enrollment");

    request_ok(
        &mut stdin,
        &mut reader,
        "su",
        "setup.update",
        json!({ "section": "roster", "patch": { "placeholderName": "Mystery Coder" } }),
    );

    let classes = request_ok(&mut stdin, &mut reader, "c1", "classes.list", json!({}));
    let code = str_field(&classes["classes"][0], "enrollmentCode").to_string();
    assert_eq!(code.len(), 6);

    let e = request_err(
        &mut stdin,
        &mut reader,
        "bad",
        "enrollments.request",
        json!({ "enrollmentCode": "not-a-code", "studentId": "kid-1" }),
    );
    assert_eq!(error_code(&e), "not_found");

    let requested = request_ok(
        &mut stdin,
        &mut reader,
        "q1",
        "enrollments.request",
        json!({ "enrollmentCode": code, "studentId": "kid-1" }),
    );
    assert_eq!(requested["created"], json!(true));
    assert_eq!(requested["enrollment"]["status"], json!("pending"));
    let enrollment_id = str_field(&requested["enrollment"], "id").to_string();

    let repeated = request_ok(
        &mut stdin,
        &mut reader,
        "q2",
        "enrollments.request",
        json!({ "enrollmentCode": code, "studentId": "kid-1" }),
    );
    assert_eq!(repeated["created"], json!(false));
    assert_eq!(repeated["enrollment"]["id"], json!(enrollment_id));

    let approved = request_ok(
        &mut stdin,
        &mut reader,
        "ap",
        "enrollments.approve",
        json!({ "classId": class_id, "enrollmentId": enrollment_id }),
    );
    assert_eq!(approved["enrollment"]["status"], json!("approved"));
    assert_eq!(approved["student"]["id"], json!("kid-1"));
    assert_eq!(approved["student"]["name"], json!("Mystery Coder"));

    let e = request_err(
        &mut stdin,
        &mut reader,
        "rj",
        "enrollments.reject",
        json!({ "classId": class_id, "enrollmentId": enrollment_id }),
    );
    assert_eq!(error_code(&e), "invalid_transition");

    let listed = request_ok(&mut stdin, &mut reader, "l1", "students.list", json!({ "classId": class_id }));
    assert_eq!(listed["active"][0]["name"], json!("Mystery Coder"));

    let _ = child.kill();
}
