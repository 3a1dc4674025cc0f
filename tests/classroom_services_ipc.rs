mod test_support;

use serde_json::json;
use test_support::{error_code, request_err, request_ok, spawn_sidecar, str_field, workspace_with_class};

const MINUTE: i64 = 60_000;

#[test]
fn setup_sections_default_and_validate_patches() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _class_id = workspace_with_class(&mut stdin, &mut reader, "classroomd-setup");

    let setup = request_ok(&mut stdin, &mut reader, "g1", "setup.get", json!({}));
    assert_eq!(setup["grading"]["strugglingThreshold"], json!(60));
    assert_eq!(setup["helpQueue"]["urgentAfterMinutes"], json!(15));
    assert_eq!(setup["ai"]["defaultEditor"], json!("p5"));

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "u1",
        "setup.update",
        json!({ "section": "ai", "patch": { "defaultEditor": "Scratch", "defaultLevel": "Advanced" } }),
    );
    assert_eq!(updated["values"]["defaultEditor"], json!("scratch"));
    assert_eq!(updated["values"]["defaultLevel"], json!("advanced"));

    let e = request_err(
        &mut stdin,
        &mut reader,
        "u2",
        "setup.update",
        json!({ "section": "helpQueue", "patch": { "urgentAfterMinutes": 2 } }),
    );
    assert_eq!(error_code(&e), "bad_params");

    let e = request_err(
        &mut stdin,
        &mut reader,
        "u3",
        "setup.update",
        json!({ "section": "grading", "patch": { "curve": true } }),
    );
    assert_eq!(error_code(&e), "bad_params");

    let e = request_err(
        &mut stdin,
        &mut reader,
        "u4",
        "setup.update",
        json!({ "section": "seating", "patch": {} }),
    );
    assert_eq!(error_code(&e), "bad_params");

    let setup = request_ok(&mut stdin, &mut reader, "g2", "setup.get", json!({}));
    assert_eq!(setup["ai"]["defaultEditor"], json!("scratch"));
    assert_eq!(setup["helpQueue"]["urgentAfterMinutes"], json!(15));

    let _ = child.kill();
}

#[test]
fn help_queue_orders_and_buckets_open_requests() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let class_id = workspace_with_class(&mut stdin, &mut reader, "classroomd-help-queue");

    let first = request_ok(
        &mut stdin,
        &mut reader,
        "h1",
        "help.create",
        json!({ "classId": class_id, "studentId": "s1", "lessonId": "l1", "message": "stuck on loops" }),
    );
    let first_id = str_field(&first["request"], "id").to_string();
    let created_at = first["request"]["createdAt"].as_i64().expect("createdAt");
    assert_eq!(first["request"]["status"], json!("pending"));

    let queue = request_ok(
        &mut stdin,
        &mut reader,
        "q1",
        "help.queue",
        json!({ "classId": class_id, "now": created_at + 6 * MINUTE }),
    );
    assert_eq!(queue["queue"][0]["id"], json!(first_id));
    assert_eq!(queue["queue"][0]["priority"], json!("waiting"));

    let queue = request_ok(
        &mut stdin,
        &mut reader,
        "q2",
        "help.queue",
        json!({ "classId": class_id, "now": created_at + 16 * MINUTE }),
    );
    assert_eq!(queue["queue"][0]["priority"], json!("urgent"));

    let moved = request_ok(
        &mut stdin,
        &mut reader,
        "t1",
        "help.transition",
        json!({ "classId": class_id, "requestId": first_id, "status": "in-progress" }),
    );
    assert_eq!(moved["request"]["status"], json!("in-progress"));

    let e = request_err(
        &mut stdin,
        &mut reader,
        "t2",
        "help.transition",
        json!({ "classId": class_id, "requestId": first_id, "status": "pending" }),
    );
    assert_eq!(error_code(&e), "invalid_transition");

    request_ok(
        &mut stdin,
        &mut reader,
        "t3",
        "help.transition",
        json!({ "classId": class_id, "requestId": first_id, "status": "resolved" }),
    );
    let queue = request_ok(&mut stdin, &mut reader, "q3", "help.queue", json!({ "classId": class_id }));
    assert_eq!(queue["queue"].as_array().map(|a| a.len()), Some(0));

    let _ = child.kill();
}

#[test]
fn announcements_respect_schedule_and_targets() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let class_id = workspace_with_class(&mut stdin, &mut reader, "classroomd-announcements");

    let everyone = request_ok(
        &mut stdin,
        &mut reader,
        "a1",
        "announcements.create",
        json!({ "classId": class_id, "title": "Welcome", "body": "Hello all" }),
    );
    let now = everyone["announcement"]["createdAt"].as_i64().expect("createdAt");
    request_ok(
        &mut stdin,
        &mut reader,
        "a2",
        "announcements.create",
        json!({ "classId": class_id, "title": "Just Bob", "targetStudentIds": ["bob"] }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "a3",
        "announcements.create",
        json!({ "classId": class_id, "title": "Tomorrow", "scheduledAt": now + 24 * 60 * MINUTE }),
    );

    let for_ada = request_ok(
        &mut stdin,
        &mut reader,
        "f1",
        "announcements.forStudent",
        json!({ "classId": class_id, "studentId": "ada", "now": now + MINUTE }),
    );
    let titles: Vec<&str> = for_ada["announcements"]
        .as_array()
        .expect("announcements")
        .iter()
        .map(|a| a["title"].as_str().unwrap_or(""))
        .collect();
    assert_eq!(titles, vec!["Welcome"]);

    let all = request_ok(&mut stdin, &mut reader, "l1", "announcements.list", json!({ "classId": class_id }));
    assert_eq!(all["announcements"].as_array().map(|a| a.len()), Some(3));

    let e = request_err(
        &mut stdin,
        &mut reader,
        "a4",
        "announcements.create",
        json!({ "classId": class_id, "title": "   " }),
    );
    assert_eq!(error_code(&e), "bad_params");

    let template = request_ok(
        &mut stdin,
        &mut reader,
        "ft1",
        "feedbackTemplates.create",
        json!({ "teacherId": "teacher", "title": "Great work", "text": "Nice use of loops!", "category": "Praise" }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "ft2",
        "feedbackTemplates.create",
        json!({ "teacherId": "teacher", "title": "Check syntax", "text": "Look at line 3.", "category": "Fix" }),
    );
    let praise = request_ok(
        &mut stdin,
        &mut reader,
        "ft3",
        "feedbackTemplates.list",
        json!({ "teacherId": "teacher", "category": "praise" }),
    );
    assert_eq!(praise["templates"].as_array().map(|a| a.len()), Some(1));
    request_ok(
        &mut stdin,
        &mut reader,
        "ft4",
        "feedbackTemplates.delete",
        json!({ "templateId": template["template"]["id"] }),
    );
    let rest = request_ok(
        &mut stdin,
        &mut reader,
        "ft5",
        "feedbackTemplates.list",
        json!({ "teacherId": "teacher" }),
    );
    assert_eq!(rest["templates"].as_array().map(|a| a.len()), Some(1));

    let _ = child.kill();
}

#[test]
fn ai_methods_without_a_key_report_not_configured() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let class_id = workspace_with_class(&mut stdin, &mut reader, "classroomd-ai-off");

    let e = request_err(
        &mut stdin,
        &mut reader,
        "g1",
        "ai.generateLesson",
        json!({ "topic": "bouncing balls" }),
    );
    assert_eq!(error_code(&e), "ai_not_configured");

    let e = request_err(
        &mut stdin,
        &mut reader,
        "v1",
        "ai.validateStep",
        json!({ "step": "Draw a circle", "code": "circle(1,1,1)" }),
    );
    assert_eq!(error_code(&e), "ai_not_configured");

    let next = request_ok(
        &mut stdin,
        &mut reader,
        "v2",
        "ai.validateStep",
        json!({ "step": "[NEXT] Watch the ball bounce" }),
    );
    assert_eq!(next["validation"]["passed"], json!(true));

    // Applying an already generated curriculum needs no model.
    let applied = request_ok(
        &mut stdin,
        &mut reader,
        "ap",
        "ai.applyCurriculum",
        json!({
            "classId": class_id,
            "curriculum": {
                "title": "Intro to p5",
                "units": [
                    { "title": "Shapes", "lessons": [
                        { "title": "Circles", "steps": ["[NEXT] Look", "Draw a circle"], "concepts": ["shapes"] }
                    ] },
                    { "title": "Motion", "lessons": [
                        { "title": "Bounce", "steps": ["Move the ball"] }
                    ] }
                ]
            }
        }),
    );
    assert_eq!(applied["units"].as_array().map(|a| a.len()), Some(2));
    assert_eq!(applied["units"][1]["isLocked"], json!(true));
    assert_eq!(applied["lessons"][0]["level"], json!("beginner"));

    let e = request_err(
        &mut stdin,
        &mut reader,
        "ap2",
        "ai.applyCurriculum",
        json!({ "classId": class_id, "curriculum": { "units": [] } }),
    );
    assert_eq!(error_code(&e), "bad_params");

    let _ = child.kill();
}
