mod test_support;

use serde_json::{json, Value};
use test_support::{
    error_code, request_err, request_ok, send_line, spawn_sidecar, str_field, workspace_with_class,
};

fn unit_titles(units: &Value) -> Vec<String> {
    units
        .as_array()
        .expect("units array")
        .iter()
        .map(|u| str_field(u, "title").to_string())
        .collect()
}

fn lesson_ids(lessons: &Value) -> Vec<String> {
    lessons
        .as_array()
        .expect("lessons array")
        .iter()
        .map(|l| str_field(l, "id").to_string())
        .collect()
}

#[test]
fn requests_before_workspace_and_unknown_methods_are_rejected() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health["aiConfigured"], json!(false));
    assert!(health["workspacePath"].is_null());

    let e = request_err(&mut stdin, &mut reader, "2", "classes.list", json!({}));
    assert_eq!(error_code(&e), "no_workspace");

    let e = request_err(&mut stdin, &mut reader, "3", "grades.explode", json!({}));
    assert_eq!(error_code(&e), "not_implemented");

    let resp = send_line(&mut stdin, &mut reader, "{not json");
    assert_eq!(resp["ok"], json!(false));
    assert_eq!(resp["error"]["code"], json!("bad_json"));

    let _ = child.kill();
}

#[test]
fn unit_reorder_moves_dragged_into_target_slot() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let class_id = workspace_with_class(&mut stdin, &mut reader, "classroomd-units-reorder");

    let mut ids = Vec::new();
    for (i, title) in ["A", "B", "C"].iter().enumerate() {
        let created = request_ok(
            &mut stdin,
            &mut reader,
            &format!("u{}", i),
            "units.create",
            json!({ "classId": class_id, "title": title }),
        );
        assert_eq!(created["unit"]["order"], json!(i));
        ids.push(str_field(&created["unit"], "id").to_string());
    }

    let moved = request_ok(
        &mut stdin,
        &mut reader,
        "r1",
        "units.reorder",
        json!({ "classId": class_id, "draggedId": ids[2], "targetId": ids[0] }),
    );
    assert_eq!(moved["changed"], json!(true));
    assert_eq!(unit_titles(&moved["units"]), vec!["C", "A", "B"]);

    let listed = request_ok(&mut stdin, &mut reader, "l1", "units.list", json!({ "classId": class_id }));
    assert_eq!(unit_titles(&listed["units"]), vec!["C", "A", "B"]);
    let orders: Vec<u64> = listed["units"]
        .as_array()
        .expect("units")
        .iter()
        .map(|u| u["order"].as_u64().expect("order"))
        .collect();
    assert_eq!(orders, vec![0, 1, 2]);

    let noop = request_ok(
        &mut stdin,
        &mut reader,
        "r2",
        "units.reorder",
        json!({ "classId": class_id, "draggedId": "missing", "targetId": ids[0] }),
    );
    assert_eq!(noop["changed"], json!(false));
    assert_eq!(unit_titles(&noop["units"]), vec!["C", "A", "B"]);

    let locked = request_ok(
        &mut stdin,
        &mut reader,
        "t1",
        "units.toggleLock",
        json!({ "classId": class_id, "unitId": ids[1] }),
    );
    assert_eq!(locked["value"], json!(true));
    assert_eq!(locked["unit"]["isLocked"], json!(true));

    let _ = child.kill();
}

#[test]
fn lesson_move_and_unit_delete_keep_sequence_consistent() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let class_id = workspace_with_class(&mut stdin, &mut reader, "classroomd-lesson-move");

    let unit_a = request_ok(
        &mut stdin,
        &mut reader,
        "ua",
        "units.create",
        json!({ "classId": class_id, "title": "Shapes" }),
    );
    let unit_a = str_field(&unit_a["unit"], "id").to_string();
    let unit_b = request_ok(
        &mut stdin,
        &mut reader,
        "ub",
        "units.create",
        json!({ "classId": class_id, "title": "Motion" }),
    );
    let unit_b = str_field(&unit_b["unit"], "id").to_string();

    let mut lessons = Vec::new();
    for (i, (title, unit)) in [("Circles", &unit_a), ("Squares", &unit_a), ("Bounce", &unit_b)]
        .iter()
        .enumerate()
    {
        let created = request_ok(
            &mut stdin,
            &mut reader,
            &format!("l{}", i),
            "lessons.create",
            json!({
                "classId": class_id,
                "unitId": unit,
                "title": title,
                "steps": ["[NEXT] Look at the canvas", "Draw something"],
            }),
        );
        lessons.push(str_field(&created["lesson"], "id").to_string());
    }

    let moved = request_ok(
        &mut stdin,
        &mut reader,
        "m1",
        "lessons.move",
        json!({
            "classId": class_id,
            "lessonId": lessons[2],
            "destUnitId": unit_a,
            "beforeLessonId": lessons[0],
        }),
    );
    assert_eq!(moved["changed"], json!(true));

    let in_a = request_ok(
        &mut stdin,
        &mut reader,
        "la",
        "lessons.list",
        json!({ "classId": class_id, "unitId": unit_a }),
    );
    assert_eq!(
        lesson_ids(&in_a["lessons"]),
        vec![lessons[2].clone(), lessons[0].clone(), lessons[1].clone()]
    );

    // Same unit with no anchor is a no-op.
    let noop = request_ok(
        &mut stdin,
        &mut reader,
        "m2",
        "lessons.move",
        json!({ "classId": class_id, "lessonId": lessons[0], "destUnitId": unit_a }),
    );
    assert_eq!(noop["changed"], json!(false));

    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "o1",
        "lessons.open",
        json!({ "classId": class_id, "lessonId": lessons[0] }),
    );
    assert_eq!(opened["steps"][0]["kind"], json!("observe"));
    assert_eq!(opened["steps"][1]["kind"], json!("code"));
    assert_eq!(opened["unit"]["id"], json!(unit_a));

    let deleted = request_ok(
        &mut stdin,
        &mut reader,
        "d1",
        "units.delete",
        json!({ "classId": class_id, "unitId": unit_a }),
    );
    assert_eq!(deleted["detachedLessonIds"].as_array().map(|a| a.len()), Some(3));
    assert_eq!(deleted["units"][0]["order"], json!(0));

    let all = request_ok(&mut stdin, &mut reader, "la2", "lessons.list", json!({ "classId": class_id }));
    assert!(all["lessons"]
        .as_array()
        .expect("lessons")
        .iter()
        .all(|l| l["unitId"].is_null()));

    let _ = child.kill();
}

#[test]
fn archived_class_refuses_scoped_operations() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let class_id = workspace_with_class(&mut stdin, &mut reader, "classroomd-archived-class");

    request_ok(
        &mut stdin,
        &mut reader,
        "a1",
        "classes.update",
        json!({ "classId": class_id, "archived": true }),
    );

    let e = request_err(
        &mut stdin,
        &mut reader,
        "a2",
        "units.create",
        json!({ "classId": class_id, "title": "Late unit" }),
    );
    assert_eq!(error_code(&e), "no_active_class");

    let listed = request_ok(&mut stdin, &mut reader, "a3", "classes.list", json!({}));
    assert_eq!(listed["classes"].as_array().map(|a| a.len()), Some(0));

    let ensured = request_ok(&mut stdin, &mut reader, "a4", "classes.ensureDefault", json!({}));
    assert_eq!(ensured["created"], json!(true));
    assert_eq!(ensured["class"]["name"], json!("My Class"));

    let e = request_err(
        &mut stdin,
        &mut reader,
        "a5",
        "units.list",
        json!({ "classId": "nope" }),
    );
    assert_eq!(error_code(&e), "not_found");

    let _ = child.kill();
}
