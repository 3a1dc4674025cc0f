mod test_support;

use serde_json::{json, Value};
use test_support::{error_code, request_err, request_ok, spawn_sidecar, str_field, workspace_with_class};

/// Fields that survive a round trip; identity and scoping do not.
fn content(lesson: &Value) -> Value {
    json!({
        "type": lesson["type"],
        "title": lesson["title"],
        "description": lesson["description"],
        "level": lesson["level"],
        "steps": lesson["steps"],
        "starterCode": lesson["starterCode"],
        "challenge": lesson["challenge"],
        "tags": lesson["tags"],
        "editorType": lesson["editorType"],
    })
}

#[test]
fn export_then_import_preserves_lesson_content() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let class_id = workspace_with_class(&mut stdin, &mut reader, "classroomd-transfer");

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "c1",
        "lessons.create",
        json!({
            "classId": class_id,
            "title": "Rainbow Grid",
            "type": "Assignment",
            "description": "Nested loops with colour",
            "level": "intermediate",
            "steps": ["[NEXT] Watch the grid", "[TEXT] Which loop draws rows?", "Change the colours"],
            "starterCode": "for (let i = 0; i < 10; i++) {}",
            "challenge": "Make it animate",
            "tags": ["loops", "color"],
            "editorType": "p5",
        }),
    );
    let original = created["lesson"].clone();

    let exported = request_ok(
        &mut stdin,
        &mut reader,
        "e1",
        "lessons.export",
        json!({ "classId": class_id }),
    );
    let document = exported["document"].clone();
    assert_eq!(document["format"], json!("classroomd-lessons"));
    assert_eq!(document["lessons"].as_array().map(|a| a.len()), Some(1));

    let other = request_ok(
        &mut stdin,
        &mut reader,
        "c2",
        "classes.create",
        json!({ "name": "Period 5" }),
    );
    let other_id = str_field(&other["class"], "id").to_string();

    let imported = request_ok(
        &mut stdin,
        &mut reader,
        "i1",
        "lessons.import",
        json!({ "classId": other_id, "document": document.to_string() }),
    );
    assert_eq!(imported["imported"], json!(1));
    let copy = &imported["lessons"][0];
    assert_ne!(copy["id"], original["id"]);
    assert_eq!(copy["classId"], json!(other_id));
    assert_eq!(content(copy), content(&original));

    let single = request_ok(
        &mut stdin,
        &mut reader,
        "e2",
        "lessons.export",
        json!({ "classId": class_id, "lessonId": original["id"] }),
    );
    let again = request_ok(
        &mut stdin,
        &mut reader,
        "i2",
        "lessons.import",
        json!({ "classId": other_id, "document": single["document"] }),
    );
    assert_eq!(content(&again["lessons"][0]), content(&original));

    let e = request_err(
        &mut stdin,
        &mut reader,
        "i3",
        "lessons.import",
        json!({ "classId": other_id, "document": "{\"format\":\"classroomd-lessons\",\"version\":99,\"lessons\":[]}" }),
    );
    assert_eq!(error_code(&e), "bad_import");

    let e = request_err(
        &mut stdin,
        &mut reader,
        "i4",
        "lessons.import",
        json!({ "classId": other_id, "document": "not json at all" }),
    );
    assert_eq!(error_code(&e), "bad_import");

    let _ = child.kill();
}

#[test]
fn promoted_templates_can_be_instantiated_elsewhere() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let class_id = workspace_with_class(&mut stdin, &mut reader, "classroomd-templates");

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "c1",
        "lessons.create",
        json!({ "classId": class_id, "title": "Starfield", "tags": ["Animation"] }),
    );
    let lesson_id = str_field(&created["lesson"], "id").to_string();

    let promoted = request_ok(
        &mut stdin,
        &mut reader,
        "p1",
        "lessons.promoteTemplate",
        json!({ "classId": class_id, "lessonId": lesson_id }),
    );
    assert_eq!(promoted["lesson"]["isTemplate"], json!(true));
    assert!(promoted["lesson"]["classId"].is_null());

    let listed = request_ok(&mut stdin, &mut reader, "l1", "lessons.list", json!({ "classId": class_id }));
    assert_eq!(listed["lessons"].as_array().map(|a| a.len()), Some(0));

    let templates = request_ok(
        &mut stdin,
        &mut reader,
        "t1",
        "lessons.templates",
        json!({ "tag": "animation" }),
    );
    assert_eq!(templates["templates"].as_array().map(|a| a.len()), Some(1));

    let unit = request_ok(
        &mut stdin,
        &mut reader,
        "u1",
        "units.create",
        json!({ "classId": class_id, "title": "Space" }),
    );
    let unit_id = str_field(&unit["unit"], "id").to_string();

    let copy = request_ok(
        &mut stdin,
        &mut reader,
        "n1",
        "lessons.instantiateTemplate",
        json!({ "classId": class_id, "templateId": lesson_id, "unitId": unit_id }),
    );
    assert_eq!(copy["lesson"]["isTemplate"], json!(false));
    assert_eq!(copy["lesson"]["classId"], json!(class_id));
    assert_eq!(copy["lesson"]["unitId"], json!(unit_id));
    assert_eq!(copy["lesson"]["title"], json!("Starfield"));

    let _ = child.kill();
}

#[test]
fn imported_templates_stay_out_of_the_class_and_survive_its_deletion() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let class_id = workspace_with_class(&mut stdin, &mut reader, "classroomd-template-import");

    let document = json!({
        "format": "classroomd-lessons",
        "version": 1,
        "lessons": [
            { "title": "Shared Starfield", "isTemplate": true, "steps": ["Draw stars"], "tags": ["space"] },
            { "title": "Class Warmup", "steps": ["[NEXT] Read along"] },
        ],
    });
    let imported = request_ok(
        &mut stdin,
        &mut reader,
        "i1",
        "lessons.import",
        json!({ "classId": class_id, "document": document }),
    );
    assert_eq!(imported["imported"], json!(2));
    assert!(imported["lessons"][0]["classId"].is_null());
    assert_eq!(imported["lessons"][1]["classId"], json!(class_id));

    let listed = request_ok(&mut stdin, &mut reader, "l1", "lessons.list", json!({ "classId": class_id }));
    let titles: Vec<&str> = listed["lessons"]
        .as_array()
        .expect("lessons")
        .iter()
        .map(|l| l["title"].as_str().unwrap_or(""))
        .collect();
    assert_eq!(titles, vec!["Class Warmup"]);

    request_ok(&mut stdin, &mut reader, "d1", "classes.delete", json!({ "classId": class_id }));

    let templates = request_ok(&mut stdin, &mut reader, "t1", "lessons.templates", json!({ "tag": "space" }));
    let templates = templates["templates"].as_array().expect("templates");
    assert_eq!(templates.len(), 1);
    assert_eq!(templates[0]["title"], json!("Shared Starfield"));
    assert!(templates[0]["classId"].is_null());

    let _ = child.kill();
}
