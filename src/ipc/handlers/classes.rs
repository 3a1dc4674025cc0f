use crate::gateway::Gateway;
use crate::ipc::helpers::{
    class_context, db_read, db_write, load_class, opt_bool, opt_str, opt_text, required_str,
    required_text, to_value, with_store, Handled, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{new_id, now_ms, Class};
use crate::roster::{active_count, generate_enrollment_code};
use serde_json::{json, Value};
use std::collections::HashSet;
use tracing::info;

const DEFAULT_CLASS_NAME: &str = "My Class";
const DEFAULT_TEACHER: &str = "teacher";

/// Codes held by active classes other than `except`.
fn taken_codes(store: &dyn Gateway, except: Option<&str>) -> anyhow::Result<HashSet<String>> {
    Ok(store
        .list_classes()?
        .into_iter()
        .filter(|c| !c.archived && Some(c.id.as_str()) != except)
        .map(|c| c.enrollment_code)
        .collect())
}

fn create_class(
    store: &dyn Gateway,
    name: String,
    period: String,
    academic_year: String,
    teacher_id: String,
) -> Result<Class, HandlerErr> {
    let taken = taken_codes(store, None).map_err(db_read)?;
    let class = Class {
        id: new_id(),
        name,
        period,
        academic_year,
        teacher_id,
        enrollment_code: generate_enrollment_code(&taken)?,
        archived: false,
        created_at: now_ms(),
    };
    store.insert_class(&class).map_err(db_write)?;
    info!(class_id = %class.id, name = %class.name, "class created");
    Ok(class)
}

fn classes_list(store: &dyn Gateway, params: &Value) -> Handled {
    let include_archived = opt_bool(params, "includeArchived")?.unwrap_or(false);
    let mut out = Vec::new();
    for class in store.list_classes().map_err(db_read)? {
        if class.archived && !include_archived {
            continue;
        }
        let students = store.list_class_students(&class.id).map_err(db_read)?;
        let mut row = to_value(&class)?;
        row["activeStudentCount"] = json!(active_count(&students));
        out.push(row);
    }
    Ok(json!({ "classes": out }))
}

fn classes_create(store: &dyn Gateway, params: &Value) -> Handled {
    let class = create_class(
        store,
        required_text(params, "name")?,
        opt_text(params, "period")?.unwrap_or_default(),
        opt_text(params, "academicYear")?.unwrap_or_default(),
        opt_text(params, "teacherId")?.unwrap_or_else(|| DEFAULT_TEACHER.to_string()),
    )?;
    Ok(json!({ "class": class }))
}

fn classes_update(store: &dyn Gateway, params: &Value) -> Handled {
    let class_id = required_str(params, "classId")?;
    let mut class = load_class(store, &class_id)?;
    if params.get("name").is_some() {
        class.name = required_text(params, "name")?;
    }
    if let Some(period) = opt_str(params, "period")? {
        class.period = period.trim().to_string();
    }
    if let Some(year) = opt_str(params, "academicYear")? {
        class.academic_year = year.trim().to_string();
    }
    if let Some(archived) = opt_bool(params, "archived")? {
        if class.archived && !archived {
            // Another class may have taken the code while this one was archived.
            let taken = taken_codes(store, Some(&class.id)).map_err(db_read)?;
            if taken.contains(&class.enrollment_code) {
                class.enrollment_code = generate_enrollment_code(&taken)?;
            }
        }
        class.archived = archived;
    }
    store.update_class(&class).map_err(db_write)?;
    Ok(json!({ "class": class }))
}

fn classes_delete(store: &dyn Gateway, params: &Value) -> Handled {
    let class_id = required_str(params, "classId")?;
    let class = load_class(store, &class_id)?;
    store.delete_class(&class.id).map_err(|e| {
        db_write(e).with_details(json!({ "classId": class.id }))
    })?;
    info!(class_id = %class.id, "class deleted");
    Ok(json!({ "ok": true }))
}

fn classes_ensure_default(store: &dyn Gateway, params: &Value) -> Handled {
    let existing = store.list_classes().map_err(db_read)?;
    if let Some(class) = existing.into_iter().find(|c| !c.archived) {
        return Ok(json!({ "class": class, "created": false }));
    }
    let class = create_class(
        store,
        DEFAULT_CLASS_NAME.to_string(),
        String::new(),
        String::new(),
        opt_text(params, "teacherId")?.unwrap_or_else(|| DEFAULT_TEACHER.to_string()),
    )?;
    Ok(json!({ "class": class, "created": true }))
}

fn classes_regenerate_code(store: &dyn Gateway, params: &Value) -> Handled {
    let (mut class, _ctx) = class_context(store, params)?;
    let mut taken = taken_codes(store, None).map_err(db_read)?;
    taken.insert(class.enrollment_code.clone());
    class.enrollment_code = generate_enrollment_code(&taken)?;
    store.update_class(&class).map_err(db_write)?;
    Ok(json!({ "classId": class.id, "enrollmentCode": class.enrollment_code }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.list" => Some(with_store(state, req, classes_list)),
        "classes.create" => Some(with_store(state, req, classes_create)),
        "classes.update" => Some(with_store(state, req, classes_update)),
        "classes.delete" => Some(with_store(state, req, classes_delete)),
        "classes.ensureDefault" => Some(with_store(state, req, classes_ensure_default)),
        "classes.regenerateCode" => Some(with_store(state, req, classes_regenerate_code)),
        _ => None,
    }
}
