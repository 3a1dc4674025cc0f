use crate::curriculum::ClassContext;
use crate::error::CoreError;
use crate::gateway::Gateway;
use crate::ipc::helpers::{
    class_context, db_read, db_write, opt_str, opt_text, required_str, required_text, with_store,
    Handled, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{new_id, now_ms, Enrollment, EnrollmentStatus, Student};
use crate::roster::{
    active_count, avatar_initials, export_roster_csv, new_student, parse_roster_csv, partition,
    plan_csv_import,
};
use serde_json::{json, Value};
use tracing::{info, warn};

/// A student on the class roster (approved enrollment), archived or not.
fn roster_student(store: &dyn Gateway, ctx: &ClassContext, student_id: &str) -> Result<Student, HandlerErr> {
    store
        .list_class_students(ctx.class_id())
        .map_err(db_read)?
        .into_iter()
        .find(|s| s.id == student_id)
        .ok_or_else(|| CoreError::not_found("student", student_id).into())
}

fn students_list(store: &dyn Gateway, params: &Value) -> Handled {
    let (_class, ctx) = class_context(store, params)?;
    let students = store.list_class_students(ctx.class_id()).map_err(db_read)?;
    let (active, archived) = partition(&students);
    Ok(json!({
        "active": active,
        "archived": archived,
        "activeCount": active_count(&students),
    }))
}

fn students_create(store: &dyn Gateway, params: &Value) -> Handled {
    let (_class, ctx) = class_context(store, params)?;
    let mut student = new_student(
        &required_text(params, "name")?,
        opt_text(params, "email")?,
        opt_text(params, "schoolId")?,
    );
    student.notes = opt_text(params, "notes")?;
    let ts = now_ms();
    let enrollment = Enrollment {
        id: new_id(),
        student_id: student.id.clone(),
        class_id: ctx.class_id().to_string(),
        status: EnrollmentStatus::Approved,
        requested_at: ts,
        enrolled_at: Some(ts),
    };
    store
        .insert_roster(std::slice::from_ref(&student), std::slice::from_ref(&enrollment))
        .map_err(db_write)?;
    Ok(json!({ "student": student }))
}

fn students_update(store: &dyn Gateway, params: &Value) -> Handled {
    let (_class, ctx) = class_context(store, params)?;
    let student_id = required_str(params, "studentId")?;
    let mut student = roster_student(store, &ctx, &student_id)?;
    if params.get("name").is_some() {
        student.name = required_text(params, "name")?;
        student.avatar = avatar_initials(&student.name);
    }
    // Present-but-blank clears the field.
    if params.get("email").is_some() {
        student.email = opt_text(params, "email")?;
    }
    if params.get("schoolId").is_some() {
        student.school_id = opt_text(params, "schoolId")?;
    }
    if params.get("notes").is_some() {
        student.notes = opt_str(params, "notes")?.filter(|n| !n.trim().is_empty());
    }
    store.update_student(&student).map_err(db_write)?;
    Ok(json!({ "student": student }))
}

fn set_active(store: &dyn Gateway, params: &Value, active: bool) -> Handled {
    let (_class, ctx) = class_context(store, params)?;
    let student_id = required_str(params, "studentId")?;
    let mut student = roster_student(store, &ctx, &student_id)?;
    let changed = student.is_active != active;
    if changed {
        student.is_active = active;
        store.update_student(&student).map_err(db_write)?;
    }
    Ok(json!({ "student": student, "changed": changed }))
}

fn students_archive(store: &dyn Gateway, params: &Value) -> Handled {
    set_active(store, params, false)
}

fn students_restore(store: &dyn Gateway, params: &Value) -> Handled {
    set_active(store, params, true)
}

fn students_import_csv(store: &dyn Gateway, params: &Value) -> Handled {
    let (_class, ctx) = class_context(store, params)?;
    let csv = required_str(params, "csv")?;
    let parsed = parse_roster_csv(&csv)?;
    let existing = store.list_class_students(ctx.class_id()).map_err(db_read)?;
    let plan = plan_csv_import(&ctx, &existing, &parsed.rows);
    store
        .insert_roster(&plan.students, &plan.enrollments)
        .map_err(db_write)?;
    if !plan.duplicates.is_empty() {
        warn!(class_id = %ctx.class_id(), count = plan.duplicates.len(), "csv rows skipped as duplicates");
    }
    info!(class_id = %ctx.class_id(), imported = plan.students.len(), "roster imported");
    Ok(json!({
        "imported": plan.students.len(),
        "students": plan.students,
        "duplicates": plan.duplicates,
        "skippedLines": parsed.skipped_lines,
    }))
}

fn students_export_csv(store: &dyn Gateway, params: &Value) -> Handled {
    let (_class, ctx) = class_context(store, params)?;
    let students = store.list_class_students(ctx.class_id()).map_err(db_read)?;
    Ok(json!({ "csv": export_roster_csv(&students) }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(with_store(state, req, students_list)),
        "students.create" => Some(with_store(state, req, students_create)),
        "students.update" => Some(with_store(state, req, students_update)),
        "students.archive" => Some(with_store(state, req, students_archive)),
        "students.restore" => Some(with_store(state, req, students_restore)),
        "students.importCsv" => Some(with_store(state, req, students_import_csv)),
        "students.exportCsv" => Some(with_store(state, req, students_export_csv)),
        _ => None,
    }
}
