use crate::error::CoreError;
use crate::gateway::Gateway;
use crate::ipc::handlers::setup::placeholder_name;
use crate::ipc::helpers::{
    class_context, db_read, db_write, opt_str, required_str, required_text, with_store, Handled,
    HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{Enrollment, EnrollmentStatus};
use crate::roster::{approve_enrollment, reject_enrollment, request_enrollment};
use serde_json::{json, Value};
use tracing::info;

fn enrollments_list(store: &dyn Gateway, params: &Value) -> Handled {
    let (_class, ctx) = class_context(store, params)?;
    let status = match opt_str(params, "status")? {
        Some(raw) => Some(
            EnrollmentStatus::parse(&raw)
                .ok_or_else(|| HandlerErr::bad_params("status must be one of: pending, approved, rejected"))?,
        ),
        None => None,
    };
    let enrollments: Vec<Enrollment> = store
        .list_enrollments(ctx.class_id())
        .map_err(db_read)?
        .into_iter()
        .filter(|e| status.map_or(true, |s| e.status == s))
        .collect();
    Ok(json!({ "enrollments": enrollments }))
}

/// A student asks to join the class whose code they typed.
fn enrollments_request(store: &dyn Gateway, params: &Value) -> Handled {
    let code = required_text(params, "enrollmentCode")?;
    let student_id = required_text(params, "studentId")?;
    let class = store
        .list_classes()
        .map_err(db_read)?
        .into_iter()
        .find(|c| !c.archived && c.enrollment_code == code)
        .ok_or_else(|| CoreError::not_found("class with code", code.clone()))?;

    let existing = store.list_enrollments(&class.id).map_err(db_read)?;
    if let Some(open) = existing
        .iter()
        .find(|e| e.student_id == student_id && e.status != EnrollmentStatus::Rejected)
    {
        return Ok(json!({ "enrollment": open, "created": false }));
    }

    let enrollment = request_enrollment(&class, &student_id)?;
    store.insert_enrollment(&enrollment).map_err(db_write)?;
    Ok(json!({ "enrollment": enrollment, "created": true }))
}

fn load_enrollment(store: &dyn Gateway, params: &Value) -> Result<Enrollment, HandlerErr> {
    let (_class, ctx) = class_context(store, params)?;
    let id = required_str(params, "enrollmentId")?;
    store
        .get_enrollment(&id)
        .map_err(db_read)?
        .filter(|e| ctx.owns(e))
        .ok_or_else(|| CoreError::not_found("enrollment", id).into())
}

fn enrollments_approve(store: &dyn Gateway, params: &Value) -> Handled {
    let mut enrollment = load_enrollment(store, params)?;
    let student = store.get_student(&enrollment.student_id).map_err(db_read)?;
    let placeholder = placeholder_name(store)?;
    let created = approve_enrollment(&mut enrollment, student.as_ref(), &placeholder)?;
    store
        .save_enrollment(&enrollment, created.as_ref())
        .map_err(db_write)?;
    info!(enrollment_id = %enrollment.id, placeholder = created.is_some(), "enrollment approved");
    Ok(json!({
        "enrollment": enrollment,
        "student": created.or(student),
    }))
}

fn enrollments_reject(store: &dyn Gateway, params: &Value) -> Handled {
    let mut enrollment = load_enrollment(store, params)?;
    reject_enrollment(&mut enrollment)?;
    store.save_enrollment(&enrollment, None).map_err(db_write)?;
    Ok(json!({ "enrollment": enrollment }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "enrollments.list" => Some(with_store(state, req, enrollments_list)),
        "enrollments.request" => Some(with_store(state, req, enrollments_request)),
        "enrollments.approve" => Some(with_store(state, req, enrollments_approve)),
        "enrollments.reject" => Some(with_store(state, req, enrollments_reject)),
        _ => None,
    }
}
