use crate::announcements::{for_student, new_announcement};
use crate::error::CoreError;
use crate::gateway::Gateway;
use crate::ipc::helpers::{
    class_context, db_read, db_write, opt_i64, opt_str, required_str, required_text,
    string_array, with_store, Handled,
};
use crate::ipc::types::{AppState, Request};
use crate::model::now_ms;
use serde_json::{json, Value};

fn announcements_list(store: &dyn Gateway, params: &Value) -> Handled {
    let (_class, ctx) = class_context(store, params)?;
    let all = ctx.scope(store.list_announcements(ctx.class_id()).map_err(db_read)?);
    Ok(json!({ "announcements": all }))
}

fn announcements_create(store: &dyn Gateway, params: &Value) -> Handled {
    let (_class, ctx) = class_context(store, params)?;
    let announcement = new_announcement(
        &ctx,
        &required_text(params, "title")?,
        &opt_str(params, "body")?.unwrap_or_default(),
        opt_i64(params, "scheduledAt")?,
        string_array(params, "targetStudentIds")?.unwrap_or_default(),
    )?;
    store.insert_announcement(&announcement).map_err(db_write)?;
    Ok(json!({ "announcement": announcement }))
}

fn announcements_delete(store: &dyn Gateway, params: &Value) -> Handled {
    let (_class, ctx) = class_context(store, params)?;
    let id = required_str(params, "announcementId")?;
    if !store.delete_announcement(ctx.class_id(), &id).map_err(db_write)? {
        return Err(CoreError::not_found("announcement", id).into());
    }
    Ok(json!({ "ok": true }))
}

fn announcements_for_student(store: &dyn Gateway, params: &Value) -> Handled {
    let (_class, ctx) = class_context(store, params)?;
    let student_id = required_str(params, "studentId")?;
    let now = opt_i64(params, "now")?.unwrap_or_else(now_ms);
    let all = ctx.scope(store.list_announcements(ctx.class_id()).map_err(db_read)?);
    Ok(json!({ "announcements": for_student(&all, &student_id, now) }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "announcements.list" => Some(with_store(state, req, announcements_list)),
        "announcements.create" => Some(with_store(state, req, announcements_create)),
        "announcements.delete" => Some(with_store(state, req, announcements_delete)),
        "announcements.forStudent" => Some(with_store(state, req, announcements_for_student)),
        _ => None,
    }
}
