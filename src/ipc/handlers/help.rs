use crate::error::CoreError;
use crate::gateway::Gateway;
use crate::help_queue::{new_request, open_queue, transition};
use crate::ipc::handlers::setup::help_thresholds;
use crate::ipc::helpers::{
    class_context, db_read, db_write, opt_i64, opt_text, required_str, with_store, Handled,
    HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{now_ms, HelpStatus};
use serde_json::{json, Value};

fn help_create(store: &dyn Gateway, params: &Value) -> Handled {
    let (_class, ctx) = class_context(store, params)?;
    let student_id = required_str(params, "studentId")?;
    let lesson_id = required_str(params, "lessonId")?;
    let request = new_request(&ctx, &student_id, &lesson_id, opt_text(params, "message")?);
    store.save_help_request(&request).map_err(db_write)?;
    Ok(json!({ "request": request }))
}

fn help_queue(store: &dyn Gateway, params: &Value) -> Handled {
    let (_class, ctx) = class_context(store, params)?;
    let now = opt_i64(params, "now")?.unwrap_or_else(now_ms);
    let thresholds = help_thresholds(store)?;
    let requests = ctx.scope(store.list_help_requests(ctx.class_id()).map_err(db_read)?);
    Ok(json!({ "queue": open_queue(&requests, now, thresholds) }))
}

fn help_transition(store: &dyn Gateway, params: &Value) -> Handled {
    let (_class, ctx) = class_context(store, params)?;
    let id = required_str(params, "requestId")?;
    let raw = required_str(params, "status")?;
    let to = HelpStatus::parse(&raw).ok_or_else(|| {
        HandlerErr::bad_params("status must be one of: pending, in-progress, resolved")
    })?;
    let mut request = store
        .get_help_request(&id)
        .map_err(db_read)?
        .filter(|r| ctx.owns(r))
        .ok_or_else(|| CoreError::not_found("help request", id))?;
    transition(&mut request, to)?;
    store.save_help_request(&request).map_err(db_write)?;
    Ok(json!({ "request": request }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "help.create" => Some(with_store(state, req, help_create)),
        "help.queue" => Some(with_store(state, req, help_queue)),
        "help.transition" => Some(with_store(state, req, help_transition)),
        _ => None,
    }
}
