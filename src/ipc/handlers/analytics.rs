use crate::analytics::class_analytics;
use crate::gateway::Gateway;
use crate::ipc::handlers::setup::struggling_threshold;
use crate::ipc::helpers::{class_context, db_read, to_value, with_store, Handled};
use crate::ipc::types::{AppState, Request};
use serde_json::Value;

fn analytics_class(store: &dyn Gateway, params: &Value) -> Handled {
    let (_class, ctx) = class_context(store, params)?;
    let roster = store.list_class_students(ctx.class_id()).map_err(db_read)?;
    let lessons = ctx.scope(store.list_lessons(ctx.class_id()).map_err(db_read)?);
    let submissions = ctx.scope(store.list_submissions(ctx.class_id()).map_err(db_read)?);
    let threshold = struggling_threshold(store)?;
    to_value(&class_analytics(&roster, &lessons, &submissions, threshold))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "analytics.class" => Some(with_store(state, req, analytics_class)),
        _ => None,
    }
}
