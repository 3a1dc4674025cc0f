use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;
use tracing::debug;

type TryHandle = fn(&mut AppState, &Request) -> Option<serde_json::Value>;

const HANDLERS: &[TryHandle] = &[
    handlers::core::try_handle,
    handlers::setup::try_handle,
    handlers::classes::try_handle,
    handlers::students::try_handle,
    handlers::enrollments::try_handle,
    handlers::units::try_handle,
    handlers::lessons::try_handle,
    handlers::submissions::try_handle,
    handlers::rubrics::try_handle,
    handlers::announcements::try_handle,
    handlers::help::try_handle,
    handlers::feedback_templates::try_handle,
    handlers::analytics::try_handle,
    handlers::ai::try_handle,
];

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    debug!(id = %req.id, method = %req.method, "request");
    for try_handle in HANDLERS {
        if let Some(resp) = try_handle(state, &req) {
            return resp;
        }
    }

    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
