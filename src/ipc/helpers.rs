use crate::curriculum::ClassContext;
use crate::error::CoreError;
use crate::gateway::Gateway;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::Class;
use serde_json::Value;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn response(self, id: &str) -> Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<CoreError> for HandlerErr {
    fn from(e: CoreError) -> Self {
        let details = match &e {
            CoreError::Conflict { expected, found } => Some(serde_json::json!({
                "expectedVersion": expected,
                "currentVersion": found,
            })),
            CoreError::NotFound { entity, id } => Some(serde_json::json!({
                "entity": entity,
                "id": id,
            })),
            _ => None,
        };
        Self {
            code: e.code(),
            message: e.to_string(),
            details,
        }
    }
}

pub fn db_read(e: anyhow::Error) -> HandlerErr {
    HandlerErr::new("db_query_failed", format!("{e:#}"))
}

pub fn db_write(e: anyhow::Error) -> HandlerErr {
    HandlerErr::new("db_write_failed", format!("{e:#}"))
}

pub type Handled = Result<Value, HandlerErr>;

/// Runs `f` against the open workspace store, answering `no_workspace`
/// when none is selected.
pub fn with_store(state: &AppState, req: &Request, f: fn(&dyn Gateway, &Value) -> Handled) -> Value {
    let Some(store) = state.store.as_deref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match f(store, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

/// Required string that must not be blank after trimming.
pub fn required_text(params: &Value, key: &str) -> Result<String, HandlerErr> {
    let s = required_str(params, key)?;
    let s = s.trim();
    if s.is_empty() {
        return Err(HandlerErr::bad_params(format!("{} must not be empty", key)));
    }
    Ok(s.to_string())
}

/// Absent or null reads as `None`; any other non-string is rejected.
pub fn opt_str(params: &Value, key: &str) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(HandlerErr::bad_params(format!("{} must be a string", key))),
    }
}

/// Like [`opt_str`] but blank strings also read as `None`.
pub fn opt_text(params: &Value, key: &str) -> Result<Option<String>, HandlerErr> {
    Ok(opt_str(params, key)?
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}

pub fn opt_bool(params: &Value, key: &str) -> Result<Option<bool>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_bool()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be boolean", key))),
    }
}

pub fn opt_i64(params: &Value, key: &str) -> Result<Option<i64>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be integer", key))),
    }
}

pub fn required_i64(params: &Value, key: &str) -> Result<i64, HandlerErr> {
    opt_i64(params, key)?.ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn opt_u32(params: &Value, key: &str) -> Result<Option<u32>, HandlerErr> {
    match opt_i64(params, key)? {
        None => Ok(None),
        Some(n) => u32::try_from(n)
            .map(Some)
            .map_err(|_| HandlerErr::bad_params(format!("{} must be a non-negative integer", key))),
    }
}

pub fn string_array(params: &Value, key: &str) -> Result<Option<Vec<String>>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(|s| s.to_string())
                    .ok_or_else(|| HandlerErr::bad_params(format!("{} must contain strings", key)))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        Some(_) => Err(HandlerErr::bad_params(format!("{} must be an array", key))),
    }
}

pub fn expected_version(params: &Value) -> Result<Option<u64>, HandlerErr> {
    match params.get("expectedVersion") {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params("expectedVersion must be a non-negative integer")),
    }
}

pub fn load_class(store: &dyn Gateway, class_id: &str) -> Result<Class, HandlerErr> {
    store
        .get_class(class_id)
        .map_err(db_read)?
        .ok_or_else(|| CoreError::not_found("class", class_id).into())
}

/// Resolves `params.classId` into an active class context.
pub fn class_context(store: &dyn Gateway, params: &Value) -> Result<(Class, ClassContext), HandlerErr> {
    let class_id = required_str(params, "classId")?;
    let class = load_class(store, &class_id)?;
    let ctx = ClassContext::for_class(&class)?;
    Ok((class, ctx))
}

pub fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, HandlerErr> {
    serde_json::to_value(value).map_err(|e| HandlerErr::new("internal", e.to_string()))
}
