use crate::error::CoreError;
use crate::gateway::Gateway;
use crate::ipc::helpers::{db_read, db_write, opt_text, required_str, required_text, with_store, Handled};
use crate::ipc::types::{AppState, Request};
use crate::model::{new_id, now_ms, FeedbackTemplate};
use serde_json::{json, Value};

fn feedback_templates_list(store: &dyn Gateway, params: &Value) -> Handled {
    let teacher_id = required_text(params, "teacherId")?;
    let category = opt_text(params, "category")?.map(|c| c.to_ascii_lowercase());
    let templates: Vec<FeedbackTemplate> = store
        .list_feedback_templates(&teacher_id)
        .map_err(db_read)?
        .into_iter()
        .filter(|t| match &category {
            Some(c) => t.category.as_deref().map(str::to_ascii_lowercase).as_ref() == Some(c),
            None => true,
        })
        .collect();
    Ok(json!({ "templates": templates }))
}

fn feedback_templates_create(store: &dyn Gateway, params: &Value) -> Handled {
    let template = FeedbackTemplate {
        id: new_id(),
        teacher_id: required_text(params, "teacherId")?,
        title: required_text(params, "title")?,
        text: required_text(params, "text")?,
        category: opt_text(params, "category")?,
        created_at: now_ms(),
    };
    store.insert_feedback_template(&template).map_err(db_write)?;
    Ok(json!({ "template": template }))
}

fn feedback_templates_delete(store: &dyn Gateway, params: &Value) -> Handled {
    let id = required_str(params, "templateId")?;
    if !store.delete_feedback_template(&id).map_err(db_write)? {
        return Err(CoreError::not_found("feedback template", id).into());
    }
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "feedbackTemplates.list" => Some(with_store(state, req, feedback_templates_list)),
        "feedbackTemplates.create" => Some(with_store(state, req, feedback_templates_create)),
        "feedbackTemplates.delete" => Some(with_store(state, req, feedback_templates_delete)),
        _ => None,
    }
}
