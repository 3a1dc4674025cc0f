use crate::error::CoreError;
use crate::gateway::Gateway;
use crate::ipc::helpers::{
    db_read, db_write, opt_text, required_str, required_text, with_store, Handled, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{new_id, now_ms, Criterion, Rubric, MAX_CRITERION_POINTS};
use serde_json::{json, Value};
use std::collections::HashSet;

fn parse_criteria(params: &Value) -> Result<Vec<Criterion>, HandlerErr> {
    let Some(raw) = params.get("criteria") else {
        return Err(HandlerErr::bad_params("missing criteria"));
    };
    let criteria: Vec<Criterion> = serde_json::from_value(raw.clone())
        .map_err(|e| HandlerErr::bad_params(format!("criteria: {}", e)))?;
    if criteria.is_empty() {
        return Err(HandlerErr::bad_params("criteria must not be empty"));
    }
    let mut names = HashSet::new();
    for c in &criteria {
        let name = c.name.trim();
        if name.is_empty() {
            return Err(HandlerErr::bad_params("criterion name must not be empty"));
        }
        // Scores are keyed by criterion name.
        if !names.insert(name.to_string()) {
            return Err(HandlerErr::bad_params(format!("duplicate criterion: {}", name)));
        }
        if !(1..=MAX_CRITERION_POINTS).contains(&c.max_points) {
            return Err(HandlerErr::bad_params(format!(
                "{}: maxPoints must be in 1..={}",
                name, MAX_CRITERION_POINTS
            )));
        }
    }
    Ok(criteria
        .into_iter()
        .map(|c| Criterion {
            name: c.name.trim().to_string(),
            ..c
        })
        .collect())
}

fn rubric_json(rubric: &Rubric) -> Value {
    json!({ "rubric": rubric, "totalPoints": rubric.total_points() })
}

fn rubrics_list(store: &dyn Gateway, params: &Value) -> Handled {
    let lesson_id = opt_text(params, "lessonId")?;
    let rubrics: Vec<Value> = store
        .list_rubrics()
        .map_err(db_read)?
        .iter()
        .filter(|r| lesson_id.is_none() || r.lesson_id == lesson_id)
        .map(rubric_json)
        .collect();
    Ok(json!({ "rubrics": rubrics }))
}

fn rubrics_create(store: &dyn Gateway, params: &Value) -> Handled {
    let rubric = Rubric {
        id: new_id(),
        name: required_text(params, "name")?,
        description: opt_text(params, "description")?,
        criteria: parse_criteria(params)?,
        lesson_id: opt_text(params, "lessonId")?,
        created_at: now_ms(),
    };
    store.save_rubric(&rubric).map_err(db_write)?;
    Ok(rubric_json(&rubric))
}

fn rubrics_update(store: &dyn Gateway, params: &Value) -> Handled {
    let id = required_str(params, "rubricId")?;
    let mut rubric = store
        .get_rubric(&id)
        .map_err(db_read)?
        .ok_or_else(|| CoreError::not_found("rubric", id))?;
    if params.get("name").is_some() {
        rubric.name = required_text(params, "name")?;
    }
    if params.get("description").is_some() {
        rubric.description = opt_text(params, "description")?;
    }
    if params.get("criteria").is_some() {
        rubric.criteria = parse_criteria(params)?;
    }
    if params.get("lessonId").is_some() {
        rubric.lesson_id = opt_text(params, "lessonId")?;
    }
    store.save_rubric(&rubric).map_err(db_write)?;
    Ok(rubric_json(&rubric))
}

fn rubrics_delete(store: &dyn Gateway, params: &Value) -> Handled {
    let id = required_str(params, "rubricId")?;
    if !store.delete_rubric(&id).map_err(db_write)? {
        return Err(CoreError::not_found("rubric", id).into());
    }
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "rubrics.list" => Some(with_store(state, req, rubrics_list)),
        "rubrics.create" => Some(with_store(state, req, rubrics_create)),
        "rubrics.update" => Some(with_store(state, req, rubrics_update)),
        "rubrics.delete" => Some(with_store(state, req, rubrics_delete)),
        _ => None,
    }
}
