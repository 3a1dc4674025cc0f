use crate::curriculum::{instantiate_template, move_lesson, promote_to_template, ClassContext};
use crate::error::CoreError;
use crate::gateway::Gateway;
use crate::ipc::helpers::{
    class_context, db_read, db_write, opt_bool, opt_str, opt_text, required_str, required_text,
    string_array, to_value, with_store, Handled, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{classify_step, new_id, now_ms, EditorType, LessonPlan, LessonType, StepKind};
use crate::transfer::{export_lesson, export_lessons, import_lessons};
use serde_json::{json, Value};
use tracing::{info, warn};

fn ensure_unit(store: &dyn Gateway, ctx: &ClassContext, unit_id: &str) -> Result<(), HandlerErr> {
    let found = store
        .list_units(ctx.class_id())
        .map_err(db_read)?
        .iter()
        .any(|u| u.id == unit_id);
    if found {
        Ok(())
    } else {
        Err(CoreError::not_found("unit", unit_id).into())
    }
}

/// Copies the editable lesson fields present in `params` onto `lesson`.
fn apply_lesson_fields(params: &Value, lesson: &mut LessonPlan) -> Result<(), HandlerErr> {
    if params.get("title").is_some() {
        lesson.title = required_text(params, "title")?;
    }
    if let Some(raw) = opt_str(params, "type")? {
        lesson.lesson_type = LessonType::parse(&raw)
            .ok_or_else(|| HandlerErr::bad_params("type must be Lesson or Assignment"))?;
    }
    if let Some(raw) = opt_str(params, "editorType")? {
        lesson.editor_type = EditorType::parse(&raw)
            .ok_or_else(|| HandlerErr::bad_params("editorType must be p5 or scratch"))?;
    }
    if let Some(v) = opt_str(params, "description")? {
        lesson.description = v;
    }
    if let Some(v) = opt_str(params, "level")? {
        lesson.level = v.trim().to_string();
    }
    if let Some(v) = opt_str(params, "starterCode")? {
        lesson.starter_code = v;
    }
    if let Some(v) = opt_str(params, "challenge")? {
        lesson.challenge = v;
    }
    if let Some(steps) = string_array(params, "steps")? {
        lesson.steps = steps;
    }
    if let Some(tags) = string_array(params, "tags")? {
        lesson.tags = tags
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
    }
    if params.get("rubricId").is_some() {
        lesson.rubric_id = opt_text(params, "rubricId")?;
    }
    Ok(())
}

fn load_lesson(store: &dyn Gateway, lesson_id: &str) -> Result<LessonPlan, HandlerErr> {
    store
        .get_lesson(lesson_id)
        .map_err(db_read)?
        .ok_or_else(|| CoreError::not_found("lesson", lesson_id).into())
}

/// Class lessons need an owning class context; templates stand alone.
fn load_editable(store: &dyn Gateway, params: &Value) -> Result<LessonPlan, HandlerErr> {
    let lesson_id = required_str(params, "lessonId")?;
    let lesson = load_lesson(store, &lesson_id)?;
    if lesson.is_template && lesson.class_id.is_none() {
        return Ok(lesson);
    }
    let (_class, ctx) = class_context(store, params)?;
    if !ctx.owns(&lesson) {
        return Err(CoreError::not_found("lesson", lesson_id).into());
    }
    Ok(lesson)
}

fn check_rubric(store: &dyn Gateway, lesson: &LessonPlan) -> Result<(), HandlerErr> {
    if let Some(rubric_id) = &lesson.rubric_id {
        if store.get_rubric(rubric_id).map_err(db_read)?.is_none() {
            return Err(CoreError::not_found("rubric", rubric_id.clone()).into());
        }
    }
    Ok(())
}

fn lessons_list(store: &dyn Gateway, params: &Value) -> Handled {
    let (_class, ctx) = class_context(store, params)?;
    let unit_filter = opt_str(params, "unitId")?;
    let lessons: Vec<LessonPlan> = ctx
        .scope(store.list_lessons(ctx.class_id()).map_err(db_read)?)
        .into_iter()
        .filter(|l| match &unit_filter {
            Some(u) => l.unit_id.as_deref() == Some(u.as_str()),
            None => true,
        })
        .collect();
    Ok(json!({ "lessons": lessons }))
}

/// The runner's view of a lesson: classified steps, the unit's gating
/// flags and, when `studentId` is given, that student's submission.
fn lessons_open(store: &dyn Gateway, params: &Value) -> Handled {
    let (_class, ctx) = class_context(store, params)?;
    let lesson_id = required_str(params, "lessonId")?;
    let lesson = load_lesson(store, &lesson_id)?;
    if !ctx.owns(&lesson) {
        return Err(CoreError::not_found("lesson", lesson_id).into());
    }
    let steps: Vec<Value> = lesson
        .steps
        .iter()
        .enumerate()
        .map(|(index, step)| {
            let (kind, text) = classify_step(step);
            let kind = match kind {
                StepKind::Observe => "observe",
                StepKind::Reflect => "reflect",
                StepKind::Code => "code",
            };
            json!({ "index": index, "kind": kind, "text": text })
        })
        .collect();
    let unit = match &lesson.unit_id {
        Some(uid) => store
            .list_units(ctx.class_id())
            .map_err(db_read)?
            .into_iter()
            .find(|u| &u.id == uid),
        None => None,
    };
    let submission = match opt_text(params, "studentId")? {
        Some(student_id) => store
            .find_submission(&student_id, &lesson.id)
            .map_err(db_read)?,
        None => None,
    };
    Ok(json!({
        "lesson": lesson,
        "steps": steps,
        "unit": unit,
        "submission": submission,
    }))
}

fn lessons_create(store: &dyn Gateway, params: &Value) -> Handled {
    let (_class, ctx) = class_context(store, params)?;
    let unit_id = opt_text(params, "unitId")?;
    if let Some(uid) = &unit_id {
        ensure_unit(store, &ctx, uid)?;
    }
    let mut lesson = LessonPlan {
        id: new_id(),
        class_id: Some(ctx.class_id().to_string()),
        unit_id,
        lesson_type: LessonType::Lesson,
        title: required_text(params, "title")?,
        description: String::new(),
        level: String::new(),
        steps: Vec::new(),
        starter_code: String::new(),
        challenge: String::new(),
        rubric_id: None,
        is_template: false,
        tags: Vec::new(),
        editor_type: EditorType::P5,
        created_at: now_ms(),
    };
    apply_lesson_fields(params, &mut lesson)?;
    check_rubric(store, &lesson)?;
    store
        .insert_lessons(std::slice::from_ref(&lesson))
        .map_err(db_write)?;
    Ok(json!({ "lesson": lesson }))
}

fn lessons_update(store: &dyn Gateway, params: &Value) -> Handled {
    let mut lesson = load_editable(store, params)?;
    apply_lesson_fields(params, &mut lesson)?;
    check_rubric(store, &lesson)?;
    store.update_lesson(&lesson).map_err(db_write)?;
    Ok(json!({ "lesson": lesson }))
}

fn lessons_delete(store: &dyn Gateway, params: &Value) -> Handled {
    let lesson = load_editable(store, params)?;
    store.delete_lesson(&lesson.id).map_err(db_write)?;
    Ok(json!({ "ok": true }))
}

/// Unknown lessons and degenerate moves answer `changed: false`.
fn lessons_move(store: &dyn Gateway, params: &Value) -> Handled {
    let (_class, ctx) = class_context(store, params)?;
    let lesson_id = required_str(params, "lessonId")?;
    let dest_unit = required_str(params, "destUnitId")?;
    let before = opt_text(params, "beforeLessonId")?;
    ensure_unit(store, &ctx, &dest_unit)?;
    let mut lessons = ctx.scope(store.list_lessons(ctx.class_id()).map_err(db_read)?);
    let changed = move_lesson(&mut lessons, &lesson_id, &dest_unit, before.as_deref());
    if changed {
        store.save_lesson_order(&lessons).map_err(db_write)?;
    }
    Ok(json!({ "changed": changed, "lessons": lessons }))
}

fn lessons_promote_template(store: &dyn Gateway, params: &Value) -> Handled {
    let mut lesson = load_editable(store, params)?;
    promote_to_template(&mut lesson);
    store.update_lesson(&lesson).map_err(db_write)?;
    info!(lesson_id = %lesson.id, "lesson promoted to template");
    Ok(json!({ "lesson": lesson }))
}

fn lessons_templates(store: &dyn Gateway, params: &Value) -> Handled {
    let tag = opt_text(params, "tag")?.map(|t| t.to_ascii_lowercase());
    let templates: Vec<LessonPlan> = store
        .list_templates()
        .map_err(db_read)?
        .into_iter()
        .filter(|t| match &tag {
            Some(tag) => t.tags.iter().any(|x| x.to_ascii_lowercase() == *tag),
            None => true,
        })
        .collect();
    Ok(json!({ "templates": templates }))
}

fn lessons_instantiate_template(store: &dyn Gateway, params: &Value) -> Handled {
    let (_class, ctx) = class_context(store, params)?;
    let template_id = required_str(params, "templateId")?;
    let template = load_lesson(store, &template_id)?;
    if !template.is_template {
        return Err(HandlerErr::bad_params(format!("lesson {} is not a template", template_id)));
    }
    let unit_id = opt_text(params, "unitId")?;
    if let Some(uid) = &unit_id {
        ensure_unit(store, &ctx, uid)?;
    }
    let lesson = instantiate_template(&ctx, &template, unit_id.as_deref());
    store
        .insert_lessons(std::slice::from_ref(&lesson))
        .map_err(db_write)?;
    Ok(json!({ "lesson": lesson }))
}

/// `lessonId` exports one bare lesson; otherwise the class's lessons
/// (optionally narrowed by `lessonIds`) are wrapped in a document.
fn lessons_export(store: &dyn Gateway, params: &Value) -> Handled {
    let (_class, ctx) = class_context(store, params)?;
    if let Some(lesson_id) = opt_text(params, "lessonId")? {
        let lesson = load_lesson(store, &lesson_id)?;
        if !ctx.owns(&lesson) {
            return Err(CoreError::not_found("lesson", lesson_id).into());
        }
        return Ok(json!({ "document": to_value(&export_lesson(&lesson))? }));
    }
    let wanted = string_array(params, "lessonIds")?;
    let lessons: Vec<LessonPlan> = ctx
        .scope(store.list_lessons(ctx.class_id()).map_err(db_read)?)
        .into_iter()
        .filter(|l| wanted.as_ref().map_or(true, |ids| ids.contains(&l.id)))
        .collect();
    let include_templates = opt_bool(params, "includeTemplates")?.unwrap_or(false);
    let mut all = lessons;
    if include_templates {
        all.extend(store.list_templates().map_err(db_read)?);
    }
    Ok(json!({ "document": to_value(&export_lessons(&all, now_ms()))? }))
}

fn lessons_import(store: &dyn Gateway, params: &Value) -> Handled {
    let (_class, ctx) = class_context(store, params)?;
    let raw = match params.get("document") {
        Some(Value::String(s)) => s.clone(),
        Some(v @ Value::Object(_)) => v.to_string(),
        _ => return Err(HandlerErr::bad_params("document must be a JSON string or object")),
    };
    let lessons = import_lessons(&ctx, &raw).inspect_err(|e| {
        warn!(class_id = %ctx.class_id(), error = %e, "lesson import rejected");
    })?;
    store.insert_lessons(&lessons).map_err(db_write)?;
    info!(class_id = %ctx.class_id(), count = lessons.len(), "lessons imported");
    Ok(json!({ "imported": lessons.len(), "lessons": lessons }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "lessons.list" => Some(with_store(state, req, lessons_list)),
        "lessons.open" => Some(with_store(state, req, lessons_open)),
        "lessons.create" => Some(with_store(state, req, lessons_create)),
        "lessons.update" => Some(with_store(state, req, lessons_update)),
        "lessons.delete" => Some(with_store(state, req, lessons_delete)),
        "lessons.move" => Some(with_store(state, req, lessons_move)),
        "lessons.promoteTemplate" => Some(with_store(state, req, lessons_promote_template)),
        "lessons.templates" => Some(with_store(state, req, lessons_templates)),
        "lessons.instantiateTemplate" => Some(with_store(state, req, lessons_instantiate_template)),
        "lessons.export" => Some(with_store(state, req, lessons_export)),
        "lessons.import" => Some(with_store(state, req, lessons_import)),
        _ => None,
    }
}
