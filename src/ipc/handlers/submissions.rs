use crate::curriculum::ClassContext;
use crate::error::CoreError;
use crate::gateway::Gateway;
use crate::ipc::helpers::{
    class_context, db_read, db_write, expected_version, opt_i64, opt_str, opt_text, opt_u32,
    required_i64, required_str, string_array, with_store, Handled, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{HistoryItem, Submission, SubmissionStatus};
use crate::progress::{
    bulk_grade, check_version, grade_submission, score_rubric, submit_lesson, update_progress,
    ProgressUpdate, SubmitInput,
};
use serde_json::{json, Value};
use std::collections::HashMap;

fn ensure_class_lesson(store: &dyn Gateway, ctx: &ClassContext, lesson_id: &str) -> Result<(), HandlerErr> {
    match store.get_lesson(lesson_id).map_err(db_read)? {
        Some(lesson) if ctx.owns(&lesson) => Ok(()),
        _ => Err(CoreError::not_found("lesson", lesson_id).into()),
    }
}

fn load_submission(store: &dyn Gateway, ctx: &ClassContext, params: &Value) -> Result<Submission, HandlerErr> {
    let id = required_str(params, "submissionId")?;
    store
        .get_submission(&id)
        .map_err(db_read)?
        .filter(|s| ctx.owns(s))
        .ok_or_else(|| CoreError::not_found("submission", id).into())
}

fn submissions_list(store: &dyn Gateway, params: &Value) -> Handled {
    let (_class, ctx) = class_context(store, params)?;
    let lesson_id = opt_text(params, "lessonId")?;
    let student_id = opt_text(params, "studentId")?;
    let status = match opt_str(params, "status")? {
        Some(raw) => Some(SubmissionStatus::parse(&raw).ok_or_else(|| {
            HandlerErr::bad_params("status must be one of: Draft, Submitted, Graded")
        })?),
        None => None,
    };
    let submissions: Vec<Submission> = ctx
        .scope(store.list_submissions(ctx.class_id()).map_err(db_read)?)
        .into_iter()
        .filter(|s| lesson_id.as_ref().map_or(true, |l| &s.lesson_id == l))
        .filter(|s| student_id.as_ref().map_or(true, |st| &s.student_id == st))
        .filter(|s| status.map_or(true, |st| s.status == st))
        .collect();
    Ok(json!({ "submissions": submissions }))
}

fn submissions_get(store: &dyn Gateway, params: &Value) -> Handled {
    let (_class, ctx) = class_context(store, params)?;
    let submission = match opt_text(params, "submissionId")? {
        Some(_) => Some(load_submission(store, &ctx, params)?),
        None => {
            let student_id = required_str(params, "studentId")?;
            let lesson_id = required_str(params, "lessonId")?;
            store
                .find_submission(&student_id, &lesson_id)
                .map_err(db_read)?
                .filter(|s| ctx.owns(s))
        }
    };
    Ok(json!({ "submission": submission }))
}

fn submissions_update_progress(store: &dyn Gateway, params: &Value) -> Handled {
    let (_class, ctx) = class_context(store, params)?;
    let lesson_id = required_str(params, "lessonId")?;
    let student_id = required_str(params, "studentId")?;
    ensure_class_lesson(store, &ctx, &lesson_id)?;
    let history_item = match params.get("historyItem") {
        None | Some(Value::Null) => None,
        Some(v) => Some(
            serde_json::from_value::<HistoryItem>(v.clone())
                .map_err(|e| HandlerErr::bad_params(format!("historyItem: {}", e)))?,
        ),
    };
    let update = ProgressUpdate {
        lesson_id,
        student_id,
        code: opt_str(params, "code")?.unwrap_or_default(),
        step_index: opt_u32(params, "stepIndex")?.unwrap_or(0),
        history_item,
        time_spent_delta: opt_i64(params, "timeSpentDelta")?,
    };
    let existing = store
        .find_submission(&update.student_id, &update.lesson_id)
        .map_err(db_read)?;
    if let Some(prev) = &existing {
        check_version(prev, expected_version(params)?)?;
    }
    let submission = update_progress(&ctx, existing.as_ref(), update);
    store.save_submission(&submission).map_err(db_write)?;
    Ok(json!({ "submission": submission }))
}

fn submissions_submit(store: &dyn Gateway, params: &Value) -> Handled {
    let (_class, ctx) = class_context(store, params)?;
    let lesson_id = required_str(params, "lessonId")?;
    let student_id = required_str(params, "studentId")?;
    ensure_class_lesson(store, &ctx, &lesson_id)?;
    let existing = store
        .find_submission(&student_id, &lesson_id)
        .map_err(db_read)?;
    if let Some(prev) = &existing {
        check_version(prev, expected_version(params)?)?;
    }
    let input = SubmitInput {
        lesson_id,
        student_id,
        code: opt_str(params, "code")?.unwrap_or_default(),
        text_answer: opt_str(params, "textAnswer")?,
        time_spent: opt_i64(params, "timeSpent")?,
    };
    let submission = submit_lesson(&ctx, existing.as_ref(), input)?;
    store.save_submission(&submission).map_err(db_write)?;
    Ok(json!({ "submission": submission }))
}

fn submissions_grade(store: &dyn Gateway, params: &Value) -> Handled {
    let (_class, ctx) = class_context(store, params)?;
    let mut submission = load_submission(store, &ctx, params)?;
    check_version(&submission, expected_version(params)?)?;
    let grade = required_i64(params, "grade")?;
    let comment = opt_str(params, "comment")?.unwrap_or_default();
    grade_submission(&mut submission, grade, &comment)?;
    store.save_submission(&submission).map_err(db_write)?;
    Ok(json!({ "submission": submission }))
}

/// One grade and comment for many submissions; nothing is written unless
/// every id resolves and is gradeable.
fn submissions_bulk_grade(store: &dyn Gateway, params: &Value) -> Handled {
    let (_class, ctx) = class_context(store, params)?;
    let ids = string_array(params, "submissionIds")?
        .ok_or_else(|| HandlerErr::bad_params("missing submissionIds"))?;
    if ids.is_empty() {
        return Err(HandlerErr::bad_params("submissionIds must not be empty"));
    }
    let grade = required_i64(params, "grade")?;
    let comment = opt_str(params, "comment")?.unwrap_or_default();
    let subs = ctx.scope(store.list_submissions(ctx.class_id()).map_err(db_read)?);
    let graded = bulk_grade(&subs, &ids, grade, &comment)?;
    store.save_submissions(&graded).map_err(db_write)?;
    Ok(json!({ "graded": graded.len(), "submissions": graded }))
}

/// Converts rubric points into a grade; with `submissionId` the grade is
/// also applied.
fn submissions_score_rubric(store: &dyn Gateway, params: &Value) -> Handled {
    let (_class, ctx) = class_context(store, params)?;
    let rubric_id = required_str(params, "rubricId")?;
    let rubric = store
        .get_rubric(&rubric_id)
        .map_err(db_read)?
        .ok_or_else(|| CoreError::not_found("rubric", rubric_id.clone()))?;
    let points: HashMap<String, u32> = match params.get("scores") {
        Some(v @ Value::Object(_)) => serde_json::from_value(v.clone())
            .map_err(|e| HandlerErr::bad_params(format!("scores: {}", e)))?,
        _ => return Err(HandlerErr::bad_params("scores must be an object of criterion -> points")),
    };
    let score = score_rubric(&rubric, &points)?;
    let result = json!({
        "earned": score.earned,
        "possible": score.possible,
        "grade": score.grade,
    });
    if opt_text(params, "submissionId")?.is_none() {
        return Ok(json!({ "score": result }));
    }
    let mut submission = load_submission(store, &ctx, params)?;
    check_version(&submission, expected_version(params)?)?;
    let comment = opt_str(params, "comment")?.unwrap_or_default();
    grade_submission(&mut submission, score.grade as i64, &comment)?;
    store.save_submission(&submission).map_err(db_write)?;
    Ok(json!({ "score": result, "submission": submission }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "submissions.list" => Some(with_store(state, req, submissions_list)),
        "submissions.get" => Some(with_store(state, req, submissions_get)),
        "submissions.updateProgress" => Some(with_store(state, req, submissions_update_progress)),
        "submissions.submit" => Some(with_store(state, req, submissions_submit)),
        "submissions.grade" => Some(with_store(state, req, submissions_grade)),
        "submissions.bulkGrade" => Some(with_store(state, req, submissions_bulk_grade)),
        "submissions.scoreRubric" => Some(with_store(state, req, submissions_score_rubric)),
        _ => None,
    }
}
