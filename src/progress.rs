//! Submission lifecycle: Draft -> Submitted -> Graded, never backwards.

use crate::curriculum::ClassContext;
use crate::error::CoreError;
use crate::model::{
    new_id, now_ms, Feedback, HistoryItem, Rubric, Submission, SubmissionStatus, FINAL_STEP,
};
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub lesson_id: String,
    pub student_id: String,
    pub code: String,
    pub step_index: u32,
    pub history_item: Option<HistoryItem>,
    /// Milliseconds spent since the previous save; added to the running total.
    pub time_spent_delta: Option<i64>,
}

pub fn check_version(sub: &Submission, expected: Option<u64>) -> Result<(), CoreError> {
    match expected {
        Some(v) if v != sub.version => Err(CoreError::Conflict {
            expected: v,
            found: sub.version,
        }),
        _ => Ok(()),
    }
}

fn add_time(total: Option<i64>, delta: Option<i64>) -> Option<i64> {
    match (total, delta.filter(|d| *d > 0)) {
        (t, None) => t,
        (None, Some(d)) => Some(d),
        (Some(t), Some(d)) => Some(t.saturating_add(d)),
    }
}

/// Records draft progress. Creates a Draft on first save; afterwards
/// overwrites code and step and upserts the history entry under the item's
/// own step index. The status is never touched.
pub fn update_progress(
    ctx: &ClassContext,
    existing: Option<&Submission>,
    update: ProgressUpdate,
) -> Submission {
    let ts = now_ms();
    match existing {
        None => {
            let mut history = BTreeMap::new();
            if let Some(item) = update.history_item {
                history.insert(item.step_index, item);
            }
            Submission {
                id: new_id(),
                class_id: ctx.class_id().to_string(),
                student_id: update.student_id,
                lesson_id: update.lesson_id,
                code: update.code,
                text_answer: None,
                status: SubmissionStatus::Draft,
                current_step: update.step_index,
                history,
                feedback: None,
                submitted_at: None,
                time_spent: add_time(None, update.time_spent_delta),
                version: 1,
                updated_at: ts,
            }
        }
        Some(prev) => {
            let mut next = prev.clone();
            next.code = update.code;
            next.current_step = update.step_index;
            if let Some(item) = update.history_item {
                next.history.insert(item.step_index, item);
            }
            next.time_spent = add_time(prev.time_spent, update.time_spent_delta);
            next.version = prev.version + 1;
            next.updated_at = ts;
            next
        }
    }
}

pub struct SubmitInput {
    pub lesson_id: String,
    pub student_id: String,
    pub code: String,
    pub text_answer: Option<String>,
    pub time_spent: Option<i64>,
}

/// Replaces whatever exists for the (student, lesson) pair with a Submitted
/// record. Draft step history is dropped. A graded submission cannot be
/// submitted over.
pub fn submit_lesson(
    ctx: &ClassContext,
    existing: Option<&Submission>,
    input: SubmitInput,
) -> Result<Submission, CoreError> {
    if let Some(prev) = existing {
        if prev.status == SubmissionStatus::Graded {
            return Err(CoreError::InvalidTransition(format!(
                "submission {} is already graded",
                prev.id
            )));
        }
    }
    let ts = now_ms();
    Ok(Submission {
        id: existing.map(|s| s.id.clone()).unwrap_or_else(new_id),
        class_id: ctx.class_id().to_string(),
        student_id: input.student_id,
        lesson_id: input.lesson_id,
        code: input.code,
        text_answer: input.text_answer.filter(|t| !t.trim().is_empty()),
        status: SubmissionStatus::Submitted,
        current_step: FINAL_STEP,
        history: BTreeMap::new(),
        feedback: None,
        submitted_at: Some(ts),
        time_spent: input.time_spent.filter(|t| *t > 0),
        version: existing.map(|s| s.version + 1).unwrap_or(1),
        updated_at: ts,
    })
}

pub fn validate_grade(grade: i64) -> Result<u8, CoreError> {
    if (0..=100).contains(&grade) {
        Ok(grade as u8)
    } else {
        Err(CoreError::BadInput(format!(
            "grade must be in 0..=100, got {}",
            grade
        )))
    }
}

/// Grades a submitted (or re-grades a graded) submission.
pub fn grade_submission(sub: &mut Submission, grade: i64, comment: &str) -> Result<(), CoreError> {
    let grade = validate_grade(grade)?;
    if sub.status == SubmissionStatus::Draft {
        return Err(CoreError::InvalidTransition(format!(
            "submission {} has not been submitted",
            sub.id
        )));
    }
    let ts = now_ms();
    sub.status = SubmissionStatus::Graded;
    sub.feedback = Some(Feedback {
        grade,
        comment: comment.to_string(),
        graded_at: ts,
    });
    sub.version += 1;
    sub.updated_at = ts;
    Ok(())
}

/// Applies one grade and comment to every listed submission. Either every id
/// grades cleanly and all graded copies are returned, or nothing is.
pub fn bulk_grade(
    subs: &[Submission],
    ids: &[String],
    grade: i64,
    comment: &str,
) -> Result<Vec<Submission>, CoreError> {
    validate_grade(grade)?;
    let by_id: HashMap<&str, &Submission> = subs.iter().map(|s| (s.id.as_str(), s)).collect();
    let mut seen = HashSet::new();
    let mut graded = Vec::with_capacity(ids.len());
    for id in ids {
        if !seen.insert(id.as_str()) {
            continue;
        }
        let Some(sub) = by_id.get(id.as_str()) else {
            return Err(CoreError::not_found("submission", id.clone()));
        };
        let mut copy = (*sub).clone();
        grade_submission(&mut copy, grade, comment)?;
        graded.push(copy);
    }
    Ok(graded)
}

#[derive(Debug, Clone, PartialEq)]
pub struct RubricScore {
    pub earned: u32,
    pub possible: u32,
    pub grade: u8,
}

/// Converts per-criterion points (keyed by criterion name, clamped to each
/// criterion's maximum) into a 0-100 grade.
pub fn score_rubric(rubric: &Rubric, points: &HashMap<String, u32>) -> Result<RubricScore, CoreError> {
    let possible = rubric.total_points();
    if possible == 0 {
        return Err(CoreError::BadInput(format!(
            "rubric {} has no points to award",
            rubric.id
        )));
    }
    for name in points.keys() {
        if !rubric.criteria.iter().any(|c| &c.name == name) {
            return Err(CoreError::BadInput(format!("unknown criterion: {}", name)));
        }
    }
    let earned: u32 = rubric
        .criteria
        .iter()
        .map(|c| points.get(&c.name).copied().unwrap_or(0).min(c.max_points))
        .fold(0u32, u32::saturating_add);
    let grade = ((earned as f64 / possible as f64) * 100.0).round() as u8;
    Ok(RubricScore {
        earned,
        possible,
        grade,
    })
}
