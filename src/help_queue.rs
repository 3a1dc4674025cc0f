use crate::curriculum::ClassContext;
use crate::error::CoreError;
use crate::model::{new_id, now_ms, HelpRequest, HelpStatus};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Fresh,
    Waiting,
    Urgent,
}

#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    pub waiting_after_ms: i64,
    pub urgent_after_ms: i64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self::from_minutes(5, 15)
    }
}

impl Thresholds {
    pub fn from_minutes(waiting: i64, urgent: i64) -> Self {
        Self {
            waiting_after_ms: waiting * 60_000,
            urgent_after_ms: urgent * 60_000,
        }
    }
}

/// Bucket for how long a request has waited as of `now`. Never stored.
pub fn priority(req: &HelpRequest, now: i64, t: Thresholds) -> Priority {
    let waited = (now - req.created_at).max(0);
    if waited > t.urgent_after_ms {
        Priority::Urgent
    } else if waited >= t.waiting_after_ms {
        Priority::Waiting
    } else {
        Priority::Fresh
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    #[serde(flatten)]
    pub request: HelpRequest,
    pub priority: Priority,
    pub waited_ms: i64,
}

/// Open requests, oldest first.
pub fn open_queue(requests: &[HelpRequest], now: i64, t: Thresholds) -> Vec<QueueEntry> {
    let mut open: Vec<&HelpRequest> = requests
        .iter()
        .filter(|r| r.status != HelpStatus::Resolved)
        .collect();
    open.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    open.into_iter()
        .map(|r| QueueEntry {
            request: r.clone(),
            priority: priority(r, now, t),
            waited_ms: (now - r.created_at).max(0),
        })
        .collect()
}

pub fn new_request(
    ctx: &ClassContext,
    student_id: &str,
    lesson_id: &str,
    message: Option<String>,
) -> HelpRequest {
    HelpRequest {
        id: new_id(),
        student_id: student_id.to_string(),
        class_id: ctx.class_id().to_string(),
        lesson_id: lesson_id.to_string(),
        message: message.filter(|m| !m.trim().is_empty()),
        status: HelpStatus::Pending,
        created_at: now_ms(),
        resolved_at: None,
    }
}

/// Moves a request strictly forward (pending -> in-progress -> resolved).
pub fn transition(req: &mut HelpRequest, to: HelpStatus) -> Result<(), CoreError> {
    if to <= req.status {
        return Err(CoreError::InvalidTransition(format!(
            "help request {} cannot go from {} to {}",
            req.id,
            req.status.as_str(),
            to.as_str()
        )));
    }
    req.status = to;
    if to == HelpStatus::Resolved {
        req.resolved_at = Some(now_ms());
    }
    Ok(())
}
