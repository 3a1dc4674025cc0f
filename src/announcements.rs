use crate::curriculum::ClassContext;
use crate::error::CoreError;
use crate::model::{new_id, now_ms, Announcement};

pub fn new_announcement(
    ctx: &ClassContext,
    title: &str,
    body: &str,
    scheduled_at: Option<i64>,
    targets: Vec<String>,
) -> Result<Announcement, CoreError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(CoreError::BadInput("announcement title must not be empty".into()));
    }
    let mut target_student_ids: Vec<String> = targets
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    target_student_ids.sort();
    target_student_ids.dedup();
    Ok(Announcement {
        id: new_id(),
        class_id: ctx.class_id().to_string(),
        title: title.to_string(),
        body: body.to_string(),
        created_at: now_ms(),
        scheduled_at,
        target_student_ids,
    })
}

/// Published by `now` and addressed to everyone or to this student.
pub fn visible_to(a: &Announcement, student_id: &str, now: i64) -> bool {
    let published = a.scheduled_at.map_or(true, |at| at <= now);
    let addressed = a.target_student_ids.is_empty() || a.target_student_ids.iter().any(|t| t == student_id);
    published && addressed
}

/// Newest first.
pub fn for_student<'a>(all: &'a [Announcement], student_id: &str, now: i64) -> Vec<&'a Announcement> {
    let mut out: Vec<&Announcement> = all.iter().filter(|a| visible_to(a, student_id, now)).collect();
    out.sort_by(|a, b| {
        let at = |x: &Announcement| x.scheduled_at.unwrap_or(x.created_at);
        at(b).cmp(&at(a)).then_with(|| a.id.cmp(&b.id))
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(id: &str, created_at: i64, scheduled_at: Option<i64>, targets: &[&str]) -> Announcement {
        Announcement {
            id: id.into(),
            class_id: "c".into(),
            title: id.into(),
            body: String::new(),
            created_at,
            scheduled_at,
            target_student_ids: targets.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn scheduled_and_targeted_notes_are_filtered() {
        let all = vec![
            note("everyone", 10, None, &[]),
            note("later", 10, Some(500), &[]),
            note("just-ada", 20, None, &["ada"]),
            note("just-bob", 30, None, &["bob"]),
        ];
        let ids: Vec<&str> = for_student(&all, "ada", 100).iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["just-ada", "everyone"]);

        let ids: Vec<&str> = for_student(&all, "ada", 600).iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["later", "just-ada", "everyone"]);
    }
}
