use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Sentinel `currentStep` stored on a submitted lesson.
pub const FINAL_STEP: u32 = u32::MAX;

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub period: String,
    #[serde(default)]
    pub academic_year: String,
    pub teacher_id: String,
    pub enrollment_code: String,
    #[serde(default)]
    pub archived: bool,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    pub id: String,
    pub class_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub order: u32,
    #[serde(default)]
    pub is_locked: bool,
    #[serde(default)]
    pub is_sequential: bool,
    #[serde(default)]
    pub available_at: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LessonType {
    #[default]
    Lesson,
    Assignment,
}

impl LessonType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lesson => "Lesson",
            Self::Assignment => "Assignment",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lesson" => Some(Self::Lesson),
            "assignment" => Some(Self::Assignment),
            _ => None,
        }
    }
}

/// Runtime that interprets a lesson's starter code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorType {
    #[default]
    P5,
    Scratch,
}

impl EditorType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::P5 => "p5",
            Self::Scratch => "scratch",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "p5" | "p5js" | "p5.js" => Some(Self::P5),
            "scratch" => Some(Self::Scratch),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonPlan {
    pub id: String,
    #[serde(default)]
    pub class_id: Option<String>,
    #[serde(default)]
    pub unit_id: Option<String>,
    #[serde(rename = "type", default)]
    pub lesson_type: LessonType,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default)]
    pub starter_code: String,
    #[serde(default)]
    pub challenge: String,
    #[serde(default)]
    pub rubric_id: Option<String>,
    #[serde(default)]
    pub is_template: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub editor_type: EditorType,
    #[serde(default)]
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// `[NEXT]`: read/observe, passes without checking.
    Observe,
    /// `[TEXT]`: free-text reflection.
    Reflect,
    Code,
}

const NEXT_TAG: &str = "[NEXT]";
const TEXT_TAG: &str = "[TEXT]";

/// Splits a step into its kind and the instruction text without the tag.
pub fn classify_step(step: &str) -> (StepKind, &str) {
    let trimmed = step.trim_start();
    if let Some(rest) = trimmed.strip_prefix(NEXT_TAG) {
        (StepKind::Observe, rest.trim())
    } else if let Some(rest) = trimmed.strip_prefix(TEXT_TAG) {
        (StepKind::Reflect, rest.trim())
    } else {
        (StepKind::Code, trimmed.trim_end())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub avatar: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub school_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub is_active: bool,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SubmissionStatus {
    Draft,
    Submitted,
    Graded,
}

impl SubmissionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Submitted => "Submitted",
            Self::Graded => "Graded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Draft" => Some(Self::Draft),
            "Submitted" => Some(Self::Submitted),
            "Graded" => Some(Self::Graded),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub step_index: u32,
    #[serde(default)]
    pub student_input: String,
    #[serde(default)]
    pub feedback: String,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub grade: u8,
    pub comment: String,
    pub graded_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    pub class_id: String,
    pub student_id: String,
    pub lesson_id: String,
    pub code: String,
    #[serde(default)]
    pub text_answer: Option<String>,
    pub status: SubmissionStatus,
    pub current_step: u32,
    /// Latest outcome per step index; re-attempts overwrite.
    #[serde(default)]
    pub history: BTreeMap<u32, HistoryItem>,
    #[serde(default)]
    pub feedback: Option<Feedback>,
    #[serde(default)]
    pub submitted_at: Option<i64>,
    #[serde(default)]
    pub time_spent: Option<i64>,
    pub version: u64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Criterion {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub max_points: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rubric {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub criteria: Vec<Criterion>,
    #[serde(default)]
    pub lesson_id: Option<String>,
    pub created_at: i64,
}

/// Upper bound on a single criterion's `maxPoints`.
pub const MAX_CRITERION_POINTS: u32 = 1000;

impl Rubric {
    pub fn total_points(&self) -> u32 {
        self.criteria
            .iter()
            .fold(0u32, |acc, c| acc.saturating_add(c.max_points))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    Pending,
    Approved,
    Rejected,
}

impl EnrollmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: String,
    pub student_id: String,
    pub class_id: String,
    pub status: EnrollmentStatus,
    pub requested_at: i64,
    #[serde(default)]
    pub enrolled_at: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HelpStatus {
    Pending,
    InProgress,
    Resolved,
}

impl HelpStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Resolved => "resolved",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in-progress" => Some(Self::InProgress),
            "resolved" => Some(Self::Resolved),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelpRequest {
    pub id: String,
    pub student_id: String,
    pub class_id: String,
    pub lesson_id: String,
    #[serde(default)]
    pub message: Option<String>,
    pub status: HelpStatus,
    pub created_at: i64,
    #[serde(default)]
    pub resolved_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub id: String,
    pub class_id: String,
    pub title: String,
    pub body: String,
    pub created_at: i64,
    #[serde(default)]
    pub scheduled_at: Option<i64>,
    /// Empty means the whole class.
    #[serde(default)]
    pub target_student_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackTemplate {
    pub id: String,
    pub teacher_id: String,
    pub title: String,
    pub text: String,
    #[serde(default)]
    pub category: Option<String>,
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_tags_are_recognized() {
        assert_eq!(
            classify_step("[NEXT] Watch the circle move"),
            (StepKind::Observe, "Watch the circle move")
        );
        assert_eq!(
            classify_step("[TEXT] What did you notice?"),
            (StepKind::Reflect, "What did you notice?")
        );
        assert_eq!(
            classify_step("Change the fill colour to red"),
            (StepKind::Code, "Change the fill colour to red")
        );
    }

    #[test]
    fn submission_history_keys_survive_json() {
        let mut history = BTreeMap::new();
        history.insert(
            2,
            HistoryItem {
                step_index: 2,
                student_input: "x".into(),
                feedback: "ok".into(),
                passed: true,
            },
        );
        let raw = serde_json::to_string(&history).expect("serialize");
        let back: BTreeMap<u32, HistoryItem> = serde_json::from_str(&raw).expect("parse");
        assert_eq!(back, history);
    }

    #[test]
    fn rubric_total_sums_criteria() {
        let rubric = Rubric {
            id: "r".into(),
            name: "Sketch".into(),
            description: None,
            criteria: vec![
                Criterion { name: "Shapes".into(), description: String::new(), max_points: 10 },
                Criterion { name: "Colour".into(), description: String::new(), max_points: 5 },
            ],
            lesson_id: None,
            created_at: 0,
        };
        assert_eq!(rubric.total_points(), 15);
    }

    #[test]
    fn rubric_total_saturates_instead_of_wrapping() {
        let big = |name: &str| Criterion {
            name: name.into(),
            description: String::new(),
            max_points: u32::MAX,
        };
        let rubric = Rubric {
            id: "r".into(),
            name: "Stored before limits".into(),
            description: None,
            criteria: vec![big("a"), big("b")],
            lesson_id: None,
            created_at: 0,
        };
        assert_eq!(rubric.total_points(), u32::MAX);
    }
}
