//! Portable lesson documents for sharing curriculum between classes.

use crate::curriculum::{promote_to_template, ClassContext};
use crate::error::CoreError;
use crate::model::{new_id, EditorType, LessonPlan, LessonType};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const EXPORT_FORMAT: &str = "classroomd-lessons";
pub const EXPORT_VERSION: u32 = 1;

/// A lesson without identity or class scoping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortableLesson {
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

impl From<&LessonPlan> for PortableLesson {
    fn from(l: &LessonPlan) -> Self {
        Self {
            lesson_type: l.lesson_type,
            title: l.title.clone(),
            description: l.description.clone(),
            level: l.level.clone(),
            steps: l.steps.clone(),
            starter_code: l.starter_code.clone(),
            challenge: l.challenge.clone(),
            rubric_id: l.rubric_id.clone(),
            is_template: l.is_template,
            tags: l.tags.clone(),
            editor_type: l.editor_type,
            created_at: l.created_at,
        }
    }
}

impl PortableLesson {
    /// Templates arrive detached from the importing class.
    fn into_lesson(self, ctx: &ClassContext) -> LessonPlan {
        let mut lesson = LessonPlan {
            id: new_id(),
            class_id: Some(ctx.class_id().to_string()),
            unit_id: None,
            lesson_type: self.lesson_type,
            title: self.title,
            description: self.description,
            level: self.level,
            steps: self.steps,
            starter_code: self.starter_code,
            challenge: self.challenge,
            rubric_id: self.rubric_id,
            is_template: self.is_template,
            tags: self.tags,
            editor_type: self.editor_type,
            created_at: self.created_at,
        };
        if lesson.is_template {
            promote_to_template(&mut lesson);
        }
        lesson
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonDocument {
    pub format: String,
    pub version: u32,
    pub exported_at: i64,
    pub lessons: Vec<PortableLesson>,
}

pub fn export_lessons(lessons: &[LessonPlan], exported_at: i64) -> LessonDocument {
    LessonDocument {
        format: EXPORT_FORMAT.to_string(),
        version: EXPORT_VERSION,
        exported_at,
        lessons: lessons.iter().map(PortableLesson::from).collect(),
    }
}

/// Single-lesson export: the lesson's own fields plus a version tag.
#[derive(Debug, Serialize)]
pub struct BareLesson {
    pub version: u32,
    #[serde(flatten)]
    pub lesson: PortableLesson,
}

pub fn export_lesson(lesson: &LessonPlan) -> BareLesson {
    BareLesson {
        version: EXPORT_VERSION,
        lesson: PortableLesson::from(lesson),
    }
}

fn check_version(obj: &serde_json::Map<String, Value>) -> Result<(), CoreError> {
    match obj.get("version") {
        None | Some(Value::Null) => Ok(()),
        Some(v) => match v.as_u64() {
            Some(n) if n <= EXPORT_VERSION as u64 => Ok(()),
            Some(n) => Err(CoreError::BadImport(format!("unsupported version {}", n))),
            None => Err(CoreError::BadImport("version must be a number".into())),
        },
    }
}

fn parse_portable(value: &Value, idx: usize) -> Result<PortableLesson, CoreError> {
    if !value.is_object() {
        return Err(CoreError::BadImport(format!("lesson {} is not an object", idx)));
    }
    let lesson: PortableLesson = serde_json::from_value(value.clone())
        .map_err(|e| CoreError::BadImport(format!("lesson {}: {}", idx, e)))?;
    if lesson.title.trim().is_empty() {
        return Err(CoreError::BadImport(format!("lesson {} has no title", idx)));
    }
    Ok(lesson)
}

/// Parses an exported document (container or bare lesson) into new lessons
/// bound to `ctx`. Any malformed element rejects the whole payload.
pub fn import_lessons(ctx: &ClassContext, raw: &str) -> Result<Vec<LessonPlan>, CoreError> {
    let value: Value = serde_json::from_str(raw.trim())
        .map_err(|e| CoreError::BadImport(format!("invalid JSON: {}", e)))?;
    let Some(obj) = value.as_object() else {
        return Err(CoreError::BadImport("expected a JSON object".into()));
    };
    check_version(obj)?;

    let portable = match obj.get("lessons") {
        Some(Value::Array(items)) => {
            if items.is_empty() {
                return Err(CoreError::BadImport("document contains no lessons".into()));
            }
            items
                .iter()
                .enumerate()
                .map(|(idx, item)| parse_portable(item, idx))
                .collect::<Result<Vec<_>, _>>()?
        }
        Some(_) => return Err(CoreError::BadImport("lessons must be an array".into())),
        None => vec![parse_portable(&value, 0)?],
    };
    Ok(portable.into_iter().map(|p| p.into_lesson(ctx)).collect())
}
