//! Class scoping plus the unit/lesson ordering rules.
//!
//! Units carry a dense `order` (0..N-1) that is rewritten after every change.
//! Lessons have no order field; their position in the class's flat lesson
//! sequence is the order, and `unitId` groups them.

use crate::ai::{GeneratedCurriculum, GeneratedLesson};
use crate::error::CoreError;
use crate::model::{
    new_id, now_ms, Announcement, Class, EditorType, Enrollment, HelpRequest, LessonPlan,
    LessonType, Submission, Unit,
};

/// The class every scoped read and write is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassContext {
    class_id: String,
}

impl ClassContext {
    pub fn for_class(class: &Class) -> Result<Self, CoreError> {
        if class.archived {
            return Err(CoreError::NoActiveClass(class.id.clone()));
        }
        Ok(Self {
            class_id: class.id.clone(),
        })
    }

    pub fn class_id(&self) -> &str {
        &self.class_id
    }

    pub fn owns<T: ClassScoped>(&self, item: &T) -> bool {
        item.scoped_class_id() == Some(self.class_id.as_str())
    }

    /// Keeps only the items bound to this class.
    pub fn scope<T: ClassScoped>(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        items.into_iter().filter(|item| self.owns(item)).collect()
    }
}

pub trait ClassScoped {
    fn scoped_class_id(&self) -> Option<&str>;
}

impl ClassScoped for Unit {
    fn scoped_class_id(&self) -> Option<&str> {
        Some(&self.class_id)
    }
}

impl ClassScoped for LessonPlan {
    fn scoped_class_id(&self) -> Option<&str> {
        self.class_id.as_deref()
    }
}

impl ClassScoped for Submission {
    fn scoped_class_id(&self) -> Option<&str> {
        Some(&self.class_id)
    }
}

impl ClassScoped for Enrollment {
    fn scoped_class_id(&self) -> Option<&str> {
        Some(&self.class_id)
    }
}

impl ClassScoped for HelpRequest {
    fn scoped_class_id(&self) -> Option<&str> {
        Some(&self.class_id)
    }
}

impl ClassScoped for Announcement {
    fn scoped_class_id(&self) -> Option<&str> {
        Some(&self.class_id)
    }
}

fn densify(units: &mut [Unit]) {
    for (idx, unit) in units.iter_mut().enumerate() {
        unit.order = idx as u32;
    }
}

/// Moves `dragged` into the slot `target` occupied before the move, then
/// renumbers every unit. Returns false (and leaves `units` untouched) when
/// either id is missing or they are the same unit.
pub fn reorder_units(units: &mut Vec<Unit>, dragged: &str, target: &str) -> bool {
    if dragged == target {
        return false;
    }
    units.sort_by_key(|u| u.order);
    let Some(from) = units.iter().position(|u| u.id == dragged) else {
        return false;
    };
    let Some(to) = units.iter().position(|u| u.id == target) else {
        return false;
    };
    let unit = units.remove(from);
    let at = to.min(units.len());
    units.insert(at, unit);
    densify(units);
    true
}

/// Appends a new unit at the end of the class's sequence.
pub fn append_unit(ctx: &ClassContext, units: &[Unit], title: &str, description: &str) -> Unit {
    Unit {
        id: new_id(),
        class_id: ctx.class_id().to_string(),
        title: title.trim().to_string(),
        description: description.to_string(),
        order: units.len() as u32,
        is_locked: false,
        is_sequential: false,
        available_at: None,
    }
}

/// Removes a unit, renumbers the rest and unassigns its lessons. Returns the
/// removed unit plus the ids of the lessons that were detached.
pub fn remove_unit(
    units: &mut Vec<Unit>,
    lessons: &mut [LessonPlan],
    unit_id: &str,
) -> Option<(Unit, Vec<String>)> {
    units.sort_by_key(|u| u.order);
    let idx = units.iter().position(|u| u.id == unit_id)?;
    let removed = units.remove(idx);
    densify(units);
    let mut detached = Vec::new();
    for lesson in lessons.iter_mut() {
        if lesson.unit_id.as_deref() == Some(unit_id) {
            lesson.unit_id = None;
            detached.push(lesson.id.clone());
        }
    }
    Some((removed, detached))
}

pub fn toggle_lock(units: &mut [Unit], unit_id: &str) -> Option<bool> {
    let unit = units.iter_mut().find(|u| u.id == unit_id)?;
    unit.is_locked = !unit.is_locked;
    Some(unit.is_locked)
}

pub fn toggle_sequential(units: &mut [Unit], unit_id: &str) -> Option<bool> {
    let unit = units.iter_mut().find(|u| u.id == unit_id)?;
    unit.is_sequential = !unit.is_sequential;
    Some(unit.is_sequential)
}

/// Moves a lesson into `dest_unit`, placing it before `before` when that
/// lesson is present, otherwise at the end of the sequence.
///
/// No-ops (returning false): unknown lesson, `before` naming the lesson
/// itself, or a move into the lesson's current unit without a `before`.
pub fn move_lesson(
    lessons: &mut Vec<LessonPlan>,
    lesson_id: &str,
    dest_unit: &str,
    before: Option<&str>,
) -> bool {
    let Some(from) = lessons.iter().position(|l| l.id == lesson_id) else {
        return false;
    };
    if before == Some(lesson_id) {
        return false;
    }
    if before.is_none() && lessons[from].unit_id.as_deref() == Some(dest_unit) {
        return false;
    }
    let mut lesson = lessons.remove(from);
    lesson.unit_id = Some(dest_unit.to_string());
    match before.and_then(|b| lessons.iter().position(|l| l.id == b)) {
        Some(at) => lessons.insert(at, lesson),
        None => lessons.push(lesson),
    }
    true
}

/// Detaches a lesson from any class so it can be reused as a template.
pub fn promote_to_template(lesson: &mut LessonPlan) {
    lesson.is_template = true;
    lesson.class_id = None;
    lesson.unit_id = None;
}

/// Copies a template into the class as an ordinary lesson.
pub fn instantiate_template(
    ctx: &ClassContext,
    template: &LessonPlan,
    unit_id: Option<&str>,
) -> LessonPlan {
    LessonPlan {
        id: new_id(),
        class_id: Some(ctx.class_id().to_string()),
        unit_id: unit_id.map(str::to_string),
        is_template: false,
        created_at: now_ms(),
        ..template.clone()
    }
}

pub struct LessonDefaults<'a> {
    pub level: &'a str,
    pub editor: EditorType,
    pub lesson_type: LessonType,
}

pub fn lesson_from_generated(
    ctx: &ClassContext,
    unit_id: Option<&str>,
    generated: &GeneratedLesson,
    defaults: &LessonDefaults<'_>,
) -> LessonPlan {
    LessonPlan {
        id: new_id(),
        class_id: Some(ctx.class_id().to_string()),
        unit_id: unit_id.map(str::to_string),
        lesson_type: defaults.lesson_type,
        title: generated.title.trim().to_string(),
        description: generated.objective.clone(),
        level: defaults.level.to_string(),
        steps: generated.steps.clone(),
        starter_code: generated.starter_code.clone(),
        challenge: generated.challenge.clone(),
        rubric_id: None,
        is_template: false,
        tags: generated.concepts.clone(),
        editor_type: defaults.editor,
        created_at: now_ms(),
    }
}

/// Turns a generated curriculum into units appended after `existing_units`
/// and their lessons, in sequence order.
pub fn materialize_curriculum(
    ctx: &ClassContext,
    existing_units: &[Unit],
    curriculum: &GeneratedCurriculum,
    defaults: &LessonDefaults<'_>,
) -> (Vec<Unit>, Vec<LessonPlan>) {
    let mut units = Vec::with_capacity(curriculum.units.len());
    let mut lessons = Vec::new();
    let base = existing_units.len() as u32;
    for (idx, generated) in curriculum.units.iter().enumerate() {
        let unit = Unit {
            id: new_id(),
            class_id: ctx.class_id().to_string(),
            title: generated.title.trim().to_string(),
            description: generated.description.clone(),
            order: base + idx as u32,
            is_locked: idx > 0,
            is_sequential: true,
            available_at: None,
        };
        for lesson in &generated.lessons {
            lessons.push(lesson_from_generated(ctx, Some(&unit.id), lesson, defaults));
        }
        units.push(unit);
    }
    (units, lessons)
}
