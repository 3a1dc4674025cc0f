//! Persistence seam. Handlers only see `dyn Gateway`; the SQLite
//! implementation lives in [`sqlite`].

mod sqlite;

pub use sqlite::SqliteGateway;

use crate::model::{
    Announcement, Class, Enrollment, FeedbackTemplate, HelpRequest, LessonPlan, Rubric, Student,
    Submission, Unit,
};
use anyhow::Result;

pub trait Gateway {
    // settings
    fn setting(&self, key: &str) -> Result<Option<serde_json::Value>>;
    fn put_setting(&self, key: &str, value: &serde_json::Value) -> Result<()>;

    // classes
    fn list_classes(&self) -> Result<Vec<Class>>;
    fn get_class(&self, id: &str) -> Result<Option<Class>>;
    fn insert_class(&self, class: &Class) -> Result<()>;
    fn update_class(&self, class: &Class) -> Result<()>;
    /// Removes the class with its units, class-bound lessons, submissions,
    /// enrollments, help requests and announcements in one transaction.
    fn delete_class(&self, id: &str) -> Result<()>;

    // students (class membership is an approved enrollment)
    fn list_class_students(&self, class_id: &str) -> Result<Vec<Student>>;
    fn get_student(&self, id: &str) -> Result<Option<Student>>;
    fn update_student(&self, student: &Student) -> Result<()>;
    /// Inserts students and their enrollments together.
    fn insert_roster(&self, students: &[Student], enrollments: &[Enrollment]) -> Result<()>;

    // enrollments
    fn list_enrollments(&self, class_id: &str) -> Result<Vec<Enrollment>>;
    fn get_enrollment(&self, id: &str) -> Result<Option<Enrollment>>;
    fn insert_enrollment(&self, enrollment: &Enrollment) -> Result<()>;
    /// Writes the enrollment and, when given, the synthesized student.
    fn save_enrollment(&self, enrollment: &Enrollment, new_student: Option<&Student>) -> Result<()>;

    // units
    fn list_units(&self, class_id: &str) -> Result<Vec<Unit>>;
    fn insert_unit(&self, unit: &Unit) -> Result<()>;
    fn update_unit(&self, unit: &Unit) -> Result<()>;
    /// Rewrites every field of each unit (orders included) in one transaction.
    fn save_units(&self, units: &[Unit]) -> Result<()>;
    /// Deletes the unit, unassigns its lessons and stores `remaining` orders.
    fn delete_unit(&self, unit_id: &str, remaining: &[Unit]) -> Result<()>;

    // lessons
    /// Class lessons in their flat sequence order.
    fn list_lessons(&self, class_id: &str) -> Result<Vec<LessonPlan>>;
    fn list_templates(&self) -> Result<Vec<LessonPlan>>;
    fn get_lesson(&self, id: &str) -> Result<Option<LessonPlan>>;
    /// Appends lessons at the end of their class sequence.
    fn insert_lessons(&self, lessons: &[LessonPlan]) -> Result<()>;
    fn update_lesson(&self, lesson: &LessonPlan) -> Result<()>;
    fn delete_lesson(&self, id: &str) -> Result<()>;
    /// Stores `unitId` and sequence position for each lesson in order.
    fn save_lesson_order(&self, lessons: &[LessonPlan]) -> Result<()>;
    fn insert_curriculum(&self, units: &[Unit], lessons: &[LessonPlan]) -> Result<()>;

    // submissions
    fn list_submissions(&self, class_id: &str) -> Result<Vec<Submission>>;
    fn get_submission(&self, id: &str) -> Result<Option<Submission>>;
    fn find_submission(&self, student_id: &str, lesson_id: &str) -> Result<Option<Submission>>;
    fn save_submission(&self, submission: &Submission) -> Result<()>;
    fn save_submissions(&self, submissions: &[Submission]) -> Result<()>;

    // rubrics
    fn list_rubrics(&self) -> Result<Vec<Rubric>>;
    fn get_rubric(&self, id: &str) -> Result<Option<Rubric>>;
    fn save_rubric(&self, rubric: &Rubric) -> Result<()>;
    fn delete_rubric(&self, id: &str) -> Result<bool>;

    // announcements
    fn list_announcements(&self, class_id: &str) -> Result<Vec<Announcement>>;
    fn insert_announcement(&self, announcement: &Announcement) -> Result<()>;
    fn delete_announcement(&self, class_id: &str, id: &str) -> Result<bool>;

    // help queue
    fn list_help_requests(&self, class_id: &str) -> Result<Vec<HelpRequest>>;
    fn get_help_request(&self, id: &str) -> Result<Option<HelpRequest>>;
    fn save_help_request(&self, request: &HelpRequest) -> Result<()>;

    // feedback templates
    fn list_feedback_templates(&self, teacher_id: &str) -> Result<Vec<FeedbackTemplate>>;
    fn insert_feedback_template(&self, template: &FeedbackTemplate) -> Result<()>;
    fn delete_feedback_template(&self, id: &str) -> Result<bool>;
}
