pub mod ai;
pub mod analytics;
pub mod announcements;
pub mod classes;
pub mod core;
pub mod enrollments;
pub mod feedback_templates;
pub mod help;
pub mod lessons;
pub mod rubrics;
pub mod setup;
pub mod students;
pub mod submissions;
pub mod units;
