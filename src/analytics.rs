//! Class dashboard numbers. Archived students are excluded from every
//! numerator and denominator.

use crate::model::{LessonPlan, Student, Submission, SubmissionStatus};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LessonStats {
    pub lesson_id: String,
    pub title: String,
    pub completed: usize,
    pub in_progress: usize,
    pub completion_rate: f64,
    pub average_grade: Option<f64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConceptMastery {
    pub tag: String,
    pub average_grade: f64,
    pub graded_count: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StrugglingStudent {
    pub student_id: String,
    pub name: String,
    pub average_grade: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClassAnalytics {
    pub active_students: usize,
    pub archived_students: usize,
    pub average_grade: Option<f64>,
    pub average_time_spent_ms: Option<f64>,
    pub lessons: Vec<LessonStats>,
    pub concept_mastery: Vec<ConceptMastery>,
    pub struggling: Vec<StrugglingStudent>,
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn grade_of(sub: &Submission) -> Option<f64> {
    match (sub.status, sub.feedback.as_ref()) {
        (SubmissionStatus::Graded, Some(fb)) => Some(fb.grade as f64),
        _ => None,
    }
}

pub fn class_analytics(
    roster: &[Student],
    lessons: &[LessonPlan],
    submissions: &[Submission],
    struggling_below: f64,
) -> ClassAnalytics {
    let active: HashSet<&str> = roster
        .iter()
        .filter(|s| s.is_active)
        .map(|s| s.id.as_str())
        .collect();
    let counted: Vec<&Submission> = submissions
        .iter()
        .filter(|s| active.contains(s.student_id.as_str()))
        .collect();

    let mut by_lesson: HashMap<&str, Vec<&Submission>> = HashMap::new();
    for sub in &counted {
        by_lesson.entry(sub.lesson_id.as_str()).or_default().push(sub);
    }

    let denom = active.len();
    let lesson_stats = lessons
        .iter()
        .map(|lesson| {
            let subs = by_lesson.get(lesson.id.as_str()).map(Vec::as_slice).unwrap_or(&[]);
            let completed = subs
                .iter()
                .filter(|s| s.status != SubmissionStatus::Draft)
                .count();
            let grades: Vec<f64> = subs.iter().filter_map(|s| grade_of(s)).collect();
            LessonStats {
                lesson_id: lesson.id.clone(),
                title: lesson.title.clone(),
                completed,
                in_progress: subs.len() - completed,
                completion_rate: if denom == 0 {
                    0.0
                } else {
                    completed as f64 / denom as f64
                },
                average_grade: mean(&grades),
            }
        })
        .collect();

    let all_grades: Vec<f64> = counted.iter().filter_map(|s| grade_of(s)).collect();
    let times: Vec<f64> = counted
        .iter()
        .filter_map(|s| s.time_spent)
        .map(|t| t as f64)
        .collect();

    let tags_by_lesson: HashMap<&str, &[String]> = lessons
        .iter()
        .map(|l| (l.id.as_str(), l.tags.as_slice()))
        .collect();
    let mut per_tag: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for sub in &counted {
        let Some(grade) = grade_of(sub) else { continue };
        for tag in tags_by_lesson.get(sub.lesson_id.as_str()).copied().unwrap_or(&[]) {
            let key = tag.trim().to_ascii_lowercase();
            if !key.is_empty() {
                per_tag.entry(key).or_default().push(grade);
            }
        }
    }
    let concept_mastery = per_tag
        .into_iter()
        .filter_map(|(tag, grades)| {
            mean(&grades).map(|avg| ConceptMastery {
                tag,
                average_grade: avg,
                graded_count: grades.len(),
            })
        })
        .collect();

    let mut struggling: Vec<StrugglingStudent> = roster
        .iter()
        .filter(|s| s.is_active)
        .filter_map(|student| {
            let grades: Vec<f64> = counted
                .iter()
                .filter(|s| s.student_id == student.id)
                .filter_map(|s| grade_of(s))
                .collect();
            let avg = mean(&grades)?;
            (avg < struggling_below).then(|| StrugglingStudent {
                student_id: student.id.clone(),
                name: student.name.clone(),
                average_grade: avg,
            })
        })
        .collect();
    struggling.sort_by(|a, b| a.average_grade.total_cmp(&b.average_grade));

    ClassAnalytics {
        active_students: denom,
        archived_students: roster.len() - denom,
        average_grade: mean(&all_grades),
        average_time_spent_ms: mean(&times),
        lessons: lesson_stats,
        concept_mastery,
        struggling,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EditorType, Feedback, LessonType};
    use crate::roster::new_student;

    fn lesson(id: &str, tags: &[&str]) -> LessonPlan {
        LessonPlan {
            id: id.into(),
            class_id: Some("c".into()),
            unit_id: None,
            lesson_type: LessonType::Lesson,
            title: id.into(),
            description: String::new(),
            level: String::new(),
            steps: vec![],
            starter_code: String::new(),
            challenge: String::new(),
            rubric_id: None,
            is_template: false,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            editor_type: EditorType::P5,
            created_at: 0,
        }
    }

    fn sub(student: &str, lesson: &str, grade: Option<u8>) -> Submission {
        Submission {
            id: format!("{}-{}", student, lesson),
            class_id: "c".into(),
            student_id: student.into(),
            lesson_id: lesson.into(),
            code: String::new(),
            text_answer: None,
            status: if grade.is_some() {
                SubmissionStatus::Graded
            } else {
                SubmissionStatus::Submitted
            },
            current_step: 0,
            history: Default::default(),
            feedback: grade.map(|g| Feedback {
                grade: g,
                comment: String::new(),
                graded_at: 0,
            }),
            submitted_at: Some(0),
            time_spent: Some(60_000),
            version: 1,
            updated_at: 0,
        }
    }

    #[test]
    fn archived_students_are_left_out_of_denominators() {
        let mut ada = new_student("Ada", None, None);
        let mut alan = new_student("Alan", None, None);
        ada.id = "ada".into();
        alan.id = "alan".into();
        alan.is_active = false;
        let roster = vec![ada, alan.clone()];
        let lessons = vec![lesson("l1", &["Loops"])];
        let subs = vec![sub("ada", "l1", Some(90)), sub("alan", "l1", Some(10))];

        let report = class_analytics(&roster, &lessons, &subs, 60.0);
        assert_eq!(report.active_students, 1);
        assert_eq!(report.archived_students, 1);
        assert_eq!(report.lessons[0].completed, 1);
        assert_eq!(report.lessons[0].completion_rate, 1.0);
        assert_eq!(report.average_grade, Some(90.0));
        assert!(report.struggling.is_empty());

        let mut restored = roster.clone();
        restored[1].is_active = true;
        let report = class_analytics(&restored, &lessons, &subs, 60.0);
        assert_eq!(report.active_students, 2);
        assert_eq!(report.average_grade, Some(50.0));
        assert_eq!(report.struggling.len(), 1);
        assert_eq!(report.struggling[0].student_id, "alan");
    }

    #[test]
    fn concept_mastery_groups_by_tag() {
        let mut ada = new_student("Ada", None, None);
        ada.id = "ada".into();
        let lessons = vec![lesson("l1", &["loops", "color"]), lesson("l2", &["Loops"])];
        let subs = vec![sub("ada", "l1", Some(80)), sub("ada", "l2", Some(60))];
        let report = class_analytics(&[ada], &lessons, &subs, 50.0);
        let loops = report
            .concept_mastery
            .iter()
            .find(|c| c.tag == "loops")
            .expect("loops");
        assert_eq!(loops.graded_count, 2);
        assert_eq!(loops.average_grade, 70.0);
        assert_eq!(report.concept_mastery.len(), 2);
    }
}
