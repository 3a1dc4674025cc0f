use super::Gateway;
use crate::db;
use crate::model::{
    Announcement, Class, EditorType, Enrollment, EnrollmentStatus, FeedbackTemplate, HelpRequest,
    HelpStatus, LessonPlan, LessonType, Rubric, Student, Submission, SubmissionStatus, Unit,
};
use anyhow::{Context, Result};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use std::path::Path;

pub struct SqliteGateway {
    conn: Connection,
}

impl SqliteGateway {
    pub fn open(workspace: &Path) -> Result<Self> {
        Ok(Self {
            conn: db::open_db(workspace)?,
        })
    }
}

fn conversion_err(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn json_col<T: DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_err(idx, e.to_string()))
}

fn opt_json_col<T: DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| serde_json::from_str(&s).map_err(|e| conversion_err(idx, e.to_string())))
        .transpose()
}

fn enum_col<T>(row: &Row, idx: usize, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(&raw).ok_or_else(|| conversion_err(idx, format!("unknown value {}", raw)))
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).context("serialize column")
}

const CLASS_COLS: &str =
    "id, name, period, academic_year, teacher_id, enrollment_code, archived, created_at";

fn class_row(r: &Row) -> rusqlite::Result<Class> {
    Ok(Class {
        id: r.get(0)?,
        name: r.get(1)?,
        period: r.get(2)?,
        academic_year: r.get(3)?,
        teacher_id: r.get(4)?,
        enrollment_code: r.get(5)?,
        archived: r.get::<_, i64>(6)? != 0,
        created_at: r.get(7)?,
    })
}

const STUDENT_COLS: &str = "s.id, s.name, s.avatar, s.email, s.school_id, s.notes, s.is_active, s.created_at";

fn student_row(r: &Row) -> rusqlite::Result<Student> {
    Ok(Student {
        id: r.get(0)?,
        name: r.get(1)?,
        avatar: r.get(2)?,
        email: r.get(3)?,
        school_id: r.get(4)?,
        notes: r.get(5)?,
        is_active: r.get::<_, i64>(6)? != 0,
        created_at: r.get(7)?,
    })
}

const ENROLLMENT_COLS: &str = "id, student_id, class_id, status, requested_at, enrolled_at";

fn enrollment_row(r: &Row) -> rusqlite::Result<Enrollment> {
    Ok(Enrollment {
        id: r.get(0)?,
        student_id: r.get(1)?,
        class_id: r.get(2)?,
        status: enum_col(r, 3, EnrollmentStatus::parse)?,
        requested_at: r.get(4)?,
        enrolled_at: r.get(5)?,
    })
}

const UNIT_COLS: &str =
    "id, class_id, title, description, sort_order, is_locked, is_sequential, available_at";

fn unit_row(r: &Row) -> rusqlite::Result<Unit> {
    Ok(Unit {
        id: r.get(0)?,
        class_id: r.get(1)?,
        title: r.get(2)?,
        description: r.get(3)?,
        order: r.get(4)?,
        is_locked: r.get::<_, i64>(5)? != 0,
        is_sequential: r.get::<_, i64>(6)? != 0,
        available_at: r.get(7)?,
    })
}

const LESSON_COLS: &str = "id, class_id, unit_id, lesson_type, title, description, level, \
     steps_json, starter_code, challenge, rubric_id, is_template, tags_json, editor_type, created_at";

fn lesson_row(r: &Row) -> rusqlite::Result<LessonPlan> {
    Ok(LessonPlan {
        id: r.get(0)?,
        class_id: r.get(1)?,
        unit_id: r.get(2)?,
        lesson_type: enum_col(r, 3, LessonType::parse)?,
        title: r.get(4)?,
        description: r.get(5)?,
        level: r.get(6)?,
        steps: json_col(r, 7)?,
        starter_code: r.get(8)?,
        challenge: r.get(9)?,
        rubric_id: r.get(10)?,
        is_template: r.get::<_, i64>(11)? != 0,
        tags: json_col(r, 12)?,
        editor_type: enum_col(r, 13, EditorType::parse)?,
        created_at: r.get(14)?,
    })
}

const SUBMISSION_COLS: &str = "id, class_id, student_id, lesson_id, code, text_answer, status, \
     current_step, history_json, feedback_json, submitted_at, time_spent, version, updated_at";

fn submission_row(r: &Row) -> rusqlite::Result<Submission> {
    Ok(Submission {
        id: r.get(0)?,
        class_id: r.get(1)?,
        student_id: r.get(2)?,
        lesson_id: r.get(3)?,
        code: r.get(4)?,
        text_answer: r.get(5)?,
        status: enum_col(r, 6, SubmissionStatus::parse)?,
        current_step: r.get(7)?,
        history: json_col(r, 8)?,
        feedback: opt_json_col(r, 9)?,
        submitted_at: r.get(10)?,
        time_spent: r.get(11)?,
        version: r.get::<_, i64>(12)?.max(0) as u64,
        updated_at: r.get(13)?,
    })
}

const RUBRIC_COLS: &str = "id, name, description, criteria_json, lesson_id, created_at";

fn rubric_row(r: &Row) -> rusqlite::Result<Rubric> {
    Ok(Rubric {
        id: r.get(0)?,
        name: r.get(1)?,
        description: r.get(2)?,
        criteria: json_col(r, 3)?,
        lesson_id: r.get(4)?,
        created_at: r.get(5)?,
    })
}

const HELP_COLS: &str =
    "id, student_id, class_id, lesson_id, message, status, created_at, resolved_at";

fn help_row(r: &Row) -> rusqlite::Result<HelpRequest> {
    Ok(HelpRequest {
        id: r.get(0)?,
        student_id: r.get(1)?,
        class_id: r.get(2)?,
        lesson_id: r.get(3)?,
        message: r.get(4)?,
        status: enum_col(r, 5, HelpStatus::parse)?,
        created_at: r.get(6)?,
        resolved_at: r.get(7)?,
    })
}

fn insert_student_row(conn: &Connection, s: &Student) -> Result<()> {
    conn.execute(
        "INSERT INTO students(id, name, avatar, email, school_id, notes, is_active, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &s.id,
            &s.name,
            &s.avatar,
            &s.email,
            &s.school_id,
            &s.notes,
            s.is_active as i64,
            s.created_at,
        ),
    )
    .context("insert student")?;
    Ok(())
}

fn insert_enrollment_row(conn: &Connection, e: &Enrollment) -> Result<()> {
    conn.execute(
        "INSERT INTO enrollments(id, student_id, class_id, status, requested_at, enrolled_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &e.id,
            &e.student_id,
            &e.class_id,
            e.status.as_str(),
            e.requested_at,
            e.enrolled_at,
        ),
    )
    .context("insert enrollment")?;
    Ok(())
}

fn write_unit_row(conn: &Connection, u: &Unit) -> Result<()> {
    conn.execute(
        "INSERT INTO units(id, class_id, title, description, sort_order, is_locked, is_sequential, available_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           title = excluded.title,
           description = excluded.description,
           sort_order = excluded.sort_order,
           is_locked = excluded.is_locked,
           is_sequential = excluded.is_sequential,
           available_at = excluded.available_at",
        (
            &u.id,
            &u.class_id,
            &u.title,
            &u.description,
            u.order,
            u.is_locked as i64,
            u.is_sequential as i64,
            u.available_at,
        ),
    )
    .context("write unit")?;
    Ok(())
}

fn append_lesson_row(conn: &Connection, l: &LessonPlan) -> Result<()> {
    conn.execute(
        "INSERT INTO lessons(id, class_id, unit_id, lesson_type, title, description, level,
           steps_json, starter_code, challenge, rubric_id, is_template, tags_json, editor_type,
           position, created_at)
         VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
           (SELECT COALESCE(MAX(position), -1) + 1 FROM lessons WHERE class_id IS ?2),
           ?15)",
        rusqlite::params![
            &l.id,
            &l.class_id,
            &l.unit_id,
            l.lesson_type.as_str(),
            &l.title,
            &l.description,
            &l.level,
            to_json(&l.steps)?,
            &l.starter_code,
            &l.challenge,
            &l.rubric_id,
            l.is_template as i64,
            to_json(&l.tags)?,
            l.editor_type.as_str(),
            l.created_at,
        ],
    )
    .context("insert lesson")?;
    Ok(())
}

fn write_submission_row(conn: &Connection, s: &Submission) -> Result<()> {
    let feedback = s.feedback.as_ref().map(to_json).transpose()?;
    conn.execute(
        "INSERT INTO submissions(id, class_id, student_id, lesson_id, code, text_answer, status,
           current_step, history_json, feedback_json, submitted_at, time_spent, version, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           code = excluded.code,
           text_answer = excluded.text_answer,
           status = excluded.status,
           current_step = excluded.current_step,
           history_json = excluded.history_json,
           feedback_json = excluded.feedback_json,
           submitted_at = excluded.submitted_at,
           time_spent = excluded.time_spent,
           version = excluded.version,
           updated_at = excluded.updated_at",
        rusqlite::params![
            &s.id,
            &s.class_id,
            &s.student_id,
            &s.lesson_id,
            &s.code,
            &s.text_answer,
            s.status.as_str(),
            s.current_step,
            to_json(&s.history)?,
            feedback,
            s.submitted_at,
            s.time_spent,
            s.version as i64,
            s.updated_at,
        ],
    )
    .context("write submission")?;
    Ok(())
}

impl SqliteGateway {
    fn query_all<T>(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
        map: fn(&Row) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, map)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn query_one<T>(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
        map: fn(&Row) -> rusqlite::Result<T>,
    ) -> Result<Option<T>> {
        Ok(self.conn.query_row(sql, params, map).optional()?)
    }
}

impl Gateway for SqliteGateway {
    fn setting(&self, key: &str) -> Result<Option<serde_json::Value>> {
        db::settings_get_json(&self.conn, key)
    }

    fn put_setting(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        db::settings_set_json(&self.conn, key, value)
    }

    fn list_classes(&self) -> Result<Vec<Class>> {
        self.query_all(
            &format!("SELECT {} FROM classes ORDER BY created_at, name", CLASS_COLS),
            [],
            class_row,
        )
    }

    fn get_class(&self, id: &str) -> Result<Option<Class>> {
        self.query_one(
            &format!("SELECT {} FROM classes WHERE id = ?", CLASS_COLS),
            [id],
            class_row,
        )
    }

    fn insert_class(&self, c: &Class) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO classes(id, name, period, academic_year, teacher_id, enrollment_code, archived, created_at)
                 VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
                (
                    &c.id,
                    &c.name,
                    &c.period,
                    &c.academic_year,
                    &c.teacher_id,
                    &c.enrollment_code,
                    c.archived as i64,
                    c.created_at,
                ),
            )
            .context("insert class")?;
        Ok(())
    }

    fn update_class(&self, c: &Class) -> Result<()> {
        self.conn
            .execute(
                "UPDATE classes
                 SET name = ?, period = ?, academic_year = ?, enrollment_code = ?, archived = ?
                 WHERE id = ?",
                (
                    &c.name,
                    &c.period,
                    &c.academic_year,
                    &c.enrollment_code,
                    c.archived as i64,
                    &c.id,
                ),
            )
            .context("update class")?;
        Ok(())
    }

    fn delete_class(&self, id: &str) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        // Dependency order; no ON DELETE CASCADE in the schema.
        for (table, sql) in [
            ("submissions", "DELETE FROM submissions WHERE class_id = ?"),
            ("help_requests", "DELETE FROM help_requests WHERE class_id = ?"),
            ("announcements", "DELETE FROM announcements WHERE class_id = ?"),
            ("enrollments", "DELETE FROM enrollments WHERE class_id = ?"),
            ("lessons", "DELETE FROM lessons WHERE class_id = ? AND is_template = 0"),
            ("units", "DELETE FROM units WHERE class_id = ?"),
            ("classes", "DELETE FROM classes WHERE id = ?"),
        ] {
            tx.execute(sql, [id])
                .with_context(|| format!("delete from {}", table))?;
        }
        tx.commit()?;
        Ok(())
    }

    fn list_class_students(&self, class_id: &str) -> Result<Vec<Student>> {
        self.query_all(
            &format!(
                "SELECT DISTINCT {}
                 FROM students s
                 JOIN enrollments e ON e.student_id = s.id
                 WHERE e.class_id = ? AND e.status = 'approved'
                 ORDER BY s.name COLLATE NOCASE, s.id",
                STUDENT_COLS
            ),
            [class_id],
            student_row,
        )
    }

    fn get_student(&self, id: &str) -> Result<Option<Student>> {
        self.query_one(
            &format!("SELECT {} FROM students s WHERE s.id = ?", STUDENT_COLS),
            [id],
            student_row,
        )
    }

    fn update_student(&self, s: &Student) -> Result<()> {
        self.conn
            .execute(
                "UPDATE students
                 SET name = ?, avatar = ?, email = ?, school_id = ?, notes = ?, is_active = ?
                 WHERE id = ?",
                (
                    &s.name,
                    &s.avatar,
                    &s.email,
                    &s.school_id,
                    &s.notes,
                    s.is_active as i64,
                    &s.id,
                ),
            )
            .context("update student")?;
        Ok(())
    }

    fn insert_roster(&self, students: &[Student], enrollments: &[Enrollment]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for s in students {
            insert_student_row(&tx, s)?;
        }
        for e in enrollments {
            insert_enrollment_row(&tx, e)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn list_enrollments(&self, class_id: &str) -> Result<Vec<Enrollment>> {
        self.query_all(
            &format!(
                "SELECT {} FROM enrollments WHERE class_id = ? ORDER BY requested_at, id",
                ENROLLMENT_COLS
            ),
            [class_id],
            enrollment_row,
        )
    }

    fn get_enrollment(&self, id: &str) -> Result<Option<Enrollment>> {
        self.query_one(
            &format!("SELECT {} FROM enrollments WHERE id = ?", ENROLLMENT_COLS),
            [id],
            enrollment_row,
        )
    }

    fn insert_enrollment(&self, enrollment: &Enrollment) -> Result<()> {
        insert_enrollment_row(&self.conn, enrollment)
    }

    fn save_enrollment(&self, e: &Enrollment, new_student: Option<&Student>) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        if let Some(s) = new_student {
            insert_student_row(&tx, s)?;
        }
        tx.execute(
            "UPDATE enrollments SET status = ?, enrolled_at = ? WHERE id = ?",
            (e.status.as_str(), e.enrolled_at, &e.id),
        )
        .context("update enrollment")?;
        tx.commit()?;
        Ok(())
    }

    fn list_units(&self, class_id: &str) -> Result<Vec<Unit>> {
        self.query_all(
            &format!(
                "SELECT {} FROM units WHERE class_id = ? ORDER BY sort_order, id",
                UNIT_COLS
            ),
            [class_id],
            unit_row,
        )
    }

    fn insert_unit(&self, unit: &Unit) -> Result<()> {
        write_unit_row(&self.conn, unit)
    }

    fn update_unit(&self, unit: &Unit) -> Result<()> {
        write_unit_row(&self.conn, unit)
    }

    fn save_units(&self, units: &[Unit]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for u in units {
            write_unit_row(&tx, u)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn delete_unit(&self, unit_id: &str, remaining: &[Unit]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("UPDATE lessons SET unit_id = NULL WHERE unit_id = ?", [unit_id])
            .context("detach lessons")?;
        tx.execute("DELETE FROM units WHERE id = ?", [unit_id])
            .context("delete unit")?;
        for u in remaining {
            tx.execute(
                "UPDATE units SET sort_order = ? WHERE id = ?",
                (u.order, &u.id),
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn list_lessons(&self, class_id: &str) -> Result<Vec<LessonPlan>> {
        self.query_all(
            &format!(
                "SELECT {} FROM lessons WHERE class_id = ? ORDER BY position, created_at, id",
                LESSON_COLS
            ),
            [class_id],
            lesson_row,
        )
    }

    fn list_templates(&self) -> Result<Vec<LessonPlan>> {
        self.query_all(
            &format!(
                "SELECT {} FROM lessons WHERE is_template = 1 ORDER BY title COLLATE NOCASE, id",
                LESSON_COLS
            ),
            [],
            lesson_row,
        )
    }

    fn get_lesson(&self, id: &str) -> Result<Option<LessonPlan>> {
        self.query_one(
            &format!("SELECT {} FROM lessons WHERE id = ?", LESSON_COLS),
            [id],
            lesson_row,
        )
    }

    fn insert_lessons(&self, lessons: &[LessonPlan]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for l in lessons {
            append_lesson_row(&tx, l)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn update_lesson(&self, l: &LessonPlan) -> Result<()> {
        self.conn
            .execute(
                "UPDATE lessons
                 SET class_id = ?, unit_id = ?, lesson_type = ?, title = ?, description = ?,
                     level = ?, steps_json = ?, starter_code = ?, challenge = ?, rubric_id = ?,
                     is_template = ?, tags_json = ?, editor_type = ?
                 WHERE id = ?",
                rusqlite::params![
                    &l.class_id,
                    &l.unit_id,
                    l.lesson_type.as_str(),
                    &l.title,
                    &l.description,
                    &l.level,
                    to_json(&l.steps)?,
                    &l.starter_code,
                    &l.challenge,
                    &l.rubric_id,
                    l.is_template as i64,
                    to_json(&l.tags)?,
                    l.editor_type.as_str(),
                    &l.id,
                ],
            )
            .context("update lesson")?;
        Ok(())
    }

    fn delete_lesson(&self, id: &str) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM submissions WHERE lesson_id = ?", [id])
            .context("delete lesson submissions")?;
        tx.execute("DELETE FROM lessons WHERE id = ?", [id])
            .context("delete lesson")?;
        tx.commit()?;
        Ok(())
    }

    fn save_lesson_order(&self, lessons: &[LessonPlan]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for (position, l) in lessons.iter().enumerate() {
            tx.execute(
                "UPDATE lessons SET unit_id = ?, position = ? WHERE id = ?",
                (&l.unit_id, position as i64, &l.id),
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn insert_curriculum(&self, units: &[Unit], lessons: &[LessonPlan]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for u in units {
            write_unit_row(&tx, u)?;
        }
        for l in lessons {
            append_lesson_row(&tx, l)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn list_submissions(&self, class_id: &str) -> Result<Vec<Submission>> {
        self.query_all(
            &format!(
                "SELECT {} FROM submissions WHERE class_id = ? ORDER BY updated_at, id",
                SUBMISSION_COLS
            ),
            [class_id],
            submission_row,
        )
    }

    fn get_submission(&self, id: &str) -> Result<Option<Submission>> {
        self.query_one(
            &format!("SELECT {} FROM submissions WHERE id = ?", SUBMISSION_COLS),
            [id],
            submission_row,
        )
    }

    fn find_submission(&self, student_id: &str, lesson_id: &str) -> Result<Option<Submission>> {
        self.query_one(
            &format!(
                "SELECT {} FROM submissions WHERE student_id = ? AND lesson_id = ?",
                SUBMISSION_COLS
            ),
            [student_id, lesson_id],
            submission_row,
        )
    }

    fn save_submission(&self, submission: &Submission) -> Result<()> {
        write_submission_row(&self.conn, submission)
    }

    fn save_submissions(&self, submissions: &[Submission]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for s in submissions {
            write_submission_row(&tx, s)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn list_rubrics(&self) -> Result<Vec<Rubric>> {
        self.query_all(
            &format!("SELECT {} FROM rubrics ORDER BY name COLLATE NOCASE, id", RUBRIC_COLS),
            [],
            rubric_row,
        )
    }

    fn get_rubric(&self, id: &str) -> Result<Option<Rubric>> {
        self.query_one(
            &format!("SELECT {} FROM rubrics WHERE id = ?", RUBRIC_COLS),
            [id],
            rubric_row,
        )
    }

    fn save_rubric(&self, r: &Rubric) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO rubrics(id, name, description, criteria_json, lesson_id, created_at)
                 VALUES(?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                   name = excluded.name,
                   description = excluded.description,
                   criteria_json = excluded.criteria_json,
                   lesson_id = excluded.lesson_id",
                (
                    &r.id,
                    &r.name,
                    &r.description,
                    to_json(&r.criteria)?,
                    &r.lesson_id,
                    r.created_at,
                ),
            )
            .context("write rubric")?;
        Ok(())
    }

    fn delete_rubric(&self, id: &str) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("UPDATE lessons SET rubric_id = NULL WHERE rubric_id = ?", [id])?;
        let n = tx.execute("DELETE FROM rubrics WHERE id = ?", [id])?;
        tx.commit()?;
        Ok(n > 0)
    }

    fn list_announcements(&self, class_id: &str) -> Result<Vec<Announcement>> {
        self.query_all(
            "SELECT id, class_id, title, body, created_at, scheduled_at, targets_json
             FROM announcements
             WHERE class_id = ?
             ORDER BY created_at DESC, id",
            [class_id],
            |r| {
                Ok(Announcement {
                    id: r.get(0)?,
                    class_id: r.get(1)?,
                    title: r.get(2)?,
                    body: r.get(3)?,
                    created_at: r.get(4)?,
                    scheduled_at: r.get(5)?,
                    target_student_ids: json_col(r, 6)?,
                })
            },
        )
    }

    fn insert_announcement(&self, a: &Announcement) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO announcements(id, class_id, title, body, created_at, scheduled_at, targets_json)
                 VALUES(?, ?, ?, ?, ?, ?, ?)",
                (
                    &a.id,
                    &a.class_id,
                    &a.title,
                    &a.body,
                    a.created_at,
                    a.scheduled_at,
                    to_json(&a.target_student_ids)?,
                ),
            )
            .context("insert announcement")?;
        Ok(())
    }

    fn delete_announcement(&self, class_id: &str, id: &str) -> Result<bool> {
        let n = self.conn.execute(
            "DELETE FROM announcements WHERE class_id = ? AND id = ?",
            [class_id, id],
        )?;
        Ok(n > 0)
    }

    fn list_help_requests(&self, class_id: &str) -> Result<Vec<HelpRequest>> {
        self.query_all(
            &format!(
                "SELECT {} FROM help_requests WHERE class_id = ? ORDER BY created_at, id",
                HELP_COLS
            ),
            [class_id],
            help_row,
        )
    }

    fn get_help_request(&self, id: &str) -> Result<Option<HelpRequest>> {
        self.query_one(
            &format!("SELECT {} FROM help_requests WHERE id = ?", HELP_COLS),
            [id],
            help_row,
        )
    }

    fn save_help_request(&self, h: &HelpRequest) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO help_requests(id, student_id, class_id, lesson_id, message, status, created_at, resolved_at)
                 VALUES(?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                   status = excluded.status,
                   resolved_at = excluded.resolved_at",
                (
                    &h.id,
                    &h.student_id,
                    &h.class_id,
                    &h.lesson_id,
                    &h.message,
                    h.status.as_str(),
                    h.created_at,
                    h.resolved_at,
                ),
            )
            .context("write help request")?;
        Ok(())
    }

    fn list_feedback_templates(&self, teacher_id: &str) -> Result<Vec<FeedbackTemplate>> {
        self.query_all(
            "SELECT id, teacher_id, title, text, category, created_at
             FROM feedback_templates
             WHERE teacher_id = ?
             ORDER BY title COLLATE NOCASE, id",
            [teacher_id],
            |r| {
                Ok(FeedbackTemplate {
                    id: r.get(0)?,
                    teacher_id: r.get(1)?,
                    title: r.get(2)?,
                    text: r.get(3)?,
                    category: r.get(4)?,
                    created_at: r.get(5)?,
                })
            },
        )
    }

    fn insert_feedback_template(&self, t: &FeedbackTemplate) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO feedback_templates(id, teacher_id, title, text, category, created_at)
                 VALUES(?, ?, ?, ?, ?, ?)",
                (&t.id, &t.teacher_id, &t.title, &t.text, &t.category, t.created_at),
            )
            .context("insert feedback template")?;
        Ok(())
    }

    fn delete_feedback_template(&self, id: &str) -> Result<bool> {
        let n = self
            .conn
            .execute("DELETE FROM feedback_templates WHERE id = ?", [id])?;
        Ok(n > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Feedback, HistoryItem};
    use std::collections::BTreeMap;

    fn open_temp() -> (SqliteGateway, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("classroomd-gw-{}", uuid::Uuid::new_v4()));
        let gw = SqliteGateway::open(&dir).expect("open gateway");
        (gw, dir)
    }

    fn class(id: &str) -> Class {
        Class {
            id: id.into(),
            name: "Period 1".into(),
            period: "1".into(),
            academic_year: "2026".into(),
            teacher_id: "t1".into(),
            enrollment_code: "123456".into(),
            archived: false,
            created_at: 1,
        }
    }

    fn lesson(id: &str, class_id: Option<&str>, unit_id: Option<&str>) -> LessonPlan {
        LessonPlan {
            id: id.into(),
            class_id: class_id.map(str::to_string),
            unit_id: unit_id.map(str::to_string),
            lesson_type: LessonType::Assignment,
            title: id.to_uppercase(),
            description: String::new(),
            level: "beginner".into(),
            steps: vec!["[NEXT] look".into(), "draw".into()],
            starter_code: String::new(),
            challenge: String::new(),
            rubric_id: None,
            is_template: class_id.is_none(),
            tags: vec!["shapes".into()],
            editor_type: EditorType::Scratch,
            created_at: 5,
        }
    }

    #[test]
    fn lessons_keep_append_order_and_round_trip() {
        let (gw, dir) = open_temp();
        gw.insert_class(&class("c1")).expect("class");
        gw.insert_lessons(&[lesson("b", Some("c1"), None), lesson("a", Some("c1"), None)])
            .expect("insert");
        gw.insert_lessons(&[lesson("t", None, None)]).expect("template");

        let listed = gw.list_lessons("c1").expect("list");
        let ids: Vec<&str> = listed.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(listed[0], lesson("b", Some("c1"), None));
        assert_eq!(gw.list_templates().expect("templates").len(), 1);

        let mut reordered = listed.clone();
        reordered.reverse();
        reordered[0].unit_id = Some("u1".into());
        gw.save_lesson_order(&reordered).expect("order");
        let listed = gw.list_lessons("c1").expect("list");
        assert_eq!(listed[0].id, "a");
        assert_eq!(listed[0].unit_id.as_deref(), Some("u1"));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn submission_upsert_keeps_one_row_per_pair() {
        let (gw, dir) = open_temp();
        let mut history = BTreeMap::new();
        history.insert(
            2,
            HistoryItem {
                step_index: 2,
                student_input: "rect()".into(),
                feedback: "ok".into(),
                passed: true,
            },
        );
        let mut sub = Submission {
            id: "s1".into(),
            class_id: "c1".into(),
            student_id: "st".into(),
            lesson_id: "l".into(),
            code: "x".into(),
            text_answer: None,
            status: SubmissionStatus::Draft,
            current_step: 2,
            history,
            feedback: None,
            submitted_at: None,
            time_spent: Some(10),
            version: 1,
            updated_at: 1,
        };
        gw.save_submission(&sub).expect("insert");
        sub.status = SubmissionStatus::Graded;
        sub.feedback = Some(Feedback {
            grade: 88,
            comment: "nice".into(),
            graded_at: 9,
        });
        sub.version = 2;
        gw.save_submissions(std::slice::from_ref(&sub)).expect("update");

        let found = gw.find_submission("st", "l").expect("find").expect("row");
        assert_eq!(found, sub);
        assert_eq!(gw.list_submissions("c1").expect("list").len(), 1);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn class_delete_cascades_but_spares_templates() {
        let (gw, dir) = open_temp();
        gw.insert_class(&class("c1")).expect("class");
        let unit = Unit {
            id: "u1".into(),
            class_id: "c1".into(),
            title: "Shapes".into(),
            description: String::new(),
            order: 0,
            is_locked: false,
            is_sequential: false,
            available_at: None,
        };
        gw.insert_curriculum(&[unit], &[lesson("l1", Some("c1"), Some("u1"))])
            .expect("curriculum");
        gw.insert_lessons(&[lesson("t1", None, None)]).expect("template");

        gw.delete_class("c1").expect("delete");
        assert!(gw.get_class("c1").expect("get").is_none());
        assert!(gw.list_units("c1").expect("units").is_empty());
        assert!(gw.get_lesson("l1").expect("lesson").is_none());
        assert!(gw.get_lesson("t1").expect("template").is_some());
        let _ = std::fs::remove_dir_all(dir);
    }
}
