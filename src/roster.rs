//! Roster rules: archival instead of deletion, CSV import/export and
//! enrollment approval.

use crate::curriculum::ClassContext;
use crate::error::CoreError;
use crate::model::{new_id, now_ms, Class, Enrollment, EnrollmentStatus, Student};
use rand::Rng;
use std::collections::HashSet;

pub fn avatar_initials(name: &str) -> String {
    let words: Vec<&str> = name.split_whitespace().collect();
    let pick = |w: &str| w.chars().next().map(|c| c.to_uppercase().to_string());
    match words.as_slice() {
        [] => "?".to_string(),
        [only] => pick(only).unwrap_or_else(|| "?".to_string()),
        [first, .., last] => format!(
            "{}{}",
            pick(first).unwrap_or_default(),
            pick(last).unwrap_or_default()
        ),
    }
}

pub fn new_student(name: &str, email: Option<String>, school_id: Option<String>) -> Student {
    let name = name.trim().to_string();
    Student {
        id: new_id(),
        avatar: avatar_initials(&name),
        name,
        email,
        school_id,
        notes: None,
        is_active: true,
        created_at: now_ms(),
    }
}

/// Splits into (active, archived). Computed per call; never cached.
pub fn partition(students: &[Student]) -> (Vec<&Student>, Vec<&Student>) {
    students.iter().partition(|s| s.is_active)
}

pub fn active_count(students: &[Student]) -> usize {
    students.iter().filter(|s| s.is_active).count()
}

fn parse_csv_record(line: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut buf = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '"' {
            if in_quotes && chars.peek() == Some(&'"') {
                buf.push('"');
                chars.next();
                continue;
            }
            in_quotes = !in_quotes;
            continue;
        }
        if ch == ',' && !in_quotes {
            out.push(std::mem::take(&mut buf));
            continue;
        }
        buf.push(ch);
    }
    out.push(buf);
    out
}

fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct CsvColumns {
    name: Option<usize>,
    email: Option<usize>,
    school_id: Option<usize>,
}

/// Each header cell is claimed by the first field it matches (name, then
/// email, then id/student); each field keeps the first column it gets.
fn detect_columns(header: &[String]) -> CsvColumns {
    let mut cols = CsvColumns::default();
    for (idx, cell) in header.iter().enumerate() {
        let h = cell.trim().to_ascii_lowercase();
        if h.contains("name") {
            cols.name.get_or_insert(idx);
        } else if h.contains("email") {
            cols.email.get_or_insert(idx);
        } else if h.contains("id") || h.contains("student") {
            cols.school_id.get_or_insert(idx);
        }
    }
    cols
}

#[derive(Debug, Clone, PartialEq)]
pub struct CsvRosterRow {
    pub line: usize,
    pub name: String,
    pub email: Option<String>,
    pub school_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRoster {
    pub rows: Vec<CsvRosterRow>,
    /// 1-based line numbers of rows without a usable name.
    pub skipped_lines: Vec<usize>,
}

pub fn parse_roster_csv(text: &str) -> Result<ParsedRoster, CoreError> {
    let mut lines = text
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty());
    let Some((_, header_line)) = lines.next() else {
        return Err(CoreError::BadInput("csv is empty".into()));
    };
    let cols = detect_columns(&parse_csv_record(header_line));
    let cell = |fields: &[String], idx: Option<usize>| {
        idx.and_then(|i| fields.get(i))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let mut rows = Vec::new();
    let mut skipped_lines = Vec::new();
    for (line_no, raw) in lines {
        let fields = parse_csv_record(raw.trim_end_matches('\r'));
        let Some(name) = cell(&fields, cols.name) else {
            skipped_lines.push(line_no + 1);
            continue;
        };
        rows.push(CsvRosterRow {
            line: line_no + 1,
            name,
            email: cell(&fields, cols.email),
            school_id: cell(&fields, cols.school_id),
        });
    }
    Ok(ParsedRoster {
        rows,
        skipped_lines,
    })
}

#[derive(Debug, Default)]
pub struct RosterImport {
    pub students: Vec<Student>,
    pub enrollments: Vec<Enrollment>,
    /// Names of rows matching an existing student's email or school id.
    pub duplicates: Vec<String>,
}

/// Builds the new students and auto-approved enrollments for parsed rows.
/// A row whose email or school id is already on the class roster (or earlier
/// in the same file) is reported as a duplicate instead.
pub fn plan_csv_import(ctx: &ClassContext, existing: &[Student], rows: &[CsvRosterRow]) -> RosterImport {
    let norm = |v: &str| v.trim().to_ascii_lowercase();
    let mut emails: HashSet<String> = existing.iter().filter_map(|s| s.email.as_deref()).map(norm).collect();
    let mut school_ids: HashSet<String> = existing
        .iter()
        .filter_map(|s| s.school_id.as_deref())
        .map(norm)
        .collect();

    let ts = now_ms();
    let mut out = RosterImport::default();
    for row in rows {
        let dup_email = row.email.as_deref().map(norm).is_some_and(|e| emails.contains(&e));
        let dup_id = row.school_id.as_deref().map(norm).is_some_and(|i| school_ids.contains(&i));
        if dup_email || dup_id {
            out.duplicates.push(row.name.clone());
            continue;
        }
        if let Some(e) = row.email.as_deref() {
            emails.insert(norm(e));
        }
        if let Some(i) = row.school_id.as_deref() {
            school_ids.insert(norm(i));
        }
        let student = new_student(&row.name, row.email.clone(), row.school_id.clone());
        out.enrollments.push(Enrollment {
            id: new_id(),
            student_id: student.id.clone(),
            class_id: ctx.class_id().to_string(),
            status: EnrollmentStatus::Approved,
            requested_at: ts,
            enrolled_at: Some(ts),
        });
        out.students.push(student);
    }
    out
}

/// CSV of the currently active students only.
pub fn export_roster_csv(students: &[Student]) -> String {
    let mut csv = String::from("name,email,studentId\n");
    let (active, _) = partition(students);
    for s in active {
        csv.push_str(&format!(
            "{},{},{}\n",
            csv_quote(&s.name),
            csv_quote(s.email.as_deref().unwrap_or("")),
            csv_quote(s.school_id.as_deref().unwrap_or(""))
        ));
    }
    csv
}

pub fn request_enrollment(class: &Class, student_id: &str) -> Result<Enrollment, CoreError> {
    let ctx = ClassContext::for_class(class)?;
    Ok(Enrollment {
        id: new_id(),
        student_id: student_id.to_string(),
        class_id: ctx.class_id().to_string(),
        status: EnrollmentStatus::Pending,
        requested_at: now_ms(),
        enrolled_at: None,
    })
}

fn ensure_pending(enrollment: &Enrollment) -> Result<(), CoreError> {
    if enrollment.status != EnrollmentStatus::Pending {
        return Err(CoreError::InvalidTransition(format!(
            "enrollment {} is already {}",
            enrollment.id,
            enrollment.status.as_str()
        )));
    }
    Ok(())
}

/// Approves a pending enrollment. When the student has no record yet a
/// placeholder is returned for the caller to persist.
pub fn approve_enrollment(
    enrollment: &mut Enrollment,
    existing_student: Option<&Student>,
    placeholder_name: &str,
) -> Result<Option<Student>, CoreError> {
    ensure_pending(enrollment)?;
    enrollment.status = EnrollmentStatus::Approved;
    enrollment.enrolled_at = Some(now_ms());
    if existing_student.is_some() {
        return Ok(None);
    }
    let mut placeholder = new_student(placeholder_name, None, None);
    placeholder.id = enrollment.student_id.clone();
    Ok(Some(placeholder))
}

pub fn reject_enrollment(enrollment: &mut Enrollment) -> Result<(), CoreError> {
    ensure_pending(enrollment)?;
    enrollment.status = EnrollmentStatus::Rejected;
    Ok(())
}

/// Six-digit code not used by any class in `taken`.
pub fn generate_enrollment_code(taken: &HashSet<String>) -> Result<String, CoreError> {
    let mut rng = rand::rng();
    for _ in 0..1000 {
        let code = format!("{:06}", rng.random_range(0..1_000_000u32));
        if !taken.contains(&code) {
            return Ok(code);
        }
    }
    Err(CoreError::BadInput("no free enrollment code available".into()))
}
