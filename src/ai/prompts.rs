use super::{CurriculumRequest, LessonRequest};
use crate::model::{EditorType, LessonType};

pub const SYSTEM: &str = "You are a patient creative-coding teacher for children aged 8 to 14. \
Reply with a single JSON value and nothing else. No Markdown, no commentary.";

fn editor_label(editor: EditorType) -> &'static str {
    match editor {
        EditorType::P5 => "p5.js (JavaScript)",
        EditorType::Scratch => "Scratch (describe blocks in words, starterCode may be empty)",
    }
}

const LESSON_SHAPE: &str = r#"{"title": string, "objective": string, "steps": [string], "starterCode": string, "challenge": string, "concepts": [string]}"#;

const STEP_RULES: &str = "Steps are short instructions, 4 to 8 of them. Prefix a step with [NEXT] \
when the student only needs to read or watch, and with [TEXT] when they should answer in words. \
Untagged steps ask the student to change the code.";

pub fn lesson(req: &LessonRequest) -> String {
    let kind = match req.lesson_type {
        LessonType::Lesson => "guided lesson",
        LessonType::Assignment => "graded assignment with a clear deliverable",
    };
    format!(
        "Write a {kind} about \"{topic}\" for {level} students using {editor}.\n\
         {STEP_RULES}\n\
         Answer with JSON shaped like {LESSON_SHAPE}.",
        kind = kind,
        topic = req.topic.trim(),
        level = req.level,
        editor = editor_label(req.editor),
    )
}

pub fn analyze_code(code: &str, objective: &str, editor: EditorType) -> String {
    format!(
        "A student wrote this {editor} code for the objective \"{objective}\".\n\
         ---\n{code}\n---\n\
         Give encouraging feedback a child can follow.\n\
         Answer with JSON shaped like \
         {{\"feedback\": string, \"suggestions\": [string], \"meetsObjective\": bool, \"score\": number 0-100}}.",
        editor = editor_label(editor),
        objective = objective.trim(),
        code = code,
    )
}

pub fn reflection(instruction: &str, answer: &str) -> String {
    format!(
        "The step asked: \"{instruction}\"\nThe student answered: \"{answer}\"\n\
         Pass any honest attempt that addresses the question.\n\
         Answer with JSON shaped like {{\"passed\": bool, \"feedback\": string}}.",
        instruction = instruction,
        answer = answer.trim(),
    )
}

pub fn code_step(instruction: &str, code: &str) -> String {
    format!(
        "The step asked: \"{instruction}\"\nThe student's code is:\n---\n{code}\n---\n\
         Decide whether the code does what the step asked.\n\
         Answer with JSON shaped like {{\"passed\": bool, \"feedback\": string}}.",
        instruction = instruction,
        code = code,
    )
}

pub fn explain_error(code: &str, error: &str) -> String {
    format!(
        "This code produced the error \"{error}\":\n---\n{code}\n---\n\
         Explain the problem in one or two friendly sentences and hint at the fix without writing it.\n\
         Answer with JSON shaped like {{\"explanation\": string, \"fixHint\": string}}.",
        error = error.trim(),
        code = code,
    )
}

pub fn suggest_curriculum(lesson_summaries: &[String]) -> String {
    let listing = if lesson_summaries.is_empty() {
        "(no lessons yet)".to_string()
    } else {
        lesson_summaries
            .iter()
            .map(|s| format!("- {}", s))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        "A class has covered these lessons:\n{listing}\n\
         Suggest 3 to 5 next lessons that build on them.\n\
         Answer with a JSON array of \
         {{\"title\": string, \"description\": string, \"concepts\": [string], \"rationale\": string}}.",
        listing = listing,
    )
}

pub fn curriculum(req: &CurriculumRequest) -> String {
    format!(
        "Plan a {weeks}-week curriculum themed \"{theme}\" for {level} students using {editor}.\n\
         Group it into units of 2 to 4 lessons each. {STEP_RULES}\n\
         Answer with JSON shaped like \
         {{\"title\": string, \"description\": string, \"units\": [{{\"title\": string, \"description\": string, \"lessons\": [{LESSON_SHAPE}]}}]}}.",
        weeks = req.weeks.max(1),
        theme = req.theme.trim(),
        level = req.level,
        editor = editor_label(req.editor),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lesson_prompt_names_topic_and_editor() {
        let p = lesson(&LessonRequest {
            topic: " spirals ".into(),
            level: "intermediate".into(),
            lesson_type: LessonType::Assignment,
            editor: EditorType::P5,
        });
        assert!(p.contains("\"spirals\""));
        assert!(p.contains("p5.js"));
        assert!(p.contains("graded assignment"));
        assert!(p.contains("[NEXT]"));
    }

    #[test]
    fn empty_history_is_spelled_out() {
        assert!(suggest_curriculum(&[]).contains("(no lessons yet)"));
    }
}
