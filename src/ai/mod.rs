//! Content generation through a hosted language model.
//!
//! Every purpose builds a prompt, asks the model for JSON, strips any code
//! fence, and checks the payload's shape before handing it out. Failures
//! of any kind come back as `None` and are logged, never raised.

mod client;
mod prompts;

pub use client::{HttpContentClient, LlmSettings};

use crate::model::{classify_step, EditorType, LessonType, StepKind};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("model endpoint returned {0}: {1}")]
    Status(u16, String),

    #[error("model returned an empty reply")]
    EmptyReply,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedLesson {
    pub title: String,
    #[serde(default, alias = "description")]
    pub objective: String,
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default)]
    pub starter_code: String,
    #[serde(default)]
    pub challenge: String,
    #[serde(default, alias = "tags")]
    pub concepts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeAnalysis {
    pub feedback: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub meets_objective: bool,
    #[serde(default)]
    pub score: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepValidation {
    pub passed: bool,
    #[serde(default)]
    pub feedback: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorExplanation {
    pub explanation: String,
    #[serde(default)]
    pub fix_hint: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurriculumSuggestion {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub concepts: Vec<String>,
    #[serde(default)]
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedUnit {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub lessons: Vec<GeneratedLesson>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedCurriculum {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub units: Vec<GeneratedUnit>,
}

/// Shape checks beyond what deserialization enforces.
pub trait Admissible {
    fn admit(&self) -> Result<(), String>;
}

impl Admissible for GeneratedLesson {
    fn admit(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("lesson title is empty".into());
        }
        if self.steps.iter().all(|s| s.trim().is_empty()) {
            return Err(format!("lesson '{}' has no steps", self.title));
        }
        Ok(())
    }
}

impl Admissible for CodeAnalysis {
    fn admit(&self) -> Result<(), String> {
        if self.feedback.trim().is_empty() {
            return Err("analysis feedback is empty".into());
        }
        match self.score {
            Some(s) if s > 100 => Err(format!("score {} out of range", s)),
            _ => Ok(()),
        }
    }
}

impl Admissible for StepValidation {
    fn admit(&self) -> Result<(), String> {
        Ok(())
    }
}

impl Admissible for ErrorExplanation {
    fn admit(&self) -> Result<(), String> {
        if self.explanation.trim().is_empty() {
            return Err("explanation is empty".into());
        }
        Ok(())
    }
}

impl Admissible for Vec<CurriculumSuggestion> {
    fn admit(&self) -> Result<(), String> {
        if self.is_empty() {
            return Err("no suggestions".into());
        }
        if self.iter().any(|s| s.title.trim().is_empty()) {
            return Err("suggestion without title".into());
        }
        Ok(())
    }
}

impl Admissible for GeneratedCurriculum {
    fn admit(&self) -> Result<(), String> {
        if self.units.is_empty() {
            return Err("curriculum has no units".into());
        }
        for unit in &self.units {
            if unit.title.trim().is_empty() {
                return Err("unit title is empty".into());
            }
            for lesson in &unit.lessons {
                lesson.admit()?;
            }
        }
        Ok(())
    }
}

/// Removes a surrounding Markdown code fence (```json ... ```), if any.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(nl) => &rest[nl + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Outermost `{...}` or `[...]` span, for replies with prose around the JSON.
fn json_span(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let close = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

/// Parses a model reply into `T`, tolerating code fences and surrounding
/// prose. `None` when nothing admissible can be recovered.
pub fn parse_reply<T: DeserializeOwned + Admissible>(raw: &str) -> Option<T> {
    let body = strip_code_fence(raw);
    let parsed = serde_json::from_str::<T>(body).or_else(|first| {
        json_span(body)
            .ok_or(first)
            .and_then(|span| serde_json::from_str::<T>(span))
    });
    match parsed {
        Ok(value) => match value.admit() {
            Ok(()) => Some(value),
            Err(reason) => {
                warn!(reason = %reason, "model reply rejected");
                None
            }
        },
        Err(e) => {
            warn!(error = %e, "model reply is not valid JSON");
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct LessonRequest {
    pub topic: String,
    pub level: String,
    pub lesson_type: LessonType,
    pub editor: EditorType,
}

#[derive(Debug, Clone)]
pub struct CurriculumRequest {
    pub theme: String,
    pub weeks: u32,
    pub level: String,
    pub editor: EditorType,
}

fn ask<G, T>(generator: &G, purpose: &str, prompt: String) -> Option<T>
where
    G: ContentGenerator + ?Sized,
    T: DeserializeOwned + Admissible,
{
    match generator.complete(prompts::SYSTEM, &prompt) {
        Ok(raw) => {
            let parsed = parse_reply(&raw);
            if parsed.is_none() {
                warn!(purpose, "no usable reply from model");
            }
            parsed
        }
        Err(e) => {
            warn!(purpose, error = %e, "model request failed");
            None
        }
    }
}

pub trait ContentGenerator {
    /// Sends one prompt and returns the model's raw text.
    fn complete(&self, system: &str, prompt: &str) -> Result<String, AiError>;

    fn generate_lesson(&self, req: &LessonRequest) -> Option<GeneratedLesson> {
        ask(self, "generate_lesson", prompts::lesson(req))
    }

    fn analyze_code(&self, code: &str, objective: &str, editor: EditorType) -> Option<CodeAnalysis> {
        ask(self, "analyze_code", prompts::analyze_code(code, objective, editor))
    }

    /// `[NEXT]` steps pass without asking; blank `[TEXT]` answers fail
    /// without asking.
    fn validate_step(&self, step: &str, input: &str, code: &str) -> Option<StepValidation> {
        let (kind, instruction) = classify_step(step);
        match kind {
            StepKind::Observe => Some(StepValidation {
                passed: true,
                feedback: String::new(),
            }),
            StepKind::Reflect if input.trim().is_empty() => Some(StepValidation {
                passed: false,
                feedback: "Write a few words about what you noticed.".into(),
            }),
            StepKind::Reflect => ask(self, "validate_step", prompts::reflection(instruction, input)),
            StepKind::Code => ask(self, "validate_step", prompts::code_step(instruction, code)),
        }
    }

    fn explain_error(&self, code: &str, error: &str) -> Option<ErrorExplanation> {
        ask(self, "explain_error", prompts::explain_error(code, error))
    }

    fn suggest_curriculum(&self, lesson_summaries: &[String]) -> Option<Vec<CurriculumSuggestion>> {
        ask(self, "suggest_curriculum", prompts::suggest_curriculum(lesson_summaries))
    }

    fn generate_curriculum(&self, req: &CurriculumRequest) -> Option<GeneratedCurriculum> {
        ask(self, "generate_curriculum", prompts::curriculum(req))
    }
}
