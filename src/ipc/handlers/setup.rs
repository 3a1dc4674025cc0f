use crate::gateway::Gateway;
use crate::help_queue::Thresholds;
use crate::ipc::helpers::{db_read, db_write, required_str, with_store, Handled, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::EditorType;
use serde_json::{json, Map, Value};

#[derive(Clone, Copy)]
pub enum SetupSection {
    Grading,
    HelpQueue,
    Roster,
    Ai,
}

impl SetupSection {
    const ALL: [SetupSection; 4] = [Self::Grading, Self::HelpQueue, Self::Roster, Self::Ai];

    fn parse(s: &str) -> Option<Self> {
        match s {
            "grading" => Some(Self::Grading),
            "helpQueue" => Some(Self::HelpQueue),
            "roster" => Some(Self::Roster),
            "ai" => Some(Self::Ai),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Grading => "grading",
            Self::HelpQueue => "helpQueue",
            Self::Roster => "roster",
            Self::Ai => "ai",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Grading => "setup.grading",
            Self::HelpQueue => "setup.helpQueue",
            Self::Roster => "setup.roster",
            Self::Ai => "setup.ai",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Grading => json!({
            "strugglingThreshold": 60
        }),
        SetupSection::HelpQueue => json!({
            "waitingAfterMinutes": 5,
            "urgentAfterMinutes": 15
        }),
        SetupSection::Roster => json!({
            "placeholderName": "New Student"
        }),
        SetupSection::Ai => json!({
            "defaultLevel": "beginner",
            "defaultEditor": "p5"
        }),
    }
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_string_max(v: &Value, key: &str, max_len: usize) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    let s = s.trim();
    if s.is_empty() {
        return Err(format!("{} must not be empty", key));
    }
    if s.len() > max_len {
        return Err(format!("{} length must be <= {}", key, max_len));
    }
    Ok(s.to_string())
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = current
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())?;
    for (k, v) in patch {
        match section {
            SetupSection::Grading => match k.as_str() {
                "strugglingThreshold" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 0, 100)?));
                }
                _ => return Err(format!("unknown grading field: {}", k)),
            },
            SetupSection::HelpQueue => match k.as_str() {
                "waitingAfterMinutes" | "urgentAfterMinutes" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 0, 240)?));
                }
                _ => return Err(format!("unknown helpQueue field: {}", k)),
            },
            SetupSection::Roster => match k.as_str() {
                "placeholderName" => {
                    obj.insert(k.clone(), Value::String(parse_string_max(v, k, 80)?));
                }
                _ => return Err(format!("unknown roster field: {}", k)),
            },
            SetupSection::Ai => match k.as_str() {
                "defaultLevel" => {
                    let level = parse_string_max(v, k, 32)?.to_ascii_lowercase();
                    obj.insert(k.clone(), Value::String(level));
                }
                "defaultEditor" => {
                    let raw = parse_string_max(v, k, 16)?;
                    let editor = EditorType::parse(&raw)
                        .ok_or_else(|| "defaultEditor must be one of: p5, scratch".to_string())?;
                    obj.insert(k.clone(), Value::String(editor.as_str().to_string()));
                }
                _ => return Err(format!("unknown ai field: {}", k)),
            },
        }
    }
    if let SetupSection::HelpQueue = section {
        let waiting = obj.get("waitingAfterMinutes").and_then(Value::as_i64).unwrap_or(0);
        let urgent = obj.get("urgentAfterMinutes").and_then(Value::as_i64).unwrap_or(0);
        if urgent < waiting {
            return Err("urgentAfterMinutes must be >= waitingAfterMinutes".into());
        }
    }
    Ok(())
}

pub fn load_section(store: &dyn Gateway, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = store.setting(section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Stored values from older builds may not validate; defaults stand in.
            let _ = merge_section_patch(section, &mut current, saved_obj);
        }
    }
    Ok(current)
}

fn section_i64(store: &dyn Gateway, section: SetupSection, key: &str) -> Result<i64, HandlerErr> {
    let value = load_section(store, section).map_err(db_read)?;
    let fallback = default_section(section);
    Ok(value
        .get(key)
        .and_then(Value::as_i64)
        .or_else(|| fallback.get(key).and_then(Value::as_i64))
        .unwrap_or(0))
}

fn section_string(store: &dyn Gateway, section: SetupSection, key: &str) -> Result<String, HandlerErr> {
    let value = load_section(store, section).map_err(db_read)?;
    let fallback = default_section(section);
    Ok(value
        .get(key)
        .and_then(Value::as_str)
        .or_else(|| fallback.get(key).and_then(Value::as_str))
        .unwrap_or_default()
        .to_string())
}

pub fn struggling_threshold(store: &dyn Gateway) -> Result<f64, HandlerErr> {
    Ok(section_i64(store, SetupSection::Grading, "strugglingThreshold")? as f64)
}

pub fn help_thresholds(store: &dyn Gateway) -> Result<Thresholds, HandlerErr> {
    Ok(Thresholds::from_minutes(
        section_i64(store, SetupSection::HelpQueue, "waitingAfterMinutes")?,
        section_i64(store, SetupSection::HelpQueue, "urgentAfterMinutes")?,
    ))
}

pub fn placeholder_name(store: &dyn Gateway) -> Result<String, HandlerErr> {
    section_string(store, SetupSection::Roster, "placeholderName")
}

pub struct AiDefaults {
    pub level: String,
    pub editor: EditorType,
}

impl Default for AiDefaults {
    /// Values used when no workspace is open.
    fn default() -> Self {
        let section = default_section(SetupSection::Ai);
        Self {
            level: section
                .get("defaultLevel")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            editor: EditorType::default(),
        }
    }
}

pub fn ai_defaults(store: &dyn Gateway) -> Result<AiDefaults, HandlerErr> {
    let level = section_string(store, SetupSection::Ai, "defaultLevel")?;
    let editor = EditorType::parse(&section_string(store, SetupSection::Ai, "defaultEditor")?)
        .unwrap_or_default();
    Ok(AiDefaults { level, editor })
}

fn setup_get(store: &dyn Gateway, _params: &Value) -> Handled {
    let mut out = Map::new();
    for section in SetupSection::ALL {
        out.insert(
            section.name().to_string(),
            load_section(store, section).map_err(db_read)?,
        );
    }
    Ok(Value::Object(out))
}

fn setup_update(store: &dyn Gateway, params: &Value) -> Handled {
    let section_raw = required_str(params, "section")?;
    let Some(section) = SetupSection::parse(&section_raw) else {
        return Err(HandlerErr::bad_params("unknown section"));
    };
    let Some(patch_obj) = params.get("patch").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::bad_params("patch must be an object"));
    };

    let mut current = load_section(store, section).map_err(db_read)?;
    merge_section_patch(section, &mut current, patch_obj).map_err(HandlerErr::bad_params)?;
    store.put_setting(section.key(), &current).map_err(db_write)?;
    Ok(json!({ "section": section.name(), "values": current }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(with_store(state, req, setup_get)),
        "setup.update" => Some(with_store(state, req, setup_update)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_validates_each_field() {
        let mut grading = default_section(SetupSection::Grading);
        let patch = json!({"strugglingThreshold": 70});
        merge_section_patch(SetupSection::Grading, &mut grading, patch.as_object().expect("obj"))
            .expect("valid");
        assert_eq!(grading["strugglingThreshold"], 70);

        let bad = json!({"strugglingThreshold": 140});
        assert!(merge_section_patch(SetupSection::Grading, &mut grading, bad.as_object().expect("obj")).is_err());
        let unknown = json!({"colour": "red"});
        assert!(merge_section_patch(SetupSection::Roster, &mut grading, unknown.as_object().expect("obj")).is_err());
    }

    #[test]
    fn help_thresholds_must_stay_ordered() {
        let mut help = default_section(SetupSection::HelpQueue);
        let patch = json!({"urgentAfterMinutes": 2});
        assert!(merge_section_patch(SetupSection::HelpQueue, &mut help, patch.as_object().expect("obj")).is_err());
    }

    #[test]
    fn editor_aliases_are_canonicalized() {
        let mut ai = default_section(SetupSection::Ai);
        let patch = json!({"defaultEditor": "p5.js", "defaultLevel": "Intermediate"});
        merge_section_patch(SetupSection::Ai, &mut ai, patch.as_object().expect("obj")).expect("valid");
        assert_eq!(ai["defaultEditor"], "p5");
        assert_eq!(ai["defaultLevel"], "intermediate");
    }
}
