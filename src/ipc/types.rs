use std::path::PathBuf;

use crate::ai::ContentGenerator;
use crate::gateway::Gateway;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub store: Option<Box<dyn Gateway>>,
    pub ai: Option<Box<dyn ContentGenerator>>,
}
