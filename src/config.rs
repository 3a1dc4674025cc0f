use crate::ai::LlmSettings;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "classroomd",
    version,
    about = "Classroom data daemon (newline JSON over stdin/stdout)"
)]
pub struct Args {
    /// Workspace to open before the first request
    #[arg(long, env = "CLASSROOMD_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// OpenAI-compatible chat completions URL
    #[arg(
        long,
        env = "CLASSROOMD_LLM_ENDPOINT",
        default_value = "https://api.openai.com/v1/chat/completions"
    )]
    pub llm_endpoint: String,

    #[arg(long, env = "CLASSROOMD_LLM_MODEL", default_value = "gpt-4o-mini")]
    pub llm_model: String,

    /// Without a key the ai.* methods answer `ai_not_configured`
    #[arg(long, env = "CLASSROOMD_LLM_API_KEY", hide_env_values = true)]
    pub llm_api_key: Option<String>,

    #[arg(long, env = "CLASSROOMD_LLM_TIMEOUT_SECS", default_value_t = 60)]
    pub llm_timeout_secs: u64,
}

impl Args {
    pub fn llm_settings(&self) -> Option<LlmSettings> {
        let key = self.llm_api_key.as_deref().map(str::trim)?;
        if key.is_empty() {
            return None;
        }
        Some(LlmSettings {
            endpoint: self.llm_endpoint.clone(),
            model: self.llm_model.clone(),
            api_key: key.to_string(),
            timeout: Duration::from_secs(self.llm_timeout_secs.max(1)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_key_means_no_llm() {
        let args = Args::parse_from(["classroomd", "--llm-api-key", "  "]);
        assert!(args.llm_settings().is_none());
    }

    #[test]
    fn flags_build_settings() {
        let args = Args::parse_from([
            "classroomd",
            "--llm-api-key",
            "sk-test",
            "--llm-model",
            "tiny",
            "--llm-timeout-secs",
            "5",
        ]);
        let s = args.llm_settings().expect("settings");
        assert_eq!(s.model, "tiny");
        assert_eq!(s.timeout, Duration::from_secs(5));
    }
}
