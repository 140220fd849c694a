use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::analysis::prompts::{JD_EXTRACTION_PROMPT, MATCH_PROMPT_TEMPLATE, REQUIREMENTS_PLACEHOLDER};
use crate::llm_client::{LlmConfig, DEFAULT_API_URL, DEFAULT_MODEL};

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub anthropic_api_key: String,
    pub upload_dir: PathBuf,
    pub port: u16,
    pub rust_log: String,
    pub llm_api_url: String,
    pub llm_model: String,
    pub llm_max_tokens: u32,
    pub llm_timeout_secs: u64,
    pub office_converter_bin: String,
    pub conversion_timeout_secs: u64,
    pub max_upload_bytes: usize,
    pub jd_prompt_path: Option<PathBuf>,
    pub match_prompt_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            upload_dir: PathBuf::from(env_or("UPLOAD_DIR", "./uploads")),
            port: parse_env("PORT", 8080)?,
            rust_log: env_or("RUST_LOG", "info"),
            llm_api_url: env_or("LLM_API_URL", DEFAULT_API_URL),
            llm_model: env_or("LLM_MODEL", DEFAULT_MODEL),
            llm_max_tokens: parse_env("LLM_MAX_TOKENS", 2048)?,
            llm_timeout_secs: parse_env("LLM_TIMEOUT_SECS", 180)?,
            office_converter_bin: env_or("OFFICE_CONVERTER_BIN", "libreoffice"),
            conversion_timeout_secs: parse_env("CONVERSION_TIMEOUT_SECS", 60)?,
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", 256 * 1024 * 1024)?,
            jd_prompt_path: std::env::var("JD_PROMPT_PATH").ok().map(PathBuf::from),
            match_prompt_path: std::env::var("MATCH_PROMPT_PATH").ok().map(PathBuf::from),
        })
    }

    /// Explicit LLM settings handed to the client constructor.
    pub fn llm_config(&self) -> LlmConfig {
        LlmConfig {
            api_url: self.llm_api_url.clone(),
            api_key: self.anthropic_api_key.clone(),
            model: self.llm_model.clone(),
            max_tokens: self.llm_max_tokens,
            timeout: Duration::from_secs(self.llm_timeout_secs),
        }
    }

    pub fn conversion_timeout(&self) -> Duration {
        Duration::from_secs(self.conversion_timeout_secs)
    }
}

/// Instruction templates for requirement extraction and candidate matching.
#[derive(Debug, Clone)]
pub struct PromptTemplates {
    pub jd_extraction: String,
    pub candidate_match: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            jd_extraction: JD_EXTRACTION_PROMPT.to_string(),
            candidate_match: MATCH_PROMPT_TEMPLATE.to_string(),
        }
    }
}

impl PromptTemplates {
    /// Reads overrides from the configured paths, falling back to the built-ins.
    pub fn load(config: &Config) -> Result<Self> {
        let defaults = Self::default();
        let jd_extraction = match &config.jd_prompt_path {
            Some(path) => read_template(path)?,
            None => defaults.jd_extraction,
        };
        let candidate_match = match &config.match_prompt_path {
            Some(path) => read_template(path)?,
            None => defaults.candidate_match,
        };
        if !candidate_match.contains(REQUIREMENTS_PLACEHOLDER) {
            bail!("Match prompt template must contain the {REQUIREMENTS_PLACEHOLDER} placeholder");
        }
        Ok(Self {
            jd_extraction,
            candidate_match,
        })
    }
}

fn read_template(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read prompt template {}", path.display()))
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_prompts(jd: Option<PathBuf>, matching: Option<PathBuf>) -> Config {
        Config {
            database_url: "postgres://localhost/cvmatch".to_string(),
            anthropic_api_key: "test-key".to_string(),
            upload_dir: PathBuf::from("./uploads"),
            port: 8080,
            rust_log: "info".to_string(),
            llm_api_url: DEFAULT_API_URL.to_string(),
            llm_model: DEFAULT_MODEL.to_string(),
            llm_max_tokens: 2048,
            llm_timeout_secs: 180,
            office_converter_bin: "libreoffice".to_string(),
            conversion_timeout_secs: 60,
            max_upload_bytes: 1024,
            jd_prompt_path: jd,
            match_prompt_path: matching,
        }
    }

    #[test]
    fn test_llm_config_is_derived_from_config() {
        let llm = config_with_prompts(None, None).llm_config();
        assert_eq!(llm.api_key, "test-key");
        assert_eq!(llm.max_tokens, 2048);
        assert_eq!(llm.timeout, Duration::from_secs(180));
    }

    #[test]
    fn test_prompt_templates_default_to_builtins() {
        let templates = PromptTemplates::load(&config_with_prompts(None, None)).unwrap();
        assert_eq!(templates.jd_extraction, JD_EXTRACTION_PROMPT);
        assert_eq!(templates.candidate_match, MATCH_PROMPT_TEMPLATE);
    }

    #[test]
    fn test_prompt_template_override_is_read_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("match.txt");
        std::fs::write(&path, "Lenient matching.\n{requirements}\nJSON only.").unwrap();

        let templates = PromptTemplates::load(&config_with_prompts(None, Some(path))).unwrap();
        assert!(templates.candidate_match.starts_with("Lenient matching."));
    }

    #[test]
    fn test_match_template_without_placeholder_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("match.txt");
        std::fs::write(&path, "No placeholder here").unwrap();

        assert!(PromptTemplates::load(&config_with_prompts(None, Some(path))).is_err());
    }

    #[test]
    fn test_missing_template_file_is_error() {
        let config = config_with_prompts(Some(PathBuf::from("/nonexistent/jd.txt")), None);
        assert!(PromptTemplates::load(&config).is_err());
    }
}
