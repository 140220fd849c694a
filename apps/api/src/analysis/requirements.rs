//! Requirement extraction: job description PDF in, `RequirementSet` out.
//!
//! All-or-nothing. A response that is not JSON, or that lacks any of the three
//! categories, fails the whole extraction; there is no partial set.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::documents::error::ExtractionError;
use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::response::{missing_keys, parse_object, snippet, strip_code_fence};
use crate::llm_client::{LlmBackend, LlmRequest};

pub const REQUIREMENT_KEYS: [&str; 3] = ["education", "experience", "skills"];

/// Structured requirements of one job description. All three categories are
/// always present; any of them may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementSet {
    pub education: Vec<String>,
    pub experience: Vec<String>,
    pub skills: Vec<String>,
}

impl RequirementSet {
    /// Validates a parsed JSON object. `null` categories become empty lists;
    /// anything else that is not a list of strings is rejected.
    pub fn from_json_object(object: &Map<String, Value>) -> Result<Self, ExtractionError> {
        let missing = missing_keys(object, &REQUIREMENT_KEYS);
        if !missing.is_empty() {
            return Err(ExtractionError::MissingKeys(missing));
        }
        Ok(Self {
            education: string_list(object, "education")?,
            experience: string_list(object, "experience")?,
            skills: string_list(object, "skills")?,
        })
    }

    /// Same validation for a value that may not be an object at all.
    pub fn from_value(value: &Value) -> Result<Self, ExtractionError> {
        match value {
            Value::Object(object) => Self::from_json_object(object),
            _ => Err(ExtractionError::MissingKeys(REQUIREMENT_KEYS.to_vec())),
        }
    }

    /// Serialized form stored in `job_descriptions.requirements_json`.
    pub fn to_storage(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_storage(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

fn string_list(object: &Map<String, Value>, key: &'static str) -> Result<Vec<String>, ExtractionError> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::String(s) => Ok(s.clone()),
                _ => Err(ExtractionError::InvalidRequirements {
                    key,
                    reason: format!("item {i} is not a string"),
                }),
            })
            .collect(),
        Some(_) => Err(ExtractionError::InvalidRequirements {
            key,
            reason: "expected a list of strings".to_string(),
        }),
    }
}

/// Sends a normalized job description PDF to the LLM with a fixed instruction
/// template and validates the reply into a `RequirementSet`.
pub struct RequirementExtractor {
    llm: Arc<dyn LlmBackend>,
    template: String,
}

impl RequirementExtractor {
    pub fn new(llm: Arc<dyn LlmBackend>, template: impl Into<String>) -> Self {
        Self {
            llm,
            template: template.into(),
        }
    }

    pub async fn extract(&self, pdf_path: &Path) -> Result<RequirementSet, ExtractionError> {
        let document = tokio::fs::read(pdf_path)
            .await
            .map_err(|e| ExtractionError::io(pdf_path, e))?;
        info!(
            "Extracting requirements from {} ({} bytes)",
            pdf_path.display(),
            document.len()
        );

        let raw = self
            .llm
            .complete(LlmRequest {
                document: Some(&document),
                instructions: &self.template,
                system: Some(JSON_ONLY_SYSTEM),
            })
            .await?;

        let object = parse_object(strip_code_fence(&raw)).map_err(|e| {
            warn!("Requirement response is not a JSON object: {e}. Raw: {}", snippet(&raw, 200));
            ExtractionError::MalformedResponse(e.to_string())
        })?;
        let requirements = RequirementSet::from_json_object(&object)?;

        info!(
            "Extracted requirements: {} education, {} experience, {} skills",
            requirements.education.len(),
            requirements.experience.len(),
            requirements.skills.len()
        );
        Ok(requirements)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::analysis::prompts::JD_EXTRACTION_PROMPT;
    use crate::llm_client::testing::ScriptedLlm;

    fn jd_pdf(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("jd.pdf");
        std::fs::write(&path, b"%PDF-1.4 job description").unwrap();
        path
    }

    #[tokio::test]
    async fn test_extract_parses_fenced_response() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedLlm::new().reply(
            "```json\n{\"education\": [\"BSc\"], \"experience\": [\"5+ years\"], \"skills\": []}\n```",
        ));
        let extractor = RequirementExtractor::new(llm.clone(), JD_EXTRACTION_PROMPT);

        let requirements = extractor.extract(&jd_pdf(dir.path())).await.unwrap();
        assert_eq!(requirements.education, vec!["BSc"]);
        assert_eq!(requirements.experience, vec!["5+ years"]);
        assert!(requirements.skills.is_empty());

        let seen = llm.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].document_len, Some(24));
        assert_eq!(seen[0].instructions, JD_EXTRACTION_PROMPT);
    }

    #[tokio::test]
    async fn test_extract_normalizes_null_category() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(
            ScriptedLlm::new().reply(r#"{"education": null, "experience": [], "skills": ["Go"]}"#),
        );
        let extractor = RequirementExtractor::new(llm, JD_EXTRACTION_PROMPT);

        let requirements = extractor.extract(&jd_pdf(dir.path())).await.unwrap();
        assert!(requirements.education.is_empty());
        assert_eq!(requirements.skills, vec!["Go"]);
    }

    #[tokio::test]
    async fn test_extract_missing_key_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedLlm::new().reply(r#"{"education": [], "skills": []}"#));
        let extractor = RequirementExtractor::new(llm, JD_EXTRACTION_PROMPT);

        match extractor.extract(&jd_pdf(dir.path())).await {
            Err(ExtractionError::MissingKeys(keys)) => assert_eq!(keys, vec!["experience"]),
            other => panic!("expected MissingKeys, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_extract_prose_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedLlm::new().reply("I could not read the document, sorry."));
        let extractor = RequirementExtractor::new(llm, JD_EXTRACTION_PROMPT);

        assert!(matches!(
            extractor.extract(&jd_pdf(dir.path())).await,
            Err(ExtractionError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_extract_llm_failure_is_single_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedLlm::new().fail(529, "overloaded").reply("{}"));
        let extractor = RequirementExtractor::new(llm.clone(), JD_EXTRACTION_PROMPT);

        assert!(matches!(
            extractor.extract(&jd_pdf(dir.path())).await,
            Err(ExtractionError::Llm(_))
        ));
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_extract_missing_pdf_never_calls_llm() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedLlm::new());
        let extractor = RequirementExtractor::new(llm.clone(), JD_EXTRACTION_PROMPT);

        assert!(matches!(
            extractor.extract(&dir.path().join("gone.pdf")).await,
            Err(ExtractionError::Io { .. })
        ));
        assert_eq!(llm.calls(), 0);
    }

    #[test]
    fn test_non_string_item_is_rejected() {
        let value = json!({"education": ["BSc", 3], "experience": [], "skills": []});
        match RequirementSet::from_value(&value) {
            Err(ExtractionError::InvalidRequirements { key, .. }) => assert_eq!(key, "education"),
            other => panic!("expected InvalidRequirements, got {other:?}"),
        }
    }

    #[test]
    fn test_non_object_value_is_missing_all_keys() {
        match RequirementSet::from_value(&json!(["BSc"])) {
            Err(ExtractionError::MissingKeys(keys)) => assert_eq!(keys.len(), 3),
            other => panic!("expected MissingKeys, got {other:?}"),
        }
    }

    #[test]
    fn test_storage_round_trip_preserves_order() {
        let requirements = RequirementSet {
            education: vec!["MSc".to_string(), "BSc".to_string()],
            experience: vec![],
            skills: vec!["Rust".to_string(), "C".to_string(), "Go".to_string()],
        };
        let stored = requirements.to_storage().unwrap();
        assert_eq!(RequirementSet::from_storage(&stored).unwrap(), requirements);

        let reordered = r#"{"skills":["Rust","C","Go"],"experience":[],"education":["MSc","BSc"]}"#;
        assert_eq!(RequirementSet::from_storage(reordered).unwrap(), requirements);
    }
}
