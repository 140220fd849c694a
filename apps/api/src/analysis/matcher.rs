//! Candidate matching: one CV PDF against one `RequirementSet`, one LLM call.
//!
//! The match/no-match decision boundary lives in the instruction template, not
//! here. This module only builds the request and validates what comes back.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::analysis::prompts::build_match_prompt;
use crate::analysis::requirements::RequirementSet;
use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::response::{
    missing_keys, parse_object, snippet, strip_code_fence, unwrap_doubled_braces,
};
use crate::llm_client::{LlmBackend, LlmError, LlmRequest};

const VERDICT_KEYS: [&str; 4] = [
    "match_status",
    "numerical_score",
    "explanation",
    "detailed_match_info",
];

const DETAIL_KEYS: [&str; 6] = [
    "education_met",
    "education_missed",
    "experience_met",
    "experience_missed",
    "skills_met",
    "skills_missed",
];

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Could not read candidate document {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("LLM response is not valid JSON: {0}")]
    MalformedResponse(String),

    #[error("LLM response is missing required keys: {}", .0.join(", "))]
    MissingKeys(Vec<&'static str>),

    #[error("LLM response detailed_match_info is missing keys: {}", .0.join(", "))]
    MissingDetailKeys(Vec<&'static str>),

    #[error("Invalid '{field}' in LLM response: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> AnalysisError {
    AnalysisError::InvalidField {
        field,
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStatus {
    #[serde(rename = "Match")]
    Match,
    #[serde(rename = "No Match")]
    NoMatch,
    Error,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Match => "Match",
            MatchStatus::NoMatch => "No Match",
            MatchStatus::Error => "Error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Match" => Some(MatchStatus::Match),
            "No Match" => Some(MatchStatus::NoMatch),
            "Error" => Some(MatchStatus::Error),
            _ => None,
        }
    }
}

/// Per-category breakdown of which requirements the candidate met or missed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailedMatchInfo {
    pub education_met: Vec<String>,
    pub education_missed: Vec<String>,
    pub experience_met: Vec<String>,
    pub experience_missed: Vec<String>,
    pub skills_met: Vec<String>,
    pub skills_missed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchVerdict {
    pub match_status: MatchStatus,
    /// 0-100. `None` only for `MatchStatus::Error`.
    pub numerical_score: Option<u8>,
    pub explanation: String,
    pub detailed_match_info: DetailedMatchInfo,
}

impl MatchVerdict {
    /// Verdict recorded for a candidate that could not be analyzed.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            match_status: MatchStatus::Error,
            numerical_score: None,
            explanation: message.into(),
            detailed_match_info: DetailedMatchInfo::default(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.match_status == MatchStatus::Error
    }
}

/// Repairs, parses, and validates raw match output.
pub fn parse_verdict(raw: &str) -> Result<MatchVerdict, AnalysisError> {
    let repaired = unwrap_doubled_braces(strip_code_fence(raw));
    let object = parse_object(repaired).map_err(|e| {
        warn!("Match response is not a JSON object: {e}. Raw: {}", snippet(raw, 200));
        AnalysisError::MalformedResponse(e.to_string())
    })?;

    let missing = missing_keys(&object, &VERDICT_KEYS);
    if !missing.is_empty() {
        return Err(AnalysisError::MissingKeys(missing));
    }

    let match_status = match object.get("match_status") {
        Some(Value::String(s)) => match MatchStatus::parse(s) {
            Some(status @ (MatchStatus::Match | MatchStatus::NoMatch)) => status,
            _ => return Err(invalid("match_status", format!("'{s}' is not \"Match\" or \"No Match\""))),
        },
        _ => return Err(invalid("match_status", "expected a string")),
    };

    let numerical_score = match object.get("numerical_score").and_then(Value::as_f64) {
        Some(score) if (0.0..=100.0).contains(&score) => score.round() as u8,
        Some(score) => return Err(invalid("numerical_score", format!("{score} is outside 0-100"))),
        None => return Err(invalid("numerical_score", "expected a number")),
    };

    let explanation = match object.get("explanation") {
        Some(Value::String(s)) => s.clone(),
        _ => return Err(invalid("explanation", "expected a string")),
    };

    let details = match object.get("detailed_match_info") {
        Some(Value::Object(details)) => details,
        _ => return Err(invalid("detailed_match_info", "expected an object")),
    };
    let missing = missing_keys(details, &DETAIL_KEYS);
    if !missing.is_empty() {
        return Err(AnalysisError::MissingDetailKeys(missing));
    }

    Ok(MatchVerdict {
        match_status,
        numerical_score: Some(numerical_score),
        explanation,
        detailed_match_info: DetailedMatchInfo {
            education_met: detail_list(details, "education_met")?,
            education_missed: detail_list(details, "education_missed")?,
            experience_met: detail_list(details, "experience_met")?,
            experience_missed: detail_list(details, "experience_missed")?,
            skills_met: detail_list(details, "skills_met")?,
            skills_missed: detail_list(details, "skills_missed")?,
        },
    })
}

fn detail_list(details: &Map<String, Value>, key: &'static str) -> Result<Vec<String>, AnalysisError> {
    match details.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_owned)
                    .ok_or_else(|| invalid(key, "expected a list of strings"))
            })
            .collect(),
        Some(_) => Err(invalid(key, "expected a list of strings")),
    }
}

pub struct MatchEngine {
    llm: Arc<dyn LlmBackend>,
    template: String,
}

impl MatchEngine {
    /// `template` must contain the `{requirements}` placeholder.
    pub fn new(llm: Arc<dyn LlmBackend>, template: impl Into<String>) -> Self {
        Self {
            llm,
            template: template.into(),
        }
    }

    pub async fn match_candidate(
        &self,
        cv_pdf: &Path,
        requirements: &RequirementSet,
    ) -> Result<MatchVerdict, AnalysisError> {
        let document = tokio::fs::read(cv_pdf)
            .await
            .map_err(|e| AnalysisError::Io {
                path: cv_pdf.to_path_buf(),
                source: e,
            })?;
        let prompt = build_match_prompt(&self.template, requirements);

        let raw = self
            .llm
            .complete(LlmRequest {
                document: Some(&document),
                instructions: &prompt,
                system: Some(JSON_ONLY_SYSTEM),
            })
            .await?;

        let verdict = parse_verdict(&raw)?;
        info!(
            "Matched {}: {} ({})",
            cv_pdf.display(),
            verdict.match_status.as_str(),
            verdict.numerical_score.unwrap_or_default()
        );
        Ok(verdict)
    }
}
