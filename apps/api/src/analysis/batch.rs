//! Batch analysis: every candidate of a session goes through `MatchEngine` in
//! input order, and every candidate ends up with exactly one persisted verdict.
//!
//! ```text
//! processing ──(all candidates attempted)──► completed
//!                                          ├► completed_with_errors
//!                                          └► error
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::analysis::matcher::{MatchEngine, MatchStatus, MatchVerdict};
use crate::analysis::requirements::RequirementSet;
use crate::store::{NewSession, SessionStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Processing,
    Completed,
    CompletedWithErrors,
    Error,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Processing => "processing",
            BatchStatus::Completed => "completed",
            BatchStatus::CompletedWithErrors => "completed_with_errors",
            BatchStatus::Error => "error",
        }
    }

    /// Terminal status for a batch of `total` candidates of which `errors` failed.
    pub fn from_tally(total: usize, errors: usize) -> Self {
        if errors == 0 {
            BatchStatus::Completed
        } else if errors >= total {
            BatchStatus::Error
        } else {
            BatchStatus::CompletedWithErrors
        }
    }
}

/// One candidate to analyze. `document_path` is `None` when the CV entry never
/// got a normalized PDF.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub cv_id: Uuid,
    pub document_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidateSummary {
    pub cv_id: Uuid,
    pub match_status: MatchStatus,
    pub score: Option<u8>,
}

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub session_id: Uuid,
    pub status: BatchStatus,
    pub analyzed_count: u32,
    /// Candidates whose verdict was produced and persisted.
    pub results: Vec<CandidateSummary>,
    /// Per-candidate failure messages, keyed by CV id.
    pub errors: BTreeMap<Uuid, String>,
}

pub struct BatchOrchestrator {
    engine: Arc<MatchEngine>,
    store: Arc<dyn SessionStore>,
}

impl BatchOrchestrator {
    pub fn new(engine: Arc<MatchEngine>, store: Arc<dyn SessionStore>) -> Self {
        Self { engine, store }
    }

    /// Runs a whole batch. Per-candidate failures become Error verdicts; only
    /// session creation or the final status write can fail the call.
    pub async fn run(
        &self,
        user_id: Uuid,
        jd_id: Uuid,
        requirements: &RequirementSet,
        candidates: &[Candidate],
    ) -> Result<BatchOutcome> {
        let total = candidates.len();
        let session_id = self
            .store
            .create_session(NewSession {
                user_id,
                jd_id,
                name: format!("Analysis for JD {jd_id} with {total} CVs"),
                total_to_analyze: total as u32,
            })
            .await?;
        info!("Analysis session {session_id} created for JD {jd_id} with {total} CVs");

        let mut results = Vec::with_capacity(total);
        let mut errors = BTreeMap::new();
        let mut analyzed_count = 0;

        for (index, candidate) in candidates.iter().enumerate() {
            info!(
                "Session {session_id}: analyzing CV {} ({}/{total})",
                candidate.cv_id,
                index + 1
            );
            let verdict = self.analyze(candidate, requirements).await;

            match self
                .store
                .record_verdict(session_id, index as u32, candidate.cv_id, &verdict)
                .await
            {
                Ok(count) => {
                    analyzed_count = count;
                    if verdict.is_error() {
                        errors.insert(candidate.cv_id, verdict.explanation.clone());
                    } else {
                        results.push(CandidateSummary {
                            cv_id: candidate.cv_id,
                            match_status: verdict.match_status,
                            score: verdict.numerical_score,
                        });
                    }
                }
                Err(e) => {
                    error!(
                        "Session {session_id}: failed to persist verdict for CV {}: {e:#}",
                        candidate.cv_id
                    );
                    errors.insert(candidate.cv_id, format!("Failed to save result: {e}"));
                }
            }
        }

        let status = BatchStatus::from_tally(total, errors.len());
        self.store.finalize_session(session_id, status).await?;
        info!(
            "Session {session_id} finished as {} ({} errors)",
            status.as_str(),
            errors.len()
        );

        Ok(BatchOutcome {
            session_id,
            status,
            analyzed_count,
            results,
            errors,
        })
    }

    async fn analyze(&self, candidate: &Candidate, requirements: &RequirementSet) -> MatchVerdict {
        let Some(path) = &candidate.document_path else {
            warn!("CV {}: no processed PDF recorded", candidate.cv_id);
            return MatchVerdict::error("No processed PDF file recorded for this CV");
        };
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            warn!("CV {}: processed PDF not found at {}", candidate.cv_id, path.display());
            return MatchVerdict::error(format!(
                "Processed PDF file not found at {}",
                path.display()
            ));
        }

        match self.engine.match_candidate(path, requirements).await {
            Ok(verdict) => verdict,
            Err(e) => {
                error!("CV {}: analysis failed: {e}", candidate.cv_id);
                MatchVerdict::error(format!("LLM Analysis Error: {e}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::prompts::MATCH_PROMPT_TEMPLATE;
    use crate::llm_client::testing::ScriptedLlm;
    use crate::store::memory::MemorySessionStore;

    const MATCH: &str = r#"{"match_status": "Match", "numerical_score": 90, "explanation": "ok",
        "detailed_match_info": {"education_met": [], "education_missed": [], "experience_met": [],
        "experience_missed": [], "skills_met": ["Rust"], "skills_missed": []}}"#;
    const NO_MATCH: &str = r#"```json
{"match_status": "No Match", "numerical_score": 40, "explanation": "missing years",
 "detailed_match_info": {"education_met": [], "education_missed": [], "experience_met": [],
 "experience_missed": ["5+ years"], "skills_met": [], "skills_missed": []}}
```"#;

    struct Fixture {
        _dir: tempfile::TempDir,
        candidates: Vec<Candidate>,
    }

    fn fixture(n: usize) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let candidates = (0..n)
            .map(|i| {
                let path = dir.path().join(format!("cv{i}.pdf"));
                std::fs::write(&path, b"%PDF-1.4").unwrap();
                Candidate {
                    cv_id: Uuid::new_v4(),
                    document_path: Some(path),
                }
            })
            .collect();
        Fixture {
            _dir: dir,
            candidates,
        }
    }

    fn orchestrator(llm: ScriptedLlm, store: Arc<MemorySessionStore>) -> BatchOrchestrator {
        let engine = Arc::new(MatchEngine::new(Arc::new(llm), MATCH_PROMPT_TEMPLATE));
        BatchOrchestrator::new(engine, store)
    }

    #[test]
    fn test_from_tally() {
        assert_eq!(BatchStatus::from_tally(3, 0), BatchStatus::Completed);
        assert_eq!(BatchStatus::from_tally(3, 1), BatchStatus::CompletedWithErrors);
        assert_eq!(BatchStatus::from_tally(3, 3), BatchStatus::Error);
    }

    #[test]
    fn test_status_serde_names() {
        assert_eq!(
            serde_json::to_value(BatchStatus::CompletedWithErrors).unwrap(),
            "completed_with_errors"
        );
        assert_eq!(BatchStatus::CompletedWithErrors.as_str(), "completed_with_errors");
    }

    #[tokio::test]
    async fn test_batch_without_errors_completes() {
        let fx = fixture(3);
        let store = Arc::new(MemorySessionStore::new());
        let llm = ScriptedLlm::new().reply(MATCH).reply(NO_MATCH).reply(MATCH);

        let outcome = orchestrator(llm, store.clone())
            .run(Uuid::new_v4(), Uuid::new_v4(), &RequirementSet::default(), &fx.candidates)
            .await
            .unwrap();

        assert_eq!(outcome.status, BatchStatus::Completed);
        assert_eq!(outcome.analyzed_count, 3);
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.results[1].match_status, MatchStatus::NoMatch);
        assert_eq!(outcome.results[1].score, Some(40));

        let session = store.session(outcome.session_id).unwrap();
        assert_eq!(session.status, BatchStatus::Completed);
        assert_eq!(session.analyzed_count, 3);
        assert_eq!(session.verdicts.len(), 3);
        assert_eq!(session.name, format!("Analysis for JD {} with 3 CVs", session.jd_id));
    }

    #[tokio::test]
    async fn test_one_failure_completes_with_errors() {
        let fx = fixture(3);
        let store = Arc::new(MemorySessionStore::new());
        let llm = ScriptedLlm::new()
            .reply(MATCH)
            .fail(500, "upstream exploded")
            .reply(MATCH);

        let outcome = orchestrator(llm, store.clone())
            .run(Uuid::new_v4(), Uuid::new_v4(), &RequirementSet::default(), &fx.candidates)
            .await
            .unwrap();

        assert_eq!(outcome.status, BatchStatus::CompletedWithErrors);
        assert_eq!(outcome.analyzed_count, 3);
        assert_eq!(outcome.results.len(), 2);
        let failed = fx.candidates[1].cv_id;
        assert!(outcome.errors[&failed].contains("upstream exploded"));

        let session = store.session(outcome.session_id).unwrap();
        assert_eq!(session.verdicts.len(), 3);
        let stored = &session.verdicts[1];
        assert_eq!(stored.cv_id, failed);
        assert_eq!(stored.verdict.match_status, MatchStatus::Error);
        assert_eq!(stored.verdict.numerical_score, None);
    }

    #[tokio::test]
    async fn test_all_failures_is_error() {
        let mut fx = fixture(3);
        fx.candidates[0].document_path = None;
        fx.candidates[1].document_path = Some(PathBuf::from("/nonexistent/cv.pdf"));
        let store = Arc::new(MemorySessionStore::new());
        let llm = ScriptedLlm::new().reply("Sorry, I cannot help with that.");

        let outcome = orchestrator(llm, store.clone())
            .run(Uuid::new_v4(), Uuid::new_v4(), &RequirementSet::default(), &fx.candidates)
            .await
            .unwrap();

        assert_eq!(outcome.status, BatchStatus::Error);
        assert_eq!(outcome.analyzed_count, 3);
        assert_eq!(outcome.errors.len(), 3);
        assert!(outcome.results.is_empty());
        assert!(outcome.errors[&fx.candidates[1].cv_id].contains("/nonexistent/cv.pdf"));

        let session = store.session(outcome.session_id).unwrap();
        assert_eq!(session.verdicts.len(), 3);
        assert!(session.verdicts.iter().all(|v| v.verdict.is_error()));
    }

    #[tokio::test]
    async fn test_missing_documents_skip_the_llm() {
        let mut fx = fixture(2);
        fx.candidates[0].document_path = None;
        let store = Arc::new(MemorySessionStore::new());
        let llm = Arc::new(ScriptedLlm::new().reply(MATCH));
        let engine = Arc::new(MatchEngine::new(llm.clone(), MATCH_PROMPT_TEMPLATE));

        let outcome = BatchOrchestrator::new(engine, store)
            .run(Uuid::new_v4(), Uuid::new_v4(), &RequirementSet::default(), &fx.candidates)
            .await
            .unwrap();

        assert_eq!(llm.calls(), 1);
        assert_eq!(outcome.status, BatchStatus::CompletedWithErrors);
    }

    #[tokio::test]
    async fn test_persistence_failure_is_counted_and_batch_continues() {
        let fx = fixture(3);
        let store = Arc::new(MemorySessionStore::new().failing_for(fx.candidates[0].cv_id));
        let llm = ScriptedLlm::new().reply(MATCH).reply(MATCH).reply(MATCH);

        let outcome = orchestrator(llm, store.clone())
            .run(Uuid::new_v4(), Uuid::new_v4(), &RequirementSet::default(), &fx.candidates)
            .await
            .unwrap();

        assert_eq!(outcome.status, BatchStatus::CompletedWithErrors);
        assert_eq!(outcome.analyzed_count, 2);
        assert_eq!(outcome.results.len(), 2);
        assert!(outcome.errors[&fx.candidates[0].cv_id].starts_with("Failed to save result"));

        let session = store.session(outcome.session_id).unwrap();
        assert_eq!(session.verdicts.len(), 2);
        assert_eq!(session.status, BatchStatus::CompletedWithErrors);
        // The lost verdict leaves a gap; later candidates keep their request index.
        let positions: Vec<u32> = session.verdicts.iter().map(|v| v.position).collect();
        assert_eq!(positions, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_verdicts_carry_request_positions() {
        let fx = fixture(3);
        let store = Arc::new(MemorySessionStore::new());
        let llm = ScriptedLlm::new().reply(NO_MATCH).reply(MATCH).reply(NO_MATCH);

        let outcome = orchestrator(llm, store.clone())
            .run(Uuid::new_v4(), Uuid::new_v4(), &RequirementSet::default(), &fx.candidates)
            .await
            .unwrap();

        let session = store.session(outcome.session_id).unwrap();
        let recorded: Vec<(u32, Uuid)> = session
            .verdicts
            .iter()
            .map(|v| (v.position, v.cv_id))
            .collect();
        let expected: Vec<(u32, Uuid)> = fx
            .candidates
            .iter()
            .enumerate()
            .map(|(i, c)| (i as u32, c.cv_id))
            .collect();
        assert_eq!(recorded, expected);
    }
}
