use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};
use uuid::Uuid;

use crate::analysis::batch::{
    BatchOrchestrator, BatchOutcome, BatchStatus, Candidate, CandidateSummary,
};
use crate::analysis::requirements::RequirementSet;
use crate::errors::AppError;
use crate::state::AppState;
use crate::store::{documents as doc_store, sessions};

#[derive(Debug, Deserialize)]
pub struct StartAnalysisRequest {
    pub user_id: Uuid,
    pub jd_id: Uuid,
    pub cv_entry_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct StartAnalysisResponse {
    pub message: String,
    pub analysis_session_id: Uuid,
    pub status: BatchStatus,
    pub total_cvs_to_analyze: usize,
    /// Verdicts actually persisted. Below the total only when a save failed.
    pub cvs_analyzed_count: u32,
    pub results_summary: Vec<CandidateSummary>,
    /// `null` when every candidate succeeded.
    pub errors: Option<BTreeMap<Uuid, String>>,
}

#[derive(Debug, Serialize)]
pub struct ResultEntry {
    pub cv_id: Uuid,
    pub original_filename: String,
    pub match_status: String,
    pub numerical_score: Option<i16>,
    pub explanation: String,
    pub detailed_match_info: Value,
    pub processed_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct SessionResultsResponse {
    pub analysis_session_id: Uuid,
    pub session_name: String,
    pub jd_id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub total_cvs_to_analyze: i32,
    pub cvs_analyzed_count: i32,
    pub results: Vec<ResultEntry>,
}

#[derive(Debug, Serialize)]
pub struct SessionStatusResponse {
    pub analysis_session_id: Uuid,
    pub status: String,
    pub total_cvs_to_analyze: i32,
    pub cvs_analyzed_count: i32,
    pub created_at: DateTime<Utc>,
}

impl StartAnalysisResponse {
    fn from_outcome(outcome: BatchOutcome, total: usize) -> Self {
        Self {
            message: "Analysis process initiated and completed.".to_string(),
            analysis_session_id: outcome.session_id,
            status: outcome.status,
            total_cvs_to_analyze: total,
            cvs_analyzed_count: outcome.analyzed_count,
            results_summary: outcome.results,
            errors: (!outcome.errors.is_empty()).then_some(outcome.errors),
        }
    }
}

/// Rejects an empty list or one that names the same CV twice.
fn validate_cv_ids(cv_ids: &[Uuid]) -> Result<(), AppError> {
    if cv_ids.is_empty() {
        return Err(AppError::Validation("No CVs provided for analysis".to_string()));
    }
    let mut seen = HashSet::with_capacity(cv_ids.len());
    let duplicates: Vec<String> = cv_ids
        .iter()
        .filter(|id| !seen.insert(**id))
        .map(Uuid::to_string)
        .collect();
    if !duplicates.is_empty() {
        return Err(AppError::Validation(format!(
            "Duplicate CV ids in request: {}",
            duplicates.join(", ")
        )));
    }
    Ok(())
}

/// POST /api/v1/analysis/start
/// Runs the whole batch synchronously and reports per-candidate outcomes.
pub async fn handle_start_analysis(
    State(state): State<AppState>,
    Json(req): Json<StartAnalysisRequest>,
) -> Result<(StatusCode, Json<StartAnalysisResponse>), AppError> {
    validate_cv_ids(&req.cv_entry_ids)?;

    let jd = doc_store::get_job_description(&state.db, req.jd_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job description {} not found", req.jd_id)))?;
    let stored = jd.requirements_json.as_deref().ok_or_else(|| {
        AppError::UnprocessableEntity(format!(
            "Job description {} has no confirmed requirements. Re-upload and confirm the JD.",
            req.jd_id
        ))
    })?;
    let requirements = RequirementSet::from_storage(stored).map_err(|e| {
        error!("Stored requirements for JD {} are corrupt: {e}", req.jd_id);
        anyhow::anyhow!("Failed to parse stored JD requirements")
    })?;

    let rows = doc_store::get_cv_candidates(&state.db, &req.cv_entry_ids).await?;
    let mut by_id: HashMap<Uuid, Option<String>> = rows
        .into_iter()
        .map(|row| (row.id, row.processed_file_path))
        .collect();
    let missing: Vec<String> = req
        .cv_entry_ids
        .iter()
        .filter(|id| !by_id.contains_key(*id))
        .map(Uuid::to_string)
        .collect();
    if !missing.is_empty() {
        return Err(AppError::NotFound(format!(
            "One or more CV entries not found: {}",
            missing.join(", ")
        )));
    }

    let candidates: Vec<Candidate> = req
        .cv_entry_ids
        .iter()
        .map(|id| Candidate {
            cv_id: *id,
            document_path: by_id.remove(id).flatten().map(PathBuf::from),
        })
        .collect();

    let orchestrator = BatchOrchestrator::new(state.engine.clone(), state.sessions.clone());
    let outcome = orchestrator
        .run(req.user_id, req.jd_id, &requirements, &candidates)
        .await?;

    info!(
        "Analysis session {} returned {} results and {} errors",
        outcome.session_id,
        outcome.results.len(),
        outcome.errors.len()
    );
    Ok((
        StatusCode::CREATED,
        Json(StartAnalysisResponse::from_outcome(outcome, candidates.len())),
    ))
}

/// GET /api/v1/analysis/results/:session_id
pub async fn handle_get_results(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionResultsResponse>, AppError> {
    let session = sessions::get_session(&state.db, session_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Analysis session {session_id} not found")))?;
    let rows = sessions::list_results(&state.db, session_id).await?;

    let results = rows
        .into_iter()
        .map(|row| ResultEntry {
            cv_id: row.cv_entry_id,
            original_filename: row.original_filename,
            match_status: row.match_status,
            numerical_score: row.numerical_score,
            explanation: row.explanation,
            detailed_match_info: serde_json::from_str(&row.detailed_match_info)
                .unwrap_or(Value::Null),
            processed_at: row.processed_at,
        })
        .collect();

    Ok(Json(SessionResultsResponse {
        analysis_session_id: session.id,
        session_name: session.session_name,
        jd_id: session.job_description_id,
        status: session.status,
        created_at: session.created_at,
        total_cvs_to_analyze: session.total_to_analyze,
        cvs_analyzed_count: session.analyzed_count,
        results,
    }))
}

/// GET /api/v1/analysis/status/:session_id
pub async fn handle_get_status(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionStatusResponse>, AppError> {
    let session = sessions::get_session(&state.db, session_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Analysis session {session_id} not found")))?;

    Ok(Json(SessionStatusResponse {
        analysis_session_id: session.id,
        status: session.status,
        total_cvs_to_analyze: session.total_to_analyze,
        cvs_analyzed_count: session.analyzed_count,
        created_at: session.created_at,
    }))
}
