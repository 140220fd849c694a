use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};
use uuid::Uuid;

use crate::analysis::requirements::RequirementSet;
use crate::errors::AppError;
use crate::state::AppState;
use crate::store::documents as doc_store;

#[derive(Debug, Serialize)]
pub struct RequirementsResponse {
    pub jd_id: Uuid,
    pub jd_filename: String,
    pub requirements: RequirementSet,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequirementsRequest {
    pub requirements: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct ConfirmRequirementsResponse {
    pub message: String,
    pub jd_id: Uuid,
}

/// GET /api/v1/jd/:jd_id/requirements
/// Returns the stored requirement set, or an empty three-key set if none was stored.
pub async fn handle_get_requirements(
    State(state): State<AppState>,
    Path(jd_id): Path<Uuid>,
) -> Result<Json<RequirementsResponse>, AppError> {
    let jd = doc_store::get_job_description(&state.db, jd_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job description {jd_id} not found")))?;

    let requirements = match jd.requirements_json.as_deref() {
        Some(stored) => RequirementSet::from_storage(stored).map_err(|e| {
            error!("Stored requirements for JD {jd_id} are corrupt: {e}");
            anyhow::anyhow!("Stored requirements for JD {jd_id} could not be parsed")
        })?,
        None => RequirementSet::default(),
    };

    Ok(Json(RequirementsResponse {
        jd_id,
        jd_filename: jd.original_filename,
        requirements,
    }))
}

/// POST /api/v1/jd/:jd_id/requirements
/// Overwrites the confirmed requirement set with a user-edited one.
pub async fn handle_confirm_requirements(
    State(state): State<AppState>,
    Path(jd_id): Path<Uuid>,
    Json(req): Json<ConfirmRequirementsRequest>,
) -> Result<Json<ConfirmRequirementsResponse>, AppError> {
    let raw = req
        .requirements
        .ok_or_else(|| AppError::Validation("Invalid data: missing requirements".to_string()))?;
    let requirements = RequirementSet::from_value(&raw)
        .map_err(|e| AppError::Validation(format!("Invalid requirements structure: {e}")))?;

    if !doc_store::update_requirements(&state.db, jd_id, &requirements).await? {
        return Err(AppError::NotFound(format!("Job description {jd_id} not found")));
    }

    info!("Confirmed requirements saved for JD {jd_id}");
    Ok(Json(ConfirmRequirementsResponse {
        message: "Requirements confirmed and saved successfully".to_string(),
        jd_id,
    }))
}
