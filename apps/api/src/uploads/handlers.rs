use std::collections::BTreeMap;

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::requirements::RequirementSet;
use crate::errors::AppError;
use crate::state::AppState;
use crate::uploads::ingest::{ingest_cvs, ingest_job_description, UploadedBytes};

#[derive(Debug, Serialize)]
pub struct JdUploadResponse {
    pub message: String,
    pub jd_id: Uuid,
    pub parsed_requirements: RequirementSet,
}

#[derive(Debug, Serialize)]
pub struct CvUploadResponse {
    pub message: String,
    pub processed_cv_ids: Vec<Uuid>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<String, String>,
}

/// The fields of an upload form: the caller's identity and every file part
/// under the expected field name.
struct UploadForm {
    user_id: Uuid,
    files: Vec<UploadedBytes>,
}

async fn read_form(mut multipart: Multipart, file_field: &str) -> Result<UploadForm, AppError> {
    let mut user_id = None;
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        if name == "user_id" {
            let raw = field
                .text()
                .await
                .map_err(|e| AppError::Validation(format!("Unreadable user_id: {e}")))?;
            let parsed = Uuid::parse_str(raw.trim())
                .map_err(|_| AppError::Validation(format!("user_id '{raw}' is not a UUID")))?;
            user_id = Some(parsed);
        } else if name == file_field {
            let filename = field.file_name().unwrap_or("").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("Failed to read '{filename}': {e}")))?;
            if filename.is_empty() {
                warn!("Skipping unnamed file part in '{file_field}'");
                continue;
            }
            files.push(UploadedBytes { filename, bytes });
        } else {
            warn!("Ignoring unexpected multipart field '{name}'");
        }
    }

    let user_id = user_id.ok_or_else(|| AppError::Validation("Missing user_id field".to_string()))?;
    if files.is_empty() {
        return Err(AppError::Validation(format!(
            "No file provided. Use field name '{file_field}'"
        )));
    }
    Ok(UploadForm { user_id, files })
}

/// POST /api/v1/uploads/jd
/// Multipart `file` + `user_id`. Stores the job description and returns the
/// requirements extracted from it.
pub async fn handle_upload_jd(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<JdUploadResponse>), AppError> {
    let mut form = read_form(multipart, "file").await?;
    if form.files.len() > 1 {
        return Err(AppError::Validation(
            "Exactly one job description file is expected".to_string(),
        ));
    }
    let file = form.files.remove(0);

    let (jd_id, requirements) = ingest_job_description(&state, form.user_id, &file).await?;

    Ok((
        StatusCode::CREATED,
        Json(JdUploadResponse {
            message: "JD uploaded and processed successfully".to_string(),
            jd_id,
            parsed_requirements: requirements,
        }),
    ))
}

/// POST /api/v1/uploads/cvs
/// Multipart `files` (repeated) + `user_id`. Partial success is a 201 with an
/// `errors` map; only a total failure is an error response.
pub async fn handle_upload_cvs(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<CvUploadResponse>), AppError> {
    let form = read_form(multipart, "files").await?;
    info!("Received {} CV files from user {}", form.files.len(), form.user_id);

    let (processed_cv_ids, errors) = ingest_cvs(&state, form.user_id, &form.files).await;

    if processed_cv_ids.is_empty() {
        return Err(AppError::UploadFailed {
            message: "No CVs were successfully processed".to_string(),
            details: errors,
        });
    }

    let message = format!(
        "{} of {} CVs processed successfully",
        processed_cv_ids.len(),
        form.files.len()
    );
    Ok((
        StatusCode::CREATED,
        Json(CvUploadResponse {
            message,
            processed_cv_ids,
            errors,
        }),
    ))
}
