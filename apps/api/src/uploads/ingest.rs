//! Upload pipelines: stage → normalize → extract → persist.
//!
//! Intermediate files are tracked by a `CleanupGuard` and only survive once the
//! database rows pointing at them are committed.

use std::collections::BTreeMap;

use bytes::Bytes;
use tracing::{error, info};
use uuid::Uuid;

use crate::analysis::requirements::RequirementSet;
use crate::documents::extractor::extract_text_or_empty;
use crate::documents::{CleanupGuard, FormatConverter, NormalizedDocument, StagedFile, UploadStore};
use crate::errors::AppError;
use crate::models::documents::{FileKind, NewUpload};
use crate::state::AppState;
use crate::store::documents as doc_store;

/// One file part of a multipart request.
#[derive(Debug, Clone)]
pub struct UploadedBytes {
    pub filename: String,
    pub bytes: Bytes,
}

/// A staged and normalized upload whose files are removed on drop unless the
/// guard is disarmed.
pub struct PreparedDocument {
    pub staged: StagedFile,
    pub normalized: NormalizedDocument,
    pub guard: CleanupGuard,
}

impl PreparedDocument {
    fn new_upload(&self, user_id: Uuid, kind: FileKind) -> NewUpload {
        NewUpload {
            user_id,
            original_filename: self.staged.original_name.clone(),
            stored_path: self.staged.path.to_string_lossy().into_owned(),
            kind,
            extension: self.staged.extension.clone(),
            byte_size: self.staged.byte_size as i64,
        }
    }

    fn processed_path(&self) -> String {
        self.normalized.path.to_string_lossy().into_owned()
    }
}

/// Stages the bytes and converts them to PDF. Any failure removes whatever was
/// written so far.
pub async fn prepare_document(
    uploads: &UploadStore,
    converter: &FormatConverter,
    file: &UploadedBytes,
) -> Result<PreparedDocument, AppError> {
    let mut guard = CleanupGuard::new();
    let staged = uploads.stage(&file.filename, &file.bytes).await?;
    guard.track(&staged.path);

    let normalized = converter
        .convert(&staged.path, &uploads.processed_dir())
        .await?;
    guard.track(&normalized.path);

    Ok(PreparedDocument {
        staged,
        normalized,
        guard,
    })
}

/// Job description ingestion. All-or-nothing: any stage failing fails the
/// request and leaves no files or rows behind.
pub async fn ingest_job_description(
    state: &AppState,
    user_id: Uuid,
    file: &UploadedBytes,
) -> Result<(Uuid, RequirementSet), AppError> {
    info!("Ingesting job description '{}' for user {user_id}", file.filename);
    let prepared = prepare_document(&state.uploads, &state.converter, file).await?;

    let requirements = state.extractor.extract(&prepared.normalized.path).await?;
    let text = extract_text_or_empty(&prepared.staged.path).await;

    let jd_id = doc_store::insert_job_description(
        &state.db,
        &prepared.new_upload(user_id, FileKind::Jd),
        &prepared.processed_path(),
        &text,
        &requirements,
    )
    .await?;

    prepared.guard.disarm();
    info!("Job description {jd_id} stored for '{}'", file.filename);
    Ok((jd_id, requirements))
}

/// CV ingestion. Each file succeeds or fails on its own; failures are reported
/// per filename.
pub async fn ingest_cvs(
    state: &AppState,
    user_id: Uuid,
    files: &[UploadedBytes],
) -> (Vec<Uuid>, BTreeMap<String, String>) {
    let mut processed = Vec::new();
    let mut errors = BTreeMap::new();

    for file in files {
        match ingest_cv(state, user_id, file).await {
            Ok(cv_id) => processed.push(cv_id),
            Err(e) => {
                error!("CV upload '{}' failed: {e}", file.filename);
                errors.insert(file.filename.clone(), e.to_string());
            }
        }
    }

    info!(
        "CV upload for user {user_id}: {} processed, {} failed",
        processed.len(),
        errors.len()
    );
    (processed, errors)
}

async fn ingest_cv(state: &AppState, user_id: Uuid, file: &UploadedBytes) -> Result<Uuid, AppError> {
    if is_archive(&file.filename) {
        return Err(AppError::Validation(
            "Archive uploads are not supported; upload the CV files individually".to_string(),
        ));
    }
    let prepared = prepare_document(&state.uploads, &state.converter, file).await?;
    let text = extract_text_or_empty(&prepared.staged.path).await;

    let cv_id = doc_store::insert_cv_entry(
        &state.db,
        &prepared.new_upload(user_id, FileKind::Cv),
        &prepared.processed_path(),
        &text,
    )
    .await?;

    prepared.guard.disarm();
    Ok(cv_id)
}

fn is_archive(filename: &str) -> bool {
    filename.to_ascii_lowercase().ends_with(".zip")
}
