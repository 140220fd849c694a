use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Jd,
    Cv,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Jd => "jd",
            FileKind::Cv => "cv",
        }
    }
}

/// Metadata of a staged upload, ready to insert into `uploaded_files`.
#[derive(Debug, Clone)]
pub struct NewUpload {
    pub user_id: Uuid,
    pub original_filename: String,
    pub stored_path: String,
    pub kind: FileKind,
    pub extension: String,
    pub byte_size: i64,
}

/// A job description joined with the filename it was uploaded under.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobDescriptionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub original_filename: String,
    pub processed_file_path: String,
    pub requirements_json: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The parts of a CV entry the batch loop needs.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CvCandidateRow {
    pub id: Uuid,
    pub original_filename: String,
    pub processed_file_path: Option<String>,
}
