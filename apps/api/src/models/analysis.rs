use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AnalysisSessionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub job_description_id: Uuid,
    pub session_name: String,
    pub status: String,
    pub total_to_analyze: i32,
    pub analyzed_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A stored verdict joined with the CV's original filename.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AnalysisResultRow {
    pub cv_entry_id: Uuid,
    pub original_filename: String,
    pub match_status: String,
    pub numerical_score: Option<i16>,
    pub explanation: String,
    pub detailed_match_info: String,
    pub processed_at: DateTime<Utc>,
}
