use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::analysis::batch::BatchStatus;
use crate::analysis::matcher::MatchVerdict;
use crate::models::analysis::{AnalysisResultRow, AnalysisSessionRow};
use crate::store::{NewSession, SessionStore};

#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create_session(&self, session: NewSession) -> Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO analysis_sessions
                (id, user_id, job_description_id, session_name, status, total_to_analyze, analyzed_count)
            VALUES ($1, $2, $3, $4, $5, $6, 0)
            "#,
        )
        .bind(id)
        .bind(session.user_id)
        .bind(session.jd_id)
        .bind(&session.name)
        .bind(BatchStatus::Processing.as_str())
        .bind(session.total_to_analyze as i32)
        .execute(&self.pool)
        .await
        .context("Failed to create analysis session")?;
        Ok(id)
    }

    async fn record_verdict(
        &self,
        session_id: Uuid,
        position: u32,
        cv_id: Uuid,
        verdict: &MatchVerdict,
    ) -> Result<u32> {
        let details = serde_json::to_string(&verdict.detailed_match_info)?;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO analysis_results
                (id, session_id, cv_entry_id, position, match_status, numerical_score,
                 explanation, detailed_match_info)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(session_id)
        .bind(cv_id)
        .bind(position as i32)
        .bind(verdict.match_status.as_str())
        .bind(verdict.numerical_score.map(i16::from))
        .bind(&verdict.explanation)
        .bind(&details)
        .execute(&mut *tx)
        .await?;

        // The guard keeps the counter within total_to_analyze even if a caller
        // records more verdicts than it declared.
        let count: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE analysis_sessions
            SET analyzed_count = analyzed_count + 1, updated_at = now()
            WHERE id = $1 AND analyzed_count < total_to_analyze
            RETURNING analyzed_count
            "#,
        )
        .bind(session_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(count) = count else {
            tx.rollback().await?;
            return Err(anyhow!(
                "Session {session_id} is missing or already has every verdict recorded"
            ));
        };

        tx.commit().await?;
        debug!("Session {session_id}: recorded verdict for CV {cv_id} ({count} analyzed)");
        Ok(count as u32)
    }

    async fn finalize_session(&self, session_id: Uuid, status: BatchStatus) -> Result<()> {
        let result = sqlx::query(
            "UPDATE analysis_sessions SET status = $2, updated_at = now() WHERE id = $1",
        )
        .bind(session_id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(anyhow!("Session {session_id} not found"));
        }
        Ok(())
    }
}

pub async fn get_session(pool: &PgPool, session_id: Uuid) -> Result<Option<AnalysisSessionRow>> {
    Ok(
        sqlx::query_as::<_, AnalysisSessionRow>("SELECT * FROM analysis_sessions WHERE id = $1")
            .bind(session_id)
            .fetch_optional(pool)
            .await?,
    )
}

/// Every verdict of a session, in the order the CVs were listed in the request.
pub async fn list_results(pool: &PgPool, session_id: Uuid) -> Result<Vec<AnalysisResultRow>> {
    Ok(sqlx::query_as::<_, AnalysisResultRow>(
        r#"
        SELECT r.cv_entry_id, u.original_filename, r.match_status, r.numerical_score,
               r.explanation, r.detailed_match_info, r.processed_at
        FROM analysis_results r
        JOIN cv_entries c ON c.id = r.cv_entry_id
        JOIN uploaded_files u ON u.id = c.uploaded_file_id
        WHERE r.session_id = $1
        ORDER BY r.position ASC
        "#,
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?)
}
