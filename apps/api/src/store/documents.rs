use anyhow::Result;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::analysis::requirements::RequirementSet;
use crate::models::documents::{CvCandidateRow, JobDescriptionRow, NewUpload};

async fn insert_upload(tx: &mut Transaction<'_, Postgres>, upload: &NewUpload) -> Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO uploaded_files
            (id, user_id, original_filename, stored_path, file_kind, file_extension, byte_size)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(id)
    .bind(upload.user_id)
    .bind(&upload.original_filename)
    .bind(&upload.stored_path)
    .bind(upload.kind.as_str())
    .bind(&upload.extension)
    .bind(upload.byte_size)
    .execute(&mut **tx)
    .await?;
    Ok(id)
}

/// Inserts the upload and its job description in one transaction.
pub async fn insert_job_description(
    pool: &PgPool,
    upload: &NewUpload,
    processed_file_path: &str,
    extracted_text: &str,
    requirements: &RequirementSet,
) -> Result<Uuid> {
    let requirements_json = requirements.to_storage()?;
    let mut tx = pool.begin().await?;
    let file_id = insert_upload(&mut tx, upload).await?;

    let jd_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO job_descriptions
            (id, user_id, uploaded_file_id, processed_file_path, extracted_text, requirements_json)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(jd_id)
    .bind(upload.user_id)
    .bind(file_id)
    .bind(processed_file_path)
    .bind(extracted_text)
    .bind(&requirements_json)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(jd_id)
}

/// Inserts the upload and its CV entry in one transaction.
pub async fn insert_cv_entry(
    pool: &PgPool,
    upload: &NewUpload,
    processed_file_path: &str,
    extracted_text: &str,
) -> Result<Uuid> {
    let mut tx = pool.begin().await?;
    let file_id = insert_upload(&mut tx, upload).await?;

    let cv_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO cv_entries (id, user_id, uploaded_file_id, processed_file_path, extracted_text)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(cv_id)
    .bind(upload.user_id)
    .bind(file_id)
    .bind(processed_file_path)
    .bind(extracted_text)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(cv_id)
}

pub async fn get_job_description(pool: &PgPool, jd_id: Uuid) -> Result<Option<JobDescriptionRow>> {
    Ok(sqlx::query_as::<_, JobDescriptionRow>(
        r#"
        SELECT j.id, j.user_id, u.original_filename, j.processed_file_path,
               j.requirements_json, j.created_at, j.updated_at
        FROM job_descriptions j
        JOIN uploaded_files u ON u.id = j.uploaded_file_id
        WHERE j.id = $1
        "#,
    )
    .bind(jd_id)
    .fetch_optional(pool)
    .await?)
}

/// Overwrites the confirmed requirement set. Returns false if the JD does not exist.
pub async fn update_requirements(
    pool: &PgPool,
    jd_id: Uuid,
    requirements: &RequirementSet,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE job_descriptions SET requirements_json = $2, updated_at = now() WHERE id = $1",
    )
    .bind(jd_id)
    .bind(requirements.to_storage()?)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Loads the requested CV entries. Missing ids are simply absent from the result.
pub async fn get_cv_candidates(pool: &PgPool, cv_ids: &[Uuid]) -> Result<Vec<CvCandidateRow>> {
    Ok(sqlx::query_as::<_, CvCandidateRow>(
        r#"
        SELECT c.id, u.original_filename, c.processed_file_path
        FROM cv_entries c
        JOIN uploaded_files u ON u.id = c.uploaded_file_id
        WHERE c.id = ANY($1)
        "#,
    )
    .bind(cv_ids)
    .fetch_all(pool)
    .await?)
}
