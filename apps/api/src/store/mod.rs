//! Persistence for uploads, job descriptions, and analysis sessions.
//!
//! The batch loop writes through the `SessionStore` trait so it can run against
//! Postgres in production and an in-memory store in tests. Reads and upload
//! inserts are plain functions over the pool.

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::analysis::batch::BatchStatus;
use crate::analysis::matcher::MatchVerdict;

pub mod documents;
#[cfg(test)]
pub mod memory;
pub mod sessions;

pub use sessions::PgSessionStore;

/// A session about to be created in `processing` state with a zero count.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: Uuid,
    pub jd_id: Uuid,
    pub name: String,
    pub total_to_analyze: u32,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Creates the session and returns its id.
    async fn create_session(&self, session: NewSession) -> Result<Uuid>;

    /// Inserts one verdict and increments `analyzed_count` as a single unit.
    /// `position` is the candidate's index in the request and fixes the order
    /// results are listed in. Returns the count after the increment. On error
    /// nothing is applied.
    async fn record_verdict(
        &self,
        session_id: Uuid,
        position: u32,
        cv_id: Uuid,
        verdict: &MatchVerdict,
    ) -> Result<u32>;

    /// Writes the terminal status. Last write of a batch.
    async fn finalize_session(&self, session_id: Uuid, status: BatchStatus) -> Result<()>;
}
