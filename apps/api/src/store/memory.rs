//! In-memory `SessionStore` for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use uuid::Uuid;

use crate::analysis::batch::BatchStatus;
use crate::analysis::matcher::MatchVerdict;
use crate::store::{NewSession, SessionStore};

#[derive(Debug, Clone)]
pub struct StoredSession {
    pub user_id: Uuid,
    pub jd_id: Uuid,
    pub name: String,
    pub status: BatchStatus,
    pub total_to_analyze: u32,
    pub analyzed_count: u32,
    pub verdicts: Vec<StoredVerdict>,
}

#[derive(Debug, Clone)]
pub struct StoredVerdict {
    pub position: u32,
    pub cv_id: Uuid,
    pub verdict: MatchVerdict,
}

#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<Uuid, StoredSession>>,
    failing_cvs: HashSet<Uuid>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `record_verdict` fail for this CV, leaving the session untouched.
    pub fn failing_for(mut self, cv_id: Uuid) -> Self {
        self.failing_cvs.insert(cv_id);
        self
    }

    pub fn session(&self, id: Uuid) -> Option<StoredSession> {
        self.sessions.read().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create_session(&self, session: NewSession) -> Result<Uuid> {
        let id = Uuid::new_v4();
        self.sessions.write().unwrap().insert(
            id,
            StoredSession {
                user_id: session.user_id,
                jd_id: session.jd_id,
                name: session.name,
                status: BatchStatus::Processing,
                total_to_analyze: session.total_to_analyze,
                analyzed_count: 0,
                verdicts: Vec::new(),
            },
        );
        Ok(id)
    }

    async fn record_verdict(
        &self,
        session_id: Uuid,
        position: u32,
        cv_id: Uuid,
        verdict: &MatchVerdict,
    ) -> Result<u32> {
        if self.failing_cvs.contains(&cv_id) {
            return Err(anyhow!("simulated commit failure for CV {cv_id}"));
        }
        let mut sessions = self.sessions.write().unwrap();
        let session = sessions
            .get_mut(&session_id)
            .ok_or_else(|| anyhow!("session {session_id} not found"))?;
        if session.analyzed_count >= session.total_to_analyze {
            return Err(anyhow!("session {session_id} is already fully analyzed"));
        }
        if session.verdicts.iter().any(|v| v.cv_id == cv_id) {
            return Err(anyhow!("duplicate verdict for CV {cv_id}"));
        }
        if session.verdicts.iter().any(|v| v.position == position) {
            return Err(anyhow!("position {position} already taken in session {session_id}"));
        }
        session.verdicts.push(StoredVerdict {
            position,
            cv_id,
            verdict: verdict.clone(),
        });
        session.analyzed_count += 1;
        Ok(session.analyzed_count)
    }

    async fn finalize_session(&self, session_id: Uuid, status: BatchStatus) -> Result<()> {
        let mut sessions = self.sessions.write().unwrap();
        let session = sessions
            .get_mut(&session_id)
            .ok_or_else(|| anyhow!("session {session_id} not found"))?;
        session.status = status;
        Ok(())
    }
}
