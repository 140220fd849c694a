use std::sync::Arc;

use sqlx::PgPool;

use crate::analysis::matcher::MatchEngine;
use crate::analysis::requirements::RequirementExtractor;
use crate::config::Config;
use crate::documents::{FormatConverter, UploadStore};
use crate::store::SessionStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub uploads: UploadStore,
    pub converter: FormatConverter,
    pub extractor: Arc<RequirementExtractor>,
    pub engine: Arc<MatchEngine>,
    /// Batch persistence. `PgSessionStore` over `db` outside of tests.
    pub sessions: Arc<dyn SessionStore>,
}
