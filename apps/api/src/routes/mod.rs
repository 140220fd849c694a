pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::analysis::handlers as analysis;
use crate::jd::handlers as jd;
use crate::state::AppState;
use crate::uploads::handlers as uploads;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health::health_handler))
        // Uploads
        .route("/api/v1/uploads/jd", post(uploads::handle_upload_jd))
        .route("/api/v1/uploads/cvs", post(uploads::handle_upload_cvs))
        // Job description requirements
        .route(
            "/api/v1/jd/:jd_id/requirements",
            get(jd::handle_get_requirements).post(jd::handle_confirm_requirements),
        )
        // Analysis
        .route("/api/v1/analysis/start", post(analysis::handle_start_analysis))
        .route(
            "/api/v1/analysis/results/:session_id",
            get(analysis::handle_get_results),
        )
        .route(
            "/api/v1/analysis/status/:session_id",
            get(analysis::handle_get_status),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
