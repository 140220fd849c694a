mod analysis;
mod config;
mod db;
mod documents;
mod errors;
mod jd;
mod llm_client;
mod models;
mod routes;
mod state;
mod store;
mod uploads;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::matcher::MatchEngine;
use crate::analysis::requirements::RequirementExtractor;
use crate::config::{Config, PromptTemplates};
use crate::db::create_pool;
use crate::documents::{FormatConverter, OfficeCommand, UploadStore};
use crate::llm_client::{LlmBackend, LlmClient};
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::PgSessionStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CV Match API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL and apply migrations
    let db = create_pool(&config.database_url).await?;

    // Upload directory
    let uploads = UploadStore::new(&config.upload_dir);
    uploads.ensure_dirs().await?;
    info!("Upload directory: {}", uploads.root().display());

    // Document conversion
    let converter = FormatConverter::new(
        OfficeCommand::new(&config.office_converter_bin),
        config.conversion_timeout(),
    );

    // LLM client and prompt templates
    let llm_client = LlmClient::new(config.llm_config())?;
    info!("LLM client initialized (model: {})", llm_client.model());
    let llm: Arc<dyn LlmBackend> = Arc::new(llm_client);
    let prompts = PromptTemplates::load(&config)?;

    // Build app state
    let state = AppState {
        sessions: Arc::new(PgSessionStore::new(db.clone())),
        db,
        uploads,
        converter,
        extractor: Arc::new(RequirementExtractor::new(llm.clone(), prompts.jd_extraction)),
        engine: Arc::new(MatchEngine::new(llm, prompts.candidate_match)),
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
