mod applications;
mod config;
mod db;
mod dedup;
mod embedding;
mod errors;
mod jobs;
mod llm;
mod models;
mod profile;
mod routes;
mod scoring;
mod scrapers;
mod search;
mod state;
mod store;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::{create_pool, init_schema};
use crate::embedding::{EmbeddingProvider, FastembedProvider};
use crate::routes::build_router;
use crate::scoring::Scorer;
use crate::search::SearchOrchestrator;
use crate::state::AppState;
use crate::store::pg::PgStore;
use crate::store::JobStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails fast on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    let default_filter = format!(
        "{}={}",
        env!("CARGO_PKG_NAME").replace('-', "_"),
        &config.rust_log
    );
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Canopy API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL and bootstrap the schema
    let db = create_pool(&config.database_url).await?;
    init_schema(&db).await?;

    let store: Arc<dyn JobStore> = Arc::new(PgStore::new(db.clone()));

    // Rubric evaluator backend, chosen once from config
    let llm = llm::build_provider(&config);
    info!("LLM provider initialized");

    // Local embedding model (all-MiniLM-L6-v2)
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(FastembedProvider::new()?);

    let scorer = Arc::new(Scorer::new(Arc::clone(&llm), config.score_max_attempts));

    // Source adapters, composed into the orchestrator by name
    let adapters = scrapers::build_adapters(&config);
    info!("Registered {} source adapters", adapters.len());

    let orchestrator = Arc::new(SearchOrchestrator::new(
        Arc::clone(&store),
        Arc::clone(&scorer),
        Arc::clone(&embedder),
        adapters,
        config.max_source_concurrency,
        config.scoring_concurrency,
        config.fuzzy_title_threshold,
        config.auto_embed,
    ));

    let state = AppState {
        db,
        store,
        scorer,
        embedder,
        orchestrator,
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
