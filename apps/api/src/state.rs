use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::embedding::EmbeddingProvider;
use crate::scoring::Scorer;
use crate::search::SearchOrchestrator;
use crate::store::JobStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// The transactional job store; every pipeline component goes through it.
    pub store: Arc<dyn JobStore>,
    pub scorer: Arc<Scorer>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub orchestrator: Arc<SearchOrchestrator>,
    pub config: Config,
}
