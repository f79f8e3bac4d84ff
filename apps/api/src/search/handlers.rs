use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::embedding::handlers::{hydrate_hits, SimilarHit};
use crate::embedding::{top_k, EmbeddingProvider};
use crate::errors::AppError;
use crate::models::run::{RunRequest, SearchRun};
use crate::state::AppState;
use crate::store::{JobReader, RunStore};

/// POST /api/search/run — trigger a batch search across sources.
pub async fn handle_run_search(
    State(state): State<AppState>,
    Json(request): Json<RunRequest>,
) -> Result<Json<SearchRun>, AppError> {
    if request.max_pages == Some(0) {
        return Err(AppError::Validation(
            "max_pages must be at least 1".to_string(),
        ));
    }

    let run = state.orchestrator.run(&request).await?;
    Ok(Json(run))
}

fn default_runs_limit() -> i64 {
    20
}

#[derive(Debug, Deserialize)]
pub struct RunsParams {
    #[serde(default = "default_runs_limit")]
    pub limit: i64,
}

/// GET /api/search/runs — recent runs, newest first.
pub async fn handle_list_runs(
    State(state): State<AppState>,
    Query(params): Query<RunsParams>,
) -> Result<Json<Vec<SearchRun>>, AppError> {
    if !(1..=100).contains(&params.limit) {
        return Err(AppError::Validation(
            "limit must be between 1 and 100".to_string(),
        ));
    }
    Ok(Json(state.store.list_runs(params.limit).await?))
}

fn default_semantic_limit() -> usize {
    10
}

#[derive(Debug, Deserialize)]
pub struct SemanticParams {
    pub q: String,
    #[serde(default = "default_semantic_limit")]
    pub limit: usize,
}

/// GET /api/search/semantic — free-text retrieval over job embeddings.
pub async fn handle_semantic_search(
    State(state): State<AppState>,
    Query(params): Query<SemanticParams>,
) -> Result<Json<Vec<SimilarHit>>, AppError> {
    if params.q.trim().is_empty() {
        return Err(AppError::Validation("q must not be empty".to_string()));
    }
    if !(1..=100).contains(&params.limit) {
        return Err(AppError::Validation(
            "limit must be between 1 and 100".to_string(),
        ));
    }

    let query_vector = state
        .embedder
        .embed(params.q.trim())
        .await
        .map_err(|e| AppError::ExternalService(e.to_string()))?;

    let items = state.store.embedded_canonicals().await?;
    let hits = top_k(&query_vector, &items, params.limit, None);

    hydrate_hits(&state, hits).await
}
