use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::embedding::{self, job_to_text, top_k, BatchEmbedResult, EmbeddingProvider};
use crate::errors::AppError;
use crate::models::job::Job;
use crate::models::MessageResponse;
use crate::state::AppState;
use crate::store::{JobReader, JobWriter};

/// POST /api/jobs/:id/embed — (re)compute one job's embedding.
pub async fn handle_embed_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let job = state
        .store
        .get_job(&job_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job not found: {job_id}")))?;

    let vector = state
        .embedder
        .embed(&job_to_text(&job))
        .await
        .map_err(|e| AppError::ExternalService(e.to_string()))?;
    state.store.set_embedding(&job_id, &vector).await?;

    Ok(Json(MessageResponse::new(format!("Job {job_id} embedded"))))
}

#[derive(Debug, Default, Deserialize)]
pub struct EmbedBatchRequest {
    /// Explicit jobs to embed; omitted means every job without an embedding.
    pub job_ids: Option<Vec<String>>,
}

/// POST /api/jobs/embed — batch embedding. Jobs that already carry an
/// embedding are untouched unless explicitly listed.
pub async fn handle_embed_batch(
    State(state): State<AppState>,
    Json(request): Json<EmbedBatchRequest>,
) -> Result<Json<BatchEmbedResult>, AppError> {
    let job_ids = match request.job_ids {
        Some(ids) if !ids.is_empty() => ids,
        _ => state.store.unembedded_ids().await?,
    };

    let result =
        embedding::embed_jobs(state.store.as_ref(), state.embedder.as_ref(), job_ids).await;
    Ok(Json(result))
}

fn default_limit() -> usize {
    10
}

#[derive(Debug, Deserialize)]
pub struct SimilarParams {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

#[derive(Debug, Serialize)]
pub struct SimilarHit {
    pub job: Job,
    pub score: f32,
}

/// GET /api/jobs/:id/similar — nearest neighbors of a stored job.
pub async fn handle_similar_jobs(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    Query(params): Query<SimilarParams>,
) -> Result<Json<Vec<SimilarHit>>, AppError> {
    if !(1..=100).contains(&params.limit) {
        return Err(AppError::Validation(
            "limit must be between 1 and 100".to_string(),
        ));
    }

    let job = state
        .store
        .get_job(&job_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job not found: {job_id}")))?;

    // Compute on demand when the job was never embedded, and keep the result.
    let query_vector = match state.store.job_embedding(&job_id).await? {
        Some(vector) => vector,
        None => {
            let vector = state
                .embedder
                .embed(&job_to_text(&job))
                .await
                .map_err(|e| AppError::ExternalService(e.to_string()))?;
            state.store.set_embedding(&job_id, &vector).await?;
            vector
        }
    };

    let items = state.store.embedded_canonicals().await?;
    let hits = top_k(&query_vector, &items, params.limit, Some(&job_id));

    hydrate_hits(&state, hits).await
}

pub(crate) async fn hydrate_hits(
    state: &AppState,
    hits: Vec<embedding::SimilarJob>,
) -> Result<Json<Vec<SimilarHit>>, AppError> {
    let mut results = Vec::with_capacity(hits.len());
    for hit in hits {
        if let Some(job) = state.store.get_job(&hit.job_id).await? {
            results.push(SimilarHit {
                job,
                score: hit.score,
            });
        }
    }
    Ok(Json(results))
}
