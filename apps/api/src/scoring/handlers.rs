use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::job::Job;
use crate::scoring::{self, BatchScoreResult};
use crate::state::AppState;
use crate::store::{JobReader, JobWriter, ProfileStore};

/// POST /api/jobs/:id/score — score one job immediately.
pub async fn handle_score_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<Job>, AppError> {
    let job = state
        .store
        .get_job(&job_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job not found: {job_id}")))?;
    let profile = state.store.load_profile().await?;

    match state.scorer.score(&job, &profile).await {
        Ok(outcome) => {
            state
                .store
                .set_fit_score(&job_id, outcome.fit_score, &outcome.rationale)
                .await?;
        }
        Err(e) => {
            state.store.mark_score_failed(&job_id).await?;
            return Err(AppError::ExternalService(e.to_string()));
        }
    }

    let job = state
        .store
        .get_job(&job_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job not found: {job_id}")))?;
    Ok(Json(job))
}

#[derive(Debug, Default, Deserialize)]
pub struct ScoreBatchRequest {
    /// Explicit jobs to score; omitted means every unscored canonical job.
    pub job_ids: Option<Vec<String>>,
}

/// POST /api/jobs/score — batch scoring with a structured succeeded/failed
/// result; individual failures never abort the batch.
pub async fn handle_score_batch(
    State(state): State<AppState>,
    Json(request): Json<ScoreBatchRequest>,
) -> Result<Json<BatchScoreResult>, AppError> {
    let job_ids = match request.job_ids {
        Some(ids) if !ids.is_empty() => ids,
        _ => state.store.unscored_canonical_ids().await?,
    };
    let profile = state.store.load_profile().await?;

    let result = scoring::score_jobs(
        state.store.as_ref(),
        &state.scorer,
        &profile,
        job_ids,
        state.config.scoring_concurrency,
    )
    .await;

    Ok(Json(result))
}
