use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::job::{Job, JobFilter, JobList, JobUpdate};
use crate::models::MessageResponse;
use crate::state::AppState;
use crate::store::{JobReader, JobWriter};

fn validate_paging(page: i64, page_size: i64) -> Result<(), AppError> {
    if page < 1 {
        return Err(AppError::Validation("page must be at least 1".to_string()));
    }
    if !(1..=100).contains(&page_size) {
        return Err(AppError::Validation(
            "page_size must be between 1 and 100".to_string(),
        ));
    }
    Ok(())
}

/// GET /api/jobs
pub async fn handle_list_jobs(
    State(state): State<AppState>,
    Query(filter): Query<JobFilter>,
) -> Result<Json<JobList>, AppError> {
    validate_paging(filter.page, filter.page_size)?;
    if let Some(min_score) = filter.min_score {
        if !(0.0..=100.0).contains(&min_score) {
            return Err(AppError::Validation(
                "min_score must be between 0 and 100".to_string(),
            ));
        }
    }
    Ok(Json(state.store.list_jobs(&filter).await?))
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    20
}

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

/// GET /api/jobs/search — keyword full-text search.
pub async fn handle_search_jobs(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<JobList>, AppError> {
    if params.q.trim().is_empty() {
        return Err(AppError::Validation("q must not be empty".to_string()));
    }
    validate_paging(params.page, params.page_size)?;
    Ok(Json(
        state
            .store
            .search_jobs(params.q.trim(), params.page, params.page_size)
            .await?,
    ))
}

/// GET /api/jobs/:id
pub async fn handle_get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<Job>, AppError> {
    let job = state
        .store
        .get_job(&job_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job not found: {job_id}")))?;
    Ok(Json(job))
}

/// PATCH /api/jobs/:id — status and/or notes only; everything else on a job
/// is computed by the pipeline.
pub async fn handle_update_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    Json(update): Json<JobUpdate>,
) -> Result<Json<Job>, AppError> {
    let job = state
        .store
        .update_job(&job_id, &update)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job not found: {job_id}")))?;
    Ok(Json(job))
}

/// DELETE /api/jobs/:id
pub async fn handle_delete_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    if !state.store.delete_job(&job_id).await? {
        return Err(AppError::NotFound(format!("Job not found: {job_id}")));
    }
    Ok(Json(MessageResponse::new(format!("Job {job_id} deleted"))))
}
