//! Application tracking endpoints.
//!
//! Resume tailoring and cover-letter generation happen in external
//! collaborators; this module only stores and serves what they produce.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};

use crate::errors::AppError;
use crate::models::application::{Application, ApplicationCreate, ApplicationUpdate};
use crate::state::AppState;
use crate::store::JobReader;

const APPLICATION_COLUMNS: &str = "id, job_id, resume_version, tailored_resume, \
     resume_highlights, cover_letter, cover_tone, tailored_at, applied_at, response";

const COVER_TONES: [&str; 3] = ["professional", "enthusiastic", "casual"];

fn validate_cover_tone(tone: Option<&str>) -> Result<(), AppError> {
    match tone {
        Some(tone) if !COVER_TONES.contains(&tone) => Err(AppError::Validation(format!(
            "cover_tone must be one of: {}",
            COVER_TONES.join(", ")
        ))),
        _ => Ok(()),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ApplicationListParams {
    pub job_id: Option<String>,
}

/// GET /api/applications
pub async fn handle_list_applications(
    State(state): State<AppState>,
    Query(params): Query<ApplicationListParams>,
) -> Result<Json<Vec<Application>>, AppError> {
    let applications = if let Some(job_id) = params.job_id {
        sqlx::query_as::<_, Application>(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications WHERE job_id = $1 \
             ORDER BY tailored_at DESC"
        ))
        .bind(job_id)
        .fetch_all(&state.db)
        .await?
    } else {
        sqlx::query_as::<_, Application>(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications ORDER BY tailored_at DESC"
        ))
        .fetch_all(&state.db)
        .await?
    };
    Ok(Json(applications))
}

/// GET /api/applications/:id
pub async fn handle_get_application(
    State(state): State<AppState>,
    Path(application_id): Path<i64>,
) -> Result<Json<Application>, AppError> {
    let application = sqlx::query_as::<_, Application>(&format!(
        "SELECT {APPLICATION_COLUMNS} FROM applications WHERE id = $1"
    ))
    .bind(application_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Application not found: {application_id}")))?;
    Ok(Json(application))
}

/// POST /api/applications
pub async fn handle_create_application(
    State(state): State<AppState>,
    Json(data): Json<ApplicationCreate>,
) -> Result<Json<Application>, AppError> {
    validate_cover_tone(data.cover_tone.as_deref())?;

    state
        .store
        .get_job(&data.job_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job not found: {}", data.job_id)))?;

    let application = sqlx::query_as::<_, Application>(&format!(
        "INSERT INTO applications (job_id, resume_version, tailored_resume, \
             resume_highlights, cover_letter, cover_tone) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING {APPLICATION_COLUMNS}"
    ))
    .bind(&data.job_id)
    .bind(&data.resume_version)
    .bind(&data.tailored_resume)
    .bind(&data.resume_highlights)
    .bind(&data.cover_letter)
    .bind(&data.cover_tone)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(application))
}

/// PATCH /api/applications/:id
pub async fn handle_update_application(
    State(state): State<AppState>,
    Path(application_id): Path<i64>,
    Json(update): Json<ApplicationUpdate>,
) -> Result<Json<Application>, AppError> {
    validate_cover_tone(update.cover_tone.as_deref())?;

    let has_changes = update.resume_version.is_some()
        || update.tailored_resume.is_some()
        || update.resume_highlights.is_some()
        || update.cover_letter.is_some()
        || update.cover_tone.is_some()
        || update.applied_at.is_some()
        || update.response.is_some();
    if !has_changes {
        return handle_get_application(State(state), Path(application_id)).await;
    }

    let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new("UPDATE applications SET ");
    let mut fields = builder.separated(", ");
    if let Some(resume_version) = &update.resume_version {
        fields
            .push("resume_version = ")
            .push_bind_unseparated(resume_version.clone());
    }
    if let Some(tailored_resume) = &update.tailored_resume {
        fields
            .push("tailored_resume = ")
            .push_bind_unseparated(tailored_resume.clone());
    }
    if let Some(resume_highlights) = &update.resume_highlights {
        fields
            .push("resume_highlights = ")
            .push_bind_unseparated(resume_highlights.clone());
    }
    if let Some(cover_letter) = &update.cover_letter {
        fields
            .push("cover_letter = ")
            .push_bind_unseparated(cover_letter.clone());
    }
    if let Some(cover_tone) = &update.cover_tone {
        fields
            .push("cover_tone = ")
            .push_bind_unseparated(cover_tone.clone());
    }
    if let Some(applied_at) = update.applied_at {
        fields
            .push("applied_at = ")
            .push_bind_unseparated(applied_at);
    }
    if let Some(response) = &update.response {
        fields
            .push("response = ")
            .push_bind_unseparated(response.clone());
    }

    builder
        .push(" WHERE id = ")
        .push_bind(application_id)
        .push(format!(" RETURNING {APPLICATION_COLUMNS}"));

    let application = builder
        .build_query_as::<Application>()
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Application not found: {application_id}")))?;

    Ok(Json(application))
}
