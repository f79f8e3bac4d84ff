use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A tracked application for a job. The tailored resume and cover letter are
/// produced by external generators; this service only stores what it is given.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Application {
    pub id: i64,
    pub job_id: String,
    pub resume_version: Option<String>,
    pub tailored_resume: Option<String>,
    pub resume_highlights: Option<String>,
    pub cover_letter: Option<String>,
    pub cover_tone: Option<String>,
    pub tailored_at: DateTime<Utc>,
    pub applied_at: Option<DateTime<Utc>>,
    pub response: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationCreate {
    pub job_id: String,
    pub resume_version: Option<String>,
    pub tailored_resume: Option<String>,
    pub resume_highlights: Option<String>,
    pub cover_letter: Option<String>,
    pub cover_tone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicationUpdate {
    pub resume_version: Option<String>,
    pub tailored_resume: Option<String>,
    pub resume_highlights: Option<String>,
    pub cover_letter: Option<String>,
    pub cover_tone: Option<String>,
    pub applied_at: Option<DateTime<Utc>>,
    pub response: Option<String>,
}
