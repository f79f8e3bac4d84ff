use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One orchestrated search across one or more sources. Immutable once
/// recorded; `errors` keeps one entry per failed source, in source order.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SearchRun {
    pub id: i64,
    pub run_at: DateTime<Utc>,
    pub sources: Vec<String>,
    pub jobs_found: i64,
    pub new_jobs: i64,
    pub duration_seconds: f64,
    pub errors: Vec<String>,
}

/// Summary handed to the store once a run completes.
#[derive(Debug, Clone)]
pub struct NewSearchRun {
    pub sources: Vec<String>,
    pub jobs_found: i64,
    pub new_jobs: i64,
    pub duration_seconds: f64,
    pub errors: Vec<String>,
}

fn default_auto_score() -> bool {
    true
}

/// Trigger body for POST /api/search/run. `sources` is a comma-joined list of
/// adapter names; omitted means every registered adapter.
#[derive(Debug, Clone, Deserialize)]
pub struct RunRequest {
    pub location: Option<String>,
    pub keywords: Option<String>,
    pub sources: Option<String>,
    pub max_pages: Option<u32>,
    #[serde(default = "default_auto_score")]
    pub auto_score: bool,
}
