use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::FromRow;

/// Review status of a stored job. `status` and `notes` are the only fields a
/// client may write; everything else on [`Job`] is computed server-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    New,
    Reviewed,
    Applied,
    Rejected,
    Archived,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::New => "new",
            JobStatus::Reviewed => "reviewed",
            JobStatus::Applied => "applied",
            JobStatus::Rejected => "rejected",
            JobStatus::Archived => "archived",
        }
    }
}

impl TryFrom<String> for JobStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "new" => Ok(JobStatus::New),
            "reviewed" => Ok(JobStatus::Reviewed),
            "applied" => Ok(JobStatus::Applied),
            "rejected" => Ok(JobStatus::Rejected),
            "archived" => Ok(JobStatus::Archived),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkType {
    Remote,
    Hybrid,
    Onsite,
    Unspecified,
}

impl WorkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkType::Remote => "remote",
            WorkType::Hybrid => "hybrid",
            WorkType::Onsite => "onsite",
            WorkType::Unspecified => "unspecified",
        }
    }
}

impl TryFrom<String> for WorkType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "remote" => Ok(WorkType::Remote),
            "hybrid" => Ok(WorkType::Hybrid),
            "onsite" => Ok(WorkType::Onsite),
            "unspecified" => Ok(WorkType::Unspecified),
            other => Err(format!("unknown work type: {other}")),
        }
    }
}

/// The adapters a job may originate from. Adapter lookup at run time is keyed
/// by this enum, so an unrecognized source name in a run request fails parsing
/// and becomes a per-source error entry rather than a panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobSource {
    Indeed,
    Wellfound,
    Heb,
}

impl JobSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobSource::Indeed => "indeed",
            JobSource::Wellfound => "wellfound",
            JobSource::Heb => "heb",
        }
    }

    pub const ALL: [JobSource; 3] = [JobSource::Indeed, JobSource::Wellfound, JobSource::Heb];
}

impl std::fmt::Display for JobSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "indeed" => Ok(JobSource::Indeed),
            "wellfound" => Ok(JobSource::Wellfound),
            "heb" => Ok(JobSource::Heb),
            other => Err(format!("unknown source: {other}")),
        }
    }
}

impl TryFrom<String> for JobSource {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Stable job id: first 16 hex chars of the SHA-256 of the posting URL.
/// Re-scraping the same URL always maps to the same row (upsert, not insert).
pub fn job_id_for_url(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    hex::encode(digest)[..16].to_string()
}

/// A stored job posting. The embedding vector is intentionally not part of
/// this struct; it is loaded through dedicated queries where needed.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Job {
    pub id: String,
    pub url: String,
    #[sqlx(try_from = "String")]
    pub source: JobSource,
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    #[sqlx(try_from = "String")]
    pub work_type: WorkType,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub description: Option<String>,
    pub requirements: Option<String>,
    pub posted_date: Option<NaiveDate>,
    pub scraped_at: DateTime<Utc>,
    pub fit_score: Option<f64>,
    pub fit_rationale: Option<String>,
    pub score_failed: bool,
    #[sqlx(try_from = "String")]
    pub status: JobStatus,
    pub notes: Option<String>,
    pub dedup_key: String,
    pub duplicate_of: Option<String>,
}

/// A raw listing as produced by a source adapter, before normalization and
/// deduplication. Adapters fill in whatever the page yields; every optional
/// field may legitimately be absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawListing {
    pub url: String,
    pub source: JobSource,
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub work_type: Option<WorkType>,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub description: Option<String>,
    pub requirements: Option<String>,
    pub posted_date: Option<NaiveDate>,
}

impl RawListing {
    pub fn job_id(&self) -> String {
        job_id_for_url(&self.url)
    }
}

/// Partial update for a job. Only review status and notes are client-writable;
/// requests naming any other field are rejected outright.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub notes: Option<String>,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    20
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub source: Option<JobSource>,
    pub company: Option<String>,
    pub min_score: Option<f64>,
    pub work_type: Option<WorkType>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

impl Default for JobFilter {
    fn default() -> Self {
        JobFilter {
            status: None,
            source: None,
            company: None,
            min_score: None,
            work_type: None,
            page: default_page(),
            page_size: default_page_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobList {
    pub items: Vec<Job>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_id_is_stable_for_a_url() {
        let a = job_id_for_url("https://careers.heb.com/jobs/123");
        let b = job_id_for_url("https://careers.heb.com/jobs/123");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn job_id_differs_across_urls() {
        assert_ne!(
            job_id_for_url("https://careers.heb.com/jobs/123"),
            job_id_for_url("https://careers.heb.com/jobs/124")
        );
    }

    #[test]
    fn source_round_trips_through_str() {
        for source in JobSource::ALL {
            assert_eq!(source.as_str().parse::<JobSource>().unwrap(), source);
        }
        assert!("bad_source".parse::<JobSource>().is_err());
    }

    #[test]
    fn status_rejects_unknown_values() {
        assert!(JobStatus::try_from("new".to_string()).is_ok());
        assert!(JobStatus::try_from("stale".to_string()).is_err());
    }
}
