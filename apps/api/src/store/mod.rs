//! Persistence seam for the pipeline.
//!
//! Components never touch a global handle: they are constructed with an
//! `Arc<dyn JobStore>` whose lifecycle is owned by `main`. The Postgres
//! implementation lives in [`pg`]; tests exercise the pipeline against the
//! in-memory implementation in [`memory`].

pub mod pg;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::embedding::JobEmbedding;
use crate::errors::AppError;
use crate::models::job::{Job, JobFilter, JobList, JobUpdate, RawListing};
use crate::models::profile::Profile;
use crate::models::run::{NewSearchRun, SearchRun};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Database(e) => AppError::Database(e),
            StoreError::Serialization(e) => AppError::Internal(anyhow::Error::new(e)),
        }
    }
}

/// What happened to one raw listing during ingestion.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub job_id: String,
    /// Whether a new row was created (false on re-scrape of a known URL).
    pub created: bool,
    /// Canonical id when the listing was folded in as a duplicate.
    pub duplicate_of: Option<String>,
}

impl IngestOutcome {
    /// A run counts a listing as "new" when it created a canonical row.
    pub fn is_new_canonical(&self) -> bool {
        self.created && self.duplicate_of.is_none()
    }
}

#[async_trait]
pub trait JobReader: Send + Sync {
    async fn get_job(&self, id: &str) -> Result<Option<Job>, StoreError>;
    async fn list_jobs(&self, filter: &JobFilter) -> Result<JobList, StoreError>;
    async fn search_jobs(
        &self,
        query: &str,
        page: i64,
        page_size: i64,
    ) -> Result<JobList, StoreError>;
    /// Canonical jobs that have never been scored.
    async fn unscored_canonical_ids(&self) -> Result<Vec<String>, StoreError>;
    /// Jobs without a stored embedding.
    async fn unembedded_ids(&self) -> Result<Vec<String>, StoreError>;
    /// Embeddings of canonical jobs, for similarity retrieval.
    async fn embedded_canonicals(&self) -> Result<Vec<JobEmbedding>, StoreError>;
    async fn job_embedding(&self, id: &str) -> Result<Option<Vec<f32>>, StoreError>;
}

#[async_trait]
pub trait JobWriter: Send + Sync {
    /// Normalizes, deduplicates, and upserts one raw listing.
    ///
    /// Ingestions sharing a dedup key are serialized (per-key critical
    /// section), so exactly one canonical ever exists per key. Re-ingesting a
    /// known URL refreshes scraped metadata only: status, notes, fit fields
    /// and the embedding survive untouched.
    async fn upsert_listing(
        &self,
        listing: &RawListing,
        fuzzy_threshold: f64,
    ) -> Result<IngestOutcome, StoreError>;

    /// Applies a client update (status/notes). Returns the updated job, or
    /// None when the id is unknown.
    async fn update_job(&self, id: &str, update: &JobUpdate) -> Result<Option<Job>, StoreError>;

    async fn delete_job(&self, id: &str) -> Result<bool, StoreError>;

    /// Persists a scoring result and clears any score-failed flag.
    async fn set_fit_score(
        &self,
        id: &str,
        fit_score: f64,
        rationale: &str,
    ) -> Result<(), StoreError>;

    /// Flags a job whose scoring retries were exhausted.
    async fn mark_score_failed(&self, id: &str) -> Result<(), StoreError>;

    async fn set_embedding(&self, id: &str, embedding: &[f32]) -> Result<(), StoreError>;
}

#[async_trait]
pub trait RunStore: Send + Sync {
    async fn record_run(&self, run: &NewSearchRun) -> Result<SearchRun, StoreError>;
    async fn list_runs(&self, limit: i64) -> Result<Vec<SearchRun>, StoreError>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Loads the profile document, falling back to defaults when none is stored.
    async fn load_profile(&self) -> Result<Profile, StoreError>;
    async fn save_profile(&self, profile: &Profile) -> Result<(), StoreError>;
}

/// The full store contract the pipeline is built against.
pub trait JobStore: JobReader + JobWriter + RunStore + ProfileStore {}

impl<T: JobReader + JobWriter + RunStore + ProfileStore> JobStore for T {}
