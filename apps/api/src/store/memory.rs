//! In-memory store used by pipeline tests.
//!
//! Mirrors the Postgres implementation's ingestion semantics. A single async
//! mutex over the whole map is a stricter critical section than the per-key
//! advisory lock, so the single-canonical invariant holds here too. The
//! clock is a deterministic counter so arrival order fixes `scraped_at`
//! ordering in tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Mutex;

use crate::dedup::normalize::dedup_key;
use crate::dedup::{find_fuzzy_duplicate, resolve, DedupCandidate, FuzzyCandidate};
use crate::embedding::JobEmbedding;
use crate::models::job::{Job, JobFilter, JobList, JobStatus, JobUpdate, RawListing, WorkType};
use crate::models::profile::Profile;
use crate::models::run::{NewSearchRun, SearchRun};
use crate::store::{IngestOutcome, JobReader, JobWriter, ProfileStore, RunStore, StoreError};

#[derive(Clone)]
struct StoredJob {
    job: Job,
    embedding: Option<Vec<f32>>,
}

#[derive(Default)]
struct Inner {
    jobs: HashMap<String, StoredJob>,
    runs: Vec<SearchRun>,
    profile: Option<Profile>,
    clock: i64,
}

#[derive(Default)]
pub struct MemStore {
    inner: Mutex<Inner>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tick(inner: &mut Inner) -> DateTime<Utc> {
        inner.clock += 1;
        Utc.timestamp_opt(1_700_000_000 + inner.clock, 0).unwrap()
    }
}

#[async_trait]
impl JobReader for MemStore {
    async fn get_job(&self, id: &str) -> Result<Option<Job>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.jobs.get(id).map(|s| s.job.clone()))
    }

    async fn list_jobs(&self, filter: &JobFilter) -> Result<JobList, StoreError> {
        let inner = self.inner.lock().await;
        let mut items: Vec<Job> = inner
            .jobs
            .values()
            .map(|s| s.job.clone())
            .filter(|job| {
                filter.status.map_or(true, |s| job.status == s)
                    && filter.source.map_or(true, |s| job.source == s)
                    && filter.company.as_ref().map_or(true, |c| {
                        job.company.to_lowercase().contains(&c.to_lowercase())
                    })
                    && filter
                        .min_score
                        .map_or(true, |m| job.fit_score.is_some_and(|s| s >= m))
                    && filter.work_type.map_or(true, |w| job.work_type == w)
            })
            .collect();
        items.sort_by(|a, b| b.scraped_at.cmp(&a.scraped_at));

        let total = items.len() as i64;
        let offset = ((filter.page - 1) * filter.page_size).max(0) as usize;
        let items = items
            .into_iter()
            .skip(offset)
            .take(filter.page_size.max(0) as usize)
            .collect();

        Ok(JobList {
            items,
            total,
            page: filter.page,
            page_size: filter.page_size,
        })
    }

    async fn search_jobs(
        &self,
        query: &str,
        page: i64,
        page_size: i64,
    ) -> Result<JobList, StoreError> {
        let needle = query.to_lowercase();
        let inner = self.inner.lock().await;
        let mut items: Vec<Job> = inner
            .jobs
            .values()
            .map(|s| s.job.clone())
            .filter(|job| {
                let haystack = format!(
                    "{} {} {} {}",
                    job.title,
                    job.company,
                    job.description.as_deref().unwrap_or(""),
                    job.requirements.as_deref().unwrap_or("")
                )
                .to_lowercase();
                needle.split_whitespace().all(|word| haystack.contains(word))
            })
            .collect();
        items.sort_by(|a, b| b.scraped_at.cmp(&a.scraped_at));

        let total = items.len() as i64;
        let offset = ((page - 1) * page_size).max(0) as usize;
        let items = items
            .into_iter()
            .skip(offset)
            .take(page_size.max(0) as usize)
            .collect();

        Ok(JobList {
            items,
            total,
            page,
            page_size,
        })
    }

    async fn unscored_canonical_ids(&self) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.lock().await;
        let mut ids: Vec<String> = inner
            .jobs
            .values()
            .filter(|s| s.job.fit_score.is_none() && s.job.duplicate_of.is_none())
            .map(|s| s.job.id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn unembedded_ids(&self) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.lock().await;
        let mut ids: Vec<String> = inner
            .jobs
            .values()
            .filter(|s| s.embedding.is_none())
            .map(|s| s.job.id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn embedded_canonicals(&self) -> Result<Vec<JobEmbedding>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .jobs
            .values()
            .filter(|s| s.job.duplicate_of.is_none())
            .filter_map(|s| {
                s.embedding.as_ref().map(|embedding| JobEmbedding {
                    id: s.job.id.clone(),
                    embedding: embedding.clone(),
                    scraped_at: s.job.scraped_at,
                })
            })
            .collect())
    }

    async fn job_embedding(&self, id: &str) -> Result<Option<Vec<f32>>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.jobs.get(id).and_then(|s| s.embedding.clone()))
    }
}

#[async_trait]
impl JobWriter for MemStore {
    async fn upsert_listing(
        &self,
        listing: &RawListing,
        fuzzy_threshold: f64,
    ) -> Result<IngestOutcome, StoreError> {
        let mut inner = self.inner.lock().await;

        let id = listing.job_id();
        let key = dedup_key(
            &listing.title,
            &listing.company,
            listing.location.as_deref(),
        );

        let existing = inner.jobs.get(&id).cloned();
        let created = existing.is_none();
        let scraped_at = match &existing {
            Some(stored) => stored.job.scraped_at,
            None => Self::tick(&mut inner),
        };

        let candidates: Vec<DedupCandidate> = inner
            .jobs
            .values()
            .filter(|s| {
                s.job.dedup_key == key && s.job.status != JobStatus::Archived && s.job.id != id
            })
            .map(|s| DedupCandidate {
                id: s.job.id.clone(),
                scraped_at: s.job.scraped_at,
                duplicate_of: s.job.duplicate_of.clone(),
            })
            .collect();

        let resolution = resolve(&id, scraped_at, &candidates);
        let mut duplicate_of = resolution
            .is_duplicate
            .then(|| resolution.canonical_id.clone());

        if duplicate_of.is_none() && candidates.is_empty() && fuzzy_threshold > 0.0 {
            let canonicals: Vec<FuzzyCandidate> = inner
                .jobs
                .values()
                .filter(|s| {
                    s.job.duplicate_of.is_none()
                        && s.job.status != JobStatus::Archived
                        && s.job.id != id
                })
                .map(|s| FuzzyCandidate {
                    id: s.job.id.clone(),
                    title: s.job.title.clone(),
                    company: s.job.company.clone(),
                })
                .collect();

            duplicate_of = find_fuzzy_duplicate(
                &listing.title,
                &listing.company,
                &canonicals,
                fuzzy_threshold,
            )
            .map(|hit| hit.id.clone());
        }

        let job = Job {
            id: id.clone(),
            url: listing.url.clone(),
            source: listing.source,
            title: listing.title.clone(),
            company: listing.company.clone(),
            location: listing.location.clone(),
            work_type: listing.work_type.unwrap_or(WorkType::Unspecified),
            salary_min: listing.salary_min,
            salary_max: listing.salary_max,
            description: listing.description.clone(),
            requirements: listing.requirements.clone(),
            posted_date: listing.posted_date,
            scraped_at,
            // User-owned and computed fields survive re-ingestion untouched.
            fit_score: existing.as_ref().and_then(|s| s.job.fit_score),
            fit_rationale: existing.as_ref().and_then(|s| s.job.fit_rationale.clone()),
            score_failed: existing.as_ref().is_some_and(|s| s.job.score_failed),
            status: existing.as_ref().map_or(JobStatus::New, |s| s.job.status),
            notes: existing.as_ref().and_then(|s| s.job.notes.clone()),
            dedup_key: key,
            duplicate_of: duplicate_of.clone(),
        };
        let embedding = existing.and_then(|s| s.embedding);
        inner.jobs.insert(id.clone(), StoredJob { job, embedding });

        if let Some(canonical) = &duplicate_of {
            for stored in inner.jobs.values_mut() {
                if stored.job.duplicate_of.as_deref() == Some(id.as_str()) {
                    stored.job.duplicate_of = Some(canonical.clone());
                }
            }
        }

        if !resolution.demoted.is_empty() {
            for stored in inner.jobs.values_mut() {
                let points_at_demoted = stored
                    .job
                    .duplicate_of
                    .as_deref()
                    .is_some_and(|d| resolution.demoted.iter().any(|x| x == d));
                if resolution.demoted.contains(&stored.job.id) || points_at_demoted {
                    stored.job.duplicate_of = Some(resolution.canonical_id.clone());
                }
            }
        }

        Ok(IngestOutcome {
            job_id: id,
            created,
            duplicate_of,
        })
    }

    async fn update_job(&self, id: &str, update: &JobUpdate) -> Result<Option<Job>, StoreError> {
        let mut inner = self.inner.lock().await;
        let Some(stored) = inner.jobs.get_mut(id) else {
            return Ok(None);
        };
        if let Some(status) = update.status {
            stored.job.status = status;
        }
        if let Some(notes) = &update.notes {
            stored.job.notes = Some(notes.clone());
        }
        Ok(Some(stored.job.clone()))
    }

    async fn delete_job(&self, id: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        let deleted = inner.jobs.remove(id).is_some();
        if deleted {
            for stored in inner.jobs.values_mut() {
                if stored.job.duplicate_of.as_deref() == Some(id) {
                    stored.job.duplicate_of = None;
                }
            }
        }
        Ok(deleted)
    }

    async fn set_fit_score(
        &self,
        id: &str,
        fit_score: f64,
        rationale: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(stored) = inner.jobs.get_mut(id) {
            stored.job.fit_score = Some(fit_score);
            stored.job.fit_rationale = Some(rationale.to_string());
            stored.job.score_failed = false;
        }
        Ok(())
    }

    async fn mark_score_failed(&self, id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(stored) = inner.jobs.get_mut(id) {
            stored.job.score_failed = true;
        }
        Ok(())
    }

    async fn set_embedding(&self, id: &str, embedding: &[f32]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(stored) = inner.jobs.get_mut(id) {
            stored.embedding = Some(embedding.to_vec());
        }
        Ok(())
    }
}

#[async_trait]
impl RunStore for MemStore {
    async fn record_run(&self, run: &NewSearchRun) -> Result<SearchRun, StoreError> {
        let mut inner = self.inner.lock().await;
        let run_at = Self::tick(&mut inner);
        let recorded = SearchRun {
            id: inner.runs.len() as i64 + 1,
            run_at,
            sources: run.sources.clone(),
            jobs_found: run.jobs_found,
            new_jobs: run.new_jobs,
            duration_seconds: run.duration_seconds,
            errors: run.errors.clone(),
        };
        inner.runs.push(recorded.clone());
        Ok(recorded)
    }

    async fn list_runs(&self, limit: i64) -> Result<Vec<SearchRun>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .runs
            .iter()
            .rev()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ProfileStore for MemStore {
    async fn load_profile(&self) -> Result<Profile, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.profile.clone().unwrap_or_default())
    }

    async fn save_profile(&self, profile: &Profile) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.profile = Some(profile.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::JobSource;

    fn listing(url: &str, source: JobSource, title: &str, company: &str) -> RawListing {
        RawListing {
            url: url.to_string(),
            source,
            title: title.to_string(),
            company: company.to_string(),
            location: Some("Austin, TX".to_string()),
            work_type: None,
            salary_min: None,
            salary_max: None,
            description: Some("Work on data pipelines.".to_string()),
            requirements: None,
            posted_date: None,
        }
    }

    fn store() -> MemStore {
        MemStore::new()
    }

    #[tokio::test]
    async fn second_source_with_same_key_becomes_duplicate() {
        let store = store();
        let first = store
            .upsert_listing(
                &listing(
                    "https://indeed.com/a",
                    JobSource::Indeed,
                    "Data Scientist",
                    "Acme",
                ),
                0.0,
            )
            .await
            .unwrap();
        let second = store
            .upsert_listing(
                &listing(
                    "https://wellfound.com/b",
                    JobSource::Wellfound,
                    "Data Scientist",
                    "Acme",
                ),
                0.0,
            )
            .await
            .unwrap();

        assert!(first.is_new_canonical());
        assert!(second.created);
        assert_eq!(second.duplicate_of.as_deref(), Some(first.job_id.as_str()));

        let canonical = store.get_job(&first.job_id).await.unwrap().unwrap();
        assert!(canonical.duplicate_of.is_none());
    }

    #[tokio::test]
    async fn reingesting_a_known_url_upserts_and_preserves_user_fields() {
        let store = store();
        let outcome = store
            .upsert_listing(
                &listing(
                    "https://indeed.com/a",
                    JobSource::Indeed,
                    "Data Scientist",
                    "Acme",
                ),
                0.0,
            )
            .await
            .unwrap();

        store
            .update_job(
                &outcome.job_id,
                &JobUpdate {
                    status: Some(JobStatus::Reviewed),
                    notes: Some("promising".to_string()),
                },
            )
            .await
            .unwrap();
        store
            .set_fit_score(&outcome.job_id, 77.0, "good fit")
            .await
            .unwrap();
        store
            .set_embedding(&outcome.job_id, &[0.1, 0.2])
            .await
            .unwrap();

        // Re-scrape with refreshed metadata
        let mut refreshed = listing(
            "https://indeed.com/a",
            JobSource::Indeed,
            "Data Scientist",
            "Acme",
        );
        refreshed.salary_min = Some(150_000);
        let second = store.upsert_listing(&refreshed, 0.0).await.unwrap();

        assert!(!second.created);
        assert_eq!(second.job_id, outcome.job_id);

        let job = store.get_job(&outcome.job_id).await.unwrap().unwrap();
        assert_eq!(job.salary_min, Some(150_000));
        assert_eq!(job.status, JobStatus::Reviewed);
        assert_eq!(job.notes.as_deref(), Some("promising"));
        assert_eq!(job.fit_score, Some(77.0));
        assert_eq!(
            store.job_embedding(&outcome.job_id).await.unwrap(),
            Some(vec![0.1, 0.2])
        );
    }

    #[tokio::test]
    async fn archived_jobs_do_not_capture_new_listings() {
        let store = store();
        let first = store
            .upsert_listing(
                &listing(
                    "https://indeed.com/a",
                    JobSource::Indeed,
                    "Data Scientist",
                    "Acme",
                ),
                0.0,
            )
            .await
            .unwrap();
        store
            .update_job(
                &first.job_id,
                &JobUpdate {
                    status: Some(JobStatus::Archived),
                    notes: None,
                },
            )
            .await
            .unwrap();

        let second = store
            .upsert_listing(
                &listing(
                    "https://wellfound.com/b",
                    JobSource::Wellfound,
                    "Data Scientist",
                    "Acme",
                ),
                0.0,
            )
            .await
            .unwrap();

        assert!(second.is_new_canonical());
    }

    #[tokio::test]
    async fn fuzzy_pass_folds_cross_source_near_duplicates() {
        let store = store();
        let first = store
            .upsert_listing(
                &listing(
                    "https://indeed.com/a",
                    JobSource::Indeed,
                    "Machine Learning Engineer",
                    "Acme",
                ),
                0.85,
            )
            .await
            .unwrap();

        // Different location means a different dedup key; the fuzzy pass
        // still matches on company + title similarity.
        let mut near = listing(
            "https://wellfound.com/b",
            JobSource::Wellfound,
            "Machine Learning Enginer",
            "Acme, Inc.",
        );
        near.location = Some("Dallas, TX".to_string());
        let second = store.upsert_listing(&near, 0.85).await.unwrap();

        assert_eq!(second.duplicate_of.as_deref(), Some(first.job_id.as_str()));
    }

    #[tokio::test]
    async fn exactly_one_canonical_per_key() {
        let store = store();
        for i in 0..4 {
            store
                .upsert_listing(
                    &listing(
                        &format!("https://board{i}.com/job"),
                        JobSource::Indeed,
                        "Data Scientist",
                        "Acme",
                    ),
                    0.0,
                )
                .await
                .unwrap();
        }

        let inner = store.inner.lock().await;
        let canonicals: Vec<_> = inner
            .jobs
            .values()
            .filter(|s| s.job.duplicate_of.is_none())
            .collect();
        assert_eq!(canonicals.len(), 1);

        // Everyone else points at the earliest-scraped canonical.
        let canonical = canonicals[0];
        let earliest = inner
            .jobs
            .values()
            .min_by_key(|s| (s.job.scraped_at, s.job.id.clone()))
            .unwrap();
        assert_eq!(canonical.job.id, earliest.job.id);
        for stored in inner.jobs.values() {
            if stored.job.id != canonical.job.id {
                assert_eq!(
                    stored.job.duplicate_of.as_deref(),
                    Some(canonical.job.id.as_str())
                );
            }
        }
    }
}
