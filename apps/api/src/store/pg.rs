use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::dedup::{find_fuzzy_duplicate, resolve, DedupCandidate, FuzzyCandidate};
use crate::dedup::normalize::dedup_key;
use crate::embedding::JobEmbedding;
use crate::models::job::{Job, JobFilter, JobList, JobUpdate, RawListing};
use crate::models::profile::Profile;
use crate::models::run::{NewSearchRun, SearchRun};
use crate::store::{
    IngestOutcome, JobReader, JobWriter, ProfileStore, RunStore, StoreError,
};

const JOB_COLUMNS: &str = "id, url, source, title, company, location, work_type, \
     salary_min, salary_max, description, requirements, posted_date, scraped_at, \
     fit_score, fit_rationale, score_failed, status, notes, dedup_key, duplicate_of";

const RUN_COLUMNS: &str = "id, run_at, sources, jobs_found, new_jobs, duration_seconds, errors";

/// Postgres-backed store. Holds the shared pool handed in by `main`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn push_job_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &JobFilter) {
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(source) = filter.source {
        builder.push(" AND source = ").push_bind(source.as_str());
    }
    if let Some(company) = &filter.company {
        builder
            .push(" AND company ILIKE ")
            .push_bind(format!("%{company}%"));
    }
    if let Some(min_score) = filter.min_score {
        builder.push(" AND fit_score >= ").push_bind(min_score);
    }
    if let Some(work_type) = filter.work_type {
        builder
            .push(" AND work_type = ")
            .push_bind(work_type.as_str());
    }
}

const SEARCH_DOCUMENT: &str = "to_tsvector('english', title || ' ' || company || ' ' || \
     coalesce(description, '') || ' ' || coalesce(requirements, ''))";

#[async_trait]
impl JobReader for PgStore {
    async fn get_job(&self, id: &str) -> Result<Option<Job>, StoreError> {
        let job = sqlx::query_as::<_, Job>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(job)
    }

    async fn list_jobs(&self, filter: &JobFilter) -> Result<JobList, StoreError> {
        let mut count_builder = QueryBuilder::new("SELECT COUNT(*) FROM jobs WHERE 1=1");
        push_job_filters(&mut count_builder, filter);
        let total: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut builder =
            QueryBuilder::new(format!("SELECT {JOB_COLUMNS} FROM jobs WHERE 1=1"));
        push_job_filters(&mut builder, filter);
        builder
            .push(" ORDER BY scraped_at DESC LIMIT ")
            .push_bind(filter.page_size)
            .push(" OFFSET ")
            .push_bind((filter.page - 1) * filter.page_size);

        let items = builder.build_query_as::<Job>().fetch_all(&self.pool).await?;

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
        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM jobs WHERE {SEARCH_DOCUMENT} @@ websearch_to_tsquery('english', $1)"
        ))
        .bind(query)
        .fetch_one(&self.pool)
        .await?;

        let items = sqlx::query_as::<_, Job>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs \
             WHERE {SEARCH_DOCUMENT} @@ websearch_to_tsquery('english', $1) \
             ORDER BY scraped_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(query)
        .bind(page_size)
        .bind((page - 1) * page_size)
        .fetch_all(&self.pool)
        .await?;

        Ok(JobList {
            items,
            total,
            page,
            page_size,
        })
    }

    async fn unscored_canonical_ids(&self) -> Result<Vec<String>, StoreError> {
        let ids = sqlx::query_scalar(
            "SELECT id FROM jobs WHERE fit_score IS NULL AND duplicate_of IS NULL \
             ORDER BY scraped_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn unembedded_ids(&self) -> Result<Vec<String>, StoreError> {
        let ids = sqlx::query_scalar(
            "SELECT id FROM jobs WHERE embedding IS NULL ORDER BY scraped_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn embedded_canonicals(&self) -> Result<Vec<JobEmbedding>, StoreError> {
        let rows = sqlx::query_as::<_, (String, Vec<f32>, DateTime<Utc>)>(
            "SELECT id, embedding, scraped_at FROM jobs \
             WHERE embedding IS NOT NULL AND duplicate_of IS NULL",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, embedding, scraped_at)| JobEmbedding {
                id,
                embedding,
                scraped_at,
            })
            .collect())
    }

    async fn job_embedding(&self, id: &str) -> Result<Option<Vec<f32>>, StoreError> {
        let row: Option<Option<Vec<f32>>> =
            sqlx::query_scalar("SELECT embedding FROM jobs WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.flatten())
    }
}

#[async_trait]
impl JobWriter for PgStore {
    async fn upsert_listing(
        &self,
        listing: &RawListing,
        fuzzy_threshold: f64,
    ) -> Result<IngestOutcome, StoreError> {
        let id = listing.job_id();
        let key = dedup_key(
            &listing.title,
            &listing.company,
            listing.location.as_deref(),
        );

        let mut tx = self.pool.begin().await?;

        // Per-key critical section: concurrent ingestions of the same key
        // queue behind this lock, so exactly one canonical is ever elected.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(&key)
            .execute(&mut *tx)
            .await?;

        let existing: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT scraped_at FROM jobs WHERE id = $1")
                .bind(&id)
                .fetch_optional(&mut *tx)
                .await?;
        let created = existing.is_none();
        // scraped_at is first-seen: keeping it stable across re-scrapes keeps
        // the earliest-wins canonical election stable too.
        let scraped_at = existing.unwrap_or_else(Utc::now);

        let candidates: Vec<DedupCandidate> =
            sqlx::query_as::<_, (String, DateTime<Utc>, Option<String>)>(
                "SELECT id, scraped_at, duplicate_of FROM jobs \
                 WHERE dedup_key = $1 AND status <> 'archived' AND id <> $2",
            )
            .bind(&key)
            .bind(&id)
            .fetch_all(&mut *tx)
            .await?
            .into_iter()
            .map(|(id, scraped_at, duplicate_of)| DedupCandidate {
                id,
                scraped_at,
                duplicate_of,
            })
            .collect();

        let resolution = resolve(&id, scraped_at, &candidates);
        let mut duplicate_of = resolution
            .is_duplicate
            .then(|| resolution.canonical_id.clone());

        // Advisory fuzzy pass, only when the exact pass found nothing to
        // compare against. It may mark the incoming job a duplicate but never
        // touches the matched canonical.
        if duplicate_of.is_none() && candidates.is_empty() && fuzzy_threshold > 0.0 {
            let canonicals: Vec<FuzzyCandidate> =
                sqlx::query_as::<_, (String, String, String)>(
                    "SELECT id, title, company FROM jobs \
                     WHERE duplicate_of IS NULL AND status <> 'archived' AND id <> $1",
                )
                .bind(&id)
                .fetch_all(&mut *tx)
                .await?
                .into_iter()
                .map(|(id, title, company)| FuzzyCandidate { id, title, company })
                .collect();

            duplicate_of = find_fuzzy_duplicate(
                &listing.title,
                &listing.company,
                &canonicals,
                fuzzy_threshold,
            )
            .map(|hit| hit.id.clone());
        }

        sqlx::query(
            "INSERT INTO jobs (id, url, source, title, company, location, work_type, \
                 salary_min, salary_max, description, requirements, posted_date, \
                 scraped_at, dedup_key, duplicate_of) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
             ON CONFLICT (id) DO UPDATE SET \
                 source = EXCLUDED.source, \
                 title = EXCLUDED.title, \
                 company = EXCLUDED.company, \
                 location = EXCLUDED.location, \
                 work_type = EXCLUDED.work_type, \
                 salary_min = EXCLUDED.salary_min, \
                 salary_max = EXCLUDED.salary_max, \
                 description = EXCLUDED.description, \
                 requirements = EXCLUDED.requirements, \
                 posted_date = EXCLUDED.posted_date, \
                 dedup_key = EXCLUDED.dedup_key, \
                 duplicate_of = EXCLUDED.duplicate_of",
        )
        .bind(&id)
        .bind(&listing.url)
        .bind(listing.source.as_str())
        .bind(&listing.title)
        .bind(&listing.company)
        .bind(&listing.location)
        .bind(
            listing
                .work_type
                .map(|w| w.as_str())
                .unwrap_or("unspecified"),
        )
        .bind(listing.salary_min)
        .bind(listing.salary_max)
        .bind(&listing.description)
        .bind(&listing.requirements)
        .bind(listing.posted_date)
        .bind(scraped_at)
        .bind(&key)
        .bind(&duplicate_of)
        .execute(&mut *tx)
        .await?;

        if let Some(canonical) = &duplicate_of {
            // No chains: anything that pointed at the incoming job follows it.
            sqlx::query("UPDATE jobs SET duplicate_of = $1 WHERE duplicate_of = $2")
                .bind(canonical)
                .bind(&id)
                .execute(&mut *tx)
                .await?;
        }

        if !resolution.demoted.is_empty() {
            sqlx::query("UPDATE jobs SET duplicate_of = $1 WHERE id = ANY($2)")
                .bind(&resolution.canonical_id)
                .bind(&resolution.demoted)
                .execute(&mut *tx)
                .await?;
            sqlx::query("UPDATE jobs SET duplicate_of = $1 WHERE duplicate_of = ANY($2)")
                .bind(&resolution.canonical_id)
                .bind(&resolution.demoted)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(IngestOutcome {
            job_id: id,
            created,
            duplicate_of,
        })
    }

    async fn update_job(&self, id: &str, update: &JobUpdate) -> Result<Option<Job>, StoreError> {
        if update.status.is_none() && update.notes.is_none() {
            return self.get_job(id).await;
        }

        let mut builder = QueryBuilder::new("UPDATE jobs SET ");
        let mut fields = builder.separated(", ");
        if let Some(status) = update.status {
            fields.push("status = ").push_bind_unseparated(status.as_str());
        }
        if let Some(notes) = &update.notes {
            fields.push("notes = ").push_bind_unseparated(notes.clone());
        }
        builder
            .push(" WHERE id = ")
            .push_bind(id)
            .push(format!(" RETURNING {JOB_COLUMNS}"));

        let job = builder
            .build_query_as::<Job>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(job)
    }

    async fn delete_job(&self, id: &str) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM applications WHERE job_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        // Former duplicates of a deleted canonical become canonical themselves.
        sqlx::query("UPDATE jobs SET duplicate_of = NULL WHERE duplicate_of = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(deleted > 0)
    }

    async fn set_fit_score(
        &self,
        id: &str,
        fit_score: f64,
        rationale: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE jobs SET fit_score = $2, fit_rationale = $3, score_failed = FALSE \
             WHERE id = $1",
        )
        .bind(id)
        .bind(fit_score)
        .bind(rationale)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_score_failed(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE jobs SET score_failed = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_embedding(&self, id: &str, embedding: &[f32]) -> Result<(), StoreError> {
        sqlx::query("UPDATE jobs SET embedding = $2 WHERE id = $1")
            .bind(id)
            .bind(embedding.to_vec())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RunStore for PgStore {
    async fn record_run(&self, run: &NewSearchRun) -> Result<SearchRun, StoreError> {
        let recorded = sqlx::query_as::<_, SearchRun>(&format!(
            "INSERT INTO search_runs (sources, jobs_found, new_jobs, duration_seconds, errors) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {RUN_COLUMNS}"
        ))
        .bind(&run.sources)
        .bind(run.jobs_found)
        .bind(run.new_jobs)
        .bind(run.duration_seconds)
        .bind(&run.errors)
        .fetch_one(&self.pool)
        .await?;
        Ok(recorded)
    }

    async fn list_runs(&self, limit: i64) -> Result<Vec<SearchRun>, StoreError> {
        let runs = sqlx::query_as::<_, SearchRun>(&format!(
            "SELECT {RUN_COLUMNS} FROM search_runs ORDER BY run_at DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(runs)
    }
}

#[async_trait]
impl ProfileStore for PgStore {
    async fn load_profile(&self) -> Result<Profile, StoreError> {
        let row: Option<serde_json::Value> =
            sqlx::query_scalar("SELECT data FROM profile WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(data) => Ok(serde_json::from_value(data)?),
            None => Ok(Profile::default()),
        }
    }

    async fn save_profile(&self, profile: &Profile) -> Result<(), StoreError> {
        let data = serde_json::to_value(profile)?;
        sqlx::query(
            "INSERT INTO profile (id, data, updated_at) VALUES (1, $1, now()) \
             ON CONFLICT (id) DO UPDATE SET data = EXCLUDED.data, updated_at = now()",
        )
        .bind(data)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
