//! The search orchestrator: one run across multiple source adapters.
//!
//! Sources fetch concurrently within a configurable bound. Each listing
//! flows through normalize → dedup upsert; newly created canonical jobs are
//! then scored (when auto_score is on) and embedded (when embedding is
//! enabled). One failing source records an error string and never aborts
//! the run; the recorded SearchRun carries the aggregated error list.

pub mod handlers;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::embedding::{self, EmbeddingProvider};
use crate::models::job::JobSource;
use crate::models::run::{NewSearchRun, RunRequest, SearchRun};
use crate::scoring::{self, Scorer};
use crate::scrapers::{SearchQuery, SourceAdapter};
use crate::store::{JobStore, JobWriter, ProfileStore, RunStore, StoreError};

pub struct SearchOrchestrator {
    store: Arc<dyn JobStore>,
    scorer: Arc<Scorer>,
    embedder: Arc<dyn EmbeddingProvider>,
    adapters: HashMap<JobSource, Arc<dyn SourceAdapter>>,
    max_source_concurrency: usize,
    scoring_concurrency: usize,
    fuzzy_threshold: f64,
    auto_embed: bool,
}

#[derive(Default)]
struct SourceOutcome {
    jobs_found: i64,
    new_jobs: i64,
    new_ids: Vec<String>,
    errors: Vec<String>,
}

impl SearchOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn JobStore>,
        scorer: Arc<Scorer>,
        embedder: Arc<dyn EmbeddingProvider>,
        adapters: HashMap<JobSource, Arc<dyn SourceAdapter>>,
        max_source_concurrency: usize,
        scoring_concurrency: usize,
        fuzzy_threshold: f64,
        auto_embed: bool,
    ) -> Self {
        Self {
            store,
            scorer,
            embedder,
            adapters,
            max_source_concurrency,
            scoring_concurrency,
            fuzzy_threshold,
            auto_embed,
        }
    }

    /// Executes one run and persists its summary. Only a store failure while
    /// recording the summary surfaces as an error; per-source and per-job
    /// failures are folded into the run's error list.
    pub async fn run(&self, request: &RunRequest) -> Result<SearchRun, StoreError> {
        let started = Instant::now();
        let mut errors: Vec<String> = Vec::new();

        let requested: Vec<String> = match &request.sources {
            Some(raw) => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => {
                let mut names: Vec<String> =
                    self.adapters.keys().map(|s| s.to_string()).collect();
                names.sort();
                names
            }
        };

        let query = SearchQuery {
            location: request.location.clone().unwrap_or_default(),
            keywords: request.keywords.clone().unwrap_or_default(),
            max_pages: request.max_pages.unwrap_or(3),
        };

        info!("Starting search run over sources: {requested:?}");

        let mut selected: Vec<(String, Arc<dyn SourceAdapter>)> = Vec::new();
        for name in &requested {
            match name.parse::<JobSource>() {
                Ok(source) => match self.adapters.get(&source) {
                    Some(adapter) => selected.push((name.clone(), Arc::clone(adapter))),
                    None => errors.push(format!("{name}: adapter not available")),
                },
                Err(_) => errors.push(format!("{name}: unknown source")),
            }
        }

        let tasks: Vec<_> = selected
            .into_iter()
            .map(|(name, adapter)| {
                let query = query.clone();
                async move {
                    let outcome = self.ingest_source(&name, adapter.as_ref(), &query).await;
                    (name, outcome)
                }
            })
            .collect();

        let results = stream::iter(tasks)
            .buffer_unordered(self.max_source_concurrency.max(1))
            .collect::<Vec<_>>()
            .await;

        // Fold per-source tallies back in requested order so error entries
        // read deterministically.
        let mut by_name: HashMap<String, SourceOutcome> = results.into_iter().collect();
        let mut jobs_found = 0i64;
        let mut new_jobs = 0i64;
        let mut new_ids: Vec<String> = Vec::new();
        for name in &requested {
            if let Some(outcome) = by_name.remove(name) {
                jobs_found += outcome.jobs_found;
                new_jobs += outcome.new_jobs;
                new_ids.extend(outcome.new_ids);
                errors.extend(outcome.errors);
            }
        }

        if request.auto_score && !new_ids.is_empty() {
            match self.store.load_profile().await {
                Ok(profile) => {
                    let result = scoring::score_jobs(
                        self.store.as_ref(),
                        &self.scorer,
                        &profile,
                        new_ids.clone(),
                        self.scoring_concurrency,
                    )
                    .await;
                    info!(
                        "Scored {} new jobs ({} failed)",
                        result.scored.len(),
                        result.failed.len()
                    );
                }
                Err(e) => warn!("Skipping auto-score; profile unavailable: {e}"),
            }
        }

        if self.auto_embed && !new_ids.is_empty() {
            let result =
                embedding::embed_jobs(self.store.as_ref(), self.embedder.as_ref(), new_ids).await;
            info!(
                "Embedded {} new jobs ({} failed)",
                result.embedded.len(),
                result.failed.len()
            );
        }

        let summary = NewSearchRun {
            sources: requested,
            jobs_found,
            new_jobs,
            duration_seconds: started.elapsed().as_secs_f64(),
            errors,
        };

        info!(
            "Search run finished: {} found, {} new, {} errors in {:.2}s",
            summary.jobs_found,
            summary.new_jobs,
            summary.errors.len(),
            summary.duration_seconds
        );
        self.store.record_run(&summary).await
    }

    async fn ingest_source(
        &self,
        name: &str,
        adapter: &dyn SourceAdapter,
        query: &SearchQuery,
    ) -> SourceOutcome {
        let mut outcome = SourceOutcome::default();

        let listings = match adapter.fetch(query).await {
            Ok(listings) => listings,
            Err(e) => {
                warn!("Source {name} failed: {e}");
                outcome.errors.push(format!("{name}: {e}"));
                return outcome;
            }
        };

        outcome.jobs_found = listings.len() as i64;

        for listing in &listings {
            match self
                .store
                .upsert_listing(listing, self.fuzzy_threshold)
                .await
            {
                Ok(ingest) => {
                    if ingest.is_new_canonical() {
                        outcome.new_jobs += 1;
                        outcome.new_ids.push(ingest.job_id);
                    }
                }
                Err(e) => {
                    warn!("Failed to ingest listing {} from {name}: {e}", listing.url);
                    outcome.errors.push(format!("{name}: {e}"));
                }
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::embedding::EmbedError;
    use crate::llm::{LlmError, LlmProvider};
    use crate::models::job::{JobFilter, RawListing};
    use crate::models::profile::Profile;
    use crate::scrapers::ScrapeError;
    use crate::store::memory::MemStore;
    use crate::store::{JobReader, ProfileStore};

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
            description: Some("Own data pipelines and models.".to_string()),
            requirements: None,
            posted_date: None,
        }
    }

    struct StaticAdapter {
        source: JobSource,
        listings: Vec<RawListing>,
    }

    #[async_trait]
    impl SourceAdapter for StaticAdapter {
        fn source(&self) -> JobSource {
            self.source
        }

        async fn fetch(&self, _query: &SearchQuery) -> Result<Vec<RawListing>, ScrapeError> {
            Ok(self.listings.clone())
        }
    }

    struct FailingAdapter {
        source: JobSource,
    }

    #[async_trait]
    impl SourceAdapter for FailingAdapter {
        fn source(&self) -> JobSource {
            self.source
        }

        async fn fetch(&self, _query: &SearchQuery) -> Result<Vec<RawListing>, ScrapeError> {
            Err(ScrapeError::Parse("connection reset".to_string()))
        }
    }

    struct FakeEvaluator {
        calls: AtomicUsize,
    }

    impl FakeEvaluator {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for FakeEvaluator {
        async fn complete(&self, _prompt: &str, _system: &str) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!({
                "title_match": 20,
                "skills_match": 28,
                "location_work_type": 10,
                "salary_fit": 6,
                "experience_level": 7,
                "industry_bonus": 0,
                "rationale": "Solid overlap."
            })
            .to_string())
        }
    }

    /// Deterministic stand-in for the embedding model.
    struct HashEmbedder;

    #[async_trait]
    impl EmbeddingProvider for HashEmbedder {
        fn dimension(&self) -> usize {
            4
        }

        async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbedError> {
            Ok(texts
                .iter()
                .map(|t| {
                    let sum = t.bytes().map(u32::from).sum::<u32>() as f32;
                    vec![sum, t.len() as f32, 1.0, 0.0]
                })
                .collect())
        }
    }

    struct Fixture {
        store: Arc<MemStore>,
        llm: Arc<FakeEvaluator>,
        orchestrator: SearchOrchestrator,
    }

    fn fixture(adapters: Vec<Arc<dyn SourceAdapter>>) -> Fixture {
        let store = Arc::new(MemStore::new());
        let llm = Arc::new(FakeEvaluator::new());
        let scorer = Arc::new(Scorer::new(llm.clone(), 2));
        let mut map: HashMap<JobSource, Arc<dyn SourceAdapter>> = HashMap::new();
        for adapter in adapters {
            map.insert(adapter.source(), adapter);
        }
        let orchestrator = SearchOrchestrator::new(
            store.clone(),
            scorer,
            Arc::new(HashEmbedder),
            map,
            2,
            2,
            0.85,
            true,
        );
        Fixture {
            store,
            llm,
            orchestrator,
        }
    }

    fn request(sources: &str) -> RunRequest {
        RunRequest {
            location: Some("Austin, TX".to_string()),
            keywords: Some("data".to_string()),
            sources: Some(sources.to_string()),
            max_pages: Some(1),
            auto_score: true,
        }
    }

    #[tokio::test]
    async fn failing_source_records_error_and_run_continues() {
        let fixture = fixture(vec![
            Arc::new(StaticAdapter {
                source: JobSource::Heb,
                listings: vec![
                    listing("https://heb.com/1", JobSource::Heb, "Data Analyst", "H-E-B"),
                    listing("https://heb.com/2", JobSource::Heb, "Data Engineer", "H-E-B"),
                ],
            }),
            Arc::new(FailingAdapter {
                source: JobSource::Indeed,
            }),
        ]);

        let run = fixture
            .orchestrator
            .run(&request("heb,indeed"))
            .await
            .unwrap();

        assert_eq!(run.jobs_found, 2);
        assert_eq!(run.new_jobs, 2);
        assert_eq!(run.errors.len(), 1);
        assert!(run.errors[0].starts_with("indeed:"));

        let jobs = fixture
            .store
            .list_jobs(&JobFilter::default())
            .await
            .unwrap();
        assert_eq!(jobs.total, 2);
    }

    #[tokio::test]
    async fn unknown_source_becomes_error_entry() {
        let fixture = fixture(vec![Arc::new(StaticAdapter {
            source: JobSource::Heb,
            listings: vec![listing(
                "https://heb.com/1",
                JobSource::Heb,
                "Data Analyst",
                "H-E-B",
            )],
        })]);

        let run = fixture
            .orchestrator
            .run(&request("heb,bad_source"))
            .await
            .unwrap();

        assert_eq!(run.sources, vec!["heb", "bad_source"]);
        assert_eq!(run.errors, vec!["bad_source: unknown source".to_string()]);
        assert_eq!(run.new_jobs, 1);
    }

    #[tokio::test]
    async fn cross_source_duplicates_count_once() {
        let fixture = fixture(vec![
            Arc::new(StaticAdapter {
                source: JobSource::Indeed,
                listings: vec![listing(
                    "https://indeed.com/a",
                    JobSource::Indeed,
                    "Data Scientist",
                    "Acme",
                )],
            }),
            Arc::new(StaticAdapter {
                source: JobSource::Wellfound,
                listings: vec![listing(
                    "https://wellfound.com/b",
                    JobSource::Wellfound,
                    "Data Scientist",
                    "Acme",
                )],
            }),
        ]);

        // Run sources one at a time so arrival order is deterministic.
        let first = fixture.orchestrator.run(&request("indeed")).await.unwrap();
        let second = fixture
            .orchestrator
            .run(&request("wellfound"))
            .await
            .unwrap();

        assert_eq!(first.new_jobs, 1);
        assert_eq!(second.jobs_found, 1);
        assert_eq!(second.new_jobs, 0);

        let jobs = fixture
            .store
            .list_jobs(&JobFilter::default())
            .await
            .unwrap();
        let canonicals: Vec<_> = jobs
            .items
            .iter()
            .filter(|j| j.duplicate_of.is_none())
            .collect();
        assert_eq!(canonicals.len(), 1);
    }

    #[tokio::test]
    async fn new_jobs_are_scored_and_embedded() {
        let fixture = fixture(vec![Arc::new(StaticAdapter {
            source: JobSource::Heb,
            listings: vec![listing(
                "https://heb.com/1",
                JobSource::Heb,
                "Data Analyst",
                "H-E-B",
            )],
        })]);

        let run = fixture.orchestrator.run(&request("heb")).await.unwrap();
        assert_eq!(run.new_jobs, 1);
        assert_eq!(fixture.llm.calls.load(Ordering::SeqCst), 1);

        let job = fixture
            .store
            .list_jobs(&JobFilter::default())
            .await
            .unwrap()
            .items
            .remove(0);
        assert_eq!(job.fit_score, Some(71.0));
        assert!(fixture
            .store
            .job_embedding(&job.id)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn dealbreaker_job_scores_zero_without_evaluator_call() {
        let fixture = fixture(vec![Arc::new(StaticAdapter {
            source: JobSource::Heb,
            listings: vec![{
                let mut l = listing(
                    "https://heb.com/1",
                    JobSource::Heb,
                    "Data Analyst",
                    "H-E-B",
                );
                l.description = Some("Active clearance required.".to_string());
                l
            }],
        })]);

        fixture
            .store
            .save_profile(&Profile {
                dealbreakers: vec!["clearance required".to_string()],
                ..Profile::default()
            })
            .await
            .unwrap();

        fixture.orchestrator.run(&request("heb")).await.unwrap();

        assert_eq!(fixture.llm.calls.load(Ordering::SeqCst), 0);
        let job = fixture
            .store
            .list_jobs(&JobFilter::default())
            .await
            .unwrap()
            .items
            .remove(0);
        assert_eq!(job.fit_score, Some(0.0));
        assert!(job
            .fit_rationale
            .as_deref()
            .unwrap()
            .contains("clearance required"));
    }

    #[tokio::test]
    async fn auto_score_off_leaves_fit_fields_unset() {
        let fixture = fixture(vec![Arc::new(StaticAdapter {
            source: JobSource::Heb,
            listings: vec![listing(
                "https://heb.com/1",
                JobSource::Heb,
                "Data Analyst",
                "H-E-B",
            )],
        })]);

        let mut req = request("heb");
        req.auto_score = false;
        fixture.orchestrator.run(&req).await.unwrap();

        assert_eq!(fixture.llm.calls.load(Ordering::SeqCst), 0);
        let job = fixture
            .store
            .list_jobs(&JobFilter::default())
            .await
            .unwrap()
            .items
            .remove(0);
        assert!(job.fit_score.is_none());
    }

    #[tokio::test]
    async fn rescrape_preserves_counts_and_user_fields() {
        let adapter = Arc::new(StaticAdapter {
            source: JobSource::Heb,
            listings: vec![listing(
                "https://heb.com/1",
                JobSource::Heb,
                "Data Analyst",
                "H-E-B",
            )],
        });
        let fixture = fixture(vec![adapter]);

        let first = fixture.orchestrator.run(&request("heb")).await.unwrap();
        let second = fixture.orchestrator.run(&request("heb")).await.unwrap();

        assert_eq!(first.new_jobs, 1);
        assert_eq!(second.jobs_found, 1);
        assert_eq!(second.new_jobs, 0);

        let jobs = fixture
            .store
            .list_jobs(&JobFilter::default())
            .await
            .unwrap();
        assert_eq!(jobs.total, 1);
    }
}
