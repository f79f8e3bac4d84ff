//! Job fit scoring against the user profile.
//!
//! Dealbreakers are checked locally first: a hit short-circuits to a zero
//! score without spending an evaluator call. Otherwise the rubric prompt is
//! sent to the configured LLM provider, which returns per-criterion
//! sub-scores; those are summed and clamped to [0, 100]. Evaluator failures
//! (HTTP, malformed output) retry with exponential backoff; once attempts
//! are exhausted the job is flagged score-failed and its fit fields stay
//! unset. Scoring never touches any other job's state, so batches run with
//! bounded concurrency.

pub mod handlers;
pub mod prompts;

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::llm::LlmProvider;
use crate::models::job::Job;
use crate::models::profile::Profile;
use crate::store::{JobReader, JobStore, JobWriter};

#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("evaluator failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

/// Sub-scores as returned by the rubric evaluator.
#[derive(Debug, Deserialize)]
struct RubricScores {
    title_match: f64,
    skills_match: f64,
    location_work_type: f64,
    salary_fit: f64,
    experience_level: f64,
    #[serde(default)]
    industry_bonus: f64,
    rationale: String,
    #[serde(default)]
    matching_skills: Vec<String>,
    #[serde(default)]
    missing_skills: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreOutcome {
    pub fit_score: f64,
    pub rationale: String,
    pub matching_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    pub dealbreaker_triggered: Option<String>,
}

/// Returns the first dealbreaker phrase found in the job's description or
/// requirements, case-insensitively. Pure; no evaluator involvement.
pub fn check_dealbreakers(job: &Job, profile: &Profile) -> Option<String> {
    let haystack = format!(
        "{}\n{}",
        job.description.as_deref().unwrap_or(""),
        job.requirements.as_deref().unwrap_or("")
    )
    .to_lowercase();

    profile
        .dealbreakers
        .iter()
        .filter(|phrase| !phrase.trim().is_empty())
        .find(|phrase| haystack.contains(&phrase.to_lowercase()))
        .cloned()
}

pub struct Scorer {
    llm: Arc<dyn LlmProvider>,
    max_attempts: u32,
}

impl Scorer {
    pub fn new(llm: Arc<dyn LlmProvider>, max_attempts: u32) -> Self {
        Self {
            llm,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Scores one job against the profile. Reads nothing but its arguments.
    pub async fn score(&self, job: &Job, profile: &Profile) -> Result<ScoreOutcome, ScoreError> {
        if let Some(phrase) = check_dealbreakers(job, profile) {
            info!("Dealbreaker '{phrase}' triggered for job {}", job.id);
            return Ok(ScoreOutcome {
                fit_score: 0.0,
                rationale: format!("Dealbreaker triggered: \"{phrase}\""),
                matching_skills: Vec::new(),
                missing_skills: Vec::new(),
                dealbreaker_triggered: Some(phrase),
            });
        }

        let prompt = prompts::build_scoring_prompt(job, profile);
        info!("Scoring job: {} at {}", job.title, job.company);

        let mut last_error = String::new();
        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, ...
                let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "Scoring attempt {attempt} for job {} failed ({last_error}), retrying after {}ms",
                    job.id,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            match self.evaluate(&prompt).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) => last_error = e,
            }
        }

        Err(ScoreError::Exhausted {
            attempts: self.max_attempts,
            last_error,
        })
    }

    async fn evaluate(&self, prompt: &str) -> Result<ScoreOutcome, String> {
        let value = self
            .llm
            .complete_json(prompt, prompts::SCORING_SYSTEM_PROMPT)
            .await
            .map_err(|e| e.to_string())?;

        let rubric: RubricScores = serde_json::from_value(value)
            .map_err(|e| format!("malformed evaluator output: {e}"))?;

        let total = rubric.title_match
            + rubric.skills_match
            + rubric.location_work_type
            + rubric.salary_fit
            + rubric.experience_level
            + rubric.industry_bonus;

        Ok(ScoreOutcome {
            fit_score: total.clamp(0.0, 100.0),
            rationale: rubric.rationale,
            matching_skills: rubric.matching_skills,
            missing_skills: rubric.missing_skills,
            dealbreaker_triggered: None,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredUnit {
    pub job_id: String,
    pub fit_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedUnit {
    pub job_id: String,
    pub error: String,
}

/// Result of a batch scoring operation. Failed units never abort the batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchScoreResult {
    pub scored: Vec<ScoredUnit>,
    pub failed: Vec<FailedUnit>,
}

/// Scores a set of jobs with bounded concurrency, persisting each result as
/// it lands. A unit that fails (missing job, exhausted evaluator, store
/// error) is reported under `failed`; its siblings are unaffected.
pub async fn score_jobs(
    store: &dyn JobStore,
    scorer: &Scorer,
    profile: &Profile,
    job_ids: Vec<String>,
    concurrency: usize,
) -> BatchScoreResult {
    let results = stream::iter(job_ids)
        .map(|job_id| async move {
            let outcome = score_one(store, scorer, profile, &job_id).await;
            (job_id, outcome)
        })
        .buffer_unordered(concurrency.max(1))
        .collect::<Vec<_>>()
        .await;

    let mut scored = Vec::new();
    let mut failed = Vec::new();
    for (job_id, outcome) in results {
        match outcome {
            Ok(fit_score) => scored.push(ScoredUnit { job_id, fit_score }),
            Err(error) => failed.push(FailedUnit { job_id, error }),
        }
    }

    BatchScoreResult { scored, failed }
}

async fn score_one(
    store: &dyn JobStore,
    scorer: &Scorer,
    profile: &Profile,
    job_id: &str,
) -> Result<f64, String> {
    let job = store
        .get_job(job_id)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("job not found: {job_id}"))?;

    match scorer.score(&job, profile).await {
        Ok(outcome) => {
            store
                .set_fit_score(job_id, outcome.fit_score, &outcome.rationale)
                .await
                .map_err(|e| e.to_string())?;
            Ok(outcome.fit_score)
        }
        Err(e) => {
            // Flag the job so "score-failed" is queryable; fit fields stay unset.
            if let Err(store_err) = store.mark_score_failed(job_id).await {
                warn!("Failed to flag score failure for {job_id}: {store_err}");
            }
            Err(e.to_string())
        }
    }
}
