//! Vector embeddings and nearest-neighbor retrieval.
//!
//! The production provider runs all-MiniLM-L6-v2 in-process via fastembed,
//! which keeps the contract the pipeline relies on: identical text and model
//! version always produce the identical vector, so callers may skip
//! recomputation when content is unchanged. Vectors are L2-normalized, so
//! cosine similarity reduces to a dot product over stored values.

pub mod handlers;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::job::Job;
use crate::store::{JobReader, JobStore, JobWriter};

/// Dimensionality of all-MiniLM-L6-v2 output.
pub const EMBEDDING_DIM: usize = 384;

/// Inputs are truncated to this many whitespace-separated words to stay
/// within the model's token window.
const MAX_EMBED_WORDS: usize = 256;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedding model error: {0}")]
    Model(String),
}

/// Embedding capability. `embed` must be deterministic for a fixed model
/// version, and must accept empty text (a vector is still produced).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn dimension(&self) -> usize;

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbedError>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        self.embed_batch(vec![text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::Model("provider returned no vector".to_string()))
    }
}

/// In-process fastembed provider. The underlying session is not shareable
/// across threads, so calls funnel through a mutex on the blocking pool.
pub struct FastembedProvider {
    model: Arc<Mutex<TextEmbedding>>,
}

impl FastembedProvider {
    pub fn new() -> Result<Self, EmbedError> {
        info!("Loading embedding model: all-MiniLM-L6-v2");
        let model = TextEmbedding::try_new(
            InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_show_download_progress(false),
        )
        .map_err(|e| EmbedError::Model(e.to_string()))?;
        info!("Embedding model loaded");
        Ok(Self {
            model: Arc::new(Mutex::new(model)),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for FastembedProvider {
    fn dimension(&self) -> usize {
        EMBEDDING_DIM
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbedError> {
        let truncated: Vec<String> = texts
            .iter()
            .map(|t| truncate_words(t, MAX_EMBED_WORDS))
            .collect();

        let model = Arc::clone(&self.model);
        let vectors = tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| "embedding model mutex poisoned".to_string())?;
            model.embed(truncated, None).map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| EmbedError::Model(e.to_string()))?
        .map_err(EmbedError::Model)?;

        Ok(vectors
            .into_iter()
            .map(|v| normalize_embedding(&v))
            .collect())
    }
}

/// Keeps the first `max_words` whitespace-separated words.
fn truncate_words(text: &str, max_words: usize) -> String {
    text.split_whitespace()
        .take(max_words)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalize a vector to unit length. Returns the original vector when the
/// norm is zero.
pub fn normalize_embedding(vec: &[f32]) -> Vec<f32> {
    let norm = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        vec.to_vec()
    } else {
        vec.iter().map(|x| x / norm).collect()
    }
}

/// Text basis for a job's embedding: title, company, description and
/// requirements, whichever are present. Empty parts are skipped, and a job
/// with no description still yields embeddable text.
pub fn job_to_text(job: &Job) -> String {
    [
        Some(job.title.as_str()),
        Some(job.company.as_str()),
        job.description.as_deref(),
        job.requirements.as_deref(),
    ]
    .into_iter()
    .flatten()
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join(" ")
}

/// Compute cosine similarity between two vectors. Zero-norm inputs yield 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// A stored embedding row used for retrieval.
#[derive(Debug, Clone)]
pub struct JobEmbedding {
    pub id: String,
    pub embedding: Vec<f32>,
    pub scraped_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SimilarJob {
    pub job_id: String,
    pub score: f32,
}

/// Ranks `items` by descending cosine similarity to `query`, breaking ties
/// with the more recently scraped job. `exclude_id` (the query job itself)
/// is never returned. Small or empty corpora simply yield short results.
pub fn top_k(
    query: &[f32],
    items: &[JobEmbedding],
    k: usize,
    exclude_id: Option<&str>,
) -> Vec<SimilarJob> {
    if items.is_empty() || k == 0 {
        return Vec::new();
    }

    let mut scored: Vec<(&JobEmbedding, f32)> = items
        .iter()
        .filter(|item| Some(item.id.as_str()) != exclude_id)
        .map(|item| (item, cosine_similarity(query, &item.embedding)))
        .collect();

    scored.sort_by(|(a, score_a), (b, score_b)| {
        score_b
            .partial_cmp(score_a)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.scraped_at.cmp(&a.scraped_at))
    });

    scored
        .into_iter()
        .take(k)
        .map(|(item, score)| SimilarJob {
            job_id: item.id.clone(),
            score,
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedFailedUnit {
    pub job_id: String,
    pub error: String,
}

/// Result of a batch embedding operation.
#[derive(Debug, Clone, Serialize)]
pub struct BatchEmbedResult {
    pub embedded: Vec<String>,
    pub failed: Vec<EmbedFailedUnit>,
}

/// Embeds each listed job and persists the vector. Units fail independently;
/// jobs that already carry an embedding are only touched when explicitly
/// listed (the "all unembedded" path pre-filters them out).
pub async fn embed_jobs(
    store: &dyn JobStore,
    provider: &dyn EmbeddingProvider,
    job_ids: Vec<String>,
) -> BatchEmbedResult {
    let mut embedded = Vec::new();
    let mut failed = Vec::new();

    for job_id in job_ids {
        match embed_one(store, provider, &job_id).await {
            Ok(()) => embedded.push(job_id),
            Err(error) => {
                warn!("Embedding failed for job {job_id}: {error}");
                failed.push(EmbedFailedUnit { job_id, error });
            }
        }
    }

    BatchEmbedResult { embedded, failed }
}

async fn embed_one(
    store: &dyn JobStore,
    provider: &dyn EmbeddingProvider,
    job_id: &str,
) -> Result<(), String> {
    let job = store
        .get_job(job_id)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("job not found: {job_id}"))?;

    let vector = provider
        .embed(&job_to_text(&job))
        .await
        .map_err(|e| e.to_string())?;

    store
        .set_embedding(job_id, &vector)
        .await
        .map_err(|e| e.to_string())
}
