//! Source adapters.
//!
//! Each adapter is an independent unit satisfying the same contract: fetch
//! raw listings for a query. Adapters own their politeness — every one
//! enforces the configured inter-request delay against its own host — and
//! the orchestrator composes them through the map returned by
//! [`build_adapters`]. Extraction here is best-effort by design; missing
//! fields are left empty rather than treated as failures.

pub mod heb;
pub mod indeed;
pub mod wellfound;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::Config;
use crate::models::job::{JobSource, RawListing};

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to build adapter: {0}")]
    Build(String),

    #[error("failed to parse page: {0}")]
    Parse(String),
}

/// Query shared by every adapter in one run. Adapters interpret the fields
/// as their board allows (e.g. wellfound turns keywords into a role slug).
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub location: String,
    pub keywords: String,
    pub max_pages: u32,
}

/// One job board. `fetch` returns every listing discovered for the query;
/// a failure here is recorded as a per-source error by the orchestrator and
/// never aborts the surrounding run.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source(&self) -> JobSource;

    async fn fetch(&self, query: &SearchQuery) -> Result<Vec<RawListing>, ScrapeError>;
}

/// Builds the full adapter registry, keyed by source name.
pub fn build_adapters(config: &Config) -> HashMap<JobSource, Arc<dyn SourceAdapter>> {
    let mut adapters: HashMap<JobSource, Arc<dyn SourceAdapter>> = HashMap::new();
    if let Ok(adapter) = heb::HebAdapter::new(config.scrape_delay) {
        adapters.insert(JobSource::Heb, Arc::new(adapter));
    }
    if let Ok(adapter) = indeed::IndeedAdapter::new(config.scrape_delay) {
        adapters.insert(JobSource::Indeed, Arc::new(adapter));
    }
    if let Ok(adapter) = wellfound::WellfoundAdapter::new(config.scrape_delay) {
        adapters.insert(JobSource::Wellfound, Arc::new(adapter));
    }
    adapters
}

/// Shared reqwest client configuration for board fetches.
pub(crate) fn build_http_client() -> Result<reqwest::Client, ScrapeError> {
    reqwest::Client::builder()
        .user_agent(
            "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
        )
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| ScrapeError::Build(e.to_string()))
}
