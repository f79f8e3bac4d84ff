//! Wellfound (formerly AngelList) adapter.
//!
//! Wellfound renders through Next.js with an Apollo GraphQL cache; the data
//! worth having ships in the `__NEXT_DATA__` script tag as JSON, so parsing
//! means walking that blob for job-listing nodes rather than CSS scraping.

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::{info, warn};

use crate::models::job::{JobSource, RawListing, WorkType};
use crate::scrapers::{build_http_client, ScrapeError, SearchQuery, SourceAdapter};

const BASE_URL: &str = "https://wellfound.com";
const DEFAULT_ROLE: &str = "data-scientist";

// Compensation strings like "$130k – $180k"
static COMPENSATION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$(\d+)k\s*[–-]\s*\$(\d+)k").expect("invalid pattern")
});

pub struct WellfoundAdapter {
    client: Client,
    delay: Duration,
}

impl WellfoundAdapter {
    pub fn new(delay: Duration) -> Result<Self, ScrapeError> {
        Ok(Self {
            client: build_http_client()?,
            delay,
        })
    }

    fn build_search_url(&self, role: &str, page: u32) -> String {
        let mut url = format!("{BASE_URL}/role/{role}");
        if page > 1 {
            url.push_str(&format!("?page={page}"));
        }
        url
    }
}

#[async_trait]
impl SourceAdapter for WellfoundAdapter {
    fn source(&self) -> JobSource {
        JobSource::Wellfound
    }

    async fn fetch(&self, query: &SearchQuery) -> Result<Vec<RawListing>, ScrapeError> {
        let role = role_slug(&query.keywords);
        let mut listings = Vec::new();

        for page in 1..=query.max_pages.max(1) {
            if page > 1 {
                tokio::time::sleep(self.delay).await;
            }

            let url = self.build_search_url(&role, page);
            info!("Scraping Wellfound role page: {url}");

            let html = self
                .client
                .get(&url)
                .send()
                .await?
                .error_for_status()?
                .text()
                .await?;

            let Some(next_data) = extract_next_data(&html) else {
                warn!("No __NEXT_DATA__ payload on {url}");
                break;
            };

            let page_listings = extract_listings(&next_data);
            if page_listings.is_empty() {
                break;
            }
            listings.extend(page_listings);
        }

        info!(
            "Finished scraping Wellfound. Found {} jobs.",
            listings.len()
        );
        Ok(listings)
    }
}

/// Turns free-form keywords into a role slug ("ML Engineer" -> "ml-engineer").
fn role_slug(keywords: &str) -> String {
    let slug = keywords
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-");
    if slug.is_empty() {
        DEFAULT_ROLE.to_string()
    } else {
        slug
    }
}

/// Pulls the embedded Next.js JSON payload out of the page.
fn extract_next_data(html: &str) -> Option<Value> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("script#__NEXT_DATA__").expect("invalid selector");
    let script = document.select(&selector).next()?;
    let raw = script.text().collect::<String>();
    serde_json::from_str(&raw).ok()
}

/// Walks the Apollo cache for job-listing search results.
fn extract_listings(next_data: &Value) -> Vec<RawListing> {
    let mut nodes = Vec::new();
    collect_listing_nodes(next_data, &mut nodes);

    nodes
        .into_iter()
        .filter_map(|node| {
            let title = node.get("title").and_then(Value::as_str)?.to_string();
            let slug_or_id = node
                .get("slug")
                .and_then(Value::as_str)
                .or_else(|| node.get("id").and_then(Value::as_str))?;
            let url = format!("{BASE_URL}/jobs/{slug_or_id}");

            let company = node
                .get("company")
                .and_then(|c| c.get("name"))
                .and_then(Value::as_str)
                .unwrap_or("Unknown")
                .to_string();
            let location = node
                .get("locationNames")
                .and_then(Value::as_array)
                .and_then(|names| names.first())
                .and_then(Value::as_str)
                .map(str::to_string);
            let remote = node.get("remote").and_then(Value::as_bool).unwrap_or(false);
            let description = node
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string);
            let (salary_min, salary_max) = node
                .get("compensation")
                .and_then(Value::as_str)
                .map(parse_compensation)
                .unwrap_or((None, None));

            Some(RawListing {
                url,
                source: JobSource::Wellfound,
                title,
                company,
                location,
                work_type: remote.then_some(WorkType::Remote),
                salary_min,
                salary_max,
                description,
                requirements: None,
                posted_date: None,
            })
        })
        .collect()
}

fn collect_listing_nodes<'a>(value: &'a Value, out: &mut Vec<&'a serde_json::Map<String, Value>>) {
    match value {
        Value::Object(map) => {
            if matches!(
                map.get("__typename").and_then(Value::as_str),
                Some("JobListingSearchResult") | Some("JobListing")
            ) {
                out.push(map);
            }
            for nested in map.values() {
                collect_listing_nodes(nested, out);
            }
        }
        Value::Array(values) => {
            for nested in values {
                collect_listing_nodes(nested, out);
            }
        }
        _ => {}
    }
}

/// Parses "$130k – $180k" style compensation strings into annual bounds.
fn parse_compensation(raw: &str) -> (Option<i64>, Option<i64>) {
    let Some(captures) = COMPENSATION_PATTERN.captures(raw) else {
        return (None, None);
    };
    let min = captures
        .get(1)
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .map(|v| v * 1000);
    let max = captures
        .get(2)
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .map(|v| v * 1000);
    (min, max)
}
