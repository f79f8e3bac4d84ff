//! H-E-B careers page adapter.

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{info, warn};
use url::Url;

use crate::models::job::{JobSource, RawListing};
use crate::scrapers::{build_http_client, ScrapeError, SearchQuery, SourceAdapter};

const BASE_URL: &str = "https://careers.heb.com";

// Matches salaries like "USD $72,200.00/Yr" or "$141,500.00/Yr"
static SALARY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:USD\s*)?\$([0-9,]+(?:\.\d{2})?)/Yr").expect("invalid pattern"));

pub struct HebAdapter {
    client: Client,
    delay: Duration,
}

impl HebAdapter {
    pub fn new(delay: Duration) -> Result<Self, ScrapeError> {
        Ok(Self {
            client: build_http_client()?,
            delay,
        })
    }

    fn build_search_url(&self, query: &SearchQuery) -> Result<Url, ScrapeError> {
        let mut url = Url::parse(&format!("{BASE_URL}/jobs"))
            .map_err(|e| ScrapeError::Build(e.to_string()))?;
        {
            let mut pairs = url.query_pairs_mut();
            if !query.location.is_empty() {
                pairs.append_pair("location", &query.location);
            }
            if !query.keywords.is_empty() {
                pairs.append_pair("keywords", &query.keywords);
            }
        }
        Ok(url)
    }

    async fn fetch_page(&self, url: &str) -> Result<String, ScrapeError> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}

#[async_trait]
impl SourceAdapter for HebAdapter {
    fn source(&self) -> JobSource {
        JobSource::Heb
    }

    async fn fetch(&self, query: &SearchQuery) -> Result<Vec<RawListing>, ScrapeError> {
        let search_url = self.build_search_url(query)?;
        info!("Scraping H-E-B jobs from: {search_url}");

        let html = self.fetch_page(search_url.as_str()).await?;
        let links = extract_listing_links(&html);

        let mut listings = Vec::new();
        for (index, link) in links.iter().enumerate() {
            if index > 0 {
                // Stay polite to the careers host between detail fetches
                tokio::time::sleep(self.delay).await;
            }

            let job_url = format!("{BASE_URL}{}", link.href);
            let listing = match self.fetch_page(&job_url).await {
                Ok(detail_html) => {
                    parse_job_detail(&detail_html, &job_url, &link.title, &query.location)
                }
                Err(e) => {
                    warn!("Failed to fetch H-E-B job detail {job_url}: {e}");
                    // Keep what the listing page gave us
                    fallback_listing(&job_url, &link.title, &query.location)
                }
            };
            info!("Scraped job: {} at {}", listing.title, listing.company);
            listings.push(listing);
        }

        info!("Finished scraping H-E-B. Found {} jobs.", listings.len());
        Ok(listings)
    }
}

struct ListingLink {
    href: String,
    title: String,
}

/// Pulls internal job links off the search page, skipping "Apply" anchors
/// (those lead to the external application system) and duplicate hrefs.
fn extract_listing_links(html: &str) -> Vec<ListingLink> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(r#"a[href^="/jobs/"]"#).expect("invalid selector");

    let mut seen = std::collections::HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        // Drop query parameters so the id derived from the URL stays stable
        let href = href.split('?').next().unwrap_or(href).to_string();

        let title = element.text().collect::<String>().trim().to_string();
        if title.eq_ignore_ascii_case("apply now") || title.eq_ignore_ascii_case("apply") {
            continue;
        }
        if !seen.insert(href.clone()) {
            continue;
        }

        let title = if title.is_empty() {
            "Unknown Position".to_string()
        } else {
            title
        };
        links.push(ListingLink { href, title });
    }

    links
}

fn fallback_listing(url: &str, title: &str, location: &str) -> RawListing {
    RawListing {
        url: url.to_string(),
        source: JobSource::Heb,
        title: title.to_string(),
        company: "H-E-B".to_string(),
        location: (!location.is_empty()).then(|| location.to_string()),
        work_type: None,
        salary_min: None,
        salary_max: None,
        description: None,
        requirements: None,
        posted_date: None,
    }
}

fn parse_job_detail(
    html: &str,
    url: &str,
    fallback_title: &str,
    fallback_location: &str,
) -> RawListing {
    let document = Html::parse_document(html);

    let mut title = fallback_title.to_string();
    for selector in ["h1", ".job-title", "[class*='title']"] {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            let text = element.text().collect::<String>().trim().to_string();
            if text.len() > 5 && !text.contains("H-E-B") {
                title = text;
                break;
            }
        }
    }

    let mut location = fallback_location.to_string();
    if let Ok(selector) = Selector::parse("[class*='location']") {
        if let Some(element) = document.select(&selector).next() {
            let text = element.text().collect::<String>().trim().to_string();
            if !text.is_empty() {
                location = text.chars().take(200).collect();
            }
        }
    }

    let mut description = String::new();
    for selector in [
        ".job-description",
        "[class*='description']",
        "main",
        "[role='main']",
    ] {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            let text = element
                .text()
                .collect::<Vec<_>>()
                .join("\n")
                .trim()
                .to_string();
            if text.len() > description.len() {
                description = text;
            }
        }
    }

    let page_text = document.root_element().text().collect::<String>();
    // H-E-B posts a single annual figure, not a range
    let salary = extract_salary(&page_text);

    RawListing {
        url: url.to_string(),
        source: JobSource::Heb,
        title,
        company: "H-E-B".to_string(),
        location: (!location.is_empty()).then_some(location),
        work_type: None,
        salary_min: salary,
        salary_max: salary,
        description: if description.is_empty() {
            None
        } else {
            Some(description.chars().take(10_000).collect())
        },
        requirements: None,
        posted_date: None,
    }
}

/// Extracts an annual salary figure from page text.
fn extract_salary(text: &str) -> Option<i64> {
    let captures = SALARY_PATTERN.captures(text)?;
    let raw = captures.get(1)?.as_str().replace(',', "");
    let whole = raw.split('.').next().unwrap_or(&raw);
    whole.parse().ok()
}
