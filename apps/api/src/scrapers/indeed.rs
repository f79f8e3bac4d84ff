//! Indeed search-results adapter.
//!
//! Works entirely off the result cards: Indeed's detail pages are heavily
//! bot-protected, while the cards already carry title, company, location, a
//! snippet, and (often) a salary line.

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::info;
use url::Url;

use crate::models::job::{JobSource, RawListing};
use crate::scrapers::{build_http_client, ScrapeError, SearchQuery, SourceAdapter};

const BASE_URL: &str = "https://www.indeed.com";
const RESULTS_PER_PAGE: u32 = 10;

// Ranges like "$120,000 - $150,000 a year" or "$45 to $55 per hour"
static SALARY_RANGE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\$([0-9,]+(?:\.\d{2})?)\s*(?:-|to|–)\s*\$([0-9,]+(?:\.\d{2})?)\s*(?:a |per )?(year|hour|month)")
        .expect("invalid pattern")
});
static SINGLE_SALARY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\$([0-9,]+(?:\.\d{2})?)\s*(?:a |per )?(year|hour|month)")
        .expect("invalid pattern")
});

pub struct IndeedAdapter {
    client: Client,
    delay: Duration,
}

impl IndeedAdapter {
    pub fn new(delay: Duration) -> Result<Self, ScrapeError> {
        Ok(Self {
            client: build_http_client()?,
            delay,
        })
    }

    fn build_search_url(&self, query: &SearchQuery, start: u32) -> Result<Url, ScrapeError> {
        let mut url =
            Url::parse(&format!("{BASE_URL}/jobs")).map_err(|e| ScrapeError::Build(e.to_string()))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("q", &query.keywords);
            pairs.append_pair("l", &query.location);
            pairs.append_pair("radius", "50");
            pairs.append_pair("fromage", "7");
            if start > 0 {
                pairs.append_pair("start", &start.to_string());
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl SourceAdapter for IndeedAdapter {
    fn source(&self) -> JobSource {
        JobSource::Indeed
    }

    async fn fetch(&self, query: &SearchQuery) -> Result<Vec<RawListing>, ScrapeError> {
        let mut listings = Vec::new();

        for page in 0..query.max_pages.max(1) {
            if page > 0 {
                tokio::time::sleep(self.delay).await;
            }

            let url = self.build_search_url(query, page * RESULTS_PER_PAGE)?;
            info!("Scraping Indeed results page {}: {url}", page + 1);

            let html = self
                .client
                .get(url.as_str())
                .send()
                .await?
                .error_for_status()?
                .text()
                .await?;

            let page_listings = parse_search_page(&html);
            if page_listings.is_empty() {
                break;
            }
            listings.extend(page_listings);
        }

        info!("Finished scraping Indeed. Found {} jobs.", listings.len());
        Ok(listings)
    }
}

fn card_text(card: ElementRef<'_>, selectors: &[&str]) -> Option<String> {
    for raw in selectors {
        let Ok(selector) = Selector::parse(raw) else {
            continue;
        };
        if let Some(element) = card.select(&selector).next() {
            let text = element.text().collect::<String>().trim().to_string();
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

/// Extracts listings from one search-results page.
fn parse_search_page(html: &str) -> Vec<RawListing> {
    let document = Html::parse_document(html);
    let card_selector = Selector::parse("div.job_seen_beacon").expect("invalid selector");
    let link_selector =
        Selector::parse("h2.jobTitle a, a.jcs-JobTitle").expect("invalid selector");

    let mut listings = Vec::new();

    for card in document.select(&card_selector) {
        let Some(link) = card.select(&link_selector).next() else {
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let Ok(url) = Url::parse(BASE_URL).and_then(|base| base.join(href)) else {
            continue;
        };

        let title = link.text().collect::<String>().trim().to_string();
        if title.is_empty() {
            continue;
        }

        let company = card_text(card, &["[data-testid='company-name']", "span.companyName"])
            .unwrap_or_else(|| "Unknown".to_string());
        let location = card_text(card, &["[data-testid='text-location']", "div.companyLocation"]);
        let snippet = card_text(card, &["div.job-snippet", "[class*='snippet']"]);

        let full_text = card.text().collect::<String>();
        let (salary_min, salary_max) = extract_salary(&full_text);

        listings.push(RawListing {
            url: url.to_string(),
            source: JobSource::Indeed,
            title,
            company,
            location,
            work_type: None,
            salary_min,
            salary_max,
            description: snippet,
            requirements: None,
            posted_date: None,
        });
    }

    listings
}

fn parse_amount(raw: &str) -> Option<i64> {
    let cleaned = raw.replace(',', "");
    cleaned.split('.').next().unwrap_or(&cleaned).parse().ok()
}

fn annualize(amount: i64, period: &str) -> i64 {
    match period.to_lowercase().as_str() {
        // 40 hrs/week * 52 weeks
        "hour" => amount * 2080,
        "month" => amount * 12,
        _ => amount,
    }
}

/// Extracts a salary range from card text, normalized to annual figures.
fn extract_salary(text: &str) -> (Option<i64>, Option<i64>) {
    if let Some(captures) = SALARY_RANGE_PATTERN.captures(text) {
        let min = captures.get(1).and_then(|m| parse_amount(m.as_str()));
        let max = captures.get(2).and_then(|m| parse_amount(m.as_str()));
        let period = captures.get(3).map(|m| m.as_str()).unwrap_or("year");
        return (
            min.map(|v| annualize(v, period)),
            max.map(|v| annualize(v, period)),
        );
    }

    if let Some(captures) = SINGLE_SALARY_PATTERN.captures(text) {
        let amount = captures
            .get(1)
            .and_then(|m| parse_amount(m.as_str()))
            .map(|v| annualize(v, captures.get(2).map(|m| m.as_str()).unwrap_or("year")));
        return (amount, amount);
    }

    (None, None)
}
