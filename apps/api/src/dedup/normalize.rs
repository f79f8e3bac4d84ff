//! Text normalization for duplicate detection.
//!
//! Postings for the same role differ across boards in casing, abbreviations,
//! seniority spelling, and company suffixes. Normalization folds those
//! variations into a canonical form so that key comparison is exact.

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

type Substitutions = Vec<(Regex, &'static str)>;

fn compile(table: &[(&str, &'static str)]) -> Substitutions {
    table
        .iter()
        .map(|(pattern, replacement)| {
            (
                Regex::new(pattern).expect("invalid substitution pattern"),
                *replacement,
            )
        })
        .collect()
}

// Common title variations to normalize
static TITLE_SUBSTITUTIONS: Lazy<Substitutions> = Lazy::new(|| {
    compile(&[
        (r"\bsr\.?\b", "senior"),
        (r"\bjr\.?\b", "junior"),
        (r"\bmid-?level\b", "mid"),
        (r"\blead\b", "senior"),
        (r"\bprincipal\b", "senior"),
        (r"\bstaff\b", "senior"),
        // Roman numerals (II, III, IV, ...) and level numbers carry no signal
        (r"\bii+\b", ""),
        (r"\b[ivx]+\b", ""),
        (r"\b[123]\b", ""),
        (r"\bml\b", "machine learning"),
        (r"\bai\b", "artificial intelligence"),
        (r"\bds\b", "data science"),
        (r"\bde\b", "data engineer"),
        (r"\bswe\b", "software engineer"),
        (r"\bengr\.?\b", "engineer"),
        (r"\bdev\.?\b", "developer"),
        (r"\bops\b", "operations"),
        (r"\bdevops\b", "devops"),
        (r"\bfull-?stack\b", "fullstack"),
        (r"\bfront-?end\b", "frontend"),
        (r"\bback-?end\b", "backend"),
    ])
});

// Company name variations to normalize
static COMPANY_SUBSTITUTIONS: Lazy<Substitutions> = Lazy::new(|| {
    compile(&[
        (r"\binc\.?\b", ""),
        (r"\bincorporated\b", ""),
        (r"\bllc\.?\b", ""),
        (r"\bltd\.?\b", ""),
        (r"\blimited\b", ""),
        (r"\bcorp\.?\b", ""),
        (r"\bcorporation\b", ""),
        (r"\bco\.?\b", ""),
        (r"\bcompany\b", ""),
        (r"\bgroup\b", ""),
        (r"\bholdings\b", ""),
        (r"\binternational\b", ""),
        (r"\bglobal\b", ""),
        (r"\bthe\b", ""),
        (r"\b&\b", "and"),
        (r"\binsurance\b", ""),
        (r"\btechnologies?\b", ""),
        (r"\bsolutions?\b", ""),
        (r"\bservices?\b", ""),
        (r"\bsystems?\b", ""),
        (r"\bconsulting\b", ""),
        // Remove dashes/hyphens for companies like H-E-B
        (r"-", ""),
    ])
});

// Location normalization
static LOCATION_SUBSTITUTIONS: Lazy<Substitutions> = Lazy::new(|| {
    compile(&[
        (r"\btx\b", "texas"),
        (r"\bca\b", "california"),
        (r"\bny\b", "new york"),
        (r",\s*usa?\b", ""),
        (r",\s*united states\b", ""),
        // Any remote/hybrid variant collapses to the bare word
        (r"\bremote\b.*", "remote"),
        (r"\bhybrid\b.*", "hybrid"),
    ])
});

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9\s]").expect("invalid pattern"));

/// Lower-cases, applies the substitution table, strips punctuation to spaces
/// and collapses whitespace. Empty or missing input yields an empty string.
fn normalize_text(text: &str, substitutions: &Substitutions) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut text = text.to_lowercase();

    for (pattern, replacement) in substitutions {
        text = pattern.replace_all(&text, *replacement).into_owned();
    }

    let text = NON_ALNUM.replace_all(&text, " ");

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize a job title for comparison.
pub fn normalize_title(title: &str) -> String {
    normalize_text(title, &TITLE_SUBSTITUTIONS)
}

/// Normalize a company name for comparison. Spaces are removed entirely so
/// that "H-E-B" and "HEB" compare equal.
pub fn normalize_company(company: &str) -> String {
    normalize_text(company, &COMPANY_SUBSTITUTIONS).replace(' ', "")
}

/// Normalize a location for comparison.
pub fn normalize_location(location: &str) -> String {
    normalize_text(location, &LOCATION_SUBSTITUTIONS)
}

/// Derives the deduplication key for a posting: a stable 16-hex-char hash of
/// the normalized title and company, plus the city when the location is
/// specific (generic "remote"/"hybrid" locations carry no dedup signal).
/// Pure and deterministic; recomputed on every ingestion, never stored stale.
pub fn dedup_key(title: &str, company: &str, location: Option<&str>) -> String {
    let norm_title = normalize_title(title);
    let norm_company = normalize_company(company);

    let mut key_parts = vec![norm_title, norm_company];

    if let Some(location) = location {
        let norm_loc = normalize_location(location);
        if !norm_loc.is_empty() && norm_loc != "remote" && norm_loc != "hybrid" {
            if let Some(city) = norm_loc.split_whitespace().next() {
                key_parts.push(city.to_string());
            }
        }
    }

    let key_string = key_parts.join("|");
    let digest = Sha256::digest(key_string.as_bytes());
    hex::encode(digest)[..16].to_string()
}
