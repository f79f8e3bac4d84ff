//! Duplicate resolution across sources.
//!
//! The exact pass works on dedup keys: all non-archived jobs sharing a key
//! form one group, and the earliest-scraped member is canonical. The fuzzy
//! pass is advisory and catches cross-source near-duplicates whose keys
//! differ only by title formatting.

pub mod normalize;

use chrono::{DateTime, Utc};

use crate::dedup::normalize::{normalize_company, normalize_title};

/// An existing job sharing the incoming job's dedup key (archived jobs are
/// filtered out before resolution; the incoming job itself is excluded).
#[derive(Debug, Clone)]
pub struct DedupCandidate {
    pub id: String,
    pub scraped_at: DateTime<Utc>,
    pub duplicate_of: Option<String>,
}

/// Outcome of exact-key resolution for one incoming job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// The id that is canonical for this key after ingestion.
    pub canonical_id: String,
    /// Whether the incoming job is a duplicate of `canonical_id`.
    pub is_duplicate: bool,
    /// Previously canonical ids that must now point at `canonical_id`
    /// (set when the incoming job predates them).
    pub demoted: Vec<String>,
}

/// Decides canonical vs duplicate for a job against the same-key group.
///
/// Earliest `scraped_at` wins; ties break on the lexicographically smallest
/// id so concurrent ingestions converge on one winner. Pure function: the
/// caller is responsible for fetching candidates and applying the result
/// inside the same critical section that serializes the key.
pub fn resolve(
    incoming_id: &str,
    incoming_scraped_at: DateTime<Utc>,
    candidates: &[DedupCandidate],
) -> Resolution {
    let mut winner_id = incoming_id;
    let mut winner_scraped_at = incoming_scraped_at;

    for candidate in candidates {
        if (candidate.scraped_at, candidate.id.as_str())
            < (winner_scraped_at, winner_id)
        {
            winner_id = &candidate.id;
            winner_scraped_at = candidate.scraped_at;
        }
    }

    if winner_id == incoming_id {
        // The incoming job is (or stays) canonical; any candidate that was
        // canonical until now must be re-pointed at it.
        let demoted = candidates
            .iter()
            .filter(|c| c.duplicate_of.is_none())
            .map(|c| c.id.clone())
            .collect();
        return Resolution {
            canonical_id: incoming_id.to_string(),
            is_duplicate: false,
            demoted,
        };
    }

    // Follow one hop in case the winner was itself marked a duplicate of an
    // even earlier job outside this candidate set; chains are never stored.
    let canonical_id = candidates
        .iter()
        .find(|c| c.id == winner_id)
        .and_then(|c| c.duplicate_of.clone())
        .unwrap_or_else(|| winner_id.to_string());

    Resolution {
        canonical_id,
        is_duplicate: true,
        demoted: Vec::new(),
    }
}

/// A canonical job considered by the advisory fuzzy pass.
#[derive(Debug, Clone)]
pub struct FuzzyCandidate {
    pub id: String,
    pub title: String,
    pub company: String,
}

/// Checks whether two titles are close enough to be the same posting after
/// normalization: exact normalized equality, or normalized Levenshtein
/// similarity at or above `threshold`.
pub fn is_similar_title(title_a: &str, title_b: &str, threshold: f64) -> bool {
    let norm_a = normalize_title(title_a);
    let norm_b = normalize_title(title_b);

    if norm_a.is_empty() || norm_b.is_empty() {
        return false;
    }
    if norm_a == norm_b {
        return true;
    }

    strsim::normalized_levenshtein(&norm_a, &norm_b) >= threshold
}

/// Advisory cross-source pass: finds a canonical job at the same (normalized)
/// company whose title is similar above `threshold`. Only ever marks the
/// *incoming* job as a duplicate; the matched canonical keeps its scores,
/// notes, and status untouched.
pub fn find_fuzzy_duplicate<'a>(
    title: &str,
    company: &str,
    canonicals: &'a [FuzzyCandidate],
    threshold: f64,
) -> Option<&'a FuzzyCandidate> {
    let norm_company = normalize_company(company);
    if norm_company.is_empty() {
        return None;
    }

    canonicals
        .iter()
        .filter(|c| normalize_company(&c.company) == norm_company)
        .find(|c| is_similar_title(title, &c.title, threshold))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn candidate(id: &str, secs: i64, duplicate_of: Option<&str>) -> DedupCandidate {
        DedupCandidate {
            id: id.to_string(),
            scraped_at: at(secs),
            duplicate_of: duplicate_of.map(str::to_string),
        }
    }

    #[test]
    fn later_arrival_becomes_duplicate_of_earliest() {
        let existing = vec![candidate("aaa", 0, None)];
        let resolution = resolve("bbb", at(60), &existing);
        assert!(resolution.is_duplicate);
        assert_eq!(resolution.canonical_id, "aaa");
        assert!(resolution.demoted.is_empty());
    }

    #[test]
    fn earlier_arrival_demotes_the_current_canonical() {
        let existing = vec![candidate("zzz", 100, None), candidate("yyy", 200, Some("zzz"))];
        let resolution = resolve("aaa", at(0), &existing);
        assert!(!resolution.is_duplicate);
        assert_eq!(resolution.canonical_id, "aaa");
        assert_eq!(resolution.demoted, vec!["zzz".to_string()]);
    }

    #[test]
    fn scraped_at_tie_breaks_on_smallest_id() {
        let existing = vec![candidate("bbb", 0, None)];
        let resolution = resolve("aaa", at(0), &existing);
        assert!(!resolution.is_duplicate);
        assert_eq!(resolution.canonical_id, "aaa");
        assert_eq!(resolution.demoted, vec!["bbb".to_string()]);

        let existing = vec![candidate("aaa", 0, None)];
        let resolution = resolve("bbb", at(0), &existing);
        assert!(resolution.is_duplicate);
        assert_eq!(resolution.canonical_id, "aaa");
    }

    #[test]
    fn empty_candidate_set_means_new_canonical() {
        let resolution = resolve("aaa", at(0), &[]);
        assert!(!resolution.is_duplicate);
        assert_eq!(resolution.canonical_id, "aaa");
        assert!(resolution.demoted.is_empty());
    }

    #[test]
    fn winner_with_duplicate_pointer_resolves_to_its_canonical() {
        // The earliest same-key job was already folded into another canonical
        let existing = vec![candidate("bbb", 0, Some("aaa"))];
        let resolution = resolve("ccc", at(60), &existing);
        assert!(resolution.is_duplicate);
        assert_eq!(resolution.canonical_id, "aaa");
    }

    #[test]
    fn similar_titles_match_above_threshold() {
        assert!(is_similar_title(
            "Senior Data Scientist",
            "Sr. Data Scientist",
            0.85
        ));
        assert!(is_similar_title(
            "Machine Learning Engineer",
            "Machine Learning Enginer",
            0.85
        ));
        assert!(!is_similar_title("Data Scientist", "Accountant", 0.85));
        assert!(!is_similar_title("", "Data Scientist", 0.85));
    }

    #[test]
    fn fuzzy_pass_requires_same_company() {
        let canonicals = vec![
            FuzzyCandidate {
                id: "aaa".to_string(),
                title: "Senior Data Scientist".to_string(),
                company: "Acme, Inc.".to_string(),
            },
            FuzzyCandidate {
                id: "bbb".to_string(),
                title: "Sr Data Scientist".to_string(),
                company: "Globex".to_string(),
            },
        ];

        let hit = find_fuzzy_duplicate("Sr. Data Scientist", "Acme", &canonicals, 0.85);
        assert_eq!(hit.map(|c| c.id.as_str()), Some("aaa"));

        let miss = find_fuzzy_duplicate("Sr. Data Scientist", "Initech", &canonicals, 0.85);
        assert!(miss.is_none());
    }
}
