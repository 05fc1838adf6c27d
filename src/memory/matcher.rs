//! Reusable answer lookup
//!
//! Linear scan over previously approved or curated exchanges. A candidate
//! qualifies when enough of the new prompt's words also appear in its stored
//! prompt; the most recent qualifying candidate wins, even if an older one
//! overlaps more.

use anyhow::Result;
use std::collections::HashSet;

use super::{InteractionRecord, InteractionStore};

/// Minimum share of the new prompt's words a stored prompt must contain
pub const DEFAULT_OVERLAP_THRESHOLD: f64 = 0.5;

/// Anything that can list reuse candidates, most recent first
pub trait CandidateSource {
    fn reusable_candidates(&self) -> Result<Vec<InteractionRecord>>;
}

impl CandidateSource for InteractionStore {
    fn reusable_candidates(&self) -> Result<Vec<InteractionRecord>> {
        InteractionStore::reusable_candidates(self)
    }
}

/// Lower-cased, whitespace-separated unique words
pub fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(|w| w.to_string())
        .collect()
}

/// Fraction of `query` words present in `candidate`.
///
/// The denominator is always the query's word count. Returns `None` for an
/// empty query.
pub fn overlap_ratio(query: &HashSet<String>, candidate: &HashSet<String>) -> Option<f64> {
    if query.is_empty() {
        return None;
    }
    let shared = query.intersection(candidate).count();
    Some(shared as f64 / query.len() as f64)
}

/// First qualifying candidate's answer, in the order given
pub fn select_reusable<'a, I>(candidates: I, prompt: &str, threshold: f64) -> Option<String>
where
    I: IntoIterator<Item = &'a InteractionRecord>,
{
    let query = tokenize(prompt);
    if query.is_empty() {
        return None;
    }

    for candidate in candidates {
        let ratio = match overlap_ratio(&query, &tokenize(&candidate.prompt)) {
            Some(r) => r,
            None => continue,
        };
        if ratio >= threshold {
            tracing::debug!(
                "Reusing answer from record {} (overlap {:.3})",
                candidate.id,
                ratio
            );
            return Some(candidate.reusable_text().to_string());
        }
    }

    None
}

/// Look up a reusable answer. Storage faults are logged and read as "no match".
pub fn find_reusable_answer<S: CandidateSource + ?Sized>(
    source: &S,
    prompt: &str,
    threshold: f64,
) -> Option<String> {
    if tokenize(prompt).is_empty() {
        return None;
    }

    match source.reusable_candidates() {
        Ok(candidates) => select_reusable(candidates.iter(), prompt, threshold),
        Err(e) => {
            tracing::warn!("Reusable answer lookup failed: {:#}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Feedback;
    use chrono::{Duration, TimeZone, Utc};

    fn candidate(id: i64, prompt: &str, response: &str, curated: Option<&str>) -> InteractionRecord {
        InteractionRecord {
            id,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(id),
            prompt: prompt.to_string(),
            response: response.to_string(),
            feedback: Some(if curated.is_some() { Feedback::Negative } else { Feedback::Positive }),
            curated_response: curated.map(|s| s.to_string()),
        }
    }

    struct FailingSource;

    impl CandidateSource for FailingSource {
        fn reusable_candidates(&self) -> Result<Vec<InteractionRecord>> {
            anyhow::bail!("disk on fire")
        }
    }

    struct FixedSource(Vec<InteractionRecord>);

    impl CandidateSource for FixedSource {
        fn reusable_candidates(&self) -> Result<Vec<InteractionRecord>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_tokenize_collapses_duplicates_and_case() {
        let tokens = tokenize("The  the THE cat\tsat\n");
        assert_eq!(tokens.len(), 3);
        assert!(tokens.contains("the"));
        assert!(tokens.contains("cat"));
        assert!(tokens.contains("sat"));
    }

    #[test]
    fn test_overlap_is_asymmetric() {
        let short = tokenize("weather today");
        let long = tokenize("weather today please");
        assert_eq!(overlap_ratio(&short, &long), Some(1.0));
        let r = overlap_ratio(&long, &short).unwrap();
        assert!((r - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_query_has_no_ratio() {
        assert_eq!(overlap_ratio(&tokenize("   "), &tokenize("anything")), None);
    }

    #[test]
    fn test_blank_prompt_never_matches() {
        let candidates = vec![candidate(1, "", "empty", None), candidate(2, "hi", "hello", None)];
        assert_eq!(select_reusable(candidates.iter(), "", 0.5), None);
        assert_eq!(select_reusable(candidates.iter(), " \t\n", 0.5), None);
        assert_eq!(select_reusable(candidates.iter(), "", 0.0), None);
    }

    #[test]
    fn test_empty_candidate_prompt_never_qualifies() {
        let candidates = vec![candidate(1, "", "empty", None)];
        assert_eq!(select_reusable(candidates.iter(), "hello world", 0.5), None);
    }

    #[test]
    fn test_case_insensitive_exact_match() {
        let candidates = vec![candidate(1, "What is the capital of France?", "Paris", None)];
        // "france?" and "france" are different words, 5 of 6 shared
        assert_eq!(
            select_reusable(candidates.iter(), "what is the capital of france", 0.5),
            Some("Paris".to_string())
        );
    }

    #[test]
    fn test_below_threshold_is_rejected() {
        let candidates = vec![candidate(1, "rust borrow checker", "lifetimes", None)];
        // 1 of 3 words shared
        assert_eq!(select_reusable(candidates.iter(), "python borrow rules", 0.5), None);
    }

    #[test]
    fn test_first_qualifying_wins_over_better_match() {
        // newest first: exactly-threshold newer record, perfect older record
        let candidates = vec![
            candidate(2, "alpha beta", "newer", None),
            candidate(1, "alpha beta gamma delta", "older", None),
        ];
        assert_eq!(
            select_reusable(candidates.iter(), "alpha beta gamma delta", 0.5),
            Some("newer".to_string())
        );
    }

    #[test]
    fn test_curated_preferred() {
        let candidates = vec![candidate(1, "weather today", "It will rain", Some("It's sunny, 20°C"))];
        assert_eq!(
            select_reusable(candidates.iter(), "weather today please", 0.5),
            Some("It's sunny, 20°C".to_string())
        );
    }

    #[test]
    fn test_scan_fault_reads_as_no_match() {
        assert_eq!(find_reusable_answer(&FailingSource, "anything at all", 0.5), None);
    }

    #[test]
    fn test_find_uses_source_order() {
        let source = FixedSource(vec![
            candidate(3, "deploy the service", "use the script", None),
            candidate(1, "deploy the service now", "older", None),
        ]);
        assert_eq!(
            find_reusable_answer(&source, "how to deploy the service", 0.5),
            Some("use the script".to_string())
        );
    }
}
