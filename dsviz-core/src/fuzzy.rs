/// Approximate matching of object class names
use std::fmt::Debug;

use regex::{Regex, RegexBuilder};

/// Ranks candidate names against a query, best match first.
///
/// Non-matching candidates are left out.
pub trait FuzzyMatcher: Debug + Send + Sync {
    fn rank<'a>(&self, query: &str, candidates: &[&'a str]) -> Vec<&'a str>;
}

/// Matches candidates that contain the query's characters in order.
///
/// Ranking: shortest matching span, then earliest span start, then the
/// candidate name itself so ties are stable.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubsequenceMatcher {
    pub case_sensitive: bool,
}

impl SubsequenceMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn pattern(&self, query: &str) -> Option<Regex> {
        let body = query
            .chars()
            .map(|c| regex::escape(&c.to_string()))
            .collect::<Vec<_>>()
            .join(".*?");
        RegexBuilder::new(&format!("^{body}"))
            .case_insensitive(!self.case_sensitive)
            .build()
            .map_err(|e| log::error!("Failed to build fuzzy pattern for {query:?}: {e}"))
            .ok()
    }

    /// Shortest `(length, start)` span of `candidate` matching the pattern, in chars
    fn best_span(pattern: &Regex, candidate: &str) -> Option<(usize, usize)> {
        candidate
            .char_indices()
            .enumerate()
            .filter_map(|(char_start, (byte_start, _))| {
                let tail = &candidate[byte_start..];
                pattern
                    .find(tail)
                    .map(|m| (tail[..m.end()].chars().count(), char_start))
            })
            .min()
    }
}

impl FuzzyMatcher for SubsequenceMatcher {
    fn rank<'a>(&self, query: &str, candidates: &[&'a str]) -> Vec<&'a str> {
        if query.is_empty() {
            let mut all = candidates.to_vec();
            all.sort_unstable();
            return all;
        }
        let Some(pattern) = self.pattern(query) else {
            return Vec::new();
        };

        let mut scored: Vec<((usize, usize), &'a str)> = candidates
            .iter()
            .filter_map(|candidate| Self::best_span(&pattern, candidate).map(|span| (span, *candidate)))
            .collect();
        scored.sort();
        scored.into_iter().map(|(_, candidate)| candidate).collect()
    }
}
