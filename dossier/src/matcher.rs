//! Entity name normalisation and fuzzy matching.
//!
//! Two entity strings match when their normalised forms pass a cascade:
//! exact -> substring (either direction) -> LCS similarity ratio at or above
//! the configured threshold. The first stage that succeeds decides; the
//! ratio is only computed when the cheap checks fail.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::{check_unit, ConfigResult, DEFAULT_SIMILARITY_THRESHOLD};

/// Prefixes stripped from the start of a name (after lowercasing), checked in
/// this order so stacked titles like "the dr. " are both removed.
const NAME_PREFIXES: [&str; 6] = ["the ", "mr. ", "ms. ", "mrs. ", "dr. ", "prof. "];

/// Similarity reported by `get_best_match` for a substring hit.
const SUBSTRING_SIMILARITY: f64 = 0.95;

/// Single-letter initials such as "g. " in "g. maxwell".
static INITIALS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[a-z]\.\s*").unwrap());

/// Canonical matching key for an entity string. Never persisted.
pub fn normalize_name(name: &str) -> String {
    let mut lowered = name.trim().to_lowercase();
    for prefix in NAME_PREFIXES {
        if let Some(rest) = lowered.strip_prefix(prefix) {
            lowered = rest.to_string();
        }
    }
    let without_initials = INITIALS.replace_all(&lowered, "");
    without_initials.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Result of comparing two normalised names.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntityMatchKind {
    None,
    Exact,
    Substring,
    Similar(f64),
}

impl EntityMatchKind {
    pub fn is_match(&self) -> bool {
        !matches!(self, EntityMatchKind::None)
    }

    /// Similarity used to rank alternatives: exact 1.0, substring 0.95,
    /// otherwise the ratio itself.
    pub fn similarity(&self) -> f64 {
        match self {
            EntityMatchKind::None => 0.0,
            EntityMatchKind::Exact => 1.0,
            EntityMatchKind::Substring => SUBSTRING_SIMILARITY,
            EntityMatchKind::Similar(ratio) => *ratio,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityMatcher {
    threshold: f64,
}

impl Default for EntityMatcher {
    fn default() -> Self {
        Self { threshold: DEFAULT_SIMILARITY_THRESHOLD }
    }
}

impl EntityMatcher {
    /// Fails unless `threshold` is a finite value in [0, 1].
    pub fn new(threshold: f64) -> ConfigResult<Self> {
        check_unit("similarity_threshold", threshold)?;
        Ok(Self { threshold })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Run the cascade on already-normalised names.
    pub(crate) fn match_normalized(&self, a: &str, b: &str) -> EntityMatchKind {
        if a.is_empty() || b.is_empty() {
            return EntityMatchKind::None;
        }
        if a == b {
            return EntityMatchKind::Exact;
        }
        if a.contains(b) || b.contains(a) {
            return EntityMatchKind::Substring;
        }
        let ratio = lcs_ratio(a, b);
        if ratio >= self.threshold {
            EntityMatchKind::Similar(ratio)
        } else {
            EntityMatchKind::None
        }
    }

    pub fn match_kind(&self, a: &str, b: &str) -> EntityMatchKind {
        self.match_normalized(&normalize_name(a), &normalize_name(b))
    }

    pub fn is_match(&self, a: &str, b: &str) -> bool {
        self.match_kind(a, b).is_match()
    }

    /// True if `query` matches any of `candidates`.
    pub fn match_any<S: AsRef<str>>(&self, query: &str, candidates: &[S]) -> bool {
        let query = normalize_name(query);
        candidates
            .iter()
            .any(|c| self.match_normalized(&query, &normalize_name(c.as_ref())).is_match())
    }

    /// Fraction of `query_entities` matching at least one of `doc_entities`.
    /// Zero when `query_entities` is empty.
    pub fn match_score<Q: AsRef<str>, D: AsRef<str>>(&self, query_entities: &[Q], doc_entities: &[D]) -> f64 {
        if query_entities.is_empty() || doc_entities.is_empty() {
            return 0.0;
        }
        let doc_normalized: Vec<String> = doc_entities.iter().map(|d| normalize_name(d.as_ref())).collect();
        let matched = query_entities
            .iter()
            .filter(|q| {
                let q = normalize_name(q.as_ref());
                doc_normalized.iter().any(|d| self.match_normalized(&q, d).is_match())
            })
            .count();
        matched as f64 / query_entities.len() as f64
    }

    /// Best-scoring candidate for `query`, with its similarity. `None` when
    /// nothing reaches the threshold. Earlier candidates win ties.
    pub fn get_best_match<S: AsRef<str>>(&self, query: &str, candidates: &[S]) -> Option<(String, f64)> {
        let query = normalize_name(query);
        let mut best: Option<(&str, f64)> = None;

        for candidate in candidates {
            let kind = self.match_normalized(&query, &normalize_name(candidate.as_ref()));
            if !kind.is_match() {
                continue;
            }
            let similarity = kind.similarity();
            if best.map_or(true, |(_, s)| similarity > s) {
                best = Some((candidate.as_ref(), similarity));
            }
            if similarity >= 1.0 {
                break;
            }
        }

        best.filter(|&(_, s)| s >= self.threshold)
            .map(|(c, s)| (c.to_string(), s))
    }
}

/// Similarity ratio `2 * LCS / (len_a + len_b)` over characters, in [0, 1].
/// Two empty strings are identical (1.0).
pub fn lcs_ratio(a: &str, b: &str) -> f64 {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let total = a_chars.len() + b_chars.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * lcs_length(&a_chars, &b_chars) as f64 / total as f64
}

/// Longest common subsequence length with two rolling rows.
fn lcs_length(a: &[char], b: &[char]) -> usize {
    let n = b.len();
    let mut prev = vec![0usize; n + 1];
    let mut curr = vec![0usize; n + 1];

    for &ac in a {
        for j in 1..=n {
            curr[j] = if ac == b[j - 1] {
                prev[j - 1] + 1
            } else {
                prev[j].max(curr[j - 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── normalize_name ───────────────────────────────────────────

    #[test]
    fn test_normalize_strips_initials() {
        assert_eq!(normalize_name("G. Maxwell"), normalize_name("Maxwell"));
        assert_eq!(normalize_name("G. Maxwell"), "maxwell");
    }

    #[test]
    fn test_normalize_strips_prefixes() {
        assert_eq!(normalize_name("Dr. John Smith"), "john smith");
        assert_eq!(normalize_name("The FBI"), "fbi");
        assert_eq!(normalize_name("Prof.  Jane   Doe "), "jane doe");
    }

    #[test]
    fn test_normalize_strips_stacked_prefixes() {
        assert_eq!(normalize_name("The Dr. John Smith"), "john smith");
        assert_eq!(normalize_name("the mr. dr. Jane Doe"), "jane doe");
        let m = EntityMatcher::default();
        assert_eq!(m.match_kind("The Dr. John Smith", "John Smith"), EntityMatchKind::Exact);
    }

    #[test]
    fn test_normalize_prefix_only_at_start() {
        assert_eq!(normalize_name("Meet the Press"), "meet the press");
    }

    #[test]
    fn test_normalize_keeps_abbreviation_words() {
        assert_eq!(normalize_name("Little St. James"), "little st. james");
    }

    // ── cascade ──────────────────────────────────────────────────

    #[test]
    fn test_is_match_substring() {
        let m = EntityMatcher::default();
        assert!(m.is_match("Maxwell", "Ghislaine Maxwell"));
        assert!(m.is_match("Ghislaine Maxwell", "Maxwell"));
        assert_eq!(m.match_kind("Maxwell", "Ghislaine Maxwell"), EntityMatchKind::Substring);
    }

    #[test]
    fn test_is_match_rejects_unrelated() {
        let m = EntityMatcher::default();
        assert!(!m.is_match("Maxwell", "Einstein"));
        assert!(!m.is_match("Paris", "London"));
    }

    #[test]
    fn test_is_match_exact_after_normalization() {
        let m = EntityMatcher::default();
        assert_eq!(m.match_kind("Dr. Jane Doe", "jane  doe"), EntityMatchKind::Exact);
    }

    #[test]
    fn test_is_match_similarity_stage() {
        let m = EntityMatcher::default();
        // dropped letter: ratio 2*8/17 ≈ 0.941
        match m.match_kind("Ghislaine", "Ghislane") {
            EntityMatchKind::Similar(r) => assert!(r > 0.9),
            other => panic!("expected similarity match, got {other:?}"),
        }
    }

    #[test]
    fn test_threshold_controls_similarity_stage() {
        let strict = EntityMatcher::new(0.99).unwrap();
        assert!(!strict.is_match("Ghislaine", "Ghislane"));
        assert!(strict.is_match("Maxwell", "Ghislaine Maxwell"));
    }

    #[test]
    fn test_new_rejects_out_of_range_threshold() {
        for bad in [1.5, -0.1, f64::NAN, f64::INFINITY] {
            assert!(EntityMatcher::new(bad).is_err(), "accepted {bad}");
        }
        assert_eq!(EntityMatcher::new(0.0).unwrap().threshold(), 0.0);
        assert_eq!(EntityMatcher::new(1.0).unwrap().threshold(), 1.0);
    }

    #[test]
    fn test_empty_names_never_match() {
        let m = EntityMatcher::default();
        assert!(!m.is_match("", "Maxwell"));
        assert!(!m.is_match("G.", "Maxwell"));
    }

    // ── match_score / match_any / get_best_match ─────────────────

    #[test]
    fn test_match_score() {
        let m = EntityMatcher::default();
        assert_eq!(m.match_score(&["Maxwell", "Paris"], &["Ghislaine Maxwell", "Paris", "London"]), 1.0);
        assert_eq!(m.match_score(&["Maxwell"], &["Clinton"]), 0.0);
        assert_eq!(m.match_score(&["Maxwell", "Trump"], &["Ghislaine Maxwell"]), 0.5);
        assert_eq!(m.match_score::<&str, &str>(&[], &["Paris"]), 0.0);
    }

    #[test]
    fn test_match_any() {
        let m = EntityMatcher::default();
        assert!(m.match_any("Paris", &["London", "Paris"]));
        assert!(!m.match_any("Paris", &["London"]));
        assert!(!m.match_any::<&str>("Paris", &[]));
    }

    #[test]
    fn test_get_best_match_prefers_exact() {
        let m = EntityMatcher::default();
        let best = m.get_best_match("Maxwell", &["Ghislaine Maxwell", "Maxwell", "Einstein"]);
        assert_eq!(best, Some(("Maxwell".to_string(), 1.0)));
    }

    #[test]
    fn test_get_best_match_substring_score() {
        let m = EntityMatcher::default();
        let best = m.get_best_match("Maxwell", &["Einstein", "Ghislaine Maxwell"]);
        assert_eq!(best, Some(("Ghislaine Maxwell".to_string(), SUBSTRING_SIMILARITY)));
    }

    #[test]
    fn test_get_best_match_none_below_threshold() {
        let m = EntityMatcher::default();
        assert_eq!(m.get_best_match("Maxwell", &["Einstein", "Clinton"]), None);
    }

    // ── lcs_ratio ────────────────────────────────────────────────

    #[test]
    fn test_lcs_ratio_bounds() {
        assert_eq!(lcs_ratio("", ""), 1.0);
        assert_eq!(lcs_ratio("abc", ""), 0.0);
        assert_eq!(lcs_ratio("abc", "abc"), 1.0);
        assert_eq!(lcs_ratio("abc", "xyz"), 0.0);
    }

    #[test]
    fn test_lcs_ratio_partial() {
        // LCS("abcd", "abed") = 3 -> 6/8
        assert!((lcs_ratio("abcd", "abed") - 0.75).abs() < 1e-12);
    }
}
