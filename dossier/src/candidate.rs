//! Tier-1 candidate carried through the filtering stage.
//!
//! Created from a lexical hit, then mutated in place by the boost path
//! (metadata score attached, combined score recomputed). Dropped when the
//! query completes.

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub doc_id: String,
    /// BM25 score, always > 0 for candidates produced by the index.
    pub lexical_score: f64,
    /// Metadata relevance in [0, 1]; only set by the boost path.
    pub metadata_score: Option<f64>,
    pub combined_score: f64,
}

impl ScoredCandidate {
    pub fn new(doc_id: impl Into<String>, lexical_score: f64) -> Self {
        Self {
            doc_id: doc_id.into(),
            lexical_score,
            metadata_score: None,
            combined_score: lexical_score,
        }
    }

    /// Attach a metadata score and recompute `combined = lexical × (1 + metadata)`.
    pub fn apply_boost(&mut self, metadata_score: f64) {
        self.metadata_score = Some(metadata_score);
        self.combined_score = self.lexical_score * (1.0 + metadata_score);
    }
}

impl From<(String, f64)> for ScoredCandidate {
    fn from((doc_id, score): (String, f64)) -> Self {
        Self::new(doc_id, score)
    }
}

/// Stable sort by combined score, descending. Equal scores keep their
/// incoming (lexical rank) order.
pub fn sort_by_combined(candidates: &mut [ScoredCandidate]) {
    candidates.sort_by(|a, b| b.combined_score.total_cmp(&a.combined_score));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boost_multiplies_lexical() {
        let mut c = ScoredCandidate::new("a", 2.0);
        assert_eq!(c.combined_score, 2.0);
        c.apply_boost(0.5);
        assert_eq!(c.metadata_score, Some(0.5));
        assert!((c.combined_score - 3.0).abs() < 1e-12);
        assert_eq!(c.lexical_score, 2.0);
    }

    #[test]
    fn test_sort_is_stable_on_ties() {
        let mut v = vec![
            ScoredCandidate::new("first", 1.0),
            ScoredCandidate::new("top", 2.0),
            ScoredCandidate::new("second", 1.0),
        ];
        sort_by_combined(&mut v);
        let ids: Vec<_> = v.iter().map(|c| c.doc_id.as_str()).collect();
        assert_eq!(ids, vec!["top", "first", "second"]);
    }
}
