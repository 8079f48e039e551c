//! Filtering strategies over the tier-1 candidate pool.
//!
//! - `none`: pass-through
//! - `strict`: fuzzy filter, every provided entity type must match
//! - `loose`: fuzzy filter, one provided entity type is enough
//! - `boost`: keep everything, re-rank by lexical × (1 + metadata relevance)
//! - `adaptive`: strict, then loose, then boost, settling on the first
//!   result holding at least `min_candidates` documents

use std::collections::HashSet;

use rayon::prelude::*;
use tracing::debug;

use crate::candidate::{sort_by_combined, ScoredCandidate};
use crate::config::{ConfigError, ConfigResult, ScorerWeights, DEFAULT_DENSITY_CAP};
use crate::interface::{EntityKind, FilterStrategy, MatchMode};
use crate::matcher::EntityMatcher;
use crate::metadata::{MetadataIndex, MetadataResult};
use crate::models::{EntitySet, QueryEntities};

/// Metadata relevance of one document to the query entities, in [0, 1].
///
/// Weighted mean of per-type match scores plus an entity-density term.
/// A type only takes part when the query names entities of that type;
/// density always does. The weighted sum is divided by the weights that
/// took part.
#[derive(Debug, Clone, Copy)]
pub struct MetadataScorer {
    weights: ScorerWeights,
    density_cap: usize,
    matcher: EntityMatcher,
}

impl Default for MetadataScorer {
    fn default() -> Self {
        Self {
            weights: ScorerWeights::default(),
            density_cap: DEFAULT_DENSITY_CAP,
            matcher: EntityMatcher::default(),
        }
    }
}

impl MetadataScorer {
    pub fn new(weights: ScorerWeights, density_cap: usize, matcher: EntityMatcher) -> ConfigResult<Self> {
        weights.validate()?;
        if density_cap == 0 {
            return Err(ConfigError::Zero("density_cap"));
        }
        Ok(Self { weights, density_cap, matcher })
    }

    /// Named entities in the document relative to `density_cap`, capped at 1.
    pub fn density(&self, entities: &EntitySet) -> f64 {
        entities.named_count().min(self.density_cap) as f64 / self.density_cap as f64
    }

    pub fn score(&self, entities: &EntitySet, query: &QueryEntities) -> f64 {
        let mut weighted = 0.0;
        let mut applicable = 0.0;

        for (kind, weight) in [
            (EntityKind::Person, self.weights.person),
            (EntityKind::Location, self.weights.location),
            (EntityKind::Organization, self.weights.organization),
        ] {
            let wanted = query.get(kind);
            if wanted.is_empty() {
                continue;
            }
            let stored = entities.list(kind);
            weighted += weight * self.matcher.match_score(wanted, &stored);
            applicable += weight;
        }

        weighted += self.weights.density * self.density(entities);
        applicable += self.weights.density;

        if applicable <= 0.0 {
            return 0.0;
        }
        (weighted / applicable).clamp(0.0, 1.0)
    }
}

/// Candidates left after filtering and the strategy that produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome {
    pub candidates: Vec<ScoredCandidate>,
    pub applied: FilterStrategy,
}

pub struct FilterEngine {
    matcher: EntityMatcher,
    scorer: MetadataScorer,
}

impl FilterEngine {
    pub fn new(matcher: EntityMatcher, scorer: MetadataScorer) -> Self {
        Self { matcher, scorer }
    }

    pub fn scorer(&self) -> &MetadataScorer {
        &self.scorer
    }

    /// Run `strategy` over `candidates` (ranked, best first). Without query
    /// entities only explicit strict/loose run (as identity filters); every
    /// other strategy hands back the ranked list as `None`.
    pub fn apply(
        &self,
        strategy: FilterStrategy,
        candidates: Vec<ScoredCandidate>,
        query: &QueryEntities,
        min_candidates: usize,
        index: &dyn MetadataIndex,
    ) -> MetadataResult<FilterOutcome> {
        if query.is_empty() && !matches!(strategy, FilterStrategy::Strict | FilterStrategy::Loose) {
            debug!(%strategy, "no query entities, skipping metadata filtering");
            return Ok(FilterOutcome { candidates, applied: FilterStrategy::None });
        }

        let outcome = match strategy {
            FilterStrategy::None => FilterOutcome { candidates, applied: FilterStrategy::None },
            FilterStrategy::Strict => FilterOutcome {
                candidates: self.filter(candidates, query, MatchMode::Fuzzy, index)?,
                applied: FilterStrategy::Strict,
            },
            FilterStrategy::Loose => FilterOutcome {
                candidates: self.filter(candidates, query, MatchMode::Any, index)?,
                applied: FilterStrategy::Loose,
            },
            FilterStrategy::Boost => FilterOutcome {
                candidates: self.boost(candidates, query, index)?,
                applied: FilterStrategy::Boost,
            },
            FilterStrategy::Adaptive => self.adaptive(candidates, query, min_candidates, index)?,
        };

        debug!(requested = %strategy, applied = %outcome.applied, kept = outcome.candidates.len(), "filtered candidates");
        Ok(outcome)
    }

    fn adaptive(
        &self,
        candidates: Vec<ScoredCandidate>,
        query: &QueryEntities,
        min_candidates: usize,
        index: &dyn MetadataIndex,
    ) -> MetadataResult<FilterOutcome> {
        let strict = self.filter(candidates.clone(), query, MatchMode::Fuzzy, index)?;
        if strict.len() >= min_candidates {
            return Ok(FilterOutcome { candidates: strict, applied: FilterStrategy::Strict });
        }
        debug!(strict = strict.len(), min_candidates, "adaptive: strict too narrow, trying loose");

        let loose = self.filter(candidates.clone(), query, MatchMode::Any, index)?;
        if loose.len() >= min_candidates {
            return Ok(FilterOutcome { candidates: loose, applied: FilterStrategy::Loose });
        }
        debug!(loose = loose.len(), min_candidates, "adaptive: loose too narrow, boosting full pool");

        Ok(FilterOutcome {
            candidates: self.boost(candidates, query, index)?,
            applied: FilterStrategy::Boost,
        })
    }

    /// Keep candidates whose metadata passes the fuzzy filter, in rank order.
    fn filter(
        &self,
        candidates: Vec<ScoredCandidate>,
        query: &QueryEntities,
        mode: MatchMode,
        index: &dyn MetadataIndex,
    ) -> MetadataResult<Vec<ScoredCandidate>> {
        if candidates.is_empty() {
            return Ok(candidates);
        }
        let doc_ids: Vec<String> = candidates.iter().map(|c| c.doc_id.clone()).collect();
        let kept: HashSet<String> = index
            .filter_fuzzy(&doc_ids, &query.to_criteria(), mode, &self.matcher)?
            .into_iter()
            .collect();
        Ok(candidates.into_iter().filter(|c| kept.contains(&c.doc_id)).collect())
    }

    /// Score every candidate's metadata and re-rank by the combined score.
    fn boost(
        &self,
        mut candidates: Vec<ScoredCandidate>,
        query: &QueryEntities,
        index: &dyn MetadataIndex,
    ) -> MetadataResult<Vec<ScoredCandidate>> {
        if candidates.is_empty() {
            return Ok(candidates);
        }
        let doc_ids: Vec<String> = candidates.iter().map(|c| c.doc_id.clone()).collect();
        let sets = index.get_many(&doc_ids)?;
        let empty = EntitySet::default();

        candidates.par_iter_mut().for_each(|c| {
            let set = sets.get(&c.doc_id).unwrap_or(&empty);
            c.apply_boost(self.scorer.score(set, query));
        });
        sort_by_combined(&mut candidates);
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MemoryMetadataIndex;

    fn set(people: &[&str], locations: &[&str], organizations: &[&str]) -> EntitySet {
        EntitySet::new()
            .with(EntityKind::Person, people.iter().copied())
            .with(EntityKind::Location, locations.iter().copied())
            .with(EntityKind::Organization, organizations.iter().copied())
    }

    fn query(people: &[&str], locations: &[&str], organizations: &[&str]) -> QueryEntities {
        let own = |v: &[&str]| v.iter().map(|s| s.to_string()).collect();
        QueryEntities { people: own(people), locations: own(locations), organizations: own(organizations) }
    }

    // ── MetadataScorer ───────────────────────────────────────────

    #[test]
    fn test_perfect_match_scores_high() {
        let scorer = MetadataScorer::default();
        let doc = set(&["Jeffrey Epstein", "Ghislaine Maxwell"], &["Paris", "New York"], &["Clinton Foundation"]);
        let score = scorer.score(&doc, &query(&["Epstein", "Maxwell"], &["Paris"], &["Clinton Foundation"]));
        assert!(score > 0.7 && score <= 1.0, "score {score}");
    }

    #[test]
    fn test_no_match_scores_low() {
        let scorer = MetadataScorer::default();
        let doc = set(&["Bill Clinton"], &["London"], &["FBI"]);
        let score = scorer.score(&doc, &query(&["Maxwell"], &["Paris"], &[]));
        assert!(score < 0.3, "score {score}");
    }

    #[test]
    fn test_partial_match_scores_medium() {
        let scorer = MetadataScorer::default();
        let doc = set(&["Jeffrey Epstein", "Bill Clinton"], &["Paris", "London"], &[]);
        let score = scorer.score(&doc, &query(&["Epstein"], &["New York"], &[]));
        assert!(score > 0.2 && score < 0.8, "score {score}");
    }

    #[test]
    fn test_density_contributes() {
        let scorer = MetadataScorer::default();
        let dense = set(
            &["Person1", "Person2", "Person3", "Person4", "Person5"],
            &["Loc1", "Loc2", "Loc3"],
            &["Org1", "Org2"],
        );
        let sparse = set(&["Person1"], &[], &[]);
        let q = query(&["Person1"], &[], &[]);
        assert!(scorer.score(&dense, &q) > scorer.score(&sparse, &q));
    }

    #[test]
    fn test_density_caps() {
        let scorer = MetadataScorer::new(ScorerWeights::default(), 2, EntityMatcher::default()).unwrap();
        assert_eq!(scorer.density(&set(&["A Person", "B Person", "C Person"], &[], &[])), 1.0);
        assert_eq!(scorer.density(&set(&["A Person"], &[], &[])), 0.5);
    }

    #[test]
    fn test_new_rejects_invalid_parameters() {
        let matcher = EntityMatcher::default();
        assert!(matches!(
            MetadataScorer::new(ScorerWeights::default(), 0, matcher),
            Err(ConfigError::Zero("density_cap"))
        ));
        let negative = ScorerWeights { person: -1.0, ..ScorerWeights::default() };
        assert!(matches!(
            MetadataScorer::new(negative, 20, matcher),
            Err(ConfigError::OutOfRange { name: "weights.person", .. })
        ));
        let zero = ScorerWeights { person: 0.0, location: 0.0, organization: 0.0, density: 0.0 };
        assert!(matches!(MetadataScorer::new(zero, 20, matcher), Err(ConfigError::NoPositiveWeight)));
    }

    #[test]
    fn test_normalises_by_applicable_weights() {
        let scorer = MetadataScorer::default();
        // person only: (0.30 * 1 + 0.10 * 1/20) / 0.40
        let score = scorer.score(&set(&["Maxwell"], &[], &[]), &query(&["Maxwell"], &[], &[]));
        assert!((score - (0.30 + 0.10 / 20.0) / 0.40).abs() < 1e-12);
    }

    #[test]
    fn test_empty_query_is_density_only() {
        let scorer = MetadataScorer::default();
        let score = scorer.score(&set(&["Jeffrey Epstein"], &["Paris"], &[]), &QueryEntities::default());
        assert!((score - 0.1).abs() < 1e-12);
    }

    // ── FilterEngine ─────────────────────────────────────────────

    fn fixture() -> (FilterEngine, MemoryMetadataIndex, Vec<ScoredCandidate>) {
        let index = MemoryMetadataIndex::new();
        index.store("A", &set(&["Jeffrey Epstein", "Maxwell"], &["Paris"], &[])).unwrap();
        index.store("B", &set(&[], &["Paris", "London"], &[])).unwrap();
        index.store("C", &set(&[], &["London"], &[])).unwrap();
        let candidates = vec![
            ScoredCandidate::new("B", 2.5),
            ScoredCandidate::new("A", 2.0),
            ScoredCandidate::new("C", 1.0),
            ScoredCandidate::new("D", 0.5),
        ];
        let engine = FilterEngine::new(EntityMatcher::default(), MetadataScorer::default());
        (engine, index, candidates)
    }

    fn ids(outcome: &FilterOutcome) -> Vec<&str> {
        outcome.candidates.iter().map(|c| c.doc_id.as_str()).collect()
    }

    #[test]
    fn test_none_passes_through() {
        let (engine, index, candidates) = fixture();
        let q = query(&["Maxwell"], &["Paris"], &[]);
        let out = engine.apply(FilterStrategy::None, candidates.clone(), &q, 5, &index).unwrap();
        assert_eq!(out.candidates, candidates);
        assert_eq!(out.applied, FilterStrategy::None);
    }

    #[test]
    fn test_strict_and_loose() {
        let (engine, index, candidates) = fixture();
        let q = query(&["Maxwell"], &["Paris"], &[]);
        let strict = engine.apply(FilterStrategy::Strict, candidates.clone(), &q, 5, &index).unwrap();
        assert_eq!(ids(&strict), vec!["A"]);
        let loose = engine.apply(FilterStrategy::Loose, candidates, &q, 5, &index).unwrap();
        assert_eq!(ids(&loose), vec!["B", "A"]);
    }

    #[test]
    fn test_boost_keeps_all_and_reranks() {
        let (engine, index, candidates) = fixture();
        let q = query(&["Maxwell"], &["Paris"], &[]);
        let out = engine.apply(FilterStrategy::Boost, candidates, &q, 5, &index).unwrap();
        assert_eq!(out.candidates.len(), 4);
        assert!(out.candidates.iter().all(|c| c.metadata_score.is_some()));
        // A: 2.0 * (1 + 0.858) outranks B: 2.5 * (1 + 0.35)
        assert_eq!(ids(&out)[0], "A");
        let scores: Vec<f64> = out.candidates.iter().map(|c| c.combined_score).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_adaptive_fallback_chain() {
        let (engine, index, candidates) = fixture();
        let q = query(&["Maxwell"], &["Paris"], &[]);

        let out = engine.apply(FilterStrategy::Adaptive, candidates.clone(), &q, 1, &index).unwrap();
        assert_eq!(out.applied, FilterStrategy::Strict);

        let out = engine.apply(FilterStrategy::Adaptive, candidates.clone(), &q, 2, &index).unwrap();
        assert_eq!(out.applied, FilterStrategy::Loose);
        assert_eq!(ids(&out), vec!["B", "A"]);

        let out = engine.apply(FilterStrategy::Adaptive, candidates, &q, 3, &index).unwrap();
        assert_eq!(out.applied, FilterStrategy::Boost);
        assert_eq!(out.candidates.len(), 4);
    }

    #[test]
    fn test_no_query_entities_degrades() {
        let (engine, index, candidates) = fixture();
        let q = QueryEntities::default();
        for strategy in [FilterStrategy::Boost, FilterStrategy::Adaptive, FilterStrategy::None] {
            let out = engine.apply(strategy, candidates.clone(), &q, 5, &index).unwrap();
            assert_eq!(out.candidates, candidates);
            assert_eq!(out.applied, FilterStrategy::None);
        }
        for strategy in [FilterStrategy::Strict, FilterStrategy::Loose] {
            let out = engine.apply(strategy, candidates.clone(), &q, 5, &index).unwrap();
            assert_eq!(out.candidates, candidates);
            assert_eq!(out.applied, strategy);
        }
    }

    #[test]
    fn test_empty_candidates() {
        let (engine, index, _) = fixture();
        let q = query(&["Maxwell"], &[], &[]);
        for strategy in FilterStrategy::ALL {
            let out = engine.apply(strategy, Vec::new(), &q, 5, &index).unwrap();
            assert!(out.candidates.is_empty());
        }
    }
}
