//! Property tests for filtering strategies, ranking and metadata storage.

use std::collections::HashSet;

use dossier::{
    Bm25Index, Bm25Params, EntityKind, EntityMatcher, EntitySet, FilterEngine, FilterStrategy, MemoryMetadataIndex,
    MetadataIndex, MetadataScorer, QueryEntities, ScoredCandidate, SourceDocument, SqliteMetadataIndex, Tokenizer,
};
use proptest::prelude::*;

const NAMES: &[&str] = &[
    "Maxwell",
    "Ghislaine Maxwell",
    "Jeffrey Epstein",
    "Paris",
    "London",
    "New York",
    "FBI",
    "Clinton Foundation",
];

const WORDS: &[&str] = &["maxwell", "paris", "london", "flight", "logs", "weather", "met", "trips"];

fn names() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(prop::sample::select(NAMES), 0..3)
        .prop_map(|v| v.into_iter().map(str::to_string).collect())
}

fn entity_set() -> impl Strategy<Value = EntitySet> {
    (names(), names(), names()).prop_map(|(people, locations, organizations)| {
        EntitySet::new()
            .with(EntityKind::Person, people)
            .with(EntityKind::Location, locations)
            .with(EntityKind::Organization, organizations)
    })
}

fn query_entities() -> impl Strategy<Value = QueryEntities> {
    (names(), names(), names()).prop_map(|(people, locations, organizations)| QueryEntities {
        people,
        locations,
        organizations,
    })
}

/// Candidates with descending positive scores, each with a stored entity set.
fn scenario() -> impl Strategy<Value = (MemoryMetadataIndex, Vec<ScoredCandidate>)> {
    prop::collection::vec(entity_set(), 0..12).prop_map(|sets| {
        let index = MemoryMetadataIndex::new();
        let mut candidates = Vec::with_capacity(sets.len());
        for (i, set) in sets.iter().enumerate() {
            let doc_id = format!("doc-{}", i);
            index.store(&doc_id, set).unwrap();
            candidates.push(ScoredCandidate::new(doc_id, (sets.len() - i) as f64));
        }
        (index, candidates)
    })
}

fn engine() -> FilterEngine {
    FilterEngine::new(EntityMatcher::default(), MetadataScorer::default())
}

fn ids(candidates: &[ScoredCandidate]) -> HashSet<String> {
    candidates.iter().map(|c| c.doc_id.clone()).collect()
}

proptest! {
    #[test]
    fn test_strict_is_subset_of_loose((index, candidates) in scenario(), query in query_entities()) {
        let engine = engine();
        let strict = engine.apply(FilterStrategy::Strict, candidates.clone(), &query, 0, &index).unwrap();
        let loose = engine.apply(FilterStrategy::Loose, candidates, &query, 0, &index).unwrap();
        prop_assert!(ids(&strict.candidates).is_subset(&ids(&loose.candidates)));
    }

    #[test]
    fn test_boost_preserves_count((index, candidates) in scenario(), query in query_entities()) {
        let n = candidates.len();
        let outcome = engine().apply(FilterStrategy::Boost, candidates, &query, 0, &index).unwrap();
        prop_assert_eq!(outcome.candidates.len(), n);
        prop_assert!(outcome.candidates.windows(2).all(|w| w[0].combined_score >= w[1].combined_score));
    }

    #[test]
    fn test_adaptive_respects_floor(
        (index, candidates) in scenario(),
        query in query_entities(),
        min_candidates in 0usize..15,
    ) {
        let n = candidates.len();
        let outcome = engine().apply(FilterStrategy::Adaptive, candidates, &query, min_candidates, &index).unwrap();
        prop_assert!(outcome.candidates.len() >= min_candidates.min(n));
    }

    #[test]
    fn test_rank_scores_positive(
        texts in prop::collection::vec(prop::collection::vec(prop::sample::select(WORDS), 0..10), 0..8),
        query in prop::collection::vec(prop::sample::select(WORDS), 1..4),
    ) {
        let docs: Vec<SourceDocument> = texts
            .iter()
            .enumerate()
            .map(|(i, words)| SourceDocument::new(format!("d{}", i), words.join(" ")))
            .collect();
        let index = Bm25Index::build(&docs, &Tokenizer::default(), Bm25Params::default()).unwrap();
        let terms: Vec<String> = query.iter().map(|w| w.to_string()).collect();

        let ranked = index.rank(&terms, 100);
        prop_assert!(ranked.iter().all(|(_, score)| *score > 0.0));
        prop_assert!(ranked.windows(2).all(|w| w[0].1 >= w[1].1));
        for (doc_id, _) in &ranked {
            let doc = index.document(doc_id).unwrap();
            prop_assert!(terms.iter().any(|t| doc.term_frequency(t) > 0));
        }
    }

    #[test]
    fn test_entity_set_round_trip(set in entity_set()) {
        let sqlite = SqliteMetadataIndex::open_in_memory().unwrap();
        let memory = MemoryMetadataIndex::new();
        for index in [&sqlite as &dyn MetadataIndex, &memory] {
            index.store("doc", &set).unwrap();
            prop_assert_eq!(index.get("doc").unwrap(), Some(set.clone()));
        }
    }
}
