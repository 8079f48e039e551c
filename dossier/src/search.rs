//! Search pipeline helpers
//!
//! Pieces of a single query run that sit between the stages: picking the
//! query entities that drive filtering, and turning surviving candidates
//! into caller-facing hits.

use crate::candidate::ScoredCandidate;
use crate::extraction::ExtractedEntities;
use crate::interface::{EntityCriteria, EntityKind, SearchHit};
use crate::lookup::EntityLookup;
use crate::models::QueryEntities;
use crate::tokenizer::generate_preview;
use crate::validation::is_valid_entity;

/// Hard ceiling on hits per query regardless of the requested `top_k`.
pub(crate) const MAX_RESULTS: usize = 2000;

/// Query entities for one search.
///
/// Explicit filters win outright. Otherwise NER output is used per type,
/// and a type the NER left empty falls back to the corpus lookup.
pub(crate) fn select_query_entities(
    filters: Option<&EntityCriteria>,
    ner: Option<ExtractedEntities>,
    query: &str,
    lookup: &EntityLookup,
) -> QueryEntities {
    if let Some(filters) = filters {
        if !filters.named().is_empty() {
            return QueryEntities::from_criteria(filters);
        }
    }

    let ner = ner.unwrap_or_default();
    let resolved = lookup.resolve(query);

    let pick = |kind: EntityKind| -> Vec<String> {
        let from_ner: Vec<String> = ner
            .get(kind)
            .iter()
            .map(|e| e.trim())
            .filter(|e| is_valid_entity(e, kind))
            .map(str::to_string)
            .collect();
        if from_ner.is_empty() {
            resolved.get(kind).to_vec()
        } else {
            from_ner
        }
    };

    QueryEntities {
        people: pick(EntityKind::Person),
        locations: pick(EntityKind::Location),
        organizations: pick(EntityKind::Organization),
    }
}

/// Build a hit from a surviving candidate. Documents whose text is no
/// longer held get an empty preview.
pub(crate) fn create_search_hit(candidate: &ScoredCandidate, text: Option<&str>, preview_chars: usize) -> SearchHit {
    SearchHit {
        doc_id: candidate.doc_id.clone(),
        score: candidate.combined_score,
        lexical_score: candidate.lexical_score,
        metadata_score: candidate.metadata_score,
        preview: text.map(|t| generate_preview(t, preview_chars)).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn lookup() -> EntityLookup {
        let mut all = BTreeMap::new();
        all.insert(EntityKind::Person, vec!["Ghislaine Maxwell".to_string()]);
        all.insert(EntityKind::Location, vec!["Paris".to_string()]);
        EntityLookup::build(&all, 3, 10)
    }

    #[test]
    fn test_explicit_filters_replace_extraction() {
        let filters = EntityCriteria::default().organizations(["FBI"]);
        let ner = ExtractedEntities { people: vec!["Maxwell".into()], ..Default::default() };
        let q = select_query_entities(Some(&filters), Some(ner), "Maxwell Paris", &lookup());
        assert!(q.people.is_empty());
        assert!(q.locations.is_empty());
        assert_eq!(q.organizations, vec!["FBI"]);
    }

    #[test]
    fn test_empty_filters_fall_through_to_extraction() {
        let filters = EntityCriteria::default();
        let q = select_query_entities(Some(&filters), None, "Maxwell", &lookup());
        assert_eq!(q.people, vec!["Ghislaine Maxwell"]);
    }

    #[test]
    fn test_lookup_fills_types_ner_missed() {
        let ner = ExtractedEntities { people: vec!["G. Maxwell".into()], ..Default::default() };
        let q = select_query_entities(None, Some(ner), "G. Maxwell in Paris", &lookup());
        assert_eq!(q.people, vec!["G. Maxwell"]);
        assert_eq!(q.locations, vec!["Paris"]);
    }

    #[test]
    fn test_invalid_ner_output_ignored() {
        let ner = ExtractedEntities { people: vec!["ALLLCAPSNAME".into()], ..Default::default() };
        let q = select_query_entities(None, Some(ner), "ALLLCAPSNAME Maxwell", &lookup());
        assert_eq!(q.people, vec!["Ghislaine Maxwell"]);
    }

    #[test]
    fn test_create_search_hit() {
        let mut candidate = ScoredCandidate::new("A", 2.0);
        candidate.apply_boost(0.5);
        let hit = create_search_hit(&candidate, Some("Jeffrey   Epstein\nmet Maxwell"), 200);
        assert_eq!(hit.doc_id, "A");
        assert_eq!(hit.score, 3.0);
        assert_eq!(hit.lexical_score, 2.0);
        assert_eq!(hit.metadata_score, Some(0.5));
        assert_eq!(hit.preview, "Jeffrey Epstein met Maxwell");

        let bare = create_search_hit(&ScoredCandidate::new("B", 1.0), None, 200);
        assert_eq!(bare.preview, "");
        assert_eq!(bare.metadata_score, None);
    }
}
