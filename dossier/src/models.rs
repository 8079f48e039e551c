//! Core data models for Dossier
//!
//! Corpus documents, per-document entity sets and the transient per-query
//! entity lists.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::interface::{EntityCriteria, EntityKind};
use crate::tokenizer::Tokenizer;

// ─────────────────────────────────────────────────────────────────────────────
// CORPUS
// ─────────────────────────────────────────────────────────────────────────────

/// Raw corpus input: one per source file, as handed over by ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub doc_id: String,
    pub text: String,
}

impl SourceDocument {
    pub fn new(doc_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { doc_id: doc_id.into(), text: text.into() }
    }
}

/// A tokenized document as held by the lexical index. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub doc_id: String,
    pub tokens: Vec<String>,
    pub term_frequencies: HashMap<String, u32>,
    pub length: usize,
}

impl Document {
    pub fn from_text(doc_id: &str, text: &str, tokenizer: &Tokenizer) -> Self {
        let tokens = tokenizer.tokenize(text);
        let mut term_frequencies: HashMap<String, u32> = HashMap::new();
        for token in &tokens {
            *term_frequencies.entry(token.clone()).or_insert(0) += 1;
        }
        Self {
            doc_id: doc_id.to_string(),
            length: tokens.len(),
            tokens,
            term_frequencies,
        }
    }

    pub fn term_frequency(&self, term: &str) -> u32 {
        self.term_frequencies.get(term).copied().unwrap_or(0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ENTITIES
// ─────────────────────────────────────────────────────────────────────────────

/// Validated entities of one document. Set semantics per collection; the
/// `BTreeSet`s keep iteration order deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySet {
    pub people: BTreeSet<String>,
    pub organizations: BTreeSet<String>,
    pub locations: BTreeSet<String>,
    pub dates: BTreeSet<String>,
    pub emails: BTreeSet<String>,
}

impl EntitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: EntityKind) -> &BTreeSet<String> {
        match kind {
            EntityKind::Person => &self.people,
            EntityKind::Organization => &self.organizations,
            EntityKind::Location => &self.locations,
            EntityKind::Date => &self.dates,
            EntityKind::Email => &self.emails,
        }
    }

    pub fn get_mut(&mut self, kind: EntityKind) -> &mut BTreeSet<String> {
        match kind {
            EntityKind::Person => &mut self.people,
            EntityKind::Organization => &mut self.organizations,
            EntityKind::Location => &mut self.locations,
            EntityKind::Date => &mut self.dates,
            EntityKind::Email => &mut self.emails,
        }
    }

    pub fn insert(&mut self, kind: EntityKind, value: impl Into<String>) -> bool {
        self.get_mut(kind).insert(value.into())
    }

    pub fn with(mut self, kind: EntityKind, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        for value in values {
            self.insert(kind, value);
        }
        self
    }

    /// Members of `kind` as an owned list (sorted).
    pub fn list(&self, kind: EntityKind) -> Vec<String> {
        self.get(kind).iter().cloned().collect()
    }

    /// Count of people, organizations and locations: the entity-density signal.
    pub fn named_count(&self) -> usize {
        self.people.len() + self.organizations.len() + self.locations.len()
    }

    pub fn total_count(&self) -> usize {
        self.named_count() + self.dates.len() + self.emails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_count() == 0
    }

    /// Iterate `(kind, value)` over every member.
    pub fn iter(&self) -> impl Iterator<Item = (EntityKind, &str)> + '_ {
        EntityKind::ALL
            .into_iter()
            .flat_map(move |kind| self.get(kind).iter().map(move |v| (kind, v.as_str())))
    }
}

/// Entities pulled out of the query text (or supplied explicitly).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryEntities {
    pub people: Vec<String>,
    pub locations: Vec<String>,
    pub organizations: Vec<String>,
}

impl QueryEntities {
    pub fn get(&self, kind: EntityKind) -> &[String] {
        match kind {
            EntityKind::Person => &self.people,
            EntityKind::Location => &self.locations,
            EntityKind::Organization => &self.organizations,
            EntityKind::Date | EntityKind::Email => &[],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.people.is_empty() && self.locations.is_empty() && self.organizations.is_empty()
    }

    /// Explicit filters as query entities; `None` lists become empty.
    pub fn from_criteria(criteria: &EntityCriteria) -> Self {
        Self {
            people: criteria.people.clone().unwrap_or_default(),
            locations: criteria.locations.clone().unwrap_or_default(),
            organizations: criteria.organizations.clone().unwrap_or_default(),
        }
    }

    /// Criteria for `filter_fuzzy`; empty lists map to "no constraint".
    pub fn to_criteria(&self) -> EntityCriteria {
        let opt = |v: &Vec<String>| if v.is_empty() { None } else { Some(v.clone()) };
        EntityCriteria {
            people: opt(&self.people),
            locations: opt(&self.locations),
            organizations: opt(&self.organizations),
            date_range: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_term_frequencies() {
        let doc = Document::from_text("a", "Paris, paris and PARIS again", &Tokenizer::default());
        assert_eq!(doc.length, 5);
        assert_eq!(doc.term_frequency("paris"), 3);
        assert_eq!(doc.term_frequency("and"), 1);
        assert_eq!(doc.term_frequency("london"), 0);
    }

    #[test]
    fn test_entity_set_dedups() {
        let mut set = EntitySet::new();
        assert!(set.insert(EntityKind::Person, "Jeffrey Epstein"));
        assert!(!set.insert(EntityKind::Person, "Jeffrey Epstein"));
        assert_eq!(set.people.len(), 1);
        assert_eq!(set.total_count(), 1);
    }

    #[test]
    fn test_entity_set_named_count_excludes_dates() {
        let set = EntitySet::new()
            .with(EntityKind::Person, ["A Person"])
            .with(EntityKind::Location, ["Paris", "London"])
            .with(EntityKind::Date, ["2015-07-12"]);
        assert_eq!(set.named_count(), 3);
        assert_eq!(set.total_count(), 4);
        assert_eq!(set.iter().count(), 4);
    }

    #[test]
    fn test_query_entities_criteria_roundtrip() {
        let q = QueryEntities {
            people: vec!["Maxwell".into()],
            locations: vec![],
            organizations: vec!["FBI".into()],
        };
        let criteria = q.to_criteria();
        assert_eq!(criteria.people, Some(vec!["Maxwell".to_string()]));
        assert_eq!(criteria.locations, None);
        assert_eq!(QueryEntities::from_criteria(&criteria), q);
    }
}
