//! Query entity lookup
//!
//! Gazetteer of the entities already known to the metadata index, built
//! once per corpus load. It resolves query words like "epstein" to stored
//! entities ("Jeffrey Epstein") when the NER collaborator finds nothing in
//! a short query.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::interface::EntityKind;
use crate::matcher::normalize_name;
use crate::models::QueryEntities;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "from", "that", "this", "what", "who", "where", "when", "which",
    "about", "into", "was", "were", "are", "has", "had", "have", "did", "does", "not", "all",
    "any", "between", "after", "before", "show", "find", "documents", "document", "emails",
    "email", "flight", "flights", "logs", "meeting", "meetings",
];

#[derive(Debug, Default)]
pub struct EntityLookup {
    /// normalized word or full name -> (kind, entity), in insertion order
    index: HashMap<String, Vec<(EntityKind, String)>>,
    min_token_length: usize,
    max_matches: usize,
}

impl EntityLookup {
    /// Index every person, location and organization in `all_entities`
    /// under its full normalised name and each normalised word.
    pub fn build(
        all_entities: &BTreeMap<EntityKind, Vec<String>>,
        min_token_length: usize,
        max_matches: usize,
    ) -> Self {
        let mut index: HashMap<String, Vec<(EntityKind, String)>> = HashMap::new();
        let mut add = |key: String, kind: EntityKind, entity: &str| {
            let entries = index.entry(key).or_default();
            if !entries.iter().any(|(k, e)| *k == kind && e == entity) {
                entries.push((kind, entity.to_string()));
            }
        };

        for kind in EntityKind::NAMED {
            let Some(entities) = all_entities.get(&kind) else {
                continue;
            };
            for entity in entities {
                let normalized = normalize_name(entity);
                if normalized.is_empty() {
                    continue;
                }
                for word in normalized.split_whitespace() {
                    let word = word.trim_matches(|c: char| !c.is_alphanumeric());
                    if word.chars().count() >= min_token_length {
                        add(word.to_string(), kind, entity);
                    }
                }
                add(normalized, kind, entity);
            }
        }

        debug!(keys = index.len(), "built entity lookup");
        Self { index, min_token_length, max_matches }
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Known entities referenced by words of `query`, at most `max_matches`
    /// per type, in query order.
    pub fn resolve(&self, query: &str) -> QueryEntities {
        let mut out = QueryEntities::default();
        if self.index.is_empty() {
            return out;
        }

        for word in query.split_whitespace() {
            let word = word
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            if word.chars().count() < self.min_token_length || STOPWORDS.contains(&word.as_str()) {
                continue;
            }
            let Some(entries) = self.index.get(&normalize_name(&word)) else {
                continue;
            };
            for (kind, entity) in entries {
                let list = match kind {
                    EntityKind::Person => &mut out.people,
                    EntityKind::Location => &mut out.locations,
                    EntityKind::Organization => &mut out.organizations,
                    EntityKind::Date | EntityKind::Email => continue,
                };
                if list.len() < self.max_matches && !list.contains(entity) {
                    list.push(entity.clone());
                }
            }
        }
        out
    }
}
