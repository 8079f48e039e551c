//! Metadata index
//!
//! Per-document entity sets keyed by `doc_id`, plus the filtering and tag
//! analytics built on them. `MetadataIndex` is the seam: `SqliteMetadataIndex`
//! (in `database.rs`) persists to disk, `MemoryMetadataIndex` keeps
//! everything in a map for tests and the demo corpus.

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::interface::{EntityCriteria, EntityKind, MatchMode};
use crate::matcher::EntityMatcher;
use crate::models::EntitySet;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type MetadataResult<T> = Result<T, MetadataError>;

/// A tag (entity value) and the number of documents carrying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCount {
    pub tag: String,
    pub count: usize,
}

impl TagCount {
    pub fn new(tag: impl Into<String>, count: usize) -> Self {
        Self { tag: tag.into(), count }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagStatistics {
    pub unique_counts: BTreeMap<EntityKind, usize>,
    pub total_unique: usize,
    pub most_common: BTreeMap<EntityKind, TagCount>,
    /// Mean documents per tag, rounded to two decimals.
    pub average_frequency: BTreeMap<EntityKind, f64>,
}

/// Keyed store of validated entity sets.
///
/// Reads may run concurrently. `store` replaces a document's set wholesale
/// and implementations serialise writes.
pub trait MetadataIndex: Send + Sync {
    /// Replace the entity set of `doc_id` (delete-then-insert).
    fn store(&self, doc_id: &str, entities: &EntitySet) -> MetadataResult<()>;

    fn get(&self, doc_id: &str) -> MetadataResult<Option<EntitySet>>;

    /// Returns whether anything was stored for `doc_id`.
    fn remove(&self, doc_id: &str) -> MetadataResult<bool>;

    fn count(&self) -> MetadataResult<usize>;

    /// All stored document ids, sorted.
    fn doc_ids(&self) -> MetadataResult<Vec<String>>;

    /// Sorted unique values per kind. Kinds with no values are omitted.
    fn all_entities(&self) -> MetadataResult<BTreeMap<EntityKind, Vec<String>>>;

    /// Subset of `doc_ids` (input order kept) whose stored entities equal at
    /// least one value of every provided list, and carry a date inside
    /// `criteria.date_range` when one is given.
    fn filter_exact(&self, doc_ids: &[String], criteria: &EntityCriteria) -> MetadataResult<Vec<String>>;

    /// Documents per tag of `kind`, by count descending then tag.
    fn tag_frequencies(&self, kind: EntityKind) -> MetadataResult<Vec<TagCount>>;

    /// Tags of `kind` appearing alongside `tag` in the same documents, by
    /// count descending then tag. Only people, locations and organizations
    /// are supported; other kinds yield nothing.
    fn co_occurring_tags(&self, tag: &str, kind: EntityKind, limit: usize) -> MetadataResult<Vec<TagCount>>;

    /// Entity sets for `doc_ids`; ids without a stored set are absent.
    fn get_many(&self, doc_ids: &[String]) -> MetadataResult<HashMap<String, EntitySet>> {
        let mut out = HashMap::with_capacity(doc_ids.len());
        for doc_id in doc_ids {
            if let Some(set) = self.get(doc_id)? {
                out.insert(doc_id.clone(), set);
            }
        }
        Ok(out)
    }

    /// Subset of `doc_ids` (input order kept) matching `criteria` through
    /// the fuzzy matcher. Documents without metadata count as empty sets.
    fn filter_fuzzy(
        &self,
        doc_ids: &[String],
        criteria: &EntityCriteria,
        mode: MatchMode,
        matcher: &EntityMatcher,
    ) -> MetadataResult<Vec<String>> {
        if criteria.named().is_empty() {
            return Ok(doc_ids.to_vec());
        }
        let sets = self.get_many(doc_ids)?;
        let empty = EntitySet::default();

        Ok(doc_ids
            .par_iter()
            .filter(|id| {
                let set = sets.get(id.as_str()).unwrap_or(&empty);
                matches_fuzzy(set, criteria, mode, matcher)
            })
            .cloned()
            .collect())
    }

    fn top_tags(&self, kind: EntityKind, limit: usize) -> MetadataResult<Vec<TagCount>> {
        let mut tags = self.tag_frequencies(kind)?;
        tags.truncate(limit);
        Ok(tags)
    }

    /// Case-insensitive substring search over known tags, restricted to
    /// `kind` when given. Kinds without hits are omitted.
    fn search_tags(&self, query: &str, kind: Option<EntityKind>) -> MetadataResult<BTreeMap<EntityKind, Vec<String>>> {
        let needle = query.to_lowercase();
        let mut out = BTreeMap::new();
        for (k, tags) in self.all_entities()? {
            if kind.is_some_and(|wanted| wanted != k) {
                continue;
            }
            let hits: Vec<String> = tags
                .into_iter()
                .filter(|t| t.to_lowercase().contains(&needle))
                .collect();
            if !hits.is_empty() {
                out.insert(k, hits);
            }
        }
        Ok(out)
    }

    fn tag_statistics(&self) -> MetadataResult<TagStatistics> {
        let mut stats = TagStatistics::default();
        for kind in EntityKind::ALL {
            let frequencies = self.tag_frequencies(kind)?;
            stats.unique_counts.insert(kind, frequencies.len());
            stats.total_unique += frequencies.len();
            if let Some(first) = frequencies.first() {
                stats.most_common.insert(kind, first.clone());
                let total: usize = frequencies.iter().map(|t| t.count).sum();
                let avg = total as f64 / frequencies.len() as f64;
                stats.average_frequency.insert(kind, (avg * 100.0).round() / 100.0);
            }
        }
        Ok(stats)
    }
}

/// Fuzzy criteria check for one document. `Fuzzy` requires every provided
/// type to match (any value within a type); `Any` requires one type.
/// Criteria without named lists accept everything.
pub fn matches_fuzzy(set: &EntitySet, criteria: &EntityCriteria, mode: MatchMode, matcher: &EntityMatcher) -> bool {
    let named = criteria.named();
    if named.is_empty() {
        return true;
    }
    let type_matches = |(kind, wanted): &(EntityKind, &[String])| {
        let stored = set.list(*kind);
        wanted.iter().any(|w| matcher.match_any(w, &stored))
    };
    match mode {
        MatchMode::Fuzzy => named.iter().all(type_matches),
        MatchMode::Any => named.iter().any(type_matches),
    }
}

/// Exact-equality criteria check for one document.
pub fn matches_exact(set: &EntitySet, criteria: &EntityCriteria) -> bool {
    let named_ok = criteria
        .named()
        .iter()
        .all(|(kind, wanted)| wanted.iter().any(|w| set.get(*kind).contains(w)));
    let dates_ok = criteria
        .date_range
        .as_ref()
        .map_or(true, |range| set.dates.iter().any(|d| range.contains(d)));
    named_ok && dates_ok
}

fn sort_tag_counts(counts: HashMap<String, usize>) -> Vec<TagCount> {
    let mut tags: Vec<TagCount> = counts.into_iter().map(|(tag, count)| TagCount { tag, count }).collect();
    tags.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
    tags
}

/// In-process metadata index.
#[derive(Debug, Default)]
pub struct MemoryMetadataIndex {
    sets: RwLock<HashMap<String, EntitySet>>,
}

impl MemoryMetadataIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetadataIndex for MemoryMetadataIndex {
    fn store(&self, doc_id: &str, entities: &EntitySet) -> MetadataResult<()> {
        self.sets.write().insert(doc_id.to_string(), entities.clone());
        Ok(())
    }

    fn get(&self, doc_id: &str) -> MetadataResult<Option<EntitySet>> {
        Ok(self.sets.read().get(doc_id).cloned())
    }

    fn remove(&self, doc_id: &str) -> MetadataResult<bool> {
        Ok(self.sets.write().remove(doc_id).is_some())
    }

    fn count(&self) -> MetadataResult<usize> {
        Ok(self.sets.read().len())
    }

    fn doc_ids(&self) -> MetadataResult<Vec<String>> {
        let mut ids: Vec<String> = self.sets.read().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn all_entities(&self) -> MetadataResult<BTreeMap<EntityKind, Vec<String>>> {
        let sets = self.sets.read();
        let mut out: BTreeMap<EntityKind, Vec<String>> = BTreeMap::new();
        for kind in EntityKind::ALL {
            let mut values: Vec<String> = sets.values().flat_map(|s| s.get(kind).iter().cloned()).collect();
            values.sort();
            values.dedup();
            if !values.is_empty() {
                out.insert(kind, values);
            }
        }
        Ok(out)
    }

    fn filter_exact(&self, doc_ids: &[String], criteria: &EntityCriteria) -> MetadataResult<Vec<String>> {
        if criteria.is_empty() {
            return Ok(doc_ids.to_vec());
        }
        let sets = self.sets.read();
        let empty = EntitySet::default();
        Ok(doc_ids
            .iter()
            .filter(|id| matches_exact(sets.get(id.as_str()).unwrap_or(&empty), criteria))
            .cloned()
            .collect())
    }

    fn tag_frequencies(&self, kind: EntityKind) -> MetadataResult<Vec<TagCount>> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for set in self.sets.read().values() {
            for value in set.get(kind) {
                *counts.entry(value.clone()).or_insert(0) += 1;
            }
        }
        Ok(sort_tag_counts(counts))
    }

    fn co_occurring_tags(&self, tag: &str, kind: EntityKind, limit: usize) -> MetadataResult<Vec<TagCount>> {
        if !EntityKind::NAMED.contains(&kind) {
            return Ok(Vec::new());
        }
        let mut counts: HashMap<String, usize> = HashMap::new();
        for set in self.sets.read().values() {
            let values = set.get(kind);
            if !values.contains(tag) {
                continue;
            }
            for other in values.iter().filter(|v| v.as_str() != tag) {
                *counts.entry(other.clone()).or_insert(0) += 1;
            }
        }
        let mut tags = sort_tag_counts(counts);
        tags.truncate(limit);
        Ok(tags)
    }
}
