//! Dossier public interface
//!
//! Types shared between the retrieval core and the CLI/service layer that
//! consumes it. Everything a caller passes into `SearchEngine::search` or
//! gets back from it lives here.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;

// ═══════════════════════════════════════════════════════════════════════════════
// ENUMS
// ═══════════════════════════════════════════════════════════════════════════════

/// Which filtering path runs over the tier-1 candidate pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterStrategy {
    /// Keep documents matching every provided entity type.
    Strict,
    /// Keep documents matching at least one provided entity type.
    Loose,
    /// Keep everything, re-score by metadata relevance.
    Boost,
    /// strict → loose → boost, governed by `min_candidates`.
    #[default]
    Adaptive,
    /// Pass-through.
    None,
}

impl FilterStrategy {
    pub const ALL: [FilterStrategy; 5] = [
        FilterStrategy::Strict,
        FilterStrategy::Loose,
        FilterStrategy::Boost,
        FilterStrategy::Adaptive,
        FilterStrategy::None,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterStrategy::Strict => "strict",
            FilterStrategy::Loose => "loose",
            FilterStrategy::Boost => "boost",
            FilterStrategy::Adaptive => "adaptive",
            FilterStrategy::None => "none",
        }
    }
}

impl fmt::Display for FilterStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(FilterStrategy::Strict),
            "loose" => Ok(FilterStrategy::Loose),
            "boost" => Ok(FilterStrategy::Boost),
            "adaptive" => Ok(FilterStrategy::Adaptive),
            "none" => Ok(FilterStrategy::None),
            other => Err(ConfigError::UnknownStrategy(other.to_string())),
        }
    }
}

/// The five entity collections kept per document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Person,
    Organization,
    Location,
    Date,
    Email,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Person,
        EntityKind::Organization,
        EntityKind::Location,
        EntityKind::Date,
        EntityKind::Email,
    ];

    /// Kinds that come from NER and participate in fuzzy filtering.
    pub const NAMED: [EntityKind; 3] = [
        EntityKind::Person,
        EntityKind::Location,
        EntityKind::Organization,
    ];

    /// Value stored in the `kind` column of the metadata database.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Person => "person",
            EntityKind::Organization => "organization",
            EntityKind::Location => "location",
            EntityKind::Date => "date",
            EntityKind::Email => "email",
        }
    }

    /// Map an NER label (PERSON, ORG, GPE, LOC, DATE, EMAIL) to a kind.
    pub fn from_ner_label(label: &str) -> Option<Self> {
        match label.trim().to_uppercase().as_str() {
            "PERSON" | "PER" => Some(EntityKind::Person),
            "ORG" | "ORGANIZATION" => Some(EntityKind::Organization),
            "GPE" | "LOC" | "LOCATION" => Some(EntityKind::Location),
            "DATE" => Some(EntityKind::Date),
            "EMAIL" => Some(EntityKind::Email),
            _ => None,
        }
    }

    pub(crate) fn from_database(value: &str) -> Option<Self> {
        EntityKind::ALL.into_iter().find(|k| k.as_str() == value)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "person" | "people" => Ok(EntityKind::Person),
            "organization" | "organizations" | "org" => Ok(EntityKind::Organization),
            "location" | "locations" | "loc" => Ok(EntityKind::Location),
            "date" | "dates" => Ok(EntityKind::Date),
            "email" | "emails" => Ok(EntityKind::Email),
            other => Err(ConfigError::UnknownEntityKind(other.to_string())),
        }
    }
}

/// Cross-type combination rule for `filter_fuzzy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// AND across provided types, OR within each type.
    Fuzzy,
    /// OR across provided types.
    Any,
}

impl FromStr for MatchMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fuzzy" => Ok(MatchMode::Fuzzy),
            "any" => Ok(MatchMode::Any),
            other => Err(ConfigError::UnknownMatchMode(other.to_string())),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RECORDS (Structs)
// ═══════════════════════════════════════════════════════════════════════════════

/// Inclusive date range over stored date strings (compared lexicographically).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

impl DateRange {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self { start: start.into(), end: end.into() }
    }

    pub fn contains(&self, date: &str) -> bool {
        date >= self.start.as_str() && date <= self.end.as_str()
    }
}

/// Per-type entity criteria. `None` means "no constraint on this type",
/// which is distinct from an empty list only in intent; both are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCriteria {
    pub people: Option<Vec<String>>,
    pub locations: Option<Vec<String>>,
    pub organizations: Option<Vec<String>>,
    /// Only honoured by `filter_exact`.
    pub date_range: Option<DateRange>,
}

impl EntityCriteria {
    pub fn people(mut self, people: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.people = Some(people.into_iter().map(Into::into).collect());
        self
    }

    pub fn locations(mut self, locations: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.locations = Some(locations.into_iter().map(Into::into).collect());
        self
    }

    pub fn organizations(mut self, organizations: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.organizations = Some(organizations.into_iter().map(Into::into).collect());
        self
    }

    pub fn date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    /// The non-empty named-entity lists, in person/location/organization order.
    pub fn named(&self) -> Vec<(EntityKind, &[String])> {
        let mut out = Vec::with_capacity(3);
        for (kind, list) in [
            (EntityKind::Person, &self.people),
            (EntityKind::Location, &self.locations),
            (EntityKind::Organization, &self.organizations),
        ] {
            if let Some(values) = list {
                if !values.is_empty() {
                    out.push((kind, values.as_slice()));
                }
            }
        }
        out
    }

    /// True when no named-entity criterion and no date range is set.
    pub fn is_empty(&self) -> bool {
        self.named().is_empty() && self.date_range.is_none()
    }
}

/// One search call. Optional fields fall back to `SearchConfig` values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub top_k: Option<usize>,
    /// Explicit filters; when any named list is present they replace
    /// entity extraction over the query text.
    pub filters: Option<EntityCriteria>,
    pub strategy: FilterStrategy,
    pub candidate_pool_size: Option<usize>,
    pub min_candidates: Option<usize>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            top_k: None,
            filters: None,
            strategy: FilterStrategy::default(),
            candidate_pool_size: None,
            min_candidates: None,
        }
    }

    pub fn strategy(mut self, strategy: FilterStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn filters(mut self, filters: EntityCriteria) -> Self {
        self.filters = Some(filters);
        self
    }

    pub fn candidate_pool_size(mut self, size: usize) -> Self {
        self.candidate_pool_size = Some(size);
        self
    }

    pub fn min_candidates(mut self, min: usize) -> Self {
        self.min_candidates = Some(min);
        self
    }
}

/// A single ranked document returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub doc_id: String,
    /// Combined score (lexical × (1 + metadata) under boost, lexical otherwise).
    pub score: f64,
    pub lexical_score: f64,
    pub metadata_score: Option<f64>,
    pub preview: String,
}

/// Search result container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub hits: Vec<SearchHit>,
    /// Strategy that actually produced the hits (adaptive reports the
    /// branch it settled on).
    pub applied_strategy: FilterStrategy,
    pub candidates_before: usize,
    pub candidates_after: usize,
}

impl SearchResult {
    pub(crate) fn empty(strategy: FilterStrategy) -> Self {
        Self {
            hits: Vec::new(),
            applied_strategy: strategy,
            candidates_before: 0,
            candidates_after: 0,
        }
    }

    pub fn doc_ids(&self) -> Vec<&str> {
        self.hits.iter().map(|h| h.doc_id.as_str()).collect()
    }
}

/// Error type for Dossier operations
#[derive(Debug, Error)]
pub enum DossierError {
    #[error("Metadata error: {0}")]
    Metadata(String),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Corpus index not built")]
    NotInitialized,
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<crate::metadata::MetadataError> for DossierError {
    fn from(e: crate::metadata::MetadataError) -> Self {
        DossierError::Metadata(e.to_string())
    }
}
