//! Dossier Core - two-tier document retrieval
//!
//! BM25 ranking narrows a corpus to a candidate pool; stored entity
//! metadata (people, organizations, locations, dates, emails) then filters
//! or re-scores that pool under a strict/loose/boost/adaptive strategy.
//!
//! Metadata lives behind the `MetadataIndex` trait, backed by SQLite
//! (`SqliteMetadataIndex`) or held in memory (`MemoryMetadataIndex`).

pub(crate) mod candidate;
pub mod config;
pub mod database;
mod engine;
pub mod extraction;
mod indexer;
pub mod interface;
pub mod lookup;
pub mod matcher;
pub mod metadata;
pub mod metrics;
pub mod models;
mod search;
pub mod strategy;
pub mod tokenizer;
pub mod validation;

pub use candidate::ScoredCandidate;
pub use config::{Bm25Params, ConfigError, ScorerWeights, SearchConfig};
pub use database::SqliteMetadataIndex;
pub use engine::SearchEngine;
pub use extraction::{EntityExtractor, ExtractedEntities};
pub use indexer::Bm25Index;
pub use interface::*;
pub use matcher::{EntityMatchKind, EntityMatcher};
pub use metadata::{MemoryMetadataIndex, MetadataError, MetadataIndex, TagCount, TagStatistics};
pub use metrics::{SearchMetricRecord, SearchMetrics, SearchStatistics};
pub use models::{EntitySet, QueryEntities, SourceDocument};
pub use strategy::{FilterEngine, FilterOutcome, MetadataScorer};
pub use tokenizer::Tokenizer;
