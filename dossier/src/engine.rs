//! SearchEngine - main retrieval API
//!
//! Two-tier pipeline per query: BM25 ranking over the loaded corpus yields a
//! bounded candidate pool, then entity metadata filters or re-scores that
//! pool according to the requested strategy.
//!
//! The corpus (index, texts for previews, entity lookup) is built once by
//! `load_corpus` and read-only afterwards. Reloading builds a fresh corpus
//! and swaps it in whole; searches already running keep their snapshot.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Once};
use std::time::Instant;

use parking_lot::RwLock;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::candidate::ScoredCandidate;
use crate::config::SearchConfig;
use crate::extraction::{build_entity_set, EntityExtractor, ExtractedEntities};
use crate::indexer::Bm25Index;
use crate::interface::{DossierError, EntityCriteria, FilterStrategy, SearchRequest, SearchResult};
use crate::lookup::EntityLookup;
use crate::matcher::EntityMatcher;
use crate::metadata::MetadataIndex;
use crate::metrics::{SearchMetricRecord, SearchMetrics};
use crate::models::{EntitySet, QueryEntities, SourceDocument};
use crate::search::{self, MAX_RESULTS};
use crate::strategy::{FilterEngine, MetadataScorer};
use crate::tokenizer::Tokenizer;

static RAYON_INIT: Once = Once::new();

/// Name the global Rayon pool's threads; a no-op if the host already built one.
fn init_rayon() {
    RAYON_INIT.call_once(|| {
        let _ = rayon::ThreadPoolBuilder::new()
            .thread_name(|i| format!("dossier-rayon-{}", i))
            .build_global();
    });
}

/// Immutable per-load state shared by every search against it.
struct LoadedCorpus {
    index: Bm25Index,
    texts: HashMap<String, String>,
    lookup: EntityLookup,
}

pub struct SearchEngine {
    config: SearchConfig,
    tokenizer: Tokenizer,
    filter: FilterEngine,
    metadata: Arc<dyn MetadataIndex>,
    extractor: Option<Arc<dyn EntityExtractor>>,
    corpus: RwLock<Option<Arc<LoadedCorpus>>>,
    metrics: SearchMetrics,
}

impl SearchEngine {
    /// Validates `config` up front; nothing is searchable until `load_corpus`.
    pub fn new(config: SearchConfig, metadata: Arc<dyn MetadataIndex>) -> Result<Self, DossierError> {
        config.validate()?;
        init_rayon();

        let matcher = EntityMatcher::new(config.similarity_threshold)?;
        let scorer = MetadataScorer::new(config.weights, config.density_cap, matcher)?;

        Ok(Self {
            tokenizer: Tokenizer::new(config.min_token_length),
            filter: FilterEngine::new(matcher, scorer),
            config,
            metadata,
            extractor: None,
            corpus: RwLock::new(None),
            metrics: SearchMetrics::new(),
        })
    }

    /// Attach an NER collaborator used to pull entities out of query text.
    pub fn with_extractor(mut self, extractor: Arc<dyn EntityExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn metadata(&self) -> &Arc<dyn MetadataIndex> {
        &self.metadata
    }

    pub fn metrics(&self) -> &SearchMetrics {
        &self.metrics
    }

    pub fn is_loaded(&self) -> bool {
        self.corpus.read().is_some()
    }

    /// Documents in the loaded corpus, zero before the first load.
    pub fn num_docs(&self) -> usize {
        self.corpus.read().as_ref().map_or(0, |c| c.index.num_docs())
    }

    /// Validate NER output, extract dates and emails, and store the
    /// resulting set for `doc`, replacing anything stored before.
    pub fn ingest(&self, doc: &SourceDocument, ner: &ExtractedEntities) -> Result<EntitySet, DossierError> {
        let entities = build_entity_set(&doc.text, ner);
        self.metadata.store(&doc.doc_id, &entities)?;
        debug!(doc_id = %doc.doc_id, entities = entities.total_count(), "ingested document metadata");
        Ok(entities)
    }

    /// Build the ranking index over `documents` and the entity lookup over
    /// whatever the metadata index currently holds, then swap both in.
    pub fn load_corpus(&self, documents: &[SourceDocument]) -> Result<(), DossierError> {
        let start = Instant::now();
        let index = Bm25Index::build(documents, &self.tokenizer, self.config.bm25)?;
        let texts: HashMap<String, String> = documents
            .par_iter()
            .map(|d| (d.doc_id.clone(), d.text.clone()))
            .collect();
        let lookup = EntityLookup::build(
            &self.metadata.all_entities()?,
            self.config.lookup_min_token_length,
            self.config.max_lookup_matches,
        );

        info!(
            documents = index.num_docs(),
            vocabulary = index.vocabulary_size(),
            lookup_empty = lookup.is_empty(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "corpus loaded"
        );

        *self.corpus.write() = Some(Arc::new(LoadedCorpus { index, texts, lookup }));
        Ok(())
    }

    /// Entities that drive filtering for `request`, without running a search.
    pub fn query_entities(&self, request: &SearchRequest) -> Result<QueryEntities, DossierError> {
        let corpus = self.snapshot()?;
        Ok(self.resolve_query_entities(request, &corpus.lookup))
    }

    pub fn search(&self, request: &SearchRequest) -> Result<SearchResult, DossierError> {
        let start = Instant::now();
        check_request(request)?;
        let corpus = self.snapshot()?;

        let pool_size = request.candidate_pool_size.unwrap_or(self.config.candidate_pool_size);
        let min_candidates = request.min_candidates.unwrap_or(self.config.min_candidates);
        let top_k = request.top_k.unwrap_or(self.config.default_top_k).min(MAX_RESULTS);
        let strategy = request.strategy;

        let terms = self.tokenizer.tokenize(&request.query);
        if terms.is_empty() || top_k == 0 {
            debug!(query = %request.query, top_k, "nothing to search for");
            self.record(request, 0, 0, 0, strategy, start);
            return Ok(SearchResult::empty(strategy));
        }

        let mut candidates: Vec<ScoredCandidate> = corpus
            .index
            .rank(&terms, pool_size)
            .into_iter()
            .map(ScoredCandidate::from)
            .collect();
        let candidates_before = candidates.len();
        debug!(candidates = candidates_before, pool_size, "tier-1 candidates");

        if let Some(range) = request.filters.as_ref().and_then(|f| f.date_range.clone()) {
            candidates = self.restrict_to_dates(candidates, EntityCriteria::default().date_range(range))?;
            debug!(candidates = candidates.len(), "date range applied");
        }

        let query_entities = self.resolve_query_entities(request, &corpus.lookup);
        debug!(
            people = ?query_entities.people,
            locations = ?query_entities.locations,
            organizations = ?query_entities.organizations,
            "query entities"
        );

        let outcome = self.filter.apply(
            strategy,
            candidates,
            &query_entities,
            min_candidates,
            self.metadata.as_ref(),
        )?;
        let candidates_after = outcome.candidates.len();

        let hits: Vec<_> = outcome
            .candidates
            .iter()
            .take(top_k)
            .map(|c| {
                let text = corpus.texts.get(&c.doc_id).map(String::as_str);
                search::create_search_hit(c, text, self.config.preview_chars)
            })
            .collect();

        self.record(request, candidates_before, candidates_after, hits.len(), outcome.applied, start);
        info!(
            requested = %strategy,
            applied = %outcome.applied,
            candidates_before,
            candidates_after,
            hits = hits.len(),
            latency_ms = start.elapsed().as_secs_f64() * 1000.0,
            "search complete"
        );

        Ok(SearchResult {
            hits,
            applied_strategy: outcome.applied,
            candidates_before,
            candidates_after,
        })
    }

    fn snapshot(&self) -> Result<Arc<LoadedCorpus>, DossierError> {
        self.corpus.read().clone().ok_or(DossierError::NotInitialized)
    }

    fn resolve_query_entities(&self, request: &SearchRequest, lookup: &EntityLookup) -> QueryEntities {
        let has_explicit = request.filters.as_ref().is_some_and(|f| !f.named().is_empty());
        let ner = match (&self.extractor, has_explicit) {
            (Some(extractor), false) => Some(extractor.extract(&request.query)),
            _ => None,
        };
        search::select_query_entities(request.filters.as_ref(), ner, &request.query, lookup)
    }

    fn restrict_to_dates(
        &self,
        candidates: Vec<ScoredCandidate>,
        criteria: EntityCriteria,
    ) -> Result<Vec<ScoredCandidate>, DossierError> {
        let doc_ids: Vec<String> = candidates.iter().map(|c| c.doc_id.clone()).collect();
        let kept: HashSet<String> = self.metadata.filter_exact(&doc_ids, &criteria)?.into_iter().collect();
        Ok(candidates.into_iter().filter(|c| kept.contains(&c.doc_id)).collect())
    }

    fn record(
        &self,
        request: &SearchRequest,
        candidates_before: usize,
        candidates_after: usize,
        final_count: usize,
        applied: FilterStrategy,
        start: Instant,
    ) {
        self.metrics.record(SearchMetricRecord::new(
            request.query.clone(),
            candidates_before,
            candidates_after,
            final_count,
            request.strategy,
            applied,
            start.elapsed(),
        ));
    }
}

/// Reject per-request overrides that no search could satisfy.
fn check_request(request: &SearchRequest) -> Result<(), DossierError> {
    if request.candidate_pool_size == Some(0) {
        return Err(DossierError::InvalidInput("candidate_pool_size must be at least 1".to_string()));
    }
    if let Some(range) = request.filters.as_ref().and_then(|f| f.date_range.as_ref()) {
        if range.start > range.end {
            return Err(DossierError::InvalidInput(format!(
                "date range starts after it ends: {} > {}",
                range.start, range.end
            )));
        }
    }
    Ok(())
}
