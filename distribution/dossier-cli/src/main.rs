//! Dossier command-line interface
//!
//! Thin layer over the `dossier` library: ingest pre-extracted entity
//! annotations into a SQLite metadata index, run searches against a JSONL
//! corpus, inspect tag analytics, or try everything on the bundled demo
//! corpus.
//!
//! Run with: cargo run -p dossier-cli -- demo --query "Maxwell Paris"

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use dossier::{
    EntityCriteria, EntityKind, ExtractedEntities, FilterStrategy, MemoryMetadataIndex, MetadataIndex,
    SearchConfig, SearchEngine, SearchRequest, SearchResult, SourceDocument, SqliteMetadataIndex,
};

#[derive(Parser, Debug)]
#[command(name = "dossier", author, version, about, long_about = None)]
struct Cli {
    /// Log pipeline stages at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// TOML file with search configuration
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate and store entity metadata for every document in a corpus
    Ingest {
        /// JSONL corpus: {doc_id, text, people?, organizations?, locations?} per line
        #[arg(long)]
        corpus: PathBuf,

        /// SQLite metadata database (created if missing)
        #[arg(long)]
        db: PathBuf,
    },

    /// Run one query against a corpus and its ingested metadata
    Search {
        #[arg(long)]
        corpus: PathBuf,

        #[arg(long)]
        db: PathBuf,

        #[arg(short, long)]
        query: String,

        #[command(flatten)]
        options: QueryOptions,
    },

    /// Tag analytics over a metadata database
    Tags {
        #[arg(long)]
        db: PathBuf,

        /// person, organization, location, date or email
        #[arg(short, long)]
        kind: Option<EntityKind>,

        /// Number of tags to list per kind
        #[arg(short, long, default_value_t = 10)]
        top: usize,

        /// Case-insensitive substring search over tag values
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Search the bundled demo corpus with an in-memory index
    Demo {
        #[arg(short, long, default_value = "Maxwell Paris")]
        query: String,

        /// Run only this strategy instead of all five
        #[arg(short, long)]
        strategy: Option<FilterStrategy>,
    },
}

#[derive(clap::Args, Debug)]
struct QueryOptions {
    #[arg(short, long, default_value = "adaptive")]
    strategy: FilterStrategy,

    #[arg(short = 'k', long)]
    top_k: Option<usize>,

    /// Lexical candidate pool size
    #[arg(long)]
    pool: Option<usize>,

    /// Adaptive strategy floor
    #[arg(long)]
    min_candidates: Option<usize>,

    /// Explicit person filter (repeatable); replaces query extraction
    #[arg(long = "person")]
    people: Vec<String>,

    #[arg(long = "location")]
    locations: Vec<String>,

    #[arg(long = "organization")]
    organizations: Vec<String>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

impl QueryOptions {
    fn request(&self, query: &str) -> SearchRequest {
        let mut request = SearchRequest::new(query).strategy(self.strategy);
        if let Some(k) = self.top_k {
            request = request.top_k(k);
        }
        if let Some(pool) = self.pool {
            request = request.candidate_pool_size(pool);
        }
        if let Some(min) = self.min_candidates {
            request = request.min_candidates(min);
        }

        let mut filters = EntityCriteria::default();
        if !self.people.is_empty() {
            filters = filters.people(self.people.clone());
        }
        if !self.locations.is_empty() {
            filters = filters.locations(self.locations.clone());
        }
        if !self.organizations.is_empty() {
            filters = filters.organizations(self.organizations.clone());
        }
        if !filters.is_empty() {
            request = request.filters(filters);
        }
        request
    }
}

/// One line of a JSONL corpus.
#[derive(Debug, Deserialize)]
struct CorpusRecord {
    doc_id: String,
    text: String,
    #[serde(default)]
    people: Vec<String>,
    #[serde(default)]
    organizations: Vec<String>,
    #[serde(default)]
    locations: Vec<String>,
}

impl CorpusRecord {
    fn document(&self) -> SourceDocument {
        SourceDocument::new(&self.doc_id, &self.text)
    }

    fn annotations(&self) -> ExtractedEntities {
        ExtractedEntities {
            people: self.people.clone(),
            organizations: self.organizations.clone(),
            locations: self.locations.clone(),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => SearchConfig::load(path).with_context(|| format!("loading config {}", path.display()))?,
        None => SearchConfig::default(),
    };

    match cli.command {
        Command::Ingest { corpus, db } => ingest(config, &corpus, &db),
        Command::Search { corpus, db, query, options } => search(config, &corpus, &db, &query, &options),
        Command::Tags { db, kind, top, search } => tags(&db, kind, top, search.as_deref()),
        Command::Demo { query, strategy } => demo(config, &query, strategy),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn read_corpus(path: &Path) -> Result<Vec<CorpusRecord>> {
    let file = File::open(path).with_context(|| format!("opening corpus {}", path.display()))?;
    let mut records = Vec::new();
    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("reading {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: CorpusRecord = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: malformed corpus record", path.display(), n + 1))?;
        records.push(record);
    }
    if records.is_empty() {
        bail!("corpus {} contains no documents", path.display());
    }
    Ok(records)
}

fn open_engine(config: SearchConfig, db: &Path) -> Result<SearchEngine> {
    let index = SqliteMetadataIndex::open(db).with_context(|| format!("opening metadata db {}", db.display()))?;
    Ok(SearchEngine::new(config, Arc::new(index))?)
}

fn ingest(config: SearchConfig, corpus: &Path, db: &Path) -> Result<()> {
    let records = read_corpus(corpus)?;
    let engine = open_engine(config, db)?;

    let pb = ProgressBar::new(records.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
            .progress_chars("#>-"),
    );

    let mut entities = 0;
    for record in &records {
        let stored = engine.ingest(&record.document(), &record.annotations())?;
        entities += stored.total_count();
        pb.set_message(record.doc_id.clone());
        pb.inc(1);
    }
    pb.finish_with_message("done");

    info!(documents = records.len(), entities, db = %db.display(), "ingestion complete");
    println!("Stored {} documents ({} entities) in {}", records.len(), entities, db.display());
    Ok(())
}

fn search(config: SearchConfig, corpus: &Path, db: &Path, query: &str, options: &QueryOptions) -> Result<()> {
    let records = read_corpus(corpus)?;
    let engine = open_engine(config, db)?;
    let documents: Vec<SourceDocument> = records.iter().map(CorpusRecord::document).collect();
    engine.load_corpus(&documents)?;

    let result = engine.search(&options.request(query))?;
    if options.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(query, options.strategy, &result);
    }
    Ok(())
}

fn tags(db: &Path, kind: Option<EntityKind>, top: usize, search: Option<&str>) -> Result<()> {
    let index = SqliteMetadataIndex::open(db).with_context(|| format!("opening metadata db {}", db.display()))?;

    if let Some(query) = search {
        for (kind, values) in index.search_tags(query, kind)? {
            println!("{} ({}):", kind, values.len());
            for value in values {
                println!("  {}", value);
            }
        }
        return Ok(());
    }

    let kinds = match kind {
        Some(kind) => vec![kind],
        None => EntityKind::ALL.to_vec(),
    };
    for kind in kinds {
        println!("Top {} {} tags:", top, kind);
        for tag in index.top_tags(kind, top)? {
            println!("  {:>5}  {}", tag.count, tag.tag);
        }
    }

    let stats = index.tag_statistics()?;
    println!();
    println!("Documents: {}", index.count()?);
    println!("Unique tags: {}", stats.total_unique);
    Ok(())
}

fn demo(config: SearchConfig, query: &str, strategy: Option<FilterStrategy>) -> Result<()> {
    let engine = SearchEngine::new(config, Arc::new(MemoryMetadataIndex::new()))?;

    let mut documents = Vec::with_capacity(demo_data::DEMO_DOCUMENTS.len());
    for demo in demo_data::DEMO_DOCUMENTS.iter() {
        let document = SourceDocument::new(&demo.doc_id, &demo.text);
        let annotations = ExtractedEntities {
            people: demo.people.clone(),
            organizations: demo.organizations.clone(),
            locations: demo.locations.clone(),
        };
        engine.ingest(&document, &annotations)?;
        documents.push(document);
    }
    engine.load_corpus(&documents)?;

    let strategies = match strategy {
        Some(s) => vec![s],
        None => FilterStrategy::ALL.to_vec(),
    };
    for strategy in strategies {
        let result = engine.search(&SearchRequest::new(query).strategy(strategy))?;
        print_result(query, strategy, &result);
        println!();
    }

    println!("{}", engine.metrics().report());
    Ok(())
}

fn print_result(query: &str, requested: FilterStrategy, result: &SearchResult) {
    println!(
        "{:?} [{} -> {}] {} of {} candidates",
        query,
        requested,
        result.applied_strategy,
        result.candidates_after,
        result.candidates_before
    );
    if result.hits.is_empty() {
        println!("  (no results)");
        return;
    }
    for (rank, hit) in result.hits.iter().enumerate() {
        let metadata = hit
            .metadata_score
            .map(|m| format!(" meta={:.3}", m))
            .unwrap_or_default();
        println!("{:>3}. {:<12} score={:.4} bm25={:.4}{}", rank + 1, hit.doc_id, hit.score, hit.lexical_score, metadata);
        println!("     {}", hit.preview);
    }
}
