//! Shared demo corpus for the CLI demo command and benchmarks.
//!
//! Documents ship with pre-extracted NER annotations so the demo runs
//! without an NER model. Entity columns hold `;`-separated lists.

use once_cell::sync::Lazy;
use serde::Deserialize;

const CORPUS_CSV: &str = include_str!("../corpus.csv");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoDocument {
    pub doc_id: String,
    pub text: String,
    pub people: Vec<String>,
    pub organizations: Vec<String>,
    pub locations: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CorpusRow {
    doc_id: String,
    text: String,
    #[serde(default)]
    people: String,
    #[serde(default)]
    organizations: String,
    #[serde(default)]
    locations: String,
}

impl From<CorpusRow> for DemoDocument {
    fn from(row: CorpusRow) -> Self {
        Self {
            doc_id: row.doc_id,
            text: row.text,
            people: split_list(&row.people),
            organizations: split_list(&row.organizations),
            locations: split_list(&row.locations),
        }
    }
}

fn split_list(field: &str) -> Vec<String> {
    field
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parsed once on first use.
pub static DEMO_DOCUMENTS: Lazy<Vec<DemoDocument>> = Lazy::new(|| {
    load_corpus().unwrap_or_else(|e| {
        eprintln!("Warning: Failed to parse demo corpus CSV: {}", e);
        Vec::new()
    })
});

fn load_corpus() -> Result<Vec<DemoDocument>, csv::Error> {
    let mut reader = csv::Reader::from_reader(CORPUS_CSV.as_bytes());
    reader
        .deserialize::<CorpusRow>()
        .map(|row| row.map(DemoDocument::from))
        .collect()
}

/// The demo corpus repeated `copies` times with `#n` suffixed ids, for
/// benchmarks that need more than a handful of documents.
pub fn scaled_corpus(copies: usize) -> Vec<DemoDocument> {
    (0..copies)
        .flat_map(|n| {
            DEMO_DOCUMENTS.iter().map(move |doc| DemoDocument {
                doc_id: format!("{}#{}", doc.doc_id, n),
                ..doc.clone()
            })
        })
        .collect()
}
