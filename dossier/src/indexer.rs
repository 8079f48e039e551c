//! BM25 lexical index
//!
//! Tier 1 of the pipeline: term-frequency index over the tokenized corpus,
//! built once per corpus load and immutable afterwards. A rebuild means
//! constructing a fresh `Bm25Index`.

use std::collections::HashMap;

use rayon::prelude::*;
use tracing::debug;

use crate::config::{Bm25Params, ConfigResult};
use crate::models::{Document, SourceDocument};
use crate::tokenizer::Tokenizer;

pub struct Bm25Index {
    params: Bm25Params,
    documents: Vec<Document>,
    /// term -> number of documents containing it
    document_frequencies: HashMap<String, u32>,
    avg_doc_length: f64,
}

impl Bm25Index {
    /// Tokenize and index `docs`. Corpus order is kept and breaks score ties.
    pub fn build(docs: &[SourceDocument], tokenizer: &Tokenizer, params: Bm25Params) -> ConfigResult<Self> {
        params.validate()?;
        let documents: Vec<Document> = docs
            .par_iter()
            .map(|d| Document::from_text(&d.doc_id, &d.text, tokenizer))
            .collect();
        Self::from_documents(documents, params)
    }

    pub fn from_documents(documents: Vec<Document>, params: Bm25Params) -> ConfigResult<Self> {
        params.validate()?;
        let mut document_frequencies: HashMap<String, u32> = HashMap::new();
        let mut total_length = 0usize;
        for doc in &documents {
            total_length += doc.length;
            for term in doc.term_frequencies.keys() {
                *document_frequencies.entry(term.clone()).or_insert(0) += 1;
            }
        }
        let avg_doc_length = if documents.is_empty() {
            0.0
        } else {
            total_length as f64 / documents.len() as f64
        };

        debug!(
            documents = documents.len(),
            vocabulary = document_frequencies.len(),
            avg_length = avg_doc_length,
            "built BM25 index"
        );

        Ok(Self { params, documents, document_frequencies, avg_doc_length })
    }

    pub fn num_docs(&self) -> usize {
        self.documents.len()
    }

    pub fn vocabulary_size(&self) -> usize {
        self.document_frequencies.len()
    }

    pub fn avg_doc_length(&self) -> f64 {
        self.avg_doc_length
    }

    pub fn params(&self) -> Bm25Params {
        self.params
    }

    pub fn document(&self, doc_id: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.doc_id == doc_id)
    }

    /// Inverse document frequency, `ln(1 + (N - n + 0.5) / (n + 0.5))`.
    /// Zero for terms outside the vocabulary.
    pub fn idf(&self, term: &str) -> f64 {
        let Some(&n) = self.document_frequencies.get(term) else {
            return 0.0;
        };
        let n = n as f64;
        let total = self.documents.len() as f64;
        (1.0 + (total - n + 0.5) / (n + 0.5)).ln()
    }

    fn score_document(&self, doc: &Document, weighted_terms: &[(&str, f64)]) -> f64 {
        let Bm25Params { k1, b } = self.params;
        let length_norm = if self.avg_doc_length > 0.0 {
            1.0 - b + b * doc.length as f64 / self.avg_doc_length
        } else {
            1.0
        };

        weighted_terms
            .iter()
            .map(|&(term, idf)| {
                let tf = doc.term_frequency(term) as f64;
                if tf == 0.0 {
                    return 0.0;
                }
                idf * tf * (k1 + 1.0) / (tf + k1 * length_norm)
            })
            .sum()
    }

    /// Rank every document against `query_terms` and return the `top_k`
    /// best as `(doc_id, score)`, highest first. Only strictly positive
    /// scores are returned; ties keep corpus order.
    pub fn rank(&self, query_terms: &[String], top_k: usize) -> Vec<(String, f64)> {
        if top_k == 0 || query_terms.is_empty() || self.documents.is_empty() {
            return Vec::new();
        }

        let weighted_terms: Vec<(&str, f64)> = query_terms
            .iter()
            .map(|t| (t.as_str(), self.idf(t)))
            .filter(|&(_, idf)| idf > 0.0)
            .collect();
        if weighted_terms.is_empty() {
            return Vec::new();
        }

        // Indexed parallel iterator: collect keeps corpus order.
        let mut scored: Vec<(usize, f64)> = self
            .documents
            .par_iter()
            .enumerate()
            .map(|(i, doc)| (i, self.score_document(doc, &weighted_terms)))
            .filter(|&(_, score)| score > 0.0)
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);

        scored
            .into_iter()
            .map(|(i, score)| (self.documents[i].doc_id.clone(), score))
            .collect()
    }
}
