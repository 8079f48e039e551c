//! Per-query search metrics
//!
//! Passive, append-only log of candidate counts and latency per search.
//! Nothing in the pipeline reads it back.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::interface::FilterStrategy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMetricRecord {
    pub query: String,
    /// Lexical candidates entering the filtering stage.
    pub candidates_before: usize,
    /// Candidates surviving the filtering stage.
    pub candidates_after: usize,
    /// Hits returned after top-k truncation.
    pub final_count: usize,
    /// Strategy the caller asked for.
    pub strategy: FilterStrategy,
    /// Strategy that produced the result.
    pub applied_strategy: FilterStrategy,
    pub latency_ms: f64,
    /// `candidates_after / candidates_before`, zero when nothing was retrieved.
    pub filter_ratio: f64,
    pub recorded_at: DateTime<Utc>,
}

impl SearchMetricRecord {
    pub fn new(
        query: impl Into<String>,
        candidates_before: usize,
        candidates_after: usize,
        final_count: usize,
        strategy: FilterStrategy,
        applied_strategy: FilterStrategy,
        latency: Duration,
    ) -> Self {
        let filter_ratio = if candidates_before > 0 {
            candidates_after as f64 / candidates_before as f64
        } else {
            0.0
        };
        Self {
            query: query.into(),
            candidates_before,
            candidates_after,
            final_count,
            strategy,
            applied_strategy,
            latency_ms: latency.as_secs_f64() * 1000.0,
            filter_ratio,
            recorded_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchStatistics {
    pub total_queries: usize,
    pub avg_candidates_before: f64,
    pub avg_candidates_after: f64,
    pub avg_filter_ratio: f64,
    pub avg_latency_ms: f64,
    /// Requested strategy -> number of queries.
    pub strategies_used: BTreeMap<String, usize>,
}

#[derive(Debug, Serialize)]
struct MetricsExport<'a> {
    queries: &'a [SearchMetricRecord],
    statistics: Option<SearchStatistics>,
}

#[derive(Debug, Default)]
pub struct SearchMetrics {
    records: Mutex<Vec<SearchMetricRecord>>,
}

impl SearchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, record: SearchMetricRecord) {
        self.records.lock().push(record);
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Snapshot of every record so far, oldest first.
    pub fn records(&self) -> Vec<SearchMetricRecord> {
        self.records.lock().clone()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }

    /// Aggregates over the log; `None` when nothing was recorded.
    pub fn statistics(&self) -> Option<SearchStatistics> {
        Self::compute_statistics(&self.records.lock())
    }

    fn compute_statistics(records: &[SearchMetricRecord]) -> Option<SearchStatistics> {
        if records.is_empty() {
            return None;
        }
        let n = records.len() as f64;
        let mean = |f: fn(&SearchMetricRecord) -> f64| records.iter().map(f).sum::<f64>() / n;

        let mut strategies_used: BTreeMap<String, usize> = BTreeMap::new();
        for r in records {
            *strategies_used.entry(r.strategy.to_string()).or_insert(0) += 1;
        }

        Some(SearchStatistics {
            total_queries: records.len(),
            avg_candidates_before: mean(|r| r.candidates_before as f64),
            avg_candidates_after: mean(|r| r.candidates_after as f64),
            avg_filter_ratio: mean(|r| r.filter_ratio),
            avg_latency_ms: mean(|r| r.latency_ms),
            strategies_used,
        })
    }

    /// Human-readable summary.
    pub fn report(&self) -> String {
        let Some(stats) = self.statistics() else {
            return "No search metrics recorded".to_string();
        };

        let mut out = String::new();
        let _ = writeln!(out, "Search Performance Report");
        let _ = writeln!(out, "=========================");
        let _ = writeln!(out, "Total Queries: {}", stats.total_queries);
        let _ = writeln!(out);
        let _ = writeln!(out, "Filtering Performance:");
        let _ = writeln!(out, "- Avg BM25 Candidates: {:.0}", stats.avg_candidates_before);
        let _ = writeln!(out, "- Avg After Filtering: {:.0}", stats.avg_candidates_after);
        let _ = writeln!(out, "- Avg Filter Ratio: {:.1}%", stats.avg_filter_ratio * 100.0);
        let _ = writeln!(out);
        let _ = writeln!(out, "Timing:");
        let _ = writeln!(out, "- Avg Query Time: {:.0}ms", stats.avg_latency_ms);
        let _ = writeln!(out);
        let _ = writeln!(out, "Strategies Used:");
        for (strategy, count) in &stats.strategies_used {
            let _ = writeln!(out, "- {}: {} times", strategy, count);
        }
        out
    }

    /// Records plus statistics as pretty JSON.
    pub fn export_json(&self) -> serde_json::Result<String> {
        let records = self.records.lock();
        let export = MetricsExport {
            queries: &records,
            statistics: Self::compute_statistics(&records),
        };
        serde_json::to_string_pretty(&export)
    }
}
