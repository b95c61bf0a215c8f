//! Observability metrics: query latency, per-shape query counts, document churn.

use crate::query::QueryKind;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

/// Latency samples kept for averages and percentiles; older samples roll off.
pub const MAX_LATENCY_SAMPLES: usize = 10_000;

/// Collects runtime metrics for the HTTP API.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    query_latencies_us: VecDeque<f64>,
    queries_by_kind: HashMap<QueryKind, u64>,
    documents_added: u64,
    documents_removed: u64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a query with its shape and duration.
    pub fn record_query(&mut self, kind: QueryKind, duration: Duration) {
        *self.queries_by_kind.entry(kind).or_insert(0) += 1;
        if self.query_latencies_us.len() == MAX_LATENCY_SAMPLES {
            self.query_latencies_us.pop_front();
        }
        self.query_latencies_us.push_back(duration.as_micros() as f64);
    }

    pub fn record_added(&mut self, count: usize) {
        self.documents_added += count as u64;
    }

    pub fn record_removed(&mut self, count: usize) {
        self.documents_removed += count as u64;
    }

    pub fn total_queries(&self) -> u64 {
        self.queries_by_kind.values().sum()
    }

    pub fn queries(&self, kind: QueryKind) -> u64 {
        self.queries_by_kind.get(&kind).copied().unwrap_or(0)
    }

    pub fn documents_added(&self) -> u64 {
        self.documents_added
    }

    pub fn documents_removed(&self) -> u64 {
        self.documents_removed
    }

    /// Number of latency samples currently held.
    pub fn latency_samples(&self) -> usize {
        self.query_latencies_us.len()
    }

    /// Average query latency in microseconds over the retained samples.
    pub fn avg_query_latency_us(&self) -> f64 {
        if self.query_latencies_us.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.query_latencies_us.iter().sum();
        sum / self.query_latencies_us.len() as f64
    }

    /// Get a percentile of query latency (e.g., 50.0, 95.0, 99.0).
    pub fn percentile_query_latency_us(&self, percentile: f64) -> f64 {
        if self.query_latencies_us.is_empty() {
            return 0.0;
        }

        let mut sorted: Vec<f64> = self.query_latencies_us.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let index = ((percentile / 100.0) * (sorted.len() - 1) as f64).round() as usize;
        sorted[index.min(sorted.len() - 1)]
    }
}
