//! Metrics for [super::Retriever].

use commonware_runtime::Metrics as RuntimeMetrics;
use prometheus_client::{
    encoding::{EncodeLabelSet, EncodeLabelValue},
    metrics::{counter::Counter, family::Family, gauge::Gauge, histogram::Histogram},
};

/// Buckets (in seconds) for the duration of a retrieval.
const DURATION_BUCKETS: [f64; 12] = [
    0.001, 0.005, 0.01, 0.05, 0.1, 0.2, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0,
];

/// How a retrieval ended.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum Outcome {
    Available,
    NotAvailable,
    Byzantine,
    InvalidHeader,
    Decode,
    Cancelled,
}

/// Metric label for the outcome of a retrieval.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct Label {
    pub outcome: Outcome,
}

/// Metrics for the retriever.
pub struct Metrics {
    /// Number of retrievals by outcome
    pub retrievals: Family<Label, Counter>,
    /// Number of quadrants attempted
    pub attempts: Counter,
    /// Number of quadrants that could not be fetched
    pub fetch_failures: Counter,
    /// Number of nodes returned by the store
    pub nodes_fetched: Counter,
    /// Duration of retrievals that completed
    pub duration: Histogram,
}

impl Metrics {
    /// Create and register metrics with `context`, including the gauge of store requests in
    /// flight.
    pub fn init(context: &impl RuntimeMetrics, active: Gauge) -> Self {
        let metrics = Self {
            retrievals: Family::default(),
            attempts: Counter::default(),
            fetch_failures: Counter::default(),
            nodes_fetched: Counter::default(),
            duration: Histogram::new(DURATION_BUCKETS.into_iter()),
        };
        context.register(
            "retrievals",
            "Number of retrievals by outcome",
            metrics.retrievals.clone(),
        );
        context.register(
            "attempts",
            "Number of quadrants attempted",
            metrics.attempts.clone(),
        );
        context.register(
            "fetch_failures",
            "Number of quadrants that could not be fetched",
            metrics.fetch_failures.clone(),
        );
        context.register(
            "nodes_fetched",
            "Number of nodes returned by the store",
            metrics.nodes_fetched.clone(),
        );
        context.register(
            "duration",
            "Duration of retrievals that completed",
            metrics.duration.clone(),
        );
        context.register(
            "active_requests",
            "Current number of store requests in flight",
            active,
        );
        metrics
    }

    /// Record the outcome of a retrieval.
    pub fn record(&self, outcome: Outcome) {
        self.retrievals.get_or_create(&Label { outcome }).inc();
    }
}
