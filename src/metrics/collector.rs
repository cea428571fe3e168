//! Metrics registry and exporter self-metrics.

use super::cardinality::{CardinalityCollector, CardinalityQuery};
use crate::client::CardinalitySource;
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Registry, TextEncoder};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Metric construction or text encoding failed.
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    /// The registry refused a collector.
    #[error("failed to register {what}: {source}")]
    Registration {
        /// What was being registered.
        what: &'static str,
        /// The registry's reason.
        #[source]
        source: prometheus::Error,
    },

    /// The collector was built for an empty dimension.
    #[error("dimension must not be empty")]
    EmptyDimension,
}

/// Outcome of the most recent backend queries.
///
/// Owned by the collector, which emits these after its own query so a
/// scrape always reports the query it just ran. Handles are cheap clones
/// sharing the underlying values.
#[derive(Clone)]
pub struct ScrapeMetrics {
    failures_total: IntCounter,
    last_success: IntGauge,
    duration_seconds: Gauge,
}

impl ScrapeMetrics {
    /// Creates the metrics.
    pub fn new() -> Result<Self, MetricsError> {
        let failures_total = IntCounter::new(
            "cardinality_exporter_scrape_failures_total",
            "Total number of failed cardinality queries",
        )?;
        let last_success = IntGauge::new(
            "cardinality_exporter_last_scrape_success",
            "Whether the last cardinality query succeeded (1=success, 0=failure)",
        )?;
        let duration_seconds = Gauge::new(
            "cardinality_exporter_scrape_duration_seconds",
            "Duration of the last cardinality query in seconds",
        )?;

        Ok(Self {
            failures_total,
            last_success,
            duration_seconds,
        })
    }

    pub(crate) fn desc(&self) -> Vec<&Desc> {
        let mut descs = self.failures_total.desc();
        descs.extend(self.last_success.desc());
        descs.extend(self.duration_seconds.desc());
        descs
    }

    pub(crate) fn collect(&self) -> Vec<MetricFamily> {
        let mut families = self.failures_total.collect();
        families.extend(self.last_success.collect());
        families.extend(self.duration_seconds.collect());
        families
    }

    pub(crate) fn record_success(&self, elapsed: Duration) {
        self.last_success.set(1);
        self.duration_seconds.set(elapsed.as_secs_f64());
    }

    pub(crate) fn record_failure(&self, elapsed: Duration) {
        self.failures_total.inc();
        self.last_success.set(0);
        self.duration_seconds.set(elapsed.as_secs_f64());
    }

    /// Failed queries since startup.
    pub fn failures(&self) -> u64 {
        self.failures_total.get()
    }

    /// Whether the last query succeeded.
    pub fn last_success(&self) -> bool {
        self.last_success.get() == 1
    }
}

/// Prometheus registry holding the cardinality collector.
///
/// Gathering runs a blocking backend query; callers on an async runtime
/// must gather from a blocking context.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    scrape: ScrapeMetrics,
}

impl MetricsRegistry {
    /// Creates a registry holding a collector for `query`.
    ///
    /// Any descriptor conflict is a [`MetricsError::Registration`].
    pub fn new<S>(source: S, query: CardinalityQuery) -> Result<Self, MetricsError>
    where
        S: CardinalitySource + 'static,
    {
        let registry = Registry::new();
        let collector = CardinalityCollector::new(source, query)?;
        let scrape = collector.scrape_metrics().clone();
        registry
            .register(Box::new(collector))
            .map_err(|source| MetricsError::Registration {
                what: "cardinality collector",
                source,
            })?;

        Ok(Self { registry, scrape })
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Self-metrics updated on every scrape.
    pub fn scrape_metrics(&self) -> &ScrapeMetrics {
        &self.scrape
    }

    /// Gathers all metrics and encodes them in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
