//! Prometheus collector republishing backend cardinality.
//!
//! Every scrape issues one `label_values` query for the configured
//! dimension and translates the answer into two gauge families. Nothing is
//! cached between scrapes: a failed query yields no cardinality samples at
//! all rather than stale or zero values.
//!
//! The collector also owns the exporter's scrape metrics and emits them
//! after the query, so every scrape reports its own outcome.

use super::collector::{MetricsError, ScrapeMetrics};
use crate::client::{CardinalitySource, LabelValuesResponse};
use prometheus::core::{Collector, Desc};
use prometheus::proto::{self, LabelPair, MetricFamily, MetricType};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

/// Series total for the dimension.
pub const TOTAL_METRIC_NAME: &str = "grafana_mimir_top_cardinality_total";
/// Series count per value of the dimension.
pub const VALUE_METRIC_NAME: &str = "grafana_mimir_top_cardinality";

const DIMENSION_LABEL: &str = "dimension";

/// What to ask the backend on every scrape. Fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardinalityQuery {
    /// Label name whose values are broken down.
    pub dimension: String,
    /// Optional series selector; empty means all series.
    pub selector: String,
    /// Deadline for a single backend query.
    pub timeout: Duration,
}

impl CardinalityQuery {
    /// Creates a query for `dimension` with no selector.
    pub fn new(dimension: impl Into<String>, timeout: Duration) -> Self {
        Self {
            dimension: dimension.into(),
            selector: String::new(),
            timeout,
        }
    }

    /// Restricts the query to series matching `selector`.
    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = selector.into();
        self
    }

    /// Name of the variable label carrying each value of the dimension.
    pub fn exported_label(&self) -> String {
        format!("exported_{}", self.dimension)
    }
}

/// Adapts cardinality queries to the Prometheus pull model.
pub struct CardinalityCollector<S> {
    source: S,
    query: CardinalityQuery,
    label_names: Vec<String>,
    total_desc: Desc,
    value_desc: Desc,
    scrape: ScrapeMetrics,
}

impl<S: CardinalitySource> CardinalityCollector<S> {
    /// Builds the collector, both cardinality descriptors and the scrape
    /// metrics.
    ///
    /// Fails when the dimension is empty or does not form valid label names.
    pub fn new(source: S, query: CardinalityQuery) -> Result<Self, MetricsError> {
        if query.dimension.is_empty() {
            return Err(MetricsError::EmptyDimension);
        }

        let const_labels =
            HashMap::from([(DIMENSION_LABEL.to_string(), query.dimension.clone())]);
        let total_desc = Desc::new(
            TOTAL_METRIC_NAME.to_string(),
            "Total number of time series in Mimir".to_string(),
            Vec::new(),
            const_labels.clone(),
        )?;
        let value_desc = Desc::new(
            VALUE_METRIC_NAME.to_string(),
            "Cardinality of time series in Mimir".to_string(),
            vec![query.exported_label()],
            const_labels,
        )?;

        Ok(Self {
            source,
            label_names: vec![query.dimension.clone()],
            query,
            total_desc,
            value_desc,
            scrape: ScrapeMetrics::new()?,
        })
    }

    /// Scrape outcome metrics, updated by every `collect`.
    pub fn scrape_metrics(&self) -> &ScrapeMetrics {
        &self.scrape
    }

    /// The query issued on every scrape.
    pub fn query(&self) -> &CardinalityQuery {
        &self.query
    }

    /// Translates a response into metric families.
    ///
    /// Entries for other label names are skipped; the backend is asked for a
    /// single dimension and should never return them. A repeated value keeps
    /// its first occurrence, since duplicate series fail the whole scrape.
    fn families(&self, response: &LabelValuesResponse) -> Vec<MetricFamily> {
        let mut total = gauge_family(&self.total_desc);
        total.set_metric(
            vec![gauge_metric(
                &self.total_desc,
                &[],
                response.series_count_total as f64,
            )]
            .into(),
        );

        let mut seen = HashSet::new();
        let mut values = Vec::new();
        for value in response
            .labels
            .iter()
            .filter(|label| label.label_name == self.query.dimension)
            .flat_map(|label| label.cardinality.iter())
        {
            if !seen.insert(value.label_value.as_str()) {
                tracing::warn!(
                    dimension = %self.query.dimension,
                    value = %value.label_value,
                    series_count = value.series_count,
                    "dropping repeated label value"
                );
                continue;
            }
            values.push(gauge_metric(
                &self.value_desc,
                &[value.label_value.as_str()],
                value.series_count as f64,
            ));
        }

        let mut families = vec![total];
        // An empty family cannot be encoded.
        if !values.is_empty() {
            let mut family = gauge_family(&self.value_desc);
            family.set_metric(values.into());
            families.push(family);
        }
        families
    }
}

impl<S: CardinalitySource> Collector for CardinalityCollector<S> {
    fn desc(&self) -> Vec<&Desc> {
        let mut descs = vec![&self.total_desc, &self.value_desc];
        descs.extend(self.scrape.desc());
        descs
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let started = Instant::now();
        let result = self.source.label_values_cardinality(
            &self.label_names,
            &self.query.selector,
            self.query.timeout,
        );
        let elapsed = started.elapsed();

        let mut families = match result {
            Ok(response) => {
                self.scrape.record_success(elapsed);
                self.families(&response)
            }
            Err(err) => {
                tracing::error!(
                    error = %err,
                    dimension = %self.query.dimension,
                    timed_out = err.is_timeout(),
                    "failed to get cardinality"
                );
                self.scrape.record_failure(elapsed);
                Vec::new()
            }
        };

        families.extend(self.scrape.collect());
        families
    }
}

fn gauge_family(desc: &Desc) -> MetricFamily {
    let mut family = MetricFamily::default();
    family.set_name(desc.fq_name.clone());
    family.set_help(desc.help.clone());
    family.set_field_type(MetricType::GAUGE);
    family
}

fn gauge_metric(desc: &Desc, label_values: &[&str], value: f64) -> proto::Metric {
    let mut labels = desc.const_label_pairs.clone();
    for (name, label_value) in desc.variable_labels.iter().zip(label_values) {
        let mut pair = LabelPair::default();
        pair.set_name(name.clone());
        pair.set_value(label_value.to_string());
        labels.push(pair);
    }
    labels.sort_by(|a, b| a.get_name().cmp(b.get_name()));

    let mut gauge = proto::Gauge::default();
    gauge.set_value(value);

    let mut metric = proto::Metric::default();
    metric.set_label(labels.into());
    metric.set_gauge(gauge);
    metric
}
