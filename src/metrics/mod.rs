//! Prometheus exporter for backend cardinality.
//!
//! # Metrics Exposed
//!
//! ## Cardinality
//! - `grafana_mimir_top_cardinality_total{dimension}` - Total series count
//! - `grafana_mimir_top_cardinality{dimension, exported_<dimension>}` - Series
//!   count per value of the dimension
//!
//! Both are re-derived from a fresh backend query on every scrape and are
//! absent when that query fails.
//!
//! ## Exporter
//! - `cardinality_exporter_scrape_failures_total` - Failed backend queries
//! - `cardinality_exporter_last_scrape_success` - 1 if the last query succeeded
//! - `cardinality_exporter_scrape_duration_seconds` - Duration of the last query
//!
//! # Example
//!
//! ```no_run
//! use cardinality_exporter::client::{CardinalityClient, ClientConfig};
//! use cardinality_exporter::metrics::{CardinalityQuery, MetricsRegistry};
//! use std::time::Duration;
//!
//! let address = "http://mimir:8080".parse().expect("valid URL");
//! let client = CardinalityClient::from_config(&ClientConfig::new(address))
//!     .expect("Failed to create client");
//!
//! let query = CardinalityQuery::new("job", Duration::from_secs(60));
//! let registry = MetricsRegistry::new(client, query).expect("Failed to create registry");
//!
//! println!("{}", registry.encode().expect("Failed to encode"));
//! ```

mod cardinality;
mod collector;
mod server;

pub use cardinality::{
    CardinalityCollector, CardinalityQuery, TOTAL_METRIC_NAME, VALUE_METRIC_NAME,
};
pub use collector::{MetricsError, MetricsRegistry, ScrapeMetrics};
pub use server::{MetricsServer, MetricsServerConfig, ServerError};
