//! Cardinality Exporter Library
//!
//! Polls a Prometheus-compatible backend's cardinality-analysis API and
//! republishes the results as gauges for a Prometheus scrape target.
//!
//! # Architecture
//!
//! ```text
//! scrape → MetricsServer → MetricsRegistry::encode
//!                                ↓
//!                     CardinalityCollector::collect
//!                                ↓
//!            CardinalityClient (basic auth → static headers → transport)
//!                                ↓
//!                      GET /prometheus/api/v1/cardinality/label_values
//! ```
//!
//! # Design Principles
//!
//! - **Stateless**: every scrape re-derives its samples from a fresh query
//! - **No fabricated data**: a failed query yields no cardinality samples,
//!   never zeros
//! - **Bounded**: each query carries its own deadline and is never retried
//!
//! # Example
//!
//! ```no_run
//! use cardinality_exporter::{
//!     client::{CardinalityClient, ClientConfig},
//!     metrics::{CardinalityQuery, MetricsRegistry},
//! };
//! use std::time::Duration;
//!
//! let mut config = ClientConfig::new("http://mimir:8080".parse().unwrap());
//! config.headers.push("X-Scope-OrgID=tenant-1".parse().unwrap());
//!
//! let client = CardinalityClient::from_config(&config).unwrap();
//! let query = CardinalityQuery::new("job", Duration::from_secs(30));
//! let registry = MetricsRegistry::new(client, query).unwrap();
//!
//! print!("{}", registry.encode().unwrap());
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod metrics;

// Re-export commonly used types at crate root
pub use client::{CardinalityClient, CardinalitySource, ClientConfig, ClientError};
pub use config::{Cli, Command, ConfigError, Settings};
pub use metrics::{
    CardinalityCollector, CardinalityQuery, MetricsError, MetricsRegistry, MetricsServer,
    MetricsServerConfig,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
