//! Exporter configuration.
//!
//! Settings come from command-line flags and an optional TOML file. Flags
//! win over file values. Everything is resolved once at startup into
//! [`Settings`]; there is no reload.
//!
//! ```toml
//! [client]
//! address = "http://mimir:8080"
//! user = "tenant-1"
//! password = "secret"
//! headers = ["X-Scope-OrgID=tenant-1"]
//!
//! [collector]
//! dimension = "job"
//! selector = '{namespace="prod"}'
//! timeout = "30s"
//!
//! [server]
//! port = 8080
//! ```

use crate::client::{ClientConfig, HeaderParseError, StaticHeader};
use crate::metrics::{CardinalityQuery, MetricsServerConfig};
use clap::{Parser, Subcommand};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Port the scrape endpoint listens on by default.
pub const DEFAULT_PORT: u16 = 8080;
/// Dimension broken down by default.
pub const DEFAULT_DIMENSION: &str = "job";
/// Default deadline for a single backend query.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Command-line interface.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Address of the Prometheus-compatible backend
    #[arg(long)]
    pub address: Option<String>,

    /// User to be used in basic auth when contacting the backend
    #[arg(long)]
    pub user: Option<String>,

    /// Password to be used in basic auth when contacting the backend
    #[arg(long)]
    pub password: Option<String>,

    /// Header sent to the backend as name=value, can be specified multiple times
    #[arg(long = "header", value_name = "NAME=VALUE")]
    pub headers: Vec<StaticHeader>,

    /// Port to listen on [default: 8080]
    #[arg(long)]
    pub port: Option<u16>,

    /// Dimension to get cardinality for [default: job]
    #[arg(long)]
    pub dimension: Option<String>,

    /// Selector to get cardinality for
    #[arg(long)]
    pub selector: Option<String>,

    /// Timeout for fetching cardinality data (e.g. "30s", "1m") [default: 1m]
    #[arg(long)]
    pub timeout: Option<humantime::Duration>,

    /// Default log filter when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Action to run; `serve` when omitted
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// What the process does once configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Serve cardinality metrics for scraping (default)
    Serve,
    /// Print the per-label-name cardinality once as JSON
    LabelNames,
    /// Print the per-value cardinality of the dimension once as JSON
    LabelValues,
}

/// Configuration errors. All of them are fatal at startup.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Neither the CLI nor the file names a backend.
    #[error("backend address is required (--address or [client] address)")]
    MissingAddress,
    /// The backend address is not an absolute http or https URL.
    #[error("invalid backend address {address:?}: {reason}")]
    InvalidAddress {
        /// Address as configured.
        address: String,
        /// Why it was rejected.
        reason: String,
    },
    /// A static header is not `name=value`.
    #[error("invalid header: {0}")]
    InvalidHeader(#[from] HeaderParseError),
    /// The dimension is empty.
    #[error("dimension must not be empty")]
    EmptyDimension,
    /// The timeout is zero or unparseable.
    #[error("invalid timeout {0:?} (must be a positive duration such as \"30s\")")]
    InvalidTimeout(String),
    /// The config file could not be read.
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    /// The config file is not valid TOML for [`FileConfig`].
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// `[client]` section.
    #[serde(default)]
    pub client: ClientSection,
    /// `[collector]` section.
    #[serde(default)]
    pub collector: CollectorSection,
    /// `[server]` section.
    #[serde(default)]
    pub server: ServerSection,
}

/// Backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClientSection {
    /// Address of the backend.
    pub address: Option<String>,
    /// Basic-auth user.
    pub user: Option<String>,
    /// Basic-auth password.
    pub password: Option<String>,
    /// Static headers as `name=value`.
    #[serde(default)]
    pub headers: Vec<String>,
}

/// Query settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CollectorSection {
    /// Label name to break down.
    pub dimension: Option<String>,
    /// Series selector.
    pub selector: Option<String>,
    /// Per-query deadline in humantime format.
    pub timeout: Option<String>,
}

/// Scrape endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerSection {
    /// Listen port.
    pub port: Option<u16>,
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

/// Fully resolved startup configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Backend connection.
    pub client: ClientConfig,
    /// Query issued on every scrape.
    pub query: CardinalityQuery,
    /// Scrape endpoint.
    pub server: MetricsServerConfig,
}

impl Settings {
    /// Resolves settings from the command line, reading `--config` if given.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let file = match &cli.config {
            Some(path) => FileConfig::from_file(path)?,
            None => FileConfig::default(),
        };
        Self::resolve(file, cli)
    }

    /// Merges file values with command-line overrides and validates the result.
    pub fn resolve(file: FileConfig, cli: &Cli) -> Result<Self, ConfigError> {
        let address = cli
            .address
            .clone()
            .or(file.client.address)
            .filter(|a| !a.is_empty())
            .ok_or(ConfigError::MissingAddress)?;
        let address = parse_address(&address)?;

        let headers = if cli.headers.is_empty() {
            file.client
                .headers
                .iter()
                .map(|h| h.parse::<StaticHeader>())
                .collect::<Result<Vec<_>, _>>()?
        } else {
            cli.headers.clone()
        };

        let client = ClientConfig {
            address,
            user: cli.user.clone().or(file.client.user).unwrap_or_default(),
            password: cli.password.clone().or(file.client.password).unwrap_or_default(),
            headers,
        };

        let dimension = cli
            .dimension
            .clone()
            .or(file.collector.dimension)
            .unwrap_or_else(|| DEFAULT_DIMENSION.to_string());
        if dimension.is_empty() {
            return Err(ConfigError::EmptyDimension);
        }

        let timeout = match (cli.timeout.as_ref(), file.collector.timeout) {
            (Some(timeout), _) => **timeout,
            (None, Some(raw)) => humantime::parse_duration(&raw)
                .map_err(|_| ConfigError::InvalidTimeout(raw.clone()))?,
            (None, None) => DEFAULT_TIMEOUT,
        };
        if timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                humantime::format_duration(timeout).to_string(),
            ));
        }

        let query = CardinalityQuery {
            dimension,
            selector: cli
                .selector
                .clone()
                .or(file.collector.selector)
                .unwrap_or_default(),
            timeout,
        };

        let port = cli.port.or(file.server.port).unwrap_or(DEFAULT_PORT);

        Ok(Self {
            client,
            query,
            server: MetricsServerConfig::with_port(port),
        })
    }
}

fn parse_address(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidAddress {
        address: raw.to_string(),
        reason,
    };
    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(format!("unsupported scheme {other:?}"))),
    }
}
