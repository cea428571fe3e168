//! HTTP client for the cardinality endpoints.

use super::middleware::{BasicAuth, DecoratedTransport, StaticHeader, StaticHeaders, Transport};
use super::response::{LabelNamesResponse, LabelValuesResponse};
use reqwest::{blocking::Request, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

const LABEL_VALUES_PATH: [&str; 5] = ["prometheus", "api", "v1", "cardinality", "label_values"];
const LABEL_NAMES_PATH: [&str; 5] = ["prometheus", "api", "v1", "cardinality", "label_names"];

/// Longest error body kept in [`ClientError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// Errors returned by cardinality queries.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request could not be completed: connection, DNS, TLS or deadline.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("unexpected status {status}: {body}")]
    Status {
        /// Response status code.
        status: StatusCode,
        /// Start of the response body, for diagnosis.
        body: String,
    },

    /// The body is not valid JSON for the expected schema.
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The client could not be built from its configuration.
    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl ClientError {
    /// Returns true if the per-call deadline elapsed.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Transport(e) if e.is_timeout())
    }
}

/// Connection settings for the backend.
#[derive(Clone)]
pub struct ClientConfig {
    /// Base address of the backend; any path prefix is preserved.
    pub address: Url,
    /// Basic-auth user.
    pub user: String,
    /// Basic-auth password.
    pub password: String,
    /// Headers sent with every request.
    pub headers: Vec<StaticHeader>,
}

impl ClientConfig {
    /// Creates a config with no credentials and no extra headers.
    pub fn new(address: Url) -> Self {
        Self {
            address,
            user: String::new(),
            password: String::new(),
            headers: Vec::new(),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("address", &self.address.as_str())
            .field("user", &self.user)
            .field("password", &if self.password.is_empty() { "" } else { "<redacted>" })
            .field("headers", &self.headers)
            .finish()
    }
}

/// Source of cardinality data.
///
/// [`CardinalityClient`] is the production implementation; the collector
/// only depends on this trait.
pub trait CardinalitySource: Send + Sync {
    /// Per-value series counts for the given label names.
    fn label_values_cardinality(
        &self,
        label_names: &[String],
        selector: &str,
        timeout: Duration,
    ) -> Result<LabelValuesResponse, ClientError>;

    /// Value counts per label name.
    fn label_names_cardinality(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<LabelNamesResponse, ClientError>;
}

/// Stateless client for the cardinality API.
///
/// Each call issues exactly one GET request bounded by its own timeout.
/// Connection pooling is left to the transport.
pub struct CardinalityClient {
    address: Url,
    transport: DecoratedTransport,
}

impl CardinalityClient {
    /// Creates a client sending requests through `transport`.
    ///
    /// Basic auth is installed when either credential is non-empty; static
    /// headers are installed after it.
    pub fn new(config: &ClientConfig, transport: impl Transport + 'static) -> Result<Self, ClientError> {
        if config.address.cannot_be_a_base() {
            return Err(ClientError::Config(format!(
                "address {} cannot be used as a base URL",
                config.address
            )));
        }

        let mut decorated = DecoratedTransport::new(transport);
        let auth = BasicAuth::new(&config.user, &config.password)
            .map_err(|e| ClientError::Config(format!("invalid basic-auth credentials: {e}")))?;
        if let Some(auth) = auth {
            decorated = decorated.with(auth);
        }
        let headers = StaticHeaders::new(&config.headers);
        if !headers.is_empty() {
            decorated = decorated.with(headers);
        }

        Ok(Self {
            address: config.address.clone(),
            transport: decorated,
        })
    }

    /// Creates a client backed by a default blocking `reqwest` client.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;
        Self::new(config, http)
    }

    /// Base address requests are sent to.
    pub fn address(&self) -> &Url {
        &self.address
    }

    /// Fetches per-value series counts for `label_names`.
    ///
    /// An empty `selector` is left out of the request.
    pub fn label_values_cardinality(
        &self,
        label_names: &[String],
        selector: &str,
        timeout: Duration,
    ) -> Result<LabelValuesResponse, ClientError> {
        let mut url = self.endpoint(&LABEL_VALUES_PATH);
        {
            let mut query = url.query_pairs_mut();
            for name in label_names {
                query.append_pair("label_names[]", name);
            }
            if !selector.is_empty() {
                query.append_pair("selector", selector);
            }
        }
        self.get(url, timeout)
    }

    /// Fetches value counts per label name.
    ///
    /// `selector` is always sent, even when empty.
    pub fn label_names_cardinality(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<LabelNamesResponse, ClientError> {
        let mut url = self.endpoint(&LABEL_NAMES_PATH);
        url.query_pairs_mut().append_pair("selector", selector);
        self.get(url, timeout)
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.address.clone();
        url.set_query(None);
        url.set_fragment(None);
        // Checked in `new`.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn get<T: DeserializeOwned>(&self, url: Url, timeout: Duration) -> Result<T, ClientError> {
        let mut request = Request::new(Method::GET, url);
        *request.timeout_mut() = Some(timeout);

        tracing::debug!(url = %request.url(), ?timeout, "querying cardinality");

        let response = self.transport.send(request)?;
        let status = response.status();
        let body = response.text()?;

        if !status.is_success() {
            return Err(ClientError::Status {
                status,
                body: truncate(body, MAX_ERROR_BODY),
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

impl CardinalitySource for CardinalityClient {
    fn label_values_cardinality(
        &self,
        label_names: &[String],
        selector: &str,
        timeout: Duration,
    ) -> Result<LabelValuesResponse, ClientError> {
        CardinalityClient::label_values_cardinality(self, label_names, selector, timeout)
    }

    fn label_names_cardinality(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<LabelNamesResponse, ClientError> {
        CardinalityClient::label_names_cardinality(self, selector, timeout)
    }
}

fn truncate(mut body: String, max: usize) -> String {
    if body.len() > max {
        let mut end = max;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
        body.push_str("...");
    }
    body
}
