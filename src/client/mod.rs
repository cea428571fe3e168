//! Client for the backend's cardinality-analysis API.
//!
//! Two read-only queries are supported:
//!
//! - `GET /prometheus/api/v1/cardinality/label_values` - per-value series
//!   counts for one or more label names.
//! - `GET /prometheus/api/v1/cardinality/label_names` - value counts per
//!   label name.
//!
//! Every request passes through an ordered middleware chain (basic auth,
//! then static headers) before the transport sends it. The client keeps no
//! state between calls and never retries.

mod http;
mod middleware;
mod response;

pub use http::{CardinalityClient, CardinalitySource, ClientConfig, ClientError};
pub use middleware::{
    BasicAuth, DecoratedTransport, HeaderParseError, RequestMiddleware, StaticHeader,
    StaticHeaders, Transport,
};
pub use response::{
    LabelNamesCardinality, LabelNamesResponse, LabelValueCardinality, LabelValuesLabel,
    LabelValuesResponse,
};
