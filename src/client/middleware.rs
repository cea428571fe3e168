//! Request decoration and dispatch.
//!
//! Outbound requests run through an ordered list of [`RequestMiddleware`]
//! values and are then handed to a [`Transport`]. The client installs basic
//! auth first and static headers second, so a static `Authorization` header
//! replaces the generated one.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::blocking::{Client, Request, Response};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, InvalidHeaderValue, AUTHORIZATION};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Sends a fully decorated request.
///
/// Implementations must be safe to share between concurrent scrapes.
pub trait Transport: Send + Sync {
    /// Executes the request and returns the response headers and body stream.
    fn execute(&self, request: Request) -> Result<Response, reqwest::Error>;
}

impl Transport for Client {
    fn execute(&self, request: Request) -> Result<Response, reqwest::Error> {
        Client::execute(self, request)
    }
}

/// A single step that mutates a request before it is sent.
pub trait RequestMiddleware: Send + Sync {
    /// Applies this step to the request.
    fn apply(&self, request: &mut Request);
}

/// Sets an `Authorization: Basic` header.
pub struct BasicAuth {
    value: HeaderValue,
}

impl BasicAuth {
    /// Builds the middleware, or `None` when both user and password are empty.
    pub fn new(user: &str, password: &str) -> Result<Option<Self>, InvalidHeaderValue> {
        if user.is_empty() && password.is_empty() {
            return Ok(None);
        }

        let encoded = STANDARD.encode(format!("{user}:{password}"));
        let mut value = HeaderValue::from_str(&format!("Basic {encoded}"))?;
        value.set_sensitive(true);
        Ok(Some(Self { value }))
    }
}

impl RequestMiddleware for BasicAuth {
    fn apply(&self, request: &mut Request) {
        request.headers_mut().insert(AUTHORIZATION, self.value.clone());
    }
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth").finish_non_exhaustive()
    }
}

/// Errors parsing a `name=value` header argument.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HeaderParseError {
    /// No `=` between name and value.
    #[error("header must be specified as name=value: {0:?}")]
    MissingSeparator(String),
    /// The name is not a valid HTTP header name.
    #[error("invalid header name: {0:?}")]
    InvalidName(String),
    /// The value is not a valid HTTP header value; carries the name.
    #[error("invalid value for header {0:?}")]
    InvalidValue(String),
}

/// One statically configured header, parsed from `name=value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticHeader {
    /// Header name.
    pub name: HeaderName,
    /// Header value.
    pub value: HeaderValue,
}

impl FromStr for StaticHeader {
    type Err = HeaderParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, value) = s
            .split_once('=')
            .ok_or_else(|| HeaderParseError::MissingSeparator(s.to_string()))?;
        let name = HeaderName::from_str(name.trim())
            .map_err(|_| HeaderParseError::InvalidName(name.to_string()))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| HeaderParseError::InvalidValue(name.as_str().to_string()))?;
        Ok(Self { name, value })
    }
}

/// Applies a fixed set of headers to every request.
///
/// Names may repeat. Each configured name first clears whatever the request
/// already carries under that name, then every configured value is appended.
#[derive(Debug, Clone, Default)]
pub struct StaticHeaders {
    headers: HeaderMap,
}

impl StaticHeaders {
    /// Collects the headers, preserving repeated names.
    pub fn new(headers: &[StaticHeader]) -> Self {
        let mut map = HeaderMap::new();
        for header in headers {
            map.append(header.name.clone(), header.value.clone());
        }
        Self { headers: map }
    }

    /// Returns true when no headers are configured.
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

impl RequestMiddleware for StaticHeaders {
    fn apply(&self, request: &mut Request) {
        let target = request.headers_mut();
        for name in self.headers.keys() {
            target.remove(name);
            for value in self.headers.get_all(name) {
                target.append(name.clone(), value.clone());
            }
        }
    }
}

/// A transport wrapped by an ordered middleware chain.
pub struct DecoratedTransport {
    middleware: Vec<Box<dyn RequestMiddleware>>,
    inner: Box<dyn Transport>,
}

impl DecoratedTransport {
    /// Wraps `inner` with no middleware.
    pub fn new(inner: impl Transport + 'static) -> Self {
        Self {
            middleware: Vec::new(),
            inner: Box::new(inner),
        }
    }

    /// Appends a step; steps run in the order they were added.
    pub fn with(mut self, step: impl RequestMiddleware + 'static) -> Self {
        self.middleware.push(Box::new(step));
        self
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.middleware.len()
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }

    /// Runs the middleware chain over the request without sending it.
    pub fn decorate(&self, mut request: Request) -> Request {
        for step in &self.middleware {
            step.apply(&mut request);
        }
        request
    }

    /// Decorates and sends the request.
    pub fn send(&self, request: Request) -> Result<Response, reqwest::Error> {
        self.inner.execute(self.decorate(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::{Method, Url};

    fn request() -> Request {
        Request::new(
            Method::GET,
            Url::parse("http://localhost/prometheus/api/v1/cardinality/label_names").unwrap(),
        )
    }

    fn transport() -> DecoratedTransport {
        DecoratedTransport::new(Client::new())
    }

    #[test]
    fn test_basic_auth_absent_without_credentials() {
        assert!(BasicAuth::new("", "").unwrap().is_none());
    }

    #[test]
    fn test_basic_auth_with_user_only() {
        let auth = BasicAuth::new("tenant", "").unwrap().unwrap();
        let mut req = request();
        auth.apply(&mut req);

        // base64("tenant:")
        assert_eq!(req.headers()[AUTHORIZATION], "Basic dGVuYW50Og==");
    }

    #[test]
    fn test_basic_auth_with_password_only() {
        let auth = BasicAuth::new("", "secret").unwrap();
        assert!(auth.is_some());
    }

    #[test]
    fn test_basic_auth_value_is_sensitive() {
        let auth = BasicAuth::new("user", "pass").unwrap().unwrap();
        let mut req = request();
        auth.apply(&mut req);

        assert!(req.headers()[AUTHORIZATION].is_sensitive());
        assert!(!format!("{auth:?}").contains("dXNlcjpwYXNz"));
    }

    #[test]
    fn test_static_header_parse() {
        let header: StaticHeader = "X-Scope-OrgID=tenant-1".parse().unwrap();
        assert_eq!(header.name, "x-scope-orgid");
        assert_eq!(header.value, "tenant-1");
    }

    #[test]
    fn test_static_header_value_may_contain_separator() {
        let header: StaticHeader = "X-Query=a=b".parse().unwrap();
        assert_eq!(header.value, "a=b");
    }

    #[test]
    fn test_static_header_parse_errors() {
        assert!(matches!(
            "X-Foo".parse::<StaticHeader>(),
            Err(HeaderParseError::MissingSeparator(_))
        ));
        assert!(matches!(
            "bad name=1".parse::<StaticHeader>(),
            Err(HeaderParseError::InvalidName(_))
        ));
        assert!(matches!(
            "X-Foo=line\nbreak".parse::<StaticHeader>(),
            Err(HeaderParseError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_static_headers_keep_repeated_values() {
        let headers = StaticHeaders::new(&[
            "X-Foo=a".parse().unwrap(),
            "X-Foo=b".parse().unwrap(),
            "X-Bar=c".parse().unwrap(),
        ]);
        let mut req = request();
        headers.apply(&mut req);

        let foo: Vec<_> = req.headers().get_all("x-foo").iter().collect();
        assert_eq!(foo, vec!["a", "b"]);
        assert_eq!(req.headers()["x-bar"], "c");
    }

    #[test]
    fn test_static_headers_apply_is_idempotent() {
        let headers = StaticHeaders::new(&["X-Foo=a".parse().unwrap()]);
        let mut req = request();
        headers.apply(&mut req);
        headers.apply(&mut req);

        assert_eq!(req.headers().get_all("x-foo").iter().count(), 1);
    }

    #[test]
    fn test_chain_order_static_headers_win() {
        let chain = transport()
            .with(BasicAuth::new("user", "pass").unwrap().unwrap())
            .with(StaticHeaders::new(&[
                "Authorization=Bearer token".parse().unwrap(),
            ]));
        assert_eq!(chain.len(), 2);

        let req = chain.decorate(request());
        let auth: Vec<_> = req.headers().get_all(AUTHORIZATION).iter().collect();
        assert_eq!(auth, vec!["Bearer token"]);
    }

    #[test]
    fn test_empty_chain_leaves_request_untouched() {
        let chain = transport();
        assert!(chain.is_empty());

        let req = chain.decorate(request());
        assert!(req.headers().is_empty());
    }
}
