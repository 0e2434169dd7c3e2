//! Gateway request type

use serde::{Deserialize, Serialize};

use super::{Header, Headers, HttpMethod, RequestBody};
use crate::error::{DomainError, DomainResult};

/// An outbound request to the backend API.
///
/// The path is relative to the configured base URL. Credentials are never
/// part of the request as built by callers; the gateway attaches them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayRequest {
    /// HTTP method
    pub method: HttpMethod,
    /// Path below the base URL, starting with `/`
    pub path: String,
    /// Query parameters in insertion order
    #[serde(default)]
    pub query: Vec<(String, String)>,
    /// Caller supplied headers
    #[serde(default)]
    pub headers: Headers,
    /// Optional body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<RequestBody>,
    /// Sent without a credential and never retried
    #[serde(default)]
    pub public: bool,
}

impl GatewayRequest {
    /// Creates a request for `method` and `path`.
    #[must_use]
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Headers::new(),
            body: None,
            public: false,
        }
    }

    /// Creates a GET request.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    /// Creates a POST request.
    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    /// Creates a PUT request.
    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    /// Creates a DELETE request.
    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    /// Adds a query parameter.
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.add(Header::new(name, value));
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    /// Sets a JSON body encoded from `value`.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidBody`] if the value cannot be encoded.
    pub fn with_json<T: Serialize + ?Sized>(self, value: &T) -> DomainResult<Self> {
        Ok(self.with_body(RequestBody::json(value)?))
    }

    /// Marks the request as public: no credential, no retry.
    #[must_use]
    pub const fn public(mut self) -> Self {
        self.public = true;
        self
    }

    /// Checks that the path is relative to the base URL.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidPath`] for absolute URLs, paths that
    /// do not start with `/`, and paths with backslashes or control
    /// characters. URL parsers read `\` as `/` and drop tabs and
    /// newlines, so either could turn the path into another host.
    pub fn validate(&self) -> DomainResult<()> {
        if !self.path.starts_with('/')
            || self.path.starts_with("//")
            || self.path.chars().any(|c| c == '\\' || c.is_control())
        {
            return Err(DomainError::InvalidPath(self.path.clone()));
        }
        Ok(())
    }
}
