//! Per-request state handed through the pipeline: session, correlation id,
//! and headers to add to the response.

use std::sync::Arc;

use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RelayError;

/// Authenticated session resolved for a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Session identifier.
    pub id: String,
    /// Account the session belongs to.
    pub account_id: String,
    /// Roles granted to the account, used by access predicates.
    #[serde(default)]
    pub roles: Vec<String>,
    /// Opaque data attached by the session resolver.
    #[serde(default)]
    pub data: Value,
}

impl Session {
    #[must_use]
    pub fn new(id: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            account_id: account_id.into(),
            roles: Vec::new(),
            data: Value::Null,
        }
    }

    #[must_use]
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Per-request context carrying the session, correlation id, and the
/// response headers handlers want added to the framed response.
///
/// Cheap to clone; clones share the response header map.
#[derive(Debug, Clone)]
pub struct RequestContext {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    correlation_id: String,
    method: Method,
    path: String,
    headers: HeaderMap,
    session: Option<Session>,
    response_headers: Mutex<HeaderMap>,
}

impl RequestContext {
    #[must_use]
    pub fn builder(method: Method, path: impl Into<String>) -> RequestContextBuilder {
        RequestContextBuilder {
            correlation_id: String::new(),
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            session: None,
        }
    }

    /// Correlation id for logs, taken from the `x-request-id` header when present.
    #[must_use]
    pub fn correlation_id(&self) -> &str {
        &self.inner.correlation_id
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.inner.method
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.inner.path
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.inner.headers
    }

    /// First value of a request header, if it is valid UTF-8.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner.headers.get(name).and_then(|v| v.to_str().ok())
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.session.is_some()
    }

    /// The resolved session.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` when the request carries no session.
    pub fn session(&self) -> Result<&Session, RelayError> {
        self.inner
            .session
            .as_ref()
            .ok_or_else(|| RelayError::unauthorized("Unauthorized"))
    }

    /// Account id of the resolved session.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` when the request carries no session.
    pub fn account_id(&self) -> Result<&str, RelayError> {
        self.session().map(|session| session.account_id.as_str())
    }

    /// Sets a header on the eventual response, replacing any previous value.
    pub fn set_response_header(&self, name: HeaderName, value: HeaderValue) {
        self.inner.response_headers.lock().insert(name, value);
    }

    /// Snapshot of the headers queued for the response.
    #[must_use]
    pub fn response_headers(&self) -> HeaderMap {
        self.inner.response_headers.lock().clone()
    }
}

/// Builder for [`RequestContext`].
#[derive(Debug)]
pub struct RequestContextBuilder {
    correlation_id: String,
    method: Method,
    path: String,
    headers: HeaderMap,
    session: Option<Session>,
}

impl RequestContextBuilder {
    #[must_use]
    pub fn correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = id.into();
        self
    }

    #[must_use]
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn session(mut self, session: Option<Session>) -> Self {
        self.session = session;
        self
    }

    #[must_use]
    pub fn build(self) -> RequestContext {
        RequestContext {
            inner: Arc::new(Inner {
                correlation_id: self.correlation_id,
                method: self.method,
                path: self.path,
                headers: self.headers,
                session: self.session,
                response_headers: Mutex::new(HeaderMap::new()),
            }),
        }
    }
}
