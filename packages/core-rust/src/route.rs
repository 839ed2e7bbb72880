//! Path-addressed endpoint declarations.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use http::Method;

use crate::access::AccessPolicy;
use crate::action::ActionStep;
use crate::error::{RegistryError, RelayError};
use crate::handler::{route_handler, ErrorHook, Reply, RouteContext, RouteHandler};
use crate::path::PathPattern;
use crate::schema::{Schema, SchemaRef};

/// Verbs a route may be declared with. `HEAD` is served by `GET` routes.
pub const ROUTE_METHODS: [Method; 5] = [Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE];

/// Body encoding the call generator uses for a route.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ContentKind {
    #[default]
    Json,
    /// `multipart/form-data`, allowing file parts.
    Form,
}

/// A `(method, path)` endpoint.
///
/// Built with the fluent methods below, registered once, then shared
/// read-only. Cloning is cheap; schemas and closures are reference counted.
#[derive(Clone)]
pub struct Route {
    method: Method,
    path: String,
    params: Option<SchemaRef>,
    query: Option<SchemaRef>,
    body: Option<SchemaRef>,
    actions: Vec<ActionStep>,
    output: Option<SchemaRef>,
    access: Option<AccessPolicy>,
    content: ContentKind,
    handler: Option<RouteHandler>,
    on_error: Option<ErrorHook>,
}

impl Route {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: None,
            query: None,
            body: None,
            actions: Vec::new(),
            output: None,
            access: None,
            content: ContentKind::Json,
            handler: None,
            on_error: None,
        }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    #[must_use]
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    // -- builder ------------------------------------------------------------

    /// Schema for the `:name` captures (always strings on the wire).
    #[must_use]
    pub fn params(mut self, schema: impl Schema + 'static) -> Self {
        self.params = Some(Arc::new(schema));
        self
    }

    /// Schema for the query string (`{}` when absent).
    #[must_use]
    pub fn query(mut self, schema: impl Schema + 'static) -> Self {
        self.query = Some(Arc::new(schema));
        self
    }

    /// Schema for the decoded body. Ignored for `GET`.
    #[must_use]
    pub fn body(mut self, schema: impl Schema + 'static) -> Self {
        self.body = Some(Arc::new(schema));
        self
    }

    /// Replaces the action chain.
    #[must_use]
    pub fn actions<I, A>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<ActionStep>,
    {
        self.actions = actions.into_iter().map(Into::into).collect();
        self
    }

    /// Appends one action to the chain.
    #[must_use]
    pub fn action(mut self, action: impl Into<ActionStep>) -> Self {
        self.actions.push(action.into());
        self
    }

    /// Schema the client re-validates successful `data` against.
    #[must_use]
    pub fn output(mut self, schema: impl Schema + 'static) -> Self {
        self.output = Some(Arc::new(schema));
        self
    }

    #[must_use]
    pub fn access(mut self, policy: AccessPolicy) -> Self {
        self.access = Some(policy);
        self
    }

    #[must_use]
    pub fn content(mut self, kind: ContentKind) -> Self {
        self.content = kind;
        self
    }

    #[must_use]
    pub fn handle<F, Fut, R>(mut self, f: F) -> Self
    where
        F: Fn(RouteContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
        R: Into<Reply>,
    {
        self.handler = Some(route_handler(f));
        self
    }

    /// Maps unexpected handler failures to a typed error.
    #[must_use]
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&anyhow::Error) -> RelayError + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(f));
        self
    }

    // -- accessors ----------------------------------------------------------

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Parses the path.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidPath`] for malformed paths.
    pub fn pattern(&self) -> Result<PathPattern, RegistryError> {
        PathPattern::parse(&self.path)
    }

    #[must_use]
    pub fn params_schema(&self) -> Option<&SchemaRef> {
        self.params.as_ref()
    }

    #[must_use]
    pub fn query_schema(&self) -> Option<&SchemaRef> {
        self.query.as_ref()
    }

    #[must_use]
    pub fn body_schema(&self) -> Option<&SchemaRef> {
        self.body.as_ref()
    }

    #[must_use]
    pub fn action_steps(&self) -> &[ActionStep] {
        &self.actions
    }

    #[must_use]
    pub fn output_schema(&self) -> Option<&SchemaRef> {
        self.output.as_ref()
    }

    #[must_use]
    pub fn access_policy(&self) -> Option<&AccessPolicy> {
        self.access.as_ref()
    }

    #[must_use]
    pub fn content_kind(&self) -> ContentKind {
        self.content
    }

    #[must_use]
    pub fn handler(&self) -> Option<&RouteHandler> {
        self.handler.as_ref()
    }

    #[must_use]
    pub fn error_hook(&self) -> Option<&ErrorHook> {
        self.on_error.as_ref()
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("actions", &self.actions)
            .field("access", &self.access)
            .field("content", &self.content)
            .field("handler", &self.handler.is_some())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::action::Action;
    use crate::schema::from_fn;

    use super::*;

    #[test]
    fn builder_records_declaration() {
        let route = Route::post("/users")
            .body(from_fn(Ok))
            .action(Action::make("audit"))
            .access(AccessPolicy::Session)
            .content(ContentKind::Form)
            .handle(|_ctx| async { Ok(json!({ "id": "u-1" })) });

        assert_eq!(route.method(), Method::POST);
        assert_eq!(route.path(), "/users");
        assert!(route.body_schema().is_some());
        assert!(route.params_schema().is_none());
        assert_eq!(route.action_steps().len(), 1);
        assert_eq!(route.content_kind(), ContentKind::Form);
        assert!(route.handler().is_some());
        assert_eq!(route.to_string(), "POST /users");
    }

    #[test]
    fn actions_replace_and_action_appends() {
        let route = Route::get("/")
            .action(Action::make("a"))
            .actions([Action::make("b"), Action::make("c")])
            .action(Action::make("d"));
        let names: Vec<&str> = route.action_steps().iter().map(|s| s.action().name()).collect();
        assert_eq!(names, vec!["b", "c", "d"]);
    }

    #[test]
    fn invalid_path_is_reported_by_pattern() {
        assert!(Route::get("users").pattern().is_err());
    }
}
