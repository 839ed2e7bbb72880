//! Name-addressed endpoint declarations (RPC).

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::action::ActionStep;
use crate::handler::{procedure_handler, ProcedureContext, ProcedureHandler, Reply};
use crate::schema::{Schema, SchemaRef};

/// An RPC method such as `"numbers:add"`.
#[derive(Clone)]
pub struct Procedure {
    method: String,
    params: Option<SchemaRef>,
    actions: Vec<ActionStep>,
    result: Option<SchemaRef>,
    handler: Option<ProcedureHandler>,
}

impl Procedure {
    #[must_use]
    pub fn method(name: impl Into<String>) -> Self {
        Self {
            method: name.into(),
            params: None,
            actions: Vec::new(),
            result: None,
            handler: None,
        }
    }

    /// Schema for `params`. Once declared, a call without params is rejected.
    #[must_use]
    pub fn params(mut self, schema: impl Schema + 'static) -> Self {
        self.params = Some(Arc::new(schema));
        self
    }

    #[must_use]
    pub fn actions<I, A>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<ActionStep>,
    {
        self.actions = actions.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn action(mut self, action: impl Into<ActionStep>) -> Self {
        self.actions.push(action.into());
        self
    }

    /// Schema the client re-validates `result` against.
    #[must_use]
    pub fn result(mut self, schema: impl Schema + 'static) -> Self {
        self.result = Some(Arc::new(schema));
        self
    }

    #[must_use]
    pub fn handle<F, Fut, R>(mut self, f: F) -> Self
    where
        F: Fn(ProcedureContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
        R: Into<Reply>,
    {
        self.handler = Some(procedure_handler(f));
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.method
    }

    #[must_use]
    pub fn params_schema(&self) -> Option<&SchemaRef> {
        self.params.as_ref()
    }

    #[must_use]
    pub fn action_steps(&self) -> &[ActionStep] {
        &self.actions
    }

    #[must_use]
    pub fn result_schema(&self) -> Option<&SchemaRef> {
        self.result.as_ref()
    }

    #[must_use]
    pub fn handler(&self) -> Option<&ProcedureHandler> {
        self.handler.as_ref()
    }
}

impl fmt::Debug for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Procedure")
            .field("method", &self.method)
            .field("params", &self.params.is_some())
            .field("actions", &self.actions)
            .field("handler", &self.handler.is_some())
            .finish_non_exhaustive()
    }
}
