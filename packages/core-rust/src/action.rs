//! Actions: named, schema-checked steps that run before a handler and merge
//! their output into the handler's context.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::handler::BoxFuture;
use crate::schema::{Schema, SchemaRef};

/// Type-erased action handler.
pub type ActionHandler = Arc<dyn Fn(Value) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

/// Maps the pipeline state to an action's input.
pub type DeriveInput = Arc<dyn Fn(&ActionScope<'_>) -> Value + Send + Sync>;

/// A reusable pipeline step.
///
/// The handler receives the validated input (`null` when the action declares
/// no input schema) and returns an object whose fields are merged into the
/// context, or `null` for nothing. Returning a [`RelayError`](crate::RelayError)
/// stops the chain.
#[derive(Clone)]
pub struct Action {
    name: String,
    input: Option<SchemaRef>,
    output: Option<SchemaRef>,
    handler: Option<ActionHandler>,
}

impl Action {
    #[must_use]
    pub fn make(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input: None,
            output: None,
            handler: None,
        }
    }

    #[must_use]
    pub fn input(mut self, schema: impl Schema + 'static) -> Self {
        self.input = Some(Arc::new(schema));
        self
    }

    /// Output contract checked against every value the handler returns.
    #[must_use]
    pub fn output(mut self, schema: impl Schema + 'static) -> Self {
        self.output = Some(Arc::new(schema));
        self
    }

    #[must_use]
    pub fn handle<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        let handler: ActionHandler = Arc::new(move |input| -> BoxFuture<'static, anyhow::Result<Value>> {
            Box::pin(f(input))
        });
        self.handler = Some(handler);
        self
    }

    /// Attaches this action with an explicit input derivation.
    #[must_use]
    pub fn derive<F>(self, f: F) -> ActionStep
    where
        F: Fn(&ActionScope<'_>) -> Value + Send + Sync + 'static,
    {
        ActionStep {
            action: self,
            derive: Some(Arc::new(f)),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn input_schema(&self) -> Option<&SchemaRef> {
        self.input.as_ref()
    }

    #[must_use]
    pub fn output_schema(&self) -> Option<&SchemaRef> {
        self.output.as_ref()
    }

    #[must_use]
    pub fn handler(&self) -> Option<&ActionHandler> {
        self.handler.as_ref()
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.name)
            .field("input", &self.input.is_some())
            .field("output", &self.output.is_some())
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ActionStep
// ---------------------------------------------------------------------------

/// An action as attached to a route or procedure.
#[derive(Clone)]
pub struct ActionStep {
    action: Action,
    derive: Option<DeriveInput>,
}

impl ActionStep {
    #[must_use]
    pub fn action(&self) -> &Action {
        &self.action
    }

    /// Computes the action input.
    ///
    /// With a derivation the closure decides. Otherwise the action sees the
    /// current context when it declares an input schema, and `null` when it
    /// does not.
    #[must_use]
    pub fn input_for(&self, scope: &ActionScope<'_>) -> Value {
        match (&self.derive, &self.action.input) {
            (Some(derive), _) => derive(scope),
            (None, Some(_)) => scope.current(),
            (None, None) => Value::Null,
        }
    }
}

impl From<Action> for ActionStep {
    fn from(action: Action) -> Self {
        Self {
            action,
            derive: None,
        }
    }
}

impl fmt::Debug for ActionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionStep")
            .field("action", &self.action.name)
            .field("derive", &self.derive.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ActionScope
// ---------------------------------------------------------------------------

/// Pipeline state visible to an input derivation.
#[derive(Debug, Clone, Copy)]
pub struct ActionScope<'a> {
    /// Validated request input: the merged REST input object, or the RPC params.
    pub input: &'a Value,
    /// Outputs of the actions that already ran.
    pub outputs: &'a Map<String, Value>,
}

impl ActionScope<'_> {
    /// The input with prior outputs merged over it. Non-object input is
    /// returned as is.
    #[must_use]
    pub fn current(&self) -> Value {
        match self.input {
            Value::Object(input) => {
                let mut merged = input.clone();
                merged.extend(self.outputs.iter().map(|(k, v)| (k.clone(), v.clone())));
                Value::Object(merged)
            }
            other => other.clone(),
        }
    }
}
