//! The stages shared by REST and RPC: the action chain, the handler call,
//! and the conversion of failures into typed errors.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use relay_core::action::ActionScope;
use relay_core::{
    ActionStep, ProcedureContext, Procedure, RelayError, Reply, RequestContext, Route, RouteContext, SchemaRef,
};
use serde_json::{Map, Value};
use tracing::{debug, error};

/// What is being invoked, with the input validated so far.
pub(crate) enum Invocation<'a> {
    /// REST: the merged params, query, and body.
    Route {
        route: &'a Route,
        input: Map<String, Value>,
    },
    /// RPC: the validated params, `None` when the procedure declares none.
    Procedure {
        procedure: &'a Procedure,
        params: Option<Value>,
    },
}

impl Invocation<'_> {
    fn steps(&self) -> &[ActionStep] {
        match self {
            Self::Route { route, .. } => route.action_steps(),
            Self::Procedure { procedure, .. } => procedure.action_steps(),
        }
    }

    fn scope_input(&self) -> Value {
        match self {
            Self::Route { input, .. } => Value::Object(input.clone()),
            Self::Procedure { params, .. } => params.clone().unwrap_or(Value::Null),
        }
    }
}

impl fmt::Display for Invocation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Route { route, .. } => write!(f, "Route '{route}'"),
            Self::Procedure { procedure, .. } => write!(f, "Procedure '{}'", procedure.name()),
        }
    }
}

/// Validates `value`, turning a report into `BadRequest` with `message`.
pub(crate) async fn validate(schema: &SchemaRef, value: Value, message: &str) -> Result<Value, RelayError> {
    schema.parse(value).await.map_err(|report| {
        debug!(stage = message, ?report, "validation failed");
        RelayError::bad_request(message).with_data(report.to_value())
    })
}

/// Runs the action chain in declaration order, then the handler.
pub(crate) async fn run(invocation: Invocation<'_>, ctx: &RequestContext) -> Result<Reply, RelayError> {
    let outputs = run_actions(&invocation, ctx).await?;

    match invocation {
        Invocation::Route { route, mut input } => {
            let Some(handler) = route.handler() else {
                error!(route = %route, "route has no handler");
                return Err(RelayError::internal(format!("Route '{route}' is missing handler.")));
            };
            input.extend(outputs);
            let call = handler(RouteContext::new(input, ctx.clone()));
            match guarded(call).await {
                Ok(reply) => Ok(reply),
                Err(failure) => Err(match (failure, route.error_hook()) {
                    (Failure::Unexpected(err), Some(hook)) => {
                        error!(route = %route, error = ?err, "handler failed, mapped by error hook");
                        hook(&err)
                    }
                    (failure, _) => failure.into_relay_error(&format!("Route '{route}'")),
                }),
            }
        }
        Invocation::Procedure { procedure, params } => {
            let Some(handler) = procedure.handler() else {
                error!(procedure = procedure.name(), "procedure has no handler");
                return Err(RelayError::internal(format!(
                    "Procedure '{}' is missing handler.",
                    procedure.name()
                )));
            };
            let call = handler(ProcedureContext::new(params, outputs, ctx.clone()));
            guarded(call)
                .await
                .map_err(|failure| failure.into_relay_error(&format!("Procedure '{}'", procedure.name())))
        }
    }
}

async fn run_actions(invocation: &Invocation<'_>, ctx: &RequestContext) -> Result<Map<String, Value>, RelayError> {
    let input = invocation.scope_input();
    let mut outputs = Map::new();

    for step in invocation.steps() {
        let action = step.action();
        let raw = step.input_for(&ActionScope {
            input: &input,
            outputs: &outputs,
        });

        let value = match action.input_schema() {
            Some(schema) => validate(schema, raw, "Invalid action input").await?,
            None => raw,
        };

        let Some(handler) = action.handler() else {
            error!(action = action.name(), target = %invocation, "action has no handler");
            return Err(RelayError::internal(format!(
                "Action '{}' is missing handler.",
                action.name()
            )));
        };

        debug!(action = action.name(), correlation_id = ctx.correlation_id(), "running action");
        let output = guarded(handler(value))
            .await
            .map_err(|failure| failure.into_relay_error(&format!("Action '{}'", action.name())))?;

        let output = match action.output_schema() {
            Some(schema) => schema.parse(output).await.map_err(|report| {
                error!(action = action.name(), ?report, "action output violates its contract");
                RelayError::internal(format!("Action '{}' returned invalid output.", action.name()))
                    .with_data(report.to_value())
            })?,
            None => output,
        };

        match output {
            Value::Object(fields) => outputs.extend(fields),
            Value::Null => {}
            _ => {
                error!(action = action.name(), "action returned a non-object output");
                return Err(RelayError::internal(format!(
                    "Action '{}' must return an object.",
                    action.name()
                )));
            }
        }
    }

    Ok(outputs)
}

// ---------------------------------------------------------------------------
// Failure classification
// ---------------------------------------------------------------------------

enum Failure {
    /// A taxonomy error returned on purpose.
    Typed(RelayError),
    /// Any other error, or a panic.
    Unexpected(anyhow::Error),
}

impl Failure {
    fn into_relay_error(self, origin: &str) -> RelayError {
        match self {
            Self::Typed(err) => err,
            Self::Unexpected(err) => {
                error!(origin, error = ?err, "unexpected failure");
                RelayError::internal(err.to_string())
            }
        }
    }
}

/// Awaits `fut`, sorting its error into typed and unexpected, and catching panics.
async fn guarded<T, F>(fut: F) -> Result<T, Failure>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(match err.downcast::<RelayError>() {
            Ok(typed) => Failure::Typed(typed),
            Err(other) => Failure::Unexpected(other),
        }),
        Err(payload) => Err(Failure::Unexpected(anyhow::anyhow!(panic_message(&*payload)))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
