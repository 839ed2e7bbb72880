//! Schema validation capability.
//!
//! The dispatcher and the call generator only depend on the [`Schema`] trait:
//! given a value, return the parsed (possibly coerced) value or a structured
//! [`ValidationReport`]. Two implementations ship with the crate:
//! [`JsonSchema`] backed by the `jsonschema` crate, and [`FnSchema`] for
//! hand-written checks.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Shared handle to a schema, as stored on declarations.
pub type SchemaRef = Arc<dyn Schema>;

/// Validates (and optionally coerces) a value.
#[async_trait]
pub trait Schema: Send + Sync {
    /// Parse `value`, returning the accepted value or a report of every violation.
    async fn parse(&self, value: Value) -> Result<Value, ValidationReport>;
}

#[async_trait]
impl<S: Schema + ?Sized> Schema for Arc<S> {
    async fn parse(&self, value: Value) -> Result<Value, ValidationReport> {
        (**self).parse(value).await
    }
}

// ---------------------------------------------------------------------------
// ValidationReport
// ---------------------------------------------------------------------------

/// Structured validation failure.
///
/// `errors` holds violations of the value as a whole; `fields` maps a dotted
/// field path (`name.family`, `items.0`) to the violations of that field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, Vec<String>>,
}

impl ValidationReport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Report with a single value-level violation.
    #[must_use]
    pub fn form(message: impl Into<String>) -> Self {
        let mut report = Self::new();
        report.push_form(message);
        report
    }

    /// Report with a single field-level violation.
    #[must_use]
    pub fn field(path: impl Into<String>, message: impl Into<String>) -> Self {
        let mut report = Self::new();
        report.push_field(path, message);
        report
    }

    pub fn push_form(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// Records a field violation. An empty path is recorded as a value-level violation.
    pub fn push_field(&mut self, path: impl Into<String>, message: impl Into<String>) {
        let path = path.into();
        if path.is_empty() {
            self.push_form(message);
        } else {
            self.fields.entry(path).or_default().push(message.into());
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.fields.is_empty()
    }

    /// Report as a JSON value, suitable as error data.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Converts a JSON pointer (`/name/family`) into a dotted path (`name.family`).
fn pointer_to_path(pointer: &str) -> String {
    pointer
        .split('/')
        .skip(1)
        .map(|token| token.replace("~1", "/").replace("~0", "~"))
        .collect::<Vec<_>>()
        .join(".")
}

// ---------------------------------------------------------------------------
// SchemaError
// ---------------------------------------------------------------------------

/// Raised when a schema definition itself is unusable.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("invalid schema: {reason}")]
    Invalid { reason: String },
}

// ---------------------------------------------------------------------------
// JsonSchema
// ---------------------------------------------------------------------------

/// JSON Schema (draft 2020-12) validator.
///
/// With [`JsonSchema::coercing`], string values are converted to the
/// `integer`, `number`, or `boolean` type their property declares before
/// validation. Path parameters and query strings only ever carry strings, so
/// their schemas are usually coercing.
pub struct JsonSchema {
    schema: Value,
    validator: jsonschema::Validator,
    coerce: bool,
}

impl JsonSchema {
    /// Compiles the schema.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Invalid`] when the document is not a valid schema.
    pub fn new(schema: Value) -> Result<Self, SchemaError> {
        let validator = jsonschema::options()
            .with_draft(jsonschema::Draft::Draft202012)
            .build(&schema)
            .map_err(|e| SchemaError::Invalid {
                reason: e.to_string(),
            })?;
        Ok(Self {
            schema,
            validator,
            coerce: false,
        })
    }

    /// Enables string-to-scalar coercion.
    #[must_use]
    pub fn coercing(mut self) -> Self {
        self.coerce = true;
        self
    }

    /// The raw schema document.
    #[must_use]
    pub fn document(&self) -> &Value {
        &self.schema
    }
}

#[async_trait]
impl Schema for JsonSchema {
    async fn parse(&self, value: Value) -> Result<Value, ValidationReport> {
        let value = if self.coerce {
            coerce(&self.schema, value)
        } else {
            value
        };

        let mut report = ValidationReport::new();
        for error in self.validator.iter_errors(&value) {
            report.push_field(pointer_to_path(&error.instance_path.to_string()), error.to_string());
        }

        if report.is_empty() {
            Ok(value)
        } else {
            Err(report)
        }
    }
}

fn coerce(schema: &Value, value: Value) -> Value {
    match value {
        Value::String(raw) => coerce_scalar(schema, raw),
        Value::Object(map) => {
            let properties = schema.get("properties").and_then(Value::as_object);
            let coerced: Map<String, Value> = map
                .into_iter()
                .map(|(key, value)| match properties.and_then(|p| p.get(&key)) {
                    Some(property) => {
                        let value = coerce(property, value);
                        (key, value)
                    }
                    None => (key, value),
                })
                .collect();
            Value::Object(coerced)
        }
        other => other,
    }
}

fn coerce_scalar(schema: &Value, raw: String) -> Value {
    match schema.get("type").and_then(Value::as_str) {
        Some("integer") => raw.parse::<i64>().map_or(Value::String(raw), Value::from),
        Some("number") => {
            if let Ok(int) = raw.parse::<i64>() {
                return Value::from(int);
            }
            raw.parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map_or(Value::String(raw), Value::Number)
        }
        Some("boolean") => match raw.as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(raw),
        },
        _ => Value::String(raw),
    }
}

// ---------------------------------------------------------------------------
// FnSchema
// ---------------------------------------------------------------------------

/// Schema backed by a synchronous closure.
pub struct FnSchema<F>(F);

/// Wraps a closure as a [`Schema`].
pub fn from_fn<F>(f: F) -> FnSchema<F>
where
    F: Fn(Value) -> Result<Value, ValidationReport> + Send + Sync,
{
    FnSchema(f)
}

#[async_trait]
impl<F> Schema for FnSchema<F>
where
    F: Fn(Value) -> Result<Value, ValidationReport> + Send + Sync,
{
    async fn parse(&self, value: Value) -> Result<Value, ValidationReport> {
        (self.0)(value)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn user_schema() -> JsonSchema {
        JsonSchema::new(json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "email": { "type": "string" }
            },
            "required": ["name", "email"]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn accepts_valid_value_unchanged() {
        let value = json!({ "name": "John", "email": "john@fixture.none" });
        let parsed = user_schema().parse(value.clone()).await.unwrap();
        assert_eq!(parsed, value);
    }

    #[tokio::test]
    async fn reports_field_level_type_errors() {
        let report = user_schema()
            .parse(json!({ "name": "John", "email": 42 }))
            .await
            .unwrap_err();
        assert!(report.fields.contains_key("email"));
        assert!(!report.fields.contains_key("name"));
    }

    #[tokio::test]
    async fn missing_required_field_is_a_value_level_error() {
        let report = user_schema().parse(json!({ "name": "John" })).await.unwrap_err();
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("email"));
    }

    #[tokio::test]
    async fn coercing_schema_converts_strings() {
        let schema = JsonSchema::new(json!({
            "type": "object",
            "properties": {
                "a": { "type": "number" },
                "b": { "type": "integer" },
                "flag": { "type": "boolean" },
                "label": { "type": "string" }
            }
        }))
        .unwrap()
        .coercing();

        let parsed = schema
            .parse(json!({ "a": "1.5", "b": "2", "flag": "true", "label": "7" }))
            .await
            .unwrap();
        assert_eq!(parsed, json!({ "a": 1.5, "b": 2, "flag": true, "label": "7" }));
    }

    #[tokio::test]
    async fn coercion_leaves_unparseable_strings_for_the_validator() {
        let schema = JsonSchema::new(json!({
            "type": "object",
            "properties": { "a": { "type": "number" } }
        }))
        .unwrap()
        .coercing();

        let report = schema.parse(json!({ "a": "one" })).await.unwrap_err();
        assert!(report.fields.contains_key("a"));
    }

    #[tokio::test]
    async fn fn_schema_delegates_to_closure() {
        let schema = from_fn(|value| {
            if value.is_array() {
                Ok(value)
            } else {
                Err(ValidationReport::form("expected an array"))
            }
        });
        assert!(schema.parse(json!([1])).await.is_ok());
        assert_eq!(
            schema.parse(json!({})).await.unwrap_err(),
            ValidationReport::form("expected an array")
        );
    }

    #[test]
    fn invalid_schema_document_is_rejected() {
        assert!(JsonSchema::new(json!({ "type": 12 })).is_err());
    }

    #[test]
    fn pointer_paths_become_dotted() {
        assert_eq!(pointer_to_path("/name/family"), "name.family");
        assert_eq!(pointer_to_path(""), "");
        assert_eq!(pointer_to_path("/a~1b"), "a/b");
    }

    #[test]
    fn report_serializes_without_empty_sections() {
        let report = ValidationReport::field("email", "must be a string");
        assert_eq!(
            report.to_value(),
            json!({ "fields": { "email": ["must be a string"] } })
        );
    }
}
