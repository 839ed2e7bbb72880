//! Request encoding: multipart form parts and query strings.
//!
//! A file is represented in JSON as `{"filename", "data", "contentType"?}`
//! with base64 `data`, the same shape the server decodes file parts into.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::{json, Map, Value};

use crate::error::ClientError;

/// Characters `encodeURIComponent` leaves alone.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// One multipart field.
#[derive(Debug, Clone, PartialEq)]
pub struct FormPart {
    pub name: String,
    pub value: PartValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PartValue {
    Text(String),
    File {
        filename: String,
        content_type: Option<String>,
        data: Bytes,
    },
}

impl FormPart {
    #[must_use]
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: PartValue::Text(value.into()),
        }
    }
}

/// JSON representation of a file, accepted by [`form_parts`].
#[must_use]
pub fn file(filename: &str, content_type: Option<&str>, data: &[u8]) -> Value {
    let mut file = json!({ "filename": filename, "data": STANDARD.encode(data) });
    if let Some(content_type) = content_type {
        file["contentType"] = Value::String(content_type.to_string());
    }
    file
}

/// Splits a body object into multipart fields.
///
/// Strings go as-is; other scalars, objects, and arrays are JSON-encoded.
/// Files become file parts, a non-empty array of files becomes one part per
/// file under the same name, and `null` fields are skipped.
///
/// # Errors
///
/// Returns [`ClientError::Encode`] when a file's `data` is not valid base64.
pub fn form_parts(body: &Map<String, Value>) -> Result<Vec<FormPart>, ClientError> {
    let mut parts = Vec::with_capacity(body.len());
    for (name, value) in body {
        match value {
            Value::Null => {}
            Value::String(text) => parts.push(FormPart::text(name, text.clone())),
            Value::Array(items) if !items.is_empty() && items.iter().all(is_file) => {
                for item in items {
                    parts.push(file_part(name, item)?);
                }
            }
            value if is_file(value) => parts.push(file_part(name, value)?),
            other => parts.push(FormPart::text(name, other.to_string())),
        }
    }
    Ok(parts)
}

fn is_file(value: &Value) -> bool {
    value.get("filename").is_some_and(Value::is_string) && value.get("data").is_some_and(Value::is_string)
}

fn file_part(name: &str, value: &Value) -> Result<FormPart, ClientError> {
    let filename = value.get("filename").and_then(Value::as_str).unwrap_or_default();
    let data = value.get("data").and_then(Value::as_str).unwrap_or_default();
    let data = STANDARD
        .decode(data)
        .map_err(|e| ClientError::Encode(format!("file '{filename}' in field '{name}': {e}")))?;
    Ok(FormPart {
        name: name.to_string(),
        value: PartValue::File {
            filename: filename.to_string(),
            content_type: value.get("contentType").and_then(Value::as_str).map(str::to_string),
            data: Bytes::from(data),
        },
    })
}

/// Serializes query fields as `?k=v&...`, or `""` when there are none.
///
/// `null` fields are skipped; strings go as-is and everything else is
/// JSON-encoded.
#[must_use]
pub fn query_string(query: &Map<String, Value>) -> String {
    let pieces: Vec<String> = query
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            format!(
                "{}={}",
                utf8_percent_encode(key, COMPONENT),
                utf8_percent_encode(&value, COMPONENT)
            )
        })
        .collect();

    if pieces.is_empty() {
        String::new()
    } else {
        format!("?{}", pieces.join("&"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!("fixture is an object"),
        }
    }

    #[test]
    fn scalars_and_structures_are_stringified() {
        let mut parts = form_parts(&body(json!({
            "name": "John",
            "age": 42,
            "tags": ["a", "b"],
            "skip": null
        })))
        .unwrap();
        parts.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(
            parts,
            vec![
                FormPart::text("age", "42"),
                FormPart::text("name", "John"),
                FormPart::text("tags", r#"["a","b"]"#),
            ]
        );
    }

    #[test]
    fn files_become_file_parts_and_file_arrays_repeat() {
        let mut parts = form_parts(&body(json!({
            "avatar": file("a.png", Some("image/png"), b"png"),
            "docs": [file("1.txt", None, b"one"), file("2.txt", None, b"two")]
        })))
        .unwrap();
        parts.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(parts.len(), 3);
        assert_eq!(
            parts[0].value,
            PartValue::File {
                filename: "a.png".to_string(),
                content_type: Some("image/png".to_string()),
                data: Bytes::from_static(b"png"),
            }
        );
        assert!(parts[1..].iter().all(|p| p.name == "docs"));
    }

    #[test]
    fn invalid_file_data_is_an_encode_error() {
        let err = form_parts(&body(json!({ "f": { "filename": "x", "data": "***" } }))).unwrap_err();
        assert!(matches!(err, ClientError::Encode(_)));
    }

    #[test]
    fn query_string_encodes_components() {
        let query = body(json!({ "q": "a b&c", "none": null }));
        assert_eq!(query_string(&query), "?q=a%20b%26c");
        let query = body(json!({ "limit": 5 }));
        assert_eq!(query_string(&query), "?limit=5");
        assert_eq!(query_string(&Map::new()), "");
    }
}
