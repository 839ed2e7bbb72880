//! Request body and query string decoding.

use axum::body::Body;
use axum::extract::{FromRequest, Multipart};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, Request};
use relay_core::RelayError;
use serde_json::{json, Map, Value};
use tracing::debug;

/// Decodes a request body by its `content-type`.
///
/// No content type yields `{}`. JSON bodies are parsed as is; urlencoded and
/// multipart forms become a flat object where a repeated field turns into an
/// array and a file part into `{filename, contentType, size, data}` with
/// base64 `data`.
pub(crate) async fn decode(headers: &HeaderMap, body: Bytes) -> Result<Value, RelayError> {
    let Some(content_type) = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return Ok(Value::Object(Map::new()));
    };

    if content_type.contains("json") {
        return serde_json::from_slice(&body).map_err(|e| {
            debug!(error = %e, "malformed JSON body");
            RelayError::bad_request("Malformed JSON body").with_data(json!({ "reason": e.to_string() }))
        });
    }

    if content_type.contains("application/x-www-form-urlencoded") {
        let mut fields = Map::new();
        for (name, value) in url::form_urlencoded::parse(&body) {
            push_field(&mut fields, name.into_owned(), Value::String(value.into_owned()));
        }
        return Ok(Value::Object(fields));
    }

    if content_type.contains("multipart/form-data") {
        return decode_multipart(content_type, body).await;
    }

    Err(RelayError::unsupported_media_type(format!(
        "Content type '{content_type}' is not supported"
    )))
}

async fn decode_multipart(content_type: &str, body: Bytes) -> Result<Value, RelayError> {
    let malformed = |reason: String| {
        debug!(%reason, "malformed form data");
        RelayError::bad_request("Malformed FormData").with_data(json!({ "reason": reason }))
    };

    let request = Request::builder()
        .header(CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .map_err(|e| malformed(e.to_string()))?;
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| malformed(e.body_text()))?;

    let mut fields = Map::new();
    while let Some(field) = multipart.next_field().await.map_err(|e| malformed(e.body_text()))? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let file_name = field.file_name().map(str::to_string);
        let part_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(|e| malformed(e.body_text()))?;

        let value = match file_name {
            Some(filename) => json!({
                "filename": filename,
                "contentType": part_type.unwrap_or_else(|| "application/octet-stream".to_string()),
                "size": data.len(),
                "data": STANDARD.encode(&data),
            }),
            None => Value::String(String::from_utf8_lossy(&data).into_owned()),
        };
        push_field(&mut fields, name, value);
    }
    Ok(Value::Object(fields))
}

fn push_field(fields: &mut Map<String, Value>, name: String, value: Value) {
    match fields.get_mut(&name) {
        Some(Value::Array(values)) => values.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            fields.insert(name, value);
        }
    }
}

/// Parses a query string into an object. A repeated key keeps its last value.
pub(crate) fn query(raw: Option<&str>) -> Value {
    let fields: Map<String, Value> = url::form_urlencoded::parse(raw.unwrap_or_default().as_bytes())
        .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
        .collect();
    Value::Object(fields)
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;

    use super::*;

    fn headers(content_type: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        headers
    }

    #[tokio::test]
    async fn missing_content_type_is_empty_object() {
        let value = decode(&HeaderMap::new(), Bytes::from_static(b"ignored")).await.unwrap();
        assert_eq!(value, json!({}));
    }

    #[tokio::test]
    async fn json_body_is_parsed() {
        let value = decode(
            &headers("application/json; charset=utf-8"),
            Bytes::from_static(br#"{"name":"John"}"#),
        )
        .await
        .unwrap();
        assert_eq!(value, json!({ "name": "John" }));
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let err = decode(&headers("application/json"), Bytes::from_static(b"{nope"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), 400);
        assert_eq!(err.message(), "Malformed JSON body");
    }

    #[tokio::test]
    async fn urlencoded_repeats_become_arrays() {
        let value = decode(
            &headers("application/x-www-form-urlencoded"),
            Bytes::from_static(b"name=John+Doe&tag=a&tag=b"),
        )
        .await
        .unwrap();
        assert_eq!(value, json!({ "name": "John Doe", "tag": ["a", "b"] }));
    }

    #[tokio::test]
    async fn multipart_collects_text_and_file_parts() {
        let body = concat!(
            "--XBOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"name\"\r\n\r\n",
            "John\r\n",
            "--XBOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"avatar\"; filename=\"a.txt\"\r\n",
            "Content-Type: text/plain\r\n\r\n",
            "hi\r\n",
            "--XBOUNDARY--\r\n",
        );
        let value = decode(
            &headers("multipart/form-data; boundary=XBOUNDARY"),
            Bytes::from_static(body.as_bytes()),
        )
        .await
        .unwrap();
        assert_eq!(
            value,
            json!({
                "name": "John",
                "avatar": { "filename": "a.txt", "contentType": "text/plain", "size": 2, "data": "aGk=" }
            })
        );
    }

    #[tokio::test]
    async fn multipart_without_boundary_is_malformed() {
        let err = decode(&headers("multipart/form-data"), Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Malformed FormData");
    }

    #[tokio::test]
    async fn unknown_content_type_is_unsupported() {
        let err = decode(&headers("text/csv"), Bytes::from_static(b"a,b")).await.unwrap_err();
        assert_eq!(err.status(), 415);
    }

    #[test]
    fn query_keeps_last_value() {
        assert_eq!(query(Some("a=1&b=x%20y&a=2")), json!({ "a": "2", "b": "x y" }));
        assert_eq!(query(None), json!({}));
    }
}
