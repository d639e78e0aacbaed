//! JSON request body decoding and response encoding.

use axum::http::header;
use serde::Serialize;
use serde_json::Value;

use crate::dispatch::error::DispatchError;
use crate::dispatch::request::InboundRequest;
use crate::dispatch::JsonObject;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Decode the request body as a JSON object.
///
/// The content type must be empty or `application/json` (case-insensitive).
/// An empty body decodes to `None`.
pub fn decode_body(request: &InboundRequest) -> Result<Option<JsonObject>, DispatchError> {
    check_content_type(request)?;

    if request.body().iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    match serde_json::from_slice::<Value>(request.body()).map_err(DispatchError::MalformedBody)? {
        Value::Object(map) => Ok(Some(map)),
        _ => Err(DispatchError::BodyNotObject),
    }
}

/// Accept a missing, blank or JSON content type.
///
/// A value that is present but not visible ASCII counts as unsupported.
fn check_content_type(request: &InboundRequest) -> Result<(), DispatchError> {
    let Some(value) = request.headers().get(header::CONTENT_TYPE) else {
        return Ok(());
    };
    let Ok(content_type) = value.to_str() else {
        return Err(DispatchError::UnsupportedContentType(
            String::from_utf8_lossy(value.as_bytes()).into_owned(),
        ));
    };
    let content_type = content_type.trim();
    if content_type.is_empty() || content_type.eq_ignore_ascii_case(JSON_CONTENT_TYPE) {
        Ok(())
    } else {
        Err(DispatchError::UnsupportedContentType(
            content_type.to_string(),
        ))
    }
}

/// Encode handler output as indented JSON followed by a newline.
pub fn encode_output<T: Serialize>(output: &T) -> Result<Vec<u8>, DispatchError> {
    let value = serde_json::to_value(output).map_err(DispatchError::Encode)?;
    if !value.is_object() {
        return Err(DispatchError::OutputNotObject);
    }
    let mut encoded = serde_json::to_vec_pretty(&value).map_err(DispatchError::Encode)?;
    encoded.push(b'\n');
    Ok(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use axum::http::{HeaderValue, Request};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn request(content_type: Option<&str>, body: &str) -> InboundRequest {
        let mut builder = Request::builder().method("POST").uri("/");
        if let Some(ct) = content_type {
            builder = builder.header("Content-Type", ct);
        }
        let (parts, _) = builder.body(()).unwrap().into_parts();
        InboundRequest::from_parts(parts, Bytes::from(body.to_string()))
    }

    #[test]
    fn test_decode_object() {
        let req = request(Some("application/json"), r#"{"incoming-data": 123}"#);
        let decoded = decode_body(&req).unwrap().unwrap();
        assert_eq!(decoded["incoming-data"].as_f64(), Some(123.0));
    }

    #[test]
    fn test_content_type_is_case_insensitive() {
        let req = request(Some("Application/JSON"), r#"{"a": true}"#);
        assert!(decode_body(&req).unwrap().is_some());
    }

    #[test]
    fn test_empty_content_type_accepted() {
        let req = request(None, r#"{"a": 1}"#);
        assert!(decode_body(&req).unwrap().is_some());
    }

    #[test]
    fn test_other_content_type_rejected() {
        let req = request(Some("text/plain"), r#"{"a": 1}"#);
        assert!(matches!(
            decode_body(&req),
            Err(DispatchError::UnsupportedContentType(ref ct)) if ct == "text/plain"
        ));

        // Parameters are not part of the accepted value.
        let req = request(Some("application/json; charset=utf-8"), r#"{"a": 1}"#);
        assert!(decode_body(&req).is_err());
    }

    #[test]
    fn test_unreadable_content_type_rejected() {
        let (mut parts, _) = Request::builder()
            .method("POST")
            .uri("/")
            .body(())
            .unwrap()
            .into_parts();
        parts.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_bytes(b"text/xml\xff").unwrap(),
        );
        let req = InboundRequest::from_parts(parts, Bytes::from_static(br#"{"a": 1}"#));

        assert!(matches!(
            decode_body(&req),
            Err(DispatchError::UnsupportedContentType(ref ct)) if ct.starts_with("text/xml")
        ));
    }

    #[test]
    fn test_empty_body_is_absent() {
        assert!(decode_body(&request(None, "")).unwrap().is_none());
        assert!(decode_body(&request(None, " \n")).unwrap().is_none());
    }

    #[test]
    fn test_non_object_rejected() {
        let err = decode_body(&request(None, "[1, 2]")).unwrap_err();
        assert!(matches!(err, DispatchError::BodyNotObject));

        let err = decode_body(&request(None, "{not json")).unwrap_err();
        assert!(matches!(err, DispatchError::MalformedBody(_)));
    }

    #[test]
    fn test_decode_keeps_key_order() {
        let req = request(None, r#"{"z": 1, "a": 2, "m": 3}"#);
        let decoded = decode_body(&req).unwrap().unwrap();
        let keys: Vec<_> = decoded.keys().map(String::as_str).collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }

    #[test]
    fn test_encode_is_indented_with_newline() {
        let encoded = encode_output(&json!({"aa": 123})).unwrap();
        assert_eq!(String::from_utf8(encoded).unwrap(), "{\n  \"aa\": 123\n}\n");
    }

    #[test]
    fn test_encode_rejects_non_object() {
        assert!(matches!(
            encode_output(&vec![1, 2, 3]),
            Err(DispatchError::OutputNotObject)
        ));
    }

    #[test]
    fn test_encode_failure() {
        // Non-string map keys cannot become JSON object keys.
        let mut map = BTreeMap::new();
        map.insert(vec![1u8], "x");
        assert!(matches!(encode_output(&map), Err(DispatchError::Encode(_))));
    }
}
