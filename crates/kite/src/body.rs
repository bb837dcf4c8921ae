//! Attaching caller-supplied bodies to a canonical request.

use reqwest::header::{HeaderValue, CONTENT_TYPE};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::request::{Body, Request, RequestBody};
use crate::serializer::{content_types, SerializerRegistry};

/// Attach `body` to `request`.
///
/// An empty body (see [`RequestBody::is_empty`]) leaves the request as it
/// is. Text, binary and multipart bodies go through untouched, as does a
/// JSON string. Other structured values are encoded with the serializer
/// registered for the request's content type (`application/json` when none
/// is set), and the `content-type` header is set to that type.
pub fn attach_body(
    mut request: Request,
    body: Option<RequestBody>,
    serializers: &SerializerRegistry,
) -> Result<Request> {
    let Some(body) = body.filter(|body| !body.is_empty()) else {
        return Ok(request);
    };

    let body = match body {
        RequestBody::Empty => return Ok(request),
        RequestBody::Form(form) => Body::Form(form),
        RequestBody::Bytes(bytes) => Body::Bytes(bytes),
        RequestBody::Text(text) | RequestBody::Structured(Value::String(text)) => Body::Text(text),
        RequestBody::Structured(value) => {
            let content_type = request
                .content_type()
                .filter(|ct| !ct.is_empty())
                .unwrap_or(content_types::JSON)
                .to_string();

            let encoded = serializers.encode(&content_type, &value)?;
            let header = HeaderValue::try_from(content_type.as_str())
                .map_err(|e| Error::InvalidHeader(format!("content-type: {e}")))?;
            request.headers_mut().insert(CONTENT_TYPE, header);
            Body::Text(encoded)
        }
    };

    *request.body_mut() = Some(body);
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::FormData;
    use bytes::Bytes;
    use reqwest::Method;
    use serde_json::{json, Value};
    use url::Url;

    fn request() -> Request {
        Request::new(Method::POST, Url::parse("https://api.example.com/items").unwrap())
    }

    #[test]
    fn test_no_body_is_noop() {
        let request = attach_body(request(), None, &SerializerRegistry::default()).unwrap();
        assert!(request.body().is_none());
        assert!(request.headers().get(CONTENT_TYPE).is_none());
    }

    #[test]
    fn test_null_and_empty_bodies_are_noop() {
        let existing = request().with_body("kept");
        for body in [
            RequestBody::from(Value::Null),
            RequestBody::Structured(Value::Null),
            RequestBody::from(""),
            RequestBody::from(None::<Value>),
        ] {
            let attached = attach_body(existing.clone(), Some(body), &SerializerRegistry::default()).unwrap();
            assert!(matches!(attached.body(), Some(Body::Text(text)) if text == "kept"));
            assert!(attached.headers().get(CONTENT_TYPE).is_none());
        }
    }

    #[test]
    fn test_json_string_skips_serializers() {
        let request = request().with_header("Content-Type", "text/csv").unwrap();
        let request = attach_body(request, Some(json!("a,b").into()), &SerializerRegistry::default()).unwrap();

        assert_eq!(request.headers()[CONTENT_TYPE], "text/csv");
        assert!(matches!(request.body(), Some(Body::Text(text)) if text == "a,b"));

        let request = attach_body(
            self::request(),
            Some(RequestBody::Structured(json!("raw"))),
            &SerializerRegistry::default(),
        )
        .unwrap();
        assert!(request.headers().get(CONTENT_TYPE).is_none());
        assert!(matches!(request.body(), Some(Body::Text(text)) if text == "raw"));
    }

    #[test]
    fn test_structured_defaults_to_json() {
        let request = attach_body(
            request(),
            Some(json!({ "name": "kite" }).into()),
            &SerializerRegistry::default(),
        )
        .unwrap();

        assert_eq!(request.headers()[CONTENT_TYPE], "application/json");
        assert!(matches!(request.body(), Some(Body::Text(text)) if text == r#"{"name":"kite"}"#));
    }

    #[test]
    fn test_structured_uses_explicit_content_type() {
        let request = request()
            .with_header("Content-Type", "application/x-www-form-urlencoded; charset=utf-8")
            .unwrap();
        let request = attach_body(
            request,
            Some(json!({ "a": "1", "b": "x y" }).into()),
            &SerializerRegistry::default(),
        )
        .unwrap();

        assert_eq!(request.headers()[CONTENT_TYPE], "application/x-www-form-urlencoded");
        assert!(matches!(request.body(), Some(Body::Text(text)) if text == "a=1&b=x+y"));
    }

    #[test]
    fn test_structured_missing_serializer() {
        let request = request().with_header("Content-Type", "text/csv").unwrap();
        let err = attach_body(request, Some(json!([1, 2]).into()), &SerializerRegistry::default())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::MissingSerializer { ref content_type } if content_type == "text/csv"
        ));
    }

    #[test]
    fn test_custom_serializer() {
        let mut serializers = SerializerRegistry::default();
        serializers.insert("text/csv", |body: &Value| {
            let row = body
                .as_array()
                .map(|items| items.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(","))
                .unwrap_or_default();
            Ok(row)
        });

        let request = request().with_header("content-type", "text/csv").unwrap();
        let request = attach_body(request, Some(json!([1, 2, 3]).into()), &serializers).unwrap();
        assert!(matches!(request.body(), Some(Body::Text(text)) if text == "1,2,3"));
    }

    #[test]
    fn test_form_data_leaves_content_type_alone() {
        let form = FormData::new().text("field", "value");
        let request = attach_body(request(), Some(form.into()), &SerializerRegistry::default()).unwrap();

        assert!(request.headers().get(CONTENT_TYPE).is_none());
        assert!(matches!(request.body(), Some(Body::Form(form)) if form.parts().len() == 1));
    }

    #[test]
    fn test_bytes_pass_through() {
        let request = request().with_header("Content-Type", "image/png").unwrap();
        let request = attach_body(
            request,
            Some(Bytes::from_static(b"\x89PNG").into()),
            &SerializerRegistry::default(),
        )
        .unwrap();

        assert_eq!(request.headers()[CONTENT_TYPE], "image/png");
        assert!(matches!(request.body(), Some(Body::Bytes(bytes)) if bytes.as_ref() == b"\x89PNG"));
    }

    #[test]
    fn test_text_pass_through() {
        let request = request().with_header("Content-Type", "text/csv").unwrap();
        let request = attach_body(request, Some("a,b".into()), &SerializerRegistry::default()).unwrap();

        assert_eq!(request.headers()[CONTENT_TYPE], "text/csv");
        assert!(matches!(request.body(), Some(Body::Text(text)) if text == "a,b"));
    }
}
