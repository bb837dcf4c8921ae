//! Responses, content-type classification and terminal unwrapping.

use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::error::{Error, Result};
use crate::request::media_type;
use crate::serializer::content_types;

/// A response as returned by a transport.
///
/// The body is fully buffered, so cloning yields an independent readable
/// copy that shares the underlying bytes.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    url: Url,
    body: Bytes,
}

impl Response {
    pub fn new(status: StatusCode, headers: HeaderMap, url: Url, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            url,
            body: body.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// `true` for 2xx statuses.
    pub fn ok(&self) -> bool {
        self.status.is_success()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Raw body bytes.
    pub fn bytes(&self) -> Bytes {
        self.body.clone()
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Body parsed as JSON into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Media type of the `content-type` header, without parameters.
    pub fn content_type(&self) -> Option<&str> {
        media_type(&self.headers)
    }
}

/// Payload decoded from a response according to its content type.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    Json(Value),
}

impl Payload {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text.as_str()),
            Self::Json(_) => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Text(_) => None,
        }
    }
}

/// A response together with its content-type decoded payload.
///
/// Returned for [`ResponseType::Response`] on success and carried by
/// [`Error::Http`] for non-2xx statuses.
#[derive(Debug, Clone)]
pub struct KiteResponse {
    response: Response,
    data: Option<Payload>,
}

impl KiteResponse {
    /// Classify `response` without consuming it.
    ///
    /// The wrapper holds its own copy of the response; the caller's value
    /// stays readable.
    pub fn from_response(response: &Response) -> Result<Self> {
        let copy = response.clone();
        let data = match copy.content_type() {
            Some(content_types::TEXT_PLAIN | content_types::TEXT_HTML | content_types::SVG) => {
                Some(Payload::Text(copy.text()))
            }
            Some(content_types::JSON) => {
                let text = copy.text();
                if text.is_empty() {
                    None
                } else {
                    Some(Payload::Json(serde_json::from_str(&text)?))
                }
            }
            _ => None,
        };

        tracing::trace!(
            status = copy.status().as_u16(),
            content_type = copy.content_type().unwrap_or_default(),
            decoded = data.is_some(),
            "classified response"
        );

        Ok(Self {
            response: copy,
            data,
        })
    }

    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    pub fn ok(&self) -> bool {
        self.response.ok()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.response.headers()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.response.content_type()
    }

    /// The decoded payload, if the content type was recognized and the body
    /// was not empty.
    pub fn data(&self) -> Option<&Payload> {
        self.data.as_ref()
    }

    /// The decoded JSON payload deserialized into `T`.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        match &self.data {
            Some(Payload::Json(value)) => Ok(Some(serde_json::from_value(value.clone())?)),
            _ => Ok(None),
        }
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn into_response(self) -> Response {
        self.response
    }
}

/// How the final result of a call is unwrapped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseType {
    /// Body parsed as JSON; an empty body yields `null`.
    #[default]
    Json,
    /// Body as text.
    Text,
    /// Raw body bytes.
    Binary,
    /// The classified [`KiteResponse`].
    Response,
}

/// Result of a call, shaped by its [`ResponseType`].
#[derive(Debug, Clone)]
pub enum Output {
    Json(Value),
    Text(String),
    Binary(Bytes),
    Response(KiteResponse),
}

impl Output {
    fn kind(&self) -> &'static str {
        match self {
            Self::Json(_) => "json",
            Self::Text(_) => "text",
            Self::Binary(_) => "binary",
            Self::Response(_) => "response",
        }
    }

    fn mismatch(&self, expected: &'static str) -> Error {
        Error::UnexpectedOutput {
            expected,
            actual: self.kind(),
        }
    }

    /// Deserialize a JSON output into `T`.
    pub fn json<T: DeserializeOwned>(self) -> Result<T> {
        match self {
            Self::Json(value) => Ok(serde_json::from_value(value)?),
            other => Err(other.mismatch("json")),
        }
    }

    /// The raw JSON value.
    pub fn into_value(self) -> Result<Value> {
        match self {
            Self::Json(value) => Ok(value),
            other => Err(other.mismatch("json")),
        }
    }

    pub fn text(self) -> Result<String> {
        match self {
            Self::Text(text) => Ok(text),
            other => Err(other.mismatch("text")),
        }
    }

    pub fn bytes(self) -> Result<Bytes> {
        match self {
            Self::Binary(bytes) => Ok(bytes),
            other => Err(other.mismatch("binary")),
        }
    }

    pub fn response(self) -> Result<KiteResponse> {
        match self {
            Self::Response(response) => Ok(response),
            other => Err(other.mismatch("response")),
        }
    }
}

/// Turn a transport response into the caller's result.
///
/// Non-2xx responses are classified and returned as [`Error::Http`].
pub fn unwrap_response(response: Response, response_type: ResponseType) -> Result<Output> {
    if !response.ok() {
        let classified = KiteResponse::from_response(&response)?;
        return Err(Error::Http(Box::new(classified)));
    }

    let output = match response_type {
        ResponseType::Text => Output::Text(response.text()),
        ResponseType::Binary => Output::Binary(response.bytes()),
        ResponseType::Response => Output::Response(KiteResponse::from_response(&response)?),
        ResponseType::Json => {
            let text = response.text();
            if text.is_empty() {
                Output::Json(Value::Null)
            } else {
                Output::Json(serde_json::from_str(&text)?)
            }
        }
    };
    Ok(output)
}
