//! Canonical request types and the request builder.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde_json::Value;
use url::Url;

use crate::error::{Error, Result};
use crate::interceptor::Interceptor;
use crate::response::ResponseType;
use crate::serializer::ParamsSerializer;

/// A fully resolved outbound request.
///
/// Built fresh for every call. Cloning is cheap (bodies are reference
/// counted), which lets an interceptor resubmit a request.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Body>,
}

impl Request {
    /// A request for `url` with no headers and no body.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn method_mut(&mut self) -> &mut Method {
        &mut self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn url_mut(&mut self) -> &mut Url {
        &mut self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    pub fn body_mut(&mut self) -> &mut Option<Body> {
        &mut self.body
    }

    /// Builder-style body replacement.
    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Builder-style header insertion.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let (name, value) = parse_header(name.as_ref(), value.as_ref())?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Media type of the `content-type` header, without parameters.
    pub fn content_type(&self) -> Option<&str> {
        media_type(&self.headers)
    }

    /// Derive a new request from this one: `headers` replace same-named
    /// headers, `method` replaces the method when supplied.
    pub(crate) fn derive(mut self, method: Option<&Method>, headers: &HeaderMap) -> Self {
        if let Some(method) = method {
            self.method = method.clone();
        }
        merge_headers(&mut self.headers, headers);
        self
    }
}

/// Request payload as handed to the transport.
#[derive(Debug, Clone)]
pub enum Body {
    /// Textual payload, sent as UTF-8.
    Text(String),
    /// Opaque binary payload.
    Bytes(Bytes),
    /// Multipart form; the transport owns the boundary and its content type.
    Form(FormData),
}

impl Body {
    /// Payload bytes for text and binary bodies. Multipart forms are encoded
    /// by the transport and have no flat representation here.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Text(text) => Some(text.as_bytes()),
            Self::Bytes(bytes) => Some(bytes),
            Self::Form(_) => None,
        }
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(bytes))
    }
}

impl From<FormData> for Body {
    fn from(form: FormData) -> Self {
        Self::Form(form)
    }
}

/// Multipart form payload.
#[derive(Debug, Clone, Default)]
pub struct FormData {
    parts: Vec<FormPart>,
}

/// One named entry of a [`FormData`].
#[derive(Debug, Clone)]
pub struct FormPart {
    pub name: String,
    pub value: FormValue,
}

/// Value of a form entry.
#[derive(Debug, Clone)]
pub enum FormValue {
    Text(String),
    File {
        bytes: Bytes,
        file_name: Option<String>,
        mime: Option<String>,
    },
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a text field.
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(FormPart {
            name: name.into(),
            value: FormValue::Text(value.into()),
        });
        self
    }

    /// Append a file field.
    pub fn file(
        mut self,
        name: impl Into<String>,
        bytes: impl Into<Bytes>,
        file_name: Option<String>,
        mime: Option<String>,
    ) -> Self {
        self.parts.push(FormPart {
            name: name.into(),
            value: FormValue::File {
                bytes: bytes.into(),
                file_name,
                mime,
            },
        });
        self
    }

    pub fn parts(&self) -> &[FormPart] {
        &self.parts
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

/// A body value supplied by the caller, before encoding.
///
/// [`RequestBody::Empty`], an empty string and a JSON `null` all mean "no
/// body": attaching one leaves the request untouched.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    /// No body.
    #[default]
    Empty,
    /// Sent verbatim with whatever content type is already set.
    Text(String),
    /// Sent verbatim; content type untouched.
    Bytes(Bytes),
    /// Sent verbatim; content type left to the transport.
    Form(FormData),
    /// Encoded through the serializer registry.
    Structured(Value),
}

impl RequestBody {
    /// Body from any serializable value, converted like a [`Value`].
    ///
    /// ## Errors
    ///
    /// Returns [`Error::Encode`] if `value` cannot be represented as JSON.
    pub fn json<T: serde::Serialize + ?Sized>(value: &T) -> Result<Self> {
        let value = serde_json::to_value(value).map_err(|e| Error::Encode(e.to_string()))?;
        Ok(value.into())
    }

    /// `true` when attaching this body is a no-op.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty | Self::Structured(Value::Null) => true,
            Self::Text(text) => text.is_empty(),
            _ => false,
        }
    }
}

impl From<Value> for RequestBody {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Empty,
            Value::String(text) => Self::Text(text),
            other => Self::Structured(other),
        }
    }
}

impl<T: Into<RequestBody>> From<Option<T>> for RequestBody {
    fn from(body: Option<T>) -> Self {
        body.map_or(Self::Empty, Into::into)
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for RequestBody {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(bytes))
    }
}

impl From<FormData> for RequestBody {
    fn from(form: FormData) -> Self {
        Self::Form(form)
    }
}

/// The three accepted input shapes for a request.
#[derive(Debug, Clone)]
pub enum RequestInput {
    /// Resolved against the client's base URL.
    Path(String),
    /// Used as-is.
    Url(Url),
    /// An existing request; options override its fields.
    Request(Request),
}

impl From<&str> for RequestInput {
    fn from(path: &str) -> Self {
        Self::Path(path.to_string())
    }
}

impl From<String> for RequestInput {
    fn from(path: String) -> Self {
        Self::Path(path)
    }
}

impl From<&String> for RequestInput {
    fn from(path: &String) -> Self {
        Self::Path(path.clone())
    }
}

impl From<Url> for RequestInput {
    fn from(url: Url) -> Self {
        Self::Url(url)
    }
}

impl From<&Url> for RequestInput {
    fn from(url: &Url) -> Self {
        Self::Url(url.clone())
    }
}

impl From<Request> for RequestInput {
    fn from(request: Request) -> Self {
        Self::Request(request)
    }
}

/// Per-call options.
#[derive(Clone, Default)]
pub struct RequestOptions {
    pub(crate) method: Option<Method>,
    pub(crate) headers: HeaderMap,
    pub(crate) params: Option<Value>,
    pub(crate) body: Option<RequestBody>,
    pub(crate) interceptors: Vec<Arc<dyn Interceptor>>,
    pub(crate) response_type: ResponseType,
    pub(crate) header_error: Option<String>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Set a header, replacing earlier values for the same name.
    ///
    /// An invalid name or value is reported when the request is sent.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        match parse_header(name.as_ref(), value.as_ref()) {
            Ok((name, value)) => {
                self.headers.insert(name, value);
            }
            Err(err) => {
                self.header_error.get_or_insert(err.to_string());
            }
        }
        self
    }

    /// Merge a prepared header map; its entries replace same-named headers.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        merge_headers(&mut self.headers, &headers);
        self
    }

    /// Query parameters appended to the resolved URL.
    pub fn params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Add a per-call interceptor. Per-call interceptors run outside the
    /// client's global ones.
    pub fn interceptor(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    pub fn response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }
}

impl fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("method", &self.method)
            .field("headers", &self.headers)
            .field("params", &self.params)
            .field("body", &self.body)
            .field("interceptors", &self.interceptors.len())
            .field("response_type", &self.response_type)
            .finish()
    }
}

/// Build the canonical request for `input`.
///
/// Paths are joined onto `base_url`; URLs and existing requests are already
/// absolute. Query parameters are appended after resolution.
pub fn build_request(
    input: RequestInput,
    options: &RequestOptions,
    base_url: Option<&Url>,
    params_serializer: &ParamsSerializer,
) -> Result<Request> {
    if let Some(err) = &options.header_error {
        return Err(Error::InvalidHeader(err.clone()));
    }

    let mut request = match input {
        RequestInput::Path(path) => {
            let url = resolve_url(&path, base_url)?;
            fresh_request(url, options)
        }
        RequestInput::Url(url) => fresh_request(url, options),
        RequestInput::Request(existing) => existing.derive(options.method.as_ref(), &options.headers),
    };

    if let Some(params) = &options.params {
        append_query(request.url_mut(), &params_serializer(params));
    }

    Ok(request)
}

fn fresh_request(url: Url, options: &RequestOptions) -> Request {
    let mut request = Request::new(options.method.clone().unwrap_or(Method::GET), url);
    request.headers = options.headers.clone();
    request
}

/// Resolve `input` against `base`, or parse it as absolute without a base.
pub fn resolve_url(input: &str, base: Option<&Url>) -> Result<Url> {
    let url = match base {
        Some(base) => base.join(input)?,
        None => Url::parse(input)?,
    };
    Ok(url)
}

/// Append an encoded query to `url`, keeping any existing parameters.
pub fn append_query(url: &mut Url, encoded: &str) {
    if encoded.is_empty() {
        return;
    }
    let query = match url.query() {
        Some(existing) if !existing.is_empty() => format!("{existing}&{encoded}"),
        _ => encoded.to_string(),
    };
    url.set_query(Some(&query));
}

/// Replace every header in `target` that `overrides` names.
pub(crate) fn merge_headers(target: &mut HeaderMap, overrides: &HeaderMap) {
    for name in overrides.keys() {
        target.remove(name);
        for value in overrides.get_all(name) {
            target.append(name.clone(), value.clone());
        }
    }
}

pub(crate) fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let name = HeaderName::try_from(name)
        .map_err(|e| Error::InvalidHeader(format!("{name}: {e}")))?;
    let value = HeaderValue::try_from(value)
        .map_err(|e| Error::InvalidHeader(format!("{name}: {e}")))?;
    Ok((name, value))
}

/// Media type of a `content-type` header: text before `;`, trimmed.
pub(crate) fn media_type(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or_default().trim())
}
