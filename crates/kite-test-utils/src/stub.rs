//! In-process transports and interceptors.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use kite::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use kite::{Body, Interceptor, Next, Request, Response, StatusCode, Transport, Url};
use parking_lot::Mutex;

const STUB_URL: &str = "http://stub.test/";

/// Build a buffered response without a transport.
pub fn stub_response(status: u16, content_type: Option<&str>, body: impl Into<Bytes>) -> Response {
    let mut headers = HeaderMap::new();
    if let Some(content_type) = content_type {
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_str(content_type).expect("Invalid content type"),
        );
    }
    Response::new(
        StatusCode::from_u16(status).expect("Invalid status code"),
        headers,
        Url::parse(STUB_URL).expect("Invalid stub URL"),
        body,
    )
}

#[derive(Debug, Clone)]
enum Reply {
    Fixed {
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
    },
    Echo,
}

/// Transport that answers every request from a script and records what it
/// was sent.
///
/// Clones share the recorded requests, so keep a clone around after handing
/// one to a client.
#[derive(Debug, Clone)]
pub struct StubTransport {
    reply: Reply,
    requests: Arc<Mutex<Vec<Request>>>,
}

impl StubTransport {
    fn with_reply(reply: Reply) -> Self {
        Self {
            reply,
            requests: Arc::default(),
        }
    }

    /// Answer with `status` and an empty body.
    pub fn new(status: u16) -> Self {
        Self::with_reply(Reply::Fixed {
            status: StatusCode::from_u16(status).expect("Invalid status code"),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        })
    }

    /// Answer with `status` and a JSON body.
    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self::new(status)
            .with_header(CONTENT_TYPE, "application/json")
            .with_body(body.to_string())
    }

    /// Answer with `status`, `content_type` and `body`.
    pub fn text(status: u16, content_type: &str, body: impl Into<Bytes>) -> Self {
        Self::new(status).with_header(CONTENT_TYPE, content_type).with_body(body)
    }

    /// Answer 200 with the request's own body and content type.
    pub fn echo() -> Self {
        Self::with_reply(Reply::Echo)
    }

    /// Add a response header. No effect on an echo transport.
    pub fn with_header(mut self, name: HeaderName, value: &str) -> Self {
        if let Reply::Fixed { headers, .. } = &mut self.reply {
            headers.insert(name, HeaderValue::from_str(value).expect("Invalid header value"));
        }
        self
    }

    /// Replace the response body. No effect on an echo transport.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        if let Reply::Fixed { body: current, .. } = &mut self.reply {
            *current = body.into();
        }
        self
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }

    pub fn last_request(&self) -> Option<Request> {
        self.requests.lock().last().cloned()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn fetch(&self, request: Request) -> kite::Result<Response> {
        self.requests.lock().push(request.clone());

        let response = match &self.reply {
            Reply::Fixed { status, headers, body } => {
                Response::new(*status, headers.clone(), request.url().clone(), body.clone())
            }
            Reply::Echo => {
                let mut headers = HeaderMap::new();
                if let Some(content_type) = request.headers().get(CONTENT_TYPE) {
                    headers.insert(CONTENT_TYPE, content_type.clone());
                }
                let body = request
                    .body()
                    .and_then(Body::as_bytes)
                    .map(Bytes::copy_from_slice)
                    .unwrap_or_default();
                Response::new(StatusCode::OK, headers, request.url().clone(), body)
            }
        };
        Ok(response)
    }
}

/// Shared log of interceptor entry and exit events.
#[derive(Debug, Clone, Default)]
pub struct OrderLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl OrderLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }
}

/// Interceptor that logs `"{name}-before"` on the way in and
/// `"{name}-after"` on the way out.
pub fn recording_interceptor(name: &'static str, log: OrderLog) -> impl Interceptor {
    move |request: Request, next: Next| {
        let log = log.clone();
        async move {
            log.push(format!("{name}-before"));
            let response = next.run(request).await;
            log.push(format!("{name}-after"));
            response
        }
    }
}

/// Interceptor that sets a request header before forwarding.
pub fn header_interceptor(name: &'static str, value: &'static str) -> impl Interceptor {
    move |request: Request, next: Next| async move {
        let request = request.with_header(name, value)?;
        next.run(request).await
    }
}
