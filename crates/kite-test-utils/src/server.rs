//! HTTP mock server built on wiremock.

use serde::Serialize;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Responder that mirrors the request body, its content type and its query
/// string back to the caller.
///
/// The query string is returned in the `x-echo-query` header.
pub struct EchoResponder;

impl Respond for EchoResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let content_type = request
            .headers
            .get("content-type")
            .and_then(|value| value.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        ResponseTemplate::new(200)
            .insert_header("x-echo-method", request.method.as_str())
            .insert_header("x-echo-query", request.url.query().unwrap_or_default())
            .set_body_raw(request.body.clone(), &content_type)
    }
}

/// HTTP mock server wrapper with convenience methods.
pub struct TestHttpServer {
    server: MockServer,
}

impl TestHttpServer {
    /// Start a new mock server.
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Get the server URL.
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Get URL for a specific path.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.server.uri(), path)
    }

    /// Access the underlying MockServer.
    pub fn inner(&self) -> &MockServer {
        &self.server
    }

    /// Register a GET endpoint that returns JSON.
    pub async fn get_json<T: Serialize>(&self, endpoint: &str, response: &T) {
        self.respond("GET", endpoint, ResponseTemplate::new(200).set_body_json(response))
            .await;
    }

    /// Register an endpoint answering `verb` requests with `template`.
    pub async fn respond(&self, verb: &str, endpoint: &str, template: ResponseTemplate) {
        Mock::given(method(verb))
            .and(path(endpoint))
            .respond_with(template)
            .mount(&self.server)
            .await;
    }

    /// Register an endpoint, for any method, that returns a JSON error body.
    pub async fn error(&self, endpoint: &str, status: u16, message: &str) {
        Mock::given(path(endpoint))
            .respond_with(
                ResponseTemplate::new(status).set_body_json(serde_json::json!({ "error": message })),
            )
            .mount(&self.server)
            .await;
    }

    /// Register an endpoint, for any method, that echoes the request back.
    pub async fn echo(&self, endpoint: &str) {
        Mock::given(path(endpoint))
            .respond_with(EchoResponder)
            .mount(&self.server)
            .await;
    }

    /// Verify that a request was received.
    pub async fn verify_received(&self, endpoint: &str, times: u64) {
        let received = self.received_requests().await;
        let count = received.iter().filter(|r| r.url.path() == endpoint).count() as u64;
        assert_eq!(
            count, times,
            "Expected {} requests to {}, got {}",
            times, endpoint, count
        );
    }

    /// Get all received requests.
    pub async fn received_requests(&self) -> Vec<Request> {
        self.server.received_requests().await.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kite::{Client, RequestOptions, ResponseType};
    use serde_json::json;

    #[tokio::test]
    async fn test_get_json_endpoint() {
        let server = TestHttpServer::start().await;
        server.get_json("/ping", &json!({ "pong": true })).await;

        let client = Client::new().unwrap();
        let output = client.get(server.url_for("/ping"), RequestOptions::new()).await.unwrap();
        assert_eq!(output.into_value().unwrap(), json!({ "pong": true }));
        server.verify_received("/ping", 1).await;
    }

    #[tokio::test]
    async fn test_echo_endpoint() {
        let server = TestHttpServer::start().await;
        server.echo("/echo").await;

        let client = Client::new().unwrap();
        let output = client
            .post(
                server.url_for("/echo"),
                "hello",
                RequestOptions::new().response_type(ResponseType::Response),
            )
            .await
            .unwrap();

        let response = output.response().unwrap();
        assert_eq!(response.headers().get("x-echo-method").unwrap(), "POST");
        assert_eq!(response.response().text(), "hello");
    }
}
