//! Client configuration and the request pipeline.

use std::fmt;
use std::sync::Arc;

use reqwest::Method;
use serde_json::Value;
use tracing::{field, instrument, Span};
use url::Url;

use crate::body::attach_body;
use crate::error::Result;
use crate::interceptor::{Interceptor, InterceptorChain};
use crate::request::{build_request, RequestBody, RequestInput, RequestOptions};
use crate::response::{unwrap_response, Output};
use crate::serializer::{encode_params, ParamsSerializer, SerializerRegistry};
use crate::transport::{HttpConfig, ReqwestTransport, Transport};

/// Environment variable read by [`ClientBuilder::from_env`].
pub const BASE_URL_ENV: &str = "KITE_BASE_URL";

/// Immutable configuration shared by every call made through a [`Client`].
pub struct ClientConfig {
    transport: Arc<dyn Transport>,
    base_url: Option<Url>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    serializers: SerializerRegistry,
    params_serializer: ParamsSerializer,
}

impl ClientConfig {
    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    pub fn interceptors(&self) -> &[Arc<dyn Interceptor>] {
        &self.interceptors
    }

    pub fn serializers(&self) -> &SerializerRegistry {
        &self.serializers
    }

    pub fn params_serializer(&self) -> &ParamsSerializer {
        &self.params_serializer
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url.as_ref().map(Url::as_str))
            .field("interceptors", &self.interceptors.len())
            .field("serializers", &self.serializers)
            .finish_non_exhaustive()
    }
}

/// Builder for a [`Client`].
///
/// Everything is optional. Without a transport the client uses
/// [`ReqwestTransport`] configured from [`HttpConfig`], whose defaults
/// include a 10s connect timeout and a 30s request timeout. Use
/// [`ClientBuilder::http_config`] to change them. A custom transport owns
/// its own timeouts.
pub struct ClientBuilder {
    transport: Option<Arc<dyn Transport>>,
    http_config: HttpConfig,
    base_url: Option<Url>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    serializers: SerializerRegistry,
    params_serializer: Option<ParamsSerializer>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            transport: None,
            http_config: HttpConfig::default(),
            base_url: None,
            interceptors: Vec::new(),
            serializers: SerializerRegistry::empty(),
            params_serializer: None,
        }
    }

    /// A builder whose base URL comes from `KITE_BASE_URL`, if set.
    ///
    /// ## Errors
    ///
    /// Returns an error if the variable is set but is not a valid URL.
    pub fn from_env() -> Result<Self> {
        let builder = Self::new();
        match std::env::var(BASE_URL_ENV) {
            Ok(base) if !base.trim().is_empty() => builder.parse_base_url(base.trim()),
            _ => Ok(builder),
        }
    }

    /// Base URL that path inputs are resolved against.
    pub fn base_url(mut self, url: Url) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Parse and set the base URL.
    pub fn parse_base_url(self, url: &str) -> Result<Self> {
        Ok(self.base_url(Url::parse(url)?))
    }

    /// Replace the default reqwest transport.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Settings for the default reqwest transport. Ignored when a custom
    /// transport is set.
    pub fn http_config(mut self, config: HttpConfig) -> Self {
        self.http_config = config;
        self
    }

    /// Append a global interceptor. Later interceptors wrap earlier ones.
    pub fn interceptor(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Register a body serializer, overriding the default for the same
    /// content type.
    pub fn body_serializer<F>(mut self, content_type: impl Into<String>, serializer: F) -> Self
    where
        F: Fn(&Value) -> Result<String> + Send + Sync + 'static,
    {
        self.serializers.insert(content_type, serializer);
        self
    }

    /// Replace the query-parameter encoder.
    pub fn params_serializer<F>(mut self, serializer: F) -> Self
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        self.params_serializer = Some(Arc::new(serializer));
        self
    }

    /// Build the client.
    ///
    /// ## Errors
    ///
    /// Returns an error if the default reqwest client cannot be constructed.
    pub fn build(self) -> Result<Client> {
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::with_config(self.http_config)?),
        };

        let mut serializers = SerializerRegistry::default();
        serializers.merge(self.serializers);

        let params_serializer: ParamsSerializer = match self.params_serializer {
            Some(serializer) => serializer,
            None => Arc::new(encode_params),
        };

        let config = ClientConfig {
            transport,
            base_url: self.base_url,
            interceptors: self.interceptors,
            serializers,
            params_serializer,
        };

        tracing::debug!(
            base_url = config.base_url.as_ref().map(Url::as_str).unwrap_or_default(),
            interceptors = config.interceptors.len(),
            "built kite client"
        );

        Ok(Client {
            config: Arc::new(config),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// HTTP client with content-type aware bodies and an interceptor chain.
///
/// Cloning is cheap; clones share one read-only [`ClientConfig`] and can be
/// used from any number of tasks at once.
///
/// ## Examples
///
/// ```rust,ignore
/// use kite::{Client, RequestOptions};
/// use serde_json::json;
///
/// let client = Client::builder()
///     .parse_base_url("https://api.example.com/v1/")?
///     .build()?;
///
/// let user: User = client
///     .get("users/1", RequestOptions::new().params(json!({ "expand": "roles" })))
///     .await?
///     .json()?;
/// ```
#[derive(Clone)]
pub struct Client {
    config: Arc<ClientConfig>,
}

impl Client {
    /// A client with the default reqwest transport and no base URL.
    ///
    /// Requests time out after 30s (see [`HttpConfig::default`]).
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send a request.
    ///
    /// Builds the canonical request from `input`, attaches the body, runs the
    /// global and per-call interceptors around the transport, and unwraps the
    /// response according to the options' [`ResponseType`](crate::ResponseType).
    ///
    /// ## Errors
    ///
    /// - [`Error::Http`](crate::Error::Http) for non-2xx responses
    /// - [`Error::MissingSerializer`](crate::Error::MissingSerializer) before
    ///   any I/O when a structured body has no serializer
    /// - [`Error::Decode`](crate::Error::Decode) for malformed JSON
    /// - [`Error::Transport`](crate::Error::Transport) for network failures
    #[instrument(
        name = "kite_request",
        skip_all,
        fields(
            http.method = field::Empty,
            http.url = field::Empty,
            http.status_code = field::Empty,
            otel.kind = "client",
        )
    )]
    pub async fn request(
        &self,
        input: impl Into<RequestInput>,
        mut options: RequestOptions,
    ) -> Result<Output> {
        let body = options.body.take();
        let request = build_request(
            input.into(),
            &options,
            self.config.base_url.as_ref(),
            &self.config.params_serializer,
        )?;
        let request = attach_body(request, body, &self.config.serializers)?;

        let span = Span::current();
        span.record("http.method", request.method().as_str());
        span.record("http.url", request.url().as_str());

        let chain = InterceptorChain::new(
            &self.config.interceptors,
            &options.interceptors,
            Arc::clone(&self.config.transport),
        );
        tracing::debug!(interceptors = chain.len(), "dispatching request");

        let response = chain.execute(request).await?;
        span.record("http.status_code", response.status().as_u16());
        tracing::debug!(status = response.status().as_u16(), "received response");

        unwrap_response(response, options.response_type)
    }

    /// `GET` shorthand.
    pub async fn get(&self, input: impl Into<RequestInput>, options: RequestOptions) -> Result<Output> {
        self.request(input, options.method(Method::GET)).await
    }

    /// `DELETE` shorthand.
    pub async fn delete(&self, input: impl Into<RequestInput>, options: RequestOptions) -> Result<Output> {
        self.request(input, options.method(Method::DELETE)).await
    }

    /// `PUT` shorthand. `body` replaces any body set on `options`; pass
    /// [`RequestBody::Empty`] or `None::<RequestBody>` to send none.
    pub async fn put(
        &self,
        input: impl Into<RequestInput>,
        body: impl Into<RequestBody>,
        options: RequestOptions,
    ) -> Result<Output> {
        self.request(input, options.method(Method::PUT).body(body)).await
    }

    /// `POST` shorthand. `body` replaces any body set on `options`; pass
    /// [`RequestBody::Empty`] or `None::<RequestBody>` to send none.
    pub async fn post(
        &self,
        input: impl Into<RequestInput>,
        body: impl Into<RequestBody>,
        options: RequestOptions,
    ) -> Result<Output> {
        self.request(input, options.method(Method::POST).body(body)).await
    }

    /// `PATCH` shorthand. `body` replaces any body set on `options`; pass
    /// [`RequestBody::Empty`] or `None::<RequestBody>` to send none.
    pub async fn patch(
        &self,
        input: impl Into<RequestInput>,
        body: impl Into<RequestBody>,
        options: RequestOptions,
    ) -> Result<Output> {
        self.request(input, options.method(Method::PATCH).body(body)).await
    }
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("base_url", &self.base_url.as_ref().map(Url::as_str))
            .field("interceptors", &self.interceptors.len())
            .field("serializers", &self.serializers)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client").field("config", &self.config).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::request::Request;
    use crate::response::Response;
    use reqwest::StatusCode;

    fn echo_transport(request: Request) -> std::future::Ready<Result<Response>> {
        let body = request
            .body()
            .and_then(|b| b.as_bytes())
            .map(|b| b.to_vec())
            .unwrap_or_default();
        std::future::ready(Ok(Response::new(
            StatusCode::OK,
            request.headers().clone(),
            request.url().clone(),
            body,
        )))
    }

    #[test]
    fn test_builder_defaults() {
        let client = Client::builder().transport(echo_transport).build().unwrap();
        let config = client.config();
        assert!(config.base_url().is_none());
        assert!(config.interceptors().is_empty());
        assert!(config.serializers().get("application/json").is_some());
        assert!(config.serializers().get("application/x-www-form-urlencoded").is_some());
    }

    #[test]
    fn test_default_transport_builds() {
        assert!(Client::new().is_ok());
    }

    #[test]
    fn test_parse_base_url_error() {
        let err = Client::builder().parse_base_url("not a url").unwrap_err();
        assert!(matches!(err, Error::Url(_)));
    }

    #[test]
    fn test_user_serializer_overrides_default() {
        let client = Client::builder()
            .transport(echo_transport)
            .body_serializer("application/json", |_: &Value| Ok("{}".to_string()))
            .build()
            .unwrap();
        let encoded = client
            .config()
            .serializers()
            .encode("application/json", &serde_json::json!({ "a": 1 }))
            .unwrap();
        assert_eq!(encoded, "{}");
    }

    #[tokio::test]
    async fn test_post_echoes_encoded_body() {
        let client = Client::builder()
            .parse_base_url("https://api.example.com/")
            .unwrap()
            .transport(echo_transport)
            .build()
            .unwrap();

        let output = client
            .post("items", serde_json::json!({ "name": "kite" }), RequestOptions::new())
            .await
            .unwrap();
        assert_eq!(output.into_value().unwrap(), serde_json::json!({ "name": "kite" }));
    }

    #[tokio::test]
    async fn test_missing_serializer_skips_transport() {
        let called = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = Arc::clone(&called);
        let client = Client::builder()
            .parse_base_url("https://api.example.com/")
            .unwrap()
            .transport(move |request: Request| {
                flag.store(true, std::sync::atomic::Ordering::SeqCst);
                echo_transport(request)
            })
            .build()
            .unwrap();

        let err = client
            .post(
                "items",
                serde_json::json!({ "a": 1 }),
                RequestOptions::new().header("content-type", "application/xml"),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::MissingSerializer { .. }));
        assert!(!called.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn test_debug_hides_closures() {
        let client = Client::builder()
            .transport(echo_transport)
            .interceptor(|request: Request, next: crate::Next| next.run(request))
            .build()
            .unwrap();
        let debug = format!("{client:?}");
        assert!(debug.contains("interceptors: 1"));
    }
}
