//! Transports: the terminal step of every chain.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart;
use reqwest::{Client, ClientBuilder};

use crate::error::{Error, Result};
use crate::request::{Body, FormData, FormValue, Request};
use crate::response::Response;

/// Performs the network exchange for a request.
///
/// Any `Fn(Request) -> impl Future<Output = Result<Response>>` closure is a
/// transport, which makes stubbing in tests a one-liner.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, request: Request) -> Result<Response>;
}

#[async_trait]
impl<F, Fut> Transport for F
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response>> + Send + 'static,
{
    async fn fetch(&self, request: Request) -> Result<Response> {
        (self)(request).await
    }
}

/// Connection settings for [`ReqwestTransport`].
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Request timeout.
    pub request_timeout: Duration,
    /// User agent string.
    pub user_agent: String,
    /// Maximum idle connections per host.
    pub pool_max_idle_per_host: usize,
    /// Enable gzip decompression.
    pub gzip: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            user_agent: format!("kite/{}", env!("CARGO_PKG_VERSION")),
            pool_max_idle_per_host: 10,
            gzip: true,
        }
    }
}

/// Build a configured reqwest client.
pub fn build_client(config: HttpConfig) -> Result<Client> {
    let mut builder = ClientBuilder::new()
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout)
        .user_agent(&config.user_agent)
        .pool_max_idle_per_host(config.pool_max_idle_per_host);

    if config.gzip {
        builder = builder.gzip(true);
    }

    builder.build().map_err(Error::ClientBuild)
}

/// Default transport backed by `reqwest`.
///
/// Response bodies are read to completion before returning, so the
/// [`Response`] handed up the chain can be copied freely.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    inner: Client,
}

impl ReqwestTransport {
    /// Create a transport with default config.
    pub fn new() -> Result<Self> {
        Self::with_config(HttpConfig::default())
    }

    /// Create a transport with custom config.
    pub fn with_config(config: HttpConfig) -> Result<Self> {
        Ok(Self {
            inner: build_client(config)?,
        })
    }

    /// Wrap an existing reqwest client.
    pub fn from_client(client: Client) -> Self {
        Self { inner: client }
    }

    /// Get the inner reqwest client.
    pub fn inner(&self) -> &Client {
        &self.inner
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn fetch(&self, request: Request) -> Result<Response> {
        let mut headers = request.headers().clone();
        let mut builder = self
            .inner
            .request(request.method().clone(), request.url().clone());

        match request.body() {
            None => {}
            Some(Body::Text(text)) => builder = builder.body(text.clone()),
            Some(Body::Bytes(bytes)) => builder = builder.body(bytes.clone()),
            Some(Body::Form(form)) => {
                // reqwest writes the boundary-carrying content type itself
                headers.remove(CONTENT_TYPE);
                builder = builder.multipart(to_multipart(form)?);
            }
        }

        let response = builder.headers(headers).send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().clone();
        let body = response.bytes().await?;

        Ok(Response::new(status, headers, url, body))
    }
}

fn to_multipart(form: &FormData) -> Result<multipart::Form> {
    let mut multipart = multipart::Form::new();
    for part in form.parts() {
        multipart = match &part.value {
            FormValue::Text(text) => multipart.text(part.name.clone(), text.clone()),
            FormValue::File {
                bytes,
                file_name,
                mime,
            } => {
                let mut file = multipart::Part::bytes(bytes.to_vec());
                if let Some(file_name) = file_name {
                    file = file.file_name(file_name.clone());
                }
                if let Some(mime) = mime {
                    file = file.mime_str(mime)?;
                }
                multipart.part(part.name.clone(), file)
            }
        };
    }
    Ok(multipart)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HttpConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.user_agent.starts_with("kite/"));
        assert_eq!(config.pool_max_idle_per_host, 10);
        assert!(config.gzip);
    }

    #[test]
    fn test_transport_creation() {
        assert!(ReqwestTransport::new().is_ok());
    }

    #[test]
    fn test_transport_with_custom_config() {
        let config = HttpConfig {
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(15),
            user_agent: "test-agent".to_string(),
            pool_max_idle_per_host: 5,
            gzip: false,
        };

        assert!(ReqwestTransport::with_config(config).is_ok());
    }

    #[test]
    fn test_multipart_conversion() {
        let form = FormData::new()
            .text("title", "report")
            .file("doc", vec![1u8, 2, 3], Some("r.bin".to_string()), Some("application/octet-stream".to_string()));
        let multipart = to_multipart(&form).unwrap();
        assert!(!multipart.boundary().is_empty());
    }

    #[test]
    fn test_multipart_rejects_bad_mime() {
        let form = FormData::new().file("doc", vec![0u8], None, Some("not a mime".to_string()));
        assert!(matches!(to_multipart(&form), Err(Error::Transport(_))));
    }
}
