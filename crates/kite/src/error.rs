//! Error types for the request pipeline.

use crate::response::KiteResponse;

/// Boxed error produced by a transport.
pub type TransportError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced by [`Client::request`](crate::Client::request) and the
/// verb shorthands.
///
/// A non-2xx response is reported as [`Error::Http`], which carries the
/// classified response. Every other variant is a setup, parse or network
/// fault. Use [`Error::response`] to tell them apart.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A structured body was supplied for a content type with no registered
    /// serializer.
    #[error("no body serializer for content type \"{content_type}\"")]
    MissingSerializer { content_type: String },

    /// A body value could not be encoded, either into JSON or by a
    /// registered serializer.
    #[error("failed to encode request body: {0}")]
    Encode(String),

    /// The server answered with a non-2xx status.
    #[error("HTTP {}", .0.status())]
    Http(Box<KiteResponse>),

    /// A JSON response body could not be parsed. Encode-side JSON failures
    /// are reported as [`Error::Encode`].
    #[error("failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// The default reqwest client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    /// The transport failed before producing a response.
    #[error("transport failed: {0}")]
    Transport(#[source] TransportError),

    /// The request URL could not be parsed or resolved.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// A header name or value was rejected.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// An [`Output`](crate::Output) accessor was called on the wrong variant.
    #[error("expected {expected} output, got {actual}")]
    UnexpectedOutput {
        expected: &'static str,
        actual: &'static str,
    },
}

impl Error {
    /// Wrap an arbitrary transport failure.
    pub fn transport(err: impl Into<TransportError>) -> Self {
        Self::Transport(err.into())
    }

    /// The classified response, if this error is an HTTP status failure.
    pub fn response(&self) -> Option<&KiteResponse> {
        match self {
            Self::Http(response) => Some(response),
            _ => None,
        }
    }

    /// Consume the error, returning the classified response for HTTP failures.
    pub fn into_response(self) -> Option<KiteResponse> {
        match self {
            Self::Http(response) => Some(*response),
            _ => None,
        }
    }

    /// Returns `true` if the server answered with a non-2xx status.
    pub fn is_http(&self) -> bool {
        matches!(self, Self::Http(_))
    }

    /// HTTP status of the failed response, if any.
    pub fn status(&self) -> Option<reqwest::StatusCode> {
        self.response().map(KiteResponse::status)
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(Box::new(e))
    }
}

/// Result type alias using kite's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_serializer_display() {
        let err = Error::MissingSerializer {
            content_type: "text/csv".to_string(),
        };
        assert_eq!(err.to_string(), "no body serializer for content type \"text/csv\"");
        assert!(!err.is_http());
        assert!(err.response().is_none());
    }

    #[test]
    fn test_transport_helper() {
        let err = Error::transport("connection reset");
        assert!(matches!(err, Error::Transport(_)));
        assert!(err.to_string().contains("connection reset"));
        assert!(err.status().is_none());
    }

    #[test]
    fn test_unexpected_output_display() {
        let err = Error::UnexpectedOutput {
            expected: "text",
            actual: "binary",
        };
        assert_eq!(err.to_string(), "expected text output, got binary");
    }
}
