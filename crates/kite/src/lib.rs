//! Fetch-style HTTP client for Kite.
//!
//! A [`Client`] turns a path, URL or existing [`Request`] plus
//! [`RequestOptions`] into one canonical request, encodes structured bodies
//! through a content-type keyed [`SerializerRegistry`], runs it through the
//! [`Interceptor`] chain around a [`Transport`], and classifies the
//! response. Non-2xx responses come back as [`Error::Http`] carrying the
//! decoded [`KiteResponse`].

pub mod body;
pub mod client;
pub mod error;
pub mod interceptor;
pub mod request;
pub mod response;
pub mod serializer;
pub mod transport;

pub use body::attach_body;
pub use client::{Client, ClientBuilder, ClientConfig, BASE_URL_ENV};
pub use error::{Error, Result, TransportError};
pub use interceptor::{Interceptor, InterceptorChain, Next};
pub use request::{
    append_query, build_request, resolve_url, Body, FormData, FormPart, FormValue, Request, RequestBody,
    RequestInput, RequestOptions,
};
pub use response::{unwrap_response, KiteResponse, Output, Payload, Response, ResponseType};
pub use serializer::{content_types, BodySerializer, ParamsSerializer, SerializerRegistry};
pub use transport::{build_client, HttpConfig, ReqwestTransport, Transport};

pub use reqwest::header;
pub use reqwest::{Method, StatusCode};
pub use url::Url;
