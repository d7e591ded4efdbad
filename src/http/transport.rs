//! Transport seam.
//!
//! # Responsibilities
//! - Perform one HTTP exchange and buffer the response
//! - Classify failures as network-level (retryable) or protocol-level
//!
//! # Design Decisions
//! - The pipeline only sees [`Transport`], so tests and callers can swap
//!   the network out
//! - Non-2xx statuses are responses, not errors; status policy belongs to
//!   the pipeline

use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use reqwest::header::HeaderMap;
use reqwest::Method;
use thiserror::Error;
use url::Url;

use crate::error::Error;
use crate::http::response::Response;

/// One fully prepared outgoing request.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    pub timeout: Duration,
}

/// Failure to complete an exchange.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Connection, DNS or I/O failure before a response arrived.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The exchange did not finish within the request timeout.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The peer answered with something that is not valid HTTP, or the body
    /// could not be read.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The request could not be constructed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    /// Whether the failure happened at the network level.
    pub fn is_network(&self) -> bool {
        matches!(self, TransportError::Connect(_) | TransportError::Timeout(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        let message = e.to_string();
        if e.is_timeout() {
            TransportError::Timeout(message)
        } else if e.is_connect() || e.is_request() {
            TransportError::Connect(message)
        } else if e.is_builder() {
            TransportError::InvalidRequest(message)
        } else {
            // body, decode and redirect failures
            TransportError::Protocol(message)
        }
    }
}

/// Something that can execute a [`TransportRequest`].
pub trait Transport: Send + Sync + 'static {
    fn send(&self, request: TransportRequest) -> BoxFuture<'_, Result<Response, TransportError>>;
}

/// [`Transport`] backed by a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Build(e.to_string()))?;
        Ok(Self { http })
    }

    /// Wrap an already configured `reqwest` client.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn exchange(&self, request: TransportRequest) -> Result<Response, TransportError> {
        let mut builder = self
            .http
            .request(request.method, request.url)
            .headers(request.headers)
            .timeout(request.timeout);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(Response::new(status, headers, body.to_vec()))
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: TransportRequest) -> BoxFuture<'_, Result<Response, TransportError>> {
        self.exchange(request).boxed()
    }
}
