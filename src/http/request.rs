//! Per-call request options and request bodies.
//!
//! # Responsibilities
//! - Carry caller headers, in insertion order, and an optional deadline
//! - Normalize a request body into bytes for the configured content type
//!
//! # Design Decisions
//! - Header names compare case-insensitively; adding a name twice keeps the
//!   last value at the position of the first
//! - Structured bodies are only encoded for JSON content types
//! - A relative timeout starts counting when the call starts, so one
//!   `RequestOptions` can be reused across calls

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::error::{Error, Result};

/// Header name carrying the per-call request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Options of a single call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    headers: Vec<(String, String)>,
    deadline: Option<Instant>,
    timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set header `name`, replacing any previous value for it.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let name = name.into();
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(slot) => slot.1 = value,
            None => self.headers.push((name, value)),
        }
        self
    }

    /// Set every header in `headers`, in iteration order.
    pub fn add_headers<I, K, V>(&mut self, headers: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (name, value) in headers {
            self.add_header(name, value);
        }
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_header(name, value);
        self
    }

    /// Bound the whole call, retries and token acquisition included.
    ///
    /// The instant is absolute: a call started after it fails at once.
    pub fn with_deadline(mut self, deadline: impl Into<Instant>) -> Self {
        self.deadline = Some(deadline.into());
        self
    }

    /// Bound each call made with these options to `timeout`, measured from
    /// the start of that call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// The earlier of the absolute deadline and `started + timeout`.
    pub fn deadline_from(&self, started: Instant) -> Option<Instant> {
        let relative = self.timeout.and_then(|t| started.checked_add(t));
        match (self.deadline, relative) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

/// Request body.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Body {
    #[default]
    Empty,
    Bytes(Vec<u8>),
    Text(String),
    /// A value serialized according to the content type.
    Structured(serde_json::Value),
}

impl Body {
    /// Capture `value` as a structured body.
    pub fn structured<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        serde_json::to_value(value)
            .map(Body::Structured)
            .map_err(|e| Error::UnsupportedBody(e.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Body::Empty => true,
            Body::Bytes(bytes) => bytes.is_empty(),
            Body::Text(text) => text.is_empty(),
            Body::Structured(_) => false,
        }
    }

    /// Bytes to send for `content_type`, `None` for an empty body.
    pub(crate) fn encode(self, content_type: &str) -> Result<Option<Vec<u8>>> {
        match self {
            Body::Empty => Ok(None),
            Body::Bytes(bytes) => Ok(Some(bytes)),
            Body::Text(text) => Ok(Some(text.into_bytes())),
            Body::Structured(value) if is_json_content_type(content_type) => serde_json::to_vec(&value)
                .map(Some)
                .map_err(|e| Error::UnsupportedBody(e.to_string())),
            Body::Structured(_) => Err(Error::UnsupportedBody(format!(
                "structured body cannot be encoded as '{content_type}'"
            ))),
        }
    }
}

/// `application/json` or any `+json` media type, parameters ignored.
pub(crate) fn is_json_content_type(content_type: &str) -> bool {
    let media_type = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    media_type == "application/json" || media_type.ends_with("+json")
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(bytes)
    }
}

impl From<&[u8]> for Body {
    fn from(bytes: &[u8]) -> Self {
        Body::Bytes(bytes.to_vec())
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

impl From<serde_json::Value> for Body {
    fn from(value: serde_json::Value) -> Self {
        Body::Structured(value)
    }
}

impl From<()> for Body {
    fn from(_: ()) -> Self {
        Body::Empty
    }
}
