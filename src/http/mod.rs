//! HTTP client subsystem.
//!
//! # Data Flow
//! ```text
//! Client::get/post/put/delete
//!     → client.rs (captured options, registry, token manager, transport)
//!     → pipeline.rs (token, headers, body, breaker, retries)
//!     → request.rs (caller headers, deadline, body encoding)
//!     → transport.rs (one exchange over reqwest)
//!     → response.rs (buffered status, headers, body)
//! ```

pub mod client;
pub mod pipeline;
pub mod request;
pub mod response;
pub mod transport;

pub use client::{Client, ClientBuilder, ClientOptions};
pub use request::{Body, RequestOptions, X_REQUEST_ID};
pub use response::{Response, ResponseBody};
pub use transport::{ReqwestTransport, Transport, TransportError, TransportRequest};
