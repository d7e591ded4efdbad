//! Bearer-token authentication subsystem.
//!
//! # Data Flow
//! ```text
//! Request pipeline
//!     → manager.rs (cached token? return it, no network)
//!     → on miss/expiry: single refresh in flight
//!         → source.rs (token endpoint round trip)
//!     → token.rs (immutable token, replaced as a whole)
//! ```
//!
//! # Design Decisions
//! - Expiry uses the monotonic clock, refreshed ahead of actual expiry
//! - Concurrent callers share one refresh and its result, success or failure
//! - Failed refreshes are never cached
//! - Secrets never reach the logs

pub mod manager;
pub mod source;
pub mod token;

use thiserror::Error;

pub use manager::TokenManager;
pub use source::{OAuthTokenSource, TokenSource};
pub use token::Token;

/// Errors from token acquisition.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// The token endpoint could not be reached.
    #[error("token endpoint unreachable: {0}")]
    Unreachable(String),

    /// The token endpoint answered with a non-success status.
    #[error("token endpoint returned status {status}: {body}")]
    Endpoint { status: u16, body: String },

    /// The token endpoint answered with something that is not a token.
    #[error("malformed token response: {0}")]
    Malformed(String),

    /// The refresh task ended without producing a result.
    #[error("token refresh aborted: {0}")]
    Aborted(String),
}
