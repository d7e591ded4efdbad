//! Structured logging.
//!
//! # Responsibilities
//! - Initialize a `tracing` subscriber for applications that want one
//! - Resolve the log level from config, overridable by `RUST_LOG`

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::schema::{LogFormat, ObservabilityConfig};

/// Install a global subscriber built from `config`.
///
/// Fails if another global subscriber is already set.
pub fn init(config: &ObservabilityConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("galf={}", config.log_level)));

    match config.log_format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
        LogFormat::Compact => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().compact())
            .try_init(),
    }
}

/// Headers whose values never reach the logs.
const SENSITIVE_HEADERS: [&str; 4] = ["authorization", "proxy-authorization", "cookie", "set-cookie"];

/// Mask the value of credential-bearing headers.
pub(crate) fn redact_header(name: &str, value: &str) -> String {
    if SENSITIVE_HEADERS.iter().any(|h| name.eq_ignore_ascii_case(h)) {
        "<redacted>".to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_credential_headers() {
        assert_eq!(redact_header("Authorization", "Bearer abc"), "<redacted>");
        assert_eq!(redact_header("Proxy-Authorization", "Basic xyz"), "<redacted>");
        assert_eq!(redact_header("cookie", "session=1"), "<redacted>");
        assert_eq!(redact_header("token", "1234567890"), "1234567890");
    }
}
