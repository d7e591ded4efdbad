//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters, gauges, histograms via `metrics`)
//!
//! Consumers:
//!     → whatever subscriber the application installs (or `logging::init`)
//!     → whatever metrics recorder the application installs
//! ```
//!
//! # Design Decisions
//! - The library never installs an exporter; without a recorder metrics are no-ops
//! - Request ID flows through every log line of a call
//! - `show_debug` only raises detail, it never changes behavior

pub mod logging;
pub mod metrics;
