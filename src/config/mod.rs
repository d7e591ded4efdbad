//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GalfConfig (validated, immutable)
//!     → Client::from_config / apply_circuit_breakers
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → apply_updates re-registers breaker commands (last write wins)
//! ```
//!
//! # Design Decisions
//! - Client options are captured at construction; only breaker commands
//!   change on reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AuthConfig, BackoffConfig, CircuitBreakerEntry, ClientConfig, GalfConfig, LogFormat,
    ObservabilityConfig,
};
pub use validation::{validate_config, ValidationError};
pub use watcher::{apply_circuit_breakers, apply_updates, ConfigWatcher};
