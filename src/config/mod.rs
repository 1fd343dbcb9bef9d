//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! appsettings.toml + appsettings.{Environment}.toml
//!     → loader.rs (parse, deep merge, env var overrides)
//!     → validation.rs (semantic checks)
//!     → HostConfig (validated, immutable)
//!     → HostContext, shared with startup callbacks
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{ConfigError, EnvOverrides};
pub use schema::{HostConfig, HostSection, ObservabilityConfig};
