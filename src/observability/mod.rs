//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Startup subsystem and host produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters via the `metrics` facade)
//!
//! Consumers:
//!     → stdout (human-readable or JSON)
//!     → whatever metrics recorder the application installs
//! ```
//!
//! # Design Decisions
//! - Structured fields, never interpolated strings, for machine parsing
//! - No recorder is installed here; without one, counters are no-ops
//! - Logging init tolerates an already-installed subscriber

pub mod logging;
pub mod metrics;
