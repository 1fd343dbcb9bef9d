//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     trigger() → flag set + broadcast → every subscriber wakes
//!
//! Signals (signals.rs):
//!     Ctrl-C / SIGINT → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - The host owns one `Shutdown`; clones share it and it is registered as a service
//! - A trigger that happens before anyone waits is not lost (sticky flag)

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_shutdown;
