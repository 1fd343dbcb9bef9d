//! Generic console host.
//!
//! # Data Flow
//! ```text
//! Host::create_default_builder()
//!     → config/ (appsettings.toml + appsettings.{Env}.toml + env vars)
//!     → observability/ (logging init)
//!     → HostBuilder
//!
//! HostBuilder::use_startup(StartupType)
//!     → snapshot hosting provider from the registry so far
//!     → ConventionStartup::load (resolve + pipelines)
//!     → register Arc<dyn Startup>, run configure_services
//!
//! HostBuilder::build() → Host
//! Host::run_console()
//!     → start(): best-effort startup lookup, then Configure
//!     → wait for Ctrl-C or Shutdown::trigger
//! ```
//!
//! # Design Decisions
//! - Only errors from the startup lookup itself are suppressed; Configure errors abort the start
//! - The provider returned by ConfigureServices replaces the one built from the registry

pub mod application;
pub mod environment;
pub mod host;

pub use application::ApplicationBuilder;
pub use environment::HostEnvironment;
pub use host::{Host, HostBuilder, HostContext, HostError};
