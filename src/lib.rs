//! Convention-based startup host library.
//!
//! An application describes its startup behaviour as a plain type exposing
//! conventionally named methods (`ConfigureServices`, `ConfigureContainer`,
//! `Configure`, optionally suffixed with an environment name). The startup
//! subsystem resolves those methods, wraps them in filter pipelines and hands
//! the host a two-method facade.

pub mod config;
pub mod hosting;
pub mod lifecycle;
pub mod observability;
pub mod services;
pub mod startup;

/// Error type returned by user callbacks, filters and factories.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub use config::schema::HostConfig;
pub use hosting::{ApplicationBuilder, Host, HostBuilder, HostEnvironment};
pub use lifecycle::Shutdown;
pub use services::{ServiceCollection, ServiceProvider, TypeTag};
pub use startup::{ConventionStartup, MethodInfo, Startup, StartupError, StartupType};
