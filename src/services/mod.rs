//! Service registry and provider subsystem.
//!
//! # Data Flow
//! ```text
//! ServiceCollection (mutable registry, append-only during bootstrap)
//!     → build_service_provider() (snapshot of descriptors)
//!     → ServiceProvider (root: singletons cached)
//!         → create_scope() → Scope (scoped instances cached, released on close)
//!
//! Alternate containers:
//!     ServiceProviderFactory<B>::create_builder(&ServiceCollection) → B
//!     → container configuration runs against B
//!     → ServiceProviderFactory<B>::create_service_provider(B) → ServiceProvider
//! ```
//!
//! # Design Decisions
//! - Services are keyed by `TypeId`; the last registration wins for single lookups
//! - `get_all` returns every registration in registration order
//! - Scoped services cannot be resolved from the root provider
//! - Trait objects are registered as `Arc<dyn Trait>` values

pub mod collection;
pub mod factory;
pub mod provider;

pub use collection::{Lifetime, ServiceCollection, ServiceDescriptor, ServiceInstance, TypeTag};
pub use factory::{DefaultServiceProviderFactory, ServiceProviderFactory};
pub use provider::{ResolveError, Scope, ServiceProvider};
