//! Startup filters.
//!
//! # Ordering
//! ```text
//! registered: [F1, F2]      core: C
//!
//! F1 pre
//!   F2 pre
//!     C
//!   F2 post
//! F1 post
//! ```
//!
//! A chain is folded right: the last registered filter wraps the core first and
//! the first registered filter ends up outermost.

use std::fmt;
use std::sync::Arc;

use crate::hosting::ApplicationBuilder;
use crate::services::{ResolveError, ServiceCollection, ServiceProvider};
use crate::startup::error::StartupError;

/// A `ConfigureServices` stage.
pub type ServicesAction = Box<dyn Fn(&mut ServiceCollection) -> Result<(), StartupError> + Send + Sync>;

/// A `ConfigureContainer` stage for container builder `B`.
pub type ContainerAction<B> = Box<dyn Fn(&mut B) -> Result<(), StartupError> + Send + Sync>;

/// A `Configure` stage.
pub type ConfigureAction = Box<dyn Fn(&mut ApplicationBuilder) -> Result<(), StartupError> + Send + Sync>;

/// Wraps the services configuration stage.
pub trait ServicesFilter: Send + Sync {
    fn configure_services(&self, next: ServicesAction) -> ServicesAction;
}

/// Wraps the container configuration stage for builders of type `B`.
pub trait ContainerFilter<B>: Send + Sync {
    fn configure_container(&self, next: ContainerAction<B>) -> ContainerAction<B>;
}

/// Wraps the application configuration stage.
pub trait StartupFilter: Send + Sync {
    fn configure(&self, next: ConfigureAction) -> ConfigureAction;
}

impl<F> ServicesFilter for F
where
    F: Fn(ServicesAction) -> ServicesAction + Send + Sync,
{
    fn configure_services(&self, next: ServicesAction) -> ServicesAction {
        self(next)
    }
}

impl<B, F> ContainerFilter<B> for F
where
    F: Fn(ContainerAction<B>) -> ContainerAction<B> + Send + Sync,
{
    fn configure_container(&self, next: ContainerAction<B>) -> ContainerAction<B> {
        self(next)
    }
}

impl<F> StartupFilter for F
where
    F: Fn(ConfigureAction) -> ConfigureAction + Send + Sync,
{
    fn configure(&self, next: ConfigureAction) -> ConfigureAction {
        self(next)
    }
}

/// Ordered filters of one kind, in registration order.
pub struct FilterChain<F: ?Sized> {
    filters: Vec<Arc<F>>,
}

impl<F: ?Sized + Send + Sync + 'static> FilterChain<F> {
    pub fn new(filters: Vec<Arc<F>>) -> Self {
        Self { filters }
    }

    /// Read every `Arc<F>` registration from `provider`.
    pub fn resolve(provider: &ServiceProvider) -> Result<Self, ResolveError> {
        let registered = provider.get_all::<Arc<F>>()?;
        Ok(Self::new(registered.iter().map(|f| Arc::clone(&**f)).collect()))
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<F>> {
        self.filters.iter()
    }

    /// Fold right: each filter wraps the accumulator, starting from the last one.
    pub fn fold<A>(&self, core: A, mut wrap: impl FnMut(&F, A) -> A) -> A {
        self.filters.iter().rev().fold(core, |inner, filter| wrap(&**filter, inner))
    }
}

impl<F: ?Sized> Clone for FilterChain<F> {
    fn clone(&self) -> Self {
        Self {
            filters: self.filters.clone(),
        }
    }
}

impl<F: ?Sized> Default for FilterChain<F> {
    fn default() -> Self {
        Self { filters: Vec::new() }
    }
}

impl<F: ?Sized> fmt::Debug for FilterChain<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterChain").field("len", &self.filters.len()).finish()
    }
}

impl ServiceCollection {
    pub fn add_services_filter<F: ServicesFilter + 'static>(&mut self, filter: F) -> &mut Self {
        self.add_singleton::<Arc<dyn ServicesFilter>>(Arc::new(filter))
    }

    pub fn add_container_filter<B, F>(&mut self, filter: F) -> &mut Self
    where
        B: 'static,
        F: ContainerFilter<B> + 'static,
    {
        self.add_singleton::<Arc<dyn ContainerFilter<B>>>(Arc::new(filter))
    }

    pub fn add_startup_filter<F: StartupFilter + 'static>(&mut self, filter: F) -> &mut Self {
        self.add_singleton::<Arc<dyn StartupFilter>>(Arc::new(filter))
    }
}
