//! Service resolution and scopes.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;

use crate::services::collection::{Implementation, Lifetime, ServiceDescriptor, ServiceInstance, TypeTag};
use crate::BoxError;

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

/// Errors raised while resolving a service.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("No service for type '{type_name}' has been registered")]
    NotRegistered { type_name: &'static str },

    #[error("Cannot resolve scoped service '{type_name}' from the root provider")]
    ScopedFromRoot { type_name: &'static str },

    #[error("Factory for service '{type_name}' failed: {source}")]
    Factory {
        type_name: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("Service registered as '{type_name}' produced an instance of another type")]
    TypeMismatch { type_name: &'static str },

    #[error("Scope {scope_id} has already been closed")]
    ScopeClosed { scope_id: u64 },
}

struct ProviderRoot {
    descriptors: Vec<ServiceDescriptor>,
    /// TypeId -> descriptor slots, in registration order.
    index: HashMap<TypeId, Vec<usize>>,
    singletons: DashMap<usize, ServiceInstance>,
}

struct ScopeState {
    id: u64,
    instances: DashMap<usize, ServiceInstance>,
    closed: AtomicBool,
}

impl ScopeState {
    fn release(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let released = self.instances.len();
            self.instances.clear();
            tracing::trace!(scope_id = self.id, released, "Scope released");
        }
    }
}

/// Resolves services registered in a [`ServiceCollection`](super::ServiceCollection).
///
/// Cheap to clone; clones share singleton (and, inside a scope, scoped) caches.
#[derive(Clone)]
pub struct ServiceProvider {
    root: Arc<ProviderRoot>,
    scope: Option<Arc<ScopeState>>,
}

impl ServiceProvider {
    pub(crate) fn new(descriptors: Vec<ServiceDescriptor>) -> Self {
        let mut index: HashMap<TypeId, Vec<usize>> = HashMap::new();
        for (slot, descriptor) in descriptors.iter().enumerate() {
            index.entry(descriptor.service_type().id()).or_default().push(slot);
        }

        Self {
            root: Arc::new(ProviderRoot {
                descriptors,
                index,
                singletons: DashMap::new(),
            }),
            scope: None,
        }
    }

    /// Resolve the last registration for `T`, if any.
    pub fn get<T: Send + Sync + 'static>(&self) -> Result<Option<Arc<T>>, ResolveError> {
        let tag = TypeTag::of::<T>();
        match self.get_erased(tag)? {
            Some(instance) => downcast::<T>(instance, tag).map(Some),
            None => Ok(None),
        }
    }

    /// Resolve `T`, failing if it is not registered.
    pub fn get_required<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ResolveError> {
        self.get::<T>()?.ok_or(ResolveError::NotRegistered {
            type_name: std::any::type_name::<T>(),
        })
    }

    /// Resolve every registration for `T`, in registration order.
    pub fn get_all<T: Send + Sync + 'static>(&self) -> Result<Vec<Arc<T>>, ResolveError> {
        let tag = TypeTag::of::<T>();
        let slots = match self.root.index.get(&tag.id()) {
            Some(slots) => slots,
            None => return Ok(Vec::new()),
        };

        slots
            .iter()
            .map(|&slot| self.instantiate(slot).and_then(|i| downcast::<T>(i, tag)))
            .collect()
    }

    /// Resolve by runtime type tag (last registration wins).
    pub fn get_erased(&self, tag: TypeTag) -> Result<Option<ServiceInstance>, ResolveError> {
        match self.root.index.get(&tag.id()).and_then(|slots| slots.last()) {
            Some(&slot) => self.instantiate(slot).map(Some),
            None => Ok(None),
        }
    }

    /// Returns true if `tag` has at least one registration.
    pub fn is_registered(&self, tag: TypeTag) -> bool {
        self.root.index.contains_key(&tag.id())
    }

    /// Open a scope sharing this provider's singletons.
    pub fn create_scope(&self) -> Scope {
        let state = Arc::new(ScopeState {
            id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
            instances: DashMap::new(),
            closed: AtomicBool::new(false),
        });
        tracing::trace!(scope_id = state.id, "Scope created");

        Scope {
            provider: ServiceProvider {
                root: self.root.clone(),
                scope: Some(state),
            },
        }
    }

    /// Scope id when this provider belongs to a scope.
    pub fn scope_id(&self) -> Option<u64> {
        self.scope.as_ref().map(|s| s.id)
    }

    fn instantiate(&self, slot: usize) -> Result<ServiceInstance, ResolveError> {
        let descriptor = &self.root.descriptors[slot];
        let type_name = descriptor.service_type().name();

        match descriptor.lifetime() {
            Lifetime::Singleton => {
                if let Some(existing) = self.root.singletons.get(&slot) {
                    return Ok(existing.value().clone());
                }
                // Activate outside the map entry so factories may resolve other services.
                let created = self.activate(descriptor)?;
                Ok(self.root.singletons.entry(slot).or_insert(created).value().clone())
            }
            Lifetime::Scoped => {
                let scope = self
                    .scope
                    .as_ref()
                    .ok_or(ResolveError::ScopedFromRoot { type_name })?;
                if scope.closed.load(Ordering::SeqCst) {
                    return Err(ResolveError::ScopeClosed { scope_id: scope.id });
                }
                if let Some(existing) = scope.instances.get(&slot) {
                    return Ok(existing.value().clone());
                }
                let created = self.activate(descriptor)?;
                Ok(scope.instances.entry(slot).or_insert(created).value().clone())
            }
            Lifetime::Transient => self.activate(descriptor),
        }
    }

    fn activate(&self, descriptor: &ServiceDescriptor) -> Result<ServiceInstance, ResolveError> {
        match &descriptor.implementation {
            Implementation::Instance(instance) => Ok(instance.clone()),
            Implementation::Factory(factory) => factory(self).map_err(|source| ResolveError::Factory {
                type_name: descriptor.service_type().name(),
                source,
            }),
        }
    }
}

impl fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceProvider")
            .field("registrations", &self.root.descriptors.len())
            .field("scope_id", &self.scope_id())
            .finish()
    }
}

fn downcast<T: Send + Sync + 'static>(instance: ServiceInstance, tag: TypeTag) -> Result<Arc<T>, ResolveError> {
    instance
        .downcast::<T>()
        .map_err(|_| ResolveError::TypeMismatch { type_name: tag.name() })
}

/// A resolution scope. Scoped instances are released by [`Scope::close`] or on drop.
pub struct Scope {
    provider: ServiceProvider,
}

impl Scope {
    pub fn provider(&self) -> &ServiceProvider {
        &self.provider
    }

    pub fn id(&self) -> u64 {
        self.provider.scope_id().unwrap_or_default()
    }

    /// Release scoped instances. Providers cloned from this scope stop resolving scoped services.
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        if let Some(state) = &self.provider.scope {
            state.release();
        }
    }
}
