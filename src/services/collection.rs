//! Service registration.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::services::provider::ServiceProvider;
use crate::BoxError;

/// Type-erased service instance as stored by the registry.
pub type ServiceInstance = Arc<dyn Any + Send + Sync>;

pub(crate) type FactoryFn =
    Arc<dyn Fn(&ServiceProvider) -> Result<ServiceInstance, BoxError> + Send + Sync>;

/// Runtime identity of a Rust type (id plus readable name).
#[derive(Clone, Copy)]
pub struct TypeTag {
    id: TypeId,
    name: &'static str,
}

impl TypeTag {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns true if this tag identifies `T`.
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeTag {}

impl Hash for TypeTag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// How long a resolved instance lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    /// One instance per root provider.
    Singleton,
    /// One instance per scope.
    Scoped,
    /// New instance on every resolution.
    Transient,
}

#[derive(Clone)]
pub(crate) enum Implementation {
    Instance(ServiceInstance),
    Factory(FactoryFn),
}

/// A single registration in a [`ServiceCollection`].
#[derive(Clone)]
pub struct ServiceDescriptor {
    service_type: TypeTag,
    lifetime: Lifetime,
    pub(crate) implementation: Implementation,
}

impl ServiceDescriptor {
    pub fn service_type(&self) -> TypeTag {
        self.service_type
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("service_type", &self.service_type)
            .field("lifetime", &self.lifetime)
            .finish()
    }
}

/// Mutable registry of service bindings.
///
/// Cloning is cheap: instances and factories are shared behind `Arc`.
#[derive(Clone, Default)]
pub struct ServiceCollection {
    descriptors: Vec<ServiceDescriptor>,
}

impl ServiceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        self.descriptors.iter()
    }

    /// Returns true if at least one registration exists for `T`.
    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        self.descriptors.iter().any(|d| d.service_type.is::<T>())
    }

    /// Register an already-constructed singleton.
    pub fn add_singleton<T: Send + Sync + 'static>(&mut self, value: T) -> &mut Self {
        self.push(
            TypeTag::of::<T>(),
            Lifetime::Singleton,
            Implementation::Instance(Arc::new(value)),
        )
    }

    /// Register a singleton created lazily on first resolution.
    pub fn add_singleton_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ServiceProvider) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        self.push_factory(Lifetime::Singleton, factory)
    }

    /// Register a service created once per scope.
    pub fn add_scoped<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ServiceProvider) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        self.push_factory(Lifetime::Scoped, factory)
    }

    /// Register a service created on every resolution.
    pub fn add_transient<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ServiceProvider) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        self.push_factory(Lifetime::Transient, factory)
    }

    /// Build a provider from a snapshot of the current registrations.
    pub fn build_service_provider(&self) -> ServiceProvider {
        ServiceProvider::new(self.descriptors.clone())
    }

    fn push_factory<T, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ServiceProvider) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        let erased: FactoryFn =
            Arc::new(move |provider: &ServiceProvider| factory(provider).map(|v| Arc::new(v) as ServiceInstance));
        self.push(TypeTag::of::<T>(), lifetime, Implementation::Factory(erased))
    }

    fn push(&mut self, service_type: TypeTag, lifetime: Lifetime, implementation: Implementation) -> &mut Self {
        self.descriptors.push(ServiceDescriptor {
            service_type,
            lifetime,
            implementation,
        });
        self
    }
}

impl fmt::Debug for ServiceCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.descriptors.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_tag_identity() {
        let tag = TypeTag::of::<String>();
        assert!(tag.is::<String>());
        assert!(!tag.is::<u32>());
        assert_eq!(tag, TypeTag::of::<String>());
        assert!(tag.name().contains("String"));
    }

    #[test]
    fn test_registration_order_and_contains() {
        let mut services = ServiceCollection::new();
        services.add_singleton(1u32).add_singleton("name".to_string());
        services.add_transient(|_| Ok(2u64));

        assert_eq!(services.len(), 3);
        assert!(services.contains::<u32>());
        assert!(services.contains::<u64>());
        assert!(!services.contains::<i8>());

        let lifetimes: Vec<_> = services.iter().map(|d| d.lifetime()).collect();
        assert_eq!(
            lifetimes,
            vec![Lifetime::Singleton, Lifetime::Singleton, Lifetime::Transient]
        );
    }
}
