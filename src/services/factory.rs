//! Builder factories for alternate containers.

use std::sync::Arc;

use crate::services::{ServiceCollection, ServiceProvider};
use crate::BoxError;

/// Creates a container builder of type `B` from a registry and turns it into a provider.
pub trait ServiceProviderFactory<B>: Send + Sync {
    fn create_builder(&self, services: &ServiceCollection) -> B;

    fn create_service_provider(&self, builder: B) -> Result<ServiceProvider, BoxError>;
}

/// Factory whose builder is the registry itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultServiceProviderFactory;

impl ServiceProviderFactory<ServiceCollection> for DefaultServiceProviderFactory {
    fn create_builder(&self, services: &ServiceCollection) -> ServiceCollection {
        services.clone()
    }

    fn create_service_provider(&self, builder: ServiceCollection) -> Result<ServiceProvider, BoxError> {
        Ok(builder.build_service_provider())
    }
}

impl ServiceCollection {
    /// Register the builder factory used when a startup type configures a `B` container.
    pub fn add_provider_factory<B, F>(&mut self, factory: F) -> &mut Self
    where
        B: 'static,
        F: ServiceProviderFactory<B> + 'static,
    {
        self.add_singleton::<Arc<dyn ServiceProviderFactory<B>>>(Arc::new(factory))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_factory_round_trip() {
        let mut services = ServiceCollection::new();
        services.add_singleton(5u8);

        let factory = DefaultServiceProviderFactory;
        let mut builder = factory.create_builder(&services);
        builder.add_singleton(6u16);
        let provider = factory.create_service_provider(builder).unwrap();

        assert_eq!(*provider.get_required::<u8>().unwrap(), 5);
        assert_eq!(*provider.get_required::<u16>().unwrap(), 6);
        // The source registry is untouched.
        assert!(!services.contains::<u16>());
    }

    #[test]
    fn test_factory_registration_is_resolvable() {
        let mut services = ServiceCollection::new();
        services.add_provider_factory::<ServiceCollection, _>(DefaultServiceProviderFactory);
        let provider = services.build_service_provider();

        let factory = provider
            .get_required::<Arc<dyn ServiceProviderFactory<ServiceCollection>>>()
            .unwrap();
        let built = factory.create_builder(&ServiceCollection::new());
        assert!(built.is_empty());
    }
}
