//! Startup loading: resolve, activate, build pipelines, compose delegates.

use std::fmt;

use crate::hosting::ApplicationBuilder;
use crate::services::{ServiceCollection, ServiceProvider};
use crate::startup::configure::ConfigurePipeline;
use crate::startup::container::ContainerPipeline;
use crate::startup::error::StartupError;
use crate::startup::filters::{FilterChain, ServicesFilter, StartupFilter};
use crate::startup::resolver::{resolve_methods, MethodRole};
use crate::startup::services_pipeline::ServicesPipeline;
use crate::startup::types::{Instance, StartupType};

/// Builds the application provider from the registry. `None` asks the host to build it.
pub type ConfigureServicesDelegate =
    Box<dyn Fn(&mut ServiceCollection) -> Result<Option<ServiceProvider>, StartupError> + Send + Sync>;

/// Configures the application.
pub type ConfigureDelegate = Box<dyn Fn(&mut ApplicationBuilder) -> Result<(), StartupError> + Send + Sync>;

/// The loaded startup: its instance (if any) and the two composed delegates.
///
/// Both delegates are always present; absent optional methods become no-ops.
pub struct StartupMethods {
    instance: Option<Instance>,
    configure_delegate: ConfigureDelegate,
    configure_services_delegate: ConfigureServicesDelegate,
}

impl StartupMethods {
    pub fn new(
        instance: Option<Instance>,
        configure_delegate: ConfigureDelegate,
        configure_services_delegate: ConfigureServicesDelegate,
    ) -> Self {
        Self {
            instance,
            configure_delegate,
            configure_services_delegate,
        }
    }

    pub fn instance(&self) -> Option<&Instance> {
        self.instance.as_ref()
    }

    pub fn configure_services(&self, services: &mut ServiceCollection) -> Result<Option<ServiceProvider>, StartupError> {
        (self.configure_services_delegate)(services)
    }

    pub fn configure(&self, app: &mut ApplicationBuilder) -> Result<(), StartupError> {
        (self.configure_delegate)(app)
    }
}

impl fmt::Debug for StartupMethods {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StartupMethods")
            .field("has_instance", &self.instance.is_some())
            .finish_non_exhaustive()
    }
}

pub struct StartupLoader;

impl StartupLoader {
    /// Load the startup methods of `startup` for `environment`.
    ///
    /// Filters are read from `hosting` now; registrations made later are not seen.
    pub fn load_methods(
        hosting: &ServiceProvider,
        startup: &StartupType,
        environment: &str,
    ) -> Result<StartupMethods, StartupError> {
        let resolved = resolve_methods(startup, environment)?;

        let instance = if resolved.requires_instance() {
            Some(startup.activate(hosting)?)
        } else {
            None
        };

        let services = ServicesPipeline::build(
            resolved.configure_services,
            instance.clone(),
            FilterChain::<dyn ServicesFilter>::resolve(hosting)?,
            startup.name(),
        )?;
        let container = ContainerPipeline::build(resolved.configure_container, instance.clone(), hosting, startup.name())?;

        let configure_method = resolved.configure.into_method().ok_or_else(|| StartupError::MissingRequiredMethod {
            role: MethodRole::Configure,
            with_environment: MethodRole::Configure.method_name(environment),
            without_environment: MethodRole::Configure.method_name(""),
            declaring_type: startup.name().to_string(),
        })?;
        let configure = ConfigurePipeline::build(
            configure_method,
            instance.clone(),
            FilterChain::<dyn StartupFilter>::resolve(hosting)?,
            startup.name(),
        )?;

        tracing::info!(
            startup = startup.name(),
            environment,
            configure = configure.method_name(),
            configure_services = services.is_bound(),
            configure_container = !container.is_noop(),
            "Startup methods loaded"
        );

        let hosting = hosting.clone();
        let configure_services_delegate: ConfigureServicesDelegate =
            Box::new(move |registry: &mut ServiceCollection| {
                if let Some(provider) = services.invoke(registry)? {
                    return Ok(Some(provider));
                }
                if container.is_noop() {
                    return Ok(None);
                }
                container.configure_provider(&hosting, registry).map(Some)
            });
        let configure_delegate: ConfigureDelegate = Box::new(move |app: &mut ApplicationBuilder| configure.invoke(app));

        Ok(StartupMethods::new(instance, configure_delegate, configure_services_delegate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hosting::HostEnvironment;
    use crate::services::DefaultServiceProviderFactory;
    use crate::startup::types::MethodInfo;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Plain {
        calls: AtomicUsize,
    }

    fn plain_type() -> StartupType {
        StartupType::with_default::<Plain>("Plain")
            .method(MethodInfo::configure::<Plain, _>("Configure", |this, _| {
                this.calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }))
    }

    #[test]
    fn test_no_optional_methods_yields_no_provider() {
        let hosting = ServiceCollection::new().build_service_provider();
        let methods = StartupLoader::load_methods(&hosting, &plain_type(), "Production").unwrap();

        let mut services = ServiceCollection::new();
        services.add_singleton(1u8);
        assert!(methods.configure_services(&mut services).unwrap().is_none());
        assert_eq!(services.len(), 1);
    }

    #[test]
    fn test_configure_uses_shared_instance() {
        let hosting = ServiceCollection::new().build_service_provider();
        let methods = StartupLoader::load_methods(&hosting, &plain_type(), "Production").unwrap();

        let mut app = ApplicationBuilder::new(
            ServiceCollection::new().build_service_provider(),
            HostEnvironment::new("Production", "Tests"),
        );
        methods.configure(&mut app).unwrap();
        methods.configure(&mut app).unwrap();

        let instance = methods.instance().unwrap().downcast_ref::<Plain>().unwrap();
        assert_eq!(instance.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_container_path_builds_provider_through_factory() {
        let startup = plain_type()
            .method(MethodInfo::configure_services::<Plain, _>("ConfigureServices", |_, s| {
                s.add_singleton("from services".to_string());
                Ok(())
            }))
            .method(MethodInfo::configure_container::<Plain, ServiceCollection, _>(
                "ConfigureContainer",
                |_, builder| {
                    builder.add_singleton(99u16);
                    Ok(())
                },
            ));

        let mut hosting = ServiceCollection::new();
        hosting.add_provider_factory::<ServiceCollection, _>(DefaultServiceProviderFactory);
        let hosting = hosting.build_service_provider();

        let methods = StartupLoader::load_methods(&hosting, &startup, "Production").unwrap();
        let provider = methods
            .configure_services(&mut ServiceCollection::new())
            .unwrap()
            .expect("container path returns a provider");

        assert_eq!(provider.get_required::<String>().unwrap().as_str(), "from services");
        assert_eq!(*provider.get_required::<u16>().unwrap(), 99);
    }

    #[test]
    fn test_static_only_type_needs_no_instance() {
        struct Unconstructible;
        let startup = StartupType::new::<Unconstructible>("Unconstructible").method(
            MethodInfo::static_method::<Unconstructible>("Configure")
                .invoke(|_, _| Ok(crate::startup::types::Returned::Unit)),
        );

        let hosting = ServiceCollection::new().build_service_provider();
        let methods = StartupLoader::load_methods(&hosting, &startup, "Production").unwrap();
        assert!(methods.instance().is_none());
    }

    #[test]
    fn test_missing_instance_is_activation_error() {
        struct Unconstructible;
        let startup = StartupType::new::<Unconstructible>("Unconstructible")
            .method(MethodInfo::configure::<Unconstructible, _>("Configure", |_, _| Ok(())));

        let hosting = ServiceCollection::new().build_service_provider();
        let err = StartupLoader::load_methods(&hosting, &startup, "Production").unwrap_err();
        assert!(matches!(err, StartupError::Activation { .. }));

        let mut registered = ServiceCollection::new();
        registered.add_singleton(Unconstructible);
        let hosting = registered.build_service_provider();
        let methods = StartupLoader::load_methods(&hosting, &startup, "Production").unwrap();
        assert!(methods.instance().unwrap().is::<Unconstructible>());
    }
}
