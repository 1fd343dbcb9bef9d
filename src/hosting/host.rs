//! Host builder and host.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::config::loader::{load_layered, ConfigError};
use crate::config::schema::HostConfig;
use crate::config::validation::validate_config;
use crate::hosting::{ApplicationBuilder, HostEnvironment};
use crate::lifecycle::{wait_for_shutdown, Shutdown};
use crate::observability::{logging, metrics};
use crate::services::{ServiceCollection, ServiceProvider};
use crate::startup::{ConventionStartup, Startup, StartupCatalog, StartupError, StartupType};

/// Host property under which the loaded startup is recorded.
pub const STARTUP_PROPERTY: &str = "startup";

/// Errors raised while building or starting the host.
#[derive(Debug, Error)]
pub enum HostError {
    #[error(transparent)]
    Startup(#[from] StartupError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Host {instance_id} has already been started")]
    AlreadyStarted { instance_id: Uuid },
}

type ServicesCallback = Box<dyn FnOnce(&mut HostContext, &mut ServiceCollection) -> Result<(), HostError>>;

/// State shared with service configuration callbacks.
pub struct HostContext {
    environment: HostEnvironment,
    config: HostConfig,
    properties: HashMap<String, Arc<dyn Any + Send + Sync>>,
    provider_override: Option<ServiceProvider>,
}

impl HostContext {
    fn new(environment: HostEnvironment, config: HostConfig) -> Self {
        Self {
            environment,
            config,
            properties: HashMap::new(),
            provider_override: None,
        }
    }

    pub fn environment(&self) -> &HostEnvironment {
        &self.environment
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn set_property<T: Send + Sync + 'static>(&mut self, key: impl Into<String>, value: T) {
        self.properties.insert(key.into(), Arc::new(value));
    }

    pub fn property<T: Send + Sync + 'static>(&self, key: &str) -> Option<Arc<T>> {
        self.properties.get(key).cloned().and_then(|v| v.downcast::<T>().ok())
    }
}

impl fmt::Debug for HostContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostContext")
            .field("environment", &self.environment)
            .field("properties", &self.properties.keys().collect::<Vec<_>>())
            .field("provider_override", &self.provider_override.is_some())
            .finish()
    }
}

/// Builds a [`Host`].
pub struct HostBuilder {
    config: HostConfig,
    environment: Option<String>,
    callbacks: Vec<ServicesCallback>,
}

impl HostBuilder {
    pub fn new(config: HostConfig) -> Self {
        Self {
            config,
            environment: None,
            callbacks: Vec::new(),
        }
    }

    /// Override the configured environment name.
    pub fn use_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Add a service configuration callback. Callbacks run in order during [`build`](Self::build).
    pub fn configure_services<F>(mut self, configure: F) -> Self
    where
        F: FnOnce(&HostContext, &mut ServiceCollection) + 'static,
    {
        self.callbacks.push(Box::new(move |ctx, services| {
            configure(ctx, services);
            Ok(())
        }));
        self
    }

    /// Use a convention-based startup type.
    ///
    /// The startup is loaded against a provider built from the registrations made
    /// so far, so filters must be registered before this call.
    pub fn use_startup(mut self, startup: StartupType) -> Self {
        self.callbacks.push(Box::new(move |ctx, services| {
            let hosting = services.build_service_provider();
            let loaded = ConventionStartup::load(&hosting, &startup, ctx.environment.environment_name())?;
            register_startup(ctx, services, Arc::new(loaded))
        }));
        self
    }

    /// Pick `Startup{Environment}` or `Startup` from `catalog`, then behave like [`use_startup`](Self::use_startup).
    pub fn use_startup_catalog(mut self, catalog: StartupCatalog) -> Self {
        self.callbacks.push(Box::new(move |ctx, services| {
            let environment = ctx.environment.environment_name().to_string();
            let startup = catalog.find_startup_type(&environment)?;
            let hosting = services.build_service_provider();
            let loaded = ConventionStartup::load(&hosting, startup, &environment)?;
            register_startup(ctx, services, Arc::new(loaded))
        }));
        self
    }

    /// Use a type that implements [`Startup`] directly.
    pub fn use_startup_instance(mut self, startup: Arc<dyn Startup>) -> Self {
        self.callbacks
            .push(Box::new(move |ctx, services| register_startup(ctx, services, startup)));
        self
    }

    pub fn build(self) -> Result<Host, HostError> {
        let mut config = self.config;
        if let Some(environment) = self.environment {
            config.host.environment = environment;
        }
        validate_config(&config).map_err(ConfigError::Validation)?;
        let environment = HostEnvironment::from_config(&config);
        let mut ctx = HostContext::new(environment.clone(), config.clone());

        let shutdown = Shutdown::new();
        let mut services = ServiceCollection::new();
        services
            .add_singleton(environment.clone())
            .add_singleton(config)
            .add_singleton(shutdown.clone());

        for callback in self.callbacks {
            callback(&mut ctx, &mut services)?;
        }

        let provider = match ctx.provider_override.take() {
            Some(provider) => {
                tracing::debug!("Using service provider returned by ConfigureServices");
                provider
            }
            None => services.build_service_provider(),
        };

        let host = Host {
            instance_id: Uuid::new_v4(),
            services: provider,
            context: ctx,
            shutdown,
            application: None,
        };
        tracing::info!(
            instance_id = %host.instance_id,
            environment = environment.environment_name(),
            application = environment.application_name(),
            registrations = services.len(),
            "Host built"
        );
        Ok(host)
    }
}

impl fmt::Debug for HostBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostBuilder")
            .field("config", &self.config)
            .field("environment", &self.environment)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

fn register_startup(
    ctx: &mut HostContext,
    services: &mut ServiceCollection,
    startup: Arc<dyn Startup>,
) -> Result<(), HostError> {
    services.add_singleton::<Arc<dyn Startup>>(startup.clone());

    if let Some(provider) = startup.configure_services(services)? {
        ctx.provider_override = Some(provider);
    }
    ctx.set_property(STARTUP_PROPERTY, startup);
    Ok(())
}

/// A built host.
pub struct Host {
    instance_id: Uuid,
    services: ServiceProvider,
    context: HostContext,
    shutdown: Shutdown,
    application: Option<ApplicationBuilder>,
}

impl Host {
    /// Builder with configuration from `appsettings*.toml` in the current directory, logging and metrics set up.
    pub fn create_default_builder() -> Result<HostBuilder, HostError> {
        let dir = std::env::current_dir()?;
        Self::create_default_builder_in(&dir)
    }

    /// Like [`create_default_builder`](Self::create_default_builder), reading configuration from `dir`.
    pub fn create_default_builder_in(dir: &Path) -> Result<HostBuilder, HostError> {
        let config = load_layered(dir)?;
        logging::init_logging(&config.observability);
        metrics::set_enabled(config.observability.metrics_enabled);
        tracing::debug!(
            dir = %dir.display(),
            environment = %config.host.environment,
            "Host configuration loaded"
        );
        Ok(HostBuilder::new(config))
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn services(&self) -> &ServiceProvider {
        &self.services
    }

    pub fn context(&self) -> &HostContext {
        &self.context
    }

    pub fn environment(&self) -> &HostEnvironment {
        self.context.environment()
    }

    pub fn shutdown(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// The configured application, once started.
    pub fn application(&self) -> Option<&ApplicationBuilder> {
        self.application.as_ref()
    }

    /// Run `Configure` on the registered startup, if any.
    pub fn start(&mut self) -> Result<(), HostError> {
        if self.application.is_some() {
            return Err(HostError::AlreadyStarted {
                instance_id: self.instance_id,
            });
        }

        let mut app = ApplicationBuilder::new(self.services.clone(), self.context.environment.clone());
        match self.find_startup() {
            Some(startup) => startup.configure(&mut app)?,
            None => tracing::debug!(instance_id = %self.instance_id, "No startup registered"),
        }
        self.application = Some(app);

        tracing::info!(instance_id = %self.instance_id, "Host started");
        Ok(())
    }

    /// Start, then wait for Ctrl-C or a shutdown trigger.
    pub async fn run_console(mut self) -> Result<(), HostError> {
        self.start()?;
        tracing::info!(
            environment = self.environment().environment_name(),
            "Application started. Press Ctrl+C to shut down."
        );

        wait_for_shutdown(&self.shutdown).await;
        tracing::info!(instance_id = %self.instance_id, "Host stopped");
        Ok(())
    }

    /// Best-effort lookup: a failing lookup is logged and treated as "not registered".
    fn find_startup(&self) -> Option<Arc<dyn Startup>> {
        let registered = match self.services.get::<Arc<dyn Startup>>() {
            Ok(found) => found.map(|s| Arc::clone(&*s)),
            Err(e) => {
                tracing::debug!(error = %e, "Startup lookup failed");
                None
            }
        };

        registered.or_else(|| {
            self.context
                .property::<Arc<dyn Startup>>(STARTUP_PROPERTY)
                .map(|s| Arc::clone(&*s))
        })
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("instance_id", &self.instance_id)
            .field("environment", self.context.environment())
            .field("started", &self.application.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::startup::MethodInfo;

    #[derive(Default)]
    struct Sample;

    #[test]
    fn test_build_registers_host_services() {
        let host = HostBuilder::new(HostConfig::default())
            .use_environment("Staging")
            .build()
            .unwrap();

        let env = host.services().get_required::<HostEnvironment>().unwrap();
        assert!(env.is_staging());
        assert!(host.services().get::<Shutdown>().unwrap().is_some());
        assert_eq!(host.services().get_required::<HostConfig>().unwrap().host.environment, "Staging");
    }

    #[test]
    fn test_environment_override_is_validated() {
        let err = HostBuilder::new(HostConfig::default())
            .use_environment("Dev-1 x")
            .build()
            .unwrap_err();
        match err {
            HostError::Config(ConfigError::Validation(errors)) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].field, "host.environment");
            }
            other => panic!("unexpected error: {other}"),
        }

        let mut config = HostConfig::default();
        config.observability.log_level = "shouting".into();
        let err = HostBuilder::new(config).build().unwrap_err();
        assert!(matches!(err, HostError::Config(ConfigError::Validation(_))));
    }

    #[test]
    fn test_start_without_startup() {
        let mut host = HostBuilder::new(HostConfig::default()).build().unwrap();
        host.start().unwrap();
        assert!(host.application().is_some());

        let err = host.start().unwrap_err();
        assert!(matches!(err, HostError::AlreadyStarted { .. }));
    }

    #[test]
    fn test_startup_is_recorded_in_properties() {
        let startup = StartupType::with_default::<Sample>("Sample")
            .method(MethodInfo::configure::<Sample, _>("Configure", |_, app| {
                app.set_property("ran", "true");
                Ok(())
            }));
        let mut host = HostBuilder::new(HostConfig::default()).use_startup(startup).build().unwrap();

        assert!(host.context().property::<Arc<dyn Startup>>(STARTUP_PROPERTY).is_some());
        host.start().unwrap();
        assert_eq!(host.application().unwrap().property("ran"), Some("true"));
    }

    #[test]
    fn test_configure_failure_propagates() {
        let startup = StartupType::with_default::<Sample>("Sample")
            .method(MethodInfo::configure::<Sample, _>("Configure", |_, _| Err("refused".into())));
        let mut host = HostBuilder::new(HostConfig::default()).use_startup(startup).build().unwrap();

        let err = host.start().unwrap_err();
        assert!(matches!(err, HostError::Startup(StartupError::Invocation { .. })));
        assert!(host.application().is_none());
    }

    #[test]
    fn test_resolution_failure_aborts_build() {
        let startup = StartupType::with_default::<Sample>("Sample");
        let err = HostBuilder::new(HostConfig::default()).use_startup(startup).build().unwrap_err();
        assert!(matches!(err, HostError::Startup(StartupError::MissingRequiredMethod { .. })));
    }
}
