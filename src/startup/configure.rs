//! `Configure` invocation.
//!
//! # Lifecycle
//! ```text
//! invoke(app)
//!   -> scope = app.application_services().create_scope()
//!   -> bind parameters (ApplicationBuilder passed through, the rest resolved from scope)
//!   -> call method
//!   -> scope.close()            on success and on error
//! ```

use std::fmt;
use std::sync::Arc;

use crate::hosting::ApplicationBuilder;
use crate::observability::metrics;
use crate::services::{ResolveError, ServiceInstance, ServiceProvider, TypeTag};
use crate::startup::error::StartupError;
use crate::startup::filters::{ConfigureAction, FilterChain, StartupFilter};
use crate::startup::resolver::MethodRole;
use crate::startup::types::{Arguments, Instance, MethodInfo, Returned};

struct ConfigureTarget {
    method: MethodInfo,
    instance: Option<Instance>,
    declaring_type: String,
}

impl ConfigureTarget {
    fn invoke(&self, app: &mut ApplicationBuilder) -> Result<(), StartupError> {
        let scope = app.application_services().create_scope();
        tracing::trace!(scope_id = scope.id(), method = self.method.name(), "Configure scope opened");

        let result = self.invoke_in_scope(scope.provider(), app);
        scope.close();
        result
    }

    fn invoke_in_scope(&self, provider: &ServiceProvider, app: &mut ApplicationBuilder) -> Result<(), StartupError> {
        // Resolve everything before borrowing the application builder into the arguments.
        let resolved = self
            .method
            .parameters()
            .iter()
            .map(|param| {
                if param.ty().is::<ApplicationBuilder>() {
                    return Ok(None);
                }
                self.resolve(provider, param.name(), param.ty()).map(Some)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut app = Some(app);
        let mut args = Arguments::new();
        for value in resolved {
            match value {
                Some(service) => args.push_service(service),
                None => {
                    if let Some(app) = app.take() {
                        args.push_borrowed(app);
                    }
                }
            }
        }

        let returned = self
            .method
            .invoke(self.instance.as_ref(), &mut args)
            .map_err(|source| StartupError::invocation(MethodRole::Configure, self.method.name(), &self.declaring_type, source))?;
        match returned {
            Returned::Unit => Ok(()),
            other => Err(StartupError::invalid_signature(
                MethodRole::Configure,
                self.method.name(),
                &self.declaring_type,
                format!("must return nothing, returned {other:?}"),
            )),
        }
    }

    fn resolve(&self, provider: &ServiceProvider, parameter: &str, ty: TypeTag) -> Result<ServiceInstance, StartupError> {
        let resolved = provider
            .get_erased(ty)
            .and_then(|found| found.ok_or(ResolveError::NotRegistered { type_name: ty.name() }));

        resolved.map_err(|source| StartupError::DependencyResolution {
            service_type: ty.name(),
            parameter: parameter.to_string(),
            method: self.method.name().to_string(),
            declaring_type: self.declaring_type.clone(),
            source,
        })
    }
}

/// `Configure` wrapped in the startup filters.
pub struct ConfigurePipeline {
    target: Arc<ConfigureTarget>,
    filters: FilterChain<dyn StartupFilter>,
}

impl ConfigurePipeline {
    pub fn build(
        method: MethodInfo,
        instance: Option<Instance>,
        filters: FilterChain<dyn StartupFilter>,
        declaring_type: &str,
    ) -> Result<Self, StartupError> {
        let builders = method
            .parameters()
            .iter()
            .filter(|p| p.ty().is::<ApplicationBuilder>())
            .count();
        if builders > 1 {
            return Err(StartupError::invalid_signature(
                MethodRole::Configure,
                method.name(),
                declaring_type,
                format!("may take at most one ApplicationBuilder parameter, found {builders}"),
            ));
        }

        tracing::debug!(
            method = method.name(),
            parameters = method.parameters().len(),
            filters = filters.len(),
            "Configure pipeline built"
        );
        Ok(Self {
            target: Arc::new(ConfigureTarget {
                method,
                instance,
                declaring_type: declaring_type.to_string(),
            }),
            filters,
        })
    }

    pub fn method_name(&self) -> &str {
        self.target.method.name()
    }

    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }

    pub fn invoke(&self, app: &mut ApplicationBuilder) -> Result<(), StartupError> {
        if self.filters.is_empty() {
            return self.target.invoke(app);
        }

        let target = Arc::clone(&self.target);
        let core: ConfigureAction = Box::new(move |app: &mut ApplicationBuilder| target.invoke(app));
        let pipeline = self.filters.fold(core, |filter, next| filter.configure(next));
        metrics::record_filters_applied("configure", self.filters.len());
        pipeline(app)
    }
}

impl fmt::Debug for ConfigurePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurePipeline")
            .field("method", &self.target.method.name())
            .field("filters", &self.filters.len())
            .finish()
    }
}
