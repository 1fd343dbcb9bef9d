//! Services pipeline builder.
//!
//! Without filters the bound method is called directly and may hand back its own
//! provider. With filters the composition is void-returning: filters and method
//! mutate the registry in place and the pipeline reports "no provider".

use std::fmt;
use std::sync::Arc;

use crate::observability::metrics;
use crate::services::{ServiceCollection, ServiceProvider};
use crate::startup::error::StartupError;
use crate::startup::filters::{FilterChain, ServicesAction, ServicesFilter};
use crate::startup::resolver::{MethodBinding, MethodRole};
use crate::startup::types::{Arguments, Instance, MethodInfo, ReturnKind, Returned};

/// The bound `ConfigureServices` method and its receiver.
#[derive(Clone)]
struct ServicesTarget {
    method: MethodInfo,
    instance: Option<Instance>,
    declaring_type: Arc<str>,
}

impl ServicesTarget {
    fn invoke(&self, services: &mut ServiceCollection) -> Result<Option<ServiceProvider>, StartupError> {
        let mut args = Arguments::new();
        if !self.method.parameters().is_empty() {
            args.push_borrowed(services);
        }

        let returned = self
            .method
            .invoke(self.instance.as_ref(), &mut args)
            .map_err(|source| {
                StartupError::invocation(MethodRole::ConfigureServices, self.method.name(), &self.declaring_type, source)
            })?;

        match returned {
            Returned::Provider(provider) => Ok(provider),
            Returned::Unit => Ok(None),
            other => Err(StartupError::invalid_signature(
                MethodRole::ConfigureServices,
                self.method.name(),
                &self.declaring_type,
                format!("must return nothing or an optional provider, returned {other:?}"),
            )),
        }
    }

    fn conflict(&self, filters: usize) -> StartupError {
        StartupError::ProviderFilterConflict {
            role: MethodRole::ConfigureServices,
            method: self.method.name().to_string(),
            declaring_type: self.declaring_type.to_string(),
            filters,
        }
    }
}

/// `ConfigureServices` wrapped in the services filters.
pub struct ServicesPipeline {
    target: Option<ServicesTarget>,
    filters: FilterChain<dyn ServicesFilter>,
}

impl ServicesPipeline {
    pub fn build(
        binding: MethodBinding,
        instance: Option<Instance>,
        filters: FilterChain<dyn ServicesFilter>,
        declaring_type: &str,
    ) -> Result<Self, StartupError> {
        let target = match binding.into_method() {
            Some(method) => {
                validate(&method, declaring_type)?;
                Some(ServicesTarget {
                    method,
                    instance,
                    declaring_type: Arc::from(declaring_type),
                })
            }
            None => None,
        };

        if let Some(target) = &target {
            if target.method.return_kind() == ReturnKind::Provider && !filters.is_empty() {
                return Err(target.conflict(filters.len()));
            }
        }

        tracing::debug!(
            bound = target.is_some(),
            filters = filters.len(),
            "Services pipeline built"
        );
        Ok(Self { target, filters })
    }

    pub fn is_bound(&self) -> bool {
        self.target.is_some()
    }

    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }

    /// Run the pipeline against `services`. `Some` only when the method returned a provider and no filters ran.
    pub fn invoke(&self, services: &mut ServiceCollection) -> Result<Option<ServiceProvider>, StartupError> {
        if self.filters.is_empty() {
            return match &self.target {
                Some(target) => target.invoke(services),
                None => Ok(None),
            };
        }

        let filter_count = self.filters.len();
        let target = self.target.clone();
        let core: ServicesAction = Box::new(move |services: &mut ServiceCollection| {
            let Some(target) = &target else {
                return Ok(());
            };
            match target.invoke(services)? {
                Some(_) => Err(target.conflict(filter_count)),
                None => Ok(()),
            }
        });

        let pipeline = self.filters.fold(core, |filter, next| filter.configure_services(next));
        metrics::record_filters_applied("services", filter_count);
        pipeline(services)?;
        Ok(None)
    }
}

impl fmt::Debug for ServicesPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServicesPipeline")
            .field("method", &self.target.as_ref().map(|t| t.method.name()))
            .field("filters", &self.filters.len())
            .finish()
    }
}

fn validate(method: &MethodInfo, declaring_type: &str) -> Result<(), StartupError> {
    match method.parameters() {
        [] => Ok(()),
        [param] if param.ty().is::<ServiceCollection>() => Ok(()),
        [param] => Err(StartupError::invalid_signature(
            MethodRole::ConfigureServices,
            method.name(),
            declaring_type,
            format!("must take a ServiceCollection parameter, found '{}'", param.ty()),
        )),
        params => Err(StartupError::invalid_signature(
            MethodRole::ConfigureServices,
            method.name(),
            declaring_type,
            format!("must take zero or one ServiceCollection parameter, found {}", params.len()),
        )),
    }
}
