//! Container pipeline builder.
//!
//! # Responsibilities
//! - Discover the container type from the `ConfigureContainer` parameter
//! - Wrap the method in the container filters registered for that type
//! - Convert between opaque container handles and the concrete builder type
//! - Create the builder and the final provider through the registered factory
//!
//! # Design Decisions
//! - The container type is a runtime tag plus closed operations monomorphised
//!   for the parameter type; it is fixed once the pipeline is built
//! - A single checked cast at the pipeline boundary; a mismatch is fatal
//! - Without a `ConfigureContainer` method the pipeline is a no-op and the
//!   placeholder container type is never instantiated

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::observability::metrics;
use crate::services::{ServiceCollection, ServiceProvider, ServiceProviderFactory, TypeTag};
use crate::startup::error::StartupError;
use crate::startup::filters::{ContainerAction, ContainerFilter, FilterChain};
use crate::startup::resolver::{MethodBinding, MethodRole};
use crate::startup::types::{Arguments, Instance, MethodInfo, Returned};

/// Erased form of the `ConfigureContainer` call, adapted by the typed pipeline.
pub(crate) type ErasedContainerAction = Arc<dyn Fn(&mut dyn Any) -> Result<(), StartupError> + Send + Sync>;

type RunFn = Box<dyn Fn(&mut ContainerHandle) -> Result<(), StartupError> + Send + Sync>;

/// Opaque container builder passed across the pipeline boundary.
pub struct ContainerHandle {
    value: Box<dyn Any + Send>,
    type_name: &'static str,
}

impl ContainerHandle {
    pub fn new<T: Send + 'static>(value: T) -> Self {
        Self {
            value: Box::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.value.downcast_mut::<T>()
    }

    pub fn into_inner<T: Any>(self) -> Result<T, Self> {
        let type_name = self.type_name;
        self.value
            .downcast::<T>()
            .map(|b| *b)
            .map_err(|value| Self { value, type_name })
    }
}

impl fmt::Debug for ContainerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ContainerHandle").field(&self.type_name).finish()
    }
}

/// Operations available for a container type.
pub(crate) trait ContainerOps: Send + Sync {
    fn tag(&self) -> TypeTag;

    fn create_builder(&self, hosting: &ServiceProvider, services: &ServiceCollection) -> Result<ContainerHandle, StartupError>;

    /// Resolve the container filters for this type and fold them around `core`.
    fn build_pipeline(&self, hosting: &ServiceProvider, core: ErasedContainerAction) -> Result<(usize, RunFn), StartupError>;

    fn create_service_provider(&self, hosting: &ServiceProvider, builder: ContainerHandle) -> Result<ServiceProvider, StartupError>;
}

pub(crate) struct TypedContainer<B>(PhantomData<fn() -> B>);

impl<B> TypedContainer<B> {
    pub(crate) fn new() -> Self {
        Self(PhantomData)
    }
}

impl<B: Send + 'static> TypedContainer<B> {
    fn factory(&self, hosting: &ServiceProvider) -> Result<Arc<dyn ServiceProviderFactory<B>>, StartupError> {
        let registered = hosting.get::<Arc<dyn ServiceProviderFactory<B>>>()?;
        registered
            .map(|factory| Arc::clone(&*factory))
            .ok_or(StartupError::MissingProviderFactory {
                container: std::any::type_name::<B>(),
            })
    }

    fn mismatch(actual: &'static str) -> StartupError {
        StartupError::ContainerTypeMismatch {
            expected: std::any::type_name::<B>(),
            actual,
        }
    }
}

impl<B: Send + 'static> ContainerOps for TypedContainer<B> {
    fn tag(&self) -> TypeTag {
        TypeTag::of::<B>()
    }

    fn create_builder(&self, hosting: &ServiceProvider, services: &ServiceCollection) -> Result<ContainerHandle, StartupError> {
        let factory = self.factory(hosting)?;
        Ok(ContainerHandle::new(factory.create_builder(services)))
    }

    fn build_pipeline(&self, hosting: &ServiceProvider, core: ErasedContainerAction) -> Result<(usize, RunFn), StartupError> {
        let filters = FilterChain::<dyn ContainerFilter<B>>::resolve(hosting)?;

        let source: ContainerAction<B> = Box::new(move |builder: &mut B| core(builder as &mut dyn Any));
        let pipeline = filters.fold(source, |filter, next| filter.configure_container(next));

        let run: RunFn = Box::new(move |handle: &mut ContainerHandle| {
            let actual = handle.type_name();
            let builder = handle.downcast_mut::<B>().ok_or_else(|| Self::mismatch(actual))?;
            pipeline(builder)
        });
        Ok((filters.len(), run))
    }

    fn create_service_provider(&self, hosting: &ServiceProvider, builder: ContainerHandle) -> Result<ServiceProvider, StartupError> {
        let builder = builder
            .into_inner::<B>()
            .map_err(|handle| Self::mismatch(handle.type_name()))?;
        self.factory(hosting)?
            .create_service_provider(builder)
            .map_err(|source| StartupError::ProviderFactory {
                container: std::any::type_name::<B>(),
                source,
            })
    }
}

/// Placeholder used when no `ConfigureContainer` method exists. Never instantiated.
enum Unbound {}

/// Container builder type selected by a `ConfigureContainer` parameter.
#[derive(Clone)]
pub struct ContainerType {
    ops: Arc<dyn ContainerOps>,
}

impl ContainerType {
    pub fn of<B: Send + 'static>() -> Self {
        Self {
            ops: Arc::new(TypedContainer::<B>::new()),
        }
    }

    pub fn unbound() -> Self {
        Self::of::<Unbound>()
    }

    pub(crate) fn from_method(method: &MethodInfo) -> Option<Self> {
        method.parameters().first().map(|p| Self { ops: p.container_ops() })
    }

    pub fn tag(&self) -> TypeTag {
        self.ops.tag()
    }

    pub fn is_unbound(&self) -> bool {
        self.tag().is::<Unbound>()
    }
}

impl fmt::Debug for ContainerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ContainerType").field(&self.tag()).finish()
    }
}

/// The `ConfigureContainer` method wrapped in its container filters.
pub struct ContainerPipeline {
    container_type: ContainerType,
    filter_count: usize,
    run: Option<RunFn>,
}

impl ContainerPipeline {
    /// Build the pipeline. Filters for the container type are resolved from `hosting` now.
    pub fn build(
        binding: MethodBinding,
        instance: Option<Instance>,
        hosting: &ServiceProvider,
        declaring_type: &str,
    ) -> Result<Self, StartupError> {
        let method = match binding.into_method() {
            Some(method) => method,
            None => {
                return Ok(Self {
                    container_type: ContainerType::unbound(),
                    filter_count: 0,
                    run: None,
                })
            }
        };

        if method.parameters().len() != 1 {
            return Err(StartupError::invalid_signature(
                MethodRole::ConfigureContainer,
                method.name(),
                declaring_type,
                format!("must take only one parameter, found {}", method.parameters().len()),
            ));
        }
        let container_type = ContainerType::from_method(&method).unwrap_or_else(ContainerType::unbound);

        let declaring_type = declaring_type.to_string();
        let core: ErasedContainerAction = Arc::new(move |builder: &mut dyn Any| {
            let mut args = Arguments::new();
            args.push_borrowed(builder);
            let returned = method.invoke(instance.as_ref(), &mut args).map_err(|source| {
                StartupError::invocation(MethodRole::ConfigureContainer, method.name(), &declaring_type, source)
            })?;
            match returned {
                Returned::Unit => Ok(()),
                other => Err(StartupError::invalid_signature(
                    MethodRole::ConfigureContainer,
                    method.name(),
                    &declaring_type,
                    format!("must return nothing, returned {other:?}"),
                )),
            }
        });

        let (filter_count, run) = container_type.ops.build_pipeline(hosting, core)?;
        tracing::debug!(
            container = %container_type.tag(),
            filters = filter_count,
            "Container pipeline built"
        );

        Ok(Self {
            container_type,
            filter_count,
            run: Some(run),
        })
    }

    pub fn container_type(&self) -> &ContainerType {
        &self.container_type
    }

    pub fn filter_count(&self) -> usize {
        self.filter_count
    }

    /// True when there is no `ConfigureContainer` method.
    pub fn is_noop(&self) -> bool {
        self.run.is_none()
    }

    /// Run filters and the method against `handle`.
    pub fn run(&self, handle: &mut ContainerHandle) -> Result<(), StartupError> {
        match &self.run {
            Some(run) => {
                metrics::record_filters_applied("container", self.filter_count);
                run(handle)
            }
            None => Ok(()),
        }
    }

    /// Create a builder from `services`, configure it, and convert it into a provider.
    pub fn configure_provider(&self, hosting: &ServiceProvider, services: &ServiceCollection) -> Result<ServiceProvider, StartupError> {
        let ops = &self.container_type.ops;
        let mut handle = ops.create_builder(hosting, services)?;
        self.run(&mut handle)?;
        ops.create_service_provider(hosting, handle)
    }
}

impl fmt::Debug for ContainerPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerPipeline")
            .field("container_type", &self.container_type)
            .field("filter_count", &self.filter_count)
            .field("noop", &self.is_noop())
            .finish()
    }
}
