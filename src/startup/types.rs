//! Startup type descriptors.
//!
//! A startup type is described explicitly instead of being reflected over: its
//! name, how to obtain an instance, and the list of methods it exposes. Each
//! [`MethodInfo`] carries its name, parameter types, declared return kind and a
//! type-erased invoker. Only the resolver looks at method names.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::hosting::ApplicationBuilder;
use crate::services::{ServiceCollection, ServiceInstance, ServiceProvider, TypeTag};
use crate::startup::container::{ContainerOps, TypedContainer};
use crate::startup::error::StartupError;
use crate::BoxError;

/// A startup instance, shared by every delegate built from it.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Type-erased method body. Receives the instance (absent for static methods) and the bound arguments.
pub type Invoker = Arc<dyn Fn(Option<&Instance>, &mut Arguments<'_>) -> Result<Returned, BoxError> + Send + Sync>;

/// Creates a startup instance from the hosting provider.
pub type Activator = Arc<dyn Fn(&ServiceProvider) -> Result<Instance, BoxError> + Send + Sync>;

/// Errors raised while reading bound arguments inside an invoker.
#[derive(Debug, Error)]
pub enum ArgumentError {
    #[error("argument {index} was not supplied")]
    Missing { index: usize },

    #[error("argument {index} is not a '{expected}'")]
    WrongType { index: usize, expected: &'static str },

    #[error("method requires an instance of '{expected}'")]
    MissingInstance { expected: &'static str },
}

enum Argument<'a> {
    Borrowed(&'a mut dyn Any),
    Service(ServiceInstance),
}

/// Arguments bound for a single invocation.
#[derive(Default)]
pub struct Arguments<'a> {
    values: Vec<Argument<'a>>,
}

impl<'a> Arguments<'a> {
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Pass a value by mutable reference (registry, container builder, application builder).
    pub fn push_borrowed(&mut self, value: &'a mut dyn Any) {
        self.values.push(Argument::Borrowed(value));
    }

    /// Pass a service resolved from a provider.
    pub fn push_service(&mut self, value: ServiceInstance) {
        self.values.push(Argument::Service(value));
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Borrow argument `index` as `T`.
    pub fn get_mut<T: Any>(&mut self, index: usize) -> Result<&mut T, ArgumentError> {
        let expected = std::any::type_name::<T>();
        match self.values.get_mut(index) {
            Some(Argument::Borrowed(value)) => value
                .downcast_mut::<T>()
                .ok_or(ArgumentError::WrongType { index, expected }),
            Some(Argument::Service(_)) => Err(ArgumentError::WrongType { index, expected }),
            None => Err(ArgumentError::Missing { index }),
        }
    }

    /// Take argument `index` as a resolved service.
    pub fn service<T: Any + Send + Sync>(&self, index: usize) -> Result<Arc<T>, ArgumentError> {
        let expected = std::any::type_name::<T>();
        match self.values.get(index) {
            Some(Argument::Service(value)) => value
                .clone()
                .downcast::<T>()
                .map_err(|_| ArgumentError::WrongType { index, expected }),
            Some(Argument::Borrowed(_)) => Err(ArgumentError::WrongType { index, expected }),
            None => Err(ArgumentError::Missing { index }),
        }
    }
}

/// Value produced by an invoker.
pub enum Returned {
    Unit,
    Provider(Option<ServiceProvider>),
    Value(Box<dyn Any + Send>),
}

impl fmt::Debug for Returned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Returned::Unit => f.write_str("Unit"),
            Returned::Provider(p) => f.debug_tuple("Provider").field(&p.is_some()).finish(),
            Returned::Value(_) => f.write_str("Value(..)"),
        }
    }
}

/// Declared return type of a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnKind {
    Unit,
    /// An optional service provider handle.
    Provider,
    Value(TypeTag),
}

impl ReturnKind {
    pub fn of<T: ?Sized + 'static>() -> Self {
        let tag = TypeTag::of::<T>();
        if tag.is::<()>() {
            ReturnKind::Unit
        } else if tag.is::<ServiceProvider>() || tag.is::<Option<ServiceProvider>>() {
            ReturnKind::Provider
        } else {
            ReturnKind::Value(tag)
        }
    }
}

impl fmt::Display for ReturnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnKind::Unit => f.write_str("()"),
            ReturnKind::Provider => f.write_str("Option<ServiceProvider>"),
            ReturnKind::Value(tag) => write!(f, "{}", tag),
        }
    }
}

/// A declared method parameter.
///
/// Besides its type tag, each parameter carries the container operations for its
/// type, so a `ConfigureContainer` parameter can select the container builder.
#[derive(Clone)]
pub struct ParameterInfo {
    name: String,
    ty: TypeTag,
    container: Arc<dyn ContainerOps>,
}

impl ParameterInfo {
    pub fn of<T: Send + 'static>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: TypeTag::of::<T>(),
            container: Arc::new(TypedContainer::<T>::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> TypeTag {
        self.ty
    }

    pub(crate) fn container_ops(&self) -> Arc<dyn ContainerOps> {
        self.container.clone()
    }
}

impl fmt::Debug for ParameterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.ty)
    }
}

/// A public method of a startup type.
#[derive(Clone)]
pub struct MethodInfo {
    name: String,
    declaring_type: TypeTag,
    is_static: bool,
    parameters: Vec<ParameterInfo>,
    return_kind: ReturnKind,
    invoker: Invoker,
}

impl MethodInfo {
    /// Start describing an instance method of `S`.
    pub fn instance<S: Send + Sync + 'static>(name: impl Into<String>) -> MethodBuilder {
        MethodBuilder::new(name.into(), TypeTag::of::<S>(), false)
    }

    /// Start describing a static method of `S`.
    pub fn static_method<S: 'static>(name: impl Into<String>) -> MethodBuilder {
        MethodBuilder::new(name.into(), TypeTag::of::<S>(), true)
    }

    /// `fn name(&self, services: &mut ServiceCollection)`.
    pub fn configure_services<S, F>(name: impl Into<String>, f: F) -> Self
    where
        S: Send + Sync + 'static,
        F: Fn(&S, &mut ServiceCollection) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self::instance::<S>(name)
            .param::<ServiceCollection>("services")
            .invoke_on(move |this: &S, args| {
                f(this, args.get_mut::<ServiceCollection>(0)?)?;
                Ok(Returned::Unit)
            })
    }

    /// `fn name(&self, services: &mut ServiceCollection) -> Option<ServiceProvider>`.
    pub fn configure_services_returning_provider<S, F>(name: impl Into<String>, f: F) -> Self
    where
        S: Send + Sync + 'static,
        F: Fn(&S, &mut ServiceCollection) -> Result<Option<ServiceProvider>, BoxError> + Send + Sync + 'static,
    {
        Self::instance::<S>(name)
            .param::<ServiceCollection>("services")
            .returns::<Option<ServiceProvider>>()
            .invoke_on(move |this: &S, args| {
                let provider = f(this, args.get_mut::<ServiceCollection>(0)?)?;
                Ok(Returned::Provider(provider))
            })
    }

    /// `fn name(&self, builder: &mut B)`; `B` becomes the container type.
    pub fn configure_container<S, B, F>(name: impl Into<String>, f: F) -> Self
    where
        S: Send + Sync + 'static,
        B: Send + 'static,
        F: Fn(&S, &mut B) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self::instance::<S>(name)
            .param::<B>("builder")
            .invoke_on(move |this: &S, args| {
                f(this, args.get_mut::<B>(0)?)?;
                Ok(Returned::Unit)
            })
    }

    /// `fn name(&self, app: &mut ApplicationBuilder)`.
    pub fn configure<S, F>(name: impl Into<String>, f: F) -> Self
    where
        S: Send + Sync + 'static,
        F: Fn(&S, &mut ApplicationBuilder) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self::instance::<S>(name)
            .param::<ApplicationBuilder>("app")
            .invoke_on(move |this: &S, args| {
                f(this, args.get_mut::<ApplicationBuilder>(0)?)?;
                Ok(Returned::Unit)
            })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declaring_type(&self) -> TypeTag {
        self.declaring_type
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn parameters(&self) -> &[ParameterInfo] {
        &self.parameters
    }

    pub fn return_kind(&self) -> ReturnKind {
        self.return_kind
    }

    pub fn invoke(&self, instance: Option<&Instance>, args: &mut Arguments<'_>) -> Result<Returned, BoxError> {
        let receiver = if self.is_static { None } else { instance };
        (self.invoker)(receiver, args)
    }
}

impl fmt::Debug for MethodInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodInfo")
            .field("name", &self.name)
            .field("is_static", &self.is_static)
            .field("parameters", &self.parameters)
            .field("return_kind", &self.return_kind)
            .finish()
    }
}

/// Builder for [`MethodInfo`] with arbitrary shapes.
pub struct MethodBuilder {
    name: String,
    declaring_type: TypeTag,
    is_static: bool,
    parameters: Vec<ParameterInfo>,
    return_kind: ReturnKind,
}

impl MethodBuilder {
    fn new(name: String, declaring_type: TypeTag, is_static: bool) -> Self {
        Self {
            name,
            declaring_type,
            is_static,
            parameters: Vec::new(),
            return_kind: ReturnKind::Unit,
        }
    }

    pub fn param<T: Send + 'static>(mut self, name: impl Into<String>) -> Self {
        self.parameters.push(ParameterInfo::of::<T>(name));
        self
    }

    pub fn returns<T: ?Sized + 'static>(mut self) -> Self {
        self.return_kind = ReturnKind::of::<T>();
        self
    }

    pub fn invoke<F>(self, f: F) -> MethodInfo
    where
        F: Fn(Option<&Instance>, &mut Arguments<'_>) -> Result<Returned, BoxError> + Send + Sync + 'static,
    {
        MethodInfo {
            name: self.name,
            declaring_type: self.declaring_type,
            is_static: self.is_static,
            parameters: self.parameters,
            return_kind: self.return_kind,
            invoker: Arc::new(f),
        }
    }

    /// Like [`invoke`](Self::invoke), downcasting the instance to `S` first.
    pub fn invoke_on<S, F>(self, f: F) -> MethodInfo
    where
        S: Send + Sync + 'static,
        F: Fn(&S, &mut Arguments<'_>) -> Result<Returned, BoxError> + Send + Sync + 'static,
    {
        self.invoke(move |instance, args| {
            let this = instance
                .and_then(|i| i.downcast_ref::<S>())
                .ok_or(ArgumentError::MissingInstance {
                    expected: std::any::type_name::<S>(),
                })?;
            f(this, args)
        })
    }
}

/// Explicit description of a startup type.
#[derive(Clone)]
pub struct StartupType {
    name: String,
    tag: TypeTag,
    activator: Option<Activator>,
    methods: Vec<MethodInfo>,
}

impl StartupType {
    /// A startup type whose instance must already be registered in the hosting services.
    pub fn new<S: Send + Sync + 'static>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: TypeTag::of::<S>(),
            activator: None,
            methods: Vec::new(),
        }
    }

    /// A startup type constructed with `Default` when not registered.
    pub fn with_default<S: Default + Send + Sync + 'static>(name: impl Into<String>) -> Self {
        Self::with_activator::<S, _>(name, |_| Ok(S::default()))
    }

    /// A startup type constructed from the hosting services when not registered.
    pub fn with_activator<S, F>(name: impl Into<String>, activator: F) -> Self
    where
        S: Send + Sync + 'static,
        F: Fn(&ServiceProvider) -> Result<S, BoxError> + Send + Sync + 'static,
    {
        let mut startup = Self::new::<S>(name);
        startup.activator = Some(Arc::new(move |provider: &ServiceProvider| {
            activator(provider).map(|s| Arc::new(s) as Instance)
        }));
        startup
    }

    pub fn method(mut self, method: MethodInfo) -> Self {
        self.methods.push(method);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    pub fn methods(&self) -> &[MethodInfo] {
        &self.methods
    }

    /// Get the instance from the hosting services, or create it with the activator.
    pub(crate) fn activate(&self, hosting: &ServiceProvider) -> Result<Instance, StartupError> {
        let registered = hosting.get_erased(self.tag).map_err(|e| StartupError::Activation {
            startup_type: self.name.clone(),
            source: e.into(),
        })?;
        if let Some(instance) = registered {
            return Ok(instance);
        }

        let activator = self.activator.as_ref().ok_or_else(|| StartupError::Activation {
            startup_type: self.name.clone(),
            source: "the type is not registered in the hosting services and has no activator".into(),
        })?;
        activator(hosting).map_err(|source| StartupError::Activation {
            startup_type: self.name.clone(),
            source,
        })
    }
}

impl fmt::Debug for StartupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StartupType")
            .field("name", &self.name)
            .field("methods", &self.methods)
            .finish()
    }
}
