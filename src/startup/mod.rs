//! Convention-based startup subsystem.
//!
//! # Data Flow
//! ```text
//! StartupType (name, activator, MethodInfo[])
//!     → resolver.rs (Configure / ConfigureServices / ConfigureContainer, env suffix first)
//!     → MethodBinding per role
//!     → services_pipeline.rs  (services filters around ConfigureServices)
//!     → container.rs          (container filters around ConfigureContainer<B>)
//!     → configure.rs          (startup filters around Configure, scoped binding)
//!     → loader.rs             (StartupMethods: instance + two delegates)
//!     → convention.rs         (Startup facade + state machine)
//!
//! Host bootstrap:
//!     configure_services(registry) → Option<ServiceProvider>
//!     configure(app)
//! ```
//!
//! # Design Decisions
//! - Method names are only inspected by the resolver
//! - Filters are resolved from the hosting provider once, when pipelines are built
//! - Fold right: the first registered filter is the outermost
//! - Every error is fatal for bootstrap and propagates to the host

pub mod configure;
pub mod container;
pub mod convention;
pub mod error;
pub mod filters;
pub mod loader;
pub mod resolver;
pub mod services_pipeline;
pub mod types;

pub use configure::ConfigurePipeline;
pub use container::{ContainerHandle, ContainerPipeline, ContainerType};
pub use convention::{ConventionStartup, Startup, StartupState};
pub use error::StartupError;
pub use filters::{
    ConfigureAction, ContainerAction, ContainerFilter, FilterChain, ServicesAction, ServicesFilter, StartupFilter,
};
pub use loader::{StartupLoader, StartupMethods};
pub use resolver::{find_method, resolve_methods, MethodBinding, MethodRole, ResolvedMethods, StartupCatalog};
pub use services_pipeline::ServicesPipeline;
pub use types::{Arguments, ArgumentError, Instance, MethodBuilder, MethodInfo, ParameterInfo, ReturnKind, Returned, StartupType};
