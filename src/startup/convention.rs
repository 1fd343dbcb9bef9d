//! The two-method startup facade.
//!
//! # Responsibilities
//! - Expose `configure_services` / `configure` to the host
//! - Enforce call order: services first, then application, each exactly once
//!
//! # Design Decisions
//! - A failed phase is terminal: the registry may be half-configured, so no retry
//! - The state lock is not held while user code runs; a phase in flight is
//!   marked `InProgress` and any re-entrant call is rejected

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::hosting::ApplicationBuilder;
use crate::observability::metrics;
use crate::services::{ServiceCollection, ServiceProvider};
use crate::startup::error::StartupError;
use crate::startup::loader::{StartupLoader, StartupMethods};
use crate::startup::types::StartupType;

/// Contract the host invokes during bootstrap.
pub trait Startup: Send + Sync {
    /// Configure the application services. `Some` replaces the provider the host would build.
    fn configure_services(&self, services: &mut ServiceCollection) -> Result<Option<ServiceProvider>, StartupError>;

    fn configure(&self, app: &mut ApplicationBuilder) -> Result<(), StartupError>;
}

/// Per-process startup state. No back transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupState {
    Unresolved,
    Resolving,
    Resolved,
    ServicesConfigured,
    ApplicationConfigured,
    /// A phase is currently running.
    InProgress,
    /// A phase failed. Terminal.
    Failed,
}

/// [`Startup`] backed by convention-resolved methods.
pub struct ConventionStartup {
    methods: StartupMethods,
    state: Mutex<StartupState>,
}

impl ConventionStartup {
    pub fn new(methods: StartupMethods) -> Self {
        Self {
            methods,
            state: Mutex::new(StartupState::Resolved),
        }
    }

    /// Resolve `startup` for `environment` and wrap the result.
    pub fn load(hosting: &ServiceProvider, startup: &StartupType, environment: &str) -> Result<Self, StartupError> {
        tracing::debug!(startup = startup.name(), environment, state = ?StartupState::Resolving, "Resolving startup");
        match StartupLoader::load_methods(hosting, startup, environment) {
            Ok(methods) => {
                metrics::record_phase("resolve", "ok");
                Ok(Self::new(methods))
            }
            Err(e) => {
                metrics::record_phase("resolve", "error");
                tracing::error!(startup = startup.name(), environment, error = %e, "Startup resolution failed");
                Err(e)
            }
        }
    }

    pub fn state(&self) -> StartupState {
        *self.lock_state()
    }

    pub fn methods(&self) -> &StartupMethods {
        &self.methods
    }

    fn advance<T>(
        &self,
        phase: &'static str,
        expected: StartupState,
        next: StartupState,
        body: impl FnOnce() -> Result<T, StartupError>,
    ) -> Result<T, StartupError> {
        {
            let mut state = self.lock_state();
            if *state != expected {
                return Err(StartupError::InvalidState {
                    expected,
                    actual: *state,
                });
            }
            *state = StartupState::InProgress;
        }

        let result = body();
        let mut state = self.lock_state();
        match &result {
            Ok(_) => {
                *state = next;
                metrics::record_phase(phase, "ok");
                tracing::info!(phase, state = ?next, "Startup phase completed");
            }
            Err(e) => {
                *state = StartupState::Failed;
                metrics::record_phase(phase, "error");
                tracing::error!(phase, error = %e, "Startup phase failed");
            }
        }
        result
    }

    fn lock_state(&self) -> MutexGuard<'_, StartupState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Startup for ConventionStartup {
    fn configure_services(&self, services: &mut ServiceCollection) -> Result<Option<ServiceProvider>, StartupError> {
        self.advance(
            "configure_services",
            StartupState::Resolved,
            StartupState::ServicesConfigured,
            || self.methods.configure_services(services),
        )
    }

    fn configure(&self, app: &mut ApplicationBuilder) -> Result<(), StartupError> {
        self.advance(
            "configure",
            StartupState::ServicesConfigured,
            StartupState::ApplicationConfigured,
            || self.methods.configure(app),
        )
    }
}

impl fmt::Debug for ConventionStartup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConventionStartup")
            .field("state", &self.state())
            .field("methods", &self.methods)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hosting::HostEnvironment;
    use crate::startup::types::MethodInfo;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Sample;

    fn loaded() -> ConventionStartup {
        let startup = StartupType::with_default::<Sample>("Sample")
            .method(MethodInfo::configure::<Sample, _>("Configure", |_, _| Ok(())));
        ConventionStartup::load(&ServiceCollection::new().build_service_provider(), &startup, "Production").unwrap()
    }

    fn app() -> ApplicationBuilder {
        ApplicationBuilder::new(
            ServiceCollection::new().build_service_provider(),
            HostEnvironment::new("Production", "Tests"),
        )
    }

    #[test]
    fn test_state_machine_happy_path() {
        let startup = loaded();
        assert_eq!(startup.state(), StartupState::Resolved);

        startup.configure_services(&mut ServiceCollection::new()).unwrap();
        assert_eq!(startup.state(), StartupState::ServicesConfigured);

        startup.configure(&mut app()).unwrap();
        assert_eq!(startup.state(), StartupState::ApplicationConfigured);
    }

    #[test]
    fn test_out_of_order_calls_rejected() {
        let startup = loaded();
        let err = startup.configure(&mut app()).unwrap_err();
        assert!(matches!(
            err,
            StartupError::InvalidState {
                expected: StartupState::ServicesConfigured,
                actual: StartupState::Resolved
            }
        ));

        startup.configure_services(&mut ServiceCollection::new()).unwrap();
        let err = startup.configure_services(&mut ServiceCollection::new()).unwrap_err();
        assert!(matches!(err, StartupError::InvalidState { .. }));
    }

    #[test]
    fn test_failed_phase_is_terminal() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();
        let startup = StartupType::with_default::<Sample>("Sample")
            .method(MethodInfo::configure::<Sample, _>("Configure", |_, _| Ok(())))
            .method(MethodInfo::configure_services::<Sample, _>("ConfigureServices", move |_, services| {
                counted.fetch_add(1, Ordering::SeqCst);
                services.add_singleton(1u8);
                Err("registration failed".into())
            }));
        let startup =
            ConventionStartup::load(&ServiceCollection::new().build_service_provider(), &startup, "Production").unwrap();

        let mut services = ServiceCollection::new();
        assert!(startup.configure_services(&mut services).is_err());
        assert_eq!(startup.state(), StartupState::Failed);

        let err = startup.configure_services(&mut services).unwrap_err();
        assert!(matches!(
            err,
            StartupError::InvalidState {
                expected: StartupState::Resolved,
                actual: StartupState::Failed
            }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(services.len(), 1);
        assert!(startup.configure(&mut app()).is_err());
    }

    #[test]
    fn test_failed_configure_is_terminal() {
        let startup = StartupType::with_default::<Sample>("Sample")
            .method(MethodInfo::configure::<Sample, _>("Configure", |_, _| Err("nope".into())));
        let startup =
            ConventionStartup::load(&ServiceCollection::new().build_service_provider(), &startup, "Production").unwrap();

        startup.configure_services(&mut ServiceCollection::new()).unwrap();
        assert!(startup.configure(&mut app()).is_err());
        assert_eq!(startup.state(), StartupState::Failed);
        assert!(matches!(
            startup.configure(&mut app()).unwrap_err(),
            StartupError::InvalidState { actual: StartupState::Failed, .. }
        ));
    }

    #[test]
    fn test_reentrant_call_is_rejected_without_deadlock() {
        let slot: Arc<Mutex<Option<Arc<dyn Startup>>>> = Arc::new(Mutex::new(None));
        let inner = slot.clone();
        let startup = StartupType::with_default::<Sample>("Sample").method(MethodInfo::configure::<Sample, _>(
            "Configure",
            move |_, app| {
                let facade = inner.lock().unwrap().clone().ok_or("facade not set")?;
                match facade.configure(app) {
                    Err(StartupError::InvalidState {
                        actual: StartupState::InProgress,
                        ..
                    }) => Ok(()),
                    other => Err(format!("unexpected re-entrant result: {other:?}").into()),
                }
            },
        ));
        let startup: Arc<dyn Startup> =
            Arc::new(ConventionStartup::load(&ServiceCollection::new().build_service_provider(), &startup, "Production").unwrap());
        *slot.lock().unwrap() = Some(startup.clone());

        startup.configure_services(&mut ServiceCollection::new()).unwrap();
        startup.configure(&mut app()).unwrap();
    }
}
