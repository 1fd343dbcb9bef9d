//! Method resolution by naming convention.
//!
//! This is the only place that looks at method names. Everything downstream
//! works with [`MethodBinding`]s.

use std::fmt;

use crate::observability::metrics;
use crate::startup::error::StartupError;
use crate::startup::types::{MethodInfo, ReturnKind, StartupType};

/// The three conventional startup roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodRole {
    ConfigureServices,
    ConfigureContainer,
    Configure,
}

impl MethodRole {
    pub const ALL: [MethodRole; 3] = [
        MethodRole::Configure,
        MethodRole::ConfigureServices,
        MethodRole::ConfigureContainer,
    ];

    /// Method name for `environment`; an empty environment gives the generic name.
    pub fn method_name(&self, environment: &str) -> String {
        match self {
            MethodRole::ConfigureServices => format!("Configure{environment}Services"),
            MethodRole::ConfigureContainer => format!("Configure{environment}Container"),
            MethodRole::Configure => format!("Configure{environment}"),
        }
    }

    /// Only `Configure` must exist.
    pub fn is_required(&self) -> bool {
        matches!(self, MethodRole::Configure)
    }

    pub fn accepts_return(&self, kind: ReturnKind) -> bool {
        match self {
            MethodRole::ConfigureServices => matches!(kind, ReturnKind::Unit | ReturnKind::Provider),
            MethodRole::ConfigureContainer | MethodRole::Configure => kind == ReturnKind::Unit,
        }
    }

    pub(crate) fn label(&self) -> &'static str {
        match self {
            MethodRole::ConfigureServices => "configure_services",
            MethodRole::ConfigureContainer => "configure_container",
            MethodRole::Configure => "configure",
        }
    }
}

impl fmt::Display for MethodRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MethodRole::ConfigureServices => "ConfigureServices",
            MethodRole::ConfigureContainer => "ConfigureContainer",
            MethodRole::Configure => "Configure",
        };
        f.write_str(name)
    }
}

/// Result of resolving one role. Consumed by the matching pipeline builder.
#[derive(Debug, Clone)]
pub struct MethodBinding {
    role: MethodRole,
    method: Option<MethodInfo>,
}

impl MethodBinding {
    /// A binding with no method. Valid for optional roles only.
    pub fn unbound(role: MethodRole) -> Self {
        Self { role, method: None }
    }

    pub(crate) fn bound(role: MethodRole, method: MethodInfo) -> Self {
        Self {
            role,
            method: Some(method),
        }
    }

    pub fn role(&self) -> MethodRole {
        self.role
    }

    pub fn method(&self) -> Option<&MethodInfo> {
        self.method.as_ref()
    }

    pub fn into_method(self) -> Option<MethodInfo> {
        self.method
    }

    pub fn is_bound(&self) -> bool {
        self.method.is_some()
    }

    pub fn is_static(&self) -> bool {
        self.method.as_ref().is_some_and(|m| m.is_static())
    }

    /// True when the bound method needs a startup instance.
    pub fn requires_instance(&self) -> bool {
        self.method.as_ref().is_some_and(|m| !m.is_static())
    }
}

/// Bindings for all three roles of one startup type.
#[derive(Debug, Clone)]
pub struct ResolvedMethods {
    pub configure: MethodBinding,
    pub configure_services: MethodBinding,
    pub configure_container: MethodBinding,
}

impl ResolvedMethods {
    pub fn requires_instance(&self) -> bool {
        self.configure.requires_instance()
            || self.configure_services.requires_instance()
            || self.configure_container.requires_instance()
    }
}

/// Find the method for `role` on `startup`, preferring the environment-specific name.
pub fn find_method(startup: &StartupType, role: MethodRole, environment: &str) -> Result<MethodBinding, StartupError> {
    let with_environment = role.method_name(environment);
    let without_environment = role.method_name("");

    let mut levels = vec![with_environment.as_str()];
    if !with_environment.eq_ignore_ascii_case(&without_environment) {
        levels.push(without_environment.as_str());
    }

    for name in levels {
        let wanted = name.to_lowercase();
        let matches: Vec<&MethodInfo> = startup
            .methods()
            .iter()
            .filter(|m| m.name().to_lowercase() == wanted)
            .collect();

        let method = match matches.as_slice() {
            [] => continue,
            [method] => *method,
            _ => {
                return Err(StartupError::AmbiguousMethod {
                    role,
                    method: name.to_string(),
                    declaring_type: startup.name().to_string(),
                    count: matches.len(),
                })
            }
        };

        if !role.accepts_return(method.return_kind()) {
            if role.is_required() {
                return Err(StartupError::invalid_signature(
                    role,
                    method.name(),
                    startup.name(),
                    format!("must not return a value, found '{}'", method.return_kind()),
                ));
            }
            tracing::debug!(
                role = %role,
                method = method.name(),
                return_kind = %method.return_kind(),
                "Ignoring method with unsupported return type"
            );
            continue;
        }

        tracing::debug!(role = %role, method = method.name(), environment, "Startup method resolved");
        metrics::record_method_resolved(role.label());
        return Ok(MethodBinding::bound(role, method.clone()));
    }

    if role.is_required() {
        return Err(StartupError::MissingRequiredMethod {
            role,
            with_environment,
            without_environment,
            declaring_type: startup.name().to_string(),
        });
    }
    Ok(MethodBinding::unbound(role))
}

/// Resolve all three roles. `Configure` is resolved first so a missing one fails fast.
pub fn resolve_methods(startup: &StartupType, environment: &str) -> Result<ResolvedMethods, StartupError> {
    Ok(ResolvedMethods {
        configure: find_method(startup, MethodRole::Configure, environment)?,
        configure_services: find_method(startup, MethodRole::ConfigureServices, environment)?,
        configure_container: find_method(startup, MethodRole::ConfigureContainer, environment)?,
    })
}

/// A named set of startup types to choose from by environment.
#[derive(Debug, Clone)]
pub struct StartupCatalog {
    name: String,
    types: Vec<StartupType>,
}

impl StartupCatalog {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            types: Vec::new(),
        }
    }

    pub fn with(mut self, startup: StartupType) -> Self {
        self.types.push(startup);
        self
    }

    pub fn register(&mut self, startup: StartupType) -> &mut Self {
        self.types.push(startup);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Find `Startup{environment}`, then `Startup`.
    ///
    /// A type matches by its own name or by `{catalog}.{name}`. Exact matches are
    /// tried before case-insensitive ones.
    pub fn find_startup_type(&self, environment: &str) -> Result<&StartupType, StartupError> {
        if self.name.trim().is_empty() {
            return Err(StartupError::EmptyCatalogName);
        }

        let with_environment = format!("Startup{environment}");
        let without_environment = "Startup".to_string();

        for name in [&with_environment, &without_environment] {
            let qualified = format!("{}.{}", self.name, name);
            let exact = self
                .types
                .iter()
                .find(|t| t.name() == name.as_str() || t.name() == qualified);
            let found = exact.or_else(|| {
                self.types
                    .iter()
                    .find(|t| t.name().eq_ignore_ascii_case(name) || t.name().eq_ignore_ascii_case(&qualified))
            });
            if let Some(startup) = found {
                tracing::debug!(catalog = %self.name, startup = startup.name(), environment, "Startup type found");
                return Ok(startup);
            }
        }

        Err(StartupError::StartupTypeNotFound {
            with_environment,
            without_environment,
            catalog: self.name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{ServiceCollection, ServiceProvider};
    use crate::startup::types::Returned;

    #[derive(Default)]
    struct Sample;

    fn configure(name: &str) -> MethodInfo {
        MethodInfo::configure::<Sample, _>(name, |_, _| Ok(()))
    }

    fn services(name: &str) -> MethodInfo {
        MethodInfo::configure_services::<Sample, _>(name, |_, _| Ok(()))
    }

    #[test]
    fn test_method_names() {
        assert_eq!(MethodRole::Configure.method_name("Development"), "ConfigureDevelopment");
        assert_eq!(MethodRole::ConfigureServices.method_name("Staging"), "ConfigureStagingServices");
        assert_eq!(MethodRole::ConfigureContainer.method_name(""), "ConfigureContainer");
    }

    #[test]
    fn test_environment_specific_wins() {
        let startup = StartupType::with_default::<Sample>("Sample")
            .method(configure("Configure"))
            .method(configure("ConfigureDevelopment"));

        let dev = find_method(&startup, MethodRole::Configure, "Development").unwrap();
        assert_eq!(dev.method().unwrap().name(), "ConfigureDevelopment");

        let prod = find_method(&startup, MethodRole::Configure, "Production").unwrap();
        assert_eq!(prod.method().unwrap().name(), "Configure");
    }

    #[test]
    fn test_case_insensitive_match() {
        let startup = StartupType::with_default::<Sample>("Sample").method(configure("configuredevelopment"));
        let binding = find_method(&startup, MethodRole::Configure, "Development").unwrap();
        assert_eq!(binding.method().unwrap().name(), "configuredevelopment");
    }

    #[test]
    fn test_ambiguity_does_not_fall_back() {
        let startup = StartupType::with_default::<Sample>("Sample")
            .method(services("ConfigureServices"))
            .method(services("ConfigureDevelopmentServices"))
            .method(services("configureDevelopmentServices"));

        let err = find_method(&startup, MethodRole::ConfigureServices, "Development").unwrap_err();
        assert!(matches!(err, StartupError::AmbiguousMethod { count: 2, .. }));
    }

    #[test]
    fn test_missing_required_and_optional() {
        let startup = StartupType::with_default::<Sample>("Sample");
        let err = find_method(&startup, MethodRole::Configure, "Development").unwrap_err();
        assert!(matches!(
            err,
            StartupError::MissingRequiredMethod { ref with_environment, ref without_environment, .. }
                if with_environment == "ConfigureDevelopment" && without_environment == "Configure"
        ));

        let binding = find_method(&startup, MethodRole::ConfigureServices, "Development").unwrap();
        assert!(!binding.is_bound());
        assert!(!binding.requires_instance());
    }

    #[test]
    fn test_return_violation_falls_back_for_optional_role() {
        let bad = MethodInfo::instance::<Sample>("ConfigureDevelopmentContainer")
            .param::<ServiceCollection>("builder")
            .returns::<u32>()
            .invoke(|_, _| Ok(Returned::Value(Box::new(1u32))));
        let good = MethodInfo::configure_container::<Sample, ServiceCollection, _>("ConfigureContainer", |_, _| Ok(()));
        let startup = StartupType::with_default::<Sample>("Sample").method(bad.clone()).method(good);

        let binding = find_method(&startup, MethodRole::ConfigureContainer, "Development").unwrap();
        assert_eq!(binding.method().unwrap().name(), "ConfigureContainer");

        let only_bad = StartupType::with_default::<Sample>("Sample").method(bad);
        let binding = find_method(&only_bad, MethodRole::ConfigureContainer, "Development").unwrap();
        assert!(!binding.is_bound());
    }

    #[test]
    fn test_return_violation_is_fatal_for_configure() {
        let bad = MethodInfo::instance::<Sample>("Configure")
            .returns::<Option<ServiceProvider>>()
            .invoke(|_, _| Ok(Returned::Provider(None)));
        let startup = StartupType::with_default::<Sample>("Sample").method(bad);

        let err = find_method(&startup, MethodRole::Configure, "").unwrap_err();
        assert!(matches!(err, StartupError::InvalidSignature { role: MethodRole::Configure, .. }));
    }

    #[test]
    fn test_resolve_methods_tracks_instance_need() {
        let static_configure = MethodInfo::static_method::<Sample>("Configure").invoke(|_, _| Ok(Returned::Unit));
        let startup = StartupType::new::<Sample>("Sample").method(static_configure);

        let resolved = resolve_methods(&startup, "Production").unwrap();
        assert!(resolved.configure.is_static());
        assert!(!resolved.requires_instance());

        let startup = startup.method(services("ConfigureServices"));
        assert!(resolve_methods(&startup, "Production").unwrap().requires_instance());
    }

    #[test]
    fn test_catalog_lookup_order() {
        let catalog = StartupCatalog::new("App")
            .with(StartupType::with_default::<Sample>("Startup"))
            .with(StartupType::with_default::<Sample>("App.StartupDevelopment"));

        assert_eq!(catalog.find_startup_type("Development").unwrap().name(), "App.StartupDevelopment");
        assert_eq!(catalog.find_startup_type("development").unwrap().name(), "App.StartupDevelopment");
        assert_eq!(catalog.find_startup_type("Production").unwrap().name(), "Startup");
    }

    #[test]
    fn test_catalog_errors() {
        let err = StartupCatalog::new("  ").find_startup_type("Production").unwrap_err();
        assert!(matches!(err, StartupError::EmptyCatalogName));

        let catalog = StartupCatalog::new("App").with(StartupType::with_default::<Sample>("Program"));
        let err = catalog.find_startup_type("Staging").unwrap_err();
        assert!(matches!(err, StartupError::StartupTypeNotFound { ref with_environment, .. } if with_environment == "StartupStaging"));
    }
}
