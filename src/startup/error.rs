//! Startup error taxonomy.

use thiserror::Error;

use crate::services::ResolveError;
use crate::startup::convention::StartupState;
use crate::startup::resolver::MethodRole;
use crate::BoxError;

/// Errors raised while resolving, building or invoking startup methods.
///
/// Every variant is fatal for bootstrap: the host aborts startup and nothing is retried.
#[derive(Debug, Error)]
pub enum StartupError {
    /// The required `Configure` method exists under neither naming level.
    #[error("A public method named '{with_environment}' or '{without_environment}' could not be found in the '{declaring_type}' type")]
    MissingRequiredMethod {
        role: MethodRole,
        with_environment: String,
        without_environment: String,
        declaring_type: String,
    },

    #[error("Having multiple overloads of method '{method}' is not supported ({count} found in the '{declaring_type}' type)")]
    AmbiguousMethod {
        role: MethodRole,
        method: String,
        declaring_type: String,
        count: usize,
    },

    #[error("The '{method}' method in the type '{declaring_type}' {reason}")]
    InvalidSignature {
        role: MethodRole,
        method: String,
        declaring_type: String,
        reason: String,
    },

    #[error("A {role} method that returns a service provider is not compatible with the use of one or more services filters ('{method}' in '{declaring_type}', {filters} filter(s) registered). Use a ConfigureServices method that returns nothing or a ConfigureContainer method instead")]
    ProviderFilterConflict {
        role: MethodRole,
        method: String,
        declaring_type: String,
        filters: usize,
    },

    #[error("Container builder of type '{actual}' cannot be converted to '{expected}'")]
    ContainerTypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Could not resolve a service of type '{service_type}' for the parameter '{parameter}' of method '{method}' on type '{declaring_type}'")]
    DependencyResolution {
        service_type: &'static str,
        parameter: String,
        method: String,
        declaring_type: String,
        #[source]
        source: ResolveError,
    },

    /// User code inside a startup method failed.
    #[error("The {role} method '{method}' on type '{declaring_type}' failed: {source}")]
    Invocation {
        role: MethodRole,
        method: String,
        declaring_type: String,
        #[source]
        source: BoxError,
    },

    #[error("Could not obtain an instance of startup type '{startup_type}': {source}")]
    Activation {
        startup_type: String,
        #[source]
        source: BoxError,
    },

    #[error("No service provider factory is registered for container builder '{container}'")]
    MissingProviderFactory { container: &'static str },

    #[error("Service provider factory for container builder '{container}' failed: {source}")]
    ProviderFactory {
        container: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("Startup filter failed: {0}")]
    Filter(#[source] BoxError),

    #[error("Startup is {actual:?}, expected {expected:?}")]
    InvalidState {
        expected: StartupState,
        actual: StartupState,
    },

    #[error("A type named '{with_environment}' or '{without_environment}' could not be found in catalog '{catalog}'")]
    StartupTypeNotFound {
        with_environment: String,
        without_environment: String,
        catalog: String,
    },

    #[error("A startup catalog name is required")]
    EmptyCatalogName,

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

impl StartupError {
    /// Wrap an error raised by a filter.
    pub fn filter(source: impl Into<BoxError>) -> Self {
        StartupError::Filter(source.into())
    }

    pub(crate) fn invalid_signature(
        role: MethodRole,
        method: &str,
        declaring_type: &str,
        reason: impl Into<String>,
    ) -> Self {
        StartupError::InvalidSignature {
            role,
            method: method.to_string(),
            declaring_type: declaring_type.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invocation(role: MethodRole, method: &str, declaring_type: &str, source: BoxError) -> Self {
        StartupError::Invocation {
            role,
            method: method.to_string(),
            declaring_type: declaring_type.to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StartupError::MissingRequiredMethod {
            role: MethodRole::Configure,
            with_environment: "ConfigureDevelopment".into(),
            without_environment: "Configure".into(),
            declaring_type: "Startup".into(),
        };
        assert_eq!(
            err.to_string(),
            "A public method named 'ConfigureDevelopment' or 'Configure' could not be found in the 'Startup' type"
        );

        let err = StartupError::ContainerTypeMismatch {
            expected: "BuilderX",
            actual: "String",
        };
        assert!(err.to_string().contains("BuilderX"));
    }

    #[test]
    fn test_invocation_keeps_source() {
        use std::error::Error as _;

        let err = StartupError::invocation(MethodRole::Configure, "Configure", "Startup", "inner".into());
        assert_eq!(err.source().map(|s| s.to_string()), Some("inner".to_string()));
    }
}
