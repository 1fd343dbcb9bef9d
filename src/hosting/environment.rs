//! Hosting environment.

use crate::config::schema::HostConfig;

/// Environment the host runs in.
///
/// Registered as a service, so startup methods can take it as a parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEnvironment {
    environment_name: String,
    application_name: String,
}

impl HostEnvironment {
    pub const DEVELOPMENT: &'static str = "Development";
    pub const STAGING: &'static str = "Staging";
    pub const PRODUCTION: &'static str = "Production";

    pub fn new(environment_name: impl Into<String>, application_name: impl Into<String>) -> Self {
        Self {
            environment_name: environment_name.into(),
            application_name: application_name.into(),
        }
    }

    pub fn from_config(config: &HostConfig) -> Self {
        Self::new(config.host.environment.clone(), config.host.application_name.clone())
    }

    pub fn environment_name(&self) -> &str {
        &self.environment_name
    }

    pub fn application_name(&self) -> &str {
        &self.application_name
    }

    /// Case-insensitive comparison with `name`.
    pub fn is_environment(&self, name: &str) -> bool {
        self.environment_name.eq_ignore_ascii_case(name)
    }

    pub fn is_development(&self) -> bool {
        self.is_environment(Self::DEVELOPMENT)
    }

    pub fn is_staging(&self) -> bool {
        self.is_environment(Self::STAGING)
    }

    pub fn is_production(&self) -> bool {
        self.is_environment(Self::PRODUCTION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_checks_ignore_case() {
        let env = HostEnvironment::new("development", "App");
        assert!(env.is_development());
        assert!(!env.is_production());
        assert!(env.is_environment("DEVELOPMENT"));
    }

    #[test]
    fn test_from_default_config() {
        let env = HostEnvironment::from_config(&HostConfig::default());
        assert!(env.is_production());
        assert_eq!(env.application_name(), "ConsoleHost");
    }
}
