//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Environment names must be usable inside startup method names
//! - Log levels must be known to the subscriber
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: HostConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the host

use std::fmt;

use crate::config::schema::HostConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub fn validate_config(config: &HostConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let environment = config.host.environment.as_str();
    if environment.trim().is_empty() {
        errors.push(ValidationError::new("host.environment", "must not be empty"));
    } else if !environment.chars().all(|c| c.is_ascii_alphanumeric()) {
        errors.push(ValidationError::new(
            "host.environment",
            format!("'{environment}' must contain only ASCII letters and digits"),
        ));
    }

    if config.host.application_name.trim().is_empty() {
        errors.push(ValidationError::new("host.application_name", "must not be empty"));
    }

    let level = config.observability.log_level.to_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level '{}'", config.observability.log_level),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&HostConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = HostConfig::default();
        config.host.environment = "Dev-1".into();
        config.host.application_name = " ".into();
        config.observability.log_level = "loud".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec!["host.environment", "host.application_name", "observability.log_level"]
        );
    }

    #[test]
    fn test_empty_environment() {
        let mut config = HostConfig::default();
        config.host.environment.clear();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].to_string(), "host.environment: must not be empty");
    }
}
