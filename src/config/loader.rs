//! Configuration loading from disk.
//!
//! # Layers (later wins)
//! ```text
//! defaults
//!     → appsettings.toml
//!     → appsettings.{Environment}.toml
//!     → HOST_ENVIRONMENT / APPLICATION_NAME
//! ```

use std::fs;
use std::path::Path;

use crate::config::schema::{HostConfig, DEFAULT_ENVIRONMENT};
use crate::config::validation::{validate_config, ValidationError};

pub const BASE_FILE: &str = "appsettings.toml";
pub const ENVIRONMENT_VAR: &str = "HOST_ENVIRONMENT";
pub const APPLICATION_NAME_VAR: &str = "APPLICATION_NAME";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Values taken from the process environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    pub environment: Option<String>,
    pub application_name: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        let read = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            environment: read(ENVIRONMENT_VAR),
            application_name: read(APPLICATION_NAME_VAR),
        }
    }
}

/// Load and validate configuration from a single TOML file.
pub fn load_config(path: &Path) -> Result<HostConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: HostConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load the layered configuration from `dir`, reading overrides from the process environment.
pub fn load_layered(dir: &Path) -> Result<HostConfig, ConfigError> {
    load_layered_with(dir, &EnvOverrides::from_env())
}

/// Load the layered configuration from `dir` with explicit overrides.
///
/// Both files are optional. The environment file is chosen by the override
/// environment when present, else by the base file, else `Production`.
pub fn load_layered_with(dir: &Path, overrides: &EnvOverrides) -> Result<HostConfig, ConfigError> {
    let mut merged = read_table(&dir.join(BASE_FILE))?.unwrap_or_default();

    let environment = overrides
        .environment
        .clone()
        .or_else(|| {
            merged
                .get("host")
                .and_then(|h| h.get("environment"))
                .and_then(|e| e.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());

    let exact = dir.join(format!("appsettings.{environment}.toml"));
    let lower = dir.join(format!("appsettings.{}.toml", environment.to_lowercase()));
    let layer = match read_table(&exact)? {
        Some(layer) => Some(layer),
        None => read_table(&lower)?,
    };
    if let Some(layer) = layer {
        tracing::debug!(environment = %environment, "Applying environment configuration layer");
        merge(&mut merged, layer);
    }

    let mut config: HostConfig = toml::Value::Table(merged).try_into().map_err(ConfigError::Parse)?;
    config.host.environment = environment;
    if let Some(name) = &overrides.application_name {
        config.host.application_name = name.clone();
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn read_table(path: &Path) -> Result<Option<toml::Table>, ConfigError> {
    if !path.is_file() {
        return Ok(None);
    }
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    toml::from_str(&content).map(Some).map_err(ConfigError::Parse)
}

/// Deep merge: tables merge key by key, anything else is replaced.
fn merge(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        let merged = match (base.remove(&key), value) {
            (Some(toml::Value::Table(mut existing)), toml::Value::Table(incoming)) => {
                merge(&mut existing, incoming);
                toml::Value::Table(existing)
            }
            (_, value) => value,
        };
        base.insert(key, merged);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(dir: &Path, name: &str, content: &str) {
        let mut file = fs::File::create(dir.join(name)).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn test_no_files_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_layered_with(dir.path(), &EnvOverrides::default()).unwrap();
        assert_eq!(config, HostConfig::default());
    }

    #[test]
    fn test_environment_layer_overrides_base() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            BASE_FILE,
            "[host]\nenvironment = \"Development\"\napplication_name = \"Base\"\n[observability]\nlog_level = \"warn\"\njson = true\n",
        );
        write(dir.path(), "appsettings.Development.toml", "[observability]\nlog_level = \"debug\"\n");

        let config = load_layered_with(dir.path(), &EnvOverrides::default()).unwrap();
        assert_eq!(config.host.environment, "Development");
        assert_eq!(config.host.application_name, "Base");
        assert_eq!(config.observability.log_level, "debug");
        assert!(config.observability.json, "untouched keys survive the merge");
    }

    #[test]
    fn test_env_overrides_win() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), BASE_FILE, "[host]\nenvironment = \"Development\"\n");
        write(dir.path(), "appsettings.staging.toml", "[host]\napplication_name = \"StagingApp\"\n");

        let overrides = EnvOverrides {
            environment: Some("Staging".into()),
            application_name: None,
        };
        let config = load_layered_with(dir.path(), &overrides).unwrap();
        assert_eq!(config.host.environment, "Staging");
        assert_eq!(config.host.application_name, "StagingApp");

        let overrides = EnvOverrides {
            environment: None,
            application_name: Some("FromEnv".into()),
        };
        let config = load_layered_with(dir.path(), &overrides).unwrap();
        assert_eq!(config.host.application_name, "FromEnv");
    }

    #[test]
    fn test_parse_and_validation_errors() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), BASE_FILE, "[host\n");
        let err = load_layered_with(dir.path(), &EnvOverrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));

        write(dir.path(), BASE_FILE, "[observability]\nlog_level = \"chatty\"\n");
        let err = load_config(&dir.path().join(BASE_FILE)).unwrap_err();
        assert!(err.to_string().starts_with("Validation failed: observability.log_level"));
    }

    #[test]
    fn test_missing_single_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
