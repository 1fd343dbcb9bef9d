//! Application builder handed to `Configure`.

use std::collections::HashMap;

use crate::hosting::HostEnvironment;
use crate::services::ServiceProvider;

/// What `Configure` receives: the application services plus a property bag
/// the application can use to record how it was configured.
#[derive(Debug, Clone)]
pub struct ApplicationBuilder {
    application_services: ServiceProvider,
    environment: HostEnvironment,
    properties: HashMap<String, String>,
}

impl ApplicationBuilder {
    pub fn new(application_services: ServiceProvider, environment: HostEnvironment) -> Self {
        Self {
            application_services,
            environment,
            properties: HashMap::new(),
        }
    }

    pub fn application_services(&self) -> &ServiceProvider {
        &self.application_services
    }

    pub fn environment(&self) -> &HostEnvironment {
        &self.environment
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }
}
