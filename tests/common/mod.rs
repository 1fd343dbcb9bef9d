//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use startup_host::hosting::{ApplicationBuilder, HostEnvironment};
use startup_host::services::{ServiceCollection, ServiceProvider};
use startup_host::startup::{ServicesAction, ServicesFilter};

/// Ordered record of events, shared between filters and startup methods.
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// A services filter that records `{name}-pre` / `{name}-post` around `next`.
pub fn recording_services_filter(log: &EventLog, name: &'static str) -> impl ServicesFilter {
    let log = log.clone();
    move |next: ServicesAction| -> ServicesAction {
        let log = log.clone();
        Box::new(move |services: &mut ServiceCollection| {
            log.push(format!("{name}-pre"));
            next(services)?;
            log.push(format!("{name}-post"));
            Ok(())
        })
    }
}

pub fn empty_hosting() -> ServiceProvider {
    ServiceCollection::new().build_service_provider()
}

pub fn app_builder(services: ServiceProvider, environment: &str) -> ApplicationBuilder {
    ApplicationBuilder::new(services, HostEnvironment::new(environment, "IntegrationTests"))
}
