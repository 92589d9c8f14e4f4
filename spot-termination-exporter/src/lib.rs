use failure::Error;
use log::debug;
use prometheus::Registry;

pub mod collector;
pub mod config;
pub mod error;
pub mod metrics;
pub mod server;

use crate::collector::TerminationCollector;
use crate::config::ExporterConfig;
use crate::error::ExporterError;

/// Creates a registry holding a termination collector for the configured metadata endpoint.
pub fn registry(config: &ExporterConfig) -> Result<Registry, Error> {
    let registry = Registry::new();
    let collector = TerminationCollector::with_endpoint(&config.metadata.endpoint);
    registry
        .register(Box::new(collector))
        .map_err(|e| ExporterError::FailedRegistration(e.to_string()))?;
    debug!("Registered termination collector for '{}'.", config.metadata.endpoint);

    Ok(registry)
}
