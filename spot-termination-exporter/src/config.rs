use std::net::SocketAddr;

use clams::config::*;
use clams_derive::Config;
use failure::Error;
use log::debug;
use serde_derive::{Deserialize, Serialize};

use crate::error::ExporterError;

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:9189";
pub const DEFAULT_METRICS_PATH: &str = "/metrics";
pub const DEFAULT_METADATA_ENDPOINT: &str = "http://169.254.169.254/latest/meta-data/";

#[derive(Config, PartialEq, Deserialize, Serialize, Debug, Default, Clone)]
pub struct ExporterConfig {
    #[serde(default)]
    pub listen: ListenConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
}

#[derive(PartialEq, Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct ListenConfig {
    pub bind_address: String,
    pub metrics_path: String,
}

impl Default for ListenConfig {
    fn default() -> Self {
        ListenConfig {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            metrics_path: DEFAULT_METRICS_PATH.to_string(),
        }
    }
}

#[derive(PartialEq, Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct MetadataConfig {
    pub endpoint: String,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        MetadataConfig {
            endpoint: DEFAULT_METADATA_ENDPOINT.to_string(),
        }
    }
}

/// Values given on the command line; each one replaces the corresponding config file value.
#[derive(Debug, Default)]
pub struct ConfigOverrides {
    pub bind_address:      Option<String>,
    pub metrics_path:      Option<String>,
    pub metadata_endpoint: Option<String>,
}

impl ExporterConfig {
    /// Loads the config file, if any, applies the overrides and validates the result.
    // `Path` is in scope through the `Config` derive.
    pub fn load<P: AsRef<Path>>(file: Option<P>, overrides: ConfigOverrides) -> Result<ExporterConfig, Error> {
        let config = match file {
            Some(file) => {
                let config = ExporterConfig::from_file(file.as_ref())
                    // clams' error is not Send, so it cannot be carried as cause
                    .map_err(|e| ExporterError::FailedConfig(e.to_string()))?;
                debug!("Loaded configuration from file {:?}.", file.as_ref());
                config
            }
            None => ExporterConfig::default(),
        };

        let config = config.with_overrides(overrides);
        config.validate()?;
        debug!("Using configuration = {:?}.", &config);

        Ok(config)
    }

    pub fn with_overrides(self, overrides: ConfigOverrides) -> ExporterConfig {
        let listen = ListenConfig {
            bind_address: overrides.bind_address.unwrap_or(self.listen.bind_address),
            metrics_path: overrides.metrics_path.unwrap_or(self.listen.metrics_path),
        };
        let metadata = MetadataConfig {
            endpoint: overrides.metadata_endpoint.unwrap_or(self.metadata.endpoint),
        };

        ExporterConfig { listen, metadata }
    }

    pub fn validate(&self) -> Result<(), ExporterError> {
        self.bind_address()?;

        let path = &self.listen.metrics_path;
        if !path.starts_with('/') || path == "/" {
            return Err(ExporterError::InvalidConfig(format!(
                "metrics path '{}' must start with '/' and must not be '/'",
                path
            )));
        }

        let endpoint = &self.metadata.endpoint;
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ExporterError::InvalidConfig(format!(
                "metadata endpoint '{}' is not an http(s) URL",
                endpoint
            )));
        }

        Ok(())
    }

    pub fn bind_address(&self) -> Result<SocketAddr, ExporterError> {
        self.listen.bind_address.parse().map_err(|e| {
            ExporterError::InvalidConfig(format!("bind address '{}' is invalid: {}", self.listen.bind_address, e))
        })
    }
}
