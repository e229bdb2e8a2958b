//! Store configuration via `mlmdstore.toml`
//!
//! A default `mlmdstore.toml` can be written next to the process on first
//! start. To change settings, edit the file and restart.

use mlmd_core::{Result, TrackingError, SEARCH_MAX_RESULTS_DEFAULT, SEARCH_MAX_RESULTS_THRESHOLD};
use mlmd_graph::CallOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::identity::DEFAULT_RUN_CACHE_CAPACITY;
use std::time::Duration;

/// Config file name.
pub const CONFIG_FILE_NAME: &str = "mlmdstore.toml";

/// Default metadata service host (in-cluster service name).
pub const DEFAULT_SERVICE_HOST: &str = "metadata-grpc-service.kubeflow";

/// Default metadata service port.
pub const DEFAULT_SERVICE_PORT: u16 = 8080;

/// Location of the metadata service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    DEFAULT_SERVICE_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_SERVICE_PORT
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServiceConfig {
    /// `host:port` address
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Store configuration loaded from `mlmdstore.toml`.
///
/// # Example
///
/// ```toml
/// timeout_ms = 5000
/// max_retries = 2
///
/// [service]
/// host = "metadata-grpc-service.kubeflow"
/// port = 8080
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreConfig {
    /// Deadline for every graph call, in milliseconds (default: 5000).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Extra attempts for idempotent graph calls (default: 2).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Largest page a search may request (default: 50000).
    #[serde(default = "default_threshold")]
    pub search_max_results_threshold: usize,
    /// Page size when the caller passes none (default: 1000).
    #[serde(default = "default_max_results")]
    pub default_max_results: usize,
    /// Base URI under which experiment artifact locations are derived.
    #[serde(default = "default_artifact_root")]
    pub artifact_root: String,
    /// Run handles kept in the identity cache (default: 10000).
    #[serde(default = "default_run_cache_capacity")]
    pub run_cache_capacity: usize,
    /// Metadata service endpoint.
    #[serde(default)]
    pub service: ServiceConfig,
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_max_retries() -> u32 {
    2
}

fn default_threshold() -> usize {
    SEARCH_MAX_RESULTS_THRESHOLD
}

fn default_max_results() -> usize {
    SEARCH_MAX_RESULTS_DEFAULT
}

fn default_run_cache_capacity() -> usize {
    DEFAULT_RUN_CACHE_CAPACITY
}

fn default_artifact_root() -> String {
    "./mlruns".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            search_max_results_threshold: default_threshold(),
            default_max_results: default_max_results(),
            artifact_root: default_artifact_root(),
            run_cache_capacity: default_run_cache_capacity(),
            service: ServiceConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Options attached to every graph call.
    pub fn call_options(&self) -> CallOptions {
        CallOptions::with_timeout(Duration::from_millis(self.timeout_ms))
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` for a zero timeout, threshold or cache
    /// capacity, or for a default page size above the threshold.
    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(TrackingError::invalid_parameter(
                "timeout_ms must be greater than zero",
            ));
        }
        if self.search_max_results_threshold == 0 {
            return Err(TrackingError::invalid_parameter(
                "search_max_results_threshold must be greater than zero",
            ));
        }
        if self.run_cache_capacity == 0 {
            return Err(TrackingError::invalid_parameter(
                "run_cache_capacity must be greater than zero",
            ));
        }
        if self.default_max_results == 0
            || self.default_max_results > self.search_max_results_threshold
        {
            return Err(TrackingError::invalid_parameter(format!(
                "default_max_results must be between 1 and {}, got {}",
                self.search_max_results_threshold, self.default_max_results
            )));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# mlmdstore configuration
#
# Deadline for each call to the metadata service, in milliseconds.
timeout_ms = 5000

# Extra attempts for idempotent calls after a transport failure.
# Metric appends are never retried.
max_retries = 2

# Largest page a search may request, and the page size used when none is given.
search_max_results_threshold = 50000
default_max_results = 1000

# Experiments created without an artifact location get "<artifact_root>/<experiment_id>".
artifact_root = "./mlruns"

# Run handles cached in memory. A miss is looked up in the metadata service.
run_cache_capacity = 10000

[service]
host = "metadata-grpc-service.kubeflow"
port = 8080
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TrackingError::internal(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: StoreConfig = toml::from_str(&content).map_err(|e| {
            TrackingError::invalid_parameter(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                TrackingError::internal(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| TrackingError::internal(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            TrackingError::internal(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}
