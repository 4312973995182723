//! Pipeline configuration loaded from YAML.
//!
//! Container URLs support environment variable interpolation so the same
//! config file can be promoted across environments.

mod vars;

use serde::Deserialize;
use snafu::prelude::*;
use std::path::Path;

use crate::error::{
    ConfigError, EmptyContainerUrlSnafu, EnvInterpolationSnafu, ReadFileSnafu, YamlParseSnafu,
};
use crate::storage::RetryPolicy;

pub use vars::interpolate;

fn default_poll_interval_secs() -> u64 {
    60
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// The five containers the pipeline reads and writes.
    pub containers: Containers,

    /// Seconds to sleep between polling iterations.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Retry policy applied to storage requests.
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Prometheus metrics exporter settings.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// URLs for each container the pipeline uses.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Containers {
    /// Incoming batch files land here and are consumed on success.
    pub landing_zone: String,
    /// Rejected rows are written here as timestamped artifacts.
    pub quarantine: String,
    /// Partitioned canonical dataset.
    pub data: String,
    /// Standalone deletion request files.
    pub deletion_requests: String,
    /// Execution and deletion audit logs.
    pub logs: String,
}

/// Prometheus metrics exporter settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Whether to start the exporter.
    #[serde(default)]
    pub enabled: bool,
    /// Listen address, e.g. `0.0.0.0:9090`.
    #[serde(default = "default_metrics_address")]
    pub address: String,
}

fn default_metrics_address() -> String {
    "0.0.0.0:9090".to_string()
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: default_metrics_address(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file, interpolating environment
    /// variables before parsing.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .context(ReadFileSnafu)?;
        Self::parse(&raw)
    }

    /// Parse configuration from a YAML string.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let interpolated = vars::interpolate(raw);
        ensure!(
            interpolated.is_ok(),
            EnvInterpolationSnafu {
                message: interpolated.errors.join("\n"),
            }
        );

        let config: Config = serde_yaml::from_str(&interpolated.text).context(YamlParseSnafu)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let urls = [
            ("landing_zone", &self.containers.landing_zone),
            ("quarantine", &self.containers.quarantine),
            ("data", &self.containers.data),
            ("deletion_requests", &self.containers.deletion_requests),
            ("logs", &self.containers.logs),
        ];

        for (name, url) in urls {
            ensure!(!url.trim().is_empty(), EmptyContainerUrlSnafu { name });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r"
containers:
  landing_zone: /tmp/labflow/landing
  quarantine: /tmp/labflow/quarantine
  data: /tmp/labflow/data
  deletion_requests: /tmp/labflow/deletions
  logs: /tmp/labflow/logs
";

    #[test]
    fn test_minimal_config_defaults() {
        let config = Config::parse(MINIMAL).unwrap();
        assert_eq!(config.poll_interval_secs, 60);
        assert_eq!(config.retry.max_attempts, 3);
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn test_full_config() {
        let raw = r"
containers:
  landing_zone: https://labresults.blob.core.windows.net/landing-zone
  quarantine: https://labresults.blob.core.windows.net/quarantine
  data: https://labresults.blob.core.windows.net/data
  deletion_requests: https://labresults.blob.core.windows.net/deletion-requests
  logs: https://labresults.blob.core.windows.net/logs
poll_interval_secs: 300
retry:
  max_attempts: 5
  initial_backoff_ms: 250
  max_backoff_ms: 10000
metrics:
  enabled: true
  address: 127.0.0.1:9464
";
        let config = Config::parse(raw).unwrap();
        assert_eq!(config.poll_interval_secs, 300);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_backoff_ms, 250);
        assert!(config.metrics.enabled);
        assert_eq!(config.metrics.address, "127.0.0.1:9464");
    }

    #[test]
    fn test_empty_container_url_rejected() {
        let raw = MINIMAL.replace("/tmp/labflow/data", "  ");
        let err = Config::parse(&raw).unwrap_err();
        assert!(err.to_string().contains("data"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let raw = format!("{MINIMAL}unknown_field: true\n");
        assert!(Config::parse(&raw).is_err());
    }

    #[test]
    fn test_missing_env_var_is_an_error() {
        let raw = MINIMAL.replace(
            "/tmp/labflow/landing",
            "${LABFLOW_TEST_NO_SUCH_VAR_CONFIG}",
        );
        let err = Config::parse(&raw).unwrap_err();
        assert!(err
            .to_string()
            .contains("LABFLOW_TEST_NO_SUCH_VAR_CONFIG"));
    }
}
