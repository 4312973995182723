//! Error types for the labflow pipeline.

use snafu::prelude::*;

// ============ Storage Errors ============

/// Errors that can occur during storage operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StorageError {
    /// Invalid storage URL format.
    #[snafu(display("Invalid storage URL: {url}"))]
    InvalidUrl { url: String },

    /// Object store operation failed.
    #[snafu(display("Storage operation failed: {source}"))]
    ObjectStore { source: object_store::Error },

    /// IO error during storage operations.
    #[snafu(display("IO error: {source}"))]
    Io { source: std::io::Error },

    /// Azure configuration error.
    #[snafu(display("Azure configuration error: {source}"))]
    AzureConfig { source: object_store::Error },

    /// Transient failure persisted through all retry attempts.
    #[snafu(display("Storage {operation} failed after {attempts} attempts: {source}"))]
    RetriesExhausted {
        operation: &'static str,
        attempts: usize,
        source: object_store::Error,
    },
}

impl StorageError {
    /// Check if this error represents a "not found" condition (404, NoSuchKey, etc.)
    pub fn is_not_found(&self) -> bool {
        match self {
            StorageError::ObjectStore { source } => {
                matches!(source, object_store::Error::NotFound { .. })
            }
            _ => false,
        }
    }
}

// ============ Config Errors ============

/// Errors that can occur during configuration parsing and validation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// A container URL is missing or empty.
    #[snafu(display("Container URL for '{name}' cannot be empty"))]
    EmptyContainerUrl { name: &'static str },

    /// Environment variable interpolation failed.
    #[snafu(display("Environment variable interpolation failed:\n{message}"))]
    EnvInterpolation { message: String },

    /// Failed to parse YAML configuration.
    #[snafu(display("Failed to parse YAML configuration"))]
    YamlParse { source: serde_yaml::Error },

    /// Failed to read configuration file.
    #[snafu(display("Failed to read configuration file"))]
    ReadFile { source: std::io::Error },
}

// ============ Partition Errors ============

/// Errors scoped to a single partition's merge or removal pass.
///
/// A partition-level failure aborts that partition only; the run continues
/// with the remaining partitions.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PartitionError {
    /// Existing partition object could not be read.
    #[snafu(display("Failed to read partition {key}: {source}"))]
    PartitionRead { key: String, source: StorageError },

    /// Existing partition object could not be decoded.
    #[snafu(display("Failed to decode partition {key}: {source}"))]
    PartitionDecode { key: String, source: csv::Error },

    /// Merged partition contents could not be encoded.
    #[snafu(display("Failed to encode partition {key}: {source}"))]
    PartitionEncode { key: String, source: csv::Error },

    /// Merged partition object could not be written.
    #[snafu(display("Failed to write partition {key}: {source}"))]
    PartitionWrite { key: String, source: StorageError },
}

// ============ Quarantine Errors ============

/// Errors that can occur while persisting the quarantine artifact.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum QuarantineError {
    /// Failed to encode rejected rows as CSV.
    #[snafu(display("Failed to encode quarantine artifact"))]
    QuarantineEncode { source: csv::Error },

    /// Failed to write the quarantine artifact.
    #[snafu(display("Failed to write quarantine artifact"))]
    QuarantineWrite { source: StorageError },
}

// ============ Report Errors ============

/// Errors that can occur while persisting an execution record.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ReportError {
    /// Failed to encode the execution record as CSV.
    #[snafu(display("Failed to encode execution record"))]
    ReportEncode { source: csv::Error },

    /// Failed to write the execution record.
    #[snafu(display("Failed to write execution record"))]
    ReportWrite { source: StorageError },
}

// ============ Metrics Errors ============

/// Errors that can occur during metrics initialization.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MetricsError {
    /// Failed to initialize Prometheus recorder.
    #[snafu(display("Failed to initialize Prometheus recorder"))]
    PrometheusInit {
        source: metrics_exporter_prometheus::BuildError,
    },
}

// ============ Pipeline Errors ============

/// Top-level pipeline errors.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PipelineError {
    /// Configuration error.
    #[snafu(display("Configuration error: {source}"))]
    Config { source: ConfigError },

    /// Storage error.
    #[snafu(display("Storage error: {source}"))]
    Storage { source: StorageError },

    /// Quarantine error.
    #[snafu(display("Quarantine error: {source}"))]
    Quarantine { source: QuarantineError },

    /// Report error.
    #[snafu(display("Report error: {source}"))]
    Report { source: ReportError },

    /// One or more partitions could not be merged this run.
    #[snafu(display("{count} partition(s) failed during this run"))]
    PartitionsFailed { count: usize },

    /// Failed to parse metrics address.
    #[snafu(display("Failed to parse metrics address: {source}"))]
    AddressParse { source: std::net::AddrParseError },

    /// Metrics error.
    #[snafu(display("Metrics error: {source}"))]
    Metrics { source: MetricsError },
}

impl From<StorageError> for PipelineError {
    fn from(source: StorageError) -> Self {
        PipelineError::Storage { source }
    }
}

impl From<ConfigError> for PipelineError {
    fn from(source: ConfigError) -> Self {
        PipelineError::Config { source }
    }
}

impl From<QuarantineError> for PipelineError {
    fn from(source: QuarantineError) -> Self {
        PipelineError::Quarantine { source }
    }
}

impl From<ReportError> for PipelineError {
    fn from(source: ReportError) -> Self {
        PipelineError::Report { source }
    }
}

impl From<MetricsError> for PipelineError {
    fn from(source: MetricsError) -> Self {
        PipelineError::Metrics { source }
    }
}
