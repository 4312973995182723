//! Labflow: batch pipeline for validated, partitioned lab-result records.
//!
//! This crate handles:
//! - Polling a landing zone of CSV batch files in blob storage
//! - Validating rows against the lab-result schema, quarantining rejects
//! - Merging surviving rows into ISO-week partitions, last writer wins
//! - Applying inline tombstones and standalone deletion requests
//! - Recording every run in an append-only audit log

pub mod config;
pub mod deletion;
pub mod error;
pub mod merge;
pub mod metrics;
pub mod partition;
pub mod pipeline;
pub mod polling;
pub mod quarantine;
pub mod record;
pub mod report;
pub mod signal;
pub mod storage;
pub mod tracing;

// Re-export commonly used items
pub use config::Config;
pub use error::PipelineError;
pub use pipeline::{Containers, IngestProcessor};
pub use polling::{run_polling_loop, IterationResult, PollingProcessor};
pub use signal::shutdown_signal;
pub use storage::{StorageProvider, StorageProviderRef};
pub use tracing::init_tracing;
