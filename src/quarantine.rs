//! Quarantine sink for rows that failed validation.
//!
//! Every run that rejects at least one row produces a single timestamped
//! artifact in the quarantine container. Rejected rows are preserved
//! verbatim, alongside the failing rule's message and the file they came
//! from, so a human can correct and resubmit them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use snafu::prelude::*;
use tracing::info;

use crate::error::{QuarantineEncodeSnafu, QuarantineError, QuarantineWriteSnafu};
use crate::record::RejectedRow;
use crate::storage::StorageProviderRef;

/// One line of the quarantine artifact.
///
/// Input field values are carried through untouched; a missing column
/// becomes an empty string rather than a placeholder.
#[derive(Debug, Serialize)]
struct QuarantineLine<'a> {
    sample_id: &'a str,
    test_date: &'a str,
    result: &'a str,
    viral_load: &'a str,
    sample_status: &'a str,
    pipeline_error: &'a str,
    source_file: &'a str,
}

/// Writes rejected rows to the quarantine container.
pub struct QuarantineSink {
    storage: StorageProviderRef,
}

impl QuarantineSink {
    pub fn new(storage: StorageProviderRef) -> Self {
        Self { storage }
    }

    /// Persist the run's rejected rows as `quarantine_<timestamp>.csv`.
    ///
    /// Returns the artifact name, or `None` when there is nothing to write:
    /// a clean run leaves no empty artifact behind.
    pub async fn write(
        &self,
        rejected: &[RejectedRow],
        run_started: DateTime<Utc>,
    ) -> Result<Option<String>, QuarantineError> {
        if rejected.is_empty() {
            return Ok(None);
        }

        let artifact = format!("quarantine_{}.csv", run_started.format("%Y%m%d_%H%M%S"));
        let content = encode(rejected)?;

        self.storage
            .put(&artifact, content)
            .await
            .context(QuarantineWriteSnafu)?;

        info!(
            artifact = %artifact,
            rows = rejected.len(),
            "Wrote quarantine artifact"
        );
        Ok(Some(artifact))
    }
}

fn encode(rejected: &[RejectedRow]) -> Result<Vec<u8>, QuarantineError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    for item in rejected {
        let line = QuarantineLine {
            sample_id: item.row.get("sample_id").unwrap_or(""),
            test_date: item.row.get("test_date").unwrap_or(""),
            result: item.row.get("result").unwrap_or(""),
            viral_load: item.row.get("viral_load").unwrap_or(""),
            sample_status: item.row.get("sample_status").unwrap_or(""),
            pipeline_error: &item.error_reason,
            source_file: &item.origin_file,
        };
        writer.serialize(line).context(QuarantineEncodeSnafu)?;
    }

    writer
        .into_inner()
        .map_err(|e| QuarantineError::QuarantineEncode {
            source: csv::Error::from(e.into_error()),
        })
}
