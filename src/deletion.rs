//! Deletion intents and the standalone deletion pass.
//!
//! A deletion can arrive two ways: as an inline tombstone row inside a
//! batch, or as a standalone request file in the deletion-requests
//! container. Request files are parsed here into [`DeletionIntent`]s naming
//! a `sample_id` and the partition its `test_date` resolves to; inline
//! tombstones are consumed by the upsert merge in batch order. Both remove
//! records through the same partition rewrite path.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::error::StorageError;
use crate::merge::UpsertEngine;
use crate::partition::PartitionKey;
use crate::storage::StorageProviderRef;

/// One record marked for removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionIntent {
    pub sample_id: String,
    pub partition: PartitionKey,
}

/// Counters for one deletion pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeletionCounters {
    /// Request files parsed and consumed.
    pub files_processed: u64,
    /// Records actually removed from partitions.
    pub rows_deleted: u64,
    /// Partitions rewritten.
    pub partitions_updated: u64,
}

/// Outcome of one deletion pass, including per-file audit detail lines.
#[derive(Debug, Default)]
pub struct DeletionOutcome {
    pub counters: DeletionCounters,
    pub details: Vec<String>,
}

/// Parse a deletion request file.
///
/// The file must be a CSV with `sample_id` and `test_date` columns. Any
/// malformed row fails the whole file so a half-applied request is never
/// consumed.
pub fn parse_request_file(content: &[u8]) -> Result<Vec<DeletionIntent>, String> {
    let mut reader = csv::Reader::from_reader(content);

    let headers = reader
        .headers()
        .map_err(|e| format!("unreadable header: {e}"))?
        .clone();
    let id_col = headers
        .iter()
        .position(|h| h == "sample_id")
        .ok_or_else(|| "missing required column 'sample_id'".to_string())?;
    let date_col = headers
        .iter()
        .position(|h| h == "test_date")
        .ok_or_else(|| "missing required column 'test_date'".to_string())?;

    let mut intents = Vec::new();
    for (line, row) in reader.records().enumerate() {
        let row = row.map_err(|e| format!("unreadable row {}: {e}", line + 2))?;
        let sample_id = row.get(id_col).unwrap_or("");
        if sample_id.is_empty() {
            return Err(format!("empty sample_id at row {}", line + 2));
        }

        let date_token = row.get(date_col).unwrap_or("");
        let test_date = NaiveDate::parse_from_str(date_token, "%Y-%m-%d")
            .map_err(|_| format!("invalid test_date '{date_token}' at row {}", line + 2))?;

        intents.push(DeletionIntent {
            sample_id: sample_id.to_string(),
            partition: PartitionKey::for_date(test_date),
        });
    }

    Ok(intents)
}

/// Group intents by target partition, in deterministic key order.
pub fn group_intents(intents: Vec<DeletionIntent>) -> BTreeMap<PartitionKey, Vec<String>> {
    let mut groups: BTreeMap<PartitionKey, Vec<String>> = BTreeMap::new();
    for intent in intents {
        groups.entry(intent.partition).or_default().push(intent.sample_id);
    }
    groups
}

/// Drains the deletion-requests container against the data container.
pub struct DeletionProcessor {
    requests: StorageProviderRef,
    engine: UpsertEngine,
}

impl DeletionProcessor {
    pub fn new(requests: StorageProviderRef, data: StorageProviderRef) -> Self {
        Self {
            requests,
            engine: UpsertEngine::new(data),
        }
    }

    /// Process every pending request file.
    ///
    /// A file that parses is consumed exactly once, whether or not any of
    /// its ids still exist. A file that fails to parse is left in place
    /// and reported, so a fixed version can be resubmitted under the same
    /// name.
    pub async fn run(&self) -> Result<DeletionOutcome, StorageError> {
        let files = self.requests.list_files().await?;
        let mut outcome = DeletionOutcome::default();

        if files.is_empty() {
            info!("No deletion requests pending");
            return Ok(outcome);
        }

        for file in files {
            let content = self.requests.get(&file).await?;
            let intents = match parse_request_file(&content) {
                Ok(intents) => intents,
                Err(reason) => {
                    warn!(file = %file, reason = %reason, "Skipping malformed deletion request");
                    outcome.details.push(format!("Skipped {file}: {reason}"));
                    continue;
                }
            };

            let mut removed = 0u64;
            let mut partitions_updated = 0u64;
            for (partition, sample_ids) in group_intents(intents) {
                match self.engine.remove(&partition, &sample_ids).await {
                    Ok(result) => {
                        removed += result.removed;
                        if result.removed > 0 {
                            partitions_updated += 1;
                        }
                    }
                    Err(error) => {
                        // Leave the request file in place; the partition
                        // pass will be retried next run.
                        warn!(file = %file, partition = %partition, %error, "Deletion pass failed");
                        outcome.details.push(format!(
                            "Failed {file} on {partition}: {error}"
                        ));
                        return Ok(outcome);
                    }
                }
            }

            self.requests.delete(&file).await?;

            outcome.counters.files_processed += 1;
            outcome.counters.rows_deleted += removed;
            outcome.counters.partitions_updated += partitions_updated;
            outcome
                .details
                .push(format!("Processed {file}: removed {removed} record(s)"));
            info!(file = %file, removed, "Processed deletion request");
        }

        Ok(outcome)
    }
}
