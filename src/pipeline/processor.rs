//! The ingestion processor: one polling iteration end to end.
//!
//! Each iteration drains the landing zone: every input file is parsed and
//! validated, rejected rows go to quarantine, surviving rows are merged
//! into their partitions, pending deletion requests are applied, and the
//! run is recorded in the logs container. Input files are consumed only
//! after every partition merge has committed; a run that fails or is cut
//! short leaves them in place, and replaying a batch is harmless because
//! the merge is last-writer-wins.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::deletion::{DeletionOutcome, DeletionProcessor};
use crate::emit;
use crate::error::{PipelineError, StorageError};
use crate::merge::{MergeCounters, UpsertEngine};
use crate::metrics::events::{
    FileStatus, InputFileProcessed, PartitionFailed, RecordsDeleted, RecordsInserted,
    RecordsUpdated, RowsAccepted, RowsQuarantined,
};
use crate::partition::group_by_partition;
use crate::polling::{IterationResult, PollingProcessor};
use crate::quarantine::QuarantineSink;
use crate::record::{validate, LabRecord, RawRow, RejectedRow};
use crate::report::{ExecutionReporter, ReportKind, RunCounters};
use crate::storage::StorageProviderRef;

use super::Containers;

/// Ingestion processor over the five containers.
pub struct IngestProcessor {
    landing_zone: StorageProviderRef,
    quarantine: QuarantineSink,
    engine: UpsertEngine,
    deletions: DeletionProcessor,
    reporter: ExecutionReporter,
    shutdown: CancellationToken,
}

/// One file's validated contents.
struct FileBatch {
    name: String,
    accepted: Vec<LabRecord>,
    rejected: Vec<RejectedRow>,
}

impl IngestProcessor {
    pub fn new(containers: &Containers, shutdown: CancellationToken) -> Self {
        Self {
            landing_zone: containers.landing_zone.clone(),
            quarantine: QuarantineSink::new(containers.quarantine.clone()),
            engine: UpsertEngine::new(containers.data.clone()),
            deletions: DeletionProcessor::new(
                containers.deletion_requests.clone(),
                containers.data.clone(),
            ),
            reporter: ExecutionReporter::new(containers.logs.clone()),
            shutdown,
        }
    }

    /// Run one full iteration over the given landing-zone files.
    ///
    /// The execution record is written whatever happens to the stages: a
    /// run that fails part-way still leaves a record of its partial
    /// progress before the error propagates.
    async fn run_iteration(&self, files: Vec<String>) -> Result<IterationResult, PipelineError> {
        let run_started = Utc::now();
        let mut counters = RunCounters::default();

        let outcome = self.run_stages(files, run_started, &mut counters).await;
        if let Err(error) = &outcome {
            counters.details.push(format!("Run failed: {error}"));
        }

        match self
            .reporter
            .record(ReportKind::Execution, run_started, &counters)
            .await
        {
            Ok(_) => {}
            // Recording a failed run must not mask the stage error.
            Err(report_error) if outcome.is_ok() => return Err(report_error.into()),
            Err(report_error) => {
                error!(%report_error, "Could not record failed run");
            }
        }

        outcome
    }

    async fn run_stages(
        &self,
        files: Vec<String>,
        run_started: DateTime<Utc>,
        counters: &mut RunCounters,
    ) -> Result<IterationResult, PipelineError> {
        let mut accepted = Vec::new();
        let mut rejected = Vec::new();
        let mut consumed = Vec::new();
        let mut cancelled = false;

        for file in files {
            // Files not yet read stay in the landing zone for the next run.
            if self.shutdown.is_cancelled() {
                info!("Shutdown requested, leaving remaining files for next run");
                cancelled = true;
                break;
            }
            match self.read_and_validate(&file).await {
                Ok(batch) => {
                    counters.files_processed += 1;
                    counters.rows_quarantined += batch.rejected.len() as u64;
                    counters.details.push(format!(
                        "Processed {}: {} accepted, {} quarantined",
                        batch.name,
                        batch.accepted.len(),
                        batch.rejected.len()
                    ));
                    emit!(RowsAccepted {
                        count: batch.accepted.len() as u64
                    });
                    emit!(RowsQuarantined {
                        count: batch.rejected.len() as u64
                    });
                    emit!(InputFileProcessed {
                        status: FileStatus::Success
                    });
                    accepted.extend(batch.accepted);
                    rejected.extend(batch.rejected);
                    consumed.push(batch.name);
                }
                Err(reason) => {
                    warn!(file = %file, reason = %reason, "Skipping unreadable input file");
                    counters.details.push(format!("Skipped {file}: {reason}"));
                    emit!(InputFileProcessed {
                        status: FileStatus::Skipped
                    });
                }
            }
        }

        // Quarantine first: if the artifact cannot be written, the run
        // aborts with the landing zone intact.
        self.quarantine.write(&rejected, run_started).await?;

        let had_batch_work = !consumed.is_empty();
        let mut merged = MergeCounters::default();
        let mut failed_partitions = 0usize;
        let mut merge_aborted = false;

        for (key, records) in group_by_partition(accepted) {
            // The check sits between partitions: an in-flight staged write
            // always completes. Unmerged rows are not lost; their input
            // files are retained and replayed on the next run.
            if self.shutdown.is_cancelled() {
                info!(partition = %key, "Shutdown requested, abandoning remaining partitions");
                counters.details.push(format!("Shutdown before {key}"));
                cancelled = true;
                merge_aborted = true;
                break;
            }
            match self.engine.upsert(&key, &records).await {
                Ok(partition_counters) => merged.accumulate(partition_counters),
                Err(error) => {
                    error!(partition = %key, %error, "Partition merge failed");
                    counters.details.push(format!("Failed {key}: {error}"));
                    emit!(PartitionFailed);
                    failed_partitions += 1;
                }
            }
        }

        // Inputs are consumed only once every partition they fed is
        // durably rewritten. On partial failure they stay in the landing
        // zone; re-running the batch re-applies the same rows, which the
        // last-writer-wins merge absorbs without duplicates.
        if !merge_aborted && failed_partitions == 0 {
            for file in &consumed {
                self.landing_zone
                    .delete(file)
                    .await
                    .map_err(PipelineError::from)?;
            }
        } else {
            warn!(
                files = consumed.len(),
                "Inputs retained for replay after incomplete merge"
            );
            counters
                .details
                .push(format!("Retained {} input file(s) for replay", consumed.len()));
        }

        counters.rows_inserted = merged.inserted;
        counters.rows_updated = merged.updated;
        counters.rows_deleted = merged.deleted;
        emit!(RecordsInserted {
            count: merged.inserted
        });
        emit!(RecordsUpdated {
            count: merged.updated
        });
        emit!(RecordsDeleted {
            count: merged.deleted
        });

        let deletion_work = if cancelled {
            false
        } else {
            self.companion_deletion_pass().await?
        };

        if failed_partitions > 0 {
            return Err(PipelineError::PartitionsFailed {
                count: failed_partitions,
            });
        }

        if cancelled {
            Ok(IterationResult::Shutdown)
        } else if had_batch_work || deletion_work {
            Ok(IterationResult::ProcessedItems)
        } else {
            Ok(IterationResult::NoItems)
        }
    }

    /// Apply pending deletion requests as a standalone pass.
    ///
    /// Always writes a `deletion_<ts>.csv` record, including passes that
    /// found an empty request queue. Returns true when at least one
    /// request file was present.
    pub async fn run_deletion_pass(&self) -> Result<bool, PipelineError> {
        let run_started = Utc::now();
        let outcome = self.deletions.run().await.map_err(PipelineError::from)?;
        let had_requests = !outcome.details.is_empty();
        self.record_deletion_pass(run_started, outcome).await?;
        Ok(had_requests)
    }

    /// Deletion pass embedded in an ingestion run.
    ///
    /// An empty request queue writes no record of its own here; the run's
    /// execution record already covers it.
    async fn companion_deletion_pass(&self) -> Result<bool, PipelineError> {
        let run_started = Utc::now();
        let outcome = self.deletions.run().await.map_err(PipelineError::from)?;
        if outcome.details.is_empty() {
            return Ok(false);
        }
        self.record_deletion_pass(run_started, outcome).await?;
        Ok(true)
    }

    async fn record_deletion_pass(
        &self,
        run_started: DateTime<Utc>,
        outcome: DeletionOutcome,
    ) -> Result<(), PipelineError> {
        emit!(RecordsDeleted {
            count: outcome.counters.rows_deleted
        });

        let counters = RunCounters {
            files_processed: outcome.counters.files_processed,
            rows_deleted: outcome.counters.rows_deleted,
            details: outcome.details,
            ..RunCounters::default()
        };
        self.reporter
            .record(ReportKind::Deletion, run_started, &counters)
            .await?;
        Ok(())
    }

    /// Read one input file and validate every row.
    ///
    /// Any structural CSV problem fails the whole file, which is then left
    /// in the landing zone untouched.
    async fn read_and_validate(&self, file: &str) -> Result<FileBatch, String> {
        let bytes = self
            .landing_zone
            .get(file)
            .await
            .map_err(|e: StorageError| e.to_string())?;

        let mut reader = csv::Reader::from_reader(bytes.as_ref());
        let headers = reader
            .headers()
            .map_err(|e| format!("unreadable header: {e}"))?
            .clone();
        let header_fields: Vec<&str> = headers.iter().collect();

        let mut accepted = Vec::new();
        let mut rejected = Vec::new();
        for (line, row) in reader.records().enumerate() {
            let row = row.map_err(|e| format!("unreadable row {}: {e}", line + 2))?;
            let values: Vec<&str> = row.iter().collect();
            let raw = RawRow::from_header_and_values(&header_fields, &values);
            match validate(raw, file) {
                Ok(record) => accepted.push(record),
                Err(reject) => rejected.push(reject),
            }
        }

        info!(
            file = %file,
            accepted = accepted.len(),
            rejected = rejected.len(),
            "Validated input file"
        );
        Ok(FileBatch {
            name: file.to_string(),
            accepted,
            rejected,
        })
    }
}

#[async_trait]
impl PollingProcessor for IngestProcessor {
    type State = Vec<String>;
    type Error = PipelineError;

    /// List the landing zone. Always returns work so every iteration
    /// leaves an audit record, including runs that find nothing.
    async fn prepare(&mut self) -> Result<Option<Vec<String>>, PipelineError> {
        let files = self.landing_zone.list_files().await?;
        Ok(Some(files))
    }

    async fn process(&mut self, files: Vec<String>) -> Result<IterationResult, PipelineError> {
        self.run_iteration(files).await
    }
}
