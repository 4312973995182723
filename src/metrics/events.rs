//! Internal events for metrics emission.
//!
//! Each event struct represents a measurable occurrence in the pipeline.
//! Events implement the `InternalEvent` trait which emits the corresponding
//! Prometheus counter metric.

use metrics::counter;
use tracing::trace;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

/// Event emitted when rows pass validation.
pub struct RowsAccepted {
    pub count: u64,
}

impl InternalEvent for RowsAccepted {
    fn emit(self) {
        trace!(count = self.count, "Rows accepted");
        counter!("labflow_rows_accepted_total").increment(self.count);
    }
}

/// Event emitted when rows are rejected into quarantine.
pub struct RowsQuarantined {
    pub count: u64,
}

impl InternalEvent for RowsQuarantined {
    fn emit(self) {
        trace!(count = self.count, "Rows quarantined");
        counter!("labflow_rows_quarantined_total").increment(self.count);
    }
}

/// Event emitted when new records are inserted into a partition.
pub struct RecordsInserted {
    pub count: u64,
}

impl InternalEvent for RecordsInserted {
    fn emit(self) {
        trace!(count = self.count, "Records inserted");
        counter!("labflow_records_inserted_total").increment(self.count);
    }
}

/// Event emitted when existing records are overwritten by newer batch rows.
pub struct RecordsUpdated {
    pub count: u64,
}

impl InternalEvent for RecordsUpdated {
    fn emit(self) {
        trace!(count = self.count, "Records updated");
        counter!("labflow_records_updated_total").increment(self.count);
    }
}

/// Event emitted when records are removed by tombstones or deletion requests.
pub struct RecordsDeleted {
    pub count: u64,
}

impl InternalEvent for RecordsDeleted {
    fn emit(self) {
        trace!(count = self.count, "Records deleted");
        counter!("labflow_records_deleted_total").increment(self.count);
    }
}

/// Status of a processed input file.
#[derive(Debug, Clone, Copy)]
pub enum FileStatus {
    Success,
    Skipped,
    Failed,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Success => "success",
            FileStatus::Skipped => "skipped",
            FileStatus::Failed => "failed",
        }
    }
}

/// Event emitted when an input file is processed.
pub struct InputFileProcessed {
    pub status: FileStatus,
}

impl InternalEvent for InputFileProcessed {
    fn emit(self) {
        trace!(status = self.status.as_str(), "Input file processed");
        counter!("labflow_input_files_total", "status" => self.status.as_str()).increment(1);
    }
}

/// Event emitted when a partition merge fails and is skipped this run.
pub struct PartitionFailed;

impl InternalEvent for PartitionFailed {
    fn emit(self) {
        trace!("Partition failed");
        counter!("labflow_partitions_failed_total").increment(1);
    }
}

// ============================================================================
// Storage operation events
// ============================================================================

/// Storage operation types.
#[derive(Debug, Clone, Copy)]
pub enum StorageOperation {
    Get,
    Put,
    Delete,
    List,
    Rename,
}

impl StorageOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageOperation::Get => "get",
            StorageOperation::Put => "put",
            StorageOperation::Delete => "delete",
            StorageOperation::List => "list",
            StorageOperation::Rename => "rename",
        }
    }
}

/// Status of a storage request.
#[derive(Debug, Clone, Copy)]
pub enum RequestStatus {
    Success,
    Error,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Success => "success",
            RequestStatus::Error => "error",
        }
    }

    /// Classify the outcome of a storage call.
    pub fn from_result<T, E>(result: &Result<T, E>) -> Self {
        match result {
            Ok(_) => RequestStatus::Success,
            Err(_) => RequestStatus::Error,
        }
    }
}

/// Event emitted when a storage request completes.
pub struct StorageRequest {
    pub operation: StorageOperation,
    pub status: RequestStatus,
}

impl InternalEvent for StorageRequest {
    fn emit(self) {
        trace!(
            operation = self.operation.as_str(),
            status = self.status.as_str(),
            "Storage request"
        );
        counter!(
            "labflow_storage_requests_total",
            "operation" => self.operation.as_str(),
            "status" => self.status.as_str()
        )
        .increment(1);
    }
}
