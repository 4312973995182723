//! End-to-end pipeline tests against local storage.

use labflow::partition::PartitionKey;
use labflow::pipeline::{Containers, IngestProcessor};
use labflow::polling::{IterationResult, PollingProcessor};
use labflow::{Config, StorageProviderRef};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

struct Harness {
    root: TempDir,
    containers: Containers,
    processor: IngestProcessor,
}

async fn harness() -> Harness {
    let root = TempDir::new().unwrap();
    let path = |name: &str| root.path().join(name).display().to_string();

    let raw = format!(
        "containers:\n  landing_zone: {}\n  quarantine: {}\n  data: {}\n  deletion_requests: {}\n  logs: {}\n",
        path("landing"),
        path("quarantine"),
        path("data"),
        path("deletions"),
        path("logs"),
    );
    let config = Config::parse(&raw).unwrap();
    let containers = Containers::from_config(&config).await.unwrap();
    let processor = IngestProcessor::new(&containers, CancellationToken::new());

    Harness {
        root,
        containers,
        processor,
    }
}

impl Harness {
    /// Run one full iteration over the current landing zone.
    ///
    /// Runs are strictly sequential: the merge engine assumes a single
    /// writer per partition and provides no cross-run locking.
    async fn run_once(&mut self) -> IterationResult {
        let files = self.processor.prepare().await.unwrap().unwrap();
        self.processor.process(files).await.unwrap()
    }

    async fn put(&self, container: &StorageProviderRef, name: &str, content: &str) {
        container
            .put(name, content.as_bytes().to_vec())
            .await
            .unwrap();
    }

    async fn read(&self, container: &StorageProviderRef, name: &str) -> String {
        String::from_utf8(container.get(name).await.unwrap().to_vec()).unwrap()
    }

    async fn files_with_prefix(&self, container: &StorageProviderRef, prefix: &str) -> Vec<String> {
        container
            .list_files()
            .await
            .unwrap()
            .into_iter()
            .filter(|f| f.starts_with(prefix))
            .collect()
    }
}

const WEEK2: PartitionKey = PartitionKey { year: 2025, week: 2 };

#[tokio::test]
async fn test_validation_splits_batch_between_partition_and_quarantine() {
    let mut h = harness().await;

    let batch = "\
sample_id,test_date,result,viral_load
S-001,2025-01-06,POS,100
S-002,2025-01-06,NEG,0
S-003,2025-01-07,N/A,0
S-004,2025-01-07,POS,2500
S-005,2025-01-08,NEG,0
S-006,2025-01-08,POS,70
S-007,2025-01-09,NEG,0
S-008,2025-01-09,POS,910
S-009,2025-01-10,NEG,0
S-010,2025-01-10,POS,12
S-011,2025-01-10,Positive,55
,2025-01-10,POS,55
S-013,13/01/2025,POS,55
";
    h.put(&h.containers.landing_zone, "batch.csv", batch).await;

    assert_eq!(h.run_once().await, IterationResult::ProcessedItems);

    // Ten valid rows land in the week-2 partition.
    let data = h.read(&h.containers.data, &WEEK2.object_key()).await;
    assert_eq!(data.lines().count(), 11); // header + 10
    assert!(data.contains("S-001"));
    assert!(data.contains("S-010"));
    assert!(!data.contains("S-011"));

    // Three rejects in one quarantine artifact, verbatim with reasons.
    let artifacts = h
        .files_with_prefix(&h.containers.quarantine, "quarantine_")
        .await;
    assert_eq!(artifacts.len(), 1);
    let quarantined = h.read(&h.containers.quarantine, &artifacts[0]).await;
    assert_eq!(quarantined.lines().count(), 4); // header + 3
    assert!(quarantined.contains("Invalid result code"));
    assert!(quarantined.contains("sample_id"));
    assert!(quarantined.contains("Invalid test_date"));
    assert!(quarantined.contains("batch.csv"));

    // The input was consumed.
    assert!(h
        .containers
        .landing_zone
        .list_files()
        .await
        .unwrap()
        .is_empty());

    // The run left an audit record.
    let records = h.files_with_prefix(&h.containers.logs, "execution_").await;
    assert_eq!(records.len(), 1);
    let record = h.read(&h.containers.logs, &records[0]).await;
    assert!(record.contains("Processed batch.csv: 10 accepted, 3 quarantined"));
}

#[tokio::test]
async fn test_reingest_overwrites_measure_last_writer_wins() {
    let mut h = harness().await;

    h.put(
        &h.containers.landing_zone,
        "day1.csv",
        "sample_id,test_date,result,viral_load\nS-001,2025-01-06,POS,50\n",
    )
    .await;
    h.run_once().await;

    h.put(
        &h.containers.landing_zone,
        "day2.csv",
        "sample_id,test_date,result,viral_load\nS-001,2025-01-06,POS,300\n",
    )
    .await;
    h.run_once().await;

    let data = h.read(&h.containers.data, &WEEK2.object_key()).await;
    assert_eq!(data.lines().count(), 2); // header + 1, no duplicate id
    assert!(data.contains(",300,"));
    assert!(!data.contains(",50,"));
}

#[tokio::test]
async fn test_tombstone_removes_record_and_is_not_stored() {
    let mut h = harness().await;

    h.put(
        &h.containers.landing_zone,
        "day1.csv",
        "sample_id,test_date,result,viral_load\nS-001,2025-01-06,POS,50\nS-002,2025-01-06,NEG,0\n",
    )
    .await;
    h.run_once().await;

    h.put(
        &h.containers.landing_zone,
        "day2.csv",
        "sample_id,test_date,result,viral_load,sample_status\nS-001,2025-01-06,,,REMOVE\n",
    )
    .await;
    h.run_once().await;

    let data = h.read(&h.containers.data, &WEEK2.object_key()).await;
    assert!(!data.contains("S-001"));
    assert!(data.contains("S-002"));
    assert!(!data.contains("REMOVE"));
}

#[tokio::test]
async fn test_deletion_request_for_absent_id_is_still_consumed() {
    let mut h = harness().await;

    h.put(
        &h.containers.deletion_requests,
        "req.csv",
        "sample_id,test_date\nNO-SUCH-ID,2025-01-06\n",
    )
    .await;

    assert_eq!(h.run_once().await, IterationResult::ProcessedItems);

    assert!(h
        .containers
        .deletion_requests
        .list_files()
        .await
        .unwrap()
        .is_empty());

    // The pass is recorded even though nothing matched.
    let records = h.files_with_prefix(&h.containers.logs, "deletion_").await;
    assert_eq!(records.len(), 1);
    let record = h.read(&h.containers.logs, &records[0]).await;
    assert!(record.contains("Processed req.csv: removed 0 record(s)"));
}

#[tokio::test]
async fn test_deletion_request_removes_record_from_its_partition() {
    let mut h = harness().await;

    h.put(
        &h.containers.landing_zone,
        "day1.csv",
        "sample_id,test_date,result,viral_load\nS-001,2025-01-06,POS,50\nS-002,2025-01-14,NEG,0\n",
    )
    .await;
    h.run_once().await;

    h.put(
        &h.containers.deletion_requests,
        "req.csv",
        "sample_id,test_date\nS-002,2025-01-14\n",
    )
    .await;
    h.run_once().await;

    // Week 3's only record is gone; the emptied partition object with it.
    let week3 = PartitionKey { year: 2025, week: 3 };
    assert!(h
        .containers
        .data
        .get_opt(&week3.object_key())
        .await
        .unwrap()
        .is_none());

    // Week 2 is untouched.
    let data = h.read(&h.containers.data, &WEEK2.object_key()).await;
    assert!(data.contains("S-001"));
}

#[tokio::test]
async fn test_empty_run_is_a_recorded_noop() {
    let mut h = harness().await;

    h.put(
        &h.containers.landing_zone,
        "day1.csv",
        "sample_id,test_date,result,viral_load\nS-001,2025-01-06,POS,50\n",
    )
    .await;
    h.run_once().await;
    let before = h.read(&h.containers.data, &WEEK2.object_key()).await;

    // Nothing pending: the partition must be byte-identical afterwards.
    assert_eq!(h.run_once().await, IterationResult::NoItems);
    let after = h.read(&h.containers.data, &WEEK2.object_key()).await;
    assert_eq!(before, after);

    // No quarantine artifact for a clean run.
    assert!(h
        .containers
        .quarantine
        .list_files()
        .await
        .unwrap()
        .is_empty());

    // Both runs are on record.
    let records = h.files_with_prefix(&h.containers.logs, "execution_").await;
    assert!(!records.is_empty());

    // The embedded pass writes no separate deletion record for an empty
    // request queue; the execution record already covers it.
    assert!(h
        .files_with_prefix(&h.containers.logs, "deletion_")
        .await
        .is_empty());
}

#[tokio::test]
async fn test_failed_run_still_writes_execution_record() {
    let mut h = harness().await;

    h.put(
        &h.containers.landing_zone,
        "batch.csv",
        "sample_id,test_date,result,viral_load\nS-001,2025-01-06,POS,50\nS-002,bad-date,POS,10\n",
    )
    .await;

    // Replace the quarantine container with a plain file so the artifact
    // write cannot succeed.
    let quarantine_path = h.root.path().join("quarantine");
    std::fs::remove_dir_all(&quarantine_path).unwrap();
    std::fs::write(&quarantine_path, b"").unwrap();

    let files = h.processor.prepare().await.unwrap().unwrap();
    assert!(h.processor.process(files).await.is_err());

    // The input is retained for replay, and the failed run is on record
    // with its partial progress.
    assert_eq!(
        h.containers.landing_zone.list_files().await.unwrap(),
        vec!["batch.csv"]
    );
    let records = h.files_with_prefix(&h.containers.logs, "execution_").await;
    assert_eq!(records.len(), 1);
    let record = h.read(&h.containers.logs, &records[0]).await;
    assert!(record.contains("Processed batch.csv: 1 accepted, 1 quarantined"));
    assert!(record.contains("Run failed"));
}

#[tokio::test]
async fn test_standalone_deletion_pass_records_empty_queue() {
    let h = harness().await;

    assert!(!h.processor.run_deletion_pass().await.unwrap());

    // Zero-work passes still leave an audit record.
    let records = h.files_with_prefix(&h.containers.logs, "deletion_").await;
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn test_unreadable_file_is_skipped_and_left_in_place() {
    let mut h = harness().await;

    // A row with the wrong field count fails the whole file.
    h.put(
        &h.containers.landing_zone,
        "broken.csv",
        "sample_id,test_date,result,viral_load\nS-001,2025-01-06,POS\n",
    )
    .await;
    h.put(
        &h.containers.landing_zone,
        "good.csv",
        "sample_id,test_date,result,viral_load\nS-003,2025-01-06,POS,50\n",
    )
    .await;

    h.run_once().await;

    // The good file was consumed, the broken one stays put.
    assert_eq!(
        h.containers.landing_zone.list_files().await.unwrap(),
        vec!["broken.csv"]
    );
    let data = h.read(&h.containers.data, &WEEK2.object_key()).await;
    assert!(data.contains("S-003"));

    let records = h.files_with_prefix(&h.containers.logs, "execution_").await;
    let record = h.read(&h.containers.logs, &records[0]).await;
    assert!(record.contains("Skipped broken.csv"));
}
