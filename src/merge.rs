//! Partition-local record sets and the merge engine.
//!
//! Each partition's durable object holds a record set that is unique by
//! `sample_id`. Merging a batch into a partition is last-writer-wins: a
//! batch row for an existing id overwrites it in place, a tombstone removes
//! the id entirely. All mutation happens in memory; the partition object is
//! rewritten atomically in one shot at the end, so a failed merge leaves
//! the stored partition untouched.

use std::collections::{HashMap, HashSet};

use snafu::prelude::*;
use tracing::{debug, info};

use crate::error::{
    PartitionDecodeSnafu, PartitionEncodeSnafu, PartitionError, PartitionReadSnafu,
    PartitionWriteSnafu,
};
use crate::partition::PartitionKey;
use crate::record::LabRecord;
use crate::storage::StorageProviderRef;

/// Counters for one partition merge, relative to the stored dataset.
///
/// A row that is inserted and then tombstoned within the same batch nets
/// to zero in all three counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeCounters {
    /// Ids new to the partition that survived the merge.
    pub inserted: u64,
    /// Previously stored ids overwritten by a surviving batch row.
    pub updated: u64,
    /// Previously stored ids removed by a tombstone.
    pub deleted: u64,
}

impl MergeCounters {
    pub fn accumulate(&mut self, other: MergeCounters) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.deleted += other.deleted;
    }
}

/// Outcome of a standalone removal pass over one partition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemovalOutcome {
    /// Records actually removed; ids absent from the partition are no-ops.
    pub removed: u64,
}

/// In-memory record set for one partition, unique by `sample_id`.
///
/// Insertion order of first appearance is preserved: an overwrite keeps the
/// record's position, a removal closes the gap.
#[derive(Debug, Default)]
pub struct RecordSet {
    rows: Vec<LabRecord>,
    index: HashMap<String, usize>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from stored rows. Later duplicates win, matching the
    /// merge semantics, though a stored partition is expected to be unique
    /// already.
    pub fn from_rows(rows: Vec<LabRecord>) -> Self {
        let mut set = Self::new();
        for row in rows {
            set.upsert(row);
        }
        set
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains(&self, sample_id: &str) -> bool {
        self.index.contains_key(sample_id)
    }

    pub fn rows(&self) -> &[LabRecord] {
        &self.rows
    }

    /// Insert or overwrite by `sample_id`. Returns true if an existing
    /// record was overwritten.
    pub fn upsert(&mut self, record: LabRecord) -> bool {
        match self.index.get(&record.sample_id) {
            Some(&pos) => {
                self.rows[pos] = record;
                true
            }
            None => {
                self.index.insert(record.sample_id.clone(), self.rows.len());
                self.rows.push(record);
                false
            }
        }
    }

    /// Remove by `sample_id`. Returns true if a record was removed.
    ///
    /// Both inline tombstones and standalone deletion requests resolve
    /// through this single path.
    pub fn remove(&mut self, sample_id: &str) -> bool {
        let Some(pos) = self.index.remove(sample_id) else {
            return false;
        };
        self.rows.remove(pos);
        for idx in self.index.values_mut() {
            if *idx > pos {
                *idx -= 1;
            }
        }
        true
    }
}

/// Loads, merges and rewrites partition objects.
///
/// Assumes a single writer per partition: there is no cross-run locking,
/// so concurrent runs over the same partition must be serialized
/// externally.
pub struct UpsertEngine {
    storage: StorageProviderRef,
}

impl UpsertEngine {
    pub fn new(storage: StorageProviderRef) -> Self {
        Self { storage }
    }

    /// Merge a batch's rows for one partition into its stored record set.
    ///
    /// Rows are applied in file order: later rows overwrite earlier ones,
    /// and a tombstone consumes any earlier row for the same id before
    /// reaching into the stored history.
    pub async fn upsert(
        &self,
        key: &PartitionKey,
        batch: &[LabRecord],
    ) -> Result<MergeCounters, PartitionError> {
        let mut set = self.load(key).await?;
        let before: HashSet<String> = set.index.keys().cloned().collect();
        let mut touched: HashSet<&str> = HashSet::new();

        for record in batch {
            if record.is_tombstone() {
                set.remove(&record.sample_id);
                touched.remove(record.sample_id.as_str());
            } else {
                set.upsert(record.clone());
                touched.insert(record.sample_id.as_str());
            }
        }

        let inserted = touched.iter().filter(|&&id| !before.contains(id)).count() as u64;
        let updated = touched.iter().filter(|&&id| before.contains(id)).count() as u64;
        let deleted = before
            .iter()
            .filter(|id| !set.contains(id.as_str()))
            .count() as u64;

        self.persist(key, &set).await?;

        let counters = MergeCounters {
            inserted,
            updated,
            deleted,
        };
        info!(
            partition = %key,
            inserted = counters.inserted,
            updated = counters.updated,
            deleted = counters.deleted,
            total = set.len(),
            "Merged partition"
        );
        Ok(counters)
    }

    /// Remove the given ids from one partition's record set.
    ///
    /// The partition is rewritten only when at least one record was
    /// actually removed; a pass that matches nothing leaves the stored
    /// object byte-identical.
    pub async fn remove(
        &self,
        key: &PartitionKey,
        sample_ids: &[String],
    ) -> Result<RemovalOutcome, PartitionError> {
        let mut set = self.load(key).await?;
        let mut removed = 0u64;

        for sample_id in sample_ids {
            if set.remove(sample_id) {
                removed += 1;
            } else {
                debug!(partition = %key, sample_id = %sample_id, "No record to remove");
            }
        }

        if removed > 0 {
            self.persist(key, &set).await?;
            info!(partition = %key, removed, total = set.len(), "Removed records");
        }
        Ok(RemovalOutcome { removed })
    }

    /// Load a partition's record set, empty if the object does not exist.
    pub async fn load(&self, key: &PartitionKey) -> Result<RecordSet, PartitionError> {
        let object_key = key.object_key();
        let bytes = self
            .storage
            .get_opt(&object_key)
            .await
            .context(PartitionReadSnafu {
                key: object_key.clone(),
            })?;

        let Some(bytes) = bytes else {
            return Ok(RecordSet::new());
        };

        let mut reader = csv::Reader::from_reader(bytes.as_ref());
        let mut rows = Vec::new();
        for row in reader.deserialize::<LabRecord>() {
            rows.push(row.context(PartitionDecodeSnafu {
                key: object_key.clone(),
            })?);
        }
        Ok(RecordSet::from_rows(rows))
    }

    /// Rewrite a partition object atomically. An emptied partition is
    /// deleted rather than left as a header-only object.
    async fn persist(&self, key: &PartitionKey, set: &RecordSet) -> Result<(), PartitionError> {
        let object_key = key.object_key();

        if set.is_empty() {
            let existing = self
                .storage
                .get_opt(&object_key)
                .await
                .context(PartitionReadSnafu {
                    key: object_key.clone(),
                })?;
            if existing.is_some() {
                self.storage
                    .delete(&object_key)
                    .await
                    .context(PartitionWriteSnafu {
                        key: object_key.clone(),
                    })?;
            }
            return Ok(());
        }

        let content = encode(key, set)?;
        self.storage
            .atomic_write(&object_key, content)
            .await
            .context(PartitionWriteSnafu { key: object_key })
    }
}

fn encode(key: &PartitionKey, set: &RecordSet) -> Result<Vec<u8>, PartitionError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for record in set.rows() {
        writer.serialize(record).context(PartitionEncodeSnafu {
            key: key.object_key(),
        })?;
    }
    writer
        .into_inner()
        .map_err(|e| PartitionError::PartitionEncode {
            key: key.object_key(),
            source: csv::Error::from(e.into_error()),
        })
}
