//! Partition keys derived from a record's test date.
//!
//! Partitions are identified by ISO-8601 `(year, week)`. The mapping is pure
//! and total for any valid date, and is shared by ingestion and deletion so a
//! record's partition is always derivable from its `test_date` alone; there
//! is no separate partition index.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, NaiveDate};

use crate::record::LabRecord;

/// Identifier of one partition: ISO year and ISO week number.
///
/// Dedup is partition-local. If the same `sample_id` is re-ingested with a
/// `test_date` in a different ISO week, the old record stays in its original
/// partition; no cross-partition uniqueness is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey {
    pub year: i32,
    pub week: u32,
}

impl PartitionKey {
    /// Derive the partition for a date using ISO week numbering.
    pub fn for_date(date: NaiveDate) -> Self {
        let iso = date.iso_week();
        Self {
            year: iso.year(),
            week: iso.week(),
        }
    }

    /// Object key of the partition's durable record set, week unpadded.
    pub fn object_key(&self) -> String {
        format!("year={}/week={}/data.csv", self.year, self.week)
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "year={}/week={}", self.year, self.week)
    }
}

/// Group a batch of records by target partition, in deterministic key order.
pub fn group_by_partition(records: Vec<LabRecord>) -> BTreeMap<PartitionKey, Vec<LabRecord>> {
    let mut groups: BTreeMap<PartitionKey, Vec<LabRecord>> = BTreeMap::new();
    for record in records {
        let key = PartitionKey::for_date(record.test_date);
        groups.entry(key).or_default().push(record);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ResultCode, SampleStatus};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_same_iso_week_maps_to_same_partition() {
        // 2025-01-06 (Mon) and 2025-01-08 (Wed) are both ISO week 2 of 2025.
        assert_eq!(
            PartitionKey::for_date(date(2025, 1, 6)),
            PartitionKey::for_date(date(2025, 1, 8))
        );
    }

    #[test]
    fn test_next_iso_week_maps_to_different_partition() {
        assert_ne!(
            PartitionKey::for_date(date(2025, 1, 6)),
            PartitionKey::for_date(date(2025, 1, 13))
        );
    }

    #[test]
    fn test_iso_year_boundary() {
        // 2024-12-30 belongs to ISO week 1 of 2025, not week 53 of 2024.
        let key = PartitionKey::for_date(date(2024, 12, 30));
        assert_eq!(key, PartitionKey { year: 2025, week: 1 });
    }

    #[test]
    fn test_object_key_is_unpadded() {
        let key = PartitionKey { year: 2025, week: 3 };
        assert_eq!(key.object_key(), "year=2025/week=3/data.csv");
        assert_eq!(key.to_string(), "year=2025/week=3");
    }

    #[test]
    fn test_group_by_partition() {
        let record = |id: &str, d: NaiveDate| LabRecord {
            sample_id: id.to_string(),
            test_date: d,
            result: ResultCode::Negative,
            viral_load: 0,
            sample_status: SampleStatus::Keep,
        };

        let groups = group_by_partition(vec![
            record("a", date(2025, 1, 6)),
            record("b", date(2025, 1, 13)),
            record("c", date(2025, 1, 8)),
        ]);

        assert_eq!(groups.len(), 2);
        let week2 = groups.get(&PartitionKey { year: 2025, week: 2 }).unwrap();
        assert_eq!(week2.len(), 2);
    }
}
