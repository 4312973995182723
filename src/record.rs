//! Record schema and row validation.
//!
//! Input rows arrive as untyped string maps and are promoted to typed
//! [`LabRecord`]s by [`validate`], or demoted to [`RejectedRow`]s carrying the
//! first failing rule's message. Validation is pure and fail-fast; expected
//! failures never become `Err` at the function level.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Result code tokens accepted by the validator.
///
/// Matching is exact and case-sensitive: `"Positive"` is rejected, only
/// `POS`, `NEG` and `N/A` pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultCode {
    #[serde(rename = "POS")]
    Positive,
    #[serde(rename = "NEG")]
    Negative,
    #[serde(rename = "N/A")]
    NotApplicable,
}

impl ResultCode {
    /// Parse an exact result-code token.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "POS" => Some(ResultCode::Positive),
            "NEG" => Some(ResultCode::Negative),
            "N/A" => Some(ResultCode::NotApplicable),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResultCode::Positive => "POS",
            ResultCode::Negative => "NEG",
            ResultCode::NotApplicable => "N/A",
        }
    }
}

/// Whether a record carries data or marks a removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SampleStatus {
    #[default]
    #[serde(rename = "KEEP")]
    Keep,
    #[serde(rename = "REMOVE")]
    Remove,
}

impl SampleStatus {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "KEEP" => Some(SampleStatus::Keep),
            "REMOVE" => Some(SampleStatus::Remove),
            _ => None,
        }
    }
}

/// A validated lab-result record.
///
/// `sample_id` is the dedup key within a partition; `test_date` determines
/// the partition. A record with `sample_status = REMOVE` is a tombstone and
/// carries placeholder payload fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabRecord {
    pub sample_id: String,
    pub test_date: NaiveDate,
    pub result: ResultCode,
    pub viral_load: i64,
    #[serde(default)]
    pub sample_status: SampleStatus,
}

impl LabRecord {
    /// True if this record marks its `sample_id` for removal.
    pub fn is_tombstone(&self) -> bool {
        self.sample_status == SampleStatus::Remove
    }
}

/// An untyped input row, exactly as read from a delimited file.
///
/// Exists only during validation; a `RawRow` is either promoted to a
/// [`LabRecord`] or wrapped into a [`RejectedRow`].
#[derive(Debug, Clone, Default)]
pub struct RawRow {
    fields: HashMap<String, String>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a row from parallel header/value slices, as produced by a CSV
    /// reader. Extra values without a header are dropped.
    pub fn from_header_and_values(headers: &[&str], values: &[&str]) -> Self {
        let fields = headers
            .iter()
            .zip(values.iter())
            .map(|(h, v)| (h.to_string(), v.to_string()))
            .collect();
        Self { fields }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// A row that failed validation, preserved verbatim for human correction.
#[derive(Debug, Clone)]
pub struct RejectedRow {
    pub row: RawRow,
    /// Human-readable description of the first failing rule.
    pub error_reason: String,
    /// Name of the input file the row came from.
    pub origin_file: String,
}

const FIELD_SAMPLE_ID: &str = "sample_id";
const FIELD_TEST_DATE: &str = "test_date";
const FIELD_RESULT: &str = "result";
const FIELD_VIRAL_LOAD: &str = "viral_load";
const FIELD_STATUS: &str = "sample_status";

/// Validate a raw row, producing either a typed record or a rejected row.
///
/// Rules are applied in order and validation stops at the first failure:
///
/// 1. If `sample_status` is `REMOVE`, only `sample_id` and `test_date` are
///    required; payload fields are filled with placeholders since a tombstone
///    carries no measurement.
/// 2. Otherwise `sample_id` must be non-empty, `test_date` must be an ISO
///    calendar date, `result` must be an exact `POS`/`NEG`/`N/A` token, and
///    `viral_load` must parse as an integer.
pub fn validate(row: RawRow, origin_file: &str) -> Result<LabRecord, RejectedRow> {
    match validate_inner(&row) {
        Ok(record) => Ok(record),
        Err(error_reason) => Err(RejectedRow {
            row,
            error_reason,
            origin_file: origin_file.to_string(),
        }),
    }
}

fn validate_inner(row: &RawRow) -> Result<LabRecord, String> {
    let status = match row.get(FIELD_STATUS) {
        None | Some("") => SampleStatus::Keep,
        Some(token) => SampleStatus::parse(token).ok_or_else(|| {
            format!("Invalid sample_status: '{token}'. Must be KEEP or REMOVE")
        })?,
    };

    let sample_id = require_sample_id(row)?;
    let test_date = require_test_date(row)?;

    if status == SampleStatus::Remove {
        // A tombstone has no measurement payload.
        return Ok(LabRecord {
            sample_id,
            test_date,
            result: ResultCode::NotApplicable,
            viral_load: 0,
            sample_status: SampleStatus::Remove,
        });
    }

    let result_token = row.get(FIELD_RESULT).unwrap_or("");
    let result = ResultCode::parse(result_token).ok_or_else(|| {
        format!("Invalid result code: '{result_token}'. Must be POS, NEG, or N/A")
    })?;

    let load_token = row.get(FIELD_VIRAL_LOAD).unwrap_or("");
    let viral_load = load_token
        .parse::<i64>()
        .map_err(|_| format!("Invalid viral_load: '{load_token}'. Must be an integer"))?;

    Ok(LabRecord {
        sample_id,
        test_date,
        result,
        viral_load,
        sample_status: SampleStatus::Keep,
    })
}

fn require_sample_id(row: &RawRow) -> Result<String, String> {
    match row.get(FIELD_SAMPLE_ID) {
        Some(id) if !id.is_empty() => Ok(id.to_string()),
        _ => Err(format!("Missing or empty '{FIELD_SAMPLE_ID}'")),
    }
}

fn require_test_date(row: &RawRow) -> Result<NaiveDate, String> {
    let token = row.get(FIELD_TEST_DATE).unwrap_or("");
    NaiveDate::parse_from_str(token, "%Y-%m-%d")
        .map_err(|_| format!("Invalid test_date: '{token}'. Expected YYYY-MM-DD"))
}
