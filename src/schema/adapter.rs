//! Parser turning raw sleep records into a validated history
//!
//! Decodes JSON arrays or NDJSON, validates every record and applies an
//! explicit policy to the ones that fail.

use crate::error::ComputeError;
use crate::schema::sleep_record::{RawSleepRecord, ValidationError};
use crate::types::SleepRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;

/// What to do with records that fail validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationPolicy {
    /// Drop invalid and duplicate-date records, report them, keep going
    #[default]
    Lenient,
    /// The first invalid or duplicate record fails the whole call
    Strict,
}

/// A record that did not make it into the history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedRecord {
    /// Position in the input
    pub index: usize,
    pub date: String,
    pub reason: String,
}

/// Validated history plus whatever was dropped on the way
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedHistory {
    /// Sorted by date ascending, one per date
    pub records: Vec<SleepRecord>,
    pub rejected: Vec<RejectedRecord>,
}

/// Parser for raw sleep records
pub struct HistoryParser;

impl HistoryParser {
    /// Parse a JSON string containing an array of raw records
    pub fn parse_array(json: &str) -> Result<Vec<RawSleepRecord>, ComputeError> {
        let records: Vec<RawSleepRecord> = serde_json::from_str(json)?;
        Ok(records)
    }

    /// Parse NDJSON (newline-delimited JSON), one raw record per line
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<RawSleepRecord>, ComputeError> {
        let mut records = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<RawSleepRecord>(trimmed) {
                Ok(record) => records.push(record),
                Err(e) => {
                    return Err(ComputeError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(records)
    }

    /// Validate raw records into a history under `policy`
    pub fn into_history(
        raw: &[RawSleepRecord],
        policy: ValidationPolicy,
    ) -> Result<ParsedHistory, ComputeError> {
        let mut parsed = ParsedHistory::default();
        let mut seen = HashSet::new();

        for (index, outcome) in Self::check(raw, &mut seen) {
            match outcome {
                Ok(record) => parsed.records.push(record),
                Err(e) => {
                    if policy == ValidationPolicy::Strict {
                        return Err(ComputeError::InvalidRecord {
                            index,
                            reason: e.to_string(),
                        });
                    }
                    warn!(index, date = %raw[index].date, reason = %e, "Dropping sleep record");
                    parsed.rejected.push(RejectedRecord {
                        index,
                        date: raw[index].date.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        parsed.records.sort_by_key(|r| r.date);
        Ok(parsed)
    }

    /// Report every record that would be rejected, without building a history
    pub fn validate_records(raw: &[RawSleepRecord]) -> Vec<RejectedRecord> {
        let mut seen = HashSet::new();
        Self::check(raw, &mut seen)
            .into_iter()
            .filter_map(|(index, outcome)| {
                outcome.err().map(|e| RejectedRecord {
                    index,
                    date: raw[index].date.clone(),
                    reason: e.to_string(),
                })
            })
            .collect()
    }

    /// Validate in input order; the first record for a date wins
    fn check(
        raw: &[RawSleepRecord],
        seen: &mut HashSet<chrono::NaiveDate>,
    ) -> Vec<(usize, Result<SleepRecord, ValidationError>)> {
        raw.iter()
            .enumerate()
            .map(|(index, r)| {
                let outcome = r.validate().and_then(|record| {
                    if seen.insert(record.date) {
                        Ok(record)
                    } else {
                        Err(ValidationError::DuplicateDate(record.date))
                    }
                });
                (index, outcome)
            })
            .collect()
    }
}
