//! Vendor sleep adapters
//!
//! This module provides adapters that parse raw vendor sleep payloads and map
//! them to vendor-agnostic raw sleep records, ready for validation.

mod garmin;
mod whoop;

pub use garmin::GarminSleepAdapter;
pub use whoop::WhoopSleepAdapter;

use crate::error::ComputeError;
use crate::schema::RawSleepRecord;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;

/// Format used for the local date-times adapters emit
pub(crate) const LOCAL_DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Trait for vendor sleep adapters
pub trait SleepSourceAdapter {
    /// Parse raw vendor JSON into raw sleep records, sorted by date
    fn parse(&self, raw_json: &str) -> Result<Vec<RawSleepRecord>, ComputeError>;
}

/// Look up an adapter by source name
pub fn adapter_for(source: &str) -> Result<Box<dyn SleepSourceAdapter>, ComputeError> {
    match source.to_ascii_lowercase().as_str() {
        "garmin" => Ok(Box::new(GarminSleepAdapter::default())),
        "whoop" => Ok(Box::new(WhoopSleepAdapter)),
        other => Err(ComputeError::UnsupportedSource(other.to_string())),
    }
}

pub(crate) fn format_local(time: NaiveDateTime) -> String {
    time.format(LOCAL_DATE_TIME_FORMAT).to_string()
}

/// Keep one record per wake date, the longest main sleep
pub(crate) fn longest_per_date(records: Vec<RawSleepRecord>) -> Vec<RawSleepRecord> {
    let mut by_date: BTreeMap<String, RawSleepRecord> = BTreeMap::new();
    for record in records {
        let longer = by_date.get(&record.date).map_or(true, |kept| {
            record.total_sleep_time.unwrap_or(0.0) > kept.total_sleep_time.unwrap_or(0.0)
        });
        if longer {
            by_date.insert(record.date.clone(), record);
        }
    }
    by_date.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_adapter_lookup() {
        assert!(adapter_for("Garmin").is_ok());
        assert!(adapter_for("whoop").is_ok());
        assert!(matches!(
            adapter_for("fitbit"),
            Err(ComputeError::UnsupportedSource(name)) if name == "fitbit"
        ));
    }

    #[test]
    fn test_longest_per_date() {
        let records = vec![
            RawSleepRecord::new("2024-03-05", 6.0),
            RawSleepRecord::new("2024-03-04", 7.0),
            RawSleepRecord::new("2024-03-05", 7.5),
            RawSleepRecord::new("2024-03-05", 5.0),
        ];
        let kept = longest_per_date(records);
        assert_eq!(
            kept,
            vec![
                RawSleepRecord::new("2024-03-04", 7.0),
                RawSleepRecord::new("2024-03-05", 7.5),
            ]
        );
    }
}
