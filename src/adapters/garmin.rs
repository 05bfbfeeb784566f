//! Garmin sleep adapter
//!
//! Parses Garmin Connect sleep payloads into raw sleep records.

use crate::error::ComputeError;
use crate::schema::RawSleepRecord;
use chrono::{Duration, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;

use super::{format_local, longest_per_date, SleepSourceAdapter};

/// Garmin sleep adapter
///
/// Local timestamps are used as-is. GMT timestamps are shifted by
/// `utc_offset_minutes` to get local wall-clock times.
#[derive(Debug, Clone, Default)]
pub struct GarminSleepAdapter {
    pub utc_offset_minutes: i32,
}

impl GarminSleepAdapter {
    pub fn with_utc_offset(utc_offset_minutes: i32) -> Self {
        Self { utc_offset_minutes }
    }

    fn local_time(&self, local_ms: Option<i64>, gmt_ms: Option<i64>) -> Option<NaiveDateTime> {
        if let Some(ts) = local_ms {
            // Local timestamps encode wall-clock time as if it were UTC
            return Utc.timestamp_millis_opt(ts).single().map(|t| t.naive_utc());
        }
        gmt_ms
            .and_then(|ts| Utc.timestamp_millis_opt(ts).single())
            .map(|t| t.naive_utc() + Duration::minutes(self.utc_offset_minutes as i64))
    }
}

impl SleepSourceAdapter for GarminSleepAdapter {
    fn parse(&self, raw_json: &str) -> Result<Vec<RawSleepRecord>, ComputeError> {
        let payload: GarminPayload = serde_json::from_str(raw_json)?;

        let records = payload
            .sleep
            .unwrap_or_default()
            .into_iter()
            .map(|s| {
                let start = self.local_time(
                    s.sleep_start_timestamp_local,
                    s.sleep_start_timestamp_gmt,
                );
                let end = self.local_time(s.sleep_end_timestamp_local, s.sleep_end_timestamp_gmt);

                RawSleepRecord {
                    date: s.calendar_date,
                    total_sleep_time: s
                        .sleep_time_seconds
                        .or(s.duration_in_seconds)
                        .map(|secs| secs as f64 / 3600.0),
                    bedtime: start.map(format_local),
                    wake_time: end.map(format_local),
                    quality: s.sleep_scores.and_then(|sc| sc.overall_score),
                }
            })
            .collect();

        Ok(longest_per_date(records))
    }
}

// Garmin API response structures

#[derive(Debug, Deserialize)]
struct GarminPayload {
    sleep: Option<Vec<GarminSleep>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GarminSleep {
    calendar_date: String,
    sleep_start_timestamp_local: Option<i64>,
    sleep_end_timestamp_local: Option<i64>,
    sleep_start_timestamp_gmt: Option<i64>,
    sleep_end_timestamp_gmt: Option<i64>,
    sleep_time_seconds: Option<i64>,
    duration_in_seconds: Option<i64>,
    sleep_scores: Option<GarminSleepScores>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GarminSleepScores {
    overall_score: Option<f64>,
}
