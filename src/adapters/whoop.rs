//! WHOOP sleep adapter
//!
//! Parses WHOOP sleep payloads into raw sleep records. Naps are skipped and
//! each sleep is dated by its local wake date.

use crate::error::ComputeError;
use crate::schema::RawSleepRecord;
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::Deserialize;
use tracing::warn;

use super::{format_local, longest_per_date, SleepSourceAdapter};

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// WHOOP sleep adapter
#[derive(Debug, Clone, Copy, Default)]
pub struct WhoopSleepAdapter;

impl SleepSourceAdapter for WhoopSleepAdapter {
    fn parse(&self, raw_json: &str) -> Result<Vec<RawSleepRecord>, ComputeError> {
        let payload: WhoopPayload = serde_json::from_str(raw_json)?;
        let mut records = Vec::new();

        for sleep in payload.sleep.unwrap_or_default() {
            if sleep.nap.unwrap_or(false) {
                continue;
            }

            let offset = sleep
                .timezone_offset
                .as_deref()
                .and_then(|o| o.parse::<FixedOffset>().ok());
            let start = parse_whoop_time(&sleep.start, offset);
            let end = parse_whoop_time(&sleep.end, offset);
            if start.is_none() || end.is_none() {
                warn!(
                    start = %sleep.start,
                    end = %sleep.end,
                    "Unparseable WHOOP sleep window, leaving it to record validation"
                );
            }

            let score = sleep.score.as_ref();
            records.push(RawSleepRecord {
                date: end
                    .map(|e| e.date().to_string())
                    .unwrap_or_else(|| sleep.end.clone()),
                total_sleep_time: score
                    .and_then(|sc| sc.stage_summary.as_ref())
                    .and_then(WhoopStageSummary::asleep_milli)
                    .map(|ms| ms as f64 / MILLIS_PER_HOUR),
                bedtime: Some(start.map(format_local).unwrap_or_else(|| sleep.start.clone())),
                wake_time: Some(end.map(format_local).unwrap_or_else(|| sleep.end.clone())),
                quality: score.and_then(|sc| sc.sleep_performance_percentage),
            });
        }

        Ok(longest_per_date(records))
    }
}

/// WHOOP times are ISO 8601 in UTC: "2024-01-15T08:30:00.000Z"
fn parse_whoop_time(time_str: &str, offset: Option<FixedOffset>) -> Option<NaiveDateTime> {
    let dt = DateTime::parse_from_rfc3339(time_str).ok()?;
    Some(match offset {
        Some(o) => dt.with_timezone(&o).naive_local(),
        None => dt.naive_local(),
    })
}

// WHOOP API response structures

#[derive(Debug, Deserialize)]
struct WhoopPayload {
    sleep: Option<Vec<WhoopSleep>>,
}

#[derive(Debug, Deserialize)]
struct WhoopSleep {
    start: String,
    end: String,
    timezone_offset: Option<String>,
    nap: Option<bool>,
    score: Option<WhoopSleepScore>,
}

#[derive(Debug, Deserialize)]
struct WhoopSleepScore {
    stage_summary: Option<WhoopStageSummary>,
    sleep_performance_percentage: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WhoopStageSummary {
    total_sleep_time_milli: Option<i64>,
    total_light_sleep_time_milli: Option<i64>,
    total_slow_wave_sleep_time_milli: Option<i64>,
    total_rem_sleep_time_milli: Option<i64>,
}

impl WhoopStageSummary {
    /// Reported total, else the sum of the sleep stages
    fn asleep_milli(&self) -> Option<i64> {
        self.total_sleep_time_milli.or_else(|| {
            match (
                self.total_light_sleep_time_milli,
                self.total_slow_wave_sleep_time_milli,
                self.total_rem_sleep_time_milli,
            ) {
                (None, None, None) => None,
                (light, deep, rem) => {
                    Some(light.unwrap_or(0) + deep.unwrap_or(0) + rem.unwrap_or(0))
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{HistoryParser, ValidationPolicy};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_whoop_payload() {
        let json = r#"{
            "sleep": [
                {
                    "start": "2024-01-15T04:10:00.000Z",
                    "end": "2024-01-15T11:40:00.000Z",
                    "timezone_offset": "-05:00",
                    "nap": false,
                    "score": {
                        "stage_summary": {
                            "total_light_sleep_time_milli": 12600000,
                            "total_slow_wave_sleep_time_milli": 6300000,
                            "total_rem_sleep_time_milli": 6300000
                        },
                        "sleep_performance_percentage": 88.0
                    }
                },
                {
                    "start": "2024-01-15T19:00:00.000Z",
                    "end": "2024-01-15T19:40:00.000Z",
                    "timezone_offset": "-05:00",
                    "nap": true
                }
            ]
        }"#;

        let records = WhoopSleepAdapter.parse(json).unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.date, "2024-01-15");
        assert_eq!(r.total_sleep_time, Some(7.0));
        assert_eq!(r.bedtime.as_deref(), Some("2024-01-14T23:10:00"));
        assert_eq!(r.wake_time.as_deref(), Some("2024-01-15T06:40:00"));
        assert_eq!(r.quality, Some(88.0));
    }

    #[test]
    fn test_unparseable_sleep_is_left_to_validation() {
        let json = r#"{
            "sleep": [
                {
                    "start": "2024-01-15T04:10:00.000Z",
                    "end": "2024-01-15T11:40:00.000Z",
                    "timezone_offset": "+05:30",
                    "score": { "stage_summary": { "total_sleep_time_milli": 25200000 } }
                },
                {"start": "yesterday", "end": "2024-01-16T12:00:00.000Z"},
                {"start": "yesterday", "end": "today"}
            ]
        }"#;

        let raw = WhoopSleepAdapter.parse(json).unwrap();
        assert_eq!(raw.len(), 3);
        assert_eq!(raw[0].bedtime.as_deref(), Some("2024-01-15T09:40:00"));
        assert_eq!(raw[1].bedtime.as_deref(), Some("yesterday"));

        let parsed = HistoryParser::into_history(&raw, ValidationPolicy::Lenient).unwrap();
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].total_sleep_time, 7.0);
        assert_eq!(parsed.rejected.len(), 2);

        assert!(matches!(
            HistoryParser::into_history(&raw, ValidationPolicy::Strict),
            Err(ComputeError::InvalidRecord { .. })
        ));
    }
}
