//! Raw sleep record wire shape
//!
//! Callers and vendor adapters hand the engine loosely-typed records: dates
//! and clock times as strings, durations that may be missing. Validation turns
//! each one into a `SleepRecord` or explains why it cannot.

use crate::types::SleepRecord;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// Longest plausible single sleep (hours)
pub const MAX_SLEEP_HOURS: f64 = 24.0;

const DATE_TIME_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

const TIME_FORMATS: [&str; 2] = ["%H:%M:%S", "%H:%M"];

/// One night as received on the wire
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawSleepRecord {
    /// Wake date, `YYYY-MM-DD`
    pub date: String,
    /// Total sleep time (hours)
    #[serde(default, alias = "totalSleepTime", skip_serializing_if = "Option::is_none")]
    pub total_sleep_time: Option<f64>,
    /// Local date-time `YYYY-MM-DDTHH:MM[:SS]` or bare clock time `HH:MM`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bedtime: Option<String>,
    #[serde(default, alias = "wakeTime", skip_serializing_if = "Option::is_none")]
    pub wake_time: Option<String>,
    /// 0-100
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<f64>,
}

/// Time field as parsed, before anchoring on a calendar date
#[derive(Debug, Clone, Copy)]
enum ParsedTime {
    Absolute(NaiveDateTime),
    Clock(NaiveTime),
}

impl RawSleepRecord {
    pub fn new(date: impl Into<String>, total_sleep_time: f64) -> Self {
        Self {
            date: date.into(),
            total_sleep_time: Some(total_sleep_time),
            ..Default::default()
        }
    }

    pub fn with_times(mut self, bedtime: impl Into<String>, wake_time: impl Into<String>) -> Self {
        self.bedtime = Some(bedtime.into());
        self.wake_time = Some(wake_time.into());
        self
    }

    /// Validate and convert into a `SleepRecord`
    pub fn validate(&self) -> Result<SleepRecord, ValidationError> {
        let date = NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d").map_err(|_| {
            ValidationError::InvalidDate {
                value: self.date.clone(),
            }
        })?;

        let wake = self
            .wake_time
            .as_deref()
            .map(|v| parse_time("wake_time", v))
            .transpose()?;
        let bed = self
            .bedtime
            .as_deref()
            .map(|v| parse_time("bedtime", v))
            .transpose()?;

        let wake_time = wake.map(|w| match w {
            ParsedTime::Absolute(dt) => dt,
            ParsedTime::Clock(t) => date.and_time(t),
        });
        let bedtime = bed.map(|b| match b {
            ParsedTime::Absolute(dt) => dt,
            ParsedTime::Clock(t) => anchor_bedtime(date, t, wake_time),
        });

        if let (Some(bed), Some(wake)) = (bedtime, wake_time) {
            if bed >= wake {
                return Err(ValidationError::BedtimeAfterWake);
            }
        }

        let total_sleep_time = match (self.total_sleep_time, bedtime, wake_time) {
            (Some(hours), _, _) => hours,
            (None, Some(bed), Some(wake)) => (wake - bed).num_seconds() as f64 / 3600.0,
            (None, _, _) => return Err(ValidationError::MissingDuration),
        };

        if !total_sleep_time.is_finite() {
            return Err(ValidationError::NonFiniteDuration);
        }
        if total_sleep_time < 0.0 {
            return Err(ValidationError::NegativeDuration(total_sleep_time));
        }
        if total_sleep_time > MAX_SLEEP_HOURS {
            return Err(ValidationError::DurationOutOfRange(total_sleep_time));
        }

        if let Some(q) = self.quality {
            if !q.is_finite() || !(0.0..=100.0).contains(&q) {
                return Err(ValidationError::QualityOutOfRange(q));
            }
        }

        Ok(SleepRecord {
            date,
            total_sleep_time,
            bedtime,
            wake_time,
            quality: self.quality,
        })
    }
}

/// Parse a local date-time such as `2024-03-24T11:00` or `2024-03-24 11:00:00`
pub fn parse_local_datetime(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    DATE_TIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(trimmed, f).ok())
}

fn parse_time(field: &'static str, value: &str) -> Result<ParsedTime, ValidationError> {
    if let Some(dt) = parse_local_datetime(value) {
        return Ok(ParsedTime::Absolute(dt));
    }
    let trimmed = value.trim();
    if let Some(t) = TIME_FORMATS
        .iter()
        .find_map(|f| NaiveTime::parse_from_str(trimmed, f).ok())
    {
        return Ok(ParsedTime::Clock(t));
    }
    Err(ValidationError::InvalidTime {
        field,
        value: value.to_string(),
    })
}

/// A bare bedtime belongs to the evening before the wake date when it is
/// later on the clock than the wake time. Without a wake time, afternoon and
/// evening clock times are taken to be the previous evening.
fn anchor_bedtime(date: NaiveDate, time: NaiveTime, wake: Option<NaiveDateTime>) -> NaiveDateTime {
    let previous_evening = match wake {
        Some(w) => time > w.time(),
        None => time.hour() >= 12,
    };
    if previous_evening {
        date.and_time(time) - Duration::days(1)
    } else {
        date.and_time(time)
    }
}

/// Record-level validation failures
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid date '{value}', expected YYYY-MM-DD")]
    InvalidDate { value: String },

    #[error("Invalid {field} '{value}', expected YYYY-MM-DDTHH:MM[:SS] or HH:MM")]
    InvalidTime { field: &'static str, value: String },

    #[error("Negative sleep duration: {0} h")]
    NegativeDuration(f64),

    #[error("Sleep duration is not a finite number")]
    NonFiniteDuration,

    #[error("Sleep duration {0} h exceeds 24 h")]
    DurationOutOfRange(f64),

    #[error("Sleep duration missing and cannot be derived from bedtime and wake time")]
    MissingDuration,

    #[error("Bedtime is not before wake time")]
    BedtimeAfterWake,

    #[error("Quality {0} outside 0-100")]
    QualityOutOfRange(f64),

    #[error("Duplicate record for {0}")]
    DuplicateDate(NaiveDate),
}
