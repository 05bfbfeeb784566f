//! Core types for the Synheart Circadian engine
//!
//! This module defines the validated input record and every result structure
//! the engine produces: debt entries and aggregates, the MCTQ-style baseline
//! profile, chronotype landmarks, the hourly energy curve, and the
//! data-sufficiency verdict. All of them are plain values, computed fresh on
//! every call and never mutated after return.

use crate::clock;
use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};

/// One night's validated sleep record.
///
/// `date` is the calendar date of the wake-up, so a night starting on Sunday
/// evening and ending Monday morning is recorded on Monday.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepRecord {
    /// Wake date of the night
    pub date: NaiveDate,
    /// Total sleep time (hours, >= 0)
    pub total_sleep_time: f64,
    /// Local bedtime / sleep onset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bedtime: Option<NaiveDateTime>,
    /// Local wake time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wake_time: Option<NaiveDateTime>,
    /// Subjective or vendor quality score (0-100)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<f64>,
}

impl SleepRecord {
    /// Create a record with only a date and a duration
    pub fn new(date: NaiveDate, total_sleep_time: f64) -> Self {
        Self {
            date,
            total_sleep_time,
            bedtime: None,
            wake_time: None,
            quality: None,
        }
    }

    pub fn with_bedtime(mut self, bedtime: NaiveDateTime) -> Self {
        self.bedtime = Some(bedtime);
        self
    }

    pub fn with_wake_time(mut self, wake_time: NaiveDateTime) -> Self {
        self.wake_time = Some(wake_time);
        self
    }

    pub fn with_quality(mut self, quality: f64) -> Self {
        self.quality = Some(quality);
        self
    }

    /// Day of week of the wake date
    pub fn day_of_week(&self) -> Weekday {
        self.date.weekday()
    }

    /// Wake time as a fractional clock hour in [0, 24)
    pub fn wake_hour(&self) -> Option<f64> {
        self.wake_time.map(clock::hour_of)
    }

    /// Clock-time midpoint between sleep onset and wake.
    ///
    /// Falls back to `wake - total_sleep_time / 2` when no bedtime is known.
    pub fn mid_sleep_hour(&self) -> Option<f64> {
        let wake = self.wake_time?;
        match self.bedtime {
            Some(bed) if bed < wake => {
                let half = (wake - bed) / 2;
                Some(clock::hour_of(bed + half))
            }
            _ => Some(clock::wrap_hour(
                clock::hour_of(wake) - self.total_sleep_time / 2.0,
            )),
        }
    }

    /// Sleep onset as a clock hour, derived from wake time when bedtime is absent
    pub fn onset_hour(&self) -> Option<f64> {
        match (self.bedtime, self.wake_time) {
            (Some(bed), _) => Some(clock::hour_of(bed)),
            (None, Some(wake)) => Some(clock::wrap_hour(
                clock::hour_of(wake) - self.total_sleep_time,
            )),
            _ => None,
        }
    }
}

/// One day's deficit against the sleep need
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebtDailyEntry {
    pub date: NaiveDate,
    /// Hours actually slept
    pub actual: f64,
    /// Hours needed
    pub needed: f64,
    /// `max(needed - actual, 0)`
    pub debt: f64,
}

/// Coarse sleep debt category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebtCategory {
    Low,
    Moderate,
    High,
    Critical,
}

impl DebtCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DebtCategory::Low => "low",
            DebtCategory::Moderate => "moderate",
            DebtCategory::High => "high",
            DebtCategory::Critical => "critical",
        }
    }
}

/// Direction of the week-over-week debt trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Improving,
    Stable,
    Worsening,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebtTrend {
    pub direction: TrendDirection,
    /// Mean daily debt of the recent 7 days minus that of the prior 7 (hours)
    pub change_7d: f64,
}

/// Rolling, recency-weighted sleep debt aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepDebtResult {
    /// Recency-weighted debt (hours, >= 0)
    pub current_debt: f64,
    pub debt_category: DebtCategory,
    /// Sleep need used for entries built from records (hours)
    pub sleep_need: f64,
    /// Entries inside the window, most recent first
    pub last_14_days: Vec<DebtDailyEntry>,
    pub trend: DebtTrend,
    /// Whole nights of full recovery sleep needed to erase the debt
    pub payback_time: u32,
}

/// Workday / free-day label for a weekday bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayType {
    Workday,
    FreeDay,
    /// Too few samples to trust a label
    Unclassified,
}

/// Wake-time pattern of one weekday across the history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayClassification {
    pub day_of_week: Weekday,
    pub classified_as: DayType,
    /// Circular mean wake clock hour
    pub mean_wake_hour: Option<f64>,
    /// Wake-time standard deviation (minutes)
    pub variance_minutes: Option<f64>,
    pub sample_count: u32,
}

/// Confidence tier shared by the baseline, chronotype and sufficiency gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    Insufficient,
    Low,
    Medium,
    High,
}

/// How the baseline was derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimationMethod {
    /// Both workdays and free days available
    Mctq,
    /// Free days only; no social jetlag
    FreeDayOnly,
    Insufficient,
}

/// MCTQ-style baseline inferred from workday/free-day sleep timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MctqProfile {
    /// Mean total sleep on free days (hours)
    pub baseline_sleep_need: Option<f64>,
    /// Mean total sleep on workdays (hours)
    pub avg_sleep_workday: Option<f64>,
    /// Mid-sleep clock hour on workdays
    pub sd_workday: Option<f64>,
    /// Mid-sleep clock hour on free days
    pub sd_freeday: Option<f64>,
    /// `|sd_freeday - sd_workday|` on the clock circle (hours)
    pub social_jetlag: Option<f64>,
    /// Circular mean wake clock hour across all records with a wake time
    pub average_wake_hour: Option<f64>,
    /// Circular mean sleep-onset clock hour across the same records
    pub average_onset_hour: Option<f64>,
    /// Weekday buckets labelled as workdays
    pub workdays_per_week: u8,
    pub method: EstimationMethod,
    pub confidence: ConfidenceLevel,
    /// Records actually used (workday + free-day)
    pub based_on_days: u32,
    pub workdays_used: u32,
    pub freedays_used: u32,
    pub day_classifications: Vec<DayClassification>,
}

impl MctqProfile {
    /// Whether downstream components may consume this profile
    pub fn is_usable(&self) -> bool {
        self.baseline_sleep_need.is_some()
            && self.sd_freeday.is_some()
            && self.confidence != ConfidenceLevel::Insufficient
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Chronotype {
    Early,
    Intermediate,
    Late,
}

/// Clock-hour window; `end` may be numerically smaller than `start` when it
/// crosses midnight
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: f64,
    pub end: f64,
}

impl TimeWindow {
    /// Whether a clock hour falls inside the window (start inclusive)
    pub fn contains(&self, hour: f64) -> bool {
        clock::in_window(hour, self.start, self.end)
    }
}

/// Circadian phase classification and landmark clock times
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChronotypeResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub chronotype: Option<Chronotype>,
    /// Free-day mid-sleep corrected for catch-up sleep
    pub corrected_midsleep: Option<f64>,
    pub average_wake_time: Option<f64>,
    /// Habitual sleep onset clock hour
    pub habitual_sleep_onset: Option<f64>,
    pub circadian_nadir: Option<f64>,
    pub circadian_acrophase: Option<f64>,
    pub melatonin_window: Option<TimeWindow>,
    pub confidence: ConfidenceLevel,
}

impl ChronotypeResult {
    /// Failed result carrying an explanation
    pub fn insufficient(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            chronotype: None,
            corrected_midsleep: None,
            average_wake_time: None,
            habitual_sleep_onset: None,
            circadian_nadir: None,
            circadian_acrophase: None,
            melatonin_window: None,
            confidence: ConfidenceLevel::Insufficient,
        }
    }
}

/// Zone label of an hour on the energy curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnergyZone {
    Peak,
    Rising,
    Dip,
    WindDown,
    Sleep,
}

/// One hour's projected state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyCurvePoint {
    /// Clock hour (0-23)
    pub hour: u8,
    /// Projected energy (0-100)
    pub energy: f64,
    pub zone: EnergyZone,
    /// Homeostatic pressure (0-1)
    pub process_s: f64,
    /// Circadian drive (0-1)
    pub process_c: f64,
}

/// A local extremum on the curve, located relative to "now"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveLandmark {
    pub hour: u8,
    pub energy: f64,
    /// Whole hours after the current hour (1-23)
    pub hours_ahead: u8,
}

/// Full-day energy projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyCurveSummary {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub points: Vec<EnergyCurvePoint>,
    pub current_energy: Option<f64>,
    pub current_zone: Option<EnergyZone>,
    pub next_peak: Option<CurveLandmark>,
    pub next_dip: Option<CurveLandmark>,
    pub melatonin_window: Option<TimeWindow>,
    /// Fractional energy reduction applied for sleep debt
    pub debt_penalty: f64,
}

impl EnergyCurveSummary {
    pub fn insufficient(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            points: Vec::new(),
            current_energy: None,
            current_zone: None,
            next_peak: None,
            next_dip: None,
            melatonin_window: None,
            debt_penalty: 0.0,
        }
    }
}

/// Gating verdict on whether the history can support personalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSufficiency {
    pub sufficient: bool,
    pub total_days: u32,
    pub workdays_available: u32,
    pub freedays_available: u32,
    pub workdays_needed: u32,
    pub freedays_needed: u32,
    pub projected_confidence: ConfidenceLevel,
    pub recommendation: String,
}

/// Where the sleep need used for debt came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SleepNeedSource {
    /// Supplied by the caller
    Override,
    /// Estimated free-day baseline
    Baseline,
    /// Configured population default
    Default,
}

/// Everything the engine derives from one history window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepReport {
    pub sufficiency: DataSufficiency,
    pub profile: MctqProfile,
    pub chronotype: ChronotypeResult,
    pub sleep_need_source: SleepNeedSource,
    pub debt: SleepDebtResult,
    pub energy: EnergyCurveSummary,
}
