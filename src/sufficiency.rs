//! Data sufficiency gate
//!
//! Decides whether the history holds enough classified workdays and free days
//! to trust the baseline and chronotype, and tells the user what to log next.

use crate::baseline::BaselineEstimator;
use crate::config::{ModelConfig, SufficiencyConfig};
use crate::types::{ConfidenceLevel, DataSufficiency, SleepRecord};
use tracing::debug;

/// Confidence tier for a given number of classified workdays and free days.
///
/// Monotonic in both counts. Without free days there is nothing to estimate
/// the baseline from, so the tier is `Insufficient`.
pub fn confidence_for(
    workdays: u32,
    freedays: u32,
    config: &SufficiencyConfig,
) -> ConfidenceLevel {
    if freedays == 0 {
        return ConfidenceLevel::Insufficient;
    }

    let ratio = coverage_ratio(workdays, config.workdays_needed, config.high_confidence_ratio)
        .min(coverage_ratio(
            freedays,
            config.freedays_needed,
            config.high_confidence_ratio,
        ));

    if ratio < 1.0 {
        ConfidenceLevel::Low
    } else if ratio < config.high_confidence_ratio {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::High
    }
}

fn coverage_ratio(available: u32, needed: u32, saturation: f64) -> f64 {
    if needed == 0 {
        return saturation;
    }
    available as f64 / needed as f64
}

/// Build the verdict from raw counts
pub fn evaluate_counts(
    total_days: u32,
    workdays_available: u32,
    freedays_available: u32,
    config: &SufficiencyConfig,
) -> DataSufficiency {
    let workdays_needed = config.workdays_needed;
    let freedays_needed = config.freedays_needed;
    let sufficient =
        workdays_available >= workdays_needed && freedays_available >= freedays_needed;

    DataSufficiency {
        sufficient,
        total_days,
        workdays_available,
        freedays_available,
        workdays_needed,
        freedays_needed,
        projected_confidence: confidence_for(workdays_available, freedays_available, config),
        recommendation: recommendation(
            total_days,
            workdays_available,
            freedays_available,
            workdays_needed,
            freedays_needed,
        ),
    }
}

fn recommendation(
    total_days: u32,
    workdays_available: u32,
    freedays_available: u32,
    workdays_needed: u32,
    freedays_needed: u32,
) -> String {
    let missing_workdays = workdays_needed.saturating_sub(workdays_available);
    let missing_freedays = freedays_needed.saturating_sub(freedays_available);

    match (missing_workdays, missing_freedays) {
        (0, 0) => format!(
            "Enough history to personalize: {} and {} logged.",
            count(workdays_available, "workday", "workdays"),
            count(freedays_available, "free day", "free days"),
        ),
        _ if total_days == 0 => format!(
            "No sleep history yet. Log at least {} and {} to personalize your sleep profile.",
            count(workdays_needed, "workday", "workdays"),
            count(freedays_needed, "free day", "free days"),
        ),
        (w, 0) => format!(
            "Log {} more {} to personalize your sleep profile.",
            w,
            noun(w, "workday", "workdays")
        ),
        (0, f) => format!(
            "Log {} more {} to personalize your sleep profile.",
            f,
            noun(f, "free day", "free days")
        ),
        (w, f) => format!(
            "Log {} more {} and {} more {} to personalize your sleep profile.",
            w,
            noun(w, "workday", "workdays"),
            f,
            noun(f, "free day", "free days")
        ),
    }
}

fn noun<'a>(n: u32, singular: &'a str, plural: &'a str) -> &'a str {
    if n == 1 {
        singular
    } else {
        plural
    }
}

fn count(n: u32, singular: &str, plural: &str) -> String {
    format!("{} {}", n, noun(n, singular, plural))
}

/// Evaluates sleep history against the configured minimums
#[derive(Debug, Clone)]
pub struct DataSufficiencyGate {
    estimator: BaselineEstimator,
    config: SufficiencyConfig,
}

impl Default for DataSufficiencyGate {
    fn default() -> Self {
        Self::new(&ModelConfig::default())
    }
}

impl DataSufficiencyGate {
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            estimator: BaselineEstimator::new(config),
            config: config.sufficiency.clone(),
        }
    }

    /// Count classified days in the lookback window and judge them
    pub fn evaluate(&self, history: &[SleepRecord]) -> DataSufficiency {
        let labeled = self.estimator.label(history);
        let verdict = evaluate_counts(
            labeled.window.len() as u32,
            labeled.workdays.len() as u32,
            labeled.freedays.len() as u32,
            &self.config,
        );

        debug!(
            total_days = verdict.total_days,
            workdays = verdict.workdays_available,
            freedays = verdict.freedays_available,
            sufficient = verdict.sufficient,
            "Evaluated data sufficiency"
        );

        verdict
    }
}
