//! Chronotype classification
//!
//! Buckets the free-day mid-sleep, corrected for catch-up sleep, into early,
//! intermediate or late, and places the circadian landmarks the energy curve
//! is anchored on.

use crate::clock;
use crate::config::{ChronotypeConfig, ModelConfig};
use crate::types::{Chronotype, ChronotypeResult, MctqProfile, TimeWindow};
use tracing::debug;

/// Derives chronotype and circadian landmarks from an MCTQ profile
#[derive(Debug, Clone, Default)]
pub struct ChronotypeClassifier {
    config: ChronotypeConfig,
}

impl ChronotypeClassifier {
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            config: config.chronotype.clone(),
        }
    }

    /// Classify a profile. Unusable profiles yield `success: false`.
    pub fn classify(&self, profile: &MctqProfile) -> ChronotypeResult {
        if !profile.is_usable() {
            return ChronotypeResult::insufficient(format!(
                "Not enough free-day history to determine chronotype ({} free days classified)",
                profile.freedays_used
            ));
        }

        let (Some(msf), Some(free_need)) = (profile.sd_freeday, profile.baseline_sleep_need)
        else {
            return ChronotypeResult::insufficient("Baseline profile is missing free-day timing");
        };

        let corrected = corrected_midsleep(
            msf,
            free_need,
            profile.avg_sleep_workday,
            profile.workdays_per_week,
        );

        let relative = clock::relative_to_midnight(corrected);
        let chronotype = if relative < self.config.early_before_hour {
            Chronotype::Early
        } else if relative > self.config.late_after_hour {
            Chronotype::Late
        } else {
            Chronotype::Intermediate
        };

        let average_wake_time = profile
            .average_wake_hour
            .unwrap_or_else(|| clock::wrap_hour(corrected + free_need / 2.0));
        let habitual_sleep_onset = profile
            .average_onset_hour
            .unwrap_or_else(|| clock::wrap_hour(corrected - free_need / 2.0));

        let circadian_nadir =
            clock::wrap_hour(average_wake_time - self.config.nadir_before_wake_hours);
        let circadian_acrophase =
            clock::wrap_hour(corrected + self.config.acrophase_after_midsleep_hours);
        let melatonin_window = TimeWindow {
            start: clock::wrap_hour(habitual_sleep_onset - self.config.melatonin_window_hours),
            end: habitual_sleep_onset,
        };

        debug!(
            ?chronotype,
            corrected_midsleep = %clock::format_hour(corrected),
            acrophase = %clock::format_hour(circadian_acrophase),
            "Classified chronotype"
        );

        ChronotypeResult {
            success: true,
            message: None,
            chronotype: Some(chronotype),
            corrected_midsleep: Some(corrected),
            average_wake_time: Some(average_wake_time),
            habitual_sleep_onset: Some(habitual_sleep_onset),
            circadian_nadir: Some(circadian_nadir),
            circadian_acrophase: Some(circadian_acrophase),
            melatonin_window: Some(melatonin_window),
            confidence: profile.confidence,
        }
    }
}

/// MSF_sc: free-day mid-sleep minus half the catch-up sleep.
///
/// Only applied when free days are longer than workdays. The weekly average
/// duration weights workdays and free days by how many of each the week has.
pub fn corrected_midsleep(
    msf: f64,
    free_need: f64,
    workday_sleep: Option<f64>,
    workdays_per_week: u8,
) -> f64 {
    match workday_sleep {
        Some(work) if free_need > work && (1..=6).contains(&workdays_per_week) => {
            let wd = workdays_per_week as f64;
            let weekly = (work * wd + free_need * (7.0 - wd)) / 7.0;
            clock::wrap_hour(msf - (free_need - weekly) / 2.0)
        }
        _ => msf,
    }
}
