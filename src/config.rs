//! Model configuration
//!
//! Every tunable constant of the engine lives here so the algorithms can be
//! calibrated without touching them. Defaults follow the published sources
//! noted on each group.
//!
//! # References
//!
//! - Debt decay: recovery studies show debt older than ~2 weeks no longer
//!   predicts next-day impairment (Van Dongen et al. 2003)
//! - MCTQ: Roenneberg et al. (2003, 2012) mid-sleep and catch-up correction
//! - Two-process model: Borbely (1982), Daan, Beersma & Borbely (1984)

use crate::error::ComputeError;
use serde::{Deserialize, Serialize};

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub debt: DebtConfig,
    #[serde(default)]
    pub baseline: BaselineConfig,
    #[serde(default)]
    pub chronotype: ChronotypeConfig,
    #[serde(default)]
    pub energy: EnergyConfig,
    #[serde(default)]
    pub sufficiency: SufficiencyConfig,
}

/// Sleep debt weighting, categories and trend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebtConfig {
    /// Exponential decay time constant (days); weight(14) < 0.01 requires < 3.04
    pub decay_tau_days: f64,
    /// Days in the rolling window
    pub window_days: u32,
    /// Debt at or above this is moderate (hours)
    pub moderate_threshold_hours: f64,
    /// Debt at or above this is high (hours)
    pub high_threshold_hours: f64,
    /// Debt at or above this is critical (hours)
    pub critical_threshold_hours: f64,
    /// Minimum change in mean daily debt to call a trend (hours)
    pub trend_threshold_hours: f64,
    /// Sleep need when neither caller nor baseline provides one (hours)
    pub default_sleep_need_hours: f64,
}

impl Default for DebtConfig {
    fn default() -> Self {
        Self {
            decay_tau_days: 3.0,
            window_days: 14,
            moderate_threshold_hours: 2.0,
            high_threshold_hours: 5.0,
            critical_threshold_hours: 8.0,
            trend_threshold_hours: 0.25,
            default_sleep_need_hours: 8.0,
        }
    }
}

/// Workday / free-day classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineConfig {
    /// Days of history considered, counted back from the latest record
    pub lookback_days: u32,
    /// Records a weekday needs before its label is trusted
    pub min_samples_per_weekday: u32,
    /// Wake-time SD at or below which a weekday looks alarm-driven (minutes)
    pub workday_max_sd_minutes: f64,
    /// Workday mean wake must be within this of the earliest weekday mean (minutes)
    pub workday_max_wake_offset_minutes: f64,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            lookback_days: 28,
            min_samples_per_weekday: 2,
            workday_max_sd_minutes: 45.0,
            workday_max_wake_offset_minutes: 60.0,
        }
    }
}

/// Chronotype cut points and circadian landmark offsets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChronotypeConfig {
    /// Corrected mid-sleep before this clock hour is early
    pub early_before_hour: f64,
    /// Corrected mid-sleep after this clock hour is late
    pub late_after_hour: f64,
    /// Core body temperature minimum precedes habitual wake by this (hours)
    pub nadir_before_wake_hours: f64,
    /// Alertness acrophase follows corrected mid-sleep by this (hours)
    pub acrophase_after_midsleep_hours: f64,
    /// Length of the melatonin window ending at habitual sleep onset (hours)
    pub melatonin_window_hours: f64,
}

impl Default for ChronotypeConfig {
    fn default() -> Self {
        Self {
            early_before_hour: 3.5,
            late_after_hour: 5.5,
            nadir_before_wake_hours: 2.0,
            acrophase_after_midsleep_hours: 12.0,
            melatonin_window_hours: 2.0,
        }
    }
}

/// Two-process energy model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnergyConfig {
    /// Process S upper asymptote
    pub s_upper_asymptote: f64,
    /// Process S rise time constant while awake (hours)
    pub s_rise_tau_hours: f64,
    /// Process S decay time constant while asleep (hours)
    pub s_decay_tau_hours: f64,
    /// Weight of Process C in the energy blend (Process S gets the rest)
    pub circadian_weight: f64,
    /// Amplitude of the 12 h harmonic producing the afternoon dip
    pub dip_amplitude: f64,
    /// Dip amplitude added per hour of debt
    pub dip_amplitude_per_debt_hour: f64,
    pub max_dip_amplitude: f64,
    /// Afternoon dip precedes the acrophase by this (hours)
    pub dip_before_acrophase_hours: f64,
    /// Dip moves earlier by this per hour of debt (hours)
    pub dip_shift_per_debt_hour: f64,
    pub max_dip_shift_hours: f64,
    /// Fractional energy lost per hour of debt
    pub debt_penalty_per_hour: f64,
    pub max_debt_penalty: f64,
    /// Residual Process S carried past wake per hour of debt
    pub residual_pressure_per_debt_hour: f64,
    pub max_residual_pressure: f64,
    /// Hours at or above this fraction of the day's awake maximum are peak
    pub peak_fraction: f64,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            s_upper_asymptote: 1.0,
            s_rise_tau_hours: 18.2,
            s_decay_tau_hours: 4.2,
            circadian_weight: 0.6,
            dip_amplitude: 0.5,
            dip_amplitude_per_debt_hour: 0.03,
            max_dip_amplitude: 0.8,
            dip_before_acrophase_hours: 2.0,
            dip_shift_per_debt_hour: 0.15,
            max_dip_shift_hours: 1.5,
            debt_penalty_per_hour: 0.04,
            max_debt_penalty: 0.4,
            residual_pressure_per_debt_hour: 0.02,
            max_residual_pressure: 0.3,
            peak_fraction: 0.92,
        }
    }
}

/// Minimum history before personalization is trusted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SufficiencyConfig {
    pub workdays_needed: u32,
    pub freedays_needed: u32,
    /// Available/needed ratio at which confidence becomes high
    pub high_confidence_ratio: f64,
}

impl Default for SufficiencyConfig {
    fn default() -> Self {
        Self {
            workdays_needed: 5,
            freedays_needed: 2,
            high_confidence_ratio: 2.0,
        }
    }
}

impl ModelConfig {
    /// Load configuration from JSON; missing groups and fields take defaults
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let config: ModelConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to pretty JSON
    pub fn to_json(&self) -> Result<String, ComputeError> {
        serde_json::to_string_pretty(self).map_err(ComputeError::JsonError)
    }

    /// Reject settings the algorithms cannot honour
    pub fn validate(&self) -> Result<(), ComputeError> {
        let debt = &self.debt;
        if !(debt.decay_tau_days.is_finite() && debt.decay_tau_days > 0.0) {
            return Err(invalid("debt.decay_tau_days must be positive"));
        }
        if debt.window_days == 0 {
            return Err(invalid("debt.window_days must be at least 1"));
        }
        if !(0.0 < debt.moderate_threshold_hours
            && debt.moderate_threshold_hours < debt.high_threshold_hours
            && debt.high_threshold_hours < debt.critical_threshold_hours)
        {
            return Err(invalid(
                "debt thresholds must satisfy 0 < moderate < high < critical",
            ));
        }
        if debt.trend_threshold_hours < 0.0 {
            return Err(invalid("debt.trend_threshold_hours must not be negative"));
        }
        if !(debt.default_sleep_need_hours > 0.0 && debt.default_sleep_need_hours <= 24.0) {
            return Err(invalid("debt.default_sleep_need_hours must be in (0, 24]"));
        }

        let baseline = &self.baseline;
        if baseline.lookback_days == 0 {
            return Err(invalid("baseline.lookback_days must be at least 1"));
        }
        if baseline.min_samples_per_weekday == 0 {
            return Err(invalid("baseline.min_samples_per_weekday must be at least 1"));
        }

        let chrono = &self.chronotype;
        if chrono.early_before_hour >= chrono.late_after_hour {
            return Err(invalid(
                "chronotype.early_before_hour must precede late_after_hour",
            ));
        }
        if chrono.melatonin_window_hours <= 0.0 {
            return Err(invalid("chronotype.melatonin_window_hours must be positive"));
        }

        let energy = &self.energy;
        if energy.s_rise_tau_hours <= 0.0 || energy.s_decay_tau_hours <= 0.0 {
            return Err(invalid("energy Process S time constants must be positive"));
        }
        if !(0.0..=1.0).contains(&energy.circadian_weight) {
            return Err(invalid("energy.circadian_weight must be in [0, 1]"));
        }
        if !(0.0..1.0).contains(&energy.max_debt_penalty) {
            return Err(invalid("energy.max_debt_penalty must be in [0, 1)"));
        }
        if !(0.0..=1.0).contains(&energy.peak_fraction) {
            return Err(invalid("energy.peak_fraction must be in [0, 1]"));
        }

        if self.sufficiency.high_confidence_ratio < 1.0 {
            return Err(invalid("sufficiency.high_confidence_ratio must be >= 1"));
        }

        Ok(())
    }
}

fn invalid(msg: &str) -> ComputeError {
    ComputeError::InvalidConfig(msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ModelConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config = ModelConfig::from_json(r#"{"debt": {"decay_tau_days": 2.5}}"#).unwrap();
        assert_eq!(config.debt.decay_tau_days, 2.5);
        assert_eq!(config.debt.window_days, 14);
        assert_eq!(config.sufficiency, SufficiencyConfig::default());
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        let mut config = ModelConfig::default();
        config.debt.high_threshold_hours = 1.0;
        assert!(matches!(
            config.validate(),
            Err(ComputeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_non_positive_tau() {
        let result = ModelConfig::from_json(r#"{"debt": {"decay_tau_days": 0.0}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_serialization() {
        let config = ModelConfig::default();
        let json = config.to_json().unwrap();
        let loaded = ModelConfig::from_json(&json).unwrap();
        assert_eq!(config, loaded);
    }
}
