//! Sleep debt
//!
//! Builds per-day deficits against a sleep need and folds a rolling window of
//! them into a recency-weighted debt figure. The weighting is an exponential
//! decay, so a short run of bad nights shows up immediately while a deficit
//! from ten days ago has all but faded.

use crate::config::DebtConfig;
use crate::error::ComputeError;
use crate::types::{
    DebtCategory, DebtDailyEntry, DebtTrend, SleepDebtResult, SleepRecord, TrendDirection,
};
use chrono::NaiveDate;
use tracing::{debug, warn};

/// Recency weighting: `weight(d) = exp(-d / tau)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebtWeightModel {
    tau_days: f64,
}

impl Default for DebtWeightModel {
    fn default() -> Self {
        Self::new(DebtConfig::default().decay_tau_days)
    }
}

impl DebtWeightModel {
    /// Create a model with decay time constant `tau_days`.
    ///
    /// A non-finite or non-positive tau falls back to the default.
    pub fn new(tau_days: f64) -> Self {
        if tau_days.is_finite() && tau_days > 0.0 {
            return Self { tau_days };
        }
        let fallback = DebtConfig::default().decay_tau_days;
        warn!(tau_days, fallback, "Invalid debt decay tau, using default");
        Self { tau_days: fallback }
    }

    /// Choose tau so that `weight(horizon_days) == residual_weight`.
    ///
    /// Requires `horizon_days >= 1` and `0 < residual_weight < 1`.
    pub fn from_horizon(horizon_days: u32, residual_weight: f64) -> Result<Self, ComputeError> {
        if horizon_days == 0 {
            return Err(ComputeError::InvalidConfig(
                "debt horizon must be at least 1 day".to_string(),
            ));
        }
        if !(residual_weight > 0.0 && residual_weight < 1.0) {
            return Err(ComputeError::InvalidConfig(format!(
                "residual weight must be in (0, 1), got {}",
                residual_weight
            )));
        }
        Ok(Self::new(horizon_days as f64 / (1.0 / residual_weight).ln()))
    }

    pub fn tau_days(&self) -> f64 {
        self.tau_days
    }

    /// Weight of a deficit observed `days_ago` days before the reference day.
    ///
    /// `weight(0) == 1` and the weight strictly decreases with age.
    pub fn weight(&self, days_ago: u32) -> f64 {
        (-(days_ago as f64) / self.tau_days).exp()
    }
}

/// Build one day's deficit. Oversleep floors at zero and is never credited.
pub fn create_debt_entry(date: NaiveDate, actual: f64, needed: f64) -> DebtDailyEntry {
    let actual = sanitize_hours(actual, "actual", date);
    let needed = sanitize_hours(needed, "needed", date);

    DebtDailyEntry {
        date,
        actual,
        needed,
        debt: (needed - actual).max(0.0),
    }
}

/// Minimum whole nights of full recovery sleep to erase `debt_hours`
pub fn calculate_payback_nights(debt_hours: f64) -> u32 {
    if debt_hours > 0.0 && debt_hours.is_finite() {
        debt_hours.ceil() as u32
    } else {
        0
    }
}

/// Map a debt figure onto its category using the configured thresholds
pub fn debt_category_label(debt: f64, config: &DebtConfig) -> DebtCategory {
    if debt >= config.critical_threshold_hours {
        DebtCategory::Critical
    } else if debt >= config.high_threshold_hours {
        DebtCategory::High
    } else if debt >= config.moderate_threshold_hours {
        DebtCategory::Moderate
    } else {
        DebtCategory::Low
    }
}

/// Compute sleep debt from records with the default configuration
pub fn calculate_sleep_debt(history: &[SleepRecord], sleep_need: f64) -> SleepDebtResult {
    SleepDebtCalculator::default().calculate(history, sleep_need)
}

/// Rolling-window debt aggregator
#[derive(Debug, Clone)]
pub struct SleepDebtCalculator {
    config: DebtConfig,
    weights: DebtWeightModel,
}

impl Default for SleepDebtCalculator {
    fn default() -> Self {
        Self::new(DebtConfig::default())
    }
}

impl SleepDebtCalculator {
    pub fn new(config: DebtConfig) -> Self {
        let weights = DebtWeightModel::new(config.decay_tau_days);
        Self { config, weights }
    }

    pub fn weights(&self) -> &DebtWeightModel {
        &self.weights
    }

    pub fn category(&self, debt: f64) -> DebtCategory {
        debt_category_label(debt, &self.config)
    }

    /// Debt as of the latest record in `history`
    pub fn calculate(&self, history: &[SleepRecord], sleep_need: f64) -> SleepDebtResult {
        match history.iter().map(|r| r.date).max() {
            Some(today) => self.calculate_at(history, sleep_need, today),
            None => self.empty_result(sanitize_need(sleep_need)),
        }
    }

    /// Debt as of `today`, using `sleep_need` for every day
    pub fn calculate_at(
        &self,
        history: &[SleepRecord],
        sleep_need: f64,
        today: NaiveDate,
    ) -> SleepDebtResult {
        let sleep_need = sanitize_need(sleep_need);
        let entries: Vec<DebtDailyEntry> = history
            .iter()
            .filter(|r| self.days_ago(r.date, today).is_some())
            .map(|r| create_debt_entry(r.date, r.total_sleep_time, sleep_need))
            .collect();

        let mut result = self.aggregate(&entries, today);
        result.sleep_need = sleep_need;
        result
    }

    /// Aggregate pre-built entries (each carrying its own `needed`) as of `today`.
    ///
    /// Entries outside the window or dated after `today` are ignored; for
    /// duplicate dates the first entry wins.
    pub fn aggregate(&self, entries: &[DebtDailyEntry], today: NaiveDate) -> SleepDebtResult {
        let mut window: Vec<(u32, DebtDailyEntry)> = entries
            .iter()
            .filter_map(|e| self.days_ago(e.date, today).map(|d| (d, e.clone())))
            .collect();

        // Most recent first; stable so the first duplicate survives dedup
        window.sort_by_key(|(days_ago, _)| *days_ago);
        window.dedup_by_key(|(days_ago, _)| *days_ago);

        if window.is_empty() {
            let need = entries
                .first()
                .map(|e| e.needed)
                .unwrap_or(self.config.default_sleep_need_hours);
            return self.empty_result(need);
        }

        let current_debt: f64 = window
            .iter()
            .map(|(days_ago, e)| e.debt * self.weights.weight(*days_ago))
            .sum();

        let trend = self.trend(&window);
        let sleep_need = window[0].1.needed;
        let debt_category = self.category(current_debt);

        debug!(
            current_debt,
            days = window.len(),
            category = debt_category.as_str(),
            change_7d = trend.change_7d,
            "Computed sleep debt"
        );

        SleepDebtResult {
            current_debt,
            debt_category,
            sleep_need,
            last_14_days: window.into_iter().map(|(_, e)| e).collect(),
            trend,
            payback_time: calculate_payback_nights(current_debt),
        }
    }

    /// Compare mean daily debt of the recent half of the window against the prior half
    fn trend(&self, window: &[(u32, DebtDailyEntry)]) -> DebtTrend {
        let half = (self.config.window_days / 2).max(1);

        let recent: Vec<f64> = window
            .iter()
            .filter(|(d, _)| *d < half)
            .map(|(_, e)| e.debt)
            .collect();
        let prior: Vec<f64> = window
            .iter()
            .filter(|(d, _)| *d >= half)
            .map(|(_, e)| e.debt)
            .collect();

        let (Some(recent_mean), Some(prior_mean)) = (mean(&recent), mean(&prior)) else {
            return DebtTrend {
                direction: TrendDirection::Stable,
                change_7d: 0.0,
            };
        };

        let change_7d = recent_mean - prior_mean;
        let direction = if change_7d < -self.config.trend_threshold_hours {
            TrendDirection::Improving
        } else if change_7d > self.config.trend_threshold_hours {
            TrendDirection::Worsening
        } else {
            TrendDirection::Stable
        };

        DebtTrend {
            direction,
            change_7d,
        }
    }

    fn days_ago(&self, date: NaiveDate, today: NaiveDate) -> Option<u32> {
        let days = (today - date).num_days();
        if days < 0 || days >= self.config.window_days as i64 {
            return None;
        }
        Some(days as u32)
    }

    fn empty_result(&self, sleep_need: f64) -> SleepDebtResult {
        SleepDebtResult {
            current_debt: 0.0,
            debt_category: DebtCategory::Low,
            sleep_need,
            last_14_days: Vec::new(),
            trend: DebtTrend {
                direction: TrendDirection::Stable,
                change_7d: 0.0,
            },
            payback_time: 0,
        }
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn sanitize_hours(value: f64, field: &str, date: NaiveDate) -> f64 {
    if value.is_finite() && value >= 0.0 {
        value
    } else {
        warn!(%date, field, value, "Replacing invalid hours with 0");
        0.0
    }
}

fn sanitize_need(sleep_need: f64) -> f64 {
    if sleep_need.is_finite() && sleep_need >= 0.0 {
        sleep_need
    } else {
        warn!(sleep_need, "Invalid sleep need, treating as 0");
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 31).unwrap() - chrono::Duration::days(offset)
    }

    #[test]
    fn test_weight_shape() {
        let model = DebtWeightModel::default();
        assert_eq!(model.weight(0), 1.0);
        assert!(model.weight(14) < 0.01);
        for d in 0..60 {
            assert!(model.weight(d) > model.weight(d + 1));
            assert!(model.weight(d) > 0.0);
        }
    }

    #[test]
    fn test_weight_from_horizon() {
        let model = DebtWeightModel::from_horizon(14, 0.005).unwrap();
        assert!((model.weight(14) - 0.005).abs() < 1e-9);

        for residual in [0.0, 1.0, 1.5, -0.1, f64::NAN] {
            assert!(
                DebtWeightModel::from_horizon(14, residual).is_err(),
                "{}",
                residual
            );
        }
        assert!(DebtWeightModel::from_horizon(0, 0.005).is_err());
    }

    #[test]
    fn test_invalid_tau_falls_back_to_default() {
        for tau in [0.0, -2.0, f64::NAN, f64::INFINITY] {
            let model = DebtWeightModel::new(tau);
            assert_eq!(model, DebtWeightModel::default());
            assert_eq!(model.weight(0), 1.0);
            assert!(model.weight(1) > model.weight(2));
        }

        let history: Vec<SleepRecord> = (0..7).map(|d| SleepRecord::new(day(d), 6.0)).collect();
        let config = DebtConfig {
            decay_tau_days: 0.0,
            ..DebtConfig::default()
        };
        let result = SleepDebtCalculator::new(config).calculate(&history, 8.0);
        assert!(result.current_debt.is_finite());
        assert_eq!(result, calculate_sleep_debt(&history, 8.0));
    }

    #[test]
    fn test_payback_nights() {
        assert_eq!(calculate_payback_nights(0.0), 0);
        assert_eq!(calculate_payback_nights(-3.0), 0);
        assert_eq!(calculate_payback_nights(f64::NAN), 0);
        assert_eq!(calculate_payback_nights(2.3), 3);
        assert_eq!(calculate_payback_nights(5.0), 5);
    }

    #[test]
    fn test_category_labels() {
        let config = DebtConfig::default();
        assert_eq!(debt_category_label(0.0, &config), DebtCategory::Low);
        assert_eq!(debt_category_label(3.0, &config), DebtCategory::Moderate);
        assert_eq!(debt_category_label(6.0, &config), DebtCategory::High);
        assert_eq!(debt_category_label(10.0, &config), DebtCategory::Critical);
    }

    #[test]
    fn test_create_debt_entry() {
        let entry = create_debt_entry(day(0), 7.5, 8.25);
        assert!((entry.debt - 0.75).abs() < 1e-9);

        let oversleep = create_debt_entry(day(0), 9.0, 8.0);
        assert_eq!(oversleep.debt, 0.0);

        let garbage = create_debt_entry(day(0), f64::NAN, 8.0);
        assert_eq!(garbage.actual, 0.0);
        assert_eq!(garbage.debt, 8.0);
    }

    #[test]
    fn test_empty_history() {
        let result = calculate_sleep_debt(&[], 8.0);
        assert_eq!(result.current_debt, 0.0);
        assert_eq!(result.debt_category, DebtCategory::Low);
        assert_eq!(result.trend.direction, TrendDirection::Stable);
        assert_eq!(result.payback_time, 0);
        assert!(result.last_14_days.is_empty());
    }

    #[test]
    fn test_constant_deficit_accumulates() {
        let history: Vec<SleepRecord> = (0..7).map(|d| SleepRecord::new(day(d), 7.0)).collect();
        let result = calculate_sleep_debt(&history, 8.0);

        assert!(result.current_debt > 0.0);
        let expected: f64 = (0..7).map(|d| DebtWeightModel::default().weight(d)).sum();
        assert!((result.current_debt - expected).abs() < 1e-9);
        assert_eq!(result.payback_time, calculate_payback_nights(expected));
        assert_eq!(result.last_14_days.len(), 7);
        assert_eq!(result.last_14_days[0].date, day(0));
    }

    #[test]
    fn test_old_deficit_fades() {
        let recent = calculate_sleep_debt(&[SleepRecord::new(day(0), 5.0)], 8.0);
        let history = vec![SleepRecord::new(day(0), 8.0), SleepRecord::new(day(10), 5.0)];
        let old = calculate_sleep_debt(&history, 8.0);

        assert!((recent.current_debt - 3.0).abs() < 1e-9);
        assert!(old.current_debt < 0.1);
    }

    #[test]
    fn test_records_outside_window_ignored() {
        let history = vec![SleepRecord::new(day(0), 8.0), SleepRecord::new(day(20), 0.0)];
        let result = calculate_sleep_debt(&history, 8.0);
        assert_eq!(result.current_debt, 0.0);
        assert_eq!(result.last_14_days.len(), 1);
    }

    #[test]
    fn test_trend_improving_and_worsening() {
        let calc = SleepDebtCalculator::default();
        let today = day(0);

        // Recent 7 days: 0.5h deficit, prior 7 days: 2h deficit
        let improving: Vec<DebtDailyEntry> = (0..14)
            .map(|d| {
                let actual = if d < 7 { 7.5 } else { 6.0 };
                create_debt_entry(day(d), actual, 8.0)
            })
            .collect();
        let result = calc.aggregate(&improving, today);
        assert_eq!(result.trend.direction, TrendDirection::Improving);
        assert!((result.trend.change_7d + 1.5).abs() < 1e-9);

        let worsening: Vec<DebtDailyEntry> = (0..14)
            .map(|d| {
                let actual = if d < 7 { 6.0 } else { 7.5 };
                create_debt_entry(day(d), actual, 8.0)
            })
            .collect();
        let result = calc.aggregate(&worsening, today);
        assert_eq!(result.trend.direction, TrendDirection::Worsening);
        assert!((result.trend.change_7d - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_single_half_is_stable() {
        let history: Vec<SleepRecord> = (0..3).map(|d| SleepRecord::new(day(d), 6.0)).collect();
        let result = calculate_sleep_debt(&history, 8.0);
        assert_eq!(result.trend.direction, TrendDirection::Stable);
        assert_eq!(result.trend.change_7d, 0.0);
    }

    #[test]
    fn test_degenerate_sleep_need() {
        let history: Vec<SleepRecord> = (0..5).map(|d| SleepRecord::new(day(d), 6.0)).collect();

        let zero = calculate_sleep_debt(&history, 0.0);
        assert_eq!(zero.current_debt, 0.0);
        assert_eq!(zero.debt_category, DebtCategory::Low);

        let nan = calculate_sleep_debt(&history, f64::NAN);
        assert_eq!(nan.current_debt, 0.0);
        assert!(nan.current_debt.is_finite());
    }

    #[test]
    fn test_idempotent() {
        let history: Vec<SleepRecord> = (0..14)
            .map(|d| SleepRecord::new(day(d), 6.0 + (d % 3) as f64))
            .collect();
        let first = calculate_sleep_debt(&history, 8.0);
        let second = calculate_sleep_debt(&history, 8.0);
        assert_eq!(first, second);
        assert_eq!(first.current_debt.to_bits(), second.current_debt.to_bits());
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let mut history: Vec<SleepRecord> = (0..10)
            .map(|d| SleepRecord::new(day(d), 5.0 + (d % 4) as f64))
            .collect();
        let forward = calculate_sleep_debt(&history, 8.0);
        history.reverse();
        let backward = calculate_sleep_debt(&history, 8.0);
        assert_eq!(forward, backward);
    }
}
