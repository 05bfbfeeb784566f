//! Pipeline orchestration
//!
//! This module provides the public API for Synheart Circadian. It runs the
//! full data flow from a sleep history to a report: sufficiency gate,
//! baseline, chronotype, debt, energy curve.

use crate::adapters::adapter_for;
use crate::baseline::BaselineEstimator;
use crate::cache::{CacheKey, CachedProfile, ProfileCache};
use crate::chronotype::ChronotypeClassifier;
use crate::config::ModelConfig;
use crate::debt::SleepDebtCalculator;
use crate::encoder::ReportEncoder;
use crate::energy::EnergyCurveSimulator;
use crate::error::ComputeError;
use crate::schema::{HistoryParser, ParsedHistory, RawSleepRecord, RejectedRecord, ValidationPolicy};
use crate::sufficiency::DataSufficiencyGate;
use crate::types::{SleepNeedSource, SleepRecord, SleepReport};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Report plus the records dropped while validating its input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutput {
    pub report: SleepReport,
    #[serde(default)]
    pub rejected: Vec<RejectedRecord>,
}

/// Compute the full report for one history.
///
/// Sleep need for the debt is the override when it is a positive number,
/// else the estimated free-day baseline, else the configured default. Debt
/// is measured as of `now`'s date.
pub fn analyze_history(
    history: &[SleepRecord],
    now: NaiveDateTime,
    sleep_need_override: Option<f64>,
    config: &ModelConfig,
) -> SleepReport {
    let profile = estimate_profile(history, config);
    assemble_report(history, now, sleep_need_override, config, profile)
}

/// Parse raw records (JSON array), then compute the report as JSON.
///
/// # Example
/// ```ignore
/// let json = sleep_report_from_json(records_json, now, ValidationPolicy::Lenient)?;
/// ```
pub fn sleep_report_from_json(
    raw_json: &str,
    now: NaiveDateTime,
    policy: ValidationPolicy,
) -> Result<String, ComputeError> {
    let raw = HistoryParser::parse_array(raw_json)?;
    let parsed = HistoryParser::into_history(&raw, policy)?;
    let report = analyze_history(&parsed.records, now, None, &ModelConfig::default());

    let output = AnalysisOutput {
        report,
        rejected: parsed.rejected,
    };
    serde_json::to_string_pretty(&output).map_err(ComputeError::JsonError)
}

/// Decode raw records from a named source.
///
/// `records` takes a JSON array of raw sleep records, `records-ndjson` one per
/// line; `garmin` and `whoop` take vendor payloads.
pub fn load_raw_records(source: &str, input: &str) -> Result<Vec<RawSleepRecord>, ComputeError> {
    match source {
        "records" => HistoryParser::parse_array(input),
        "records-ndjson" => HistoryParser::parse_ndjson(input),
        vendor => adapter_for(vendor)?.parse(input),
    }
}

fn estimate_profile(history: &[SleepRecord], config: &ModelConfig) -> CachedProfile {
    let profile = BaselineEstimator::new(config).estimate(history);
    let chronotype = ChronotypeClassifier::new(config).classify(&profile);
    CachedProfile {
        profile,
        chronotype,
    }
}

fn resolve_sleep_need(
    sleep_need_override: Option<f64>,
    baseline: Option<f64>,
    config: &ModelConfig,
) -> (f64, SleepNeedSource) {
    match sleep_need_override {
        Some(need) if need.is_finite() && need > 0.0 => return (need, SleepNeedSource::Override),
        Some(need) => warn!(need, "Ignoring non-positive sleep need override"),
        None => {}
    }
    match baseline {
        Some(need) if need > 0.0 => (need, SleepNeedSource::Baseline),
        _ => (config.debt.default_sleep_need_hours, SleepNeedSource::Default),
    }
}

fn assemble_report(
    history: &[SleepRecord],
    now: NaiveDateTime,
    sleep_need_override: Option<f64>,
    config: &ModelConfig,
    cached: CachedProfile,
) -> SleepReport {
    let sufficiency = DataSufficiencyGate::new(config).evaluate(history);

    let baseline_need = if cached.profile.is_usable() {
        cached.profile.baseline_sleep_need
    } else {
        None
    };
    let (sleep_need, sleep_need_source) =
        resolve_sleep_need(sleep_need_override, baseline_need, config);

    let debt = SleepDebtCalculator::new(config.debt.clone()).calculate_at(
        history,
        sleep_need,
        now.date(),
    );
    let energy =
        EnergyCurveSimulator::new(config).simulate(&cached.chronotype, debt.current_debt, now);

    debug!(
        records = history.len(),
        sufficient = sufficiency.sufficient,
        ?sleep_need_source,
        current_debt = debt.current_debt,
        energy = energy.success,
        "Assembled sleep report"
    );

    SleepReport {
        sufficiency,
        profile: cached.profile,
        chronotype: cached.chronotype,
        sleep_need_source,
        debt,
        energy,
    }
}

/// Stateful processor reusing baseline and chronotype across calls.
///
/// Use this when the same user's history is reported on repeatedly; the
/// profile cache can be persisted with `save_cache` / `load_cache`.
pub struct CircadianProcessor {
    config: ModelConfig,
    cache: ProfileCache,
    encoder: ReportEncoder,
}

impl Default for CircadianProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl CircadianProcessor {
    /// Create a new processor with default settings
    pub fn new() -> Self {
        Self {
            config: ModelConfig::default(),
            cache: ProfileCache::new(),
            encoder: ReportEncoder::new(),
        }
    }

    /// Create a processor with a validated configuration
    pub fn with_config(config: ModelConfig) -> Result<Self, ComputeError> {
        config.validate()?;
        Ok(Self {
            config,
            cache: ProfileCache::new(),
            encoder: ReportEncoder::new(),
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn cache(&self) -> &ProfileCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut ProfileCache {
        &mut self.cache
    }

    /// Report on a validated history, reusing a cached profile for the same
    /// user and date range
    pub fn report(
        &mut self,
        user_id: &str,
        history: &[SleepRecord],
        now: NaiveDateTime,
        sleep_need_override: Option<f64>,
    ) -> SleepReport {
        let range = history
            .iter()
            .map(|r| r.date)
            .min()
            .zip(history.iter().map(|r| r.date).max());

        let cached = match range {
            Some((start, end)) => {
                let key = CacheKey::new(user_id, start, end);
                match self.cache.get(&key) {
                    Some(hit) => {
                        debug!(user_id, %start, %end, "Profile cache hit");
                        hit.clone()
                    }
                    None => {
                        let fresh = estimate_profile(history, &self.config);
                        self.cache.insert(key, fresh.clone());
                        fresh
                    }
                }
            }
            None => estimate_profile(history, &self.config),
        };

        assemble_report(history, now, sleep_need_override, &self.config, cached)
    }

    /// Parse raw records (JSON array), report, and wrap in an envelope
    pub fn report_json(
        &mut self,
        user_id: &str,
        raw_json: &str,
        now: NaiveDateTime,
        policy: ValidationPolicy,
    ) -> Result<String, ComputeError> {
        let raw = HistoryParser::parse_array(raw_json)?;
        let ParsedHistory { records, rejected } = HistoryParser::into_history(&raw, policy)?;
        let report = self.report(user_id, &records, now, None);
        self.encoder.encode_to_json(report, rejected)
    }

    /// Load profile cache from JSON
    pub fn load_cache(&mut self, json: &str) -> Result<(), ComputeError> {
        self.cache =
            ProfileCache::from_json(json).map_err(|e| ComputeError::ParseError(e.to_string()))?;
        Ok(())
    }

    /// Save profile cache to JSON
    pub fn save_cache(&self) -> Result<String, ComputeError> {
        self.cache
            .to_json()
            .map_err(|e| ComputeError::EncodingError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::fixtures::{first_monday, night, office_worker};
    use crate::types::{Chronotype, ConfidenceLevel, DebtCategory};
    use chrono::{Duration, NaiveDate};
    use pretty_assertions::assert_eq;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 24)
            .unwrap()
            .and_hms_opt(11, 0, 0)
            .unwrap()
    }

    fn sample_records_json() -> String {
        let raw: Vec<RawSleepRecord> = office_worker(3)
            .iter()
            .map(|r| {
                let bed = r.bedtime.unwrap().format("%H:%M").to_string();
                let wake = r.wake_time.unwrap().format("%H:%M").to_string();
                RawSleepRecord::new(r.date.to_string(), r.total_sleep_time).with_times(bed, wake)
            })
            .collect();
        serde_json::to_string(&raw).unwrap()
    }

    #[test]
    fn test_full_report() {
        let report = analyze_history(&office_worker(3), now(), None, &ModelConfig::default());

        assert!(report.sufficiency.sufficient);
        assert_eq!(report.profile.confidence, ConfidenceLevel::High);
        assert_eq!(report.chronotype.chronotype, Some(Chronotype::Intermediate));
        assert_eq!(report.sleep_need_source, SleepNeedSource::Baseline);
        assert!((report.debt.sleep_need - 8.5).abs() < 1e-9);
        assert_eq!(report.debt.debt_category, DebtCategory::Moderate);
        assert_eq!(report.debt.payback_time, 3);
        assert!(report.energy.success);
        assert_eq!(report.energy.points.len(), 24);
        assert!(report.energy.debt_penalty > 0.0);
    }

    #[test]
    fn test_sleep_need_override() {
        let config = ModelConfig::default();
        let report = analyze_history(&office_worker(3), now(), Some(7.0), &config);
        assert_eq!(report.sleep_need_source, SleepNeedSource::Override);
        assert_eq!(report.debt.current_debt, 0.0);

        let report = analyze_history(&office_worker(3), now(), Some(-1.0), &config);
        assert_eq!(report.sleep_need_source, SleepNeedSource::Baseline);
    }

    #[test]
    fn test_new_user_falls_back_to_default_need() {
        let history: Vec<SleepRecord> = (0..3)
            .map(|i| night(first_monday() + Duration::days(i), 7.0, 6.0))
            .collect();
        let now = (first_monday() + Duration::days(2))
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let report = analyze_history(&history, now, None, &ModelConfig::default());

        assert!(!report.sufficiency.sufficient);
        assert_eq!(report.sleep_need_source, SleepNeedSource::Default);
        assert!((report.debt.sleep_need - 8.0).abs() < 1e-9);
        assert!(report.debt.current_debt > 0.0);
        assert!(!report.chronotype.success);
        assert!(!report.energy.success);
        assert!(report.energy.message.is_some());
    }

    #[test]
    fn test_empty_history() {
        let report = analyze_history(&[], now(), None, &ModelConfig::default());
        assert_eq!(report.debt.current_debt, 0.0);
        assert_eq!(report.debt.debt_category, DebtCategory::Low);
        assert_eq!(report.sufficiency.total_days, 0);
        assert!(!report.energy.success);
    }

    #[test]
    fn test_deterministic() {
        let config = ModelConfig::default();
        let history = office_worker(4);
        assert_eq!(
            analyze_history(&history, now(), None, &config),
            analyze_history(&history, now(), None, &config)
        );
    }

    #[test]
    fn test_sleep_report_from_json() {
        let json = sleep_report_from_json(&sample_records_json(), now(), ValidationPolicy::Lenient)
            .unwrap();
        let output: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(output["report"]["sleep_need_source"], "baseline");
        assert_eq!(output["report"]["chronotype"]["chronotype"], "intermediate");
        assert!(output["rejected"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_strict_policy_rejects_bad_input() {
        let json = r#"[{"date": "2024-03-04", "total_sleep_time": -3.0}]"#;
        assert!(sleep_report_from_json(json, now(), ValidationPolicy::Strict).is_err());

        let lenient = sleep_report_from_json(json, now(), ValidationPolicy::Lenient).unwrap();
        let output: serde_json::Value = serde_json::from_str(&lenient).unwrap();
        assert_eq!(output["rejected"][0]["index"], 0);
    }

    #[test]
    fn test_invalid_json() {
        assert!(sleep_report_from_json("not valid json", now(), ValidationPolicy::Lenient).is_err());
    }

    #[test]
    fn test_load_raw_records() {
        assert_eq!(load_raw_records("records", &sample_records_json()).unwrap().len(), 21);
        assert!(load_raw_records("records", "{}").is_err());
        assert!(matches!(
            load_raw_records("oura", "{}"),
            Err(ComputeError::UnsupportedSource(_))
        ));
        assert!(load_raw_records("whoop", r#"{"sleep": []}"#).unwrap().is_empty());
    }

    #[test]
    fn test_processor_caches_profile() {
        let mut processor = CircadianProcessor::new();
        let history = office_worker(3);

        let first = processor.report("alice", &history, now(), None);
        assert_eq!(processor.cache().len(), 1);
        let second = processor.report("alice", &history, now(), None);
        assert_eq!(processor.cache().len(), 1);
        assert_eq!(first, second);

        processor.report("bob", &history, now(), None);
        assert_eq!(processor.cache().len(), 2);

        processor.cache_mut().invalidate_user("alice");
        assert_eq!(processor.cache().len(), 1);
    }

    #[test]
    fn test_processor_cache_persistence() {
        let mut processor = CircadianProcessor::new();
        processor.report("alice", &office_worker(3), now(), None);
        let saved = processor.save_cache().unwrap();

        let mut restored = CircadianProcessor::new();
        restored.load_cache(&saved).unwrap();
        assert_eq!(restored.cache().len(), 1);

        assert!(restored.load_cache("not json").is_err());
    }

    #[test]
    fn test_processor_report_json() {
        let mut processor = CircadianProcessor::new();
        let json = processor
            .report_json("alice", &sample_records_json(), now(), ValidationPolicy::Lenient)
            .unwrap();
        let envelope: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(envelope["producer"]["name"], crate::PRODUCER_NAME);
        assert_eq!(envelope["report"]["sufficiency"]["sufficient"], true);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = ModelConfig::default();
        config.debt.decay_tau_days = 0.0;
        assert!(CircadianProcessor::with_config(config).is_err());
    }
}
