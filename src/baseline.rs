//! MCTQ-style baseline estimation
//!
//! Alarm clocks hide how much sleep a person actually needs. Following the
//! Munich Chronotype Questionnaire, days without an imposed wake time (free
//! days) are taken to reveal the natural sleep duration and timing.
//!
//! Free days are not declared by the user; they are inferred per weekday from
//! wake-time regularity. A weekday whose wake times are tight and close to the
//! earliest weekday is alarm-driven (workday); a weekday that wakes later or
//! wanders is a free day.

use crate::clock;
use crate::config::{BaselineConfig, ModelConfig, SufficiencyConfig};
use crate::sufficiency::confidence_for;
use crate::types::{
    ConfidenceLevel, DayClassification, DayType, EstimationMethod, MctqProfile, SleepRecord,
};
use chrono::{NaiveDate, Weekday};
use tracing::debug;

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// History restricted to the lookback window, with every record labelled
#[derive(Debug, Clone)]
pub struct LabeledHistory<'a> {
    /// Records inside the lookback window, oldest first
    pub window: Vec<&'a SleepRecord>,
    /// One entry per weekday, Monday first
    pub classifications: Vec<DayClassification>,
    pub workdays: Vec<&'a SleepRecord>,
    pub freedays: Vec<&'a SleepRecord>,
}

/// Infers baseline sleep need, mid-sleep timing and social jetlag
#[derive(Debug, Clone)]
pub struct BaselineEstimator {
    config: BaselineConfig,
    sufficiency: SufficiencyConfig,
}

impl Default for BaselineEstimator {
    fn default() -> Self {
        Self::new(&ModelConfig::default())
    }
}

impl BaselineEstimator {
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            config: config.baseline.clone(),
            sufficiency: config.sufficiency.clone(),
        }
    }

    /// Classify each weekday from the wake times in the lookback window
    pub fn classify_days(&self, history: &[SleepRecord]) -> Vec<DayClassification> {
        let window = lookback_window(history, self.config.lookback_days);
        self.classify_window(&window)
    }

    /// Label every record in the lookback window by its weekday's class
    pub fn label<'a>(&self, history: &'a [SleepRecord]) -> LabeledHistory<'a> {
        let window = lookback_window(history, self.config.lookback_days);
        let classifications = self.classify_window(&window);

        let class_of = |weekday: Weekday| {
            classifications
                .iter()
                .find(|c| c.day_of_week == weekday)
                .map(|c| c.classified_as)
                .unwrap_or(DayType::Unclassified)
        };

        let mut workdays = Vec::new();
        let mut freedays = Vec::new();
        for record in &window {
            match class_of(record.day_of_week()) {
                DayType::Workday => workdays.push(*record),
                DayType::FreeDay => freedays.push(*record),
                DayType::Unclassified => {}
            }
        }

        LabeledHistory {
            window,
            classifications,
            workdays,
            freedays,
        }
    }

    /// Estimate the MCTQ profile.
    ///
    /// Without a single free day the profile carries no numbers and
    /// `ConfidenceLevel::Insufficient`; nothing is fabricated.
    pub fn estimate(&self, history: &[SleepRecord]) -> MctqProfile {
        let labeled = self.label(history);

        let workdays_per_week = labeled
            .classifications
            .iter()
            .filter(|c| c.classified_as == DayType::Workday)
            .count() as u8;
        let workdays_used = labeled.workdays.len() as u32;
        let freedays_used = labeled.freedays.len() as u32;

        let wake_hours: Vec<f64> = labeled.window.iter().filter_map(|r| r.wake_hour()).collect();
        let onset_hours: Vec<f64> = labeled
            .window
            .iter()
            .filter(|r| r.wake_time.is_some())
            .filter_map(|r| r.onset_hour())
            .collect();
        let average_wake_hour = clock::circular_mean(&wake_hours);
        let average_onset_hour = clock::circular_mean(&onset_hours);

        let sd_freeday = mid_sleep(&labeled.freedays);
        let baseline_sleep_need = mean_duration(&labeled.freedays);

        if freedays_used == 0 || sd_freeday.is_none() || baseline_sleep_need.is_none() {
            debug!(
                window = labeled.window.len(),
                workdays_used, "No qualifying free days, baseline insufficient"
            );
            return MctqProfile {
                baseline_sleep_need: None,
                avg_sleep_workday: None,
                sd_workday: None,
                sd_freeday: None,
                social_jetlag: None,
                average_wake_hour,
                average_onset_hour,
                workdays_per_week,
                method: EstimationMethod::Insufficient,
                confidence: ConfidenceLevel::Insufficient,
                based_on_days: 0,
                workdays_used,
                freedays_used,
                day_classifications: labeled.classifications,
            };
        }

        let avg_sleep_workday = mean_duration(&labeled.workdays);
        let sd_workday = mid_sleep(&labeled.workdays);
        let social_jetlag = match (sd_freeday, sd_workday) {
            (Some(free), Some(work)) => Some(clock::signed_diff(free, work).abs()),
            _ => None,
        };

        let method = if sd_workday.is_some() {
            EstimationMethod::Mctq
        } else {
            EstimationMethod::FreeDayOnly
        };
        let confidence = confidence_for(workdays_used, freedays_used, &self.sufficiency);

        debug!(
            baseline_sleep_need,
            social_jetlag,
            workdays_used,
            freedays_used,
            ?confidence,
            "Estimated MCTQ baseline"
        );

        MctqProfile {
            baseline_sleep_need,
            avg_sleep_workday,
            sd_workday,
            sd_freeday,
            social_jetlag,
            average_wake_hour,
            average_onset_hour,
            workdays_per_week,
            method,
            confidence,
            based_on_days: workdays_used + freedays_used,
            workdays_used,
            freedays_used,
            day_classifications: labeled.classifications,
        }
    }

    fn classify_window(&self, window: &[&SleepRecord]) -> Vec<DayClassification> {
        let stats: Vec<(Weekday, u32, Option<f64>, Option<f64>)> = WEEK
            .iter()
            .map(|weekday| {
                let wakes: Vec<f64> = window
                    .iter()
                    .filter(|r| r.day_of_week() == *weekday)
                    .filter_map(|r| r.wake_hour())
                    .collect();
                let mean = clock::circular_mean(&wakes);
                let sd = mean.and_then(|m| clock::circular_sd_minutes(&wakes, m));
                (*weekday, wakes.len() as u32, mean, sd)
            })
            .collect();

        let min_samples = self.config.min_samples_per_weekday;
        let max_sd = self.config.workday_max_sd_minutes;
        let is_regular =
            |n: u32, sd: Option<f64>| n >= min_samples && sd.is_some_and(|sd| sd <= max_sd);

        // Only regular weekdays can set the alarm reference; an early but
        // scattered weekday must not drag it earlier
        let regular_means: Vec<f64> = stats
            .iter()
            .filter(|(_, n, _, sd)| is_regular(*n, *sd))
            .filter_map(|(_, _, mean, _)| *mean)
            .collect();

        // Measure against the earliest regular weekday, on an axis centred on
        // the typical wake time so midnight never splits the comparison
        let reference = clock::circular_mean(&regular_means);
        let earliest = reference.and_then(|r| {
            regular_means
                .iter()
                .map(|m| clock::signed_diff(*m, r))
                .reduce(f64::min)
        });

        stats
            .into_iter()
            .map(|(day_of_week, sample_count, mean, sd)| {
                let classified_as = match (mean, sd) {
                    (Some(m), Some(_)) if sample_count >= min_samples => {
                        let alarm_driven = is_regular(sample_count, sd)
                            && match (reference, earliest) {
                                (Some(r), Some(e)) => {
                                    let later_by_minutes = (clock::signed_diff(m, r) - e) * 60.0;
                                    later_by_minutes
                                        <= self.config.workday_max_wake_offset_minutes
                                }
                                _ => false,
                            };
                        if alarm_driven {
                            DayType::Workday
                        } else {
                            DayType::FreeDay
                        }
                    }
                    _ => DayType::Unclassified,
                };

                DayClassification {
                    day_of_week,
                    classified_as,
                    mean_wake_hour: mean,
                    variance_minutes: sd,
                    sample_count,
                }
            })
            .collect()
    }
}

/// Records dated within `lookback_days` of the latest record, oldest first
pub fn lookback_window(history: &[SleepRecord], lookback_days: u32) -> Vec<&SleepRecord> {
    let Some(latest) = history.iter().map(|r| r.date).max() else {
        return Vec::new();
    };
    let mut window: Vec<&SleepRecord> = history
        .iter()
        .filter(|r| within(r.date, latest, lookback_days))
        .collect();
    window.sort_by_key(|r| r.date);
    window
}

fn within(date: NaiveDate, latest: NaiveDate, lookback_days: u32) -> bool {
    let age = (latest - date).num_days();
    age >= 0 && age < lookback_days as i64
}

fn mean_duration(records: &[&SleepRecord]) -> Option<f64> {
    let durations: Vec<f64> = records
        .iter()
        .map(|r| r.total_sleep_time)
        .filter(|h| *h > 0.0)
        .collect();
    if durations.is_empty() {
        return None;
    }
    Some(durations.iter().sum::<f64>() / durations.len() as f64)
}

fn mid_sleep(records: &[&SleepRecord]) -> Option<f64> {
    let mids: Vec<f64> = records.iter().filter_map(|r| r.mid_sleep_hour()).collect();
    clock::circular_mean(&mids)
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use chrono::{Datelike, Duration};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_classifies_weekends_as_free_days() {
        let history = office_worker(3);
        let classes = BaselineEstimator::default().classify_days(&history);

        assert_eq!(classes.len(), 7);
        for c in &classes {
            let expected = match c.day_of_week {
                Weekday::Sat | Weekday::Sun => DayType::FreeDay,
                _ => DayType::Workday,
            };
            assert_eq!(c.classified_as, expected, "{:?}", c.day_of_week);
            assert_eq!(c.sample_count, 3);
        }
    }

    #[test]
    fn test_single_sample_is_unclassified() {
        let history = office_worker(1);
        let classes = BaselineEstimator::default().classify_days(&history);
        assert!(classes
            .iter()
            .all(|c| c.classified_as == DayType::Unclassified));
    }

    #[test]
    fn test_irregular_weekday_is_free_day() {
        // Wednesdays alternate between 06:30 and 08:30 wake times
        let mut history = office_worker(4);
        for record in history.iter_mut() {
            if record.day_of_week() == Weekday::Wed && record.date.day() % 2 == 0 {
                *record = night(record.date, 8.5, 7.0);
            }
        }
        let classes = BaselineEstimator::default().classify_days(&history);
        let wed = classes
            .iter()
            .find(|c| c.day_of_week == Weekday::Wed)
            .unwrap();
        assert!(wed.variance_minutes.unwrap() > 45.0);
        assert_eq!(wed.classified_as, DayType::FreeDay);
    }

    #[test]
    fn test_early_irregular_weekday_does_not_shift_reference() {
        // Sundays alternate 04:00 / 06:00: earlier on average than the 06:30
        // alarm, but far too scattered to be one
        let history: Vec<SleepRecord> = office_worker(4)
            .into_iter()
            .map(|record| {
                if record.day_of_week() != Weekday::Sun {
                    return record;
                }
                let week = (record.date - first_monday()).num_days() / 7;
                let wake = if week % 2 == 0 { 4.0 } else { 6.0 };
                night(record.date, wake, 7.0)
            })
            .collect();

        let classes = BaselineEstimator::default().classify_days(&history);
        let class_of = |day: Weekday| {
            classes
                .iter()
                .find(|c| c.day_of_week == day)
                .unwrap()
                .classified_as
        };

        let sun = classes.iter().find(|c| c.day_of_week == Weekday::Sun).unwrap();
        assert!((sun.variance_minutes.unwrap() - 60.0).abs() < 1e-6);
        assert_eq!(class_of(Weekday::Sun), DayType::FreeDay);
        assert_eq!(class_of(Weekday::Sat), DayType::FreeDay);
        let workdays = classes
            .iter()
            .filter(|c| c.classified_as == DayType::Workday)
            .count();
        assert_eq!(workdays, 5);

        let profile = BaselineEstimator::default().estimate(&history);
        assert_eq!(profile.workdays_per_week, 5);
        assert!((profile.avg_sleep_workday.unwrap() - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_regular_weekday_means_all_free_days() {
        // Every weekday alternates between two wake times two hours apart
        let history: Vec<SleepRecord> = (0..28)
            .map(|i| {
                let wake = if (i / 7) % 2 == 0 { 6.0 } else { 8.0 };
                night(first_monday() + Duration::days(i), wake, 8.0)
            })
            .collect();

        let classes = BaselineEstimator::default().classify_days(&history);
        assert!(classes.iter().all(|c| c.classified_as == DayType::FreeDay));
    }

    #[test]
    fn test_estimate_profile() {
        let profile = BaselineEstimator::default().estimate(&office_worker(3));

        assert_eq!(profile.method, EstimationMethod::Mctq);
        assert_eq!(profile.workdays_used, 15);
        assert_eq!(profile.freedays_used, 6);
        assert_eq!(profile.based_on_days, 21);
        assert_eq!(profile.workdays_per_week, 5);
        assert!((profile.baseline_sleep_need.unwrap() - 8.5).abs() < 1e-9);
        assert!((profile.avg_sleep_workday.unwrap() - 7.0).abs() < 1e-9);

        // Workdays: 23:30 -> 06:30, mid 03:00. Free days: 00:30 -> 09:00, mid 04:45
        assert!((profile.sd_workday.unwrap() - 3.0).abs() < 1e-6);
        assert!((profile.sd_freeday.unwrap() - 4.75).abs() < 1e-6);
        assert!((profile.social_jetlag.unwrap() - 1.75).abs() < 1e-6);
        assert!(profile.is_usable());
        assert_eq!(profile.confidence, ConfidenceLevel::High);
    }

    #[test]
    fn test_no_free_days_is_insufficient() {
        // Same wake time every day of the week
        let history: Vec<SleepRecord> = (0..21)
            .map(|i| night(first_monday() + Duration::days(i), 7.0, 8.0))
            .collect();
        let profile = BaselineEstimator::default().estimate(&history);

        assert_eq!(profile.confidence, ConfidenceLevel::Insufficient);
        assert_eq!(profile.method, EstimationMethod::Insufficient);
        assert!(profile.baseline_sleep_need.is_none());
        assert!(profile.social_jetlag.is_none());
        assert!(!profile.is_usable());
        assert_eq!(profile.freedays_used, 0);
    }

    #[test]
    fn test_empty_history() {
        let profile = BaselineEstimator::default().estimate(&[]);
        assert_eq!(profile.confidence, ConfidenceLevel::Insufficient);
        assert_eq!(profile.based_on_days, 0);
        assert!(profile.average_wake_hour.is_none());
    }

    #[test]
    fn test_lookback_window_excludes_old_records() {
        let mut history = office_worker(3);
        // A lone record far in the past must not count
        history.push(night(first_monday() - Duration::days(90), 11.0, 12.0));
        let window = lookback_window(&history, 28);
        assert_eq!(window.len(), 21);
        assert!(window.windows(2).all(|w| w[0].date <= w[1].date));
    }

    #[test]
    fn test_idempotent() {
        let history = office_worker(4);
        let estimator = BaselineEstimator::default();
        assert_eq!(estimator.estimate(&history), estimator.estimate(&history));
    }
}
