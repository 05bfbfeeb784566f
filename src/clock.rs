//! Clock-hour arithmetic
//!
//! Sleep timing lives on a 24 h circle: a mid-sleep at 23:30 and one at 00:30
//! are an hour apart, not 23. Means and spreads of clock times are therefore
//! computed as circular statistics.

use chrono::{NaiveDateTime, Timelike};
use std::f64::consts::PI;

pub const HOURS_PER_DAY: f64 = 24.0;

/// Fractional clock hour of a local date-time, in [0, 24)
pub fn hour_of(time: NaiveDateTime) -> f64 {
    time.hour() as f64 + time.minute() as f64 / 60.0 + time.second() as f64 / 3600.0
}

/// Wrap any hour value into [0, 24)
pub fn wrap_hour(hour: f64) -> f64 {
    let wrapped = hour.rem_euclid(HOURS_PER_DAY);
    // rem_euclid can return 24.0 for tiny negative inputs
    if wrapped >= HOURS_PER_DAY {
        0.0
    } else {
        wrapped
    }
}

/// Signed shortest distance `a - b` on the clock, in (-12, 12]
pub fn signed_diff(a: f64, b: f64) -> f64 {
    let d = wrap_hour(a - b);
    if d > HOURS_PER_DAY / 2.0 {
        d - HOURS_PER_DAY
    } else {
        d
    }
}

/// Express a clock hour relative to midnight, in (-12, 12]
///
/// 23:00 becomes -1.0 and 04:30 stays 4.5, so early and late mid-sleeps
/// compare on one axis.
pub fn relative_to_midnight(hour: f64) -> f64 {
    signed_diff(hour, 0.0)
}

/// Whether `hour` lies in the window `[start, end)`, wrapping past midnight
pub fn in_window(hour: f64, start: f64, end: f64) -> bool {
    let span = wrap_hour(end - start);
    let offset = wrap_hour(hour - start);
    offset < span
}

/// Circular mean of clock hours
pub fn circular_mean(hours: &[f64]) -> Option<f64> {
    if hours.is_empty() {
        return None;
    }

    let (sin_sum, cos_sum) = hours.iter().fold((0.0, 0.0), |(s, c), h| {
        let angle = h / HOURS_PER_DAY * 2.0 * PI;
        (s + angle.sin(), c + angle.cos())
    });

    if sin_sum.abs() < 1e-12 && cos_sum.abs() < 1e-12 {
        // Uniformly spread times have no meaningful mean
        return None;
    }

    Some(wrap_hour(sin_sum.atan2(cos_sum) / (2.0 * PI) * HOURS_PER_DAY))
}

/// Standard deviation (minutes) of clock hours around a circular mean
pub fn circular_sd_minutes(hours: &[f64], mean: f64) -> Option<f64> {
    if hours.is_empty() {
        return None;
    }
    let variance = hours
        .iter()
        .map(|h| signed_diff(*h, mean).powi(2))
        .sum::<f64>()
        / hours.len() as f64;
    Some(variance.sqrt() * 60.0)
}

/// Format a clock hour as `HH:MM`
pub fn format_hour(hour: f64) -> String {
    let total_minutes = (wrap_hour(hour) * 60.0).round() as u32 % (24 * 60);
    format!("{:02}:{:02}", total_minutes / 60, total_minutes % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_hour_of() {
        let t = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(6, 45, 0)
            .unwrap();
        assert!((hour_of(t) - 6.75).abs() < 1e-9);
    }

    #[test]
    fn test_wrap_and_diff() {
        assert!((wrap_hour(-1.0) - 23.0).abs() < 1e-9);
        assert!((wrap_hour(25.5) - 1.5).abs() < 1e-9);
        assert!((signed_diff(0.5, 23.5) - 1.0).abs() < 1e-9);
        assert!((signed_diff(23.5, 0.5) + 1.0).abs() < 1e-9);
        assert!((relative_to_midnight(23.0) + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_circular_mean_across_midnight() {
        let mean = circular_mean(&[23.5, 0.5]).unwrap();
        assert!(signed_diff(mean, 0.0).abs() < 1e-6);

        let mean = circular_mean(&[6.0, 7.0, 8.0]).unwrap();
        assert!((mean - 7.0).abs() < 1e-6);

        assert!(circular_mean(&[]).is_none());
        assert!(circular_mean(&[0.0, 12.0]).is_none());
    }

    #[test]
    fn test_circular_sd() {
        let sd = circular_sd_minutes(&[7.0, 7.0, 7.0], 7.0).unwrap();
        assert!(sd.abs() < 1e-9);

        // +/- 30 minutes around the mean
        let sd = circular_sd_minutes(&[6.5, 7.5], 7.0).unwrap();
        assert!((sd - 30.0).abs() < 1e-6);
    }

    #[test]
    fn test_in_window() {
        assert!(in_window(23.5, 23.0, 7.0));
        assert!(in_window(3.0, 23.0, 7.0));
        assert!(!in_window(7.0, 23.0, 7.0));
        assert!(!in_window(12.0, 23.0, 7.0));
        assert!(in_window(21.0, 21.0, 23.0));
    }

    #[test]
    fn test_format_hour() {
        assert_eq!(format_hour(6.5), "06:30");
        assert_eq!(format_hour(23.999), "00:00");
        assert_eq!(format_hour(-0.5), "23:30");
    }
}
