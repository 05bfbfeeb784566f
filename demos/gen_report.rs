//! Generate a sleep report from three weeks of synthetic office-worker nights

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use synheart_circadian::{sleep_report_from_json, RawSleepRecord, ValidationPolicy};

fn main() {
    let Some(first_monday) = NaiveDate::from_ymd_opt(2024, 3, 4) else {
        return;
    };

    // Weekdays: 23:30 to 06:30; weekends: 00:30 to 09:00
    let records: Vec<RawSleepRecord> = (0..21)
        .map(|i| {
            let date = first_monday + Duration::days(i);
            let (bed, wake, hours) = match date.weekday() {
                Weekday::Sat | Weekday::Sun => ("00:30", "09:00", 8.5),
                _ => ("23:30", "06:30", 7.0),
            };
            RawSleepRecord::new(date.to_string(), hours).with_times(bed, wake)
        })
        .collect();

    let json = match serde_json::to_string(&records) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("Error: {e:?}");
            return;
        }
    };

    let Some(now) = NaiveDate::from_ymd_opt(2024, 3, 24).and_then(|d| d.and_hms_opt(11, 0, 0))
    else {
        return;
    };

    match sleep_report_from_json(&json, now, ValidationPolicy::Lenient) {
        Ok(report) => println!("{report}"),
        Err(e) => eprintln!("Error: {e:?}"),
    }
}
