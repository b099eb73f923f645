//! Formatting helpers shared by the report renderer and detectors.

use chrono::{Datelike, NaiveDateTime};

/// Placeholder for a value the log did not provide.
pub const UNKNOWN: &str = "-";

/// Format a duration in seconds as `HH:MM:SS` (hours may exceed 24).
pub fn format_duration(secs: i64) -> String {
    let sign = if secs < 0 { "-" } else { "" };
    let secs = secs.unsigned_abs();
    format!(
        "{}{:02}:{:02}:{:02}",
        sign,
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    )
}

/// Format an optional duration, or the unknown placeholder.
pub fn format_duration_opt(secs: Option<i64>) -> String {
    secs.map(format_duration)
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Format a timestamp as time of day.
///
/// Time-only log stamps are anchored on 1970-01-01, so the date is shown only
/// when the log supplied one.
pub fn format_time_opt(ts: Option<NaiveDateTime>) -> String {
    match ts {
        Some(ts) if ts.year() != 1970 => ts.format("%Y-%m-%d %H:%M:%S").to_string(),
        Some(ts) => ts.format("%H:%M:%S").to_string(),
        None => UNKNOWN.to_string(),
    }
}

/// Format an optional count, or the unknown placeholder.
pub fn format_count_opt(count: Option<u64>) -> String {
    count
        .map(|c| c.to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Format a percentage with one decimal place.
pub fn format_percent_opt(pct: Option<f64>) -> String {
    pct.map(|p| format!("{p:.1}%"))
        .unwrap_or_else(|| UNKNOWN.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "00:00:00");
        assert_eq!(format_duration(300), "00:05:00");
        assert_eq!(format_duration(3723), "01:02:03");
        assert_eq!(format_duration(90_000), "25:00:00");
        assert_eq!(format_duration_opt(None), "-");
    }

    #[test]
    fn test_format_time() {
        let anchored = NaiveDate::default().and_hms_opt(21, 3, 0);
        assert_eq!(format_time_opt(anchored), "21:03:00");

        let dated = NaiveDate::from_ymd_opt(2024, 3, 9).and_then(|d| d.and_hms_opt(1, 2, 3));
        assert_eq!(format_time_opt(dated), "2024-03-09 01:02:03");

        assert_eq!(format_time_opt(None), "-");
    }

    #[test]
    fn test_format_count_and_percent() {
        assert_eq!(format_count_opt(Some(95)), "95");
        assert_eq!(format_count_opt(None), "-");
        assert_eq!(format_percent_opt(Some(20.8333)), "20.8%");
        assert_eq!(format_percent_opt(None), "-");
    }
}
