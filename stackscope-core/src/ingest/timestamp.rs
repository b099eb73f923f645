//! Timestamp prefixes recognized at the start of log lines
//!
//! | Form | Example |
//! |------|---------|
//! | Full date and time, optional brackets | `[2025-12-17 22:04:11] ...`, `2025-12-17T22:04:11 ...` |
//! | Bracketed time of day | `[22:04:11] ...` |
//! | Siril console prefix | `22:04:11: ...` |
//!
//! Time-of-day stamps have no date, so they are anchored on a fixed base date.
//! A backwards jump of more than twelve hours is read as the run crossing
//! midnight. Smaller backwards jumps (rotated or concatenated logs) are kept
//! as they are.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

/// Backwards jump that is interpreted as crossing midnight.
const ROLLOVER_THRESHOLD_SECS: i64 = 12 * 3600;

/// Stateful timestamp parser for one pass over a log.
pub struct LogClock {
    datetime: Regex,
    bracketed_time: Regex,
    siril_time: Regex,
    day: NaiveDate,
    last: Option<NaiveDateTime>,
}

impl LogClock {
    pub fn new() -> Self {
        Self {
            datetime: Regex::new(
                r"^\[?(\d{4}-\d{2}-\d{2})[ T](\d{2}:\d{2}:\d{2})(?:\.\d+)?\]?:?\s*",
            )
            .expect("datetime pattern is valid"),
            bracketed_time: Regex::new(r"^\[(\d{2}:\d{2}:\d{2})\]:?\s*")
                .expect("bracketed time pattern is valid"),
            siril_time: Regex::new(r"^(\d{2}:\d{2}:\d{2}):\s*").expect("siril pattern is valid"),
            day: base_date(),
            last: None,
        }
    }

    /// Parse the timestamp prefix of `text`.
    ///
    /// Returns the timestamp and the byte offset where the rest of the line
    /// starts. Lines without a recognized prefix return `(None, 0)`.
    pub fn parse(&mut self, text: &str) -> (Option<NaiveDateTime>, usize) {
        if let Some(caps) = self.datetime.captures(text) {
            let date = NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d").ok();
            let time = NaiveTime::parse_from_str(&caps[2], "%H:%M:%S").ok();
            if let (Some(date), Some(time)) = (date, time) {
                let ts = date.and_time(time);
                self.day = date;
                self.last = Some(ts);
                return (Some(ts), caps[0].len());
            }
        }

        let time_of_day = self
            .bracketed_time
            .captures(text)
            .or_else(|| self.siril_time.captures(text));

        if let Some(caps) = time_of_day {
            if let Ok(time) = NaiveTime::parse_from_str(&caps[1], "%H:%M:%S") {
                let ts = self.anchor(time);
                return (Some(ts), caps[0].len());
            }
        }

        (None, 0)
    }

    fn anchor(&mut self, time: NaiveTime) -> NaiveDateTime {
        let mut ts = self.day.and_time(time);
        if let Some(last) = self.last {
            if (last - ts).num_seconds() > ROLLOVER_THRESHOLD_SECS {
                self.day += Duration::days(1);
                ts = self.day.and_time(time);
                tracing::debug!(day = %self.day, "Timestamp rolled over midnight");
            }
        }
        self.last = Some(ts);
        ts
    }
}

impl Default for LogClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Date used for logs that only print the time of day.
pub fn base_date() -> NaiveDate {
    NaiveDate::default()
}
