//! Event types shared by the natural-language and table paths.

use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder used whenever no title can be extracted
pub const DEFAULT_TITLE: &str = "Untitled Event";

const MINUTES_PER_DAY: i64 = 24 * 60;

/// Event priority, as chosen in the manual entry form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Urgent,
    Important,
    #[default]
    Normal,
}

impl Priority {
    /// Parse a priority label. The colour names used by the web form are accepted too.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "urgent" | "red" | "high" => Priority::Urgent,
            "important" | "yellow" | "medium" => Priority::Important,
            _ => Priority::Normal,
        }
    }

    /// iCalendar CATEGORIES label
    pub fn category(&self) -> &'static str {
        match self {
            Priority::Urgent => "Urgent",
            Priority::Important => "Important",
            Priority::Normal => "Normal",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.category())
    }
}

/// A fully resolved event, the output of the natural-language builder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredEvent {
    pub title: String,
    pub date: NaiveDate,
    #[serde(with = "hh_mm")]
    pub start_time: NaiveTime,
    /// May be earlier than `start_time`, meaning the event ends the next day
    #[serde(with = "hh_mm")]
    pub end_time: NaiveTime,
    /// Minutes; always agrees with start and end modulo one day
    pub duration: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder: Option<u32>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl StructuredEvent {
    /// Build an event from a start time and a duration in minutes
    pub fn with_duration(
        title: String,
        date: NaiveDate,
        start_time: NaiveTime,
        duration: i64,
    ) -> Self {
        Self {
            title,
            date,
            start_time,
            end_time: add_minutes(start_time, duration),
            duration,
            reminder: None,
            priority: Priority::Normal,
            notes: None,
        }
    }

    /// Build an event from explicit start and end times
    pub fn with_end(
        title: String,
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> Self {
        Self {
            title,
            date,
            start_time,
            end_time,
            duration: minutes_between(start_time, end_time),
            reminder: None,
            priority: Priority::Normal,
            notes: None,
        }
    }

    /// True when the end time falls on the following day
    pub fn wraps_midnight(&self) -> bool {
        self.end_time <= self.start_time
    }

    /// Start and end as minutes from the start of `date`. The end may exceed one day.
    pub fn minute_span(&self) -> (i64, i64) {
        let start = minute_of_day(self.start_time);
        (start, start + self.duration)
    }
}

/// Minutes since midnight
pub fn minute_of_day(time: NaiveTime) -> i64 {
    i64::from(time.hour()) * 60 + i64::from(time.minute())
}

/// Wall-clock time `minutes` after `time`, wrapping at midnight
pub fn add_minutes(time: NaiveTime, minutes: i64) -> NaiveTime {
    let (shifted, _) = time.overflowing_add_signed(chrono::Duration::minutes(minutes));
    shifted
}

/// Forward distance from `start` to `end`. Equal times count as a whole day.
pub fn minutes_between(start: NaiveTime, end: NaiveTime) -> i64 {
    let diff = (minute_of_day(end) - minute_of_day(start)).rem_euclid(MINUTES_PER_DAY);
    if diff == 0 { MINUTES_PER_DAY } else { diff }
}

/// Serde adapter for `HH:MM` times
pub mod hh_mm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(raw.trim(), FORMAT)
            .or_else(|_| NaiveTime::parse_from_str(raw.trim(), "%H:%M:%S"))
            .map_err(serde::de::Error::custom)
    }
}
