//! Regex-driven facet extractors for natural-language event phrases.
//!
//! Every extractor is a pure function from the current working text to an
//! [`Extraction`]: the facet it found (if any) plus the text with the matched
//! span cut out. The builder threads the remaining text from one extractor to
//! the next, so later stages never re-match a span an earlier stage consumed.
//!
//! Matching is case-insensitive but the cut is applied to the original text,
//! which keeps the casing of whatever is left for the title.

use super::time_token::to_24_hour;
use chrono::{Datelike, NaiveDate};
use log::debug;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::ops::Range;

/// Outcome of looking for one facet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Facet<T> {
    Found(T),
    NotFound,
    /// Text matched the grammar but did not describe a valid value (e.g. Feb 30)
    Malformed(String),
}

impl<T> Facet<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Facet::Found(value) => Some(value),
            _ => None,
        }
    }

}

/// A facet together with the text that is left once its span is removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction<T> {
    pub facet: Facet<T>,
    pub rest: String,
}

impl<T> Extraction<T> {
    fn not_found(text: &str) -> Self {
        Self { facet: Facet::NotFound, rest: text.to_string() }
    }

    fn found(value: T, text: &str, span: Range<usize>) -> Self {
        Self { facet: Facet::Found(value), rest: excise(text, span) }
    }
}

/// Start and end of an explicit range, as produced by the time-token parser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeRange {
    pub start: String,
    pub end: String,
}

/// Remove `span` from `text`, leaving a single space so neighbouring words stay apart
pub fn excise(text: &str, span: Range<usize>) -> String {
    format!("{} {}", text[..span.start].trim_end(), text[span.end..].trim_start())
        .trim()
        .to_string()
}

// Hour[:minute] followed by a meridiem. The meridiem has to end the token, so
// "6 apples" is not a time. A bare "a"/"p" only counts when attached to the
// number ("3p"), so "3 a day" is not a time either.
const CLOCK: &str = r"(\d{1,2}(?::\d{2})?)(\s*[ap](?:m\b\.?|\.m\.?|\.)|[ap]\b)";

const UNIT: &str = r"(minutes?|mins?|m|hours?|hrs?|hr|h)";
const LEAD_TIME: &str = r"(?:before|early|earlier|prior|ahead)";

static REMINDER_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        format!(r"(?i)\bremind(?:\s+me)?\s+(\d+)\s*{UNIT}\s+{LEAD_TIME}\b"),
        format!(r"(?i)\breminder\s*(?:of\s+|:\s*)?(\d+)\s*{UNIT}(?:\s+{LEAD_TIME})?\b"),
        format!(r"(?i)\b(?:with\s+(?:an?\s+)?)?(\d+)[\s-]*{UNIT}\s+reminder\b"),
        format!(r"(?i)\b(?:alert|notify)(?:\s+me)?\s+(\d+)\s*{UNIT}\s+{LEAD_TIME}\b"),
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid reminder regex"))
    .collect()
});

static RANGE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        format!(r"(?i)\bfrom\s+{CLOCK}\s*to\s+{CLOCK}"),
        format!(r"(?i)\b{CLOCK}\s*to\s+{CLOCK}"),
        format!(r"(?i)\b{CLOCK}\s*-\s*{CLOCK}"),
        format!(r"(?i)\(\s*{CLOCK}\s*(?:to|-)\s*{CLOCK}\s*\)"),
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid range regex"))
    .collect()
});

// `cut` is the part that gets removed; `amount` is the number. Whether a
// pattern counts hours or minutes is decided from its source text below.
const DURATION_PATTERNS: &[&str] = &[
    r"(?i)\bfor\s+(?P<amount>\d+(?:\.\d+)?)\s*(?:hours?|hrs?)\b",
    r"(?i)\bfor\s+(?P<amount>\d+)\s*(?:minutes?|mins?)\b",
    r"(?i)\bfor\s+(?P<amount>\d+(?:\.\d+)?)\s*h\b",
    r"(?i)\bfor\s+(?P<amount>\d+)\s*m\b",
    concat!(
        r"(?i)\b(?P<cut>(?P<amount>\d+(?:\.\d+)?)[\s-]*(?:hours?|hrs?))",
        r"\s+(?:meeting|session|event|call|class)\b",
    ),
    concat!(
        r"(?i)\b(?P<cut>(?P<amount>\d+)[\s-]*(?:minutes?|mins?))",
        r"\s+(?:meeting|session|event|call|class)\b",
    ),
];

static DURATION_REGEXES: Lazy<Vec<(Regex, bool)>> = Lazy::new(|| {
    DURATION_PATTERNS
        .iter()
        .map(|p| (Regex::new(p).expect("valid duration regex"), p.contains('h')))
        .collect()
});

const FULL_MONTHS: &str =
    "january|february|march|april|may|june|july|august|september|october|november|december";
const SHORT_MONTHS: &str = "jan|feb|mar|apr|may|jun|jul|aug|sept|sep|oct|nov|dec";
const ORDINAL: &str = r"(?:st|nd|rd|th)?";
const YEAR: &str = r"(?:,?\s+(?P<year>\d{4}))?";

static DATE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    let day = r"(?P<day>\d{1,2})";
    let any_month = format!("(?P<month>{FULL_MONTHS}|{SHORT_MONTHS})");
    [
        format!(r"(?i)\b{day}{ORDINAL}\s+of\s+{any_month}\b\.?{YEAR}"),
        format!(r"(?i)\b(?P<month>{FULL_MONTHS})\s+{day}{ORDINAL}\b{YEAR}"),
        format!(r"(?i)\b(?P<month>{SHORT_MONTHS})\.?\s+{day}{ORDINAL}\b{YEAR}"),
        format!(r"(?i)\b{day}{ORDINAL}\s+{any_month}\b{YEAR}"),
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid date regex"))
    .collect()
});

/// Month names and three-letter abbreviations
pub static MONTHS: Lazy<HashMap<&'static str, u32>> = Lazy::new(|| {
    let mut map = HashMap::new();
    let names = FULL_MONTHS.split('|').zip(1..=12);
    for (name, number) in names {
        map.insert(name, number);
        map.insert(&name[..3], number);
    }
    map.insert("sept", 9);
    map
});

static CLOCK_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(&format!(r"(?i)(?:\bat\s+)?\b{CLOCK}")).expect("valid clock regex"),
        Regex::new(r"(?i)\bat\s+(\d{1,2}):(\d{2})\b").expect("valid clock regex"),
    ]
});

/// Find a "remind me N minutes before" style clause. The result is in minutes.
pub fn extract_reminder(text: &str) -> Extraction<u32> {
    for re in REMINDER_PATTERNS.iter() {
        if let Some(caps) = re.captures(text) {
            let amount: u32 = match caps[1].parse() {
                Ok(n) => n,
                Err(_) => continue,
            };
            let unit = caps[2].to_lowercase();
            let minutes = if unit.starts_with('h') {
                match amount.checked_mul(60) {
                    Some(minutes) => minutes,
                    None => continue,
                }
            } else {
                amount
            };
            debug!("Reminder clause '{}' -> {} minutes", &caps[0], minutes);
            return Extraction::found(minutes, text, span_of(&caps));
        }
    }
    Extraction::not_found(text)
}

/// Find an explicit "from A to B" / "A to B" / "A-B" / "(A-B)" range
pub fn extract_time_range(text: &str) -> Extraction<TimeRange> {
    for re in RANGE_PATTERNS.iter() {
        if let Some(caps) = re.captures(text) {
            let range = TimeRange {
                start: to_24_hour(&caps[1], &caps[2]),
                end: to_24_hour(&caps[3], &caps[4]),
            };
            debug!("Time range '{}' -> {} to {}", &caps[0], range.start, range.end);
            return Extraction::found(range, text, span_of(&caps));
        }
    }
    Extraction::not_found(text)
}

/// Find a duration clause such as "for 2 hours" or "30 minute call". The result is in minutes.
pub fn extract_duration(text: &str) -> Extraction<i64> {
    for (re, counts_hours) in DURATION_REGEXES.iter() {
        if let Some(caps) = re.captures(text) {
            let amount: f64 = match caps["amount"].parse() {
                Ok(n) => n,
                Err(_) => continue,
            };
            let minutes = if *counts_hours { amount * 60.0 } else { amount };
            let minutes = minutes.round() as i64;
            let span = caps.name("cut").map(|m| m.range()).unwrap_or_else(|| span_of(&caps));
            debug!("Duration clause '{}' -> {} minutes", &caps[0], minutes);
            return Extraction::found(minutes, text, span);
        }
    }
    Extraction::not_found(text)
}

/// Find an explicit calendar date ("4th of January", "March 3rd", "Dec 25").
///
/// Without a year the date lands in the current year, or next year when it has
/// already passed. Impossible dates are reported as malformed and left in place.
pub fn extract_date(text: &str, today: NaiveDate) -> Extraction<NaiveDate> {
    for re in DATE_PATTERNS.iter() {
        let Some(caps) = re.captures(text) else {
            continue;
        };
        let month_name = caps["month"].to_lowercase();
        let (Some(&month), Ok(day)) = (MONTHS.get(month_name.as_str()), caps["day"].parse::<u32>())
        else {
            continue;
        };
        let explicit_year = caps.name("year").and_then(|y| y.as_str().parse::<i32>().ok());

        return match resolve_month_day(month, day, explicit_year, today) {
            Some(date) => {
                debug!("Explicit date '{}' -> {}", &caps[0], date);
                Extraction::found(date, text, span_of(&caps))
            }
            None => {
                debug!("Discarding impossible date '{}'", &caps[0]);
                Extraction {
                    facet: Facet::Malformed(caps[0].to_string()),
                    rest: text.to_string(),
                }
            }
        };
    }
    Extraction::not_found(text)
}

/// Find a single clock time ("10am", "at 3:30pm", "at 14:00"), returned as `HH:MM`
pub fn extract_clock_time(text: &str) -> Extraction<String> {
    if let Some(caps) = CLOCK_PATTERNS[0].captures(text) {
        let time = to_24_hour(&caps[1], &caps[2]);
        debug!("Clock time '{}' -> {}", &caps[0], time);
        return Extraction::found(time, text, span_of(&caps));
    }
    if let Some(caps) = CLOCK_PATTERNS[1].captures(text) {
        let time = format!("{:0>2}:{}", &caps[1], &caps[2]);
        debug!("Clock time '{}' -> {}", &caps[0], time);
        return Extraction::found(time, text, span_of(&caps));
    }
    Extraction::not_found(text)
}

/// Apply the future-bias policy to a month/day pair
pub fn resolve_month_day(
    month: u32,
    day: u32,
    year: Option<i32>,
    today: NaiveDate,
) -> Option<NaiveDate> {
    if let Some(year) = year {
        return NaiveDate::from_ymd_opt(year, month, day);
    }
    let candidate = NaiveDate::from_ymd_opt(today.year(), month, day)?;
    if candidate < today {
        NaiveDate::from_ymd_opt(today.year() + 1, month, day)
    } else {
        Some(candidate)
    }
}

fn span_of(caps: &Captures<'_>) -> Range<usize> {
    caps.get(0).map(|m| m.range()).unwrap_or(0..0)
}
