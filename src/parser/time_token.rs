//! Conversion of `hour[:minute]` + meridiem tokens to 24-hour clock strings

use chrono::NaiveTime;
use once_cell::sync::Lazy;
use regex::Regex;

static MERIDIEM_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(\d{1,2}(?::\d{2})?)\s*([ap])\.?(?:m\.?)?\s*$").expect("valid regex")
});

/// Convert a 12-hour token to `HH:MM`.
///
/// `token` is `"6"`, `"6:30"` or `"10:05"`; `meridiem` is `am`/`pm` or just `a`/`p`.
/// Hours are not range-checked, so `13` with `pm` yields `"25:00"`.
pub fn to_24_hour(token: &str, meridiem: &str) -> String {
    let (hour_str, minute_str) = match token.split_once(':') {
        Some((h, m)) => (h, m),
        None => (token, "00"),
    };
    let hour: u32 = hour_str.trim().parse().unwrap_or(0);
    let meridiem = meridiem.trim().to_lowercase();

    let hour_24 = if meridiem.starts_with('a') && hour == 12 {
        0
    } else if meridiem.starts_with('p') && hour != 12 {
        hour + 12
    } else {
        hour
    };

    format!("{:02}:{}", hour_24, minute_str.trim())
}

/// Parse an `HH:MM` string into a valid clock time
pub fn parse_clock(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()
}

/// Normalize a standalone meridiem time such as `"10am"` or `"3:30 p.m."` to `HH:MM`.
/// Anything else is returned unchanged.
pub fn normalize_meridiem(value: &str) -> String {
    match MERIDIEM_TIME.captures(value) {
        Some(caps) => to_24_hour(&caps[1], &caps[2]),
        None => value.trim().to_string(),
    }
}
