//! Fallback date resolution for phrases without an explicit calendar date.
//!
//! The event builder only talks to the [`DateResolver`] trait. The standard
//! chain tries [`PhraseResolver`] (weekdays, today/tomorrow, bare months,
//! numeric dates), then [`RelativeResolver`] ("four days from now",
//! "in 2 weeks"), then [`TimeOfDayResolver`] for phrases that only name a
//! time ("Standup 10am"). One chain is built at startup and shared; resolvers
//! hold no mutable state, so sharing is safe across threads.

use super::extractors::{excise, MONTHS};
use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

/// How ambiguous phrases are resolved
#[derive(Debug, Clone, Copy)]
pub struct ResolverSettings {
    /// Resolve ambiguous phrases to the nearest future date
    pub prefer_future: bool,
    /// Anchor for relative phrases
    pub relative_base: NaiveDateTime,
    /// A phrase naming only a month resolves to its first day
    pub prefer_first_of_month: bool,
    /// Clock time already taken out of the phrase, if any
    pub time_of_day: Option<NaiveTime>,
}

impl ResolverSettings {
    pub fn anchored_at(now: NaiveDateTime) -> Self {
        Self {
            prefer_future: true,
            relative_base: now,
            prefer_first_of_month: true,
            time_of_day: None,
        }
    }

    pub fn with_time_of_day(mut self, time: Option<NaiveTime>) -> Self {
        self.time_of_day = time;
        self
    }

    fn today(&self) -> NaiveDate {
        self.relative_base.date()
    }
}

/// A resolved date, an optional time of day, and the text spans that produced them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
    pub spans: Vec<Range<usize>>,
}

impl Resolved {
    /// `text` with every consumed span removed
    pub fn strip_from(&self, text: &str) -> String {
        let mut spans = self.spans.clone();
        spans.sort_by_key(|s| std::cmp::Reverse(s.start));
        spans.into_iter().fold(text.to_string(), |acc, span| excise(&acc, span))
    }
}

/// A capability that turns a free-text phrase into a date
pub trait DateResolver: Send + Sync {
    fn resolve(&self, text: &str, settings: &ResolverSettings) -> Option<Resolved>;

    fn name(&self) -> &'static str;
}

/// Tries each resolver in turn; the first answer wins
pub struct ResolverChain {
    resolvers: Vec<Box<dyn DateResolver>>,
}

impl ResolverChain {
    pub fn new(resolvers: Vec<Box<dyn DateResolver>>) -> Self {
        Self { resolvers }
    }

    /// Phrase resolution first, relative offsets second, a bare time of day last
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(PhraseResolver),
            Box::new(RelativeResolver),
            Box::new(TimeOfDayResolver),
        ])
    }
}

impl Default for ResolverChain {
    fn default() -> Self {
        Self::standard()
    }
}

impl DateResolver for ResolverChain {
    fn resolve(&self, text: &str, settings: &ResolverSettings) -> Option<Resolved> {
        self.resolvers.iter().find_map(|resolver| {
            let resolved = resolver.resolve(text, settings);
            if let Some(r) = &resolved {
                debug!("{} resolved '{}' to {} {:?}", resolver.name(), text, r.date, r.time);
            }
            resolved
        })
    }

    fn name(&self) -> &'static str {
        "chain"
    }
}

static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").expect("valid regex"));
static SLASH_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b").expect("valid regex"));
static DAY_WORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:the\s+)?(day\s+after\s+tomorrow|today|tonight|tomorrow)\b")
        .expect("valid regex")
});
static WEEKDAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:(next|this|on)\s+)?(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b",
    )
    .expect("valid regex")
});
static MONTH_ONLY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)\b(?:in\s+)?(january|february|march|april|june|july|august",
        r"|september|october|november|december)\b",
    ))
    .expect("valid regex")
});
static TIME_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:at\s+)?(noon|midday|midnight)\b").expect("valid regex"));

/// Evening default used for "tonight" when no clock time was given
const TONIGHT: (u32, u32) = (20, 0);

/// Named days, weekdays, bare months and numeric dates
pub struct PhraseResolver;

impl PhraseResolver {
    fn date_phrase(
        text: &str,
        settings: &ResolverSettings,
    ) -> Option<(NaiveDate, Option<NaiveTime>, Range<usize>)> {
        let today = settings.today();

        if let Some(caps) = ISO_DATE.captures(text) {
            let date = NaiveDate::from_ymd_opt(
                caps[1].parse().ok()?,
                caps[2].parse().ok()?,
                caps[3].parse().ok()?,
            );
            if let (Some(date), Some(m)) = (date, caps.get(0)) {
                return Some((date, None, m.range()));
            }
        }

        if let Some(caps) = SLASH_DATE.captures(text) {
            let first: u32 = caps[1].parse().ok()?;
            let second: u32 = caps[2].parse().ok()?;
            let year: i32 = caps[3].parse().ok()?;
            // Month first, like the exporter; day first when that is the only valid reading
            let date = NaiveDate::from_ymd_opt(year, first, second)
                .or_else(|| NaiveDate::from_ymd_opt(year, second, first));
            if let (Some(date), Some(m)) = (date, caps.get(0)) {
                return Some((date, None, m.range()));
            }
        }

        if let Some(caps) = DAY_WORD.captures(text) {
            let word = caps[1].to_lowercase();
            let span = caps.get(0)?.range();
            let (date, time) = match word.as_str() {
                "today" => (today, None),
                "tonight" => (today, NaiveTime::from_hms_opt(TONIGHT.0, TONIGHT.1, 0)),
                "tomorrow" => (today + Duration::days(1), None),
                _ => (today + Duration::days(2), None),
            };
            return Some((date, time, span));
        }

        if let Some(caps) = WEEKDAY.captures(text) {
            let target: Weekday = caps[2].parse().ok()?;
            let modifier = caps.get(1).map(|m| m.as_str().to_lowercase());
            let next = modifier.as_deref() == Some("next");
            let date = weekday_date(today, target, next, settings.prefer_future);
            return Some((date, None, caps.get(0)?.range()));
        }

        if settings.prefer_first_of_month {
            if let Some(caps) = MONTH_ONLY.captures(text) {
                let month = *MONTHS.get(caps[1].to_lowercase().as_str())?;
                let year = if settings.prefer_future && month < today.month() {
                    today.year() + 1
                } else {
                    today.year()
                };
                let date = NaiveDate::from_ymd_opt(year, month, 1)?;
                return Some((date, None, caps.get(0)?.range()));
            }
        }

        None
    }
}

impl DateResolver for PhraseResolver {
    fn resolve(&self, text: &str, settings: &ResolverSettings) -> Option<Resolved> {
        let (date, implied_time, span) = Self::date_phrase(text, settings)?;
        let mut spans = vec![span];
        let mut time = implied_time;
        if let Some((word_time, word_span)) = time_word(text) {
            time = Some(word_time);
            spans.push(word_span);
        }
        Some(Resolved { date, time, spans })
    }

    fn name(&self) -> &'static str {
        "phrase"
    }
}

const NUMBER: &str =
    r"(?P<n>\d+|an?|one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve)";
const UNIT: &str = r"(?P<unit>day|week|month|year)s?";

static RELATIVE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        format!(r"(?i)\b(?:in\s+)?{NUMBER}\s+{UNIT}\s+(?:from\s+(?:now|today)|later|time)\b"),
        format!(r"(?i)\bin\s+{NUMBER}\s+{UNIT}\b"),
        format!(r"(?i)\b(?P<next>next|following)\s+{UNIT}\b"),
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid relative regex"))
    .collect()
});

/// Offsets from now: "four days from now", "in 2 weeks", "next month"
pub struct RelativeResolver;

impl DateResolver for RelativeResolver {
    fn resolve(&self, text: &str, settings: &ResolverSettings) -> Option<Resolved> {
        for re in RELATIVE_PATTERNS.iter() {
            let Some(caps) = re.captures(text) else {
                continue;
            };
            let amount = match caps.name("n") {
                Some(n) => number_word(n.as_str())?,
                None => 1,
            };
            let date = shift(settings.today(), amount, &caps["unit"].to_lowercase())?;
            let mut spans = vec![caps.get(0)?.range()];
            let mut time = None;
            if let Some((word_time, word_span)) = time_word(text) {
                time = Some(word_time);
                spans.push(word_span);
            }
            return Some(Resolved { date, time, spans });
        }
        None
    }

    fn name(&self) -> &'static str {
        "relative"
    }
}

/// A phrase that names a time but no date: today, or tomorrow once that time
/// has passed and future dates are preferred
pub struct TimeOfDayResolver;

impl DateResolver for TimeOfDayResolver {
    fn resolve(&self, text: &str, settings: &ResolverSettings) -> Option<Resolved> {
        let (time, spans) = match time_word(text) {
            Some((word_time, word_span)) => (word_time, vec![word_span]),
            None => (settings.time_of_day?, Vec::new()),
        };
        let today = settings.today();
        let date = if settings.prefer_future && time < settings.relative_base.time() {
            today.succ_opt()?
        } else {
            today
        };
        Some(Resolved { date, time: Some(time), spans })
    }

    fn name(&self) -> &'static str {
        "time of day"
    }
}

fn time_word(text: &str) -> Option<(NaiveTime, Range<usize>)> {
    let caps = TIME_WORD.captures(text)?;
    let hour = if caps[1].eq_ignore_ascii_case("midnight") { 0 } else { 12 };
    Some((NaiveTime::from_hms_opt(hour, 0, 0)?, caps.get(0)?.range()))
}

fn number_word(word: &str) -> Option<u32> {
    let value = match word.to_lowercase().as_str() {
        "a" | "an" | "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "eleven" => 11,
        "twelve" => 12,
        digits => digits.parse().ok()?,
    };
    Some(value)
}

fn shift(from: NaiveDate, amount: u32, unit: &str) -> Option<NaiveDate> {
    match unit {
        "day" => from.checked_add_signed(Duration::days(i64::from(amount))),
        "week" => from.checked_add_signed(Duration::weeks(i64::from(amount))),
        "month" => from.checked_add_months(Months::new(amount)),
        "year" => from.checked_add_months(Months::new(amount.checked_mul(12)?)),
        _ => None,
    }
}

/// Date of `target` relative to `today`.
///
/// With future preference a bare weekday is the next occurrence on or after
/// today; "next" skips today. Without it, the most recent occurrence is used.
fn weekday_date(today: NaiveDate, target: Weekday, next: bool, prefer_future: bool) -> NaiveDate {
    let today_index = i64::from(today.weekday().num_days_from_monday());
    let target_index = i64::from(target.num_days_from_monday());
    let ahead = (target_index - today_index).rem_euclid(7);
    if next {
        let ahead = if ahead == 0 { 7 } else { ahead };
        return today + Duration::days(ahead);
    }
    if prefer_future {
        today + Duration::days(ahead)
    } else {
        today - Duration::days((7 - ahead) % 7)
    }
}
