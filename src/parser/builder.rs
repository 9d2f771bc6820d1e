//! Natural-language event builder.
//!
//! Runs the extractors in a fixed order over one input string and combines
//! what they found into a [`StructuredEvent`]. Parsing is all-or-nothing:
//! either a complete event comes back or a [`ParseError`] does.

use super::extractors::{
    extract_clock_time, extract_date, extract_duration, extract_reminder, extract_time_range,
    Facet,
};
use super::resolver::{DateResolver, ResolverChain, ResolverSettings};
use super::time_token::parse_clock;
use super::title::extract_title_or;
use super::ParseError;
use crate::event::{StructuredEvent, DEFAULT_TITLE};
use chrono::{Local, NaiveDateTime, NaiveTime};
use log::{debug, error};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Values used when the input does not say
#[derive(Debug, Clone)]
pub struct ParserDefaults {
    pub duration_minutes: i64,
    pub start_time: NaiveTime,
    pub placeholder_title: String,
}

impl Default for ParserDefaults {
    fn default() -> Self {
        Self {
            duration_minutes: 60,
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            placeholder_title: DEFAULT_TITLE.to_string(),
        }
    }
}

/// Turns phrases like "Monday 10am Team Meeting" into events.
///
/// The date resolver is injected so one instance can be shared by every
/// caller (the API keeps a single builder for the life of the process).
#[derive(Clone)]
pub struct EventBuilder {
    resolver: Arc<dyn DateResolver>,
    defaults: ParserDefaults,
}

impl Default for EventBuilder {
    fn default() -> Self {
        Self::new(Arc::new(ResolverChain::standard()), ParserDefaults::default())
    }
}

impl EventBuilder {
    pub fn new(resolver: Arc<dyn DateResolver>, defaults: ParserDefaults) -> Self {
        Self { resolver, defaults }
    }

    /// Parse relative to the current local time
    pub fn parse(&self, input: &str) -> Result<StructuredEvent, ParseError> {
        self.parse_at(input, Local::now().naive_local())
    }

    /// Parse relative to `now`. Panics inside the pipeline are reported as
    /// [`ParseError::Internal`] instead of unwinding into the caller.
    pub fn parse_at(&self, input: &str, now: NaiveDateTime) -> Result<StructuredEvent, ParseError> {
        if input.trim().is_empty() {
            return Err(ParseError::EmptyInput);
        }

        match panic::catch_unwind(AssertUnwindSafe(|| self.run_pipeline(input, now))) {
            Ok(result) => result,
            Err(cause) => {
                let message = cause
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| cause.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown failure".to_string());
                error!("Parser fault on '{}': {}", input, message);
                Err(ParseError::Internal(message))
            }
        }
    }

    fn run_pipeline(&self, input: &str, now: NaiveDateTime) -> Result<StructuredEvent, ParseError> {
        debug!("Parsing event phrase: '{}'", input);
        let text = input.trim().to_string();

        let reminder = extract_reminder(&text);
        let text = reminder.rest;
        let reminder = reminder.facet.found();

        let range = extract_time_range(&text);
        let text = range.rest;
        let range = range.facet.found();

        let (duration, text) = if range.is_none() {
            let duration = extract_duration(&text);
            (duration.facet.found(), duration.rest)
        } else {
            (None, text)
        };

        let explicit_date = extract_date(&text, now.date());
        let text = explicit_date.rest;
        let explicit_date = match explicit_date.facet {
            Facet::Found(date) => Some(date),
            Facet::Malformed(fragment) => {
                debug!("Ignoring invalid date '{}', trying the resolver", fragment);
                None
            }
            Facet::NotFound => None,
        };

        let (clock, text) = if range.is_none() {
            let clock = extract_clock_time(&text);
            (clock.facet.found(), clock.rest)
        } else {
            (None, text)
        };

        let (date, resolved_time, text) = match explicit_date {
            Some(date) => (date, None, text),
            None => {
                let time_of_day = clock
                    .as_deref()
                    .or_else(|| range.as_ref().map(|r| r.start.as_str()))
                    .and_then(parse_clock);
                let settings = ResolverSettings::anchored_at(now).with_time_of_day(time_of_day);
                let resolved = self
                    .resolver
                    .resolve(&text, &settings)
                    .ok_or_else(|| ParseError::unparseable(input))?;
                let rest = resolved.strip_from(&text);
                (resolved.date, resolved.time, rest)
            }
        };

        let title = extract_title_or(&text, &self.defaults.placeholder_title);

        let mut event = match range {
            Some(range) => {
                let start = clock_or_fault(&range.start)?;
                let end = clock_or_fault(&range.end)?;
                StructuredEvent::with_end(title, date, start, end)
            }
            None => {
                let start = match clock {
                    Some(clock) => clock_or_fault(&clock)?,
                    None => resolved_time.unwrap_or(self.defaults.start_time),
                };
                let minutes = duration.unwrap_or(self.defaults.duration_minutes);
                StructuredEvent::with_duration(title, date, start, minutes)
            }
        };
        event.reminder = reminder;

        debug!(
            "Parsed '{}' -> {} {} {}-{} ({} min)",
            input, event.title, event.date, event.start_time, event.end_time, event.duration
        );
        Ok(event)
    }
}

fn clock_or_fault(value: &str) -> Result<NaiveTime, ParseError> {
    parse_clock(value)
        .ok_or_else(|| ParseError::Internal(format!("invalid clock time '{}'", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::resolver::Resolved;
    use chrono::{Datelike, NaiveDate, Weekday};
    use pretty_assertions::assert_eq;

    fn now() -> NaiveDateTime {
        // A Thursday
        NaiveDate::from_ymd_opt(2025, 1, 16).unwrap().and_hms_opt(9, 30, 0).unwrap()
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_weekday_with_single_time() {
        let event = EventBuilder::default().parse_at("Monday 10am Team Meeting", now()).unwrap();
        assert_eq!(event.date, NaiveDate::from_ymd_opt(2025, 1, 20).unwrap());
        assert_eq!(event.date.weekday(), Weekday::Mon);
        assert_eq!(event.start_time, hm(10, 0));
        assert_eq!(event.end_time, hm(11, 0));
        assert_eq!(event.duration, 60);
        assert_eq!(event.title, "Team Meeting");
    }

    #[test]
    fn test_range_beats_duration_clause() {
        let event = EventBuilder::default()
            .parse_at("4th of January, study for 4 hours (6am to 10am)", now())
            .unwrap();
        assert_eq!(event.date, NaiveDate::from_ymd_opt(2026, 1, 4).unwrap());
        assert_eq!(event.start_time, hm(6, 0));
        assert_eq!(event.end_time, hm(10, 0));
        assert_eq!(event.duration, 240);
        assert!(event.title.contains("study"));
    }

    #[test]
    fn test_duration_sets_end() {
        let event = EventBuilder::default()
            .parse_at("Dentist tomorrow 3:30pm for 45 minutes remind me 1 hour before", now())
            .unwrap();
        assert_eq!(event.date, NaiveDate::from_ymd_opt(2025, 1, 17).unwrap());
        assert_eq!(event.start_time, hm(15, 30));
        assert_eq!(event.end_time, hm(16, 15));
        assert_eq!(event.duration, 45);
        assert_eq!(event.reminder, Some(60));
        assert_eq!(event.title, "Dentist");
    }

    #[test]
    fn test_overnight_range_wraps() {
        let event =
            EventBuilder::default().parse_at("Night shift Friday 11pm to 1am", now()).unwrap();
        assert_eq!(event.start_time, hm(23, 0));
        assert_eq!(event.end_time, hm(1, 0));
        assert_eq!(event.duration, 120);
        assert!(event.wraps_midnight());
        assert_eq!(event.title, "Night shift");
    }

    #[test]
    fn test_explicit_date_without_time_uses_default_start() {
        let event = EventBuilder::default().parse_at("Board review March 3rd", now()).unwrap();
        assert_eq!(event.date, NaiveDate::from_ymd_opt(2025, 3, 3).unwrap());
        assert_eq!(event.start_time, hm(9, 0));
        assert_eq!(event.duration, 60);
        assert_eq!(event.title, "Board review");
    }

    #[test]
    fn test_invalid_explicit_date_falls_back_to_resolver() {
        let err = EventBuilder::default().parse_at("Party Feb 30", now()).unwrap_err();
        assert!(matches!(err, ParseError::Unparseable { .. }));

        let event = EventBuilder::default().parse_at("Party Feb 30 tomorrow", now()).unwrap();
        assert_eq!(event.date, NaiveDate::from_ymd_opt(2025, 1, 17).unwrap());
    }

    #[test]
    fn test_relative_fallback() {
        let event =
            EventBuilder::default().parse_at("Submit report four days from now", now()).unwrap();
        assert_eq!(event.date, NaiveDate::from_ymd_opt(2025, 1, 20).unwrap());
        assert_eq!(event.title, "Submit report");
    }

    #[test]
    fn test_time_without_date_is_today_or_tomorrow() {
        let builder = EventBuilder::default();
        let event = builder.parse_at("Standup 10am", now()).unwrap();
        assert_eq!(event.date, NaiveDate::from_ymd_opt(2025, 1, 16).unwrap());
        assert_eq!(event.start_time, hm(10, 0));
        assert_eq!(event.title, "Standup");

        let event = builder.parse_at("Standup 8am", now()).unwrap();
        assert_eq!(event.date, NaiveDate::from_ymd_opt(2025, 1, 17).unwrap());

        let event = builder.parse_at("Lunch at noon", now()).unwrap();
        assert_eq!(event.date, NaiveDate::from_ymd_opt(2025, 1, 16).unwrap());
        assert_eq!(event.start_time, hm(12, 0));
        assert_eq!(event.title, "Lunch");
    }

    #[test]
    fn test_empty_and_blank_input_fail() {
        let builder = EventBuilder::default();
        assert_eq!(builder.parse_at("", now()), Err(ParseError::EmptyInput));
        assert_eq!(builder.parse_at("   \t", now()), Err(ParseError::EmptyInput));
    }

    #[test]
    fn test_unresolvable_input_has_suggestion() {
        let err = EventBuilder::default().parse_at("Team Meeting", now()).unwrap_err();
        match err {
            ParseError::Unparseable { suggestion, .. } => {
                assert!(suggestion.contains("Monday 10am"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_out_of_range_hour_is_a_fault() {
        let err = EventBuilder::default().parse_at("Gym tomorrow 13pm to 2pm", now()).unwrap_err();
        assert!(matches!(err, ParseError::Internal(_)));
    }

    struct PanickingResolver;

    impl DateResolver for PanickingResolver {
        fn resolve(&self, _text: &str, _settings: &ResolverSettings) -> Option<Resolved> {
            panic!("resolver exploded")
        }

        fn name(&self) -> &'static str {
            "panicking"
        }
    }

    #[test]
    fn test_resolver_panic_is_contained() {
        let builder = EventBuilder::new(Arc::new(PanickingResolver), ParserDefaults::default());
        let err = builder.parse_at("Standup sometime", now()).unwrap_err();
        assert_eq!(err, ParseError::Internal("resolver exploded".to_string()));
    }

    #[test]
    fn test_custom_defaults() {
        let defaults = ParserDefaults {
            duration_minutes: 30,
            start_time: hm(8, 0),
            placeholder_title: "Event".to_string(),
        };
        let builder = EventBuilder::new(Arc::new(ResolverChain::standard()), defaults);
        let event = builder.parse_at("tomorrow", now()).unwrap();
        assert_eq!(event.title, "Event");
        assert_eq!(event.start_time, hm(8, 0));
        assert_eq!(event.end_time, hm(8, 30));
    }
}
