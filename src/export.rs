//! iCalendar export.
//!
//! Both the natural-language and the table path end up here as loosely typed
//! [`CalendarRecord`]s. Each record is resolved to concrete start and end
//! times and written out as a `VEVENT` with the `ics` crate.

use crate::event::{Priority, StructuredEvent, DEFAULT_TITLE};
use crate::parser::time_token::{normalize_meridiem, parse_clock};
use crate::table::TableEvent;
use chrono::{DateTime, Duration, Local, NaiveDateTime, Utc};
use ics::components::Property;
use ics::properties::{Categories, Description, DtEnd, DtStart, Location, Summary};
use ics::{escape_text, Event, ICalendar};
use log::{debug, info, warn};
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const PRODID: &str = "-//CalendMe//Schedule Export//EN";
const UID_DOMAIN: &str = "calendme";
const ICS_DATETIME: &str = "%Y%m%dT%H%M%S";

/// Formats tried, in order, on `"<date> <time>"`
const START_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%m/%d/%Y %H:%M",
    "%Y-%m-%d %I:%M %p",
    "%m/%d/%Y %I:%M %p",
    "%d-%m-%Y %I:%M %p",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExportError {
    #[error("No events to export")]
    NoEvents,
    #[error("None of the {0} events had a usable date and time")]
    NothingExportable(usize),
}

/// What to do with a record whose start cannot be parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnparseablePolicy {
    /// Leave the event out and log it
    #[default]
    Skip,
    /// Emit it without DTSTART/DTEND, keeping the raw date and time in the description
    Describe,
}

/// A loosely typed event as sent by clients. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarRecord {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub course: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default, alias = "time")]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default, deserialize_with = "loose_number")]
    pub duration: Option<i64>,
    #[serde(default, deserialize_with = "loose_number")]
    pub reminder: Option<i64>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

/// Accept `45`, `"45"` or `null`
fn loose_number<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Number(i64),
        Text(String),
    }

    match Option::<Loose>::deserialize(deserializer)? {
        Some(Loose::Number(n)) => Ok(Some(n)),
        Some(Loose::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(Loose::Text(s)) => s.trim().parse().map(Some).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

impl From<&StructuredEvent> for CalendarRecord {
    fn from(event: &StructuredEvent) -> Self {
        Self {
            title: Some(event.title.clone()),
            course: None,
            date: Some(event.date.format("%Y-%m-%d").to_string()),
            start_time: Some(event.start_time.format("%H:%M").to_string()),
            end_time: Some(event.end_time.format("%H:%M").to_string()),
            duration: Some(event.duration),
            reminder: event.reminder.map(i64::from),
            priority: Some(event.priority.category().to_string()),
            notes: event.notes.clone(),
            location: None,
        }
    }
}

impl From<&TableEvent> for CalendarRecord {
    fn from(event: &TableEvent) -> Self {
        Self {
            title: non_empty(&event.title),
            course: non_empty(&event.course),
            date: non_empty(&event.date),
            start_time: non_empty(&event.time),
            location: non_empty(&event.location),
            ..Default::default()
        }
    }
}

impl CalendarRecord {
    /// "course - title", or whichever of the two is present
    pub fn summary(&self) -> String {
        let course = self.course.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let title = self.title.as_deref().map(str::trim).filter(|s| !s.is_empty());
        match (course, title) {
            (Some(course), Some(title)) => format!("{} - {}", course, title),
            (Some(one), None) | (None, Some(one)) => one.to_string(),
            (None, None) => DEFAULT_TITLE.to_string(),
        }
    }

    /// Combine date and start time, trying each supported format
    pub fn start(&self) -> Option<NaiveDateTime> {
        let date = self.date.as_deref()?.trim();
        let time = normalize_meridiem(self.start_time.as_deref()?);
        if date.is_empty() || time.is_empty() {
            return None;
        }
        let combined = format!("{} {}", date, time);
        START_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(&combined, format).ok())
    }

    /// End from a positive duration, then the explicit end time, then `default_minutes`.
    /// An end time before the start is taken to be on the next day; one equal to the
    /// start is ignored. `None` when the end is not representable.
    pub fn end(&self, start: NaiveDateTime, default_minutes: i64) -> Option<NaiveDateTime> {
        if let Some(minutes) = self.duration.filter(|&m| m > 0) {
            return start.checked_add_signed(Duration::try_minutes(minutes)?);
        }

        let explicit = self
            .end_time
            .as_deref()
            .and_then(|raw| parse_clock(&normalize_meridiem(raw)))
            .map(|time| start.date().and_time(time));

        match explicit {
            Some(end) if end < start => end.checked_add_signed(Duration::days(1)),
            Some(end) if end > start => Some(end),
            _ => start.checked_add_signed(Duration::try_minutes(default_minutes.max(1))?),
        }
    }

    pub fn priority(&self) -> Priority {
        self.priority.as_deref().map(Priority::from_label).unwrap_or_default()
    }

    fn description(&self, fallback: Option<String>) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(notes) = self.notes.as_deref().and_then(non_empty) {
            parts.push(notes);
        }
        if let Some(minutes) = self.reminder {
            parts.push(format!("Reminder: {} minutes before", minutes));
        }
        parts.extend(fallback);
        (!parts.is_empty()).then(|| parts.join("\n"))
    }
}

#[derive(Debug, Clone)]
pub struct ExportSettings {
    pub policy: UnparseablePolicy,
    pub default_duration_minutes: i64,
    pub calendar_name: Option<String>,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self { policy: UnparseablePolicy::Skip, default_duration_minutes: 60, calendar_name: None }
    }
}

/// A rendered calendar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub text: String,
    pub emitted: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Default)]
pub struct CalendarSerializer {
    settings: ExportSettings,
}

impl CalendarSerializer {
    pub fn new(settings: ExportSettings) -> Self {
        Self { settings }
    }

    /// Serialize with the current time as DTSTAMP
    pub fn serialize(&self, records: &[CalendarRecord]) -> Result<Export, ExportError> {
        self.serialize_at(records, Utc::now())
    }

    /// Serialize with a fixed DTSTAMP. The same input and stamp always give the same text.
    pub fn serialize_at(
        &self,
        records: &[CalendarRecord],
        stamp: DateTime<Utc>,
    ) -> Result<Export, ExportError> {
        if records.is_empty() {
            return Err(ExportError::NoEvents);
        }

        let dtstamp = stamp.format("%Y%m%dT%H%M%SZ").to_string();
        let mut calendar = ICalendar::new("2.0", PRODID);
        if let Some(name) = &self.settings.calendar_name {
            calendar.push(Property::new("X-WR-CALNAME", escape_text(name.clone())));
        }

        let mut emitted = 0;
        let mut skipped = 0;
        for (index, record) in records.iter().enumerate() {
            match self.to_ics_event(index, record, &dtstamp) {
                Some(event) => {
                    calendar.add_event(event);
                    emitted += 1;
                }
                None => skipped += 1,
            }
        }

        if emitted == 0 {
            return Err(ExportError::NothingExportable(records.len()));
        }

        info!("Exported {} events ({} skipped)", emitted, skipped);
        Ok(Export { text: calendar.to_string(), emitted, skipped })
    }

    fn to_ics_event<'a>(
        &self,
        index: usize,
        record: &CalendarRecord,
        dtstamp: &str,
    ) -> Option<Event<'a>> {
        let summary = record.summary();
        let default_minutes = self.settings.default_duration_minutes;
        let span = record
            .start()
            .and_then(|start| Some((start, record.end(start, default_minutes)?)));

        let fallback = match span {
            Some(_) => None,
            None => match self.settings.policy {
                UnparseablePolicy::Skip => {
                    warn!(
                        "Skipping '{}': could not resolve date '{}', time '{}' and duration {:?}",
                        summary,
                        record.date.as_deref().unwrap_or(""),
                        record.start_time.as_deref().unwrap_or(""),
                        record.duration
                    );
                    return None;
                }
                UnparseablePolicy::Describe => Some(format!(
                    "Date: {}, Time: {}",
                    record.date.as_deref().unwrap_or("").trim(),
                    record.start_time.as_deref().unwrap_or("").trim()
                )),
            },
        };

        let uid_stamp = span
            .map(|(start, _)| start.format(ICS_DATETIME).to_string())
            .unwrap_or_else(|| "unscheduled".to_string());
        let uid = format!("{}-{}@{}", index, uid_stamp, UID_DOMAIN);
        let mut event = Event::new(uid, dtstamp.to_string());

        if let Some((start, end)) = span {
            debug!("Event '{}' {} -> {}", summary, start, end);
            event.push(DtStart::new(start.format(ICS_DATETIME).to_string()));
            event.push(DtEnd::new(end.format(ICS_DATETIME).to_string()));
        }

        event.push(Summary::new(escape_text(summary)));
        event.push(Categories::new(record.priority().category()));

        if let Some(description) = record.description(fallback) {
            event.push(Description::new(escape_text(description)));
        }
        if let Some(location) = record.location.as_deref().and_then(non_empty) {
            event.push(Location::new(escape_text(location)));
        }

        Some(event)
    }
}

/// `calendme_schedule_<timestamp>.ics`
pub fn export_file_name(now: DateTime<Local>) -> String {
    format!("calendme_schedule_{}.ics", now.format("%Y%m%d_%H%M%S"))
}

/// Write the calendar into `dir`, creating it if needed
pub fn write_export(dir: &Path, export: &Export, now: DateTime<Local>) -> std::io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(export_file_name(now));
    fs::write(&path, &export.text)?;
    info!("Wrote {} events to {}", export.emitted, path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, TimeZone};
    use pretty_assertions::assert_eq;
    use std::io::BufReader;

    fn stamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
    }

    fn record(title: &str, date: &str, time: &str) -> CalendarRecord {
        CalendarRecord {
            title: Some(title.to_string()),
            date: Some(date.to_string()),
            start_time: Some(time.to_string()),
            ..Default::default()
        }
    }

    /// (name, value) pairs of every VEVENT, re-parsed with the `ical` reader
    fn reparse(text: &str) -> Vec<Vec<(String, String)>> {
        let mut parser = ical::IcalParser::new(BufReader::new(text.as_bytes()));
        let calendar = parser.next().expect("one calendar").expect("valid calendar");
        calendar
            .events
            .into_iter()
            .map(|event| {
                event
                    .properties
                    .into_iter()
                    .map(|p| (p.name, p.value.unwrap_or_default()))
                    .collect()
            })
            .collect()
    }

    fn prop<'a>(event: &'a [(String, String)], name: &str) -> Option<&'a str> {
        event.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_single_event_round_trip() {
        let mut rec = record("Team Meeting", "2025-01-06", "10:00");
        rec.end_time = Some("11:00".to_string());
        rec.priority = Some("urgent".to_string());
        rec.reminder = Some(15);
        rec.location = Some("Room 4".to_string());

        let export = CalendarSerializer::default().serialize_at(&[rec], stamp()).unwrap();
        assert_eq!(export.emitted, 1);
        assert_eq!(export.skipped, 0);
        assert!(export.text.starts_with("BEGIN:VCALENDAR"));

        let events = reparse(&export.text);
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(prop(event, "SUMMARY"), Some("Team Meeting"));
        assert_eq!(prop(event, "DTSTART"), Some("20250106T100000"));
        assert_eq!(prop(event, "DTEND"), Some("20250106T110000"));
        assert_eq!(prop(event, "DTSTAMP"), Some("20250101T120000Z"));
        assert_eq!(prop(event, "CATEGORIES"), Some("Urgent"));
        assert_eq!(prop(event, "LOCATION"), Some("Room 4"));
        assert_eq!(prop(event, "UID"), Some("0-20250106T100000@calendme"));
        assert!(prop(event, "DESCRIPTION").unwrap().contains("Reminder: 15 minutes before"));
    }

    #[test]
    fn test_summary_combines_course_and_title() {
        let mut rec = record("Exam", "2025-01-06", "10:00");
        rec.course = Some("CS101".to_string());
        assert_eq!(rec.summary(), "CS101 - Exam");
        rec.title = None;
        assert_eq!(rec.summary(), "CS101");
        rec.course = Some("  ".to_string());
        assert_eq!(rec.summary(), DEFAULT_TITLE);
    }

    #[test]
    fn test_start_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 4).unwrap().and_hms_opt(14, 30, 0).unwrap();
        for (date, time) in [
            ("2025-03-04", "14:30"),
            ("2025-03-04", "14:30:00"),
            ("04-03-2025", "14:30"),
            ("03/04/2025", "14:30"),
            ("2025-03-04", "2:30 PM"),
            ("03/04/2025", "2:30pm"),
        ] {
            assert_eq!(record("x", date, time).start(), Some(expected), "{} {}", date, time);
        }
        assert_eq!(record("x", "2025-03-04", "").start(), None);
        assert_eq!(record("x", "next week", "14:30").start(), None);
    }

    #[test]
    fn test_end_resolution_order() {
        let start = NaiveDate::from_ymd_opt(2025, 3, 4).unwrap().and_hms_opt(23, 0, 0).unwrap();
        let mut rec = record("x", "2025-03-04", "23:00");
        assert_eq!(rec.end(start, 60), Some(start + Duration::minutes(60)));

        rec.end_time = Some("1:00 AM".to_string());
        let next_day = NaiveDate::from_ymd_opt(2025, 3, 5)
            .unwrap()
            .and_time(NaiveTime::from_hms_opt(1, 0, 0).unwrap());
        assert_eq!(rec.end(start, 60), Some(next_day));

        rec.duration = Some(30);
        assert_eq!(rec.end(start, 60), Some(start + Duration::minutes(30)));
    }

    #[test]
    fn test_non_positive_duration_falls_back() {
        let start = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap().and_hms_opt(9, 0, 0).unwrap();
        let mut rec = record("Lab", "2025-02-01", "09:00");
        rec.duration = Some(-30);
        assert_eq!(rec.end(start, 60), Some(start + Duration::minutes(60)));

        rec.duration = Some(0);
        rec.end_time = Some("09:00".to_string());
        assert_eq!(rec.end(start, 60), Some(start + Duration::minutes(60)));

        rec.end_time = Some("10:30".to_string());
        assert_eq!(rec.end(start, 60), Some(start + Duration::minutes(90)));
    }

    #[test]
    fn test_huge_duration_is_unparseable() {
        let mut rec = record("Lab", "2025-02-01", "09:00");
        rec.duration = Some(i64::MAX);
        let start = rec.start().unwrap();
        assert_eq!(rec.end(start, 60), None);

        let err = CalendarSerializer::default().serialize_at(&[rec.clone()], stamp()).unwrap_err();
        assert_eq!(err, ExportError::NothingExportable(1));

        let serializer = CalendarSerializer::new(ExportSettings {
            policy: UnparseablePolicy::Describe,
            ..Default::default()
        });
        let export = serializer.serialize_at(&[rec], stamp()).unwrap();
        let events = reparse(&export.text);
        assert_eq!(prop(&events[0], "DTSTART"), None);
        assert_eq!(prop(&events[0], "UID"), Some("0-unscheduled@calendme"));
    }

    #[test]
    fn test_empty_list_is_rejected() {
        let serializer = CalendarSerializer::default();
        assert_eq!(serializer.serialize_at(&[], stamp()), Err(ExportError::NoEvents));
        assert_eq!(ExportError::NoEvents.to_string(), "No events to export");
    }

    #[test]
    fn test_skip_policy_drops_unparseable_records() {
        let records =
            vec![record("Bad", "someday", "later"), record("Good", "2025-02-01", "09:00")];
        let export = CalendarSerializer::default().serialize_at(&records, stamp()).unwrap();
        assert_eq!((export.emitted, export.skipped), (1, 1));
        let events = reparse(&export.text);
        assert_eq!(prop(&events[0], "SUMMARY"), Some("Good"));
        assert_eq!(prop(&events[0], "UID"), Some("1-20250201T090000@calendme"));

        let err = CalendarSerializer::default().serialize_at(&records[..1], stamp()).unwrap_err();
        assert_eq!(err, ExportError::NothingExportable(1));
    }

    #[test]
    fn test_describe_policy_keeps_raw_values() {
        let serializer = CalendarSerializer::new(ExportSettings {
            policy: UnparseablePolicy::Describe,
            ..Default::default()
        });
        let export =
            serializer.serialize_at(&[record("Bad", "someday", "later")], stamp()).unwrap();
        let events = reparse(&export.text);
        let event = &events[0];
        assert_eq!(prop(event, "DTSTART"), None);
        assert_eq!(prop(event, "UID"), Some("0-unscheduled@calendme"));
        let description = prop(event, "DESCRIPTION").unwrap();
        assert!(description.contains("Date: someday"));
        assert!(description.contains("Time: later"));
    }

    #[test]
    fn test_serialize_is_deterministic_for_a_fixed_stamp() {
        let records = vec![record("A", "2025-02-01", "09:00"), record("B", "2025-02-02", "10:00")];
        let serializer = CalendarSerializer::default();
        let first = serializer.serialize_at(&records, stamp()).unwrap();
        let second = serializer.serialize_at(&records, stamp()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_overnight_structured_event_ends_next_day() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 17).unwrap();
        let event = StructuredEvent::with_end(
            "Night shift".into(),
            date,
            NaiveTime::from_hms_opt(23, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(1, 0, 0).unwrap(),
        );
        let export = CalendarSerializer::default()
            .serialize_at(&[CalendarRecord::from(&event)], stamp())
            .unwrap();
        let events = reparse(&export.text);
        assert_eq!(prop(&events[0], "DTSTART"), Some("20250117T230000"));
        assert_eq!(prop(&events[0], "DTEND"), Some("20250118T010000"));
    }

    #[test]
    fn test_structured_event_longer_than_a_day_keeps_its_duration() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 17).unwrap();
        let event = StructuredEvent::with_duration(
            "Hackathon".into(),
            date,
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            36 * 60,
        );
        let export = CalendarSerializer::default()
            .serialize_at(&[CalendarRecord::from(&event)], stamp())
            .unwrap();
        let events = reparse(&export.text);
        assert_eq!(prop(&events[0], "DTSTART"), Some("20250117T090000"));
        assert_eq!(prop(&events[0], "DTEND"), Some("20250118T210000"));
    }

    #[test]
    fn test_record_json_accepts_loose_shapes() {
        let rec: CalendarRecord = serde_json::from_str(
            r#"{"title": "Lab", "date": "2025-02-01", "time": "9:00 am",
                "duration": "90", "reminder": null}"#,
        )
        .unwrap();
        assert_eq!(rec.start_time.as_deref(), Some("9:00 am"));
        assert_eq!(rec.duration, Some(90));
        assert_eq!(rec.reminder, None);
        let start = rec.start().unwrap();
        assert_eq!(rec.end(start, 60), Some(start + Duration::minutes(90)));
    }

    #[test]
    fn test_table_event_conversion() {
        let row = TableEvent {
            course: "CS101".into(),
            title: "".into(),
            date: "2025-01-10".into(),
            time: "09:00".into(),
            location: "Hall A".into(),
        };
        let rec = CalendarRecord::from(&row);
        assert_eq!(rec.title, None);
        assert_eq!(rec.summary(), "CS101");
        assert_eq!(rec.location.as_deref(), Some("Hall A"));
    }

    #[test]
    fn test_write_export_names_file_by_time() {
        let dir = tempfile::tempdir().unwrap();
        let export = CalendarSerializer::default()
            .serialize_at(&[record("A", "2025-02-01", "09:00")], stamp())
            .unwrap();
        let now = Local.with_ymd_and_hms(2025, 2, 1, 8, 5, 9).unwrap();
        let path = write_export(&dir.path().join("out"), &export, now).unwrap();
        assert_eq!(path.file_name().unwrap(), "calendme_schedule_20250201_080509.ics");
        assert_eq!(fs::read_to_string(path).unwrap(), export.text);
    }
}
