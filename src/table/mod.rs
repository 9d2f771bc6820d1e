//! Raw table normalization.
//!
//! Document extractors hand over rows of text cells with no schema. The user
//! says which column holds which field ([`ColumnMapping`]) and optionally
//! narrows the rows down with keywords ([`KeywordFilter`]).

pub mod csv_source;

use log::debug;
use serde::{Deserialize, Serialize};

/// One row of text cells as extracted from a document
pub type RawRow = Vec<String>;

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("Document is empty")]
    Empty,
    #[error("Could not read table: {0}")]
    Csv(#[from] csv::Error),
}

/// Column index for each event field; `None` leaves the field empty
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    #[serde(default)]
    pub course: Option<usize>,
    #[serde(default)]
    pub title: Option<usize>,
    #[serde(default)]
    pub date: Option<usize>,
    #[serde(default)]
    pub time: Option<usize>,
    #[serde(default)]
    pub location: Option<usize>,
}

impl ColumnMapping {
    /// Guess the mapping from a header row.
    ///
    /// Recognized headers: course/code, title/name, date, time, location/venue.
    pub fn infer_from_headers(headers: &[String]) -> Self {
        let find = |names: &[&str]| {
            headers.iter().position(|h| names.contains(&h.trim().to_lowercase().as_str()))
        };
        Self {
            course: find(&["course", "code", "course code"]),
            title: find(&["title", "name", "subject"]),
            date: find(&["date", "day"]),
            time: find(&["time", "start", "start time"]),
            location: find(&["location", "venue", "room"]),
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &ColumnMapping::default()
    }
}

/// Case-insensitive keywords; a row passes if any keyword occurs in it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordFilter {
    keywords: Vec<String>,
}

impl KeywordFilter {
    /// Parse a comma-separated keyword list. Blank entries are ignored.
    pub fn parse(raw: &str) -> Self {
        let keywords = raw
            .split(',')
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keywords }
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Whether `event` mentions any keyword in its course, title or location
    pub fn matches(&self, event: &TableEvent) -> bool {
        if self.is_empty() {
            return true;
        }
        let haystack =
            format!("{} {} {}", event.course, event.title, event.location).to_lowercase();
        self.keywords.iter().any(|k| haystack.contains(k.as_str()))
    }
}

/// A table row mapped onto event fields. Any field may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableEvent {
    pub course: String,
    pub title: String,
    pub date: String,
    pub time: String,
    pub location: String,
}

impl TableEvent {
    fn from_row(row: &[String], mapping: &ColumnMapping) -> Self {
        let cell = |index: Option<usize>| {
            index.and_then(|i| row.get(i)).map(|c| c.trim().to_string()).unwrap_or_default()
        };
        Self {
            course: cell(mapping.course),
            title: cell(mapping.title),
            date: cell(mapping.date),
            time: cell(mapping.time),
            location: cell(mapping.location),
        }
    }

    /// A row needs at least a course or a title to count as an event
    pub fn is_valid(&self) -> bool {
        !(self.course.is_empty() && self.title.is_empty())
    }
}

/// Map rows onto events, drop rows without course or title, then apply the keyword filter.
///
/// Output order follows input order.
pub fn normalize_rows(rows: &[RawRow], mapping: &ColumnMapping, filters: &str) -> Vec<TableEvent> {
    let filter = KeywordFilter::parse(filters);
    let events: Vec<TableEvent> = rows
        .iter()
        .map(|row| TableEvent::from_row(row, mapping))
        .filter(TableEvent::is_valid)
        .filter(|event| filter.matches(event))
        .collect();
    debug!(
        "Normalized {} of {} rows (filters: {:?})",
        events.len(),
        rows.len(),
        filter.keywords()
    );
    events
}

/// Treat the first row as headers, infer the mapping from it and normalize the rest
pub fn normalize_with_headers(rows: &[RawRow], filters: &str) -> (ColumnMapping, Vec<TableEvent>) {
    match rows.split_first() {
        Some((headers, body)) => {
            let mapping = ColumnMapping::infer_from_headers(headers);
            let events = normalize_rows(body, &mapping, filters);
            (mapping, events)
        }
        None => (ColumnMapping::default(), Vec::new()),
    }
}
