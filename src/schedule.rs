//! Ordering and overlap checks for a list of parsed events

use crate::event::StructuredEvent;

/// Sort chronologically; events starting together are ordered by title
pub fn sort_events(events: &mut [StructuredEvent]) {
    events.sort_by(|a, b| {
        (a.date, a.start_time)
            .cmp(&(b.date, b.start_time))
            .then_with(|| a.title.cmp(&b.title))
    });
}

/// Events in `existing` on the same date as `candidate` whose time overlaps it.
///
/// Intervals are half-open, so back-to-back events do not conflict. An event
/// that runs past midnight is treated as ending after 24:00 on its own date.
pub fn find_conflicts<'a>(
    existing: &'a [StructuredEvent],
    candidate: &StructuredEvent,
) -> Vec<&'a StructuredEvent> {
    let (start, end) = candidate.minute_span();
    existing
        .iter()
        .filter(|other| other.date == candidate.date)
        .filter(|other| {
            let (other_start, other_end) = other.minute_span();
            start < other_end && other_start < end
        })
        .collect()
}
