//! Title cleanup for the text left over after facet extraction

use crate::event::DEFAULT_TITLE;
use once_cell::sync::Lazy;
use regex::Regex;

const FILLER_WORDS: &[&str] = &[
    "at", "on", "by", "from", "to", "until", "for", "in", "of", "this", "next", "today", "tomorrow",
    "tonight", "noon", "midnight", "monday", "tuesday", "wednesday", "thursday", "friday",
    "saturday", "sunday",
];

static FILLER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b(?:{})\b", FILLER_WORDS.join("|"))).expect("valid filler regex")
});

static TIME_FRAGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b\d{1,2}:\d{2}\b|\b\d{1,2}\s*(?:a\.m\.|p\.m\.|am\b|pm\b)")
        .expect("valid time fragment regex")
});

static PUNCTUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"[,()]").expect("valid regex"));

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Turn residual text into a display title, falling back to the default placeholder
pub fn extract_title(residual: &str) -> String {
    extract_title_or(residual, DEFAULT_TITLE)
}

/// Like [`extract_title`] with a caller-chosen placeholder
pub fn extract_title_or(residual: &str, placeholder: &str) -> String {
    let text = TIME_FRAGMENT.replace_all(residual, " ");
    let text = FILLER.replace_all(&text, " ");
    let text = PUNCTUATION.replace_all(&text, " ");
    let title = WHITESPACE.replace_all(text.trim(), " ").into_owned();

    if title.is_empty() {
        placeholder.to_string()
    } else {
        title
    }
}
