//! Natural-language event parsing
//!
//! Leaves first: [`time_token`] converts clock tokens, [`extractors`] pull
//! facets out of the text, [`resolver`] handles relative phrases, [`title`]
//! cleans up what is left and [`builder`] ties it together.

pub mod builder;
pub mod extractors;
pub mod resolver;
pub mod time_token;
pub mod title;

pub use builder::{EventBuilder, ParserDefaults};
pub use resolver::{DateResolver, PhraseResolver, RelativeResolver, ResolverChain, ResolverSettings};

const SUGGESTION: &str = "Try something like \"Monday 10am Team Meeting\", \
\"tomorrow 3pm Dentist for 45 minutes\" or \"4th of January, study (6am to 10am)\"";

/// Why a phrase could not be turned into an event
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("No input provided")]
    EmptyInput,
    #[error("Could not work out a date from '{input}'. {suggestion}")]
    Unparseable { input: String, suggestion: String },
    #[error("Error parsing input: {0}")]
    Internal(String),
}

impl ParseError {
    pub fn unparseable(input: &str) -> Self {
        ParseError::Unparseable { input: input.to_string(), suggestion: SUGGESTION.to_string() }
    }
}
