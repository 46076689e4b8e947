use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::provider::ProviderError;

/// Malformed input. Any of these aborts the whole request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IngestError {
    #[error("Duplicate word identifier {id:?} at positions {first} and {second}")]
    DuplicateIdentifier {
        id: String,
        first: usize,
        second: usize,
    },

    #[error("Unknown word identifier {id:?}")]
    UnknownIdentifier { id: String },

    #[error("Internal index {index} is outside [0, {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Transcript is not time-ordered at word {id:?} (index {index}): {reason}")]
    UnorderedTranscript {
        id: String,
        index: usize,
        reason: String,
    },

    #[error("Script {concept_id:?} references unknown block {block_id:?}")]
    UnknownBlock {
        concept_id: String,
        block_id: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, IngestError>;

/// Why a single quote, or a whole script, did not make it into the output.
///
/// Recoverable: these are recorded in the response payload, never raised.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlignmentError {
    #[error("No match for quote: {detail}")]
    NoMatch { detail: String },

    #[error("Quote contains words absent from the source range: {missing:?}")]
    Hallucination { missing: Vec<String> },

    #[error("Resolved span [{start}, {end}] is malformed or out of bounds")]
    InvalidSpan { start: usize, end: usize },

    #[error(
        "Quote {position} starts at index {start} which does not follow quote {previous_position} ending at {previous_end}"
    )]
    ChronologyViolation {
        position: usize,
        start: usize,
        previous_position: usize,
        previous_end: usize,
    },

    /// The quote itself was fine but its script produced no output.
    #[error("Quote dropped with its script: {reason}")]
    ScriptRejected { reason: String },
}

/// Failures of the assisted-search collaborator. Always treated as a fallback miss.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid API response: {reason}")]
    InvalidResponse { reason: String },

    #[error("Assisted search did not answer within {secs}s")]
    Timeout { secs: u64 },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Failed to parse config {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("{field} {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
