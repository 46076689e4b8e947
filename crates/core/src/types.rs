use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::error::AlignmentError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WordKind {
    #[default]
    Word,
    Pause,
}

/// A transcript item as delivered by ingestion, keyed by its external id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordInput {
    pub id: String,
    pub text: String,
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub speaker_id: String,
    #[serde(default, rename = "type")]
    pub kind: WordKind,
}

/// An ingested word. Only the remapper knows its external id.
#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    pub index: usize,
    pub text: String,
    pub start: f64,
    pub end: f64,
    pub speaker_id: String,
    pub kind: WordKind,
}

impl Word {
    pub fn is_spoken(&self) -> bool {
        self.kind == WordKind::Word
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// Ordinal of the block within the transcript.
    pub ordinal: usize,
    pub first: usize,
    pub last: usize,
    pub speaker_id: String,
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
    /// Spoken words only; pauses are not counted.
    pub word_count: usize,
}

impl Block {
    pub fn id(&self) -> String {
        block_id(self.ordinal)
    }

    pub fn range(&self) -> RangeInclusive<usize> {
        self.first..=self.last
    }
}

pub fn block_id(ordinal: usize) -> String {
    format!("block_{:03}", ordinal)
}

/// Parse `block_NNN` back to its ordinal.
pub fn parse_block_id(id: &str) -> Option<usize> {
    id.strip_prefix("block_")?.parse().ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMethod {
    Deterministic,
    Fuzzy,
}

/// An inclusive internal-index range a quote is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResolvedSpan {
    pub start: usize,
    pub end: usize,
    pub method: MatchMethod,
    pub score: f64,
}

/// A quote as supplied by the scripting step: either the bare text or the
/// text plus the block it was taken from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuoteInput {
    Text(String),
    Hinted {
        text: String,
        #[serde(default)]
        source_block_id: Option<String>,
    },
}

impl QuoteInput {
    pub fn text(&self) -> &str {
        match self {
            QuoteInput::Text(text) => text,
            QuoteInput::Hinted { text, .. } => text,
        }
    }

    pub fn source_block_id(&self) -> Option<&str> {
        match self {
            QuoteInput::Text(_) => None,
            QuoteInput::Hinted {
                source_block_id, ..
            } => source_block_id.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptRequest {
    pub concept_id: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Blocks chosen by the upstream selection step.
    #[serde(default)]
    pub block_ids: Vec<String>,
    pub quotes: Vec<QuoteInput>,
}

/// A quote resolved against internal indices: what the locators work on.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub position: usize,
    pub text: String,
    pub source_block: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptStatus {
    Success,
    Partial,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScriptChunk {
    pub position: usize,
    pub chunk_text: String,
    pub start_word_id: String,
    pub end_word_id: String,
    pub word_ids: Vec<String>,
    pub start_time: f64,
    pub end_time: f64,
    pub method: MatchMethod,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoteFailure {
    pub position: usize,
    pub chunk_text: String,
    pub error: AlignmentError,
    /// External ids of the span the quote resolved to, if it resolved at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScriptResult {
    pub concept_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub status: ScriptStatus,
    pub duration_seconds: f64,
    pub script_chunks: Vec<ScriptChunk>,
    pub failures: Vec<QuoteFailure>,
}
