use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::fs;

use verbatim_core::{Block, ScriptRequest, ScriptResult, TranscriptContext, WordInput};

#[derive(Debug, Deserialize)]
pub struct AlignmentRequest {
    pub words: Vec<WordInput>,
    #[serde(default)]
    pub scripts: Vec<ScriptRequest>,
}

#[derive(Debug, Serialize)]
pub struct AlignmentResponse {
    pub request_id: String,
    pub status: &'static str,
    pub normalization_version: u32,
    pub results: Vec<ScriptResult>,
}

/// `blocks` accepts either a bare word array or a full request.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TranscriptFile {
    Words(Vec<WordInput>),
    Request { words: Vec<WordInput> },
}

impl TranscriptFile {
    pub fn into_words(self) -> Vec<WordInput> {
        match self {
            TranscriptFile::Words(words) | TranscriptFile::Request { words } => words,
        }
    }
}

/// A block as the selection step sees it: external ids only.
#[derive(Debug, Serialize)]
pub struct BlockView {
    pub block_id: String,
    pub speaker_id: String,
    pub start_time: f64,
    pub end_time: f64,
    pub start_word_id: String,
    pub end_word_id: String,
    pub word_count: usize,
    pub text: String,
}

impl BlockView {
    pub fn new(block: &Block, ctx: &TranscriptContext) -> Result<Self> {
        let remapper = ctx.remapper();
        Ok(Self {
            block_id: block.id(),
            speaker_id: block.speaker_id.clone(),
            start_time: block.start_time,
            end_time: block.end_time,
            start_word_id: remapper.to_external(block.first)?.to_string(),
            end_word_id: remapper.to_external(block.last)?.to_string(),
            word_count: block.word_count,
            text: block.text.clone(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct BlocksResponse {
    pub normalization_version: u32,
    pub blocks: Vec<BlockView>,
}

pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("Failed to parse {}", path.display()))
}
