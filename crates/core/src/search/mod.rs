//! Assisted search: the external collaborator consulted when the offline
//! locator misses. Its answers are untrusted and always re-validated.

pub mod llm;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::CandidateToken;
use crate::error::SearchError;

pub use llm::LlmAssistedSearch;

#[derive(Debug, Clone)]
pub struct SearchRequest<'a> {
    /// The quote as the scripting step wrote it.
    pub quote: &'a str,
    pub quote_tokens: &'a [String],
    /// Normalized candidate text with per-token provenance.
    pub candidates: &'a [CandidateToken],
    /// 1 for the first call, 2 for the retry.
    pub attempt: usize,
}

/// A span proposed by the collaborator, in internal indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedSpan {
    pub start_index: usize,
    pub end_index: usize,
}

#[async_trait]
pub trait AssistedSearch: Send + Sync {
    /// `Ok(None)` means the collaborator answered but found nothing.
    async fn search(&self, request: &SearchRequest<'_>)
    -> Result<Option<ProposedSpan>, SearchError>;
}
