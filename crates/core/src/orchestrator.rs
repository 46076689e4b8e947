//! Drives a request end to end: ingest once, then align every script
//! concurrently against the shared, read-only transcript context.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{Instrument, Span, debug, info, info_span, warn};

use crate::config::AlignmentConfig;
use crate::context::{CandidateSet, TranscriptContext};
use crate::error::{AlignmentError, IngestError, Result};
use crate::locate::{DeterministicLocator, FuzzyFallbackLocator, Located};
use crate::search::AssistedSearch;
use crate::types::{
    Quote, QuoteFailure, ResolvedSpan, ScriptChunk, ScriptRequest, ScriptResult, ScriptStatus,
    WordInput,
};
use crate::validate::{QuoteOutcome, ScriptValidator};

/// Lifecycle of one script inside a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptPhase {
    Pending,
    Aligning,
    Validating,
    Done(ScriptStatus),
}

impl ScriptPhase {
    pub fn can_advance_to(self, next: ScriptPhase) -> bool {
        matches!(
            (self, next),
            (ScriptPhase::Pending, ScriptPhase::Aligning)
                | (ScriptPhase::Aligning, ScriptPhase::Validating)
                | (ScriptPhase::Validating, ScriptPhase::Done(_))
        )
    }
}

struct PhaseTracker {
    phase: ScriptPhase,
}

impl PhaseTracker {
    fn new() -> Self {
        Self {
            phase: ScriptPhase::Pending,
        }
    }

    fn advance(&mut self, next: ScriptPhase) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "illegal script phase transition {:?} -> {:?}",
            self.phase,
            next
        );
        debug!(from = ?self.phase, to = ?next, "Script phase");
        self.phase = next;
    }
}

/// A script with every external block id resolved to an ordinal.
#[derive(Debug, Clone)]
struct PreparedScript {
    concept_id: String,
    title: Option<String>,
    blocks: Vec<usize>,
    quotes: Vec<Quote>,
}

/// Entry point of the library.
///
/// Cheap to clone: the transcript context and configuration are shared
/// behind `Arc` and never mutated after [`AlignmentEngine::new`].
#[derive(Clone)]
pub struct AlignmentEngine {
    ctx: Arc<TranscriptContext>,
    config: Arc<AlignmentConfig>,
    locator: DeterministicLocator,
    fallback: Option<FuzzyFallbackLocator>,
}

impl AlignmentEngine {
    pub fn new(words: &[WordInput], config: AlignmentConfig) -> Result<Self> {
        config.validate()?;
        let ctx = TranscriptContext::ingest(words, &config)?;
        Ok(Self {
            ctx: Arc::new(ctx),
            locator: DeterministicLocator::new(&config),
            config: Arc::new(config),
            fallback: None,
        })
    }

    /// Enable the fallback path. Ignored when `fallback.enabled` is false.
    pub fn with_search(self, search: Arc<dyn AssistedSearch>) -> Self {
        let fallback = FuzzyFallbackLocator::new(search, &self.config);
        self.with_fallback(fallback)
    }

    pub fn with_fallback(mut self, fallback: FuzzyFallbackLocator) -> Self {
        if self.config.fallback.enabled {
            self.fallback = Some(fallback);
        }
        self
    }

    pub fn context(&self) -> &TranscriptContext {
        &self.ctx
    }

    pub fn config(&self) -> &AlignmentConfig {
        &self.config
    }

    /// Align every script. Results come back in request order, one per script.
    ///
    /// Only malformed input is an error; per-quote and per-script failures
    /// are recorded in the results.
    pub async fn align_all(&self, scripts: &[ScriptRequest]) -> Result<Vec<ScriptResult>> {
        let prepared = scripts
            .iter()
            .map(|script| self.prepare(script))
            .collect::<Result<Vec<_>>>()?;

        let deadline = Instant::now() + self.config.fallback.request_timeout();
        let permits = Arc::new(Semaphore::new(self.config.max_concurrent_scripts));
        info!(
            scripts = prepared.len(),
            max_concurrent = self.config.max_concurrent_scripts,
            "Aligning scripts"
        );

        let mut handles = Vec::with_capacity(prepared.len());
        for script in prepared {
            let engine = self.clone();
            let permits = permits.clone();
            let concept_id = script.concept_id.clone();
            let title = script.title.clone();
            let quotes = script.quotes.clone();
            let span = info_span!("script", concept_id = %concept_id);
            let handle = tokio::spawn(
                async move {
                    let _permit = permits.acquire_owned().await.ok();
                    engine.run_script(script, deadline).await
                }
                .instrument(span),
            );
            handles.push((concept_id, title, quotes, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (concept_id, title, quotes, handle) in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => {
                    warn!(concept_id = %concept_id, error = %e, "Script task aborted");
                    results.push(aborted_script(
                        concept_id,
                        title,
                        &quotes,
                        &format!("script task aborted: {e}"),
                    ));
                }
            }
        }
        Ok(results)
    }

    /// Align a single script on the current task.
    pub async fn align_script(&self, script: &ScriptRequest) -> Result<ScriptResult> {
        let prepared = self.prepare(script)?;
        let deadline = Instant::now() + self.config.fallback.request_timeout();
        let span = info_span!("script", concept_id = %prepared.concept_id);
        Ok(self.run_script(prepared, deadline).instrument(span).await)
    }

    fn prepare(&self, script: &ScriptRequest) -> Result<PreparedScript> {
        let resolve = |block_id: &str| {
            self.ctx
                .find_block(block_id)
                .ok_or_else(|| IngestError::UnknownBlock {
                    concept_id: script.concept_id.clone(),
                    block_id: block_id.to_string(),
                })
        };

        let blocks = if script.block_ids.is_empty() {
            (0..self.ctx.blocks().len()).collect()
        } else {
            script
                .block_ids
                .iter()
                .map(|id| resolve(id.as_str()))
                .collect::<Result<Vec<_>>>()?
        };

        let quotes = script
            .quotes
            .iter()
            .enumerate()
            .map(|(position, quote)| -> Result<Quote> {
                Ok(Quote {
                    position,
                    text: quote.text().trim().to_string(),
                    source_block: quote.source_block_id().map(|id| resolve(id)).transpose()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(PreparedScript {
            concept_id: script.concept_id.clone(),
            title: script.title.clone(),
            blocks,
            quotes,
        })
    }

    async fn run_script(&self, script: PreparedScript, deadline: Instant) -> ScriptResult {
        let mut tracker = PhaseTracker::new();
        tracker.advance(ScriptPhase::Aligning);

        let candidates = Arc::new(self.ctx.candidate_tokens(&script.blocks));
        let mut outcomes = Vec::with_capacity(script.quotes.len());
        let mut pending = JoinSet::new();

        for quote in &script.quotes {
            let tokens = self.ctx.normalizer().normalize(&quote.text);
            let result = match self.locate(quote, &tokens, &candidates) {
                Located::Found(span) => Ok(span),
                Located::NotFound { best_score } => {
                    debug!(position = quote.position, ?best_score, "Deterministic miss");
                    match &self.fallback {
                        Some(fallback) if !tokens.is_empty() && !candidates.is_empty() => {
                            let slot = outcomes.len();
                            let fallback = fallback.clone();
                            let ctx = self.ctx.clone();
                            let candidates = candidates.clone();
                            let text = quote.text.clone();
                            let quote_tokens = tokens.clone();
                            pending.spawn(
                                async move {
                                    let result = fallback
                                        .locate(&text, &quote_tokens, &candidates, &ctx, deadline)
                                        .await;
                                    (slot, result)
                                }
                                .instrument(Span::current()),
                            );
                            Err(AlignmentError::NoMatch {
                                detail: "fallback did not complete".to_string(),
                            })
                        }
                        _ => Err(miss_error(&tokens, &candidates, best_score)),
                    }
                }
            };
            outcomes.push(QuoteOutcome {
                position: quote.position,
                tokens,
                result,
            });
        }

        while let Some(joined) = pending.join_next().await {
            match joined {
                Ok((slot, result)) => outcomes[slot].result = result,
                Err(e) => warn!(error = %e, "Fallback task aborted"),
            }
        }

        tracker.advance(ScriptPhase::Validating);
        let report = ScriptValidator::new(&self.ctx, &self.config).validate(&outcomes);

        let quote_text = |position: usize| {
            script
                .quotes
                .get(position)
                .map(|q| q.text.clone())
                .unwrap_or_default()
        };

        let mut script_chunks = Vec::with_capacity(report.accepted.len());
        let mut failures = Vec::with_capacity(report.rejected.len());
        for (position, span) in &report.accepted {
            match self.render_chunk(*position, quote_text(*position), span) {
                Ok(chunk) => script_chunks.push(chunk),
                Err(e) => {
                    warn!(position, error = %e, "Accepted span could not be rendered");
                    failures.push(QuoteFailure {
                        position: *position,
                        chunk_text: quote_text(*position),
                        error: AlignmentError::InvalidSpan {
                            start: span.start,
                            end: span.end,
                        },
                        span: None,
                    });
                }
            }
        }
        for rejected in report.rejected {
            failures.push(QuoteFailure {
                position: rejected.position,
                chunk_text: quote_text(rejected.position),
                span: rejected.span.and_then(|span| self.external_bounds(&span)),
                error: rejected.error,
            });
        }
        failures.sort_by_key(|f| f.position);

        let status = if script_chunks.is_empty() {
            ScriptStatus::Failed
        } else {
            report.status
        };
        let duration: f64 = script_chunks.iter().map(|c| c.end_time - c.start_time).sum();
        let duration_seconds = (duration * 100.0).round() / 100.0;

        tracker.advance(ScriptPhase::Done(status));
        info!(
            status = ?status,
            chunks = script_chunks.len(),
            failures = failures.len(),
            duration_seconds,
            "Script aligned"
        );

        ScriptResult {
            concept_id: script.concept_id,
            title: script.title,
            status,
            duration_seconds,
            script_chunks,
            failures,
        }
    }

    /// Hinted block first, then the script's full candidate set.
    fn locate(&self, quote: &Quote, tokens: &[String], candidates: &CandidateSet) -> Located {
        if let Some(block) = quote.source_block {
            let hinted = self.ctx.candidate_tokens(&[block]);
            if let found @ Located::Found(_) = self.locator.locate(tokens, &hinted) {
                return found;
            }
            debug!(position = quote.position, block, "Hinted block missed, widening search");
        }
        self.locator.locate(tokens, candidates)
    }

    fn render_chunk(
        &self,
        position: usize,
        chunk_text: String,
        span: &ResolvedSpan,
    ) -> Result<ScriptChunk> {
        let remapper = self.ctx.remapper();
        let words = self.ctx.words();
        let (first, last) = match (words.get(span.start), words.get(span.end)) {
            (Some(first), Some(last)) => (first, last),
            _ => {
                return Err(IngestError::IndexOutOfRange {
                    index: span.end,
                    len: words.len(),
                });
            }
        };

        Ok(ScriptChunk {
            position,
            chunk_text,
            start_word_id: remapper.to_external(span.start)?.to_string(),
            end_word_id: remapper.to_external(span.end)?.to_string(),
            word_ids: remapper.externals(span.start, span.end)?,
            start_time: first.start,
            end_time: last.end,
            method: span.method,
            score: span.score,
        })
    }

    fn external_bounds(&self, span: &ResolvedSpan) -> Option<(String, String)> {
        let remapper = self.ctx.remapper();
        let start = remapper.to_external(span.start).ok()?;
        let end = remapper.to_external(span.end).ok()?;
        Some((start.to_string(), end.to_string()))
    }
}

/// Failed result for a script whose task never returned. Every quote is
/// reported so the response still accounts for the whole script.
fn aborted_script(
    concept_id: String,
    title: Option<String>,
    quotes: &[Quote],
    reason: &str,
) -> ScriptResult {
    let failures = quotes
        .iter()
        .map(|quote| QuoteFailure {
            position: quote.position,
            chunk_text: quote.text.clone(),
            error: AlignmentError::ScriptRejected {
                reason: reason.to_string(),
            },
            span: None,
        })
        .collect();
    ScriptResult {
        concept_id,
        title,
        status: ScriptStatus::Failed,
        duration_seconds: 0.0,
        script_chunks: Vec::new(),
        failures,
    }
}

fn miss_error(
    tokens: &[String],
    candidates: &CandidateSet,
    best_score: Option<f64>,
) -> AlignmentError {
    let detail = if tokens.is_empty() {
        "quote has no matchable words".to_string()
    } else if candidates.is_empty() {
        "candidate blocks hold no text".to_string()
    } else {
        match best_score {
            Some(score) => format!("best window scored {score:.2}"),
            None => "no window found".to_string(),
        }
    };
    AlignmentError::NoMatch { detail }
}
