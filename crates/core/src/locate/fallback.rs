use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, timeout_at};
use tracing::{debug, warn};

use crate::config::AlignmentConfig;
use crate::context::{CandidateSet, TranscriptContext};
use crate::error::AlignmentError;
use crate::locate::window::{WindowParams, best_window_in};
use crate::search::{AssistedSearch, ProposedSpan, SearchRequest};
use crate::types::{MatchMethod, ResolvedSpan};
use crate::validate::IntegrityCheck;

/// One call plus one retry.
pub const FALLBACK_ATTEMPTS: usize = 2;

/// Consults assisted search for quotes the deterministic locator missed.
///
/// A proposal is never trusted as-is: it is re-scored with the same window
/// search, restricted to the proposed range with a wider skip budget, and
/// must pass the integrity check before it is accepted.
#[derive(Clone)]
pub struct FuzzyFallbackLocator {
    search: Arc<dyn AssistedSearch>,
    threshold: f64,
    params: WindowParams,
    integrity: IntegrityCheck,
    call_timeout: Duration,
}

impl FuzzyFallbackLocator {
    pub fn new(search: Arc<dyn AssistedSearch>, config: &AlignmentConfig) -> Self {
        Self {
            search,
            threshold: config.match_threshold,
            params: WindowParams {
                skip_budget: config.fallback_skip_budget,
                skip_penalty: config.skip_penalty,
            },
            integrity: IntegrityCheck::new(config),
            call_timeout: config.fallback.call_timeout(),
        }
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Resolve `quote` or return the error of the final attempt.
    ///
    /// Each call is bounded by the per-call timeout and by `deadline`; once
    /// the deadline has passed no further calls are made.
    pub async fn locate(
        &self,
        quote: &str,
        quote_tokens: &[String],
        candidates: &CandidateSet,
        ctx: &TranscriptContext,
        deadline: Instant,
    ) -> Result<ResolvedSpan, AlignmentError> {
        let mut last_error = AlignmentError::NoMatch {
            detail: "request deadline exceeded before assisted search".to_string(),
        };

        for attempt in 1..=FALLBACK_ATTEMPTS {
            let now = Instant::now();
            if now >= deadline {
                warn!(attempt, "Request deadline exceeded, skipping assisted search");
                break;
            }

            let request = SearchRequest {
                quote,
                quote_tokens,
                candidates: candidates.tokens(),
                attempt,
            };
            let call_deadline = deadline.min(now + self.call_timeout);

            last_error = match timeout_at(call_deadline, self.search.search(&request)).await {
                Err(_) => {
                    warn!(attempt, "Assisted search timed out");
                    AlignmentError::NoMatch {
                        detail: format!("assisted search timed out on attempt {attempt}"),
                    }
                }
                Ok(Err(e)) => {
                    warn!(attempt, error = %e, "Assisted search failed");
                    AlignmentError::NoMatch {
                        detail: format!("assisted search failed: {e}"),
                    }
                }
                Ok(Ok(None)) => {
                    debug!(attempt, "Assisted search found nothing");
                    AlignmentError::NoMatch {
                        detail: "assisted search found no span".to_string(),
                    }
                }
                Ok(Ok(Some(proposal))) => {
                    match self.verify(proposal, quote_tokens, candidates, ctx) {
                        Ok(span) => {
                            debug!(
                                attempt,
                                start = span.start,
                                end = span.end,
                                score = span.score,
                                "Fallback span accepted"
                            );
                            return Ok(span);
                        }
                        Err(e) => {
                            debug!(attempt, error = %e, "Fallback span rejected");
                            e
                        }
                    }
                }
            };
        }

        Err(last_error)
    }

    fn verify(
        &self,
        proposal: ProposedSpan,
        quote_tokens: &[String],
        candidates: &CandidateSet,
        ctx: &TranscriptContext,
    ) -> Result<ResolvedSpan, AlignmentError> {
        let ProposedSpan {
            start_index,
            end_index,
        } = proposal;
        if start_index > end_index || end_index >= ctx.len() {
            return Err(AlignmentError::NoMatch {
                detail: format!("proposed span [{start_index}, {end_index}] is out of bounds"),
            });
        }

        let window = candidates.restrict(start_index, end_index);
        let Some(found) = best_window_in(quote_tokens, &window, self.params) else {
            return Err(AlignmentError::NoMatch {
                detail: format!("proposed span [{start_index}, {end_index}] holds no candidate text"),
            });
        };
        if found.score < self.threshold {
            return Err(AlignmentError::NoMatch {
                detail: format!(
                    "proposed span [{start_index}, {end_index}] scores {:.2}, below {}",
                    found.score, self.threshold
                ),
            });
        }

        let span = ResolvedSpan {
            start: window.tokens()[found.start].index,
            end: window.tokens()[found.end].index,
            method: MatchMethod::Fuzzy,
            score: found.score,
        };
        self.integrity.check(quote_tokens, &span, ctx)?;
        Ok(span)
    }
}
