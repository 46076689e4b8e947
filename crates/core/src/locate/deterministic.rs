use tracing::debug;

use crate::config::AlignmentConfig;
use crate::context::CandidateSet;
use crate::locate::window::{WindowParams, best_window_in};
use crate::types::{MatchMethod, ResolvedSpan};

/// Outcome of a deterministic search. A miss is the normal trigger for the
/// fallback path, not an error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Located {
    Found(ResolvedSpan),
    NotFound { best_score: Option<f64> },
}

/// Offline locator: best gap-tolerant window above the acceptance threshold.
#[derive(Debug, Clone, Copy)]
pub struct DeterministicLocator {
    threshold: f64,
    params: WindowParams,
}

impl DeterministicLocator {
    pub fn new(config: &AlignmentConfig) -> Self {
        Self {
            threshold: config.match_threshold,
            params: WindowParams {
                skip_budget: config.skip_budget,
                skip_penalty: config.skip_penalty,
            },
        }
    }

    pub fn locate(&self, quote: &[String], candidates: &CandidateSet) -> Located {
        let Some(window) = best_window_in(quote, candidates, self.params) else {
            return Located::NotFound { best_score: None };
        };

        if window.score < self.threshold {
            debug!(
                score = window.score,
                threshold = self.threshold,
                "Best deterministic window below threshold"
            );
            return Located::NotFound {
                best_score: Some(window.score),
            };
        }

        Located::Found(ResolvedSpan {
            start: candidates.tokens()[window.start].index,
            end: candidates.tokens()[window.end].index,
            method: MatchMethod::Deterministic,
            score: window.score,
        })
    }
}
