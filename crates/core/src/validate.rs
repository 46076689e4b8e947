use std::collections::HashSet;

use strsim::normalized_levenshtein;

use crate::config::AlignmentConfig;
use crate::context::TranscriptContext;
use crate::error::AlignmentError;
use crate::types::{ResolvedSpan, ScriptStatus};

/// Terminal per-quote outcome handed to the validator.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteOutcome {
    pub position: usize,
    pub tokens: Vec<String>,
    pub result: Result<ResolvedSpan, AlignmentError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RejectedQuote {
    pub position: usize,
    pub error: AlignmentError,
    pub span: Option<ResolvedSpan>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub status: ScriptStatus,
    /// Valid spans keyed by quote position, in chronological order.
    pub accepted: Vec<(usize, ResolvedSpan)>,
    pub rejected: Vec<RejectedQuote>,
}

/// Anti-hallucination check: every quote token must appear in the source
/// range, exactly or within the configured edit-distance similarity.
#[derive(Debug, Clone, Copy)]
pub struct IntegrityCheck {
    token_similarity: f64,
    tolerance: f64,
}

impl IntegrityCheck {
    pub fn new(config: &AlignmentConfig) -> Self {
        Self {
            token_similarity: config.token_similarity,
            tolerance: config.hallucination_tolerance,
        }
    }

    pub fn check(
        &self,
        quote: &[String],
        span: &ResolvedSpan,
        ctx: &TranscriptContext,
    ) -> Result<(), AlignmentError> {
        let source: HashSet<&str> = (span.start..=span.end)
            .flat_map(|index| ctx.word_tokens(index).iter().map(String::as_str))
            .collect();
        self.check_tokens(quote, &source)
    }

    pub fn check_tokens(
        &self,
        quote: &[String],
        source: &HashSet<&str>,
    ) -> Result<(), AlignmentError> {
        let missing: Vec<String> = quote
            .iter()
            .filter(|token| !self.is_present(token, source))
            .cloned()
            .collect();

        if missing.is_empty() {
            return Ok(());
        }
        let absent_fraction = missing.len() as f64 / quote.len().max(1) as f64;
        if absent_fraction <= self.tolerance {
            return Ok(());
        }
        Err(AlignmentError::Hallucination { missing })
    }

    fn is_present(&self, token: &str, source: &HashSet<&str>) -> bool {
        source.contains(token)
            || source
                .iter()
                .any(|s| normalized_levenshtein(token, s) >= self.token_similarity)
    }
}

/// Whole-script checks: bounds, well-formedness, chronology, integrity.
pub struct ScriptValidator<'a> {
    ctx: &'a TranscriptContext,
    integrity: IntegrityCheck,
}

impl<'a> ScriptValidator<'a> {
    pub fn new(ctx: &'a TranscriptContext, config: &AlignmentConfig) -> Self {
        Self {
            ctx,
            integrity: IntegrityCheck::new(config),
        }
    }

    /// `outcomes` must be in quote order and complete: ordering is a
    /// property of the whole script.
    pub fn validate(&self, outcomes: &[QuoteOutcome]) -> ValidationReport {
        let mut accepted = Vec::new();
        let mut rejected = Vec::new();
        // positioned spans, in quote order, for the chronology pass
        let mut positioned: Vec<(usize, ResolvedSpan)> = Vec::new();

        for outcome in outcomes {
            let span = match &outcome.result {
                Ok(span) => *span,
                Err(error) => {
                    rejected.push(RejectedQuote {
                        position: outcome.position,
                        error: error.clone(),
                        span: None,
                    });
                    continue;
                }
            };

            if span.start > span.end || span.end >= self.ctx.len() {
                rejected.push(RejectedQuote {
                    position: outcome.position,
                    error: AlignmentError::InvalidSpan {
                        start: span.start,
                        end: span.end,
                    },
                    span: Some(span),
                });
                continue;
            }
            positioned.push((outcome.position, span));

            match self.integrity.check(&outcome.tokens, &span, self.ctx) {
                Ok(()) => accepted.push((outcome.position, span)),
                Err(error) => rejected.push(RejectedQuote {
                    position: outcome.position,
                    error,
                    span: Some(span),
                }),
            }
        }

        let mut chronology_broken = false;
        for pair in positioned.windows(2) {
            let ((previous_position, previous), (position, current)) = (pair[0], pair[1]);
            if current.start <= previous.end {
                chronology_broken = true;
                rejected.push(RejectedQuote {
                    position,
                    error: AlignmentError::ChronologyViolation {
                        position,
                        start: current.start,
                        previous_position,
                        previous_end: previous.end,
                    },
                    span: Some(current),
                });
            }
        }

        let status = if chronology_broken || accepted.is_empty() {
            ScriptStatus::Failed
        } else if rejected.is_empty() {
            ScriptStatus::Success
        } else {
            ScriptStatus::Partial
        };

        // a failed script emits no chunks, so every quote must show up as rejected
        if status == ScriptStatus::Failed {
            let flagged: HashSet<usize> = rejected.iter().map(|r| r.position).collect();
            for (position, span) in accepted.drain(..) {
                if flagged.contains(&position) {
                    continue;
                }
                rejected.push(RejectedQuote {
                    position,
                    error: AlignmentError::ScriptRejected {
                        reason: "quote order does not follow the transcript".to_string(),
                    },
                    span: Some(span),
                });
            }
        }
        rejected.sort_by_key(|r| r.position);
        accepted.sort_by_key(|(_, span)| span.start);

        ValidationReport {
            status,
            accepted,
            rejected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::transcript;
    use crate::types::MatchMethod;

    const SOURCE: &str = "The quick brown fox jumps over the lazy dog today";

    fn ctx() -> TranscriptContext {
        TranscriptContext::ingest(&transcript(SOURCE), &AlignmentConfig::default())
            .expect("ingest")
    }

    fn span(start: usize, end: usize) -> ResolvedSpan {
        ResolvedSpan {
            start,
            end,
            method: MatchMethod::Deterministic,
            score: 1.0,
        }
    }

    fn outcome(
        ctx: &TranscriptContext,
        position: usize,
        text: &str,
        start: usize,
        end: usize,
    ) -> QuoteOutcome {
        QuoteOutcome {
            position,
            tokens: ctx.normalizer().normalize(text),
            result: Ok(span(start, end)),
        }
    }

    fn tokens(text: &str) -> Vec<String> {
        text.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn chronological_valid_spans_succeed() {
        let ctx = ctx();
        let validator = ScriptValidator::new(&ctx, &AlignmentConfig::default());
        let report = validator.validate(&[
            outcome(&ctx, 0, "quick brown", 1, 2),
            outcome(&ctx, 1, "lazy dog", 7, 8),
        ]);
        assert_eq!(report.status, ScriptStatus::Success);
        assert_eq!(report.accepted, vec![(0, span(1, 2)), (1, span(7, 8))]);
        assert!(report.rejected.is_empty());
    }

    #[test]
    fn reordered_spans_fail_the_script() {
        let ctx = ctx();
        let validator = ScriptValidator::new(&ctx, &AlignmentConfig::default());
        let report = validator.validate(&[
            outcome(&ctx, 0, "over the lazy", 5, 7),
            outcome(&ctx, 1, "fox jumps", 3, 4),
        ]);
        assert_eq!(report.status, ScriptStatus::Failed);
        assert!(report.accepted.is_empty());
        assert_eq!(
            report.rejected,
            vec![
                RejectedQuote {
                    position: 0,
                    error: AlignmentError::ScriptRejected {
                        reason: "quote order does not follow the transcript".to_string(),
                    },
                    span: Some(span(5, 7)),
                },
                RejectedQuote {
                    position: 1,
                    error: AlignmentError::ChronologyViolation {
                        position: 1,
                        start: 3,
                        previous_position: 0,
                        previous_end: 7,
                    },
                    span: Some(span(3, 4)),
                },
            ]
        );
    }

    #[test]
    fn broken_chronology_reports_every_quote_once() {
        let ctx = ctx();
        let validator = ScriptValidator::new(&ctx, &AlignmentConfig::default());
        let report = validator.validate(&[
            outcome(&ctx, 0, "quick brown", 1, 2),
            outcome(&ctx, 1, "lazy dog", 7, 8),
            outcome(&ctx, 2, "fox jumps", 3, 4),
            QuoteOutcome {
                position: 3,
                tokens: tokens("x"),
                result: Err(AlignmentError::NoMatch {
                    detail: "nothing".to_string(),
                }),
            },
        ]);
        assert_eq!(report.status, ScriptStatus::Failed);
        assert!(report.accepted.is_empty());
        let positions: Vec<usize> = report.rejected.iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![0, 1, 2, 3]);
        assert!(matches!(
            report.rejected[2].error,
            AlignmentError::ChronologyViolation { position: 2, .. }
        ));
        assert_eq!(report.rejected[1].span, Some(span(7, 8)));
    }

    #[test]
    fn touching_spans_violate_chronology() {
        let ctx = ctx();
        let validator = ScriptValidator::new(&ctx, &AlignmentConfig::default());
        let report = validator.validate(&[
            outcome(&ctx, 0, "quick brown fox", 1, 3),
            outcome(&ctx, 1, "fox jumps", 3, 4),
        ]);
        assert_eq!(report.status, ScriptStatus::Failed);
    }

    #[test]
    fn any_later_overlap_is_caught() {
        let ctx = ctx();
        let validator = ScriptValidator::new(&ctx, &AlignmentConfig::default());
        let pairs = [
            ((2, 4), (0, 1)),
            ((2, 4), (4, 6)),
            ((2, 4), (3, 3)),
            ((2, 4), (2, 9)),
        ];
        for (a, b) in pairs {
            let report = validator.validate(&[
                QuoteOutcome {
                    position: 0,
                    tokens: Vec::new(),
                    result: Ok(span(a.0, a.1)),
                },
                QuoteOutcome {
                    position: 1,
                    tokens: Vec::new(),
                    result: Ok(span(b.0, b.1)),
                },
            ]);
            assert_eq!(report.status, ScriptStatus::Failed, "{a:?} then {b:?}");
        }
    }

    #[test]
    fn hallucinated_quote_makes_script_partial() {
        let ctx = ctx();
        let validator = ScriptValidator::new(&ctx, &AlignmentConfig::default());
        let report = validator.validate(&[
            outcome(&ctx, 0, "quick brown unicorn jumps", 1, 4),
            outcome(&ctx, 1, "lazy dog", 7, 8),
        ]);
        assert_eq!(report.status, ScriptStatus::Partial);
        assert_eq!(report.accepted, vec![(1, span(7, 8))]);
        assert_eq!(
            report.rejected[0].error,
            AlignmentError::Hallucination {
                missing: vec!["unicorn".to_string()]
            }
        );
    }

    #[test]
    fn only_hallucinated_quote_fails_script() {
        let ctx = ctx();
        let validator = ScriptValidator::new(&ctx, &AlignmentConfig::default());
        let report = validator.validate(&[outcome(&ctx, 0, "quick brown unicorn jumps", 1, 4)]);
        assert_eq!(report.status, ScriptStatus::Failed);
    }

    #[test]
    fn unresolved_and_out_of_bounds_quotes_are_rejected() {
        let ctx = ctx();
        let validator = ScriptValidator::new(&ctx, &AlignmentConfig::default());
        let report = validator.validate(&[
            outcome(&ctx, 0, "the quick", 0, 1),
            QuoteOutcome {
                position: 1,
                tokens: tokens("x"),
                result: Err(AlignmentError::NoMatch {
                    detail: "nothing".to_string(),
                }),
            },
            outcome(&ctx, 2, "today", 9, 10),
            outcome(&ctx, 3, "dog", 8, 7),
        ]);
        assert_eq!(report.status, ScriptStatus::Partial);
        let errors: Vec<_> = report.rejected.iter().map(|r| r.position).collect();
        assert_eq!(errors, vec![1, 2, 3]);
        assert!(matches!(
            report.rejected[1].error,
            AlignmentError::InvalidSpan { start: 9, end: 10 }
        ));
        assert!(matches!(
            report.rejected[2].error,
            AlignmentError::InvalidSpan { start: 8, end: 7 }
        ));
    }

    #[test]
    fn empty_script_fails() {
        let ctx = ctx();
        let report = ScriptValidator::new(&ctx, &AlignmentConfig::default()).validate(&[]);
        assert_eq!(report.status, ScriptStatus::Failed);
    }

    #[test]
    fn token_similarity_boundary() {
        let source: HashSet<&str> = ["colour", "scheme"].into_iter().collect();
        let quote = tokens("color scheme");
        let similarity = normalized_levenshtein("color", "colour");

        let at = IntegrityCheck {
            token_similarity: similarity,
            tolerance: 0.0,
        };
        assert!(at.check_tokens(&quote, &source).is_ok());

        let above = IntegrityCheck {
            token_similarity: similarity + 1e-6,
            tolerance: 0.0,
        };
        assert_eq!(
            above.check_tokens(&quote, &source),
            Err(AlignmentError::Hallucination {
                missing: vec!["color".to_string()]
            })
        );
    }

    #[test]
    fn hallucination_tolerance_boundary() {
        let source: HashSet<&str> = ["quick", "brown", "fox", "jumps"].into_iter().collect();
        let quote = tokens("quick brown unicorn jumps");

        let tolerant = IntegrityCheck {
            token_similarity: 0.8,
            tolerance: 0.25,
        };
        assert!(tolerant.check_tokens(&quote, &source).is_ok());

        let strict = IntegrityCheck {
            token_similarity: 0.8,
            tolerance: 0.24,
        };
        assert!(strict.check_tokens(&quote, &source).is_err());
    }
}
