//! Gap-tolerant window search shared by both locators.
//!
//! Aligns the whole quote against some contiguous window of the candidate
//! token sequence. Four moves are allowed while walking the quote:
//!
//! - match: quote token equals the source token
//! - substitute: quote token differs from the source token
//! - insert: quote token has no source counterpart
//! - skip: a source token inside the window has no quote counterpart
//!
//! A window scores `matched / quote_len - penalty * (skips + inserts)`.
//! Skips are capped by a budget; leading and trailing source tokens are never
//! counted as skips, they are simply outside the window.
//!
//! A window never spans two runs of a [`CandidateSet`].

use crate::context::{CandidateSet, CandidateToken};

const COST_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowParams {
    pub skip_budget: usize,
    pub skip_penalty: f64,
}

/// Best window found, in positions of the candidate sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowMatch {
    /// First candidate position in the window.
    pub start: usize,
    /// Last candidate position in the window, inclusive.
    pub end: usize,
    pub matched: usize,
    pub skips: usize,
    pub inserts: usize,
    pub score: f64,
}

#[derive(Debug, Clone, Copy)]
struct Cell {
    cost: f64,
    start: usize,
    matched: usize,
    skips: usize,
    inserts: usize,
}

impl Cell {
    fn beats(&self, other: &Cell) -> bool {
        if self.cost < other.cost - COST_EPSILON {
            return true;
        }
        if self.cost > other.cost + COST_EPSILON {
            return false;
        }
        self.start < other.start
    }
}

fn relax(slot: &mut Option<Cell>, candidate: Cell) {
    match slot {
        Some(current) if !candidate.beats(current) => {}
        _ => *slot = Some(candidate),
    }
}

/// Highest-scoring window for `quote` in `candidates`.
///
/// Ties go to the earliest start, then the earliest end. Returns `None` when
/// either side is empty or no window consumes a source token.
pub fn best_window(
    quote: &[String],
    candidates: &[CandidateToken],
    params: WindowParams,
) -> Option<WindowMatch> {
    let m = quote.len();
    let n = candidates.len();
    if m == 0 || n == 0 {
        return None;
    }

    let unit = 1.0 / m as f64;
    let budget = params.skip_budget;
    let width = budget + 1;
    let at = |j: usize, s: usize| j * width + s;

    // layer[j][s]: quote[..i] consumed, window ends before candidate j,
    // s skips spent
    let mut layer: Vec<Option<Cell>> = vec![None; (n + 1) * width];
    for j in 0..=n {
        layer[at(j, 0)] = Some(Cell {
            cost: 0.0,
            start: j,
            matched: 0,
            skips: 0,
            inserts: 0,
        });
    }

    for i in 0..m {
        let interior = i > 0;
        let mut next: Vec<Option<Cell>> = vec![None; (n + 1) * width];

        for j in 0..=n {
            for s in 0..width {
                let Some(cell) = layer[at(j, s)] else {
                    continue;
                };

                if interior && j < n && s < budget {
                    let skipped = Cell {
                        cost: cell.cost + params.skip_penalty,
                        skips: cell.skips + 1,
                        ..cell
                    };
                    relax(&mut layer[at(j + 1, s + 1)], skipped);
                }

                if j < n {
                    let diagonal = if quote[i] == candidates[j].text {
                        Cell {
                            matched: cell.matched + 1,
                            ..cell
                        }
                    } else {
                        Cell {
                            cost: cell.cost + unit,
                            ..cell
                        }
                    };
                    relax(&mut next[at(j + 1, s)], diagonal);
                }

                let inserted = Cell {
                    cost: cell.cost + unit + params.skip_penalty,
                    inserts: cell.inserts + 1,
                    ..cell
                };
                relax(&mut next[at(j, s)], inserted);
            }
        }
        layer = next;
    }

    let mut best: Option<(Cell, usize)> = None;
    for j in 0..=n {
        for s in 0..width {
            let Some(cell) = layer[at(j, s)] else {
                continue;
            };
            if j <= cell.start {
                continue;
            }
            let better = match &best {
                None => true,
                Some((current, current_end)) => {
                    cell.beats(current)
                        || (!current.beats(&cell) && j < *current_end)
                }
            };
            if better {
                best = Some((cell, j));
            }
        }
    }

    best.map(|(cell, end_exclusive)| WindowMatch {
        start: cell.start,
        end: end_exclusive - 1,
        matched: cell.matched,
        skips: cell.skips,
        inserts: cell.inserts,
        score: cell.matched as f64 / m as f64
            - params.skip_penalty * (cell.skips + cell.inserts) as f64,
    })
}

/// Highest-scoring window over every run of `set`, in positions of
/// [`CandidateSet::tokens`].
///
/// Same tie-breaking as [`best_window`]: runs are in transcript order, so a
/// later run must score strictly higher to win.
pub fn best_window_in(
    quote: &[String],
    set: &CandidateSet,
    params: WindowParams,
) -> Option<WindowMatch> {
    let mut best: Option<WindowMatch> = None;
    for run in set.runs() {
        let Some(found) = best_window(quote, &set.tokens()[run.clone()], params) else {
            continue;
        };
        let found = WindowMatch {
            start: found.start + run.start,
            end: found.end + run.start,
            ..found
        };
        match &best {
            Some(current) if found.score <= current.score + COST_EPSILON => {}
            _ => best = Some(found),
        }
    }
    best
}
