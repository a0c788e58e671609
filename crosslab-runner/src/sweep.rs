//! Grid parameter search.
//!
//! Enumerates a `ParamGrid`, drops combinations rejected by any constraint,
//! evaluates the survivors (in parallel on the rayon pool by default) and
//! selects the highest objective. Ties go to the earliest combination in
//! enumeration order, so parallel and sequential runs pick the same winner.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crosslab_core::domain::{validate_bars, Bar, BarError};
use crosslab_core::strategy::ParameterSet;

use crate::fitness::Objective;
use crate::grid::{Constraint, GridError, ParamGrid};
use crate::metrics::PerformanceMetrics;
use crate::runner::BacktestRunner;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("no parameter combination satisfies the constraints ({combinations} enumerated)")]
    EmptySearchSpace { combinations: usize },
    #[error("every candidate failed to evaluate ({skipped} skipped)")]
    NoEvaluableCandidate { skipped: usize },
    #[error("search cancelled")]
    Cancelled,
    #[error("invalid bars: {0}")]
    InvalidBars(#[from] BarError),
    #[error("invalid grid: {0}")]
    Grid(#[from] GridError),
}

/// Shared flag for stopping a running search from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// One evaluated grid point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateResult {
    /// Position in the unfiltered enumeration.
    pub index: usize,
    pub params: ParameterSet,
    pub score: f64,
    pub metrics: PerformanceMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub objective: Objective,
    pub best: CandidateResult,
    /// Evaluated candidates in enumeration order.
    pub candidates: Vec<CandidateResult>,
    pub total_combinations: usize,
    pub rejected_by_constraint: usize,
    pub skipped: usize,
}

impl SearchOutcome {
    /// Candidates by descending score, enumeration order on ties.
    pub fn ranked(&self) -> Vec<&CandidateResult> {
        let mut ranked: Vec<&CandidateResult> = self.candidates.iter().collect();
        ranked.sort_by(|a, b| {
            score_key(b.score)
                .total_cmp(&score_key(a.score))
                .then(a.index.cmp(&b.index))
        });
        ranked
    }
}

/// NaN ranks below every real score.
fn score_key(score: f64) -> f64 {
    if score.is_nan() {
        f64::NEG_INFINITY
    } else {
        score
    }
}

fn beats(candidate: f64, incumbent: f64) -> bool {
    !candidate.is_nan() && (incumbent.is_nan() || candidate > incumbent)
}

enum Evaluation {
    Scored(CandidateResult),
    Skipped,
    Cancelled,
}

/// Grid search executor.
#[derive(Clone)]
pub struct ParameterSearch {
    grid: ParamGrid,
    constraints: Vec<Arc<dyn Constraint>>,
    objective: Objective,
    parallel: bool,
    cancel: CancelToken,
}

impl ParameterSearch {
    pub fn new(grid: ParamGrid) -> Self {
        Self {
            grid,
            constraints: Vec::new(),
            objective: Objective::default(),
            parallel: true,
            cancel: CancelToken::default(),
        }
    }

    pub fn with_constraint(mut self, constraint: impl Constraint + 'static) -> Self {
        self.constraints.push(Arc::new(constraint));
        self
    }

    pub fn with_objective(mut self, objective: Objective) -> Self {
        self.objective = objective;
        self
    }

    /// Enables or disables parallel evaluation.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn grid(&self) -> &ParamGrid {
        &self.grid
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Search `bars` for the combination maximizing the objective.
    pub fn run(&self, bars: &[Bar], runner: &BacktestRunner) -> Result<SearchOutcome, SearchError> {
        self.grid.validate()?;
        validate_bars(bars)?;

        let base = runner.base_params().to_parameter_set();
        let combinations = self.grid.combinations();
        let total = combinations.len();
        let survivors: Vec<(usize, ParameterSet)> = combinations
            .into_iter()
            .enumerate()
            .filter(|(_, set)| {
                let full = base.overlay(set);
                self.constraints.iter().all(|c| c.allows(&full))
            })
            .collect();
        let rejected = total - survivors.len();
        if survivors.is_empty() {
            return Err(SearchError::EmptySearchSpace {
                combinations: total,
            });
        }

        info!(
            combinations = total,
            rejected,
            bars = bars.len(),
            objective = %self.objective,
            parallel = self.parallel,
            "parameter search started"
        );

        let evaluate = |(index, set): &(usize, ParameterSet)| -> Evaluation {
            if self.cancel.is_cancelled() {
                return Evaluation::Cancelled;
            }
            match runner.evaluate(bars, set) {
                Ok(result) => {
                    let score = self.objective.score(&result.metrics);
                    debug!(index, params = %set, score, "candidate evaluated");
                    Evaluation::Scored(CandidateResult {
                        index: *index,
                        params: set.clone(),
                        score,
                        metrics: result.metrics,
                    })
                }
                Err(e) => {
                    warn!(index, params = %set, error = %e, "candidate skipped");
                    Evaluation::Skipped
                }
            }
        };

        let evaluations: Vec<Evaluation> = if self.parallel {
            survivors.par_iter().map(evaluate).collect()
        } else {
            survivors.iter().map(evaluate).collect()
        };

        if self.cancel.is_cancelled() {
            info!("parameter search cancelled");
            return Err(SearchError::Cancelled);
        }

        let mut candidates = Vec::with_capacity(evaluations.len());
        let mut skipped = 0;
        for evaluation in evaluations {
            match evaluation {
                Evaluation::Scored(c) => candidates.push(c),
                Evaluation::Skipped => skipped += 1,
                Evaluation::Cancelled => return Err(SearchError::Cancelled),
            }
        }

        let best = candidates
            .iter()
            .fold(None::<&CandidateResult>, |best, c| match best {
                Some(b) if !beats(c.score, b.score) => Some(b),
                _ => Some(c),
            })
            .cloned()
            .ok_or(SearchError::NoEvaluableCandidate { skipped })?;

        info!(
            evaluated = candidates.len(),
            skipped,
            best_index = best.index,
            best_score = best.score,
            best_params = %best.params,
            "parameter search finished"
        );

        Ok(SearchOutcome {
            objective: self.objective,
            best,
            candidates,
            total_combinations: total,
            rejected_by_constraint: rejected,
            skipped,
        })
    }
}
