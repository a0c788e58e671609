//! Walk-forward validation: anchored train/test folds with per-fold search.
//!
//! The bars are cut into `N + 1` contiguous chunks of near-equal size. Fold
//! `i` optimizes on chunks `0..=i` and evaluates the selected parameters on
//! chunk `i + 1`, so train windows grow monotonically and every chunk after
//! the first is tested exactly once. Test windows run with fresh starting
//! cash and indicators computed on the test bars only.

use chrono::NaiveDateTime;
use rayon::prelude::*;
use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::{info, warn};

use crosslab_core::domain::{validate_bars, Bar, BarError};
use crosslab_core::strategy::ParameterSet;

use crate::fitness::Objective;
use crate::metrics::{mean_f64, PerformanceMetrics};
use crate::runner::{BacktestRunner, RunError, SCHEMA_VERSION};
use crate::sweep::{ParameterSearch, SearchError};

/// Fold count used when none is configured.
pub const DEFAULT_FOLDS: usize = 5;

/// Train scores below this use the difference metric instead of a ratio.
const LOW_TRAIN_SCORE: f64 = 0.1;

#[derive(Debug, Error)]
pub enum WalkForwardError {
    #[error("fold count must be at least 1")]
    ZeroFolds,
    #[error("cannot cut {total_bars} bars into {chunks} non-empty chunks")]
    TooFewBars { total_bars: usize, chunks: usize },
    #[error("invalid bars: {0}")]
    InvalidBars(#[from] BarError),
    #[error("walk-forward cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Window {
    Train,
    Test,
}

impl std::fmt::Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Window::Train => f.write_str("train"),
            Window::Test => f.write_str("test"),
        }
    }
}

/// Why one fold produced no result. Other folds are unaffected.
#[derive(Debug, Error)]
pub enum FoldError {
    #[error("{window} window has {available} bars, needs at least {required}")]
    InsufficientData {
        window: Window,
        required: usize,
        available: usize,
    },
    #[error("search on train window failed: {0}")]
    Search(#[from] SearchError),
    #[error("test run failed: {0}")]
    Run(#[source] RunError),
}

// ─── Fold creation ───────────────────────────────────────────────────

/// Bar index ranges of one fold. Ends are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FoldSpec {
    pub fold_index: usize,
    pub train_start: usize,
    pub train_end: usize,
    pub test_start: usize,
    pub test_end: usize,
}

/// Cut `total_bars` into `n_folds + 1` chunks (chunk `k` spans
/// `[k·M/(N+1), (k+1)·M/(N+1))`) and build the anchored folds.
pub fn create_folds(total_bars: usize, n_folds: usize) -> Result<Vec<FoldSpec>, WalkForwardError> {
    if n_folds == 0 {
        return Err(WalkForwardError::ZeroFolds);
    }
    let chunks = n_folds + 1;
    if total_bars < chunks {
        return Err(WalkForwardError::TooFewBars { total_bars, chunks });
    }
    let bound = |k: usize| k * total_bars / chunks;

    Ok((0..n_folds)
        .map(|i| FoldSpec {
            fold_index: i,
            train_start: 0,
            train_end: bound(i + 1),
            test_start: bound(i + 1),
            test_end: bound(i + 2),
        })
        .collect())
}

// ─── Result types ────────────────────────────────────────────────────

/// Index range plus the timestamps of its first and last bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowBounds {
    pub start_index: usize,
    /// Exclusive.
    pub end_index: usize,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl WindowBounds {
    fn of(bars: &[Bar], start_index: usize, end_index: usize) -> Self {
        let window = &bars[start_index..end_index];
        Self {
            start_index,
            end_index,
            start: window.first().map(|b| b.timestamp),
            end: window.last().map(|b| b.timestamp),
        }
    }

    pub fn len(&self) -> usize {
        self.end_index - self.start_index
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A completed fold.
#[derive(Debug, Clone, Serialize)]
pub struct FoldResult {
    pub fold_index: usize,
    pub train: WindowBounds,
    pub test: WindowBounds,
    /// Parameter set selected on the train window.
    pub selected: ParameterSet,
    /// Objective value of `selected` on the train window.
    pub train_score: f64,
    /// Objective value of `selected` on the test window.
    pub test_score: f64,
    pub test_metrics: PerformanceMetrics,
    pub evaluated: usize,
    pub skipped: usize,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FoldOutcome {
    Completed(FoldResult),
    Failed {
        fold_index: usize,
        train: WindowBounds,
        test: WindowBounds,
        #[serde(serialize_with = "serialize_display")]
        error: FoldError,
    },
}

impl FoldOutcome {
    pub fn fold_index(&self) -> usize {
        match self {
            FoldOutcome::Completed(r) => r.fold_index,
            FoldOutcome::Failed { fold_index, .. } => *fold_index,
        }
    }

    pub fn result(&self) -> Option<&FoldResult> {
        match self {
            FoldOutcome::Completed(r) => Some(r),
            FoldOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&FoldError> {
        match self {
            FoldOutcome::Completed(_) => None,
            FoldOutcome::Failed { error, .. } => Some(error),
        }
    }
}

fn serialize_display<S: Serializer>(error: &FoldError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

/// How the degradation ratio was computed (or why it wasn't).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DegradationFlag {
    /// Train score >= 0.1, ratio computed normally.
    Normal,
    /// Train score < 0.1, using difference metric (test - train) instead.
    LowTrainScore,
    /// Train score is negative, ratio skipped entirely.
    NegativeTrainScore,
    /// Train score positive (>= 0.1) but test score negative: clamped to 0.0.
    FailedTest,
    NoCompletedFolds,
}

/// Mean of each test metric across completed folds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MeanMetrics {
    pub sharpe: f64,
    pub sortino: f64,
    pub max_drawdown_pct: f64,
    pub win_rate_pct: f64,
    pub total_return_pct: f64,
    pub cagr_pct: f64,
    pub profit_factor: f64,
    pub trade_count: f64,
    pub exposure_pct: f64,
    pub avg_trade_return_pct: f64,
}

impl MeanMetrics {
    pub fn of(metrics: &[&PerformanceMetrics]) -> Self {
        let mean = |f: fn(&PerformanceMetrics) -> f64| {
            mean_f64(&metrics.iter().map(|m| f(m)).collect::<Vec<_>>())
        };
        Self {
            sharpe: mean(|m| m.sharpe),
            sortino: mean(|m| m.sortino),
            max_drawdown_pct: mean(|m| m.max_drawdown_pct),
            win_rate_pct: mean(|m| m.win_rate_pct),
            total_return_pct: mean(|m| m.total_return_pct),
            cagr_pct: mean(|m| m.cagr_pct),
            profit_factor: mean(|m| m.profit_factor),
            trade_count: mean(|m| m.trade_count as f64),
            exposure_pct: mean(|m| m.exposure_pct),
            avg_trade_return_pct: mean(|m| m.avg_trade_return_pct),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WalkForwardSummary {
    pub completed_folds: usize,
    pub failed_folds: usize,
    /// None when no fold completed.
    pub mean_test_metrics: Option<MeanMetrics>,
    pub mean_train_score: f64,
    pub mean_test_score: f64,
    /// Mean test score / mean train score; see `degradation_flag`.
    pub degradation_ratio: Option<f64>,
    pub degradation_flag: DegradationFlag,
}

/// Complete result of walk-forward validation.
#[derive(Debug, Serialize)]
pub struct WalkForwardReport {
    pub schema_version: u32,
    pub objective: Objective,
    pub n_folds: usize,
    pub total_bars: usize,
    /// In chronological (fold index) order.
    pub folds: Vec<FoldOutcome>,
    pub summary: WalkForwardSummary,
}

impl WalkForwardReport {
    pub fn completed(&self) -> impl Iterator<Item = &FoldResult> {
        self.folds.iter().filter_map(FoldOutcome::result)
    }
}

// ─── Walk-forward orchestration ──────────────────────────────────────

/// Runs the per-fold search and out-of-sample evaluation.
#[derive(Clone)]
pub struct WalkForwardEvaluator {
    search: ParameterSearch,
    runner: BacktestRunner,
    n_folds: usize,
    parallel: bool,
}

impl WalkForwardEvaluator {
    pub fn new(search: ParameterSearch, runner: BacktestRunner) -> Self {
        Self {
            search,
            runner,
            n_folds: DEFAULT_FOLDS,
            parallel: true,
        }
    }

    pub fn with_folds(mut self, n_folds: usize) -> Self {
        self.n_folds = n_folds;
        self
    }

    /// Enables or disables running folds concurrently.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn evaluate(&self, bars: &[Bar]) -> Result<WalkForwardReport, WalkForwardError> {
        validate_bars(bars)?;
        let specs = create_folds(bars.len(), self.n_folds)?;
        let min_train = self.search.grid().max_period(self.runner.base_params());

        info!(
            folds = specs.len(),
            bars = bars.len(),
            objective = %self.search.objective(),
            "walk-forward started"
        );

        let mut folds: Vec<FoldOutcome> = if self.parallel {
            specs
                .par_iter()
                .map(|spec| self.run_fold(bars, spec, min_train))
                .collect()
        } else {
            specs
                .iter()
                .map(|spec| self.run_fold(bars, spec, min_train))
                .collect()
        };
        folds.sort_by_key(FoldOutcome::fold_index);

        if self.search.cancel_token().is_cancelled() {
            return Err(WalkForwardError::Cancelled);
        }

        let summary = summarize(&folds);
        info!(
            completed = summary.completed_folds,
            failed = summary.failed_folds,
            mean_train_score = summary.mean_train_score,
            mean_test_score = summary.mean_test_score,
            flag = ?summary.degradation_flag,
            "walk-forward finished"
        );

        Ok(WalkForwardReport {
            schema_version: SCHEMA_VERSION,
            objective: self.search.objective(),
            n_folds: self.n_folds,
            total_bars: bars.len(),
            folds,
            summary,
        })
    }

    fn run_fold(&self, bars: &[Bar], spec: &FoldSpec, min_train: usize) -> FoldOutcome {
        let train = WindowBounds::of(bars, spec.train_start, spec.train_end);
        let test = WindowBounds::of(bars, spec.test_start, spec.test_end);

        match self.try_fold(bars, spec, min_train) {
            Ok((selected, train_score, test_metrics, evaluated, skipped)) => {
                let test_score = self.search.objective().score(&test_metrics);
                info!(
                    fold = spec.fold_index,
                    params = %selected,
                    train_score,
                    test_score,
                    "fold complete"
                );
                FoldOutcome::Completed(FoldResult {
                    fold_index: spec.fold_index,
                    train,
                    test,
                    selected,
                    train_score,
                    test_score,
                    test_metrics,
                    evaluated,
                    skipped,
                })
            }
            Err(error) => {
                warn!(fold = spec.fold_index, error = %error, "fold failed");
                FoldOutcome::Failed {
                    fold_index: spec.fold_index,
                    train,
                    test,
                    error,
                }
            }
        }
    }

    fn try_fold(
        &self,
        bars: &[Bar],
        spec: &FoldSpec,
        min_train: usize,
    ) -> Result<(ParameterSet, f64, PerformanceMetrics, usize, usize), FoldError> {
        let train_bars = &bars[spec.train_start..spec.train_end];
        let test_bars = &bars[spec.test_start..spec.test_end];

        if train_bars.len() < min_train {
            return Err(FoldError::InsufficientData {
                window: Window::Train,
                required: min_train,
                available: train_bars.len(),
            });
        }

        let outcome = self.search.run(train_bars, &self.runner)?;
        let selected = outcome.best.params;

        let test_result = self
            .runner
            .evaluate(test_bars, &selected)
            .map_err(|e| match e {
                RunError::InsufficientData {
                    required,
                    available,
                } => FoldError::InsufficientData {
                    window: Window::Test,
                    required,
                    available,
                },
                other => FoldError::Run(other),
            })?;

        Ok((
            selected,
            outcome.best.score,
            test_result.metrics,
            outcome.candidates.len(),
            outcome.skipped,
        ))
    }
}

fn summarize(folds: &[FoldOutcome]) -> WalkForwardSummary {
    let completed: Vec<&FoldResult> = folds.iter().filter_map(FoldOutcome::result).collect();
    let failed_folds = folds.len() - completed.len();

    if completed.is_empty() {
        return WalkForwardSummary {
            completed_folds: 0,
            failed_folds,
            mean_test_metrics: None,
            mean_train_score: 0.0,
            mean_test_score: 0.0,
            degradation_ratio: None,
            degradation_flag: DegradationFlag::NoCompletedFolds,
        };
    }

    let metrics: Vec<&PerformanceMetrics> = completed.iter().map(|f| &f.test_metrics).collect();
    let mean_train_score =
        mean_f64(&completed.iter().map(|f| f.train_score).collect::<Vec<_>>());
    let mean_test_score = mean_f64(&completed.iter().map(|f| f.test_score).collect::<Vec<_>>());
    let (degradation_ratio, degradation_flag) =
        compute_degradation_ratio(mean_train_score, mean_test_score);

    WalkForwardSummary {
        completed_folds: completed.len(),
        failed_folds,
        mean_test_metrics: Some(MeanMetrics::of(&metrics)),
        mean_train_score,
        mean_test_score,
        degradation_ratio,
        degradation_flag,
    }
}

/// Compute degradation ratio with edge case handling.
///
/// - train >= 0.1: ratio = test / train (Normal)
/// - train < 0.1 and >= 0: difference = test - train (LowTrainScore)
/// - train < 0: ratio skipped (NegativeTrainScore)
/// - train >= 0.1 but test < 0: clamped to 0.0 (FailedTest)
fn compute_degradation_ratio(mean_train: f64, mean_test: f64) -> (Option<f64>, DegradationFlag) {
    if mean_train < 0.0 {
        (None, DegradationFlag::NegativeTrainScore)
    } else if mean_train < LOW_TRAIN_SCORE {
        (Some(mean_test - mean_train), DegradationFlag::LowTrainScore)
    } else if mean_test < 0.0 {
        (Some(0.0), DegradationFlag::FailedTest)
    } else {
        (Some(mean_test / mean_train), DegradationFlag::Normal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{ParamAxis, ParamGrid};
    use crate::test_support::{bars_from_closes, permissive_runner, wave};

    // ─── Fold creation tests ─────────────────────────────────────

    #[test]
    fn folds_follow_chunk_formula() {
        let folds = create_folds(10, 2).unwrap();
        // chunks: [0,3) [3,6) [6,10)
        assert_eq!(
            folds,
            vec![
                FoldSpec {
                    fold_index: 0,
                    train_start: 0,
                    train_end: 3,
                    test_start: 3,
                    test_end: 6
                },
                FoldSpec {
                    fold_index: 1,
                    train_start: 0,
                    train_end: 6,
                    test_start: 6,
                    test_end: 10
                },
            ]
        );
    }

    #[test]
    fn train_windows_expand_and_tests_are_contiguous() {
        let folds = create_folds(1000, 5).unwrap();
        assert_eq!(folds.len(), 5);
        assert_eq!(folds[0].test_start, 1000 / 6);
        for i in 1..folds.len() {
            assert!(folds[i].train_end > folds[i - 1].train_end);
            assert_eq!(folds[i].test_start, folds[i - 1].test_end);
        }
        assert_eq!(folds[4].test_end, 1000);
    }

    #[test]
    fn zero_folds_and_too_few_bars() {
        assert!(matches!(create_folds(100, 0), Err(WalkForwardError::ZeroFolds)));
        assert!(matches!(
            create_folds(5, 5),
            Err(WalkForwardError::TooFewBars {
                total_bars: 5,
                chunks: 6
            })
        ));
        assert_eq!(create_folds(6, 5).unwrap().len(), 5);
    }

    // ─── Degradation ratio tests ─────────────────────────────────

    #[test]
    fn degradation_normal() {
        let (ratio, flag) = compute_degradation_ratio(2.0, 1.0);
        assert_eq!(flag, DegradationFlag::Normal);
        assert!((ratio.unwrap() - 0.5).abs() < 1e-10);
    }

    #[test]
    fn degradation_low_train_score() {
        let (ratio, flag) = compute_degradation_ratio(0.05, 0.03);
        assert_eq!(flag, DegradationFlag::LowTrainScore);
        assert!((ratio.unwrap() - (-0.02)).abs() < 1e-10);
    }

    #[test]
    fn degradation_negative_train() {
        let (ratio, flag) = compute_degradation_ratio(-0.5, 0.3);
        assert_eq!(flag, DegradationFlag::NegativeTrainScore);
        assert!(ratio.is_none());
    }

    #[test]
    fn degradation_failed_test() {
        let (ratio, flag) = compute_degradation_ratio(1.5, -0.3);
        assert_eq!(flag, DegradationFlag::FailedTest);
        assert_eq!(ratio, Some(0.0));
    }

    // ─── Orchestration tests ─────────────────────────────────────

    fn small_grid() -> ParamGrid {
        ParamGrid::new(vec![
            ParamAxis::list("ema_short", vec![3.0, 5.0]),
            ParamAxis::list("ema_long", vec![10.0, 15.0]),
        ])
    }

    #[test]
    fn every_fold_completes_on_long_series() {
        let bars = bars_from_closes(&wave(240));
        let report = WalkForwardEvaluator::new(ParameterSearch::new(small_grid()), permissive_runner())
            .with_folds(3)
            .evaluate(&bars)
            .unwrap();

        assert_eq!(report.folds.len(), 3);
        assert_eq!(report.summary.completed_folds, 3);
        assert_eq!(report.summary.failed_folds, 0);
        assert!(report.summary.mean_test_metrics.is_some());
        for (i, fold) in report.completed().enumerate() {
            assert_eq!(fold.fold_index, i);
            assert_eq!(fold.train.start_index, 0);
            assert_eq!(fold.train.end_index, fold.test.start_index);
            assert_eq!(fold.test.len(), 60);
            assert_eq!(fold.evaluated + fold.skipped, 4);
            assert!(fold.train.end < fold.test.start);
        }
    }

    #[test]
    fn short_windows_fail_per_fold() {
        // 60 bars, 5 folds → 10-bar chunks; ema_long = 20 needs 20 bars.
        let bars = bars_from_closes(&wave(60));
        let grid = ParamGrid::new(vec![ParamAxis::list("ema_long", vec![20.0])]);
        let report = WalkForwardEvaluator::new(ParameterSearch::new(grid), permissive_runner())
            .with_folds(5)
            .evaluate(&bars)
            .unwrap();

        assert_eq!(report.folds.len(), 5);
        assert_eq!(report.summary.completed_folds, 0);
        assert_eq!(report.summary.degradation_flag, DegradationFlag::NoCompletedFolds);
        assert!(matches!(
            report.folds[0].error(),
            Some(FoldError::InsufficientData {
                window: Window::Train,
                required: 20,
                available: 10
            })
        ));
        assert!(matches!(
            report.folds[1].error(),
            Some(FoldError::InsufficientData {
                window: Window::Test,
                ..
            })
        ));
    }

    #[test]
    fn failed_fold_does_not_stop_the_others() {
        // 119 bars, 5 folds → bounds 0, 19, 39, 59, 79, 99, 119. Only the
        // first train window is shorter than ema_long = 20.
        let bars = bars_from_closes(&wave(119));
        let grid = ParamGrid::new(vec![ParamAxis::list("ema_long", vec![20.0])]);
        let report = WalkForwardEvaluator::new(ParameterSearch::new(grid), permissive_runner())
            .with_folds(5)
            .evaluate(&bars)
            .unwrap();

        assert_eq!(report.folds.len(), 5);
        assert!(matches!(
            report.folds[0].error(),
            Some(FoldError::InsufficientData {
                window: Window::Train,
                required: 20,
                available: 19
            })
        ));
        for (i, fold) in report.folds.iter().enumerate().skip(1) {
            assert_eq!(fold.fold_index(), i);
            assert!(fold.result().is_some(), "fold {i} should complete");
        }
        assert_eq!(report.summary.completed_folds, 4);
        assert_eq!(report.summary.failed_folds, 1);

        let completed: Vec<&FoldResult> = report.completed().collect();
        assert_eq!(completed.len(), 4);
        let mean = report.summary.mean_test_metrics.as_ref().unwrap();
        let expected_sharpe = completed.iter().map(|f| f.test_metrics.sharpe).sum::<f64>() / 4.0;
        let expected_return =
            completed.iter().map(|f| f.test_metrics.total_return_pct).sum::<f64>() / 4.0;
        assert!((mean.sharpe - expected_sharpe).abs() < 1e-9);
        assert!((mean.total_return_pct - expected_return).abs() < 1e-9);
        let expected_score = completed.iter().map(|f| f.test_score).sum::<f64>() / 4.0;
        assert!((report.summary.mean_test_score - expected_score).abs() < 1e-9);
    }

    #[test]
    fn parallel_matches_sequential() {
        let bars = bars_from_closes(&wave(240));
        let evaluator =
            WalkForwardEvaluator::new(ParameterSearch::new(small_grid()), permissive_runner())
                .with_folds(3);
        let par = evaluator.clone().with_parallelism(true).evaluate(&bars).unwrap();
        let seq = evaluator.with_parallelism(false).evaluate(&bars).unwrap();
        let selected = |r: &WalkForwardReport| {
            r.completed()
                .map(|f| (f.selected.clone(), f.test_score))
                .collect::<Vec<_>>()
        };
        assert_eq!(selected(&par), selected(&seq));
    }

    #[test]
    fn report_serializes_failed_folds_with_message() {
        let bars = bars_from_closes(&wave(60));
        let grid = ParamGrid::new(vec![ParamAxis::list("ema_long", vec![20.0])]);
        let report = WalkForwardEvaluator::new(ParameterSearch::new(grid), permissive_runner())
            .with_folds(5)
            .evaluate(&bars)
            .unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["folds"][0]["status"], "failed");
        assert!(json["folds"][0]["error"]
            .as_str()
            .unwrap()
            .contains("train window"));
    }
}
