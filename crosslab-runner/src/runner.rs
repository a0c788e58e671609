//! Backtest runner: wires together indicators, the simulator, and metrics.
//!
//! Two entry points:
//! - `BacktestRunner::run()`: validates bars, applies a parameter set, runs.
//!   Used by the CLI and the walk-forward test windows.
//! - `BacktestRunner::evaluate()`: same without bar validation. Used by the
//!   parameter search, which validates the window once up front.

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use crosslab_core::components::indicator::{IndicatorError, IndicatorPipeline};
use crosslab_core::domain::{validate_bars, Bar, BarError, EquityCurve, Trade};
use crosslab_core::engine::{EngineConfig, ExecutionSimulator};
use crosslab_core::indicators::StandardPipeline;
use crosslab_core::strategy::{ParamError, ParameterSet, StrategyParams};

use crate::metrics::{PerformanceMetrics, DEFAULT_BARS_PER_YEAR};

/// Errors from a single backtest run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid bars: {0}")]
    Bars(#[from] BarError),
    #[error("invalid parameters: {0}")]
    Params(#[from] ParamError),
    #[error("indicator pipeline: {0}")]
    Indicators(#[from] IndicatorError),
    #[error("insufficient data: window has {available} bars, longest indicator period is {required}")]
    InsufficientData { required: usize, available: usize },
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub params: StrategyParams,
    /// Overrides applied on top of the base parameters.
    pub overrides: ParameterSet,
    pub fingerprint: String,
    pub engine: EngineConfig,
    pub metrics: PerformanceMetrics,
    pub trades: Vec<Trade>,
    pub equity_curve: EquityCurve,
    pub signal_count: usize,
    pub suppressed_entries: usize,
    pub bar_count: usize,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

/// Default schema version for serde deserialization of older JSON without the field.
fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Runs the full single-window pipeline for one parameter set.
///
/// Holds only configuration and is cheap to clone; shared by reference
/// across search and walk-forward worker threads.
#[derive(Clone)]
pub struct BacktestRunner {
    engine: EngineConfig,
    base: StrategyParams,
    bars_per_year: f64,
    pipeline: Arc<dyn IndicatorPipeline>,
}

impl fmt::Debug for BacktestRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BacktestRunner")
            .field("engine", &self.engine)
            .field("base", &self.base)
            .field("bars_per_year", &self.bars_per_year)
            .finish_non_exhaustive()
    }
}

impl Default for BacktestRunner {
    fn default() -> Self {
        Self::new(EngineConfig::default(), StrategyParams::default())
    }
}

impl BacktestRunner {
    pub fn new(engine: EngineConfig, base: StrategyParams) -> Self {
        Self {
            engine,
            base,
            bars_per_year: DEFAULT_BARS_PER_YEAR,
            pipeline: Arc::new(StandardPipeline),
        }
    }

    pub fn with_bars_per_year(mut self, bars_per_year: f64) -> Self {
        self.bars_per_year = bars_per_year;
        self
    }

    /// Swap in a different indicator pipeline.
    pub fn with_pipeline(mut self, pipeline: Arc<dyn IndicatorPipeline>) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn engine(&self) -> &EngineConfig {
        &self.engine
    }

    pub fn base_params(&self) -> &StrategyParams {
        &self.base
    }

    pub fn bars_per_year(&self) -> f64 {
        self.bars_per_year
    }

    /// Validate `bars`, then run with `overrides` applied to the base parameters.
    pub fn run(&self, bars: &[Bar], overrides: &ParameterSet) -> Result<BacktestResult, RunError> {
        validate_bars(bars)?;
        self.evaluate(bars, overrides)
    }

    /// Run on bars the caller has already validated.
    pub fn evaluate(
        &self,
        bars: &[Bar],
        overrides: &ParameterSet,
    ) -> Result<BacktestResult, RunError> {
        let params = self.base.apply(overrides)?;
        self.simulate(bars, &params, overrides.clone())
    }

    fn simulate(
        &self,
        bars: &[Bar],
        params: &StrategyParams,
        overrides: ParameterSet,
    ) -> Result<BacktestResult, RunError> {
        let required = params.largest_period();
        if bars.len() < required {
            return Err(RunError::InsufficientData {
                required,
                available: bars.len(),
            });
        }

        let indicators = self.pipeline.compute(bars, params);
        indicators.check_alignment(bars.len())?;

        let simulator = ExecutionSimulator::from_params(self.engine.clone(), params);
        let result = simulator.run(bars, &indicators);

        let equity = result.equity_curve.values();
        let metrics = PerformanceMetrics::compute(&equity, &result.trades, self.bars_per_year);
        trace!(
            params = %overrides,
            trades = result.trades.len(),
            sharpe = metrics.sharpe,
            "backtest complete"
        );

        Ok(BacktestResult {
            schema_version: SCHEMA_VERSION,
            params: params.clone(),
            fingerprint: overrides.fingerprint(),
            overrides,
            engine: self.engine.clone(),
            metrics,
            trades: result.trades,
            equity_curve: result.equity_curve,
            signal_count: result.signal_count,
            suppressed_entries: result.suppressed_entries,
            bar_count: bars.len(),
            start: bars.first().map(|b| b.timestamp),
            end: bars.last().map(|b| b.timestamp),
        })
    }
}
