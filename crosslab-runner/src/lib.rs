//! CrossLab Runner: backtest orchestration, parameter search, walk-forward.
//!
//! This crate builds on `crosslab-core` to provide:
//! - Performance metrics and search objectives
//! - TOML run configuration
//! - Single-run orchestration (validate, indicators, simulate, metrics)
//! - Constrained grid search on the rayon pool
//! - Anchored walk-forward evaluation
//! - CSV bar loading and artifact export

pub mod config;
pub mod data_loader;
pub mod export;
pub mod fitness;
pub mod grid;
pub mod metrics;
pub mod runner;
pub mod sweep;
pub mod walk_forward;

pub use config::{BacktestConfig, ConfigError};
pub use data_loader::{load_csv, read_bars, LoadError};
pub use fitness::{Objective, ObjectiveParseError};
pub use grid::{Constraint, ConstraintSpec, GridError, ParamAxis, ParamDomain, ParamGrid};
pub use metrics::PerformanceMetrics;
pub use runner::{BacktestResult, BacktestRunner, RunError, SCHEMA_VERSION};
pub use sweep::{CancelToken, CandidateResult, ParameterSearch, SearchError, SearchOutcome};
pub use walk_forward::{
    create_folds, DegradationFlag, FoldError, FoldOutcome, FoldResult, WalkForwardError,
    WalkForwardEvaluator, WalkForwardReport,
};

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{Duration, NaiveDate};
    use crosslab_core::domain::Bar;
    use crosslab_core::engine::EngineConfig;
    use crosslab_core::strategy::StrategyParams;

    use crate::runner::BacktestRunner;

    pub fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
        let base = NaiveDate::from_ymd_opt(2023, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                let open = if i == 0 { close } else { closes[i - 1] };
                Bar::new(
                    base + Duration::days(i as i64),
                    open,
                    open.max(close) + 0.5,
                    open.min(close) - 0.5,
                    close,
                    10_000.0,
                )
            })
            .collect()
    }

    /// 60 bars: 20 down (-1), 20 up (+2), 20 down (-1).
    pub fn v_then_fade() -> Vec<f64> {
        let mut closes: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
        closes.extend((1..=20).map(|i| 81.0 + 2.0 * i as f64));
        closes.extend((1..=20).map(|i| 121.0 - i as f64));
        closes
    }

    /// Slow oscillation with drift, for multi-fold runs.
    pub fn wave(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 100.0 + 12.0 * (i as f64 / 9.0).sin() + 0.05 * i as f64)
            .collect()
    }

    /// Oscillator thresholds that let every defined RSI through.
    pub fn permissive_params() -> StrategyParams {
        StrategyParams {
            ema_short: 5,
            ema_long: 20,
            rsi_period: 14,
            atr_period: 5,
            rsi_oversold: 100.0,
            rsi_overbought: 0.0,
            ..StrategyParams::default()
        }
    }

    pub fn permissive_runner() -> BacktestRunner {
        BacktestRunner::new(EngineConfig::default(), permissive_params())
    }
}

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn runner_types_are_send_sync() {
        assert_send::<BacktestRunner>();
        assert_sync::<BacktestRunner>();
        assert_send::<BacktestResult>();
        assert_sync::<BacktestResult>();
        assert_send::<PerformanceMetrics>();
        assert_sync::<PerformanceMetrics>();
    }

    #[test]
    fn search_types_are_send_sync() {
        assert_send::<ParameterSearch>();
        assert_sync::<ParameterSearch>();
        assert_send::<SearchOutcome>();
        assert_sync::<SearchOutcome>();
        assert_send::<CancelToken>();
        assert_sync::<CancelToken>();
        assert_send::<ParamGrid>();
        assert_sync::<ParamGrid>();
    }

    #[test]
    fn walk_forward_types_are_send_sync() {
        assert_send::<WalkForwardEvaluator>();
        assert_sync::<WalkForwardEvaluator>();
        assert_send::<FoldOutcome>();
        assert_sync::<FoldOutcome>();
        assert_send::<WalkForwardReport>();
        assert_sync::<WalkForwardReport>();
    }

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<BacktestConfig>();
        assert_sync::<BacktestConfig>();
        assert_send::<Objective>();
        assert_sync::<Objective>();
    }
}
