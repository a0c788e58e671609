//! End-to-end: CSV → loader → runner → metrics → artifacts.

mod common;

use common::{bars_from_closes, permissive_params, permissive_runner, to_csv, v_then_fade};
use crosslab_core::domain::ExitReason;
use crosslab_core::strategy::ParameterSet;
use crosslab_runner::export::{load_run_summary, save_run_artifacts};
use crosslab_runner::{load_csv, BacktestConfig, BacktestRunner, LoadError};

#[test]
fn uptrend_then_downtrend_yields_one_profitable_trade() {
    let bars = bars_from_closes(&v_then_fade());
    let result = permissive_runner().run(&bars, &ParameterSet::new()).unwrap();

    assert_eq!(result.equity_curve.len(), 60);
    assert_eq!(result.trades.len(), 1);
    let trade = &result.trades[0];
    assert_eq!(trade.exit_reason, ExitReason::Signal);
    assert!(trade.exit_timestamp > trade.entry_timestamp);
    assert!(trade.net_pnl > 0.0);

    // Commission charged on both legs.
    let expected = 0.002 * trade.size * (trade.entry_price + trade.exit_price);
    assert!((trade.commission - expected).abs() < 1e-9);
    let gross = (trade.exit_price - trade.entry_price) * trade.size;
    assert!((trade.net_pnl - (gross - expected)).abs() < 1e-9);

    let m = &result.metrics;
    assert_eq!(m.trade_count, 1);
    assert_eq!(m.win_rate_pct, 100.0);
    assert!(m.total_return_pct > 0.0);
    assert!((m.final_equity - (10_000.0 + trade.net_pnl)).abs() < 1e-6);
    assert!((0.0..=100.0).contains(&m.max_drawdown_pct));
}

#[test]
fn csv_round_trip_gives_identical_run() {
    let bars = bars_from_closes(&v_then_fade());
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bars.csv");
    std::fs::write(&path, to_csv(&bars)).unwrap();

    let loaded = load_csv(&path).unwrap();
    assert_eq!(loaded, bars);

    let runner = permissive_runner();
    let direct = runner.run(&bars, &ParameterSet::new()).unwrap();
    let via_csv = runner.run(&loaded, &ParameterSet::new()).unwrap();
    assert_eq!(direct.trades, via_csv.trades);
    assert_eq!(
        direct.metrics.final_equity.to_bits(),
        via_csv.metrics.final_equity.to_bits()
    );
}

#[test]
fn duplicate_timestamps_are_fatal_before_simulation() {
    let mut bars = bars_from_closes(&v_then_fade());
    bars[10].timestamp = bars[9].timestamp;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dup.csv");
    std::fs::write(&path, to_csv(&bars)).unwrap();
    assert!(matches!(load_csv(&path), Err(LoadError::Bars(_))));
    assert!(BacktestRunner::default().run(&bars, &ParameterSet::new()).is_err());
}

#[test]
fn configured_engine_run_writes_artifacts() {
    let config = BacktestConfig::from_toml(
        r#"
[backtest]
starting_cash = 5000.0
commission = 0.0
"#,
    )
    .unwrap();
    let bars = bars_from_closes(&v_then_fade());
    let runner = BacktestRunner::new(config.engine_config(), permissive_params());
    let result = runner.run(&bars, &ParameterSet::new()).unwrap();
    assert_eq!(result.engine.starting_cash, 5000.0);
    assert_eq!(result.trades.len(), 1);
    assert_eq!(result.trades[0].commission, 0.0);

    let dir = tempfile::tempdir().unwrap();
    let written = save_run_artifacts(&result, dir.path()).unwrap();
    assert_eq!(written.len(), 3);
    assert!(written.iter().all(|p| p.exists()));
    let summary = load_run_summary(dir.path()).unwrap();
    assert_eq!(summary.params.ema_short, 5);
    assert_eq!(summary.bar_count, 60);
    assert_eq!(summary.metrics.trade_count, 1);
}
