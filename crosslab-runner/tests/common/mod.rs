//! Shared bar fixtures for runner integration tests.

#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use crosslab_core::domain::Bar;
use crosslab_core::engine::EngineConfig;
use crosslab_core::strategy::StrategyParams;
use crosslab_runner::BacktestRunner;

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

/// 60 bars: 20 down (-1), 20 up (+2), 20 down (-1). A 5/20 EMA pair crosses
/// up once during the rise and down once during the final decline.
pub fn v_then_fade() -> Vec<f64> {
    let mut closes: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
    closes.extend((1..=20).map(|i| 81.0 + 2.0 * i as f64));
    closes.extend((1..=20).map(|i| 121.0 - i as f64));
    closes
}

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

/// Render bars as a loader-compatible CSV document.
pub fn to_csv(bars: &[Bar]) -> String {
    let mut out = String::from("timestamp,open,high,low,close,volume\n");
    for b in bars {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            b.timestamp.format("%Y-%m-%d %H:%M:%S"),
            b.open,
            b.high,
            b.low,
            b.close,
            b.volume
        ));
    }
    out
}
