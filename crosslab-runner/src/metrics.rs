//! Performance metrics: pure functions that compute strategy statistics.
//!
//! Every metric is a pure function: equity values and/or trade list in,
//! scalar out. Percent-scaled metrics carry a `_pct` suffix.

use crosslab_core::domain::Trade;
use serde::{Deserialize, Serialize};

/// Annualization factor used when none is configured.
pub const DEFAULT_BARS_PER_YEAR: f64 = 365.0;

/// Window of the rolling Sharpe series in the performance report.
pub const DEFAULT_ROLLING_WINDOW: usize = 252;

const PROFIT_FACTOR_CAP: f64 = 100.0;

/// Aggregate performance metrics for one simulated window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub sharpe: f64,
    pub sortino: f64,
    pub max_drawdown_pct: f64,
    pub win_rate_pct: f64,
    pub total_return_pct: f64,
    pub cagr_pct: f64,
    pub profit_factor: f64,
    pub trade_count: usize,
    pub final_equity: f64,
    /// Share of bars that ended with a position open.
    pub exposure_pct: f64,
    pub avg_trade_return_pct: f64,
}

impl PerformanceMetrics {
    /// Compute all metrics from equity values and the trade log.
    pub fn compute(equity: &[f64], trades: &[Trade], bars_per_year: f64) -> Self {
        Self {
            sharpe: sharpe_ratio(equity, bars_per_year),
            sortino: sortino_ratio(equity, bars_per_year),
            max_drawdown_pct: max_drawdown_pct(equity),
            win_rate_pct: win_rate_pct(trades),
            total_return_pct: total_return_pct(equity),
            cagr_pct: cagr_pct(equity, bars_per_year),
            profit_factor: profit_factor(trades),
            trade_count: trades.len(),
            final_equity: equity.last().copied().unwrap_or(0.0),
            exposure_pct: exposure_pct(trades, equity.len()),
            avg_trade_return_pct: avg_trade_return_pct(trades),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Per-bar simple returns: `equity[t] / equity[t-1] - 1`.
pub fn period_returns(equity: &[f64]) -> Vec<f64> {
    equity
        .windows(2)
        .map(|w| if w[0] > 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect()
}

/// (final / initial - 1) * 100.
pub fn total_return_pct(equity: &[f64]) -> f64 {
    match (equity.first(), equity.last()) {
        (Some(&first), Some(&last)) if first > 0.0 => (last / first - 1.0) * 100.0,
        _ => 0.0,
    }
}

/// Compound annual growth rate in percent.
///
/// 0 for fewer than two bars or non-positive equity.
pub fn cagr_pct(equity: &[f64], bars_per_year: f64) -> f64 {
    let (Some(&first), Some(&last)) = (equity.first(), equity.last()) else {
        return 0.0;
    };
    if equity.len() < 2 || first <= 0.0 || last <= 0.0 || bars_per_year <= 0.0 {
        return 0.0;
    }
    let years = (equity.len() - 1) as f64 / bars_per_year;
    ((last / first).powf(1.0 / years) - 1.0) * 100.0
}

/// Annualized Sharpe ratio.
///
/// mean / sample stdev of period returns * sqrt(bars_per_year).
/// 0 with fewer than two returns or zero variance.
pub fn sharpe_ratio(equity: &[f64], bars_per_year: f64) -> f64 {
    sharpe_of_returns(&period_returns(equity), bars_per_year)
}

fn sharpe_of_returns(returns: &[f64], bars_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let std = std_dev(returns);
    if std < 1e-15 {
        return 0.0;
    }
    mean_f64(returns) / std * bars_per_year.sqrt()
}

/// Annualized Sortino ratio.
///
/// mean / sample stdev of the negative period returns * sqrt(bars_per_year).
/// 0 when fewer than two returns are negative or their stdev is zero.
pub fn sortino_ratio(equity: &[f64], bars_per_year: f64) -> f64 {
    let returns = period_returns(equity);
    let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    let downside_std = std_dev(&downside);
    if downside_std < 1e-15 {
        return 0.0;
    }
    mean_f64(&returns) / downside_std * bars_per_year.sqrt()
}

/// Largest percentage decline from a running peak, in [0, 100].
pub fn max_drawdown_pct(equity: &[f64]) -> f64 {
    drawdown_series(equity).into_iter().fold(0.0, f64::max)
}

/// Percentage decline from the running peak at each bar, in [0, 100].
pub fn drawdown_series(equity: &[f64]) -> Vec<f64> {
    let mut peak = f64::NEG_INFINITY;
    equity
        .iter()
        .map(|&eq| {
            peak = peak.max(eq);
            if peak > 0.0 {
                ((1.0 - eq / peak) * 100.0).clamp(0.0, 100.0)
            } else {
                0.0
            }
        })
        .collect()
}

/// Underwater curve: the drawdown series as non-positive percentages.
pub fn underwater_series(equity: &[f64]) -> Vec<f64> {
    drawdown_series(equity).into_iter().map(|d| -d).collect()
}

/// Sharpe over a trailing window of `window` returns; `NaN` until the
/// window is full.
pub fn rolling_sharpe(equity: &[f64], window: usize, bars_per_year: f64) -> Vec<f64> {
    let returns = period_returns(equity);
    let mut out = vec![f64::NAN; equity.len()];
    if window < 2 {
        return out;
    }
    for end in window..=returns.len() {
        // returns[end - 1] is the return into bar `end`.
        out[end] = sharpe_of_returns(&returns[end - window..end], bars_per_year);
    }
    out
}

/// winners / trades * 100; 0 with no trades.
pub fn win_rate_pct(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    winners as f64 / trades.len() as f64 * 100.0
}

/// Gross profit / gross loss, capped at 100.
pub fn profit_factor(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let gross_profit: f64 = trades.iter().map(|t| t.net_pnl.max(0.0)).sum();
    let gross_loss: f64 = trades.iter().map(|t| (-t.net_pnl).max(0.0)).sum();
    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { PROFIT_FACTOR_CAP } else { 0.0 };
    }
    (gross_profit / gross_loss).min(PROFIT_FACTOR_CAP)
}

/// Percent of bars that ended with a position open.
pub fn exposure_pct(trades: &[Trade], bar_count: usize) -> f64 {
    if bar_count == 0 {
        return 0.0;
    }
    let held: usize = trades.iter().map(|t| t.bars_held()).sum();
    held as f64 / bar_count as f64 * 100.0
}

pub fn avg_trade_return_pct(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().map(|t| t.return_pct()).sum::<f64>() / trades.len() as f64 * 100.0
}

// ─── Helpers ────────────────────────────────────────────────────────

pub fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1).
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}
