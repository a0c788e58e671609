//! Artifact export: JSON summaries, CSV tapes, and a plain-text report.
//!
//! Artifacts written for a single run:
//! - `summary.json`: metrics, parameters, and schema version
//! - `trades.csv`: one row per closed trade
//! - `equity.csv`: bar-by-bar equity with drawdown
//!
//! A parameter search adds `candidates.csv`; walk-forward writes
//! `walk_forward.json`. Summaries carry `schema_version` and newer versions
//! are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crosslab_core::domain::{EquityCurve, Trade};
use crosslab_core::engine::EngineConfig;
use crosslab_core::strategy::{ParameterSet, StrategyParams};

use crate::metrics::{drawdown_series, PerformanceMetrics};
use crate::runner::{BacktestResult, SCHEMA_VERSION};
use crate::sweep::SearchOutcome;
use crate::walk_forward::{FoldOutcome, WalkForwardReport};

// ─── JSON summary ───────────────────────────────────────────────────

/// `BacktestResult` without the trade log and equity curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub schema_version: u32,
    pub params: StrategyParams,
    pub overrides: ParameterSet,
    pub fingerprint: String,
    pub engine: EngineConfig,
    pub metrics: PerformanceMetrics,
    pub signal_count: usize,
    pub suppressed_entries: usize,
    pub bar_count: usize,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl From<&BacktestResult> for RunSummary {
    fn from(r: &BacktestResult) -> Self {
        Self {
            schema_version: r.schema_version,
            params: r.params.clone(),
            overrides: r.overrides.clone(),
            fingerprint: r.fingerprint.clone(),
            engine: r.engine.clone(),
            metrics: r.metrics.clone(),
            signal_count: r.signal_count,
            suppressed_entries: r.suppressed_entries,
            bar_count: r.bar_count,
            start: r.start,
            end: r.end,
        }
    }
}

pub fn export_summary_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(&RunSummary::from(result))
        .context("failed to serialize run summary to JSON")
}

/// Deserialize a `RunSummary`, rejecting unknown schema versions.
pub fn import_summary_json(json: &str) -> Result<RunSummary> {
    let summary: RunSummary =
        serde_json::from_str(json).context("failed to deserialize run summary from JSON")?;
    if summary.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            summary.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(summary)
}

pub fn export_walk_forward_json(report: &WalkForwardReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize walk-forward report to JSON")
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Columns: entry_bar, entry_time, entry_price, exit_bar, exit_time,
/// exit_price, exit_reason, size, stop_loss, gross_pnl, commission, net_pnl,
/// return_pct, bars_held
pub fn export_trades_csv(trades: &[Trade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "entry_bar",
        "entry_time",
        "entry_price",
        "exit_bar",
        "exit_time",
        "exit_price",
        "exit_reason",
        "size",
        "stop_loss",
        "gross_pnl",
        "commission",
        "net_pnl",
        "return_pct",
        "bars_held",
    ])?;

    for t in trades {
        wtr.write_record([
            &t.entry_bar.to_string(),
            &t.entry_timestamp.to_string(),
            &format!("{:.6}", t.entry_price),
            &t.exit_bar.to_string(),
            &t.exit_timestamp.to_string(),
            &format!("{:.6}", t.exit_price),
            &t.exit_reason.to_string(),
            &format!("{:.6}", t.size),
            &format!("{:.6}", t.stop_loss),
            &format!("{:.2}", t.gross_pnl),
            &format!("{:.2}", t.commission),
            &format!("{:.2}", t.net_pnl),
            &format!("{:.4}", t.return_pct() * 100.0),
            &t.bars_held().to_string(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Columns: bar_index, timestamp, equity, drawdown_pct
pub fn export_equity_csv(equity_curve: &EquityCurve) -> Result<String> {
    let drawdowns = drawdown_series(&equity_curve.values());
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["bar_index", "timestamp", "equity", "drawdown_pct"])?;
    for (i, (point, dd)) in equity_curve.points().iter().zip(&drawdowns).enumerate() {
        wtr.write_record([
            &i.to_string(),
            &point.timestamp.to_string(),
            &format!("{:.2}", point.equity),
            &format!("{:.4}", dd),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Ranked search candidates: rank, index, score, fingerprint, params, and
/// the headline metrics.
pub fn export_candidates_csv(outcome: &SearchOutcome) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "rank",
        "index",
        "score",
        "fingerprint",
        "params",
        "sharpe",
        "sortino",
        "max_drawdown_pct",
        "win_rate_pct",
        "total_return_pct",
        "trade_count",
    ])?;
    for (rank, c) in outcome.ranked().into_iter().enumerate() {
        wtr.write_record([
            &(rank + 1).to_string(),
            &c.index.to_string(),
            &format!("{:.6}", c.score),
            &c.params.fingerprint(),
            &c.params.to_string(),
            &format!("{:.4}", c.metrics.sharpe),
            &format!("{:.4}", c.metrics.sortino),
            &format!("{:.4}", c.metrics.max_drawdown_pct),
            &format!("{:.4}", c.metrics.win_rate_pct),
            &format!("{:.4}", c.metrics.total_return_pct),
            &c.metrics.trade_count.to_string(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

fn write_artifact(dir: &Path, name: &str, content: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    std::fs::write(&path, content).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create artifact dir: {}", dir.display()))
}

/// Write `summary.json`, `trades.csv` and `equity.csv` into `output_dir`.
pub fn save_run_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<Vec<PathBuf>> {
    ensure_dir(output_dir)?;
    Ok(vec![
        write_artifact(output_dir, "summary.json", &export_summary_json(result)?)?,
        write_artifact(output_dir, "trades.csv", &export_trades_csv(&result.trades)?)?,
        write_artifact(output_dir, "equity.csv", &export_equity_csv(&result.equity_curve)?)?,
    ])
}

/// Write `candidates.csv` into `output_dir`.
pub fn save_search_artifacts(outcome: &SearchOutcome, output_dir: &Path) -> Result<PathBuf> {
    ensure_dir(output_dir)?;
    write_artifact(output_dir, "candidates.csv", &export_candidates_csv(outcome)?)
}

/// Write `walk_forward.json` into `output_dir`.
pub fn save_walk_forward_artifacts(report: &WalkForwardReport, output_dir: &Path) -> Result<PathBuf> {
    ensure_dir(output_dir)?;
    write_artifact(output_dir, "walk_forward.json", &export_walk_forward_json(report)?)
}

/// Load `summary.json` from an artifact directory.
pub fn load_run_summary(dir: &Path) -> Result<RunSummary> {
    let path = dir.join("summary.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_summary_json(&json)
}

// ─── Text reports ───────────────────────────────────────────────────

/// Plain-text stats block for a single run.
pub fn render_run_summary(result: &BacktestResult) -> String {
    let m = &result.metrics;
    let span = match (result.start, result.end) {
        (Some(s), Some(e)) => format!("{s} .. {e}"),
        _ => "-".to_string(),
    };
    let mut out = String::new();
    out.push_str(&format!("{:<24}{}\n", "Window", span));
    out.push_str(&format!("{:<24}{}\n", "Bars", result.bar_count));
    out.push_str(&format!(
        "{:<24}{}\n",
        "Parameters",
        result.params.to_parameter_set()
    ));
    out.push_str(&format!("{:<24}{:.2}\n", "Final Equity", m.final_equity));
    out.push_str(&format!("{:<24}{:.2}\n", "Return [%]", m.total_return_pct));
    out.push_str(&format!("{:<24}{:.2}\n", "CAGR [%]", m.cagr_pct));
    out.push_str(&format!("{:<24}{:.3}\n", "Sharpe Ratio", m.sharpe));
    out.push_str(&format!("{:<24}{:.3}\n", "Sortino Ratio", m.sortino));
    out.push_str(&format!("{:<24}{:.2}\n", "Max. Drawdown [%]", m.max_drawdown_pct));
    out.push_str(&format!("{:<24}{}\n", "# Trades", m.trade_count));
    out.push_str(&format!("{:<24}{:.2}\n", "Win Rate [%]", m.win_rate_pct));
    out.push_str(&format!("{:<24}{:.2}\n", "Profit Factor", m.profit_factor));
    out.push_str(&format!("{:<24}{:.2}\n", "Exposure Time [%]", m.exposure_pct));
    out.push_str(&format!("{:<24}{:.2}\n", "Avg. Trade [%]", m.avg_trade_return_pct));
    out
}

/// Plain-text fold table plus the aggregate line.
pub fn render_walk_forward(report: &WalkForwardReport) -> String {
    let mut out = format!(
        "{:<6}{:<24}{:<24}{:>12}{:>12}  {}\n",
        "fold", "train", "test", "train", "test", "selected"
    );
    for fold in &report.folds {
        match fold {
            FoldOutcome::Completed(f) => out.push_str(&format!(
                "{:<6}{:<24}{:<24}{:>12.3}{:>12.3}  {}\n",
                f.fold_index,
                format!("[{}, {})", f.train.start_index, f.train.end_index),
                format!("[{}, {})", f.test.start_index, f.test.end_index),
                f.train_score,
                f.test_score,
                f.selected
            )),
            FoldOutcome::Failed {
                fold_index,
                train,
                test,
                error,
            } => out.push_str(&format!(
                "{:<6}{:<24}{:<24}  failed: {}\n",
                fold_index,
                format!("[{}, {})", train.start_index, train.end_index),
                format!("[{}, {})", test.start_index, test.end_index),
                error
            )),
        }
    }
    let s = &report.summary;
    out.push_str(&format!(
        "\n{} completed, {} failed; mean {} train {:.3}, test {:.3}",
        s.completed_folds, s.failed_folds, report.objective, s.mean_train_score, s.mean_test_score
    ));
    match s.degradation_ratio {
        Some(ratio) => out.push_str(&format!("; degradation {:.3} ({:?})\n", ratio, s.degradation_flag)),
        None => out.push_str(&format!("; degradation n/a ({:?})\n", s.degradation_flag)),
    }
    out
}
