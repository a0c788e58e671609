//! CrossLab CLI: backtest, optimize and walk-forward commands.
//!
//! Commands:
//! - `run`: backtest one parameter set over a CSV of bars
//! - `optimize`: grid search with constraints, then backtest the winner
//! - `walk-forward`: anchored walk-forward evaluation of the search
//!
//! Every command reads an optional TOML config; flags override file values.

mod logging;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use crosslab_core::domain::Bar;
use crosslab_core::strategy::ParameterSet;
use crosslab_runner::export::{
    render_run_summary, render_walk_forward, save_run_artifacts, save_search_artifacts,
    save_walk_forward_artifacts,
};
use crosslab_runner::{load_csv, BacktestConfig, Objective, SearchOutcome};

#[derive(Parser)]
#[command(
    name = "crosslab",
    version,
    about = "CrossLab CLI: crossover strategy backtesting, optimisation and walk-forward"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Default log filter when RUST_LOG is unset (e.g. "info", "crosslab_runner=debug").
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Backtest a single parameter set.
    Run {
        #[command(flatten)]
        common: CommonArgs,

        /// Parameter override as name=value (repeatable), e.g. --set ema_short=8.
        #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_assignment)]
        overrides: Vec<(String, f64)>,
    },
    /// Grid-search the configured parameter space and backtest the best set.
    Optimize {
        #[command(flatten)]
        common: CommonArgs,

        /// Objective to maximise (overrides optimize.objective).
        #[arg(long)]
        objective: Option<Objective>,

        /// Number of ranked candidates to print.
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Anchored walk-forward evaluation of the configured search.
    WalkForward {
        #[command(flatten)]
        common: CommonArgs,

        /// Objective to maximise (overrides optimize.objective).
        #[arg(long)]
        objective: Option<Objective>,

        /// Number of folds (overrides walk_forward.folds).
        #[arg(long)]
        folds: Option<usize>,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// CSV file of OHLCV bars.
    #[arg(long)]
    data: PathBuf,

    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Starting cash (overrides backtest.starting_cash).
    #[arg(long)]
    cash: Option<f64>,

    /// Commission fraction per leg (overrides backtest.commission).
    #[arg(long)]
    commission: Option<f64>,

    /// Directory for result artifacts. Nothing is written when omitted.
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::setup_logging(&cli.log_level, cli.json_logs)?;

    match cli.command {
        Commands::Run { common, overrides } => run_backtest_cmd(&common, overrides),
        Commands::Optimize {
            common,
            objective,
            top,
        } => run_optimize_cmd(&common, objective, top),
        Commands::WalkForward {
            common,
            objective,
            folds,
        } => run_walk_forward_cmd(&common, objective, folds),
    }
}

fn run_backtest_cmd(common: &CommonArgs, overrides: Vec<(String, f64)>) -> Result<()> {
    let config = load_config(common, None, None)?;
    let bars = load_bars(&common.data)?;
    let overrides = overrides
        .into_iter()
        .fold(ParameterSet::new(), |set, (name, value)| set.with(name, value));

    let result = config
        .runner()
        .run(&bars, &overrides)
        .context("backtest failed")?;
    print!("{}", render_run_summary(&result));

    if let Some(dir) = &common.output_dir {
        let written = save_run_artifacts(&result, dir)
            .with_context(|| format!("failed to write artifacts to {}", dir.display()))?;
        print_written(&written);
    }
    Ok(())
}

fn run_optimize_cmd(common: &CommonArgs, objective: Option<Objective>, top: usize) -> Result<()> {
    let config = load_config(common, objective, None)?;
    let bars = load_bars(&common.data)?;
    let runner = config.runner();

    let outcome = config
        .search()
        .run(&bars, &runner)
        .context("parameter search failed")?;
    print_ranked(&outcome, top);

    let best = runner
        .run(&bars, &outcome.best.params)
        .context("re-running the best parameter set failed")?;
    println!();
    print!("{}", render_run_summary(&best));

    if let Some(dir) = &common.output_dir {
        let mut written = save_run_artifacts(&best, dir)
            .with_context(|| format!("failed to write artifacts to {}", dir.display()))?;
        written.push(save_search_artifacts(&outcome, dir)?);
        print_written(&written);
    }
    Ok(())
}

fn run_walk_forward_cmd(
    common: &CommonArgs,
    objective: Option<Objective>,
    folds: Option<usize>,
) -> Result<()> {
    let config = load_config(common, objective, folds)?;
    let bars = load_bars(&common.data)?;

    let report = config
        .walk_forward()
        .evaluate(&bars)
        .context("walk-forward evaluation failed")?;
    print!("{}", render_walk_forward(&report));

    if let Some(dir) = &common.output_dir {
        let path = save_walk_forward_artifacts(&report, dir)
            .with_context(|| format!("failed to write artifacts to {}", dir.display()))?;
        print_written(&[path]);
    }
    Ok(())
}

/// Read the config file (or defaults), apply flag overrides, re-validate.
fn load_config(
    common: &CommonArgs,
    objective: Option<Objective>,
    folds: Option<usize>,
) -> Result<BacktestConfig> {
    let mut config = match &common.config {
        Some(path) => BacktestConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => BacktestConfig::default(),
    };
    apply_overrides(&mut config, common.cash, common.commission, objective, folds);
    config.validate().context("invalid configuration after overrides")?;
    Ok(config)
}

fn apply_overrides(
    config: &mut BacktestConfig,
    cash: Option<f64>,
    commission: Option<f64>,
    objective: Option<Objective>,
    folds: Option<usize>,
) {
    if let Some(cash) = cash {
        config.backtest.starting_cash = cash;
    }
    if let Some(commission) = commission {
        config.backtest.commission = commission;
    }
    if let Some(objective) = objective {
        config.optimize.objective = objective;
    }
    if let Some(folds) = folds {
        config.walk_forward.folds = folds;
    }
}

fn load_bars(path: &Path) -> Result<Vec<Bar>> {
    let bars = load_csv(path).with_context(|| format!("failed to load bars from {}", path.display()))?;
    info!(path = %path.display(), bars = bars.len(), "bars loaded");
    Ok(bars)
}

fn parse_assignment(raw: &str) -> Result<(String, f64)> {
    let Some((name, value)) = raw.split_once('=') else {
        bail!("expected NAME=VALUE, got '{raw}'");
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("parameter name is empty in '{raw}'");
    }
    let value: f64 = value
        .trim()
        .parse()
        .with_context(|| format!("invalid value for {name}: '{value}'"))?;
    Ok((name.to_string(), value))
}

fn print_ranked(outcome: &SearchOutcome, top: usize) {
    println!(
        "Search: {} combinations, {} rejected by constraints, {} evaluated, {} skipped",
        outcome.total_combinations,
        outcome.rejected_by_constraint,
        outcome.candidates.len(),
        outcome.skipped
    );
    println!("Objective: {}", outcome.objective);
    println!();
    println!("{:>4}  {:>12}  {}", "rank", "score", "parameters");
    println!("{}", "-".repeat(60));
    for (rank, candidate) in outcome.ranked().into_iter().take(top).enumerate() {
        println!("{:>4}  {:>12.4}  {}", rank + 1, candidate.score, candidate.params);
    }
}

fn print_written(paths: &[PathBuf]) {
    for path in paths {
        println!("Wrote {}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_assignments() {
        assert_eq!(parse_assignment("ema_short=8").unwrap(), ("ema_short".into(), 8.0));
        assert_eq!(
            parse_assignment(" stop_multiple = 2.5 ").unwrap(),
            ("stop_multiple".into(), 2.5)
        );
        assert!(parse_assignment("ema_short").is_err());
        assert!(parse_assignment("=3").is_err());
        assert!(parse_assignment("ema_short=fast").is_err());
    }

    #[test]
    fn flags_override_file_values() {
        let mut config = BacktestConfig::default();
        apply_overrides(&mut config, Some(2500.0), Some(0.0), Some(Objective::Sortino), Some(3));
        assert_eq!(config.backtest.starting_cash, 2500.0);
        assert_eq!(config.backtest.commission, 0.0);
        assert_eq!(config.optimize.objective, Objective::Sortino);
        assert_eq!(config.walk_forward.folds, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn absent_flags_keep_file_values() {
        let mut config = BacktestConfig::default();
        apply_overrides(&mut config, None, None, None, None);
        assert_eq!(config, BacktestConfig::default());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_walk_forward_flags() {
        let cli = Cli::try_parse_from([
            "crosslab",
            "walk-forward",
            "--data",
            "bars.csv",
            "--folds",
            "4",
            "--objective",
            "return",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.log_level, "debug");
        match cli.command {
            Commands::WalkForward {
                common,
                objective,
                folds,
            } => {
                assert_eq!(common.data, PathBuf::from("bars.csv"));
                assert_eq!(objective, Some(Objective::TotalReturn));
                assert_eq!(folds, Some(4));
            }
            _ => panic!("expected walk-forward"),
        }
    }
}
