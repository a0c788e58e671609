//! TOML run configuration.
//!
//! Every section and field is optional:
//!
//! ```toml
//! [backtest]
//! starting_cash = 10000.0
//! commission = 0.002
//! bars_per_year = 365.0
//!
//! [strategy]
//! ema_short = 10
//! ema_long = 50
//!
//! [optimize]
//! objective = "Sharpe Ratio"
//! parallel = true
//!
//! [[optimize.axes]]
//! name = "ema_short"
//! type = "int_range"
//! start = 5
//! end = 20
//! step = 5
//!
//! [[optimize.constraints]]
//! type = "less_than"
//! left = "ema_short"
//! right = "ema_long"
//!
//! [walk_forward]
//! folds = 5
//! ```
//!
//! Without `[[optimize.axes]]` the reference grid is searched, constrained to
//! `ema_short < ema_long`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crosslab_core::engine::EngineConfig;
use crosslab_core::strategy::{ParamError, StrategyParams, PARAM_NAMES};

use crate::fitness::Objective;
use crate::grid::{ConstraintSpec, GridError, ParamAxis, ParamGrid};
use crate::metrics::DEFAULT_BARS_PER_YEAR;
use crate::runner::BacktestRunner;
use crate::sweep::ParameterSearch;
use crate::walk_forward::{WalkForwardEvaluator, DEFAULT_FOLDS};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid strategy parameters: {0}")]
    Strategy(#[from] ParamError),
    #[error("invalid optimisation grid: {0}")]
    Grid(#[from] GridError),
    #[error("{field} = {value} is out of range: {expected}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        expected: &'static str,
    },
    #[error("rsi_oversold ({oversold}) must be below rsi_overbought ({overbought})")]
    ThresholdOrder { oversold: f64, overbought: f64 },
    #[error("constraint references unknown parameter '{0}'")]
    UnknownConstraintParameter(String),
    #[error("walk_forward.folds must be at least 1")]
    ZeroFolds,
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BacktestConfig {
    pub backtest: BacktestSection,
    pub strategy: StrategyParams,
    pub optimize: OptimizeSection,
    pub walk_forward: WalkForwardSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BacktestSection {
    pub starting_cash: f64,
    /// Fraction of notional charged on entry and on exit.
    pub commission: f64,
    pub bars_per_year: f64,
}

impl Default for BacktestSection {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            starting_cash: engine.starting_cash,
            commission: engine.commission_rate,
            bars_per_year: DEFAULT_BARS_PER_YEAR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptimizeSection {
    pub objective: Objective,
    pub parallel: bool,
    pub axes: Vec<ParamAxis>,
    pub constraints: Vec<ConstraintSpec>,
}

impl Default for OptimizeSection {
    fn default() -> Self {
        Self {
            objective: Objective::default(),
            parallel: true,
            axes: ParamGrid::reference().axes,
            constraints: vec![ConstraintSpec::less_than("ema_short", "ema_long")],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WalkForwardSection {
    pub folds: usize,
}

impl Default for WalkForwardSection {
    fn default() -> Self {
        Self {
            folds: DEFAULT_FOLDS,
        }
    }
}

impl BacktestConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let b = &self.backtest;
        if !(b.starting_cash.is_finite() && b.starting_cash > 0.0) {
            return Err(ConfigError::OutOfRange {
                field: "backtest.starting_cash",
                value: b.starting_cash,
                expected: "finite and > 0",
            });
        }
        if !(0.0..1.0).contains(&b.commission) {
            return Err(ConfigError::OutOfRange {
                field: "backtest.commission",
                value: b.commission,
                expected: "0 <= value < 1",
            });
        }
        if !(b.bars_per_year.is_finite() && b.bars_per_year > 0.0) {
            return Err(ConfigError::OutOfRange {
                field: "backtest.bars_per_year",
                value: b.bars_per_year,
                expected: "finite and > 0",
            });
        }

        self.strategy.validate()?;
        if self.strategy.rsi_oversold >= self.strategy.rsi_overbought {
            return Err(ConfigError::ThresholdOrder {
                oversold: self.strategy.rsi_oversold,
                overbought: self.strategy.rsi_overbought,
            });
        }

        self.grid().validate()?;
        for constraint in &self.optimize.constraints {
            for name in constraint.names() {
                if !PARAM_NAMES.contains(&name) {
                    return Err(ConfigError::UnknownConstraintParameter(name.to_string()));
                }
            }
        }

        if self.walk_forward.folds == 0 {
            return Err(ConfigError::ZeroFolds);
        }
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::new(self.backtest.starting_cash, self.backtest.commission)
    }

    pub fn grid(&self) -> ParamGrid {
        ParamGrid::new(self.optimize.axes.clone())
    }

    pub fn runner(&self) -> BacktestRunner {
        BacktestRunner::new(self.engine_config(), self.strategy.clone())
            .with_bars_per_year(self.backtest.bars_per_year)
    }

    pub fn search(&self) -> ParameterSearch {
        self.optimize.constraints.iter().cloned().fold(
            ParameterSearch::new(self.grid())
                .with_objective(self.optimize.objective)
                .with_parallelism(self.optimize.parallel),
            |search, constraint| search.with_constraint(constraint),
        )
    }

    pub fn walk_forward(&self) -> WalkForwardEvaluator {
        WalkForwardEvaluator::new(self.search(), self.runner())
            .with_folds(self.walk_forward.folds)
            .with_parallelism(self.optimize.parallel)
    }
}
