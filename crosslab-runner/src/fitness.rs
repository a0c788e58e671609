//! Objective selector for parameter search.
//!
//! Every objective is maximized. Max drawdown is scored as its negation so a
//! shallower drawdown ranks higher.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metrics::PerformanceMetrics;

#[derive(Debug, Error, PartialEq)]
#[error("unknown objective '{0}' (expected one of: sharpe, sortino, max_drawdown, win_rate, total_return, cagr, profit_factor)")]
pub struct ObjectiveParseError(pub String);

/// Which metric the search maximizes.
///
/// Serializes as its snake_case name; deserializes through `FromStr`, so
/// report labels are accepted in configuration files too.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum Objective {
    #[default]
    Sharpe,
    Sortino,
    MaxDrawdown,
    WinRate,
    TotalReturn,
    Cagr,
    ProfitFactor,
}

impl Objective {
    /// Score to maximize.
    pub fn score(&self, metrics: &PerformanceMetrics) -> f64 {
        match self {
            Self::Sharpe => metrics.sharpe,
            Self::Sortino => metrics.sortino,
            Self::MaxDrawdown => -metrics.max_drawdown_pct,
            Self::WinRate => metrics.win_rate_pct,
            Self::TotalReturn => metrics.total_return_pct,
            Self::Cagr => metrics.cagr_pct,
            Self::ProfitFactor => metrics.profit_factor,
        }
    }

    /// Report label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Sharpe => "Sharpe Ratio",
            Self::Sortino => "Sortino Ratio",
            Self::MaxDrawdown => "Max. Drawdown [%]",
            Self::WinRate => "Win Rate [%]",
            Self::TotalReturn => "Return [%]",
            Self::Cagr => "CAGR [%]",
            Self::ProfitFactor => "Profit Factor",
        }
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Objective {
    type Err = ObjectiveParseError;

    /// Accepts snake_case names and report labels, ignoring case and punctuation
    /// ("sharpe", "Sharpe Ratio", "Return [%]", "max_drawdown").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        let objective = match key.as_str() {
            "sharpe" | "sharperatio" => Self::Sharpe,
            "sortino" | "sortinoratio" => Self::Sortino,
            "maxdrawdown" | "maxdd" | "drawdown" => Self::MaxDrawdown,
            "winrate" => Self::WinRate,
            "return" | "totalreturn" => Self::TotalReturn,
            "cagr" => Self::Cagr,
            "profitfactor" => Self::ProfitFactor,
            _ => return Err(ObjectiveParseError(s.to_string())),
        };
        Ok(objective)
    }
}

impl TryFrom<String> for Objective {
    type Error = ObjectiveParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
