//! Engine configuration, position state, and run result types.

use serde::{Deserialize, Serialize};

use crate::domain::{EquityCurve, Position, Trade};

/// Account-level settings for one simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub starting_cash: f64,
    /// Commission as a fraction of notional, charged on entry and on exit.
    pub commission_rate: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            starting_cash: 10_000.0,
            commission_rate: 0.002,
        }
    }
}

impl EngineConfig {
    pub fn new(starting_cash: f64, commission_rate: f64) -> Self {
        Self {
            starting_cash,
            commission_rate,
        }
    }

    /// No commission. Useful for isolating PnL arithmetic.
    pub fn frictionless(starting_cash: f64) -> Self {
        Self::new(starting_cash, 0.0)
    }
}

/// Simulator state at a bar boundary. At most one position is ever open.
#[derive(Debug, Clone, PartialEq)]
pub enum PositionState {
    Flat,
    Long(Position),
}

impl PositionState {
    pub fn is_long(&self) -> bool {
        matches!(self, PositionState::Long(_))
    }

    pub fn position(&self) -> Option<&Position> {
        match self {
            PositionState::Flat => None,
            PositionState::Long(pos) => Some(pos),
        }
    }
}

/// Output of one simulation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunResult {
    pub equity_curve: EquityCurve,
    pub trades: Vec<Trade>,
    /// Bars on which the rule emitted EnterLong or ExitLong.
    pub signal_count: usize,
    /// EnterLong signals that did not open a position.
    pub suppressed_entries: usize,
    /// Bars that ended with a position open.
    pub bars_in_market: usize,
}

impl RunResult {
    pub fn final_equity(&self) -> Option<f64> {
        self.equity_curve.last().map(|p| p.equity)
    }
}
