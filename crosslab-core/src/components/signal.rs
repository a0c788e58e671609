//! Crossover signal rule with an oscillator filter.
//!
//! EnterLong: the fast trend average crosses strictly above the slow one on
//! this bar while the oscillator is below the oversold level.
//! ExitLong: the slow average crosses strictly above the fast one while the
//! oscillator is above the overbought level.
//!
//! The rule is stateless and portfolio-agnostic: it reads indicator values at
//! `bar_index` and `bar_index - 1` only.

use serde::{Deserialize, Serialize};

use super::indicator::{IndicatorRole, IndicatorValues};
use crate::strategy::StrategyParams;

/// Per-bar decision. Derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    EnterLong,
    ExitLong,
    Hold,
}

/// True when `a` moves from at-or-below `b` to strictly above it.
/// Equal values never count as a cross.
fn crossed_above(a_prev: f64, b_prev: f64, a_cur: f64, b_cur: f64) -> bool {
    a_prev <= b_prev && a_cur > b_cur
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalEngine {
    oversold: f64,
    overbought: f64,
}

impl SignalEngine {
    pub fn new(oversold: f64, overbought: f64) -> Self {
        Self {
            oversold,
            overbought,
        }
    }

    pub fn from_params(params: &StrategyParams) -> Self {
        Self::new(params.rsi_oversold, params.rsi_overbought)
    }

    /// Evaluate the rule at `bar_index`.
    ///
    /// Bar 0 and any undefined input (warm-up) yield `Hold`.
    pub fn evaluate(&self, bar_index: usize, indicators: &IndicatorValues) -> Signal {
        if bar_index == 0 {
            return Signal::Hold;
        }
        let read = |role| {
            Some((
                indicators.defined(role, bar_index - 1)?,
                indicators.defined(role, bar_index)?,
            ))
        };
        let (Some((fast_prev, fast_cur)), Some((slow_prev, slow_cur)), Some(osc)) = (
            read(IndicatorRole::FastTrend),
            read(IndicatorRole::SlowTrend),
            indicators.defined(IndicatorRole::Oscillator, bar_index),
        ) else {
            return Signal::Hold;
        };

        if crossed_above(fast_prev, slow_prev, fast_cur, slow_cur) && osc < self.oversold {
            Signal::EnterLong
        } else if crossed_above(slow_prev, fast_prev, slow_cur, fast_cur) && osc > self.overbought {
            Signal::ExitLong
        } else {
            Signal::Hold
        }
    }
}
