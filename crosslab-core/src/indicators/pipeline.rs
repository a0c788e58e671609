//! Default indicator pipeline: EMA trend pair, RSI oscillator, ATR volatility.

use tracing::trace;

use crate::components::indicator::{Indicator, IndicatorPipeline, IndicatorRole, IndicatorValues};
use crate::domain::Bar;
use crate::strategy::StrategyParams;

use super::{Atr, Ema, Rsi};

/// Computes the four role series from `StrategyParams` periods.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardPipeline;

impl StandardPipeline {
    fn role_indicators(params: &StrategyParams) -> Vec<(IndicatorRole, Box<dyn Indicator>)> {
        let fast: Box<dyn Indicator> = Box::new(Ema::new(params.ema_short));
        let slow: Box<dyn Indicator> = Box::new(Ema::new(params.ema_long));
        let oscillator: Box<dyn Indicator> = Box::new(Rsi::new(params.rsi_period));
        let volatility: Box<dyn Indicator> = Box::new(Atr::new(params.atr_period));
        vec![
            (IndicatorRole::FastTrend, fast),
            (IndicatorRole::SlowTrend, slow),
            (IndicatorRole::Oscillator, oscillator),
            (IndicatorRole::Volatility, volatility),
        ]
    }
}

impl IndicatorPipeline for StandardPipeline {
    fn compute(&self, bars: &[Bar], params: &StrategyParams) -> IndicatorValues {
        let mut values = IndicatorValues::new();
        for (role, indicator) in Self::role_indicators(params) {
            trace!(role = %role, indicator = indicator.name(), "computing indicator");
            values.insert_role(role, indicator.compute(bars));
        }
        values
    }
}
