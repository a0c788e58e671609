//! ATR risk sizer
//!
//! Risk a fixed fraction of equity per trade with the stop placed
//! `stop_multiple` ATRs below the entry price.
//!
//! ```text
//! stop_loss = price - stop_multiple * ATR
//! quantity  = (risk_fraction * equity) / (price - stop_loss)
//! ```
//!
//! Equity 10,000, risk 2% (200), ATR 2.00, multiple 2 → stop distance 4.00 → 50 units.

use super::{risk_position_size, SizingError};
use crate::strategy::StrategyParams;

#[derive(Debug, Clone, PartialEq)]
pub struct AtrRiskSizer {
    /// Fraction of equity at risk per trade (0.02 = 2%).
    risk_fraction: f64,
    /// Stop distance in ATR multiples.
    stop_multiple: f64,
}

impl AtrRiskSizer {
    pub fn new(risk_fraction: f64, stop_multiple: f64) -> Self {
        Self {
            risk_fraction,
            stop_multiple,
        }
    }

    pub fn from_params(params: &StrategyParams) -> Self {
        Self::new(params.risk_per_trade, params.stop_multiple)
    }

    pub fn stop_loss(&self, price: f64, atr: f64) -> f64 {
        price - self.stop_multiple * atr
    }

    pub fn size(&self, equity: f64, price: f64, stop_loss: f64) -> Result<f64, SizingError> {
        risk_position_size(self.risk_fraction, equity, price, stop_loss)
    }
}
