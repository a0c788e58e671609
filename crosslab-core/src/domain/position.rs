//! Position: the single open long holding owned by the simulator.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::Bar;

/// An open long position.
///
/// Created on an accepted entry, destroyed on exit, stop-loss, or end of window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub entry_bar: usize,
    pub entry_timestamp: NaiveDateTime,
    pub entry_price: f64,
    pub size: f64,
    pub stop_loss: f64,
    /// Commission paid on the entry leg.
    pub entry_commission: f64,
}

impl Position {
    /// Mark-to-market value at `price`.
    pub fn market_value(&self, price: f64) -> f64 {
        self.size * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        (price - self.entry_price) * self.size
    }

    /// True when the bar trades at or through the stop-loss level.
    pub fn is_stopped_out(&self, bar: &Bar) -> bool {
        bar.low <= self.stop_loss
    }
}
