//! Position sizing: risk budget and stop distance → order size.
//!
//! Sizers use equity but never decide entry or exit.

pub mod atr_risk;

pub use atr_risk::AtrRiskSizer;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SizingError {
    #[error("degenerate sizing: entry price {price} leaves no room above stop-loss {stop_loss}")]
    DegenerateSizing { price: f64, stop_loss: f64 },
}

/// `size = risk_fraction * equity / (price - stop_loss)`, clamped at zero.
///
/// Fails when the price equals the stop or the result is not finite.
pub fn risk_position_size(
    risk_fraction: f64,
    equity: f64,
    price: f64,
    stop_loss: f64,
) -> Result<f64, SizingError> {
    let distance = price - stop_loss;
    let size = risk_fraction * equity / distance;
    if distance == 0.0 || !size.is_finite() {
        return Err(SizingError::DegenerateSizing { price, stop_loss });
    }
    Ok(size.max(0.0))
}
