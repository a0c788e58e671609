//! Domain types for CrossLab

pub mod bar;
pub mod equity;
pub mod position;
pub mod trade;

pub use bar::{validate_bars, Bar, BarError};
pub use equity::{EquityCurve, EquityPoint};
pub use position::Position;
pub use trade::{ExitReason, Trade};
