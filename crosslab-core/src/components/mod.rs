//! Strategy components: indicator contract and the crossover signal rule.
//!
//! Signals read only precomputed indicator values, never portfolio state.

pub mod indicator;
pub mod signal;

pub use indicator::{Indicator, IndicatorError, IndicatorPipeline, IndicatorRole, IndicatorValues};
pub use signal::{Signal, SignalEngine};
