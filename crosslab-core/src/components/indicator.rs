//! Indicator trait, role keys, and the precomputed indicator values container.
//!
//! Indicators are pure functions: bar history in, numeric series out.
//! They are computed once per window before the bar loop and then read by
//! bar index. The simulator never recomputes them per bar.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

use crate::domain::Bar;
use crate::strategy::StrategyParams;

/// Trait for indicators.
///
/// Indicators take a full bar series and produce a numeric output series of
/// the same length. The first `lookback()` values are `f64::NAN` (warm-up).
///
/// # Look-ahead contamination guard
/// No indicator value at bar t may depend on price data from bar t+1 or later.
/// Every indicator must pass the truncated-vs-full series test.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "ema_10", "atr_14").
    fn name(&self) -> &str;

    /// Number of leading bars that are undefined.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire bar series.
    fn compute(&self, bars: &[Bar]) -> Vec<f64>;
}

/// The slot an indicator series fills for the signal rule and the sizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorRole {
    /// Short-period trend average.
    FastTrend,
    /// Long-period trend average.
    SlowTrend,
    /// Bounded momentum oscillator on a 0..100 scale.
    Oscillator,
    /// Volatility measure in price units, used for stop placement.
    Volatility,
}

impl IndicatorRole {
    pub const ALL: [IndicatorRole; 4] = [
        IndicatorRole::FastTrend,
        IndicatorRole::SlowTrend,
        IndicatorRole::Oscillator,
        IndicatorRole::Volatility,
    ];

    pub fn key(self) -> &'static str {
        match self {
            IndicatorRole::FastTrend => "fast_trend",
            IndicatorRole::SlowTrend => "slow_trend",
            IndicatorRole::Oscillator => "oscillator",
            IndicatorRole::Volatility => "volatility",
        }
    }
}

impl fmt::Display for IndicatorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Violations of the indicator alignment contract.
#[derive(Debug, Error, PartialEq)]
pub enum IndicatorError {
    #[error("missing indicator series for role '{0}'")]
    MissingSeries(IndicatorRole),
    #[error("indicator '{role}' has {actual} values for {expected} bars")]
    LengthMismatch {
        role: IndicatorRole,
        expected: usize,
        actual: usize,
    },
    #[error("indicator '{role}' is undefined at bar {index} after being defined")]
    GapAfterWarmup { role: IndicatorRole, index: usize },
}

/// Container for precomputed indicator values.
///
/// Built once per window, then queried by bar index during the loop.
#[derive(Debug, Clone, Default)]
pub struct IndicatorValues {
    series: HashMap<String, Vec<f64>>,
}

impl IndicatorValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a named indicator series.
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.series.insert(name.into(), values);
    }

    pub fn insert_role(&mut self, role: IndicatorRole, values: Vec<f64>) {
        self.insert(role.key(), values);
    }

    /// Raw value at a bar index. `NaN` during warm-up.
    pub fn get(&self, name: &str, bar_index: usize) -> Option<f64> {
        self.series
            .get(name)
            .and_then(|v| v.get(bar_index).copied())
    }

    /// Value for a role at a bar index, `None` while undefined.
    pub fn defined(&self, role: IndicatorRole, bar_index: usize) -> Option<f64> {
        self.get(role.key(), bar_index).filter(|v| !v.is_nan())
    }

    /// Get the full series for a named indicator.
    pub fn get_series(&self, name: &str) -> Option<&[f64]> {
        self.series.get(name).map(|v| v.as_slice())
    }

    /// Number of indicator series stored.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Check that every role series is aligned with the bars and that
    /// undefined values only occur as a leading prefix.
    pub fn check_alignment(&self, bar_count: usize) -> Result<(), IndicatorError> {
        for role in IndicatorRole::ALL {
            let values = self
                .get_series(role.key())
                .ok_or(IndicatorError::MissingSeries(role))?;
            if values.len() != bar_count {
                return Err(IndicatorError::LengthMismatch {
                    role,
                    expected: bar_count,
                    actual: values.len(),
                });
            }
            if let Some(first) = values.iter().position(|v| !v.is_nan()) {
                if let Some(offset) = values[first..].iter().position(|v| v.is_nan()) {
                    return Err(IndicatorError::GapAfterWarmup {
                        role,
                        index: first + offset,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Computes all role series for a window of bars under one parameter set.
///
/// Implementations must only use bars at or before each index.
pub trait IndicatorPipeline: Send + Sync {
    fn compute(&self, bars: &[Bar], params: &StrategyParams) -> IndicatorValues;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aligned(n: usize, warmup: usize) -> Vec<f64> {
        (0..n)
            .map(|i| if i < warmup { f64::NAN } else { i as f64 })
            .collect()
    }

    #[test]
    fn indicator_values_insert_and_get() {
        let mut iv = IndicatorValues::new();
        iv.insert("ema_20", aligned(21, 19));
        assert!(iv.get("ema_20", 0).unwrap().is_nan());
        assert_eq!(iv.get("ema_20", 19), Some(19.0));
        assert_eq!(iv.get("ema_20", 21), None); // out of bounds
    }

    #[test]
    fn defined_filters_warmup() {
        let mut iv = IndicatorValues::new();
        iv.insert_role(IndicatorRole::Oscillator, aligned(5, 2));
        assert_eq!(iv.defined(IndicatorRole::Oscillator, 1), None);
        assert_eq!(iv.defined(IndicatorRole::Oscillator, 2), Some(2.0));
        assert_eq!(iv.defined(IndicatorRole::Volatility, 2), None);
    }

    #[test]
    fn alignment_accepts_prefix_warmup() {
        let mut iv = IndicatorValues::new();
        for role in IndicatorRole::ALL {
            iv.insert_role(role, aligned(10, 3));
        }
        assert_eq!(iv.check_alignment(10), Ok(()));
    }

    #[test]
    fn alignment_rejects_missing_and_short_series() {
        let mut iv = IndicatorValues::new();
        iv.insert_role(IndicatorRole::FastTrend, aligned(10, 0));
        assert_eq!(
            iv.check_alignment(10),
            Err(IndicatorError::MissingSeries(IndicatorRole::SlowTrend))
        );

        for role in IndicatorRole::ALL {
            iv.insert_role(role, aligned(10, 0));
        }
        iv.insert_role(IndicatorRole::Volatility, aligned(9, 0));
        assert!(matches!(
            iv.check_alignment(10),
            Err(IndicatorError::LengthMismatch { actual: 9, .. })
        ));
    }

    #[test]
    fn alignment_rejects_gap_after_warmup() {
        let mut iv = IndicatorValues::new();
        for role in IndicatorRole::ALL {
            iv.insert_role(role, aligned(6, 1));
        }
        let mut gappy = aligned(6, 1);
        gappy[4] = f64::NAN;
        iv.insert_role(IndicatorRole::Oscillator, gappy);
        assert_eq!(
            iv.check_alignment(6),
            Err(IndicatorError::GapAfterWarmup {
                role: IndicatorRole::Oscillator,
                index: 4
            })
        );
    }
}
