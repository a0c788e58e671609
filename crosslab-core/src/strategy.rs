//! Strategy parameters: the typed `StrategyParams` record and the untyped
//! `ParameterSet` produced by grid enumeration.
//!
//! A `ParameterSet` is applied as a set of overrides onto a base
//! `StrategyParams`; unknown names and out-of-domain values are rejected.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Parameter names understood by `StrategyParams::apply`.
pub const PARAM_NAMES: [&str; 8] = [
    "rsi_period",
    "rsi_overbought",
    "rsi_oversold",
    "ema_short",
    "ema_long",
    "atr_period",
    "risk_per_trade",
    "stop_multiple",
];

#[derive(Debug, Error, PartialEq)]
pub enum ParamError {
    #[error("unknown parameter '{0}'")]
    Unknown(String),
    #[error("parameter '{name}' must be a positive integer period, got {value}")]
    NotAPeriod { name: String, value: f64 },
    #[error("parameter '{name}' = {value} is out of range: {expected}")]
    OutOfRange {
        name: String,
        value: f64,
        expected: &'static str,
    },
}

/// Typed strategy parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StrategyParams {
    pub rsi_period: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub ema_short: usize,
    pub ema_long: usize,
    pub atr_period: usize,
    /// Fraction of equity risked per trade, in (0, 1).
    pub risk_per_trade: f64,
    /// Stop distance in ATR multiples.
    pub stop_multiple: f64,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            ema_short: 10,
            ema_long: 50,
            atr_period: 14,
            risk_per_trade: 0.02,
            stop_multiple: 2.0,
        }
    }
}

impl StrategyParams {
    /// Return a copy with every entry of `set` applied, validated.
    pub fn apply(&self, set: &ParameterSet) -> Result<Self, ParamError> {
        let mut params = self.clone();
        for (name, &value) in set.iter() {
            match name {
                "rsi_period" => params.rsi_period = as_period(name, value)?,
                "ema_short" => params.ema_short = as_period(name, value)?,
                "ema_long" => params.ema_long = as_period(name, value)?,
                "atr_period" => params.atr_period = as_period(name, value)?,
                "rsi_overbought" => params.rsi_overbought = value,
                "rsi_oversold" => params.rsi_oversold = value,
                "risk_per_trade" => params.risk_per_trade = value,
                "stop_multiple" => params.stop_multiple = value,
                other => return Err(ParamError::Unknown(other.to_string())),
            }
        }
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), ParamError> {
        for (name, period) in [
            ("rsi_period", self.rsi_period),
            ("ema_short", self.ema_short),
            ("ema_long", self.ema_long),
            ("atr_period", self.atr_period),
        ] {
            if period == 0 {
                return Err(ParamError::NotAPeriod {
                    name: name.into(),
                    value: 0.0,
                });
            }
        }
        for (name, level) in [
            ("rsi_overbought", self.rsi_overbought),
            ("rsi_oversold", self.rsi_oversold),
        ] {
            if !(0.0..=100.0).contains(&level) {
                return Err(out_of_range(name, level, "0 <= value <= 100"));
            }
        }
        if !(self.risk_per_trade > 0.0 && self.risk_per_trade < 1.0) {
            return Err(out_of_range(
                "risk_per_trade",
                self.risk_per_trade,
                "0 < value < 1",
            ));
        }
        if !(self.stop_multiple.is_finite() && self.stop_multiple > 0.0) {
            return Err(out_of_range(
                "stop_multiple",
                self.stop_multiple,
                "finite and > 0",
            ));
        }
        Ok(())
    }

    /// Longest indicator period; windows shorter than this cannot be evaluated.
    pub fn largest_period(&self) -> usize {
        self.rsi_period
            .max(self.ema_short)
            .max(self.ema_long)
            .max(self.atr_period)
    }

    /// The full parameter record as a `ParameterSet`.
    pub fn to_parameter_set(&self) -> ParameterSet {
        ParameterSet::new()
            .with("rsi_period", self.rsi_period as f64)
            .with("rsi_overbought", self.rsi_overbought)
            .with("rsi_oversold", self.rsi_oversold)
            .with("ema_short", self.ema_short as f64)
            .with("ema_long", self.ema_long as f64)
            .with("atr_period", self.atr_period as f64)
            .with("risk_per_trade", self.risk_per_trade)
            .with("stop_multiple", self.stop_multiple)
    }
}

fn as_period(name: &str, value: f64) -> Result<usize, ParamError> {
    if value.is_finite() && value >= 1.0 && value.fract() == 0.0 {
        Ok(value as usize)
    } else {
        Err(ParamError::NotAPeriod {
            name: name.into(),
            value,
        })
    }
}

fn out_of_range(name: &str, value: f64, expected: &'static str) -> ParamError {
    ParamError::OutOfRange {
        name: name.into(),
        value,
        expected,
    }
}

/// Name → value mapping for one grid point. Ordered, so iteration, display,
/// serialization and the fingerprint are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet(BTreeMap<String, f64>);

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A copy of `self` with every entry of `overrides` replacing its own.
    pub fn overlay(&self, overrides: &ParameterSet) -> ParameterSet {
        let mut merged = self.clone();
        for (name, value) in &overrides.0 {
            merged.0.insert(name.clone(), *value);
        }
        merged
    }

    /// Stable short identifier: BLAKE3 over the sorted `name=value-bits` pairs.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for (name, value) in &self.0 {
            hasher.update(name.as_bytes());
            hasher.update(b"=");
            hasher.update(&value.to_bits().to_le_bytes());
            hasher.update(b";");
        }
        hasher.finalize().to_hex()[..16].to_string()
    }
}

impl fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, value) in &self.0 {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value}")?;
            first = false;
        }
        Ok(())
    }
}

impl FromIterator<(String, f64)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
