//! Parameter grid declaration, enumeration, and constraints.
//!
//! A grid is an ordered list of named axes. Enumeration is the Cartesian
//! product with the first declared axis outermost and the last axis varying
//! fastest, so the enumeration index of a combination is stable for a given
//! declaration.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crosslab_core::strategy::{ParameterSet, StrategyParams, PARAM_NAMES};

/// Tolerance for float-range end exclusion, so `0.0..0.3 step 0.1` has three
/// values despite rounding in `(end - start) / step`.
const RANGE_EPSILON: f64 = 1e-9;

#[derive(Debug, Error, PartialEq)]
pub enum GridError {
    #[error("axis '{0}' has an empty domain")]
    EmptyDomain(String),
    #[error("axis '{0}' has a non-positive step")]
    NonPositiveStep(String),
    #[error("axis '{0}' contains a non-finite value")]
    NonFiniteValue(String),
    #[error("axis '{0}' is declared more than once")]
    DuplicateAxis(String),
    #[error("axis '{0}' is not a strategy parameter")]
    UnknownParameter(String),
}

/// Values one parameter may take.
///
/// Ranges exclude `end`, like Python `range` / `numpy.arange`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParamDomain {
    IntRange { start: i64, end: i64, step: i64 },
    FloatRange { start: f64, end: f64, step: f64 },
    List { values: Vec<f64> },
}

impl ParamDomain {
    pub fn values(&self) -> Vec<f64> {
        match *self {
            Self::IntRange { start, end, step } => {
                if step <= 0 || end <= start {
                    return Vec::new();
                }
                (start..end).step_by(step as usize).map(|v| v as f64).collect()
            }
            Self::FloatRange { start, end, step } => {
                if !(step > 0.0) || !(end > start) {
                    return Vec::new();
                }
                let count = ((end - start) / step - RANGE_EPSILON).ceil().max(0.0) as usize;
                (0..count).map(|i| start + i as f64 * step).collect()
            }
            Self::List { ref values } => values.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.values().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn has_positive_step(&self) -> bool {
        match *self {
            Self::IntRange { step, .. } => step > 0,
            Self::FloatRange { step, .. } => step > 0.0,
            Self::List { .. } => true,
        }
    }
}

/// One named axis of the grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamAxis {
    pub name: String,
    #[serde(flatten)]
    pub domain: ParamDomain,
}

impl ParamAxis {
    pub fn new(name: impl Into<String>, domain: ParamDomain) -> Self {
        Self {
            name: name.into(),
            domain,
        }
    }

    pub fn int_range(name: impl Into<String>, start: i64, end: i64, step: i64) -> Self {
        Self::new(name, ParamDomain::IntRange { start, end, step })
    }

    pub fn float_range(name: impl Into<String>, start: f64, end: f64, step: f64) -> Self {
        Self::new(name, ParamDomain::FloatRange { start, end, step })
    }

    pub fn list(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self::new(name, ParamDomain::List { values })
    }
}

/// Declared search space.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    pub axes: Vec<ParamAxis>,
}

impl ParamGrid {
    pub fn new(axes: Vec<ParamAxis>) -> Self {
        Self { axes }
    }

    pub fn with_axis(mut self, axis: ParamAxis) -> Self {
        self.axes.push(axis);
        self
    }

    /// The optimisation ranges of the reference RSI/EMA/ATR study.
    pub fn reference() -> Self {
        Self::new(vec![
            ParamAxis::int_range("rsi_period", 10, 30, 5),
            ParamAxis::int_range("rsi_overbought", 60, 90, 5),
            ParamAxis::int_range("rsi_oversold", 10, 40, 5),
            ParamAxis::int_range("ema_short", 5, 20, 5),
            ParamAxis::int_range("ema_long", 30, 100, 10),
            ParamAxis::int_range("atr_period", 10, 30, 5),
            ParamAxis::list("risk_per_trade", vec![0.01, 0.02, 0.03, 0.04]),
        ])
    }

    pub fn validate(&self) -> Result<(), GridError> {
        let mut seen = HashSet::new();
        for axis in &self.axes {
            if !PARAM_NAMES.contains(&axis.name.as_str()) {
                return Err(GridError::UnknownParameter(axis.name.clone()));
            }
            if !seen.insert(axis.name.as_str()) {
                return Err(GridError::DuplicateAxis(axis.name.clone()));
            }
            if !axis.domain.has_positive_step() {
                return Err(GridError::NonPositiveStep(axis.name.clone()));
            }
            let values = axis.domain.values();
            if values.is_empty() {
                return Err(GridError::EmptyDomain(axis.name.clone()));
            }
            if values.iter().any(|v| !v.is_finite()) {
                return Err(GridError::NonFiniteValue(axis.name.clone()));
            }
        }
        Ok(())
    }

    /// Number of combinations before constraint filtering.
    pub fn len(&self) -> usize {
        self.axes.iter().map(|a| a.domain.len()).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every combination in enumeration order. A grid without axes yields a
    /// single empty set (the base parameters alone).
    pub fn combinations(&self) -> Vec<ParameterSet> {
        self.axes.iter().fold(vec![ParameterSet::new()], |acc, axis| {
            let values = axis.domain.values();
            acc.into_iter()
                .flat_map(|set| {
                    values
                        .iter()
                        .map(move |&v| set.clone().with(axis.name.clone(), v))
                })
                .collect()
        })
    }

    /// Largest indicator period any combination can produce on top of `base`.
    pub fn max_period(&self, base: &StrategyParams) -> usize {
        let base_set = base.to_parameter_set();
        ["rsi_period", "ema_short", "ema_long", "atr_period"]
            .iter()
            .map(|&name| {
                let from_grid = self
                    .axes
                    .iter()
                    .filter(|a| a.name == name)
                    .flat_map(|a| a.domain.values())
                    .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.max(v))));
                from_grid
                    .or_else(|| base_set.get(name))
                    .map_or(0, |v| v.max(0.0) as usize)
            })
            .max()
            .unwrap_or(0)
    }
}

/// Predicate over a full parameter set (base values overlaid with a grid point).
pub trait Constraint: Send + Sync {
    fn allows(&self, params: &ParameterSet) -> bool;
}

impl<F> Constraint for F
where
    F: Fn(&ParameterSet) -> bool + Send + Sync,
{
    fn allows(&self, params: &ParameterSet) -> bool {
        self(params)
    }
}

/// Declarative constraints, usable from configuration files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConstraintSpec {
    /// `left < right`. Fails when either name is absent.
    LessThan { left: String, right: String },
}

impl ConstraintSpec {
    pub fn less_than(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self::LessThan {
            left: left.into(),
            right: right.into(),
        }
    }

    /// Parameter names this constraint reads.
    pub fn names(&self) -> [&str; 2] {
        match self {
            Self::LessThan { left, right } => [left.as_str(), right.as_str()],
        }
    }
}

impl Constraint for ConstraintSpec {
    fn allows(&self, params: &ParameterSet) -> bool {
        match self {
            Self::LessThan { left, right } => match (params.get(left), params.get(right)) {
                (Some(l), Some(r)) => l < r,
                _ => false,
            },
        }
    }
}
