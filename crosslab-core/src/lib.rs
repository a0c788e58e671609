//! CrossLab Core: domain types, indicators, signal rule, sizing, and the
//! bar-by-bar execution simulator.
//!
//! This crate contains the single-run engine:
//! - Domain types (bars, positions, trades, equity curves) and bar validation
//! - The indicator contract plus default EMA / RSI / ATR implementations
//! - Typed strategy parameters and grid parameter sets
//! - The crossover + oscillator signal rule
//! - ATR risk sizing
//! - The Flat/Long execution simulator

pub mod components;
pub mod domain;
pub mod engine;
pub mod indicators;
pub mod sizers;
pub mod strategy;

pub use components::{
    IndicatorError, IndicatorPipeline, IndicatorRole, IndicatorValues, Signal, SignalEngine,
};
pub use domain::{validate_bars, Bar, BarError, EquityCurve, ExitReason, Position, Trade};
pub use engine::{EngineConfig, ExecutionSimulator, RunResult};
pub use indicators::StandardPipeline;
pub use sizers::{AtrRiskSizer, SizingError};
pub use strategy::{ParamError, ParameterSet, StrategyParams};
