//! Bar loop driving the Flat/Long state machine.

use tracing::debug;

use crate::components::indicator::{IndicatorRole, IndicatorValues};
use crate::components::signal::{Signal, SignalEngine};
use crate::domain::{Bar, EquityCurve, ExitReason, Position};
use crate::sizers::AtrRiskSizer;
use crate::strategy::StrategyParams;

use super::accounting::Ledger;
use super::state::{EngineConfig, PositionState, RunResult};

/// Why an EnterLong did not open a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Suppression {
    FinalBar,
    VolatilityUndefined,
    DegenerateSizing,
    ZeroSize,
}

/// Single-instrument, long-only simulator.
///
/// Holds only configuration; every `run` starts from fresh cash and a Flat
/// state, so one simulator can be shared across threads.
#[derive(Debug, Clone)]
pub struct ExecutionSimulator {
    config: EngineConfig,
    signals: SignalEngine,
    sizer: AtrRiskSizer,
}

impl ExecutionSimulator {
    pub fn new(config: EngineConfig, signals: SignalEngine, sizer: AtrRiskSizer) -> Self {
        Self {
            config,
            signals,
            sizer,
        }
    }

    pub fn from_params(config: EngineConfig, params: &StrategyParams) -> Self {
        Self::new(
            config,
            SignalEngine::from_params(params),
            AtrRiskSizer::from_params(params),
        )
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Simulate the whole window. Bars must already be validated and the
    /// indicator series aligned with them.
    pub fn run(&self, bars: &[Bar], indicators: &IndicatorValues) -> RunResult {
        let mut ledger = Ledger::new(self.config.starting_cash, self.config.commission_rate);
        let mut state = PositionState::Flat;
        let mut result = RunResult {
            equity_curve: EquityCurve::with_capacity(bars.len()),
            ..RunResult::default()
        };
        let last = bars.len().saturating_sub(1);

        for (i, bar) in bars.iter().enumerate() {
            let signal = self.signals.evaluate(i, indicators);
            if signal != Signal::Hold {
                result.signal_count += 1;
            }

            state = match state {
                PositionState::Long(pos) if pos.is_stopped_out(bar) => {
                    let stop = pos.stop_loss;
                    result
                        .trades
                        .push(ledger.close(pos, i, bar.timestamp, stop, ExitReason::StopLoss));
                    PositionState::Flat
                }
                PositionState::Long(pos) if signal == Signal::ExitLong => {
                    result
                        .trades
                        .push(ledger.close(pos, i, bar.timestamp, bar.close, ExitReason::Signal));
                    PositionState::Flat
                }
                PositionState::Long(pos) if i == last => {
                    result.trades.push(ledger.close(
                        pos,
                        i,
                        bar.timestamp,
                        bar.close,
                        ExitReason::EndOfWindow,
                    ));
                    PositionState::Flat
                }
                PositionState::Flat if signal == Signal::EnterLong => {
                    match self.try_enter(&mut ledger, i, bar, last, indicators) {
                        Ok(pos) => PositionState::Long(pos),
                        Err(reason) => {
                            debug!(bar = i, timestamp = %bar.timestamp, ?reason, "entry suppressed");
                            result.suppressed_entries += 1;
                            PositionState::Flat
                        }
                    }
                }
                unchanged => unchanged,
            };

            if state.is_long() {
                result.bars_in_market += 1;
            }
            result
                .equity_curve
                .push(bar.timestamp, ledger.equity(state.position(), bar.close));
        }

        result
    }

    fn try_enter(
        &self,
        ledger: &mut Ledger,
        index: usize,
        bar: &Bar,
        last: usize,
        indicators: &IndicatorValues,
    ) -> Result<Position, Suppression> {
        if index == last {
            return Err(Suppression::FinalBar);
        }
        let atr = indicators
            .defined(IndicatorRole::Volatility, index)
            .ok_or(Suppression::VolatilityUndefined)?;
        let stop_loss = self.sizer.stop_loss(bar.close, atr);
        let size = self
            .sizer
            .size(ledger.cash(), bar.close, stop_loss)
            .map_err(|_| Suppression::DegenerateSizing)?
            .min(ledger.affordable_size(bar.close));
        if size <= 0.0 {
            return Err(Suppression::ZeroSize);
        }
        Ok(ledger.open(index, bar, size, stop_loss))
    }
}
