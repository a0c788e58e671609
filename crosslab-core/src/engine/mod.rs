//! Execution simulator: the bar-by-bar Flat/Long state machine.
//!
//! Consumes validated bars and precomputed indicator values and produces an
//! equity curve (one point per bar) and a trade log. Per bar exactly one
//! transition is evaluated from the state at the start of the bar:
//!
//! 1. Long and the bar low reaches the stop → exit at the stop price
//! 2. Long and ExitLong → exit at the close
//! 3. Flat and EnterLong → size by risk, open at the close
//! 4. Long on the final bar → force-close at the close
//!
//! Equity is recorded after the transition.

pub mod accounting;
pub mod loop_runner;
pub mod state;

pub use accounting::Ledger;
pub use loop_runner::ExecutionSimulator;
pub use state::{EngineConfig, PositionState, RunResult};
