//! Cash ledger: applies entry and exit fills, charges commission, and marks
//! equity to market.

use chrono::NaiveDateTime;

use crate::domain::{Bar, ExitReason, Position, Trade};

#[derive(Debug, Clone)]
pub struct Ledger {
    cash: f64,
    commission_rate: f64,
    commission_paid: f64,
}

impl Ledger {
    pub fn new(starting_cash: f64, commission_rate: f64) -> Self {
        Self {
            cash: starting_cash,
            commission_rate,
            commission_paid: 0.0,
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn commission_paid(&self) -> f64 {
        self.commission_paid
    }

    /// Largest quantity whose notional plus entry commission fits in cash.
    pub fn affordable_size(&self, price: f64) -> f64 {
        (self.cash / (price * (1.0 + self.commission_rate))).max(0.0)
    }

    /// Buy `size` at the bar close.
    pub fn open(&mut self, bar_index: usize, bar: &Bar, size: f64, stop_loss: f64) -> Position {
        let notional = size * bar.close;
        let commission = notional * self.commission_rate;
        self.cash -= notional + commission;
        self.commission_paid += commission;
        Position {
            entry_bar: bar_index,
            entry_timestamp: bar.timestamp,
            entry_price: bar.close,
            size,
            stop_loss,
            entry_commission: commission,
        }
    }

    /// Sell the whole position at `price` and realize the trade.
    pub fn close(
        &mut self,
        position: Position,
        exit_bar: usize,
        exit_timestamp: NaiveDateTime,
        price: f64,
        exit_reason: ExitReason,
    ) -> Trade {
        let notional = position.size * price;
        let exit_commission = notional * self.commission_rate;
        self.cash += notional - exit_commission;
        self.commission_paid += exit_commission;

        let gross_pnl = position.unrealized_pnl(price);
        let commission = position.entry_commission + exit_commission;
        Trade {
            entry_bar: position.entry_bar,
            entry_timestamp: position.entry_timestamp,
            entry_price: position.entry_price,
            exit_bar,
            exit_timestamp,
            exit_price: price,
            exit_reason,
            size: position.size,
            stop_loss: position.stop_loss,
            gross_pnl,
            commission,
            net_pnl: gross_pnl - commission,
        }
    }

    /// Cash plus the open position marked at `close`.
    pub fn equity(&self, position: Option<&Position>, close: f64) -> f64 {
        self.cash + position.map_or(0.0, |p| p.market_value(close))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bar(day: u32, close: f64) -> Bar {
        let ts = NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        Bar::new(ts, close, close + 1.0, close - 1.0, close, 100.0)
    }

    #[test]
    fn round_trip_charges_commission_on_both_legs() {
        let mut ledger = Ledger::new(10_000.0, 0.01);
        let entry = bar(1, 100.0);
        let pos = ledger.open(0, &entry, 10.0, 95.0);
        assert!((ledger.cash() - (10_000.0 - 1_000.0 - 10.0)).abs() < 1e-9);
        assert!((ledger.equity(Some(&pos), 100.0) - 9_990.0).abs() < 1e-9);

        let exit = bar(2, 110.0);
        let trade = ledger.close(pos, 1, exit.timestamp, 110.0, ExitReason::Signal);
        assert!((trade.gross_pnl - 100.0).abs() < 1e-9);
        assert!((trade.commission - 21.0).abs() < 1e-9);
        assert!((trade.net_pnl - 79.0).abs() < 1e-9);
        assert!((ledger.cash() - 10_079.0).abs() < 1e-9);
        assert!((ledger.commission_paid() - 21.0).abs() < 1e-9);
    }

    #[test]
    fn zero_commission_flat_price_round_trip_preserves_equity() {
        let mut ledger = Ledger::new(5_000.0, 0.0);
        let pos = ledger.open(0, &bar(1, 50.0), 20.0, 45.0);
        let trade = ledger.close(pos, 1, bar(2, 50.0).timestamp, 50.0, ExitReason::Signal);
        assert_eq!(trade.net_pnl, 0.0);
        assert_eq!(ledger.equity(None, 50.0), 5_000.0);
    }

    #[test]
    fn affordable_size_includes_commission() {
        let ledger = Ledger::new(1_002.0, 0.002);
        assert!((ledger.affordable_size(100.0) - 10.0).abs() < 1e-9);
    }
}
