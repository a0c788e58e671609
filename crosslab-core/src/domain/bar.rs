//! Bar: the fundamental market data unit.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One OHLCV observation for a fixed interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(
        timestamp: NaiveDateTime,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Basic OHLCV sanity check: finite positive prices, high/low bracket the
    /// open and close, non-negative volume.
    pub fn is_sane(&self) -> bool {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return false;
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
    }
}

/// Input validation failures. All of them are fatal: the simulator's causality
/// bookkeeping assumes strictly ordered, well-formed bars.
#[derive(Debug, Error, PartialEq)]
pub enum BarError {
    #[error("duplicate timestamp {timestamp} at bar {index}")]
    DuplicateTimestamp {
        index: usize,
        timestamp: NaiveDateTime,
    },
    #[error("timestamp {current} at bar {index} precedes previous bar ({previous})")]
    NonMonotonicTimestamp {
        index: usize,
        previous: NaiveDateTime,
        current: NaiveDateTime,
    },
    #[error("malformed OHLCV values at bar {index} ({timestamp})")]
    Malformed {
        index: usize,
        timestamp: NaiveDateTime,
    },
}

/// Validate ordering and sanity of a bar series before simulation.
///
/// An empty series is valid; window-length requirements are checked by callers.
pub fn validate_bars(bars: &[Bar]) -> Result<(), BarError> {
    for (index, bar) in bars.iter().enumerate() {
        if !bar.is_sane() {
            return Err(BarError::Malformed {
                index,
                timestamp: bar.timestamp,
            });
        }
        if index == 0 {
            continue;
        }
        let previous = bars[index - 1].timestamp;
        if bar.timestamp == previous {
            return Err(BarError::DuplicateTimestamp {
                index,
                timestamp: bar.timestamp,
            });
        }
        if bar.timestamp < previous {
            return Err(BarError::NonMonotonicTimestamp {
                index,
                previous,
                current: bar.timestamp,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn ts(day: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::days(day)
    }

    fn sample_bar(day: i64) -> Bar {
        Bar::new(ts(day), 100.0, 105.0, 98.0, 103.0, 50_000.0)
    }

    #[test]
    fn bar_is_sane() {
        assert!(sample_bar(0).is_sane());
    }

    #[test]
    fn bar_rejects_inverted_range() {
        let mut bar = sample_bar(0);
        bar.high = 97.0;
        assert!(!bar.is_sane());
    }

    #[test]
    fn bar_rejects_non_positive_price_and_negative_volume() {
        let mut bar = sample_bar(0);
        bar.low = 0.0;
        assert!(!bar.is_sane());

        let mut bar = sample_bar(0);
        bar.volume = -1.0;
        assert!(!bar.is_sane());

        let mut bar = sample_bar(0);
        bar.close = f64::NAN;
        assert!(!bar.is_sane());
    }

    #[test]
    fn validate_accepts_ordered_series() {
        let bars: Vec<Bar> = (0..5).map(sample_bar).collect();
        assert_eq!(validate_bars(&bars), Ok(()));
        assert_eq!(validate_bars(&[]), Ok(()));
    }

    #[test]
    fn validate_rejects_duplicate_timestamp() {
        let bars = vec![sample_bar(0), sample_bar(1), sample_bar(1)];
        assert_eq!(
            validate_bars(&bars),
            Err(BarError::DuplicateTimestamp {
                index: 2,
                timestamp: ts(1)
            })
        );
    }

    #[test]
    fn validate_rejects_out_of_order_timestamp() {
        let bars = vec![sample_bar(0), sample_bar(2), sample_bar(1)];
        assert!(matches!(
            validate_bars(&bars),
            Err(BarError::NonMonotonicTimestamp { index: 2, .. })
        ));
    }

    #[test]
    fn validate_rejects_malformed_bar() {
        let mut bars: Vec<Bar> = (0..3).map(sample_bar).collect();
        bars[1].open = -5.0;
        assert!(matches!(
            validate_bars(&bars),
            Err(BarError::Malformed { index: 1, .. })
        ));
    }
}
