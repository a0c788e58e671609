//! CSV bar loading.
//!
//! Reads an OHLCV file with a header row. Column names are matched
//! case-insensitively; the timestamp column may be called `timestamp`,
//! `datetime`, `date` or `time`. Extra columns (e.g. `adj close`) are
//! ignored and a missing `volume` column reads as zero.
//!
//! Accepted timestamp forms: RFC 3339, `YYYY-MM-DD HH:MM:SS`,
//! `YYYY-MM-DDTHH:MM:SS`, `YYYY-MM-DD`, and integer Unix epochs in seconds
//! or milliseconds.
//!
//! Loaded bars are validated: rows must already be in strictly increasing
//! timestamp order. Nothing is sorted or deduplicated silently.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use thiserror::Error;
use tracing::debug;

use crosslab_core::domain::{validate_bars, Bar, BarError};

/// Epoch values at or above this magnitude are read as milliseconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

const TIMESTAMP_COLUMNS: [&str; 4] = ["timestamp", "datetime", "date", "time"];

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("missing required column '{0}'")]
    MissingColumn(&'static str),
    #[error("line {line}: invalid {field} value '{value}'")]
    InvalidField {
        line: u64,
        field: &'static str,
        value: String,
    },
    #[error("input contains no bars")]
    Empty,
    #[error("invalid bar sequence: {0}")]
    Bars(#[from] BarError),
}

/// Column positions resolved from the header row.
struct Columns {
    timestamp: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: Option<usize>,
}

impl Columns {
    fn resolve(headers: &csv::StringRecord) -> Result<Self, LoadError> {
        let names: Vec<String> = headers.iter().map(|h| h.trim().to_ascii_lowercase()).collect();
        let find = |name: &str| names.iter().position(|n| n == name);
        let require = |name: &'static str| find(name).ok_or(LoadError::MissingColumn(name));

        let timestamp = TIMESTAMP_COLUMNS
            .iter()
            .find_map(|name| find(*name))
            .ok_or(LoadError::MissingColumn("timestamp"))?;

        Ok(Self {
            timestamp,
            open: require("open")?,
            high: require("high")?,
            low: require("low")?,
            close: require("close")?,
            volume: find("volume"),
        })
    }
}

/// Load and validate bars from a CSV file.
pub fn load_csv(path: impl AsRef<Path>) -> Result<Vec<Bar>, LoadError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| LoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let bars = read_bars(file)?;
    debug!(path = %path.display(), bars = bars.len(), "loaded bars");
    Ok(bars)
}

/// Read and validate bars from any CSV source.
pub fn read_bars<R: Read>(source: R) -> Result<Vec<Bar>, LoadError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(source);
    let columns = Columns::resolve(reader.headers()?)?;

    let mut bars = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        // Header is line 1.
        let line = record.position().map_or(i as u64 + 2, |p| p.line());
        let field = |index: usize| record.get(index).unwrap_or("");

        let raw_ts = field(columns.timestamp);
        let timestamp = parse_timestamp(raw_ts).ok_or_else(|| LoadError::InvalidField {
            line,
            field: "timestamp",
            value: raw_ts.to_string(),
        })?;
        let number = |name: &'static str, index: usize| -> Result<f64, LoadError> {
            let raw = field(index);
            raw.parse::<f64>().map_err(|_| LoadError::InvalidField {
                line,
                field: name,
                value: raw.to_string(),
            })
        };

        bars.push(Bar::new(
            timestamp,
            number("open", columns.open)?,
            number("high", columns.high)?,
            number("low", columns.low)?,
            number("close", columns.close)?,
            match columns.volume {
                Some(index) => number("volume", index)?,
                None => 0.0,
            },
        ));
    }

    if bars.is_empty() {
        return Err(LoadError::Empty);
    }
    validate_bars(&bars)?;
    Ok(bars)
}

/// Parse one timestamp cell. See the module docs for accepted forms.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(epoch) = raw.parse::<i64>() {
        let dt = if epoch.abs() >= EPOCH_MILLIS_THRESHOLD {
            DateTime::from_timestamp_millis(epoch)
        } else {
            DateTime::from_timestamp(epoch, 0)
        };
        return dt.map(|d| d.naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
