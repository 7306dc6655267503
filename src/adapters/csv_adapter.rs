//! CSV kline file data adapter.
//!
//! Files carry the header `open_time,open,high,low,close,volume`.
//! `open_time` is either epoch milliseconds (exchange kline exports) or an
//! RFC 3339 timestamp.

use crate::domain::candle::{Candle, PriceSeries};
use crate::domain::error::RevtraderError;
use crate::ports::data_port::DataPort;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct CandleRow {
    open_time: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

enum Source {
    /// `<dir>/<SYMBOL>_<interval>.csv`
    Directory(PathBuf),
    /// One file, whatever symbol is asked for.
    File(PathBuf),
}

pub struct CsvAdapter {
    source: Source,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self {
            source: Source::Directory(base_path),
        }
    }

    pub fn from_file(path: PathBuf) -> Self {
        Self {
            source: Source::File(path),
        }
    }

    /// Directory adapter for a directory, single-file adapter otherwise.
    pub fn for_path(path: PathBuf) -> Self {
        if path.is_dir() {
            Self::new(path)
        } else {
            Self::from_file(path)
        }
    }

    fn csv_path(&self, symbol: &str, interval: &str) -> PathBuf {
        match &self.source {
            Source::Directory(base) => base.join(format!("{}_{}.csv", symbol, interval)),
            Source::File(path) => path.clone(),
        }
    }

    fn read_candles(path: &Path) -> Result<Vec<Candle>, RevtraderError> {
        let content = fs::read_to_string(path).map_err(|e| RevtraderError::DataSource {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let mut candles = Vec::new();

        for (line, result) in rdr.deserialize::<CandleRow>().enumerate() {
            let row = result.map_err(|e| RevtraderError::DataSource {
                reason: format!("{}: CSV parse error: {}", path.display(), e),
            })?;
            let open_time =
                parse_open_time(&row.open_time).ok_or_else(|| RevtraderError::DataSource {
                    reason: format!(
                        "{}: row {}: invalid open_time '{}'",
                        path.display(),
                        line + 1,
                        row.open_time
                    ),
                })?;
            candles.push(Candle {
                open_time,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            });
        }

        candles.sort_by_key(|c| c.open_time);
        Ok(candles)
    }
}

/// Epoch milliseconds or RFC 3339.
fn parse_open_time(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(millis) = raw.parse::<i64>() {
        return DateTime::from_timestamp_millis(millis);
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

impl DataPort for CsvAdapter {
    fn fetch_candles(&self, symbol: &str, interval: &str) -> Result<PriceSeries, RevtraderError> {
        let path = self.csv_path(symbol, interval);
        let candles = Self::read_candles(&path)?;
        if candles.is_empty() {
            return Err(RevtraderError::NoData {
                symbol: symbol.to_string(),
                interval: interval.to_string(),
            });
        }
        tracing::debug!(path = %path.display(), candles = candles.len(), "loaded candles");
        PriceSeries::new(candles)
    }

    fn list_symbols(&self, interval: &str) -> Result<Vec<String>, RevtraderError> {
        let base = match &self.source {
            Source::Directory(base) => base,
            Source::File(path) => {
                let stem = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                return Ok(vec![stem]);
            }
        };

        let entries = fs::read_dir(base).map_err(|e| RevtraderError::DataSource {
            reason: format!("failed to read directory {}: {}", base.display(), e),
        })?;

        let suffix = format!("_{}.csv", interval);
        let mut symbols = Vec::new();

        for entry in entries {
            let entry = entry.map_err(|e| RevtraderError::DataSource {
                reason: format!("directory entry error: {}", e),
            })?;

            let name = entry.file_name();
            let name_str = name.to_string_lossy();

            if let Some(symbol) = name_str.strip_suffix(&suffix) {
                symbols.push(symbol.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }

    fn data_range(
        &self,
        symbol: &str,
        interval: &str,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>, usize)>, RevtraderError> {
        let path = self.csv_path(symbol, interval);
        if !path.exists() {
            return Ok(None);
        }
        let candles = Self::read_candles(&path)?;
        Ok(match (candles.first(), candles.last()) {
            (Some(first), Some(last)) => Some((first.open_time, last.open_time, candles.len())),
            _ => None,
        })
    }
}
