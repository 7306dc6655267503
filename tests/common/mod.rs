#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
pub use revtrader::domain::candle::{Candle, PriceSeries};
use revtrader::domain::error::RevtraderError;
use revtrader::ports::data_port::DataPort;
use std::collections::HashMap;

pub const BASE_TS: i64 = 1_704_067_200; // 2024-01-01T00:00:00Z

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Candle>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_candles(mut self, symbol: &str, candles: Vec<Candle>) -> Self {
        self.data.insert(symbol.to_string(), candles);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_candles(&self, symbol: &str, interval: &str) -> Result<PriceSeries, RevtraderError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(RevtraderError::DataSource {
                reason: reason.clone(),
            });
        }
        match self.data.get(symbol) {
            Some(candles) if !candles.is_empty() => PriceSeries::new(candles.clone()),
            _ => Err(RevtraderError::NoData {
                symbol: symbol.to_string(),
                interval: interval.to_string(),
            }),
        }
    }

    fn list_symbols(&self, _interval: &str) -> Result<Vec<String>, RevtraderError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }

    fn data_range(
        &self,
        symbol: &str,
        _interval: &str,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>, usize)>, RevtraderError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(RevtraderError::DataSource {
                reason: reason.clone(),
            });
        }
        Ok(self.data.get(symbol).and_then(|candles| {
            let first = candles.first()?;
            let last = candles.last()?;
            Some((first.open_time, last.open_time, candles.len()))
        }))
    }
}

pub fn ts(hour: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(BASE_TS + hour * 3600, 0).unwrap()
}

pub fn make_candle(hour: i64, close: f64) -> Candle {
    Candle {
        open_time: ts(hour),
        open: close,
        high: close * 1.01,
        low: close * 0.99,
        close,
        volume: 1000.0,
    }
}

pub fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| make_candle(i as i64, close))
        .collect()
}

pub fn series_from_closes(closes: &[f64]) -> PriceSeries {
    PriceSeries::new(candles_from_closes(closes)).unwrap()
}

/// Deterministic choppy price path with repeated dips and rebounds.
pub fn choppy_closes(count: usize) -> Vec<f64> {
    (0..count)
        .map(|i| {
            let t = i as f64;
            100.0 + 6.0 * (t * 0.45).sin() + 2.5 * (t * 1.3).cos() + (i % 5) as f64 * 0.3
        })
        .collect()
}

/// CSV text in the kline file format, epoch-millisecond timestamps.
pub fn kline_csv(closes: &[f64]) -> String {
    let mut out = String::from("open_time,open,high,low,close,volume\n");
    for (i, &close) in closes.iter().enumerate() {
        out.push_str(&format!(
            "{},{},{},{},{},100\n",
            (BASE_TS + i as i64 * 3600) * 1000,
            close,
            close,
            close,
            close
        ));
    }
    out
}
