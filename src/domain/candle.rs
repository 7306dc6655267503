//! OHLCV candles and the time-ordered price series built from them.

use chrono::{DateTime, Utc};

use super::error::RevtraderError;

#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// high - low
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    fn fields(&self) -> [(&'static str, f64); 5] {
        [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
            ("volume", self.volume),
        ]
    }
}

/// Immutable, strictly time-ordered candle sequence.
///
/// The only way to build one is [`PriceSeries::new`], which rejects empty
/// input, non-increasing `open_time`s and negative or non-finite values.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    candles: Vec<Candle>,
}

impl PriceSeries {
    pub fn new(candles: Vec<Candle>) -> Result<Self, RevtraderError> {
        if candles.is_empty() {
            return Err(RevtraderError::InvalidPriceSeries {
                reason: "series is empty".into(),
            });
        }

        for (i, candle) in candles.iter().enumerate() {
            for (name, value) in candle.fields() {
                if !value.is_finite() || value < 0.0 {
                    return Err(RevtraderError::InvalidPriceSeries {
                        reason: format!("candle {i} has invalid {name} value {value}"),
                    });
                }
            }
        }

        if let Some(i) = candles
            .windows(2)
            .position(|w| w[1].open_time <= w[0].open_time)
        {
            return Err(RevtraderError::InvalidPriceSeries {
                reason: format!(
                    "open_time {} at index {} does not follow {}",
                    candles[i + 1].open_time,
                    i + 1,
                    candles[i].open_time
                ),
            });
        }

        Ok(Self { candles })
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    /// Always false for a constructed series; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn get(&self, index: usize) -> Option<&Candle> {
        self.candles.get(index)
    }

    pub fn first(&self) -> &Candle {
        &self.candles[0]
    }

    pub fn last(&self) -> &Candle {
        &self.candles[self.candles.len() - 1]
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    /// View of candles `0..=index`. `None` when `index` is past the end.
    pub fn prefix_through(&self, index: usize) -> Option<SeriesView<'_>> {
        if index >= self.candles.len() {
            return None;
        }
        Some(SeriesView {
            candles: &self.candles[..=index],
        })
    }

    /// Copy of the first `len` candles as a new series.
    pub fn truncated(&self, len: usize) -> Result<Self, RevtraderError> {
        let len = len.min(self.candles.len());
        Self::new(self.candles[..len].to_vec())
    }
}

/// Borrowed, non-empty prefix of a [`PriceSeries`].
///
/// Holds no reference to candles after the current one, so a strategy
/// reading a view cannot observe the future.
#[derive(Debug, Clone, Copy)]
pub struct SeriesView<'a> {
    candles: &'a [Candle],
}

impl<'a> SeriesView<'a> {
    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn candles(&self) -> &'a [Candle] {
        self.candles
    }

    /// The candle being decided on.
    pub fn current(&self) -> &'a Candle {
        &self.candles[self.candles.len() - 1]
    }

    pub fn previous(&self) -> Option<&'a Candle> {
        self.candles.len().checked_sub(2).map(|i| &self.candles[i])
    }

    /// The last `n` candles, current included. `None` when fewer exist.
    pub fn trailing(&self, n: usize) -> Option<&'a [Candle]> {
        if n > self.candles.len() {
            return None;
        }
        Some(&self.candles[self.candles.len() - n..])
    }

    pub fn closes(&self) -> impl Iterator<Item = f64> + 'a {
        self.candles.iter().map(|c| c.close)
    }
}
