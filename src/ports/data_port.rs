//! Data access port trait.

use crate::domain::candle::PriceSeries;
use crate::domain::error::RevtraderError;
use chrono::{DateTime, Utc};

pub trait DataPort {
    /// Full candle history for `symbol` at `interval`.
    ///
    /// An empty source is `NoData`; the core never runs on an empty series.
    fn fetch_candles(&self, symbol: &str, interval: &str) -> Result<PriceSeries, RevtraderError>;

    fn list_symbols(&self, interval: &str) -> Result<Vec<String>, RevtraderError>;

    /// First and last `open_time` plus candle count, or `None` if nothing is stored.
    fn data_range(
        &self,
        symbol: &str,
        interval: &str,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>, usize)>, RevtraderError>;
}
