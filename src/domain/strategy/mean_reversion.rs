//! Mean reversion: buy a dip below the trailing mean, sell the rebound.
//!
//! mean = SMA(close, lookback), current candle included
//! Flat:       (mean - close) / mean >= drop_threshold         => Buy
//! Positioned: (close - entry) / entry >= rebound_threshold    => Sell
//! Warmup: fewer than `lookback` candles => Hold.

use super::{pct_change, StrategyEngine, StrategyState};
use crate::domain::candle::SeriesView;
use crate::domain::signal::Signal;

pub const NAME: &str = "mean_reversion";

pub const DEFAULT_LOOKBACK: usize = 20;
pub const DEFAULT_DROP_PCT: f64 = 1.0;
pub const DEFAULT_REBOUND_PCT: f64 = 3.0;

#[derive(Debug, Clone, PartialEq)]
pub struct MeanReversionParams {
    pub lookback: usize,
    /// Fraction, e.g. 0.05 for a 5% dip.
    pub drop_threshold: f64,
    /// Fraction, e.g. 0.10 for a 10% rebound.
    pub rebound_threshold: f64,
}

impl MeanReversionParams {
    /// Thresholds given in percent, as they appear in config files.
    pub fn from_percentages(lookback: usize, drop_pct: f64, rebound_pct: f64) -> Self {
        Self {
            lookback,
            drop_threshold: drop_pct / 100.0,
            rebound_threshold: rebound_pct / 100.0,
        }
    }
}

impl Default for MeanReversionParams {
    fn default() -> Self {
        Self::from_percentages(DEFAULT_LOOKBACK, DEFAULT_DROP_PCT, DEFAULT_REBOUND_PCT)
    }
}

/// A zero trailing mean yields Hold, even with a zero `drop_threshold`.
#[derive(Debug, Clone)]
pub struct MeanReversionEngine {
    params: MeanReversionParams,
    state: StrategyState,
}

impl MeanReversionEngine {
    pub fn new(params: MeanReversionParams) -> Self {
        Self {
            params,
            state: StrategyState::default(),
        }
    }

    pub fn params(&self) -> &MeanReversionParams {
        &self.params
    }
}

fn mean_close(window: &[crate::domain::candle::Candle]) -> f64 {
    window.iter().map(|c| c.close).sum::<f64>() / window.len() as f64
}

impl StrategyEngine for MeanReversionEngine {
    fn name(&self) -> &'static str {
        NAME
    }

    fn decide(&mut self, prefix: &SeriesView<'_>) -> Signal {
        let lookback = self.params.lookback.max(1);
        let Some(window) = prefix.trailing(lookback) else {
            return Signal::Hold;
        };
        let close = prefix.current().close;

        if !self.state.positioned {
            let mean = mean_close(window);
            let drop_pct = match pct_change(mean, close) {
                Some(change) => -change,
                None => {
                    tracing::warn!(
                        open_time = %prefix.current().open_time,
                        "trailing mean is zero, holding"
                    );
                    return Signal::Hold;
                }
            };
            if drop_pct >= self.params.drop_threshold {
                self.state.enter(close);
                return Signal::Buy;
            }
        } else {
            let entry = self.state.entry_price.unwrap_or(0.0);
            let Some(gain_pct) = pct_change(entry, close) else {
                tracing::warn!(
                    open_time = %prefix.current().open_time,
                    "entry price is zero, holding"
                );
                return Signal::Hold;
            };
            if gain_pct >= self.params.rebound_threshold {
                self.state.exit();
                return Signal::Sell;
            }
        }

        Signal::Hold
    }

    fn state(&self) -> &StrategyState {
        &self.state
    }
}
