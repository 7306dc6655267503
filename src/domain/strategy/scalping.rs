//! Grid scalping: buy a one-candle drop of `grid_size`, sell a rise of
//! `grid_size` over the buy price.

use super::{pct_change, StrategyEngine, StrategyState};
use crate::domain::candle::SeriesView;
use crate::domain::signal::Signal;

pub const NAME: &str = "scalping";

pub const DEFAULT_GRID_PCT: f64 = 0.2;

#[derive(Debug, Clone, PartialEq)]
pub struct ScalpingParams {
    /// Fraction, e.g. 0.002 for a 0.2% grid.
    pub grid_size: f64,
}

impl ScalpingParams {
    pub fn from_percentage(grid_size_pct: f64) -> Self {
        Self {
            grid_size: grid_size_pct / 100.0,
        }
    }
}

impl Default for ScalpingParams {
    fn default() -> Self {
        Self::from_percentage(DEFAULT_GRID_PCT)
    }
}

#[derive(Debug, Clone)]
pub struct ScalpingEngine {
    params: ScalpingParams,
    state: StrategyState,
}

impl ScalpingEngine {
    pub fn new(params: ScalpingParams) -> Self {
        Self {
            params,
            state: StrategyState::default(),
        }
    }

    pub fn params(&self) -> &ScalpingParams {
        &self.params
    }
}

impl StrategyEngine for ScalpingEngine {
    fn name(&self) -> &'static str {
        NAME
    }

    fn decide(&mut self, prefix: &SeriesView<'_>) -> Signal {
        let Some(prev) = prefix.previous() else {
            return Signal::Hold;
        };
        let current = prefix.current();

        if !self.state.positioned {
            let Some(change) = pct_change(prev.close, current.close) else {
                tracing::warn!(open_time = %current.open_time, "previous close is zero, holding");
                return Signal::Hold;
            };
            if -change >= self.params.grid_size {
                self.state.enter(current.close);
                return Signal::Buy;
            }
        } else {
            let buy_price = self.state.entry_price.unwrap_or(0.0);
            let Some(gain) = pct_change(buy_price, current.close) else {
                tracing::warn!(open_time = %current.open_time, "buy price is zero, holding");
                return Signal::Hold;
            };
            if gain >= self.params.grid_size {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::candle::{Candle, PriceSeries};
    use chrono::{TimeZone, Utc};

    fn series(closes: &[f64]) -> PriceSeries {
        let candles = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                open_time: Utc.timestamp_opt(1_700_000_000 + i as i64 * 60, 0).unwrap(),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1.0,
            })
            .collect();
        PriceSeries::new(candles).unwrap()
    }

    fn run(grid: f64, closes: &[f64]) -> (Vec<Signal>, ScalpingEngine) {
        let s = series(closes);
        let mut e = ScalpingEngine::new(ScalpingParams { grid_size: grid });
        let out = (0..s.len())
            .map(|i| e.decide(&s.prefix_through(i).unwrap()))
            .collect();
        (out, e)
    }

    #[test]
    fn single_candle_holds() {
        let (out, _) = run(0.01, &[100.0]);
        assert_eq!(out, vec![Signal::Hold]);
    }

    #[test]
    fn drop_then_rise() {
        let (out, e) = run(0.01, &[100.0, 98.0, 98.5, 99.0]);
        assert_eq!(
            out,
            vec![Signal::Hold, Signal::Buy, Signal::Hold, Signal::Sell]
        );
        assert!(!e.state().positioned);
    }

    #[test]
    fn sell_measured_from_buy_price_not_previous_close() {
        // 97 -> 98.9 is +1.96% on the candle but only +0.92% over the 98 buy.
        let (out, e) = run(0.01, &[100.0, 98.0, 97.0, 98.9, 99.0]);
        assert_eq!(out[2], Signal::Hold);
        assert_eq!(out[3], Signal::Hold);
        assert_eq!(out[4], Signal::Sell);
        assert_eq!(e.state().entry_price, None);
    }

    #[test]
    fn small_moves_hold() {
        let (out, e) = run(0.05, &[100.0, 99.0, 100.0, 99.5]);
        assert!(out.iter().all(|s| s.is_hold()));
        assert!(!e.state().positioned);
    }

    #[test]
    fn zero_previous_close_holds() {
        let (out, e) = run(0.01, &[0.0, 5.0]);
        assert_eq!(out, vec![Signal::Hold, Signal::Hold]);
        assert!(!e.state().positioned);
    }

    #[test]
    fn default_grid_from_settings_file() {
        assert!((ScalpingParams::default().grid_size - 0.002).abs() < 1e-12);
    }
}
