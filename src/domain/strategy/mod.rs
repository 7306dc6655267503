//! Stateful strategy engines.
//!
//! - `StrategyEngine`: the decision trait, one `decide` call per candle
//! - `StrategyState`: the positioned/entry-price pair each engine owns
//! - `StrategyConfig`: parameter sets that build fresh engines
//!
//! Engines never fail. Too little history yields `Signal::Hold`, and so does a
//! zero reference price (logged at warn level).

pub mod mean_reversion;
pub mod scalping;

pub use mean_reversion::{MeanReversionEngine, MeanReversionParams};
pub use scalping::{ScalpingEngine, ScalpingParams};

use crate::domain::candle::SeriesView;
use crate::domain::signal::Signal;
use std::fmt;

/// Position bookkeeping carried by an engine between `decide` calls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrategyState {
    pub positioned: bool,
    pub entry_price: Option<f64>,
}

impl StrategyState {
    pub(crate) fn enter(&mut self, price: f64) {
        self.positioned = true;
        self.entry_price = Some(price);
    }

    pub(crate) fn exit(&mut self) {
        self.positioned = false;
        self.entry_price = None;
    }
}

pub trait StrategyEngine: Send {
    fn name(&self) -> &'static str;

    /// Decide on the last candle of `prefix`. May update internal state.
    fn decide(&mut self, prefix: &SeriesView<'_>) -> Signal;

    fn state(&self) -> &StrategyState;
}

/// Fractional change from `reference` to `value`; `None` when the reference
/// is zero or the result is not finite.
pub(crate) fn pct_change(reference: f64, value: f64) -> Option<f64> {
    if reference == 0.0 {
        return None;
    }
    let change = (value - reference) / reference;
    change.is_finite().then_some(change)
}

#[derive(Debug, Clone, PartialEq)]
pub enum StrategyConfig {
    MeanReversion(MeanReversionParams),
    Scalping(ScalpingParams),
}

impl StrategyConfig {
    pub fn name(&self) -> &'static str {
        match self {
            StrategyConfig::MeanReversion(_) => mean_reversion::NAME,
            StrategyConfig::Scalping(_) => scalping::NAME,
        }
    }

    /// A brand-new engine with flat state. Every run gets its own.
    pub fn build(&self) -> Box<dyn StrategyEngine> {
        match self {
            StrategyConfig::MeanReversion(p) => Box::new(MeanReversionEngine::new(p.clone())),
            StrategyConfig::Scalping(p) => Box::new(ScalpingEngine::new(p.clone())),
        }
    }
}

impl fmt::Display for StrategyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyConfig::MeanReversion(p) => write!(
                f,
                "{}(lookback={}, drop={:.2}%, rebound={:.2}%)",
                mean_reversion::NAME,
                p.lookback,
                p.drop_threshold * 100.0,
                p.rebound_threshold * 100.0
            ),
            StrategyConfig::Scalping(p) => write!(
                f,
                "{}(grid={:.2}%)",
                scalping::NAME,
                p.grid_size * 100.0
            ),
        }
    }
}
