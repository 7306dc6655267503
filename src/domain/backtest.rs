//! Backtest replay loop.
//!
//! BacktestConfig defines run parameters; `run_backtest` walks a series
//! candle by candle, feeding each prefix to the strategy and each signal to
//! the ledger at the candle close.

use super::candle::PriceSeries;
use super::error::RevtraderError;
use super::ledger::{Ledger, LedgerMode, SimulationLedger};
use super::metrics::{OpenPositionValuation, PerformanceReport};
use super::signal::Signal;
use super::strategy::StrategyEngine;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_balance: f64,
    /// Leading candles on which the strategy is not consulted. Later
    /// prefixes still include them.
    pub warmup_bars: usize,
    pub valuation: OpenPositionValuation,
    pub strict: bool,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_balance: 1000.0,
            warmup_bars: 0,
            valuation: OpenPositionValuation::AtEntry,
            strict: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub strategy: &'static str,
    /// One signal per candle, Hold for warm-up candles.
    pub signals: Vec<Signal>,
    pub ledger: Ledger,
    pub report: PerformanceReport,
}

/// Replay `series` through `engine` on a fresh ledger.
///
/// The engine is consumed: a run's strategy state never outlives the run.
pub fn run_backtest(
    series: &PriceSeries,
    mut engine: Box<dyn StrategyEngine>,
    config: &BacktestConfig,
) -> Result<BacktestResult, RevtraderError> {
    if !(config.initial_balance.is_finite() && config.initial_balance > 0.0) {
        return Err(RevtraderError::ConfigInvalid {
            section: "backtest".into(),
            key: "initial_balance".into(),
            reason: "initial_balance must be positive".into(),
        });
    }

    let mode = if config.strict {
        LedgerMode::Strict
    } else {
        LedgerMode::Lenient
    };
    let mut ledger = SimulationLedger::with_mode(config.initial_balance, mode);
    let mut signals = Vec::with_capacity(series.len());

    tracing::info!(
        strategy = engine.name(),
        candles = series.len(),
        warmup = config.warmup_bars,
        "starting backtest"
    );

    for (i, candle) in series.candles().iter().enumerate() {
        let signal = if i < config.warmup_bars {
            Signal::Hold
        } else {
            match series.prefix_through(i) {
                Some(prefix) => engine.decide(&prefix),
                None => Signal::Hold,
            }
        };

        if let Some(trade) = ledger.apply(signal, candle.close, candle.open_time)?.trade() {
            tracing::debug!(
                index = i,
                side = %trade.side,
                price = trade.price,
                quantity = trade.quantity,
                "trade"
            );
        }
        signals.push(signal);
    }

    let ledger = ledger.into_ledger();
    let report = PerformanceReport::summarize(&ledger, series, config.valuation);

    tracing::info!(
        strategy = engine.name(),
        trades = report.trade_count,
        return_pct = report.cumulative_return_pct,
        "backtest finished"
    );

    Ok(BacktestResult {
        strategy: engine.name(),
        signals,
        ledger,
        report,
    })
}
