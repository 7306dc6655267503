//! Two-axis parameter grid search over a single price series.
//!
//! Every grid point gets its own engine (from the caller's factory) and its
//! own ledger (from `run_backtest`), so trials share nothing and may run in
//! parallel.

use rayon::prelude::*;

use super::backtest::{run_backtest, BacktestConfig};
use super::candle::PriceSeries;
use super::error::RevtraderError;
use super::metrics::PerformanceReport;
use super::strategy::{MeanReversionEngine, MeanReversionParams, StrategyEngine};

const RANGE_DECIMALS: i32 = 10;

/// Largest grid `ParamSweep::run` accepts.
pub const MAX_SWEEP_TRIALS: usize = 100_000;

/// Inclusive float range `start, start + step, ..., <= stop`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRange {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
}

impl ParamRange {
    pub fn new(start: f64, stop: f64, step: f64) -> Self {
        Self { start, stop, step }
    }

    pub fn is_valid(&self) -> bool {
        self.start.is_finite()
            && self.stop.is_finite()
            && self.step.is_finite()
            && self.step > 0.0
            && self.start <= self.stop
    }

    /// Number of values `values()` yields, computed without building them.
    pub fn point_count(&self) -> usize {
        if !self.is_valid() {
            return 0;
        }
        let scale = 10f64.powi(RANGE_DECIMALS - 1);
        let steps = (((self.stop - self.start) / self.step) * scale).round() / scale;
        (steps.floor() as usize).saturating_add(1)
    }

    /// Grid values; empty unless `step > 0` and `start <= stop`.
    ///
    /// Each value is rounded to 10 decimals so accumulated float error never
    /// drops the `stop` endpoint.
    pub fn values(&self) -> Vec<f64> {
        if !self.is_valid() {
            return Vec::new();
        }
        let scale = 10f64.powi(RANGE_DECIMALS);
        let mut values = Vec::new();
        let mut current = self.start;
        while current <= self.stop {
            values.push(current);
            let next = ((current + self.step) * scale).round() / scale;
            // A step below the rounding granularity never advances.
            if next <= current {
                break;
            }
            current = next;
        }
        values
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SweepConfig {
    pub x: ParamRange,
    pub y: ParamRange,
    /// Number of ranked results kept; 0 keeps all.
    pub top_k: usize,
    pub parallel: bool,
}

impl SweepConfig {
    pub fn trial_count(&self) -> usize {
        self.x.point_count().saturating_mul(self.y.point_count())
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        SweepConfig {
            x: ParamRange::new(1.0, 3.0, 0.5),
            y: ParamRange::new(1.0, 3.0, 0.5),
            top_k: 10,
            parallel: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrialResult {
    pub x: f64,
    pub y: f64,
    pub report: PerformanceReport,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SweepResults {
    pub trials_run: usize,
    /// Best `cumulative_return_pct` first; ties keep grid order.
    pub ranked: Vec<TrialResult>,
}

impl SweepResults {
    pub fn best(&self) -> Option<&TrialResult> {
        self.ranked.first()
    }
}

pub struct ParamSweep {
    backtest: BacktestConfig,
    config: SweepConfig,
}

impl ParamSweep {
    pub fn new(backtest: BacktestConfig, config: SweepConfig) -> Self {
        Self { backtest, config }
    }

    /// Cartesian grid, x-major.
    pub fn grid(&self) -> Vec<(f64, f64)> {
        let ys = self.config.y.values();
        self.config
            .x
            .values()
            .into_iter()
            .flat_map(|x| ys.iter().map(move |&y| (x, y)))
            .collect()
    }

    /// Run every grid point and rank the results.
    ///
    /// `factory(x, y)` must build a new engine on every call.
    pub fn run<F>(&self, series: &PriceSeries, factory: F) -> Result<SweepResults, RevtraderError>
    where
        F: Fn(f64, f64) -> Box<dyn StrategyEngine> + Sync,
    {
        let trials = self.config.trial_count();
        if trials > MAX_SWEEP_TRIALS {
            return Err(RevtraderError::ConfigInvalid {
                section: "optimize".into(),
                key: "step".into(),
                reason: format!("grid has {trials} combinations, limit is {MAX_SWEEP_TRIALS}"),
            });
        }

        let grid = self.grid();
        tracing::info!(
            trials = grid.len(),
            parallel = self.config.parallel,
            "starting parameter sweep"
        );

        let trial = |&(x, y): &(f64, f64)| -> Result<TrialResult, RevtraderError> {
            let result = run_backtest(series, factory(x, y), &self.backtest)?;
            tracing::debug!(x, y, return_pct = result.report.cumulative_return_pct, "trial");
            Ok(TrialResult {
                x,
                y,
                report: result.report,
            })
        };

        let mut trials: Vec<TrialResult> = if self.config.parallel {
            grid.par_iter().map(trial).collect::<Result<Vec<_>, _>>()?
        } else {
            grid.iter().map(trial).collect::<Result<Vec<_>, _>>()?
        };
        let trials_run = trials.len();

        trials.sort_by(|a, b| {
            b.report
                .cumulative_return_pct
                .total_cmp(&a.report.cumulative_return_pct)
        });
        if self.config.top_k > 0 {
            trials.truncate(self.config.top_k);
        }

        Ok(SweepResults {
            trials_run,
            ranked: trials,
        })
    }
}

/// Factory for the drop/rebound grid: x = drop %, y = rebound %.
pub fn mean_reversion_factory(lookback: usize) -> impl Fn(f64, f64) -> Box<dyn StrategyEngine> + Sync {
    move |drop_pct, rebound_pct| {
        Box::new(MeanReversionEngine::new(MeanReversionParams::from_percentages(
            lookback,
            drop_pct,
            rebound_pct,
        ))) as Box<dyn StrategyEngine>
    }
}
