//! Report generation port trait.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::RevtraderError;
use crate::domain::sweep::SweepResults;

/// Port for writing backtest and sweep reports.
pub trait ReportPort {
    fn write(&self, result: &BacktestResult, output_path: &str) -> Result<(), RevtraderError>;

    /// Default implementation: formats without a leaderboard reject sweeps.
    fn write_sweep(&self, _results: &SweepResults, output_path: &str) -> Result<(), RevtraderError> {
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            format!("sweep reports are not supported for {output_path}"),
        )
        .into())
    }
}
