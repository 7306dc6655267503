//! CSV report adapter implementing ReportPort.
//!
//! `write` emits the trade log, one row per fill; `write_sweep` emits the
//! ranked parameter leaderboard.

use serde::Serialize;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::RevtraderError;
use crate::domain::signal::Side;
use crate::domain::sweep::SweepResults;
use crate::ports::report_port::ReportPort;

#[derive(Debug, Serialize)]
struct TradeRow<'a> {
    sequence_index: usize,
    timestamp: String,
    strategy: &'a str,
    side: Side,
    price: f64,
    quantity: f64,
    cash_after: f64,
}

#[derive(Debug, Serialize)]
struct LeaderboardRow {
    rank: usize,
    drop_pct: f64,
    rebound_pct: f64,
    return_pct: f64,
    final_balance: f64,
    trades: usize,
    wins: usize,
    win_rate: f64,
}

pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CsvReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, result: &BacktestResult, output_path: &str) -> Result<(), RevtraderError> {
        let mut wtr = csv::Writer::from_path(output_path)?;
        for trade in &result.ledger.trades {
            wtr.serialize(TradeRow {
                sequence_index: trade.sequence_index,
                timestamp: trade.timestamp.to_rfc3339(),
                strategy: result.strategy,
                side: trade.side,
                price: trade.price,
                quantity: trade.quantity,
                cash_after: trade.cash_after,
            })?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn write_sweep(&self, results: &SweepResults, output_path: &str) -> Result<(), RevtraderError> {
        let mut wtr = csv::Writer::from_path(output_path)?;
        for (i, trial) in results.ranked.iter().enumerate() {
            wtr.serialize(LeaderboardRow {
                rank: i + 1,
                drop_pct: trial.x,
                rebound_pct: trial.y,
                return_pct: trial.report.cumulative_return_pct,
                final_balance: trial.report.final_balance,
                trades: trial.report.trade_count,
                wins: trial.report.wins,
                win_rate: trial.report.win_rate,
            })?;
        }
        wtr.flush()?;
        Ok(())
    }
}
