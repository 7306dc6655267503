//! Plain-text report adapter implementing ReportPort.
//!
//! The same renderers back the CLI's stdout summary, so a written report and
//! the terminal output never disagree.

use std::fmt::Write as _;
use std::fs;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::RevtraderError;
use crate::domain::metrics::PerformanceReport;
use crate::domain::sweep::SweepResults;
use crate::ports::report_port::ReportPort;

pub struct TextReportAdapter;

impl TextReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TextReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn format_time(report_time: chrono::DateTime<chrono::Utc>) -> String {
    report_time.format("%Y-%m-%d %H:%M").to_string()
}

pub fn render_summary(result: &BacktestResult) -> String {
    let r: &PerformanceReport = &result.report;
    let mut out = String::new();

    let _ = writeln!(out, "Backtest Summary ({})", result.strategy);
    let _ = writeln!(
        out,
        "Date Range:        {} -> {}",
        format_time(r.start),
        format_time(r.end)
    );
    let _ = writeln!(out, "Start Balance:     ${:.2}", r.initial_balance);
    let _ = writeln!(out, "End Balance:       ${:.2}", r.final_balance);
    let _ = writeln!(out, "Cumulative Return: {:.2}%", r.cumulative_return_pct);
    let _ = writeln!(out, "Trades:            {}", r.trade_count);
    let _ = writeln!(
        out,
        "Winning Trades:    {}/{} ({:.1}%)",
        r.wins,
        r.trade_pairs,
        r.win_rate * 100.0
    );
    if r.trade_pairs > 0 {
        let _ = writeln!(
            out,
            "Pair Returns:      avg {:.2}%, best {:.2}%, worst {:.2}%",
            r.avg_pair_return_pct, r.best_pair_return_pct, r.worst_pair_return_pct
        );
    }
    if r.open_position {
        let _ = writeln!(out, "Open Position:     valued at {}", r.valuation);
    }
    out.push('\n');
    out.push_str(&render_trade_log(result));
    out
}

pub fn render_trade_log(result: &BacktestResult) -> String {
    if result.ledger.trades.is_empty() {
        return "No trades executed.\n".to_string();
    }
    let mut out = String::from("Trade Log:\n");
    for trade in &result.ledger.trades {
        let _ = writeln!(
            out,
            "{} {} @ ${:.6} qty {:.6}",
            format_time(trade.timestamp),
            trade.side,
            trade.price,
            trade.quantity
        );
    }
    out
}

pub fn render_leaderboard(results: &SweepResults) -> String {
    if results.ranked.is_empty() {
        return "No parameter combinations tested.\n".to_string();
    }
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Top {} of {} parameter combinations:",
        results.ranked.len(),
        results.trials_run
    );
    let _ = writeln!(
        out,
        "{:>4} {:>9} {:>12} {:>11} {:>7} {:>9}",
        "rank", "drop_pct", "rebound_pct", "return_pct", "trades", "win_rate"
    );
    for (i, trial) in results.ranked.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>4} {:>9.2} {:>12.2} {:>11.2} {:>7} {:>8.1}%",
            i + 1,
            trial.x,
            trial.y,
            trial.report.cumulative_return_pct,
            trial.report.trade_count,
            trial.report.win_rate * 100.0
        );
    }
    out
}

impl ReportPort for TextReportAdapter {
    fn write(&self, result: &BacktestResult, output_path: &str) -> Result<(), RevtraderError> {
        fs::write(output_path, render_summary(result))?;
        Ok(())
    }

    fn write_sweep(&self, results: &SweepResults, output_path: &str) -> Result<(), RevtraderError> {
        fs::write(output_path, render_leaderboard(results))?;
        Ok(())
    }
}
