//! Performance summary of a finished ledger.

use chrono::{DateTime, Utc};
use std::fmt;

use super::candle::PriceSeries;
use super::ledger::{Ledger, TradeRecord};

/// How holdings still open at the end of a run are valued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenPositionValuation {
    /// Mark at the entry price (cost). Unrealised gains and losses are ignored.
    #[default]
    AtEntry,
    /// Mark at the last candle's close.
    MarkToMarket,
}

impl OpenPositionValuation {
    /// Parses the config spellings `entry` and `market`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "entry" | "cost" => Some(Self::AtEntry),
            "market" | "mark_to_market" => Some(Self::MarkToMarket),
            _ => None,
        }
    }
}

impl fmt::Display for OpenPositionValuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AtEntry => write!(f, "entry"),
            Self::MarkToMarket => write!(f, "market"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceReport {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub initial_balance: f64,
    pub final_balance: f64,
    pub cumulative_return_pct: f64,
    pub trade_count: usize,
    pub trade_pairs: usize,
    pub wins: usize,
    pub losses: usize,
    pub breakeven: usize,
    /// wins / max(trade_pairs, 1), in [0, 1].
    pub win_rate: f64,
    pub avg_pair_return_pct: f64,
    pub best_pair_return_pct: f64,
    pub worst_pair_return_pct: f64,
    pub open_position: bool,
    pub valuation: OpenPositionValuation,
}

impl PerformanceReport {
    pub fn summarize(
        ledger: &Ledger,
        series: &PriceSeries,
        valuation: OpenPositionValuation,
    ) -> Self {
        let mark_price = match valuation {
            OpenPositionValuation::AtEntry => ledger.entry_price.unwrap_or(0.0),
            OpenPositionValuation::MarkToMarket => series.last().close,
        };
        let final_balance = ledger.cash + ledger.holdings_qty * mark_price;

        let initial_balance = ledger.initial_cash;
        let cumulative_return_pct = if initial_balance > 0.0 {
            (final_balance - initial_balance) / initial_balance * 100.0
        } else {
            0.0
        };

        let pair_returns: Vec<f64> = ledger
            .trades
            .chunks_exact(2)
            .map(|pair| pair_return_pct(&pair[0], &pair[1]))
            .collect();
        let trade_pairs = pair_returns.len();

        let mut wins = 0usize;
        let mut losses = 0usize;
        let mut breakeven = 0usize;
        for pair in ledger.trades.chunks_exact(2) {
            let (buy, sell) = (&pair[0], &pair[1]);
            if sell.price > buy.price {
                wins += 1;
            } else if sell.price < buy.price {
                losses += 1;
            } else {
                breakeven += 1;
            }
        }

        let win_rate = wins as f64 / trade_pairs.max(1) as f64;

        let avg_pair_return_pct = if trade_pairs > 0 {
            pair_returns.iter().sum::<f64>() / trade_pairs as f64
        } else {
            0.0
        };
        let best_pair_return_pct = pair_returns
            .iter()
            .copied()
            .fold(None, |acc: Option<f64>, r| Some(acc.map_or(r, |a| a.max(r))))
            .unwrap_or(0.0);
        let worst_pair_return_pct = pair_returns
            .iter()
            .copied()
            .fold(None, |acc: Option<f64>, r| Some(acc.map_or(r, |a| a.min(r))))
            .unwrap_or(0.0);

        PerformanceReport {
            start: series.first().open_time,
            end: series.last().open_time,
            initial_balance,
            final_balance,
            cumulative_return_pct,
            trade_count: ledger.trades.len(),
            trade_pairs,
            wins,
            losses,
            breakeven,
            win_rate,
            avg_pair_return_pct,
            best_pair_return_pct,
            worst_pair_return_pct,
            open_position: ledger.trades.len() % 2 == 1,
            valuation,
        }
    }
}

fn pair_return_pct(buy: &TradeRecord, sell: &TradeRecord) -> f64 {
    if buy.price > 0.0 {
        (sell.price - buy.price) / buy.price * 100.0
    } else {
        0.0
    }
}
