//! Core domain types and logic.

pub mod candle;
pub mod signal;
pub mod strategy;
pub mod ledger;
pub mod backtest;
pub mod metrics;
pub mod sweep;
pub mod config_validation;
pub mod error;
