//! Domain error types.

use crate::domain::ledger::PositionState;
use crate::domain::signal::Signal;

/// Top-level error type for revtrader.
#[derive(Debug, thiserror::Error)]
pub enum RevtraderError {
    #[error("invalid price series: {reason}")]
    InvalidPriceSeries { reason: String },

    #[error("ledger invariant violated: {signal} applied while {state}")]
    StateInvariantViolation { state: PositionState, signal: Signal },

    #[error("no data for {symbol} ({interval})")]
    NoData { symbol: String, interval: String },

    #[error("data source error: {reason}")]
    DataSource { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&RevtraderError> for std::process::ExitCode {
    fn from(err: &RevtraderError) -> Self {
        let code: u8 = match err {
            RevtraderError::Io(_) | RevtraderError::Csv(_) => 1,
            RevtraderError::ConfigParse { .. }
            | RevtraderError::ConfigMissing { .. }
            | RevtraderError::ConfigInvalid { .. } => 2,
            RevtraderError::NoData { .. } | RevtraderError::DataSource { .. } => 3,
            RevtraderError::InvalidPriceSeries { .. } => 5,
            RevtraderError::StateInvariantViolation { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
