//! Configuration validation.
//!
//! Runs before any data is loaded. The typed getters on `ConfigPort` fall
//! back to defaults on unparsable values, so keys are re-read here as
//! strings and malformed numbers are reported instead of silently replaced.

use crate::domain::error::RevtraderError;
use crate::domain::metrics::OpenPositionValuation;
use crate::domain::strategy::{mean_reversion, scalping};
use crate::domain::sweep::{SweepConfig, MAX_SWEEP_TRIALS};
use crate::ports::config_port::ConfigPort;

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), RevtraderError> {
    validate_initial_balance(config)?;
    validate_warmup_bars(config)?;
    validate_valuation(config)?;
    read_bool(config, "backtest", "strict")?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), RevtraderError> {
    let name = config
        .get_string("strategy", "name")
        .unwrap_or_else(|| mean_reversion::NAME.to_string());
    validate_strategy_params(config, &name)
}

/// Checks the parameter section of strategy `name`, whichever way it was chosen.
pub fn validate_strategy_params(config: &dyn ConfigPort, name: &str) -> Result<(), RevtraderError> {
    match name.trim() {
        mean_reversion::NAME => validate_mean_reversion(config),
        scalping::NAME => validate_scalping(config),
        other => Err(invalid(
            "strategy",
            "name",
            format!("unknown strategy '{other}', expected mean_reversion or scalping"),
        )),
    }
}

pub fn validate_sweep_config(config: &dyn ConfigPort) -> Result<(), RevtraderError> {
    validate_lookback(config)?;
    let step = read_f64(config, "optimize", "step")?.unwrap_or(0.5);
    if !(step.is_finite() && step > 0.0) {
        return Err(invalid("optimize", "step", "step must be positive"));
    }
    validate_axis(config, "drop_start", "drop_end", 1.0, 3.0)?;
    validate_axis(config, "rebound_start", "rebound_end", 1.0, 3.0)?;
    if let Some(top_k) = read_i64(config, "optimize", "top_k")? {
        if top_k < 0 {
            return Err(invalid("optimize", "top_k", "top_k must be non-negative"));
        }
    }
    read_bool(config, "optimize", "parallel")?;
    Ok(())
}

/// Checks a merged sweep grid (config plus command-line overrides) before
/// any grid point is built.
pub fn validate_sweep_grid(sweep: &SweepConfig) -> Result<(), RevtraderError> {
    if !(sweep.x.step.is_finite() && sweep.x.step > 0.0) {
        return Err(invalid("optimize", "step", "step must be positive"));
    }
    if !(sweep.y.step.is_finite() && sweep.y.step > 0.0) {
        return Err(invalid("optimize", "step", "step must be positive"));
    }
    check_axis(sweep.x.start, sweep.x.stop, "drop_start", "drop_end")?;
    check_axis(sweep.y.start, sweep.y.stop, "rebound_start", "rebound_end")?;
    let trials = sweep.trial_count();
    if trials > MAX_SWEEP_TRIALS {
        return Err(invalid(
            "optimize",
            "step",
            format!("grid has {trials} combinations, limit is {MAX_SWEEP_TRIALS}"),
        ));
    }
    Ok(())
}

fn validate_initial_balance(config: &dyn ConfigPort) -> Result<(), RevtraderError> {
    if let Some(value) = read_f64(config, "backtest", "initial_balance")? {
        if !(value.is_finite() && value > 0.0) {
            return Err(invalid(
                "backtest",
                "initial_balance",
                "initial_balance must be positive",
            ));
        }
    }
    Ok(())
}

fn validate_warmup_bars(config: &dyn ConfigPort) -> Result<(), RevtraderError> {
    if let Some(value) = read_i64(config, "backtest", "warmup_bars")? {
        if value < 0 {
            return Err(invalid(
                "backtest",
                "warmup_bars",
                "warmup_bars must be non-negative",
            ));
        }
    }
    Ok(())
}

fn validate_valuation(config: &dyn ConfigPort) -> Result<(), RevtraderError> {
    match config.get_string("backtest", "valuation") {
        Some(v) if OpenPositionValuation::parse(&v).is_none() => Err(invalid(
            "backtest",
            "valuation",
            format!("unknown valuation '{}', expected entry or market", v.trim()),
        )),
        _ => Ok(()),
    }
}

fn validate_mean_reversion(config: &dyn ConfigPort) -> Result<(), RevtraderError> {
    validate_lookback(config)?;
    for key in ["drop_threshold_pct", "rebound_threshold_pct"] {
        if let Some(value) = read_f64(config, "mean_reversion", key)? {
            if !(value.is_finite() && value >= 0.0) {
                return Err(invalid(
                    "mean_reversion",
                    key,
                    format!("{key} must be non-negative"),
                ));
            }
        }
    }
    Ok(())
}

fn validate_lookback(config: &dyn ConfigPort) -> Result<(), RevtraderError> {
    if let Some(value) = read_i64(config, "mean_reversion", "lookback_period")? {
        if value < 1 {
            return Err(invalid(
                "mean_reversion",
                "lookback_period",
                "lookback_period must be at least 1",
            ));
        }
    }
    Ok(())
}

fn validate_scalping(config: &dyn ConfigPort) -> Result<(), RevtraderError> {
    if let Some(value) = read_f64(config, "scalping", "grid_size")? {
        if !(value.is_finite() && value > 0.0) {
            return Err(invalid("scalping", "grid_size", "grid_size must be positive"));
        }
    }
    Ok(())
}

fn validate_axis(
    config: &dyn ConfigPort,
    start_key: &str,
    end_key: &str,
    default_start: f64,
    default_end: f64,
) -> Result<(), RevtraderError> {
    let start = read_f64(config, "optimize", start_key)?.unwrap_or(default_start);
    let end = read_f64(config, "optimize", end_key)?.unwrap_or(default_end);
    check_axis(start, end, start_key, end_key)
}

fn check_axis(start: f64, end: f64, start_key: &str, end_key: &str) -> Result<(), RevtraderError> {
    if !(start.is_finite() && end.is_finite()) || start < 0.0 {
        return Err(invalid(
            "optimize",
            start_key,
            format!("{start_key} must be a non-negative number"),
        ));
    }
    if start > end {
        return Err(invalid(
            "optimize",
            start_key,
            format!("{start_key} must not exceed {end_key}"),
        ));
    }
    Ok(())
}

fn read_f64(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<f64>, RevtraderError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| invalid(section, key, format!("'{}' is not a number", raw.trim()))),
    }
}

fn read_i64(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<i64>, RevtraderError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| invalid(section, key, format!("'{}' is not an integer", raw.trim()))),
    }
}

fn read_bool(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), RevtraderError> {
    match config.get_string(section, key) {
        Some(raw)
            if !matches!(
                raw.trim().to_lowercase().as_str(),
                "true" | "yes" | "1" | "false" | "no" | "0"
            ) =>
        {
            Err(invalid(
                section,
                key,
                format!("'{}' is not a boolean", raw.trim()),
            ))
        }
        _ => Ok(()),
    }
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> RevtraderError {
    RevtraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}
