//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::text_report_adapter::{self, TextReportAdapter};
use crate::domain::backtest::{run_backtest, BacktestConfig, BacktestResult};
use crate::domain::config_validation::{
    validate_backtest_config, validate_strategy_config, validate_strategy_params,
    validate_sweep_config, validate_sweep_grid,
};
use crate::domain::error::RevtraderError;
use crate::domain::metrics::OpenPositionValuation;
use crate::domain::strategy::{
    mean_reversion, scalping, MeanReversionParams, ScalpingParams, StrategyConfig,
};
use crate::domain::sweep::{mean_reversion_factory, ParamRange, ParamSweep, SweepConfig, SweepResults};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

pub const DEFAULT_SYMBOL: &str = "XRPUSDT";
pub const DEFAULT_INTERVAL: &str = "1h";

#[derive(Parser, Debug)]
#[command(name = "revtrader", about = "Single-asset strategy backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Where candles come from; each flag overrides the `[data]` section.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct DataArgs {
    /// CSV file or directory of `<SYMBOL>_<interval>.csv` files
    #[arg(short, long)]
    pub data: Option<PathBuf>,
    #[arg(long)]
    pub symbol: Option<String>,
    #[arg(long)]
    pub interval: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[command(flatten)]
        data: DataArgs,
        /// mean_reversion or scalping
        #[arg(long)]
        strategy: Option<String>,
        /// Summary report (.csv writes the trade log instead)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Trade log CSV
        #[arg(long)]
        trades: Option<PathBuf>,
        /// Fail on redundant signals instead of ignoring them
        #[arg(long)]
        strict: bool,
        /// Value an open position at the last close
        #[arg(long)]
        mark_to_market: bool,
    },
    /// Grid-search mean reversion drop/rebound thresholds
    Optimize {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[command(flatten)]
        data: DataArgs,
        #[arg(long)]
        drop_start: Option<f64>,
        #[arg(long)]
        drop_end: Option<f64>,
        #[arg(long)]
        rebound_start: Option<f64>,
        #[arg(long)]
        rebound_end: Option<f64>,
        #[arg(long)]
        step: Option<f64>,
        /// Number of results to keep; 0 keeps all
        #[arg(long)]
        top: Option<usize>,
        #[arg(long)]
        sequential: bool,
        /// Leaderboard report (.csv or text)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show data range for symbol(s)
    Info {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[command(flatten)]
        data: DataArgs,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Backtest {
            config,
            data,
            strategy,
            output,
            trades,
            strict,
            mark_to_market,
        } => run_backtest_command(
            config.as_ref(),
            &data,
            strategy.as_deref(),
            output.as_ref(),
            trades.as_ref(),
            strict,
            mark_to_market,
        ),
        Command::Optimize {
            config,
            data,
            drop_start,
            drop_end,
            rebound_start,
            rebound_end,
            step,
            top,
            sequential,
            output,
        } => {
            let overrides = SweepOverrides {
                drop_start,
                drop_end,
                rebound_start,
                rebound_end,
                step,
                top,
                sequential,
            };
            run_optimize_command(config.as_ref(), &data, &overrides, output.as_ref())
        }
        Command::Validate { config } => run_validate(&config),
        Command::Info { config, data } => run_info(config.as_ref(), &data),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Loads the INI file, or an empty config (all defaults) when none is given.
pub fn load_config(path: Option<&PathBuf>) -> Result<FileConfigAdapter, RevtraderError> {
    match path {
        Some(path) => {
            eprintln!("Loading config from {}", path.display());
            FileConfigAdapter::from_file(path)
        }
        None => FileConfigAdapter::from_string(""),
    }
}

pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, RevtraderError> {
    let warmup_bars = adapter.get_int("backtest", "warmup_bars", 0);
    let warmup_bars = usize::try_from(warmup_bars).map_err(|_| RevtraderError::ConfigInvalid {
        section: "backtest".into(),
        key: "warmup_bars".into(),
        reason: "warmup_bars must be non-negative".into(),
    })?;

    let valuation = match adapter.get_string("backtest", "valuation") {
        None => OpenPositionValuation::default(),
        Some(v) => OpenPositionValuation::parse(&v).ok_or_else(|| RevtraderError::ConfigInvalid {
            section: "backtest".into(),
            key: "valuation".into(),
            reason: format!("unknown valuation '{}', expected entry or market", v.trim()),
        })?,
    };

    Ok(BacktestConfig {
        initial_balance: adapter.get_double("backtest", "initial_balance", 1000.0),
        warmup_bars,
        valuation,
        strict: adapter.get_bool("backtest", "strict", false),
    })
}

fn lookback_period(adapter: &dyn ConfigPort) -> Result<usize, RevtraderError> {
    let lookback = adapter.get_int(
        "mean_reversion",
        "lookback_period",
        mean_reversion::DEFAULT_LOOKBACK as i64,
    );
    usize::try_from(lookback).map_err(|_| RevtraderError::ConfigInvalid {
        section: "mean_reversion".into(),
        key: "lookback_period".into(),
        reason: "lookback_period must be at least 1".into(),
    })
}

/// `[strategy] name` picks the engine; `name_override` wins when given.
pub fn build_strategy_config(
    adapter: &dyn ConfigPort,
    name_override: Option<&str>,
) -> Result<StrategyConfig, RevtraderError> {
    let name = name_override
        .map(str::to_string)
        .or_else(|| adapter.get_string("strategy", "name"))
        .unwrap_or_else(|| mean_reversion::NAME.to_string());

    match name.trim() {
        mean_reversion::NAME => Ok(StrategyConfig::MeanReversion(
            MeanReversionParams::from_percentages(
                lookback_period(adapter)?,
                adapter.get_double(
                    "mean_reversion",
                    "drop_threshold_pct",
                    mean_reversion::DEFAULT_DROP_PCT,
                ),
                adapter.get_double(
                    "mean_reversion",
                    "rebound_threshold_pct",
                    mean_reversion::DEFAULT_REBOUND_PCT,
                ),
            ),
        )),
        scalping::NAME => Ok(StrategyConfig::Scalping(ScalpingParams::from_percentage(
            adapter.get_double("scalping", "grid_size", scalping::DEFAULT_GRID_PCT),
        ))),
        other => Err(RevtraderError::ConfigInvalid {
            section: "strategy".into(),
            key: "name".into(),
            reason: format!("unknown strategy '{other}', expected mean_reversion or scalping"),
        }),
    }
}

pub fn build_sweep_config(adapter: &dyn ConfigPort) -> Result<SweepConfig, RevtraderError> {
    let defaults = SweepConfig::default();
    let step = adapter.get_double("optimize", "step", defaults.x.step);
    let top_k = adapter.get_int("optimize", "top_k", defaults.top_k as i64);
    let top_k = usize::try_from(top_k).map_err(|_| RevtraderError::ConfigInvalid {
        section: "optimize".into(),
        key: "top_k".into(),
        reason: "top_k must be non-negative".into(),
    })?;

    Ok(SweepConfig {
        x: ParamRange::new(
            adapter.get_double("optimize", "drop_start", defaults.x.start),
            adapter.get_double("optimize", "drop_end", defaults.x.stop),
            step,
        ),
        y: ParamRange::new(
            adapter.get_double("optimize", "rebound_start", defaults.y.start),
            adapter.get_double("optimize", "rebound_end", defaults.y.stop),
            step,
        ),
        top_k,
        parallel: adapter.get_bool("optimize", "parallel", defaults.parallel),
    })
}

/// Command-line replacements for `[optimize]` keys.
#[derive(Debug, Clone, Default)]
pub struct SweepOverrides {
    pub drop_start: Option<f64>,
    pub drop_end: Option<f64>,
    pub rebound_start: Option<f64>,
    pub rebound_end: Option<f64>,
    pub step: Option<f64>,
    pub top: Option<usize>,
    pub sequential: bool,
}

impl SweepOverrides {
    pub fn apply(&self, mut config: SweepConfig) -> SweepConfig {
        if let Some(v) = self.drop_start {
            config.x.start = v;
        }
        if let Some(v) = self.drop_end {
            config.x.stop = v;
        }
        if let Some(v) = self.rebound_start {
            config.y.start = v;
        }
        if let Some(v) = self.rebound_end {
            config.y.stop = v;
        }
        if let Some(v) = self.step {
            config.x.step = v;
            config.y.step = v;
        }
        if let Some(v) = self.top {
            config.top_k = v;
        }
        if self.sequential {
            config.parallel = false;
        }
        config
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataSelection {
    pub path: PathBuf,
    pub symbol: String,
    pub interval: String,
}

impl DataSelection {
    pub fn adapter(&self) -> CsvAdapter {
        CsvAdapter::for_path(self.path.clone())
    }
}

pub fn resolve_data(
    args: &DataArgs,
    config: &dyn ConfigPort,
) -> Result<DataSelection, RevtraderError> {
    let path = match &args.data {
        Some(p) => p.clone(),
        None => config
            .get_string("data", "path")
            .filter(|s| !s.trim().is_empty())
            .map(|s| PathBuf::from(s.trim()))
            .ok_or_else(|| RevtraderError::ConfigMissing {
                section: "data".into(),
                key: "path".into(),
            })?,
    };
    let symbol = args
        .symbol
        .clone()
        .or_else(|| config.get_string("data", "symbol"))
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_SYMBOL.to_string());
    let interval = args
        .interval
        .clone()
        .or_else(|| config.get_string("data", "interval"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_INTERVAL.to_string());

    Ok(DataSelection {
        path,
        symbol,
        interval,
    })
}

/// `.csv` paths get the CSV adapter, anything else plain text.
pub fn report_adapter_for(path: &Path) -> Box<dyn ReportPort> {
    let is_csv = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if is_csv {
        Box::new(CsvReportAdapter::new())
    } else {
        Box::new(TextReportAdapter::new())
    }
}

fn path_str(path: &Path) -> Result<&str, RevtraderError> {
    path.to_str().ok_or_else(|| {
        RevtraderError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("output path is not valid UTF-8: {}", path.display()),
        ))
    })
}

fn run_backtest_command(
    config_path: Option<&PathBuf>,
    data: &DataArgs,
    strategy_override: Option<&str>,
    output_path: Option<&PathBuf>,
    trades_path: Option<&PathBuf>,
    strict: bool,
    mark_to_market: bool,
) -> Result<(), RevtraderError> {
    let adapter = load_config(config_path)?;
    validate_backtest_config(&adapter)?;
    match strategy_override {
        Some(name) => validate_strategy_params(&adapter, name)?,
        None => validate_strategy_config(&adapter)?,
    }

    let strategy = build_strategy_config(&adapter, strategy_override)?;
    let mut bt_config = build_backtest_config(&adapter)?;
    if strict {
        bt_config.strict = true;
    }
    if mark_to_market {
        bt_config.valuation = OpenPositionValuation::MarkToMarket;
    }
    let selection = resolve_data(data, &adapter)?;

    run_backtest_pipeline(
        &selection.adapter(),
        &selection,
        &strategy,
        &bt_config,
        output_path.map(PathBuf::as_path),
        trades_path.map(PathBuf::as_path),
    )?;
    Ok(())
}

/// Fetch, replay and report. The summary goes to stdout, progress to stderr.
pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    selection: &DataSelection,
    strategy: &StrategyConfig,
    bt_config: &BacktestConfig,
    output_path: Option<&Path>,
    trades_path: Option<&Path>,
) -> Result<BacktestResult, RevtraderError> {
    eprintln!(
        "Loading candles for {} [{}] from {}",
        selection.symbol,
        selection.interval,
        selection.path.display()
    );
    let series = data_port.fetch_candles(&selection.symbol, &selection.interval)?;
    eprintln!("Running {} on {} candles", strategy, series.len());

    let result = run_backtest(&series, strategy.build(), bt_config)?;
    println!("{}", text_report_adapter::render_summary(&result));

    if let Some(path) = output_path {
        report_adapter_for(path).write(&result, path_str(path)?)?;
        eprintln!("Report written to: {}", path.display());
    }
    if let Some(path) = trades_path {
        CsvReportAdapter::new().write(&result, path_str(path)?)?;
        eprintln!("Trade log written to: {}", path.display());
    }
    Ok(result)
}

fn run_optimize_command(
    config_path: Option<&PathBuf>,
    data: &DataArgs,
    overrides: &SweepOverrides,
    output_path: Option<&PathBuf>,
) -> Result<(), RevtraderError> {
    let adapter = load_config(config_path)?;
    validate_backtest_config(&adapter)?;
    validate_sweep_config(&adapter)?;

    let bt_config = build_backtest_config(&adapter)?;
    let sweep_config = overrides.apply(build_sweep_config(&adapter)?);
    validate_sweep_grid(&sweep_config)?;
    let selection = resolve_data(data, &adapter)?;

    run_optimize_pipeline(
        &selection.adapter(),
        &selection,
        lookback_period(&adapter)?,
        &bt_config,
        &sweep_config,
        output_path.map(PathBuf::as_path),
    )?;
    Ok(())
}

/// Sweep the mean reversion drop/rebound grid and print the leaderboard.
pub fn run_optimize_pipeline(
    data_port: &dyn DataPort,
    selection: &DataSelection,
    lookback: usize,
    bt_config: &BacktestConfig,
    sweep_config: &SweepConfig,
    output_path: Option<&Path>,
) -> Result<SweepResults, RevtraderError> {
    let series = data_port.fetch_candles(&selection.symbol, &selection.interval)?;
    eprintln!(
        "Optimizing on {} [{}], candles: {}",
        selection.symbol,
        selection.interval,
        series.len()
    );

    let sweep = ParamSweep::new(bt_config.clone(), sweep_config.clone());
    let results = sweep.run(&series, mean_reversion_factory(lookback))?;
    println!("{}", text_report_adapter::render_leaderboard(&results));

    if let Some(path) = output_path {
        report_adapter_for(path).write_sweep(&results, path_str(path)?)?;
        eprintln!("Leaderboard written to: {}", path.display());
    }
    Ok(results)
}

fn run_validate(config_path: &PathBuf) -> Result<(), RevtraderError> {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = load_config(Some(config_path))?;

    validate_backtest_config(&adapter)?;
    validate_strategy_config(&adapter)?;
    validate_sweep_config(&adapter)?;

    let bt_config = build_backtest_config(&adapter)?;
    let strategy = build_strategy_config(&adapter, None)?;
    let sweep = build_sweep_config(&adapter)?;
    validate_sweep_grid(&sweep)?;

    eprintln!("\nStrategy:  {}", strategy);
    eprintln!(
        "Backtest:  balance ${:.2}, warm-up {} bars, valuation {}, {}",
        bt_config.initial_balance,
        bt_config.warmup_bars,
        bt_config.valuation,
        if bt_config.strict { "strict" } else { "lenient" }
    );
    eprintln!(
        "Optimize:  drop {:?}, rebound {:?} ({} combinations)",
        sweep.x.values(),
        sweep.y.values(),
        sweep.trial_count()
    );
    match resolve_data(&DataArgs::default(), &adapter) {
        Ok(sel) => eprintln!(
            "Data:      {} [{}] from {}",
            sel.symbol,
            sel.interval,
            sel.path.display()
        ),
        Err(_) => eprintln!("Data:      not configured (pass --data)"),
    }

    eprintln!("\nConfiguration is valid.");
    Ok(())
}

fn run_info(config_path: Option<&PathBuf>, data: &DataArgs) -> Result<(), RevtraderError> {
    let adapter = load_config(config_path)?;
    let selection = resolve_data(data, &adapter)?;
    let data_port = selection.adapter();

    let symbols = if data.symbol.is_some() || adapter.get_string("data", "symbol").is_some() {
        vec![selection.symbol.clone()]
    } else {
        data_port.list_symbols(&selection.interval)?
    };

    if symbols.is_empty() {
        eprintln!(
            "No symbols found for interval {} in {}",
            selection.interval,
            selection.path.display()
        );
    }

    for symbol in &symbols {
        match data_port.data_range(symbol, &selection.interval)? {
            Some((first, last, count)) => {
                println!(
                    "{} [{}]: {} candles, {} to {}",
                    symbol,
                    selection.interval,
                    count,
                    first.format("%Y-%m-%d %H:%M"),
                    last.format("%Y-%m-%d %H:%M")
                );
            }
            None => {
                eprintln!("{} [{}]: no data found", symbol, selection.interval);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_backtest_flags() {
        let cli = Cli::try_parse_from([
            "revtrader",
            "backtest",
            "--data",
            "prices.csv",
            "--strategy",
            "scalping",
            "--strict",
            "--trades",
            "trades.csv",
        ])
        .unwrap();
        match cli.command {
            Command::Backtest {
                data,
                strategy,
                strict,
                trades,
                mark_to_market,
                ..
            } => {
                assert_eq!(data.data, Some(PathBuf::from("prices.csv")));
                assert_eq!(strategy.as_deref(), Some("scalping"));
                assert!(strict);
                assert!(!mark_to_market);
                assert_eq!(trades, Some(PathBuf::from("trades.csv")));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parses_optimize_ranges() {
        let cli = Cli::try_parse_from([
            "revtrader",
            "optimize",
            "--symbol",
            "btcusdt",
            "--drop-start",
            "0.5",
            "--step",
            "0.25",
            "--top",
            "3",
            "--sequential",
        ])
        .unwrap();
        match cli.command {
            Command::Optimize {
                data,
                drop_start,
                step,
                top,
                sequential,
                ..
            } => {
                assert_eq!(data.symbol.as_deref(), Some("btcusdt"));
                assert_eq!(drop_start, Some(0.5));
                assert_eq!(step, Some(0.25));
                assert_eq!(top, Some(3));
                assert!(sequential);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn overrides_replace_config_values() {
        let overrides = SweepOverrides {
            drop_end: Some(5.0),
            step: Some(1.0),
            top: Some(0),
            sequential: true,
            ..Default::default()
        };
        let config = overrides.apply(SweepConfig::default());
        assert_eq!(config.x, ParamRange::new(1.0, 5.0, 1.0));
        assert_eq!(config.y, ParamRange::new(1.0, 3.0, 1.0));
        assert_eq!(config.top_k, 0);
        assert!(!config.parallel);
    }
}
