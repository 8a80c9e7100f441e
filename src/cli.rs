//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::watchlist_csv::CsvWatchlistAdapter;
use crate::domain::backtest::{self as backtest_engine, BacktestConfig, BacktestResult};
use crate::domain::config_validation::{
    data_source, optional_choice, optional_f64, optional_positive_int, required_date, required_f64,
    required_pattern, required_string, validate_backtest_config, validate_data_config,
    validate_strategy_config,
};
use crate::domain::error::ScannerError;
use crate::domain::indicator::VolatilityMethod;
use crate::domain::metrics::Metrics;
use crate::domain::regime::{self, MarketRegime};
use crate::domain::scanner::{self, ScanResult};
use crate::domain::sizing::{SizingMode, StopPolicy};
use crate::domain::strategy::{EntryRule, Strategy};
use crate::domain::universe::{SkippedSymbol, UniverseError, parse_symbols};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;
use crate::ports::watchlist_port::WatchlistPort;

pub const DEFAULT_BENCHMARK: &str = "SPY";

#[derive(Parser, Debug)]
#[command(
    name = "breakout-scanner",
    about = "Volatility contraction breakout scanner and backtester"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Debug-level logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Screen the latest bar of every symbol for breakout candidates
    Scan {
        #[arg(short, long)]
        config: PathBuf,
        /// Comma-separated symbols, overriding the config list
        #[arg(long)]
        symbols: Option<String>,
    },
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Trade log CSV; the equity curve is written beside it
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        symbols: Option<String>,
        /// Only backtest symbols breaking out on their latest bar
        #[arg(long)]
        candidates_only: bool,
    },
    /// Classify the benchmark market regime
    Regime {
        #[arg(short, long)]
        config: PathBuf,
        /// Benchmark symbol, overriding [backtest] benchmark
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Validate a configuration file without fetching data
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Install the global subscriber. Safe to call more than once.
pub fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter_str = format!(
        "{},hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn,h2=warn",
        level
    );
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Scan { config, symbols } => run_scan(&config, symbols.as_deref()),
        Command::Backtest {
            config,
            output,
            symbols,
            candidates_only,
        } => run_backtest(&config, output.as_deref(), symbols.as_deref(), candidates_only),
        Command::Regime { config, symbol } => run_regime(&config, symbol.as_deref()),
        Command::Validate { config } => run_validate(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ScannerError> {
    info!(path = %path.display(), "loading config");
    FileConfigAdapter::from_file(path)
}

/// Every check that must pass before data is fetched.
fn validate_all(config: &dyn ConfigPort) -> Result<(), ScannerError> {
    validate_backtest_config(config)?;
    validate_strategy_config(config)?;
    validate_data_config(config)
}

pub fn build_backtest_config(
    config: &dyn ConfigPort,
    strategy: &Strategy,
) -> Result<BacktestConfig, ScannerError> {
    let risk_fraction = optional_f64(config, "backtest", "risk_per_trade")?
        .unwrap_or_else(|| strategy.pattern.default_risk_fraction());

    Ok(BacktestConfig {
        start_date: required_date(config, "backtest", "start_date")?,
        end_date: required_date(config, "backtest", "end_date")?,
        initial_capital: required_f64(config, "backtest", "initial_capital")?,
        risk_fraction,
    })
}

/// The pattern preset with any `[strategy]` overrides applied.
pub fn build_strategy(config: &dyn ConfigPort) -> Result<Strategy, ScannerError> {
    let mut strategy = Strategy::preset(required_pattern(config)?);

    if let Some(method) = optional_choice(config, "volatility", VolatilityMethod::parse)? {
        strategy.windows.volatility_method = method;
    }
    if let Some(window) = optional_positive_int(config, "strategy", "volatility_window")? {
        strategy.windows.volatility = window;
    }
    if let Some(stop) = optional_choice(config, "stop_policy", StopPolicy::parse)? {
        strategy.stop = stop;
    }
    if let Some(entry) = optional_choice(config, "entry", EntryRule::parse)? {
        strategy.entry = entry;
    }
    if let Some(horizon) = optional_positive_int(config, "strategy", "exit_horizon")? {
        strategy.exit_horizon = horizon;
    }
    if let Some(sizing) = optional_choice(config, "sizing", SizingMode::parse)? {
        strategy.sizing = sizing;
    }

    Ok(strategy)
}

pub fn build_data_port(config: &dyn ConfigPort) -> Result<Box<dyn DataPort>, ScannerError> {
    match data_source(config)?.as_str() {
        "csv" => {
            let dir = required_string(config, "data", "csv_dir")?;
            Ok(Box::new(CsvAdapter::new(PathBuf::from(dir))))
        }
        _ => build_polygon_port(config),
    }
}

#[cfg(feature = "polygon")]
fn build_polygon_port(config: &dyn ConfigPort) -> Result<Box<dyn DataPort>, ScannerError> {
    use crate::adapters::polygon_adapter::PolygonAdapter;
    use crate::adapters::retry::{ExponentialBackoff, NoRetry, RetryingDataPort};
    use crate::domain::config_validation::optional_non_negative_int;
    use std::time::Duration;

    let adapter = PolygonAdapter::new(required_string(config, "api", "polygon_api_key")?)?;
    let max_retries = optional_non_negative_int(config, "data", "max_retries")?.unwrap_or(0);
    let base_delay = optional_non_negative_int(config, "data", "retry_base_delay_ms")?.unwrap_or(500);

    if max_retries == 0 {
        return Ok(Box::new(RetryingDataPort::new(adapter, NoRetry)));
    }
    let policy = ExponentialBackoff::new(
        u32::try_from(max_retries).unwrap_or(u32::MAX),
        Duration::from_millis(base_delay as u64),
    );
    Ok(Box::new(RetryingDataPort::new(adapter, policy)))
}

#[cfg(not(feature = "polygon"))]
fn build_polygon_port(_config: &dyn ConfigPort) -> Result<Box<dyn DataPort>, ScannerError> {
    Err(ScannerError::invalid(
        "data",
        "source",
        "built without the polygon feature; use source = csv",
    ))
}

fn symbol_list_error(e: UniverseError) -> ScannerError {
    ScannerError::invalid("backtest", "symbols", e.to_string())
}

/// `--symbols`, then `[backtest] symbols`, then the watchlist file.
pub fn resolve_symbols(
    symbols_override: Option<&str>,
    config: &dyn ConfigPort,
) -> Result<Vec<String>, ScannerError> {
    if let Some(list) = symbols_override {
        return parse_symbols(list).map_err(symbol_list_error);
    }
    if let Some(list) = config.get_string("backtest", "symbols") {
        return parse_symbols(&list).map_err(symbol_list_error);
    }
    match config.get_string("backtest", "watchlist") {
        Some(path) => CsvWatchlistAdapter::new(path).load_symbols(),
        None => Err(ScannerError::missing("backtest", "symbols")),
    }
}

/// Regime of the benchmark; `Unknown` when its data cannot be fetched.
fn benchmark_regime(
    data_port: &dyn DataPort,
    symbol: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> MarketRegime {
    match data_port.fetch_daily_bars(symbol, start_date, end_date) {
        Ok(bars) => regime::classify(&bars),
        Err(e) => {
            warn!(symbol = %symbol, error = %e, "benchmark unavailable");
            MarketRegime::Unknown
        }
    }
}

fn benchmark_symbol(config: &dyn ConfigPort) -> String {
    config
        .get_string("backtest", "benchmark")
        .map(|s| s.to_uppercase())
        .unwrap_or_else(|| DEFAULT_BENCHMARK.to_string())
}

fn run_scan(config_path: &Path, symbols_override: Option<&str>) -> Result<(), ScannerError> {
    let adapter = load_config(config_path)?;
    validate_all(&adapter)?;

    let strategy = build_strategy(&adapter)?;
    let bt_config = build_backtest_config(&adapter, &strategy)?;
    let symbols = resolve_symbols(symbols_override, &adapter)?;
    let data_port = build_data_port(&adapter)?;

    let benchmark = benchmark_symbol(&adapter);
    let market = benchmark_regime(data_port.as_ref(), &benchmark, bt_config.start_date, bt_config.end_date);
    println!("Market regime ({}): {}", benchmark, market);

    info!(
        symbols = symbols.len(),
        pattern = %strategy.pattern,
        provider = data_port.name(),
        "scanning"
    );
    let result = scanner::run_scan(data_port.as_ref(), &symbols, &strategy, &bt_config);
    print_scan(&result);
    Ok(())
}

fn run_backtest(
    config_path: &Path,
    output_path: Option<&Path>,
    symbols_override: Option<&str>,
    candidates_only: bool,
) -> Result<(), ScannerError> {
    // Stage 1: load and validate everything before touching the network
    let adapter = load_config(config_path)?;
    validate_all(&adapter)?;

    let strategy = build_strategy(&adapter)?;
    let bt_config = build_backtest_config(&adapter, &strategy)?;
    let mut symbols = resolve_symbols(symbols_override, &adapter)?;
    let data_port = build_data_port(&adapter)?;

    // Stage 2: market header
    let benchmark = benchmark_symbol(&adapter);
    let market = benchmark_regime(data_port.as_ref(), &benchmark, bt_config.start_date, bt_config.end_date);
    println!("Market regime ({}): {}", benchmark, market);

    // Stage 3: optionally narrow the universe to today's breakouts
    if candidates_only {
        let scan = scanner::run_scan(data_port.as_ref(), &symbols, &strategy, &bt_config);
        symbols = scan.breakout_symbols();
        if symbols.is_empty() {
            println!("No breakout candidates to backtest.");
            return Ok(());
        }
        info!(candidates = %symbols.join(","), "backtesting scan candidates");
    }

    // Stage 4: simulate
    info!(
        symbols = symbols.len(),
        pattern = %strategy.pattern,
        entry = %strategy.entry,
        stop = %strategy.stop,
        horizon = strategy.exit_horizon,
        start = %bt_config.start_date,
        end = %bt_config.end_date,
        "running backtest"
    );
    let result = backtest_engine::run_backtest(data_port.as_ref(), &symbols, &strategy, &bt_config);

    // Stage 5: console summary
    let metrics = Metrics::compute(&result.account);
    print_backtest(&result, &metrics);

    // Stage 6: report files
    if let Some(output) = output_path {
        CsvReportAdapter::new().write(&result, &output.to_string_lossy())?;
        println!("\nTrade log written to: {}", output.display());
        println!(
            "Equity curve written to: {}",
            CsvReportAdapter::equity_path(output).display()
        );
    }

    Ok(())
}

fn run_regime(config_path: &Path, symbol: Option<&str>) -> Result<(), ScannerError> {
    let adapter = load_config(config_path)?;
    validate_data_config(&adapter)?;

    let start_date = required_date(&adapter, "backtest", "start_date")?;
    let end_date = required_date(&adapter, "backtest", "end_date")?;
    let benchmark = symbol
        .map(|s| s.trim().to_uppercase())
        .unwrap_or_else(|| benchmark_symbol(&adapter));
    let data_port = build_data_port(&adapter)?;

    let market = benchmark_regime(data_port.as_ref(), &benchmark, start_date, end_date);
    println!("{}: {}", benchmark, market);
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), ScannerError> {
    let adapter = load_config(config_path)?;
    validate_all(&adapter)?;

    let strategy = build_strategy(&adapter)?;
    let bt_config = build_backtest_config(&adapter, &strategy)?;
    let symbols = resolve_symbols(None, &adapter)?;

    println!("Strategy:");
    println!("  pattern:      {}", strategy.pattern);
    println!(
        "  volatility:   {} ({} bars)",
        strategy.windows.volatility_method, strategy.windows.volatility
    );
    println!("  entry:        {}", strategy.entry);
    println!("  stop:         {}", strategy.stop);
    println!("  exit horizon: {} bars", strategy.exit_horizon);
    println!("  sizing:       {}", strategy.sizing);
    println!("  min history:  {} bars", strategy.required_history());
    println!("\nBacktest:");
    println!("  period:       {} to {}", bt_config.start_date, bt_config.end_date);
    println!("  capital:      {:.2}", bt_config.initial_capital);
    println!("  risk/trade:   {:.2}%", bt_config.risk_fraction * 100.0);
    println!("  symbols:      {}", symbols.join(", "));
    println!("  data source:  {}", data_source(&adapter)?);
    println!("\nConfiguration is valid.");
    Ok(())
}

fn print_skipped(skipped: &[SkippedSymbol]) {
    if skipped.is_empty() {
        return;
    }
    println!("\nSkipped {} symbols:", skipped.len());
    for skip in skipped {
        println!("  {}: {}", skip.symbol, skip.reason);
    }
}

fn print_scan(result: &ScanResult) {
    if result.candidates.is_empty() {
        println!("\nNo candidates found.");
    } else {
        println!(
            "\n{:<8} {:<10} {:>10} {:<12} {:>10} {:>10} {:>10} {:>10}",
            "Symbol", "Date", "Close", "Signal", "Entry", "Stop", "Target", "Size"
        );
        for c in &result.candidates {
            let signal = if c.signal.breakout { "breakout" } else { "pre-breakout" };
            match &c.parameters {
                Some(p) => println!(
                    "{:<8} {:<10} {:>10.2} {:<12} {:>10.2} {:>10.2} {:>10.2} {:>10.2}",
                    c.symbol, c.date, c.close, signal, p.entry_price, p.stop_loss, p.target_price, p.position_size
                ),
                None => println!(
                    "{:<8} {:<10} {:>10.2} {:<12} {:>10} {:>10} {:>10} {:>10}",
                    c.symbol, c.date, c.close, signal, "-", "-", "-", "-"
                ),
            }
        }
    }
    print_skipped(&result.skipped);
}

fn print_backtest(result: &BacktestResult, metrics: &Metrics) {
    if !result.trades().is_empty() {
        println!(
            "\n{:<8} {:<10} {:>10} {:>10} {:>10} {:>10} {:<10} {:>10} {:<9} {:>12}",
            "Symbol", "Entry", "Price", "Stop", "Target", "Size", "Exit", "Price", "Reason", "P/L"
        );
        for t in result.trades() {
            println!(
                "{:<8} {:<10} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:<10} {:>10.2} {:<9} {:>12.2}",
                t.symbol,
                t.entry_date,
                t.entry_price,
                t.stop_loss,
                t.target_price,
                t.quantity,
                t.exit_date,
                t.exit_price,
                t.exit_reason,
                t.pnl
            );
        }
    }

    println!("\n=== Backtest Results ===");
    println!("Symbols Tested:   {}", result.symbols_tested.len());
    println!("Total Trades:     {}", metrics.total_trades);
    println!("Rejected Entries: {}", result.rejected_entries);
    println!("Total P/L:        {:.2}", metrics.total_pnl);
    println!("Total Return:     {:.2}%", metrics.total_return * 100.0);
    println!("Final Capital:    {:.2}", result.final_capital());
    println!("Max Drawdown:     -{:.1}%", metrics.max_drawdown * 100.0);
    println!("Win Rate:         {:.1}%", metrics.win_rate * 100.0);
    println!("Profit Factor:    {:.2}", metrics.profit_factor);
    println!("Avg Win:          {:.2}", metrics.avg_win);
    println!("Avg Loss:         {:.2}", metrics.avg_loss);
    println!("Largest Win:      {:.2}", metrics.largest_win);
    println!("Largest Loss:     {:.2}", metrics.largest_loss);
    println!("Avg Holding Days: {:.1}", metrics.avg_holding_days);

    print_skipped(&result.skipped);
}
