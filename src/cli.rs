//! CLI definition and dispatch.

use chrono::{Duration, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;

use crate::adapters::csv_adapter::CsvPriceAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_snapshot_adapter::JsonSnapshotAdapter;
use crate::adapters::transaction_log_adapter::TransactionLogAdapter;
use crate::domain::config_validation::{
    parse_date, require_string, validate_config, weights, window_pair,
};
use crate::domain::error::RatioTraderError;
use crate::domain::metrics::PerformanceSummary;
use crate::domain::portfolio::Portfolio;
use crate::domain::price_table::PriceTable;
use crate::domain::ratio::normalize;
use crate::domain::returns::{solve_portfolio, ReturnComparison};
use crate::domain::signal::{SignalEngine, SignalReport};
use crate::domain::simulation::{SimulationConfig, SimulationDriver, SimulationResult};
use crate::domain::strategy::{RelativeStrengthStrategy, Strategy};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::PriceDataPort;
use crate::ports::persistence_port::SnapshotPort;

#[derive(Parser, Debug)]
#[command(name = "ratiotrader", about = "Relative-strength portfolio backtester")]
pub struct Cli {
    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a simulation and save the resulting portfolio
    Simulate {
        #[arg(short, long)]
        config: PathBuf,
        /// Continue the saved portfolio instead of starting fresh
        #[arg(long)]
        resume: bool,
    },
    /// Print the signal table as of a date
    Analyze {
        #[arg(short, long)]
        config: PathBuf,
        /// Defaults to [simulation] end_date
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    /// Report holdings and returns of the saved portfolio
    Report {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Simulate { config, resume } => run_simulate(&config, resume),
        Command::Analyze { config, as_of } => run_analyze(&config, as_of),
        Command::Report { config } => run_report(&config),
        Command::Validate { config } => run_validate(&config),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(&e)
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, RatioTraderError> {
    eprintln!("Loading config from {}", path.display());
    FileConfigAdapter::from_file(path)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PersistenceSettings {
    pub directory: Option<PathBuf>,
    pub autosave: bool,
    pub log_transactions: bool,
}

/// Everything a run needs from the config file, validated.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub name: String,
    pub prices: PathBuf,
    pub benchmark: String,
    pub tickers: Vec<String>,
    pub simulation: SimulationConfig,
    pub risk_free_rate: f64,
    pub persistence: PersistenceSettings,
}

pub fn build_run_settings(adapter: &dyn ConfigPort) -> Result<RunSettings, RatioTraderError> {
    validate_config(adapter)?;

    let tickers = adapter
        .get_list("simulation", "tickers")
        .unwrap_or_default();

    Ok(RunSettings {
        name: adapter
            .get_string("simulation", "name")
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "portfolio".to_string()),
        prices: PathBuf::from(require_string(adapter, "data", "prices")?),
        benchmark: require_string(adapter, "simulation", "benchmark")?,
        tickers,
        simulation: SimulationConfig {
            start_date: parse_date(adapter, "simulation", "start_date")?,
            end_date: parse_date(adapter, "simulation", "end_date")?,
            buy_power: adapter.get_double("simulation", "buy_power", 0.0),
        },
        risk_free_rate: adapter.get_double("simulation", "risk_free_rate", 0.0),
        persistence: PersistenceSettings {
            directory: adapter
                .get_string("persistence", "directory")
                .filter(|d| !d.trim().is_empty())
                .map(|d| PathBuf::from(d.trim())),
            autosave: adapter.get_bool("persistence", "autosave", false),
            log_transactions: adapter.get_bool("persistence", "log_transactions", false),
        },
    })
}

pub fn build_strategy(
    adapter: &dyn ConfigPort,
) -> Result<RelativeStrengthStrategy, RatioTraderError> {
    let benchmark = require_string(adapter, "simulation", "benchmark")?;
    let mut strategy = RelativeStrengthStrategy::new(benchmark, window_pair(adapter)?);
    if let Some(name) = adapter.get_string("strategy", "name") {
        strategy = strategy.with_name(name.trim());
    }
    if let Some(w) = weights(adapter, "initial_weights")? {
        strategy = strategy.with_initial_weights(w);
    }
    if let Some(split) = weights(adapter, "buy_split")? {
        strategy = strategy.with_buy_split(split);
    }
    Ok(strategy)
}

fn load_prices(
    settings: &RunSettings,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<PriceTable, RatioTraderError> {
    eprintln!(
        "Loading prices from {} ({} to {})",
        settings.prices.display(),
        start,
        end
    );
    CsvPriceAdapter::new(&settings.prices).load_prices(&settings.tickers, start, end)
}

fn earliest_deposit(portfolio: &Portfolio) -> Option<NaiveDate> {
    portfolio.deposits().iter().map(|(date, _)| *date).min()
}

fn snapshot_store(settings: &RunSettings) -> Result<JsonSnapshotAdapter, RatioTraderError> {
    settings
        .persistence
        .directory
        .as_ref()
        .map(JsonSnapshotAdapter::new)
        .ok_or_else(|| RatioTraderError::ConfigMissing {
            section: "persistence".into(),
            key: "directory".into(),
        })
}

fn load_snapshot(
    settings: &RunSettings,
    context: PriceTable,
) -> Result<Portfolio, RatioTraderError> {
    let snapshot = snapshot_store(settings)?
        .load(&settings.name)?
        .ok_or_else(|| RatioTraderError::Snapshot {
            reason: format!("no saved portfolio named {}", settings.name),
        })?;
    Ok(Portfolio::restore(snapshot, context))
}

#[derive(Debug)]
pub struct SimulationOutcome {
    pub result: SimulationResult,
    pub summary: PerformanceSummary,
    pub returns: ReturnComparison,
}

/// Load, simulate, persist and summarize. Does no printing of results.
pub fn run_simulation_pipeline(
    adapter: &dyn ConfigPort,
    resume: bool,
) -> Result<SimulationOutcome, RatioTraderError> {
    let settings = build_run_settings(adapter)?;
    let strategy = build_strategy(adapter)?;
    let windows = strategy.windows();
    let sim = settings.simulation.clone();
    let mut first = sim.start_date - Duration::days(windows.far_days);

    let seed = if resume {
        // probe for the saved deposits so the price window covers them
        let probe = load_snapshot(&settings, PriceTable::empty())?;
        if let Some(earliest) = earliest_deposit(&probe) {
            first = first.min(earliest);
        }
        Some(probe)
    } else {
        None
    };

    let prices = load_prices(&settings, first, sim.end_date)?;
    info!(
        rows = prices.len(),
        tickers = prices.tickers().len(),
        strategy = strategy.name(),
        near = windows.near_days,
        far = windows.far_days,
        "prices loaded"
    );

    let mut driver = match seed {
        Some(mut portfolio) => {
            portfolio.set_context(prices.view_through(sim.start_date));
            SimulationDriver::with_portfolio(portfolio, prices, strategy, sim)
        }
        None => SimulationDriver::new(settings.name.clone(), prices, strategy, sim),
    };

    if let Some(dir) = &settings.persistence.directory {
        if settings.persistence.autosave {
            driver = driver.with_hook(Box::new(JsonSnapshotAdapter::new(dir)));
        }
        if settings.persistence.log_transactions {
            driver = driver.with_hook(Box::new(TransactionLogAdapter::new(dir)));
        }
    }

    eprintln!("Running simulation for {}", settings.name);
    let result = driver.run()?;

    if let Some(dir) = &settings.persistence.directory {
        let store = JsonSnapshotAdapter::new(dir);
        store.save(&result.portfolio.snapshot())?;
        eprintln!(
            "Saved portfolio to {}",
            store.snapshot_path(&settings.name).display()
        );
    }

    let summary = PerformanceSummary::compute(&result.equity_curve, settings.risk_free_rate);
    let returns = solve_portfolio(&result.portfolio, &settings.benchmark)?;
    Ok(SimulationOutcome {
        result,
        summary,
        returns,
    })
}

fn run_simulate(config_path: &Path, resume: bool) -> Result<(), RatioTraderError> {
    let adapter = load_config(config_path)?;
    let outcome = run_simulation_pipeline(&adapter, resume)?;

    let s = &outcome.summary;
    println!("=== Simulation Results ===");
    println!("Trading Days:     {}", s.trading_days);
    println!("Total Return:     {:.2}%", s.total_return * 100.0);
    println!("Annualized:       {:.2}%", s.annualized_return * 100.0);
    println!("Sharpe Ratio:     {:.2}", s.sharpe_ratio);
    println!("Sortino Ratio:    {:.2}", s.sortino_ratio);
    println!("Max Drawdown:     -{:.1}%", s.max_drawdown * 100.0);
    println!(
        "Transactions:     {}",
        outcome.result.portfolio.history().len()
    );
    println!();
    print_holdings(&outcome.result.portfolio)?;
    println!();
    print_returns(&outcome.returns);
    Ok(())
}

/// Signal report as of `as_of` (default: the configured end date).
pub fn run_analysis_pipeline(
    adapter: &dyn ConfigPort,
    as_of: Option<NaiveDate>,
) -> Result<SignalReport, RatioTraderError> {
    let settings = build_run_settings(adapter)?;
    let windows = window_pair(adapter)?;
    let as_of = as_of.unwrap_or(settings.simulation.end_date);

    let prices = load_prices(
        &settings,
        as_of - Duration::days(windows.far_days),
        as_of,
    )?;
    let ratios = normalize(&prices, &settings.benchmark)?;
    SignalEngine::new(windows).evaluate(&ratios, as_of)
}

fn run_analyze(config_path: &Path, as_of: Option<NaiveDate>) -> Result<(), RatioTraderError> {
    let adapter = load_config(config_path)?;
    let report = run_analysis_pipeline(&adapter, as_of)?;
    print_signals(&report);
    Ok(())
}

/// Saved portfolio valued against prices through the configured end date.
pub fn run_report_pipeline(
    adapter: &dyn ConfigPort,
) -> Result<(Portfolio, ReturnComparison), RatioTraderError> {
    let settings = build_run_settings(adapter)?;
    let probe = load_snapshot(&settings, PriceTable::empty())?;
    let first = earliest_deposit(&probe).unwrap_or(settings.simulation.start_date);

    let prices = load_prices(&settings, first, settings.simulation.end_date)?;
    let mut portfolio = probe;
    portfolio.set_context(prices);
    let returns = solve_portfolio(&portfolio, &settings.benchmark)?;
    Ok((portfolio, returns))
}

fn run_report(config_path: &Path) -> Result<(), RatioTraderError> {
    let adapter = load_config(config_path)?;
    let (portfolio, returns) = run_report_pipeline(&adapter)?;
    println!("=== Portfolio {} ===", portfolio.name());
    print_holdings(&portfolio)?;
    println!();
    print_returns(&returns);
    Ok(())
}

/// Columns of the price file, failing on the first configured ticker it lacks.
pub fn check_price_columns(settings: &RunSettings) -> Result<Vec<String>, RatioTraderError> {
    let available = CsvPriceAdapter::new(&settings.prices).list_tickers()?;
    let wanted = std::iter::once(&settings.benchmark).chain(settings.tickers.iter());
    for ticker in wanted {
        if !available.contains(ticker) {
            return Err(RatioTraderError::MissingColumn {
                column: ticker.clone(),
            });
        }
    }
    Ok(available)
}

fn run_validate(config_path: &Path) -> Result<(), RatioTraderError> {
    let adapter = load_config(config_path)?;
    let settings = build_run_settings(&adapter)?;
    let strategy = build_strategy(&adapter)?;
    let windows = strategy.windows();
    let available = check_price_columns(&settings)?;

    eprintln!("Config validated successfully");
    println!("Portfolio:  {}", settings.name);
    println!(
        "Period:     {} to {}",
        settings.simulation.start_date, settings.simulation.end_date
    );
    println!("Buy power:  {:.2}", settings.simulation.buy_power);
    println!("Benchmark:  {}", settings.benchmark);
    println!(
        "Strategy:   {} (near {} days, far {} days)",
        strategy.name(),
        windows.near_days,
        windows.far_days
    );
    if settings.tickers.is_empty() {
        println!("Tickers:    all {} columns of {}", available.len(), settings.prices.display());
    } else {
        println!("Tickers:    {}", settings.tickers.join(", "));
    }
    Ok(())
}

fn print_holdings(portfolio: &Portfolio) -> Result<(), RatioTraderError> {
    println!(
        "{:<10} {:>12} {:>12} {:>12} {:>14} {:>14}",
        "Ticker", "Shares", "Avg Cost", "Last", "Value", "P&L"
    );
    for line in portfolio.holdings_report()? {
        println!(
            "{:<10} {:>12.3} {:>12.3} {:>12.3} {:>14.3} {:>14.3}",
            line.stock.ticker,
            line.stock.num_shares,
            line.stock.avg_cost,
            line.price,
            line.value,
            line.unrealized_pnl
        );
    }
    println!("{:<10} {:>66.3}", "Cash", portfolio.cash());
    println!("{:<10} {:>66.3}", "Total", portfolio.current_value()?);
    Ok(())
}

fn print_returns(returns: &ReturnComparison) {
    println!("=== Returns as of {} ===", returns.valuation_date);
    println!(
        "Portfolio:  {:>14.3}  {:>+8.2}%/yr",
        returns.value,
        (returns.rate - 1.0) * 100.0
    );
    println!(
        "Benchmark:  {:>14.3}  {:>+8.2}%/yr",
        returns.benchmark_value,
        (returns.benchmark_rate - 1.0) * 100.0
    );
    println!("Excess:     {:>+24.2}%/yr", returns.excess_pct());
}

fn print_signals(report: &SignalReport) {
    let windows = report.windows();
    println!(
        "=== Signals as of {} (near {} days, far {} days, multiplier {:.3}) ===",
        report.as_of(),
        windows.near_days,
        windows.far_days,
        report.multiplier()
    );
    println!(
        "{:<10} {:>10} {:>10} {:>10} {:>10} {:>10}",
        "Ticker", "Latest", "Near", "Far", "Potential", "Metric"
    );
    for row in report.ranked() {
        println!(
            "{:<10} {:>10.3} {:>10.3} {:>10.3} {:>10.4} {:>10.3}",
            row.ticker, row.latest, row.near_range, row.far_range, row.potential, row.metric
        );
    }
    for (ticker, err) in report.indeterminate() {
        println!("{:<10} {}", ticker, err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    const CONFIG: &str = r#"
[data]
prices = prices.csv

[simulation]
name = demo
start_date = 2024-01-02
end_date = 2024-03-29
buy_power = 10000
benchmark = IDX
tickers = A, B, IDX

[strategy]
name = test strength
horizon = short
initial_weights = 1/2, 1/4
buy_split = 1

[persistence]
directory = out
autosave = false
log_transactions = true
"#;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_simulate_with_global_flags() {
        let cli = Cli::parse_from([
            "ratiotrader",
            "simulate",
            "-c",
            "run.ini",
            "--resume",
            "--log-level",
            "debug",
        ]);
        assert_eq!(cli.log_level, "debug");
        assert!(!cli.json_logs);
        assert!(matches!(cli.command, Command::Simulate { resume: true, .. }));
    }

    #[test]
    fn parses_analyze_date() {
        let cli = Cli::parse_from([
            "ratiotrader",
            "analyze",
            "-c",
            "x.ini",
            "--as-of",
            "2024-02-01",
        ]);
        match cli.command {
            Command::Analyze { as_of, .. } => {
                assert_eq!(as_of, NaiveDate::from_ymd_opt(2024, 2, 1))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn build_run_settings_reads_all_sections() {
        let settings = build_run_settings(&make_config(CONFIG)).unwrap();
        assert_eq!(settings.name, "demo");
        assert_eq!(settings.prices, PathBuf::from("prices.csv"));
        assert_eq!(settings.benchmark, "IDX");
        assert_eq!(settings.tickers, vec!["A", "B", "IDX"]);
        assert_eq!(
            settings.simulation.start_date,
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
        );
        assert!((settings.simulation.buy_power - 10000.0).abs() < f64::EPSILON);
        assert_eq!(settings.persistence.directory, Some(PathBuf::from("out")));
        assert!(!settings.persistence.autosave);
        assert!(settings.persistence.log_transactions);
    }

    #[test]
    fn build_run_settings_defaults_name() {
        let settings =
            build_run_settings(&make_config(&CONFIG.replace("name = demo\n", ""))).unwrap();
        assert_eq!(settings.name, "portfolio");
    }

    #[test]
    fn build_run_settings_rejects_invalid() {
        let err = build_run_settings(&make_config(&CONFIG.replace("buy_power = 10000", "")))
            .unwrap_err();
        assert!(matches!(err, RatioTraderError::ConfigInvalid { .. }));
    }

    #[test]
    fn build_strategy_applies_overrides() {
        let strategy = build_strategy(&make_config(CONFIG)).unwrap();
        assert_eq!(strategy.name(), "test strength");
        assert_eq!(strategy.benchmark(), "IDX");
        assert_eq!(strategy.windows().near_days, 21);
        assert_eq!(strategy.windows().far_days, 91);
    }

    #[test]
    fn snapshot_store_requires_directory() {
        let mut settings = build_run_settings(&make_config(CONFIG)).unwrap();
        settings.persistence.directory = None;
        assert!(matches!(
            snapshot_store(&settings),
            Err(RatioTraderError::ConfigMissing { .. })
        ));
    }
}
