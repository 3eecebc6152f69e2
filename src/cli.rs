//! CLI definition and dispatch.
//!
//! Every data command loads and validates the INI file, opens the configured
//! store, runs one analysis and prints plain text to stdout. Errors go to stderr
//! and map to the exit code of their [`RiskError`] kind.

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::analysis::{
    self, BatchResult, CorrelationReport, ReturnsReport, VolatilityReport, DEFAULT_PRICE_LIMIT,
};
use crate::domain::config_validation::{
    data_source, validate_analysis_config, AnalysisSettings, DataSource,
};
use crate::domain::date_range::DateRange;
use crate::domain::drawdown::DrawdownAnalysis;
use crate::domain::error::RiskError;
use crate::domain::ohlcv::{PriceSeries, TickerInfo};
use crate::domain::portfolio::{parse_holding, Holdings, PortfolioAnalysis};
use crate::domain::ticker::{parse_tickers, validate_ticker};
use crate::domain::var::{parse_confidence_levels, VarEstimate};
use crate::ports::config_port::ConfigPort;
use crate::ports::price_port::PricePort;

#[derive(Parser, Debug)]
#[command(name = "quantrisk", about = "Risk analytics over daily price histories")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct DataArgs {
    /// INI file with [data] and [analysis] sections
    #[arg(short, long)]
    pub config: PathBuf,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RangeArgs {
    /// First date to include (YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<String>,
    /// Last date to include (YYYY-MM-DD)
    #[arg(long)]
    pub end: Option<String>,
}

impl RangeArgs {
    fn range(&self) -> Result<DateRange, RiskError> {
        DateRange::parse(self.start.as_deref(), self.end.as_deref())
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List tickers available in the store
    Tickers {
        #[command(flatten)]
        data: DataArgs,
    },
    /// Show record count, date span and average volume for a ticker
    Info {
        ticker: String,
        #[command(flatten)]
        data: DataArgs,
    },
    /// Print the most recent price records
    Prices {
        /// Comma-separated tickers
        tickers: String,
        #[command(flatten)]
        data: DataArgs,
        #[command(flatten)]
        range: RangeArgs,
        #[arg(long, default_value_t = DEFAULT_PRICE_LIMIT)]
        limit: usize,
    },
    /// Period returns and summary statistics
    Returns {
        tickers: String,
        #[command(flatten)]
        data: DataArgs,
        #[command(flatten)]
        range: RangeArgs,
        /// simple or log
        #[arg(long)]
        return_type: Option<String>,
    },
    /// Rolling volatility of log returns
    Volatility {
        tickers: String,
        #[command(flatten)]
        data: DataArgs,
        #[command(flatten)]
        range: RangeArgs,
        #[arg(short, long)]
        window: Option<usize>,
    },
    /// Maximum drawdown, trough and recovery
    Drawdown {
        tickers: String,
        #[command(flatten)]
        data: DataArgs,
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Value-at-Risk over the full history
    Var {
        tickers: String,
        #[command(flatten)]
        data: DataArgs,
        /// Comma-separated confidence levels, e.g. 0.95,0.99
        #[arg(long)]
        confidence: Option<String>,
        /// historical or gaussian
        #[arg(long)]
        method: Option<String>,
        /// Use only the most recent N prices
        #[arg(long)]
        lookback: Option<usize>,
    },
    /// Correlation and covariance of aligned returns
    Correlation {
        /// At least two comma-separated tickers
        tickers: String,
        #[command(flatten)]
        data: DataArgs,
        #[command(flatten)]
        range: RangeArgs,
        #[arg(long)]
        return_type: Option<String>,
    },
    /// Portfolio return, volatility and Sharpe ratio
    Portfolio {
        /// TICKER=WEIGHT, repeatable
        #[arg(long = "holding", required = true)]
        holdings: Vec<String>,
        #[command(flatten)]
        data: DataArgs,
        #[command(flatten)]
        range: RangeArgs,
        #[arg(long)]
        risk_free_rate: Option<f64>,
    },
    /// Load DATE,OPEN,HIGH,LOW,CLOSE,VOLUME files into the SQLite store
    Import {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[command(flatten)]
        data: DataArgs,
    },
    /// Validate a configuration file
    Validate {
        #[command(flatten)]
        data: DataArgs,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Tickers { data } => finish(run_tickers(&data.config)),
        Command::Info { ticker, data } => finish(run_info(&data.config, &ticker)),
        Command::Prices {
            tickers,
            data,
            range,
            limit,
        } => finish_batch(run_prices(&data.config, &tickers, &range, limit)),
        Command::Returns {
            tickers,
            data,
            range,
            return_type,
        } => finish_batch(run_returns(
            &data.config,
            &tickers,
            &range,
            return_type.as_deref(),
        )),
        Command::Volatility {
            tickers,
            data,
            range,
            window,
        } => finish_batch(run_volatility(&data.config, &tickers, &range, window)),
        Command::Drawdown {
            tickers,
            data,
            range,
        } => finish_batch(run_drawdown(&data.config, &tickers, &range)),
        Command::Var {
            tickers,
            data,
            confidence,
            method,
            lookback,
        } => finish_batch(run_var(
            &data.config,
            &tickers,
            confidence.as_deref(),
            method.as_deref(),
            lookback,
        )),
        Command::Correlation {
            tickers,
            data,
            range,
            return_type,
        } => finish(run_correlation(
            &data.config,
            &tickers,
            &range,
            return_type.as_deref(),
        )),
        Command::Portfolio {
            holdings,
            data,
            range,
            risk_free_rate,
        } => finish(run_portfolio(&data.config, &holdings, &range, risk_free_rate)),
        Command::Import { files, data } => finish(run_import(&data.config, &files)),
        Command::Validate { data } => finish(run_validate(&data.config)),
    }
}

fn finish(result: Result<String, RiskError>) -> ExitCode {
    match result {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Succeeds when at least one ticker produced output.
fn finish_batch(result: Result<(String, Option<RiskError>), RiskError>) -> ExitCode {
    match result {
        Ok((output, None)) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Ok((output, Some(e))) => {
            println!("{output}");
            eprintln!("error: no ticker could be analysed");
            (&e).into()
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, RiskError> {
    let config = FileConfigAdapter::from_file(path)?;
    validate_analysis_config(&config)?;
    Ok(config)
}

/// Opens the store named by `[data] source` and `[data] path`.
pub fn open_store(config: &dyn ConfigPort) -> Result<Box<dyn PricePort>, RiskError> {
    match data_source(config)? {
        DataSource::Csv => {
            let path = config
                .get_string("data", "path")
                .ok_or_else(|| RiskError::ConfigMissing {
                    section: "data".into(),
                    key: "path".into(),
                })?;
            Ok(Box::new(CsvAdapter::new(PathBuf::from(path))))
        }
        #[cfg(feature = "sqlite")]
        DataSource::Sqlite => {
            let store = crate::adapters::sqlite_adapter::SqliteAdapter::from_config(config)?;
            store.initialize_schema()?;
            Ok(Box::new(store))
        }
        #[cfg(not(feature = "sqlite"))]
        DataSource::Sqlite => Err(RiskError::ConfigInvalid {
            section: "data".into(),
            key: "source".into(),
            reason: "sqlite feature is not enabled in this build".into(),
        }),
    }
}

fn prepare(config_path: &Path) -> Result<(Box<dyn PricePort>, AnalysisSettings), RiskError> {
    let config = load_config(config_path)?;
    let settings = AnalysisSettings::from_config(&config)?;
    let store = open_store(&config)?;
    Ok((store, settings))
}

fn run_tickers(config_path: &Path) -> Result<String, RiskError> {
    let (store, _) = prepare(config_path)?;
    Ok(render_tickers(&store.list_tickers()?))
}

fn run_info(config_path: &Path, ticker: &str) -> Result<String, RiskError> {
    let ticker = validate_ticker(ticker)?;
    let (store, _) = prepare(config_path)?;
    Ok(render_info(&analysis::ticker_info(store.as_ref(), &ticker)?))
}

fn run_prices(
    config_path: &Path,
    tickers: &str,
    range: &RangeArgs,
    limit: usize,
) -> Result<(String, Option<RiskError>), RiskError> {
    let tickers = parse_tickers(tickers, 1)?;
    let range = range.range()?;
    let (store, _) = prepare(config_path)?;
    let results = analysis::price_history_batch(store.as_ref(), &tickers, &range, limit);
    Ok(render_batch(results, render_prices))
}

pub fn run_returns(
    config_path: &Path,
    tickers: &str,
    range: &RangeArgs,
    return_type: Option<&str>,
) -> Result<(String, Option<RiskError>), RiskError> {
    let tickers = parse_tickers(tickers, 1)?;
    let range = range.range()?;
    let (store, settings) = prepare(config_path)?;
    let kind = match return_type {
        Some(raw) => raw.parse()?,
        None => settings.return_kind,
    };
    let results = analysis::returns_batch(store.as_ref(), &tickers, &range, kind);
    Ok(render_batch(results, render_returns))
}

fn run_volatility(
    config_path: &Path,
    tickers: &str,
    range: &RangeArgs,
    window: Option<usize>,
) -> Result<(String, Option<RiskError>), RiskError> {
    let tickers = parse_tickers(tickers, 1)?;
    let range = range.range()?;
    let (store, settings) = prepare(config_path)?;
    let window = window.unwrap_or(settings.window);
    let results = analysis::volatility_batch(store.as_ref(), &tickers, &range, window);
    Ok(render_batch(results, render_volatility))
}

fn run_drawdown(
    config_path: &Path,
    tickers: &str,
    range: &RangeArgs,
) -> Result<(String, Option<RiskError>), RiskError> {
    let tickers = parse_tickers(tickers, 1)?;
    let range = range.range()?;
    let (store, _) = prepare(config_path)?;
    let results = analysis::drawdown_batch(store.as_ref(), &tickers, &range);
    Ok(render_batch(results, render_drawdown))
}

pub fn run_var(
    config_path: &Path,
    tickers: &str,
    confidence: Option<&str>,
    method: Option<&str>,
    lookback: Option<usize>,
) -> Result<(String, Option<RiskError>), RiskError> {
    let tickers = parse_tickers(tickers, 1)?;
    let (store, settings) = prepare(config_path)?;
    let mut request = settings.var_request(lookback);
    if let Some(raw) = confidence {
        request.confidence_levels = parse_confidence_levels(raw)?;
    }
    if let Some(raw) = method {
        request.method = raw.parse()?;
    }
    let results = analysis::var_batch(store.as_ref(), &tickers, &request);
    Ok(render_batch(results, render_var))
}

fn run_correlation(
    config_path: &Path,
    tickers: &str,
    range: &RangeArgs,
    return_type: Option<&str>,
) -> Result<String, RiskError> {
    let tickers = parse_tickers(tickers, 2)?;
    let range = range.range()?;
    let (store, settings) = prepare(config_path)?;
    let kind = match return_type {
        Some(raw) => raw.parse()?,
        None => settings.return_kind,
    };
    let report = analysis::correlation_report(store.as_ref(), &tickers, &range, kind)?;
    Ok(render_correlation(&report))
}

pub fn run_portfolio(
    config_path: &Path,
    holdings: &[String],
    range: &RangeArgs,
    risk_free_rate: Option<f64>,
) -> Result<String, RiskError> {
    let holdings = build_holdings(holdings)?;
    let range = range.range()?;
    let (store, settings) = prepare(config_path)?;
    let mut params = settings.portfolio_params();
    if let Some(rate) = risk_free_rate {
        params.risk_free_rate = rate;
    }
    let report = analysis::portfolio_report(store.as_ref(), &holdings, &range, &params)?;
    Ok(render_portfolio(&report))
}

pub fn build_holdings(raw: &[String]) -> Result<Holdings, RiskError> {
    let pairs = raw
        .iter()
        .map(|h| {
            let (ticker, weight) = parse_holding(h)?;
            Ok((validate_ticker(&ticker)?, weight))
        })
        .collect::<Result<Vec<_>, RiskError>>()?;
    Holdings::new(pairs)
}

fn run_import(config_path: &Path, files: &[PathBuf]) -> Result<String, RiskError> {
    let config = load_config(config_path)?;
    if data_source(&config)? != DataSource::Sqlite {
        return Err(RiskError::ConfigInvalid {
            section: "data".into(),
            key: "source".into(),
            reason: "import requires source = sqlite".into(),
        });
    }

    #[cfg(feature = "sqlite")]
    {
        let store = crate::adapters::sqlite_adapter::SqliteAdapter::from_config(&config)?;
        store.initialize_schema()?;
        let mut lines = Vec::with_capacity(files.len());
        for file in files {
            let (ticker, inserted) = store.import_csv(file)?;
            lines.push(format!("{ticker}: {inserted} rows imported"));
        }
        Ok(lines.join("\n"))
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = files;
        Err(RiskError::ConfigInvalid {
            section: "data".into(),
            key: "source".into(),
            reason: "sqlite feature is not enabled in this build".into(),
        })
    }
}

fn run_validate(config_path: &Path) -> Result<String, RiskError> {
    let config = load_config(config_path)?;
    let settings = AnalysisSettings::from_config(&config)?;
    Ok(format!(
        "Configuration valid: source={}, window={}, var_method={}, return_type={}",
        data_source(&config)?,
        settings.window,
        settings.var_method,
        settings.return_kind
    ))
}

/// Renders each ticker's block in order; the error is set only when every ticker failed.
pub fn render_batch<T>(
    results: BatchResult<T>,
    render: impl Fn(&str, &T) -> String,
) -> (String, Option<RiskError>) {
    let mut blocks = Vec::with_capacity(results.len());
    let mut first_error = None;
    let mut any_ok = false;

    for (ticker, outcome) in results {
        match outcome {
            Ok(value) => {
                any_ok = true;
                blocks.push(render(&ticker, &value));
            }
            Err(e) => {
                blocks.push(format!("{ticker}: error: {e}"));
                first_error.get_or_insert(e);
            }
        }
    }

    let failure = if any_ok { None } else { first_error };
    (blocks.join("\n\n"), failure)
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.6}"))
}

pub fn render_tickers(tickers: &[String]) -> String {
    if tickers.is_empty() {
        return "No tickers available".to_string();
    }
    let mut lines = vec![format!("{} tickers", tickers.len())];
    lines.extend(tickers.iter().cloned());
    lines.join("\n")
}

pub fn render_info(info: &TickerInfo) -> String {
    [
        format!("=== {} ===", info.ticker),
        format!("Records:        {}", info.record_count),
        format!("First date:     {}", info.earliest_date),
        format!("Last date:      {}", info.latest_date),
        format!("Average volume: {:.0}", info.avg_volume),
    ]
    .join("\n")
}

pub fn render_prices(ticker: &str, series: &PriceSeries) -> String {
    let mut lines = vec![
        format!("=== {ticker} ({} records) ===", series.len()),
        "date,open,high,low,close,volume".to_string(),
    ];
    lines.extend(series.records().iter().map(|r| {
        format!(
            "{},{},{},{},{},{}",
            r.date, r.open, r.high, r.low, r.close, r.volume
        )
    }));
    lines.join("\n")
}

pub fn render_returns(ticker: &str, report: &ReturnsReport) -> String {
    let stats = &report.statistics;
    let mut lines = vec![
        format!("=== {ticker} {} returns ===", report.returns.kind),
        format!("Count:     {}", stats.count),
        format!("Mean:      {:.6}", stats.mean),
        format!("Std:       {}", fmt_opt(stats.std)),
        format!("Min:       {:.6}", stats.min),
        format!("Max:       {:.6}", stats.max),
        format!("Median:    {:.6}", stats.median),
        format!("Skewness:  {}", fmt_opt(stats.skewness)),
        format!("Kurtosis:  {}", fmt_opt(stats.kurtosis)),
        format!("VaR_95:    {:.6}", stats.var_95),
        "date,return".to_string(),
    ];
    lines.extend(
        report
            .returns
            .points
            .iter()
            .map(|p| format!("{},{:.6}", p.date, p.value)),
    );
    lines.join("\n")
}

pub fn render_volatility(ticker: &str, report: &VolatilityReport) -> String {
    let s = &report.summary;
    let mut lines = vec![
        format!("=== {ticker} {}-day volatility ===", report.volatility.window),
        format!("Current:   {:.6}", s.current),
        format!("Mean:      {:.6}", s.mean),
        format!("Min:       {:.6}", s.min),
        format!("Max:       {:.6}", s.max),
        format!("Median:    {:.6}", s.median),
        "date,volatility".to_string(),
    ];
    lines.extend(
        report
            .volatility
            .points
            .iter()
            .map(|p| format!("{},{:.6}", p.date, p.value)),
    );
    lines.join("\n")
}

pub fn render_drawdown(ticker: &str, dd: &DrawdownAnalysis) -> String {
    [
        format!("=== {ticker} drawdown ==="),
        format!("Max drawdown:  {:.2}%", dd.max_drawdown_percent()),
        format!("Peak date:     {}", dd.peak_date),
        format!("Trough date:   {}", dd.trough_date),
        format!(
            "Recovery date: {}",
            dd.recovery_date
                .map_or_else(|| "not recovered".to_string(), |d| d.to_string())
        ),
        format!("Observations:  {}", dd.observation_count()),
    ]
    .join("\n")
}

pub fn render_var(ticker: &str, estimate: &VarEstimate) -> String {
    let mut lines = vec![
        format!("=== {ticker} {} VaR ===", estimate.method),
        format!("Observations:    {}", estimate.observations),
        format!("Expected return: {:.6}", estimate.expected_return),
        format!("Volatility:      {}", fmt_opt(estimate.volatility)),
    ];
    lines.extend(
        estimate
            .levels
            .iter()
            .map(|l| format!("{:<16} {:.6}", format!("{}:", l.label()), l.value)),
    );
    lines.join("\n")
}

fn render_matrix(title: &str, tickers: &[String], rows: &[Vec<f64>]) -> Vec<String> {
    let mut lines = vec![
        title.to_string(),
        format!("{:<8}{}", "", tickers.iter().map(|t| format!("{t:>12}")).collect::<String>()),
    ];
    for (ticker, row) in tickers.iter().zip(rows) {
        lines.push(format!(
            "{ticker:<8}{}",
            row.iter().map(|v| format!("{v:>12.6}")).collect::<String>()
        ));
    }
    lines
}

pub fn render_correlation(report: &CorrelationReport) -> String {
    let (first, last) = report.date_range;
    let mut lines = vec![
        format!("=== Correlation ({} returns) ===", report.return_kind),
        format!("Observations: {}", report.observations),
        format!("Date range:   {first} to {last}"),
        String::new(),
    ];
    lines.extend(render_matrix(
        "Correlation",
        report.correlation.tickers(),
        report.correlation.rows(),
    ));
    lines.push(String::new());
    lines.extend(render_matrix(
        "Covariance",
        report.covariance.tickers(),
        report.covariance.rows(),
    ));
    lines.join("\n")
}

pub fn render_portfolio(report: &PortfolioAnalysis) -> String {
    let m = &report.metrics;
    let (first, last) = report.date_range;
    let mut lines = vec!["=== Portfolio ===".to_string()];
    lines.extend(
        report
            .holdings
            .iter()
            .map(|(ticker, weight)| format!("  {ticker:<6} {:>6.2}%", weight * 100.0)),
    );
    lines.extend([
        format!("Observations:          {}", report.observations),
        format!("Date range:            {first} to {last}"),
        format!("Daily return:          {:.6}", m.daily_return),
        format!("Daily volatility:      {:.6}", m.daily_volatility),
        format!("Annualized return:     {:.2}%", m.annualized_return * 100.0),
        format!("Annualized volatility: {:.2}%", m.annualized_volatility * 100.0),
        format!("Sharpe ratio:          {:.3}", m.sharpe_ratio),
        format!("Risk-free rate:        {:.2}%", m.risk_free_rate * 100.0),
    ]);
    match &report.correlation {
        Some(corr) => {
            lines.push(String::new());
            lines.extend(render_matrix("Correlation", corr.tickers(), corr.rows()));
        }
        None => lines.push("Correlation:           n/a (zero-variance holding)".to_string()),
    }
    lines.join("\n")
}
