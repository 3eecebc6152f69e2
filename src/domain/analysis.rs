//! Per-request analyses over a [`PricePort`].
//!
//! Each function fetches what it needs from the accessor, turns an empty series
//! into `NotFound`, and hands the data to the pure calculators. Multi-ticker
//! batches fan out over rayon and report each ticker's outcome separately.

use crate::domain::alignment::align_returns;
use crate::domain::correlation::{correlation_from_covariance, covariance_matrix, TickerMatrix};
use crate::domain::date_range::DateRange;
use crate::domain::drawdown::{analyze_drawdown, DrawdownAnalysis};
use crate::domain::error::RiskError;
use crate::domain::ohlcv::{PriceSeries, TickerInfo};
use crate::domain::portfolio::{analyze_portfolio, Holdings, PortfolioAnalysis, PortfolioParams};
use crate::domain::returns::{compute_returns, ReturnKind, ReturnSeries, ReturnStatistics};
use crate::domain::var::{value_at_risk, VarEstimate, VarRequest};
use crate::domain::volatility::{rolling_volatility, RollingVolatility, VolatilitySummary};
use crate::ports::price_port::PricePort;
use chrono::NaiveDate;
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::{debug, warn};

pub const DEFAULT_PRICE_LIMIT: usize = 1000;
pub const DEFAULT_VOLATILITY_WINDOW: usize = 20;

/// Per-ticker outcomes of a batch; one failing ticker never aborts the others.
pub type BatchResult<T> = BTreeMap<String, Result<T, RiskError>>;

fn fetch_required(
    port: &dyn PricePort,
    ticker: &str,
    range: &DateRange,
) -> Result<PriceSeries, RiskError> {
    let series = port.fetch_prices(ticker, range)?;
    if series.is_empty() {
        return Err(RiskError::not_found(ticker));
    }
    debug!(ticker, records = series.len(), "fetched price series");
    Ok(series)
}

fn run_batch<T, F>(tickers: &[String], op: F) -> BatchResult<T>
where
    T: Send,
    F: Fn(&str) -> Result<T, RiskError> + Sync + Send,
{
    tickers
        .par_iter()
        .map(|ticker| {
            let outcome = op(ticker);
            if let Err(e) = &outcome {
                warn!(ticker = %ticker, error = %e, "ticker skipped");
            }
            (ticker.clone(), outcome)
        })
        .collect()
}

/// Up to `limit` most recent records in range, ascending by date.
pub fn price_history(
    port: &dyn PricePort,
    ticker: &str,
    range: &DateRange,
    limit: usize,
) -> Result<PriceSeries, RiskError> {
    if limit == 0 {
        return Err(RiskError::invalid_parameter("limit", "must be at least 1"));
    }
    Ok(port.fetch_prices(ticker, range)?.tail(limit))
}

pub fn price_history_batch(
    port: &dyn PricePort,
    tickers: &[String],
    range: &DateRange,
    limit: usize,
) -> BatchResult<PriceSeries> {
    run_batch(tickers, |t| price_history(port, t, range, limit))
}

pub fn ticker_info(port: &dyn PricePort, ticker: &str) -> Result<TickerInfo, RiskError> {
    port.ticker_info(ticker)?
        .ok_or_else(|| RiskError::not_found(ticker))
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnsReport {
    pub returns: ReturnSeries,
    pub statistics: ReturnStatistics,
}

pub fn returns_report(
    port: &dyn PricePort,
    ticker: &str,
    range: &DateRange,
    kind: ReturnKind,
) -> Result<ReturnsReport, RiskError> {
    let prices = fetch_required(port, ticker, range)?;
    let returns = compute_returns(&prices, kind)?;
    let statistics = ReturnStatistics::compute(&returns)?;
    Ok(ReturnsReport {
        returns,
        statistics,
    })
}

pub fn returns_batch(
    port: &dyn PricePort,
    tickers: &[String],
    range: &DateRange,
    kind: ReturnKind,
) -> BatchResult<ReturnsReport> {
    run_batch(tickers, |t| returns_report(port, t, range, kind))
}

#[derive(Debug, Clone, PartialEq)]
pub struct VolatilityReport {
    pub volatility: RollingVolatility,
    pub summary: VolatilitySummary,
}

/// Rolling volatility of log returns.
pub fn volatility_report(
    port: &dyn PricePort,
    ticker: &str,
    range: &DateRange,
    window: usize,
) -> Result<VolatilityReport, RiskError> {
    if window < 2 {
        return Err(RiskError::invalid_parameter(
            "window",
            format!("must be at least 2, got {window}"),
        ));
    }
    let prices = fetch_required(port, ticker, range)?;
    if prices.len() < window + 1 {
        return Err(RiskError::insufficient(
            format!("{window}-day rolling volatility for {ticker}"),
            prices.len(),
            window + 1,
        ));
    }
    let returns = compute_returns(&prices, ReturnKind::Log)?;
    let volatility = rolling_volatility(&returns, window)?;
    let summary = volatility.summary()?;
    Ok(VolatilityReport {
        volatility,
        summary,
    })
}

pub fn volatility_batch(
    port: &dyn PricePort,
    tickers: &[String],
    range: &DateRange,
    window: usize,
) -> BatchResult<VolatilityReport> {
    run_batch(tickers, |t| volatility_report(port, t, range, window))
}

pub fn drawdown_report(
    port: &dyn PricePort,
    ticker: &str,
    range: &DateRange,
) -> Result<DrawdownAnalysis, RiskError> {
    let prices = fetch_required(port, ticker, range)?;
    analyze_drawdown(&prices)
}

pub fn drawdown_batch(
    port: &dyn PricePort,
    tickers: &[String],
    range: &DateRange,
) -> BatchResult<DrawdownAnalysis> {
    run_batch(tickers, |t| drawdown_report(port, t, range))
}

/// VaR over the ticker's full history, optionally truncated by `request.lookback`.
pub fn var_report(
    port: &dyn PricePort,
    ticker: &str,
    request: &VarRequest,
) -> Result<VarEstimate, RiskError> {
    let prices = fetch_required(port, ticker, &DateRange::unbounded())?;
    value_at_risk(&prices, request)
}

pub fn var_batch(
    port: &dyn PricePort,
    tickers: &[String],
    request: &VarRequest,
) -> BatchResult<VarEstimate> {
    run_batch(tickers, |t| var_report(port, t, request))
}

#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationReport {
    pub tickers: Vec<String>,
    pub return_kind: ReturnKind,
    pub correlation: TickerMatrix,
    pub covariance: TickerMatrix,
    pub observations: usize,
    pub date_range: (NaiveDate, NaiveDate),
}

pub fn correlation_report(
    port: &dyn PricePort,
    tickers: &[String],
    range: &DateRange,
    kind: ReturnKind,
) -> Result<CorrelationReport, RiskError> {
    if tickers.len() < 2 {
        return Err(RiskError::invalid_parameter(
            "tickers",
            format!("need at least 2 tickers, got {}", tickers.len()),
        ));
    }

    let returns: BTreeMap<String, ReturnSeries> = tickers
        .par_iter()
        .map(|ticker| {
            let prices = fetch_required(port, ticker, range)?;
            Ok((ticker.clone(), compute_returns(&prices, kind)?))
        })
        .collect::<Result<_, RiskError>>()?;

    let aligned = align_returns(&returns)?;
    let covariance = covariance_matrix(&aligned)?;
    let correlation = correlation_from_covariance(&covariance)?;
    let date_range = aligned
        .date_range()
        .ok_or_else(|| RiskError::insufficient("correlation observations", 0, 2))?;

    Ok(CorrelationReport {
        tickers: tickers.to_vec(),
        return_kind: kind,
        correlation,
        covariance,
        observations: aligned.len(),
        date_range,
    })
}

pub fn portfolio_report(
    port: &dyn PricePort,
    holdings: &Holdings,
    range: &DateRange,
    params: &PortfolioParams,
) -> Result<PortfolioAnalysis, RiskError> {
    let tickers: Vec<&str> = holdings.tickers().collect();
    let prices: BTreeMap<String, PriceSeries> = tickers
        .par_iter()
        .map(|ticker| Ok((ticker.to_string(), fetch_required(port, ticker, range)?)))
        .collect::<Result<_, RiskError>>()?;

    analyze_portfolio(holdings, &prices, params)
}
