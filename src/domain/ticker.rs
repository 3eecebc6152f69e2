//! Ticker symbol validation and ticker-list parsing.

use crate::domain::error::RiskError;
use std::collections::HashSet;

pub const MAX_TICKER_LEN: usize = 5;

/// Trims and upper-cases a ticker, rejecting empty, non-alphabetic or over-long symbols.
pub fn validate_ticker(input: &str) -> Result<String, RiskError> {
    let ticker = input.trim().to_uppercase();
    if ticker.is_empty() {
        return Err(RiskError::invalid_parameter("ticker", "cannot be empty"));
    }
    if !ticker.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(RiskError::invalid_parameter(
            "ticker",
            format!("must contain only letters: {ticker}"),
        ));
    }
    if ticker.len() > MAX_TICKER_LEN {
        return Err(RiskError::invalid_parameter(
            "ticker",
            format!("too long (max {MAX_TICKER_LEN} chars): {ticker}"),
        ));
    }
    Ok(ticker)
}

/// Parses a comma-separated ticker list such as `aapl, msft`.
pub fn parse_tickers(input: &str, min_count: usize) -> Result<Vec<String>, RiskError> {
    if input.trim().is_empty() {
        return Err(RiskError::invalid_parameter("tickers", "ticker(s) required"));
    }

    let mut tickers = Vec::new();
    let mut seen = HashSet::new();
    for token in input.split(',') {
        let ticker = validate_ticker(token)?;
        if !seen.insert(ticker.clone()) {
            return Err(RiskError::invalid_parameter(
                "tickers",
                format!("duplicate ticker: {ticker}"),
            ));
        }
        tickers.push(ticker);
    }

    if tickers.len() < min_count {
        return Err(RiskError::invalid_parameter(
            "tickers",
            format!("need at least {min_count} ticker(s), got {}", tickers.len()),
        ));
    }
    Ok(tickers)
}
