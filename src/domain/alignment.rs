//! Cross-series date alignment.
//!
//! Several per-ticker series are joined on date with an inner join: a date
//! survives only when every series has an observation for it. Nothing is
//! forward-filled.

use crate::domain::error::RiskError;
use crate::domain::ohlcv::PriceSeries;
use crate::domain::returns::ReturnSeries;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Minimum number of shared dates for a usable alignment.
pub const MIN_ALIGNED_DATES: usize = 2;

/// Column-major panel of per-ticker values on a shared date axis.
///
/// Tickers are held in ascending order; every column has one value per date.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedSet {
    tickers: Vec<String>,
    dates: Vec<NaiveDate>,
    columns: Vec<Vec<f64>>,
}

/// Aligned return panel consumed by the correlation engine and the portfolio aggregator.
pub type AlignedReturnSet = AlignedSet;

impl AlignedSet {
    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn columns(&self) -> &[Vec<f64>] {
        &self.columns
    }

    pub fn column(&self, ticker: &str) -> Option<&[f64]> {
        self.tickers
            .iter()
            .position(|t| t == ticker)
            .map(|i| self.columns[i].as_slice())
    }

    /// Number of shared dates.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        Some((*self.dates.first()?, *self.dates.last()?))
    }
}

pub fn align_returns(series: &BTreeMap<String, ReturnSeries>) -> Result<AlignedReturnSet, RiskError> {
    let inputs = series
        .iter()
        .map(|(ticker, r)| {
            let points = r.points.iter().map(|p| (p.date, p.value)).collect();
            (ticker.as_str(), points)
        })
        .collect();
    intersect(inputs)
}

pub fn align_closes(series: &BTreeMap<String, PriceSeries>) -> Result<AlignedSet, RiskError> {
    let inputs = series
        .iter()
        .map(|(ticker, p)| {
            let points = p.records().iter().map(|r| (r.date, r.close)).collect();
            (ticker.as_str(), points)
        })
        .collect();
    intersect(inputs)
}

fn intersect(inputs: Vec<(&str, Vec<(NaiveDate, f64)>)>) -> Result<AlignedSet, RiskError> {
    if inputs.is_empty() {
        return Err(RiskError::invalid_parameter(
            "tickers",
            "at least one series is required for alignment",
        ));
    }

    for (ticker, points) in &inputs {
        if let Some(pair) = points.windows(2).find(|w| w[1].0 <= w[0].0) {
            return Err(RiskError::invalid_data(format!(
                "{ticker}: dates not strictly increasing at {} -> {}",
                pair[0].0, pair[1].0
            )));
        }
    }

    let mut shared: BTreeSet<NaiveDate> = inputs[0].1.iter().map(|(d, _)| *d).collect();
    for (_, points) in &inputs[1..] {
        let dates: BTreeSet<NaiveDate> = points.iter().map(|(d, _)| *d).collect();
        shared.retain(|d| dates.contains(d));
    }

    if shared.len() < MIN_ALIGNED_DATES {
        let names: Vec<&str> = inputs.iter().map(|(t, _)| *t).collect();
        return Err(RiskError::insufficient(
            format!("overlapping dates across {}", names.join(",")),
            shared.len(),
            MIN_ALIGNED_DATES,
        ));
    }

    let mut tickers = Vec::with_capacity(inputs.len());
    let mut columns = Vec::with_capacity(inputs.len());
    for (ticker, points) in inputs {
        let column: Vec<f64> = points
            .into_iter()
            .filter(|(d, _)| shared.contains(d))
            .map(|(_, v)| v)
            .collect();
        tickers.push(ticker.to_string());
        columns.push(column);
    }

    debug!(
        tickers = tickers.len(),
        dates = shared.len(),
        "aligned series on shared dates"
    );

    Ok(AlignedSet {
        tickers,
        dates: shared.into_iter().collect(),
        columns,
    })
}
