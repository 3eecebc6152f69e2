//! Return calculation and return-distribution statistics.
//!
//! simple[i] = C[i] / C[i-1] - 1
//! log[i]    = ln(C[i] / C[i-1])
//!
//! The first price has no return, so a series of n prices yields n-1 returns
//! keyed by the later date of each pair.

use crate::domain::error::RiskError;
use crate::domain::ohlcv::PriceSeries;
use crate::domain::stats;
use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReturnKind {
    Simple,
    #[default]
    Log,
}

impl fmt::Display for ReturnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnKind::Simple => write!(f, "simple"),
            ReturnKind::Log => write!(f, "log"),
        }
    }
}

impl FromStr for ReturnKind {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "simple" => Ok(ReturnKind::Simple),
            "log" => Ok(ReturnKind::Log),
            other => Err(RiskError::invalid_parameter(
                "return_type",
                format!("expected 'simple' or 'log', got '{other}'"),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReturnPoint {
    pub date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnSeries {
    pub ticker: String,
    pub kind: ReturnKind,
    pub points: Vec<ReturnPoint>,
}

impl ReturnSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.date).collect()
    }
}

pub fn compute_returns(prices: &PriceSeries, kind: ReturnKind) -> Result<ReturnSeries, RiskError> {
    let ticker = prices.ticker();
    if prices.len() < 2 {
        return Err(RiskError::insufficient(
            format!("{kind} returns for {ticker}"),
            prices.len(),
            2,
        ));
    }

    let records = prices.records();
    if kind == ReturnKind::Log {
        if let Some(bad) = records.iter().find(|r| r.close <= 0.0) {
            return Err(RiskError::invalid_data(format!(
                "{ticker}: log return needs positive closes, got {} on {}",
                bad.close, bad.date
            )));
        }
    }

    let mut points = Vec::with_capacity(records.len() - 1);
    for pair in records.windows(2) {
        let (prev, curr) = (&pair[0], &pair[1]);
        if prev.close == 0.0 {
            return Err(RiskError::invalid_data(format!(
                "{ticker}: zero close on {} makes the next return undefined",
                prev.date
            )));
        }
        let ratio = curr.close / prev.close;
        let value = match kind {
            ReturnKind::Simple => ratio - 1.0,
            ReturnKind::Log => ratio.ln(),
        };
        if !value.is_finite() {
            return Err(RiskError::invalid_data(format!(
                "{ticker}: non-finite return on {}",
                curr.date
            )));
        }
        points.push(ReturnPoint {
            date: curr.date,
            value,
        });
    }

    Ok(ReturnSeries {
        ticker: ticker.to_string(),
        kind,
        points,
    })
}

/// Summary of a return distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnStatistics {
    pub count: usize,
    pub mean: f64,
    /// Absent for a single observation.
    pub std: Option<f64>,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub skewness: Option<f64>,
    pub kurtosis: Option<f64>,
    /// Historical 95% VaR (5th percentile).
    pub var_95: f64,
}

impl ReturnStatistics {
    pub fn compute(returns: &ReturnSeries) -> Result<Self, RiskError> {
        let values = returns.values();
        let insufficient = || {
            RiskError::insufficient(format!("return statistics for {}", returns.ticker), 0, 1)
        };

        Ok(ReturnStatistics {
            count: values.len(),
            mean: stats::mean(&values).ok_or_else(insufficient)?,
            std: stats::sample_std(&values),
            min: stats::min(&values).ok_or_else(insufficient)?,
            max: stats::max(&values).ok_or_else(insufficient)?,
            median: stats::median(&values).ok_or_else(insufficient)?,
            skewness: stats::skewness(&values),
            kurtosis: stats::excess_kurtosis(&values),
            var_95: stats::percentile(&values, 5.0).ok_or_else(insufficient)?,
        })
    }
}
