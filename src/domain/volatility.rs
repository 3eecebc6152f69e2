//! Rolling volatility over a return series.
//!
//! VOL(n)[i] = sample std of returns[i-n+1..=i]   (n-1 divisor)
//! Indices before the first full window produce no output; the rolling series
//! has len(returns) - n + 1 points, each keyed by the date of its last return.

use crate::domain::error::RiskError;
use crate::domain::returns::{ReturnPoint, ReturnSeries};
use crate::domain::stats;

#[derive(Debug, Clone, PartialEq)]
pub struct RollingVolatility {
    pub ticker: String,
    pub window: usize,
    pub points: Vec<ReturnPoint>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VolatilitySummary {
    pub mean: f64,
    pub current: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
}

pub fn rolling_volatility(
    returns: &ReturnSeries,
    window: usize,
) -> Result<RollingVolatility, RiskError> {
    if window < 2 {
        return Err(RiskError::invalid_parameter(
            "window",
            format!("must be at least 2, got {window}"),
        ));
    }
    if returns.len() < window {
        // expressed in prices: a window of n returns needs n + 1 closes
        return Err(RiskError::insufficient(
            format!("{}-day rolling volatility for {}", window, returns.ticker),
            returns.len() + 1,
            window + 1,
        ));
    }

    let values = returns.values();
    let points = values
        .windows(window)
        .zip(&returns.points[window - 1..])
        .map(|(slice, end)| {
            stats::sample_std(slice)
                .map(|value| ReturnPoint {
                    date: end.date,
                    value,
                })
                .ok_or_else(|| RiskError::insufficient("volatility window", slice.len(), 2))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RollingVolatility {
        ticker: returns.ticker.clone(),
        window,
        points,
    })
}

impl RollingVolatility {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn summary(&self) -> Result<VolatilitySummary, RiskError> {
        let values = self.values();
        let empty = || RiskError::insufficient(format!("volatility summary for {}", self.ticker), 0, 1);
        Ok(VolatilitySummary {
            mean: stats::mean(&values).ok_or_else(empty)?,
            current: values.last().copied().ok_or_else(empty)?,
            min: stats::min(&values).ok_or_else(empty)?,
            max: stats::max(&values).ok_or_else(empty)?,
            median: stats::median(&values).ok_or_else(empty)?,
        })
    }
}
