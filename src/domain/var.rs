//! Value-at-Risk estimation.
//!
//! Historical: VaR(c) = percentile(returns, (1 - c) * 100)
//! Gaussian:   VaR(c) = mean + std * inv_norm(1 - c)
//!
//! Values are signed return thresholds, negative for a loss. Confidence levels
//! outside (0, 1) are dropped from the result rather than failing the call.

use crate::domain::error::RiskError;
use crate::domain::ohlcv::PriceSeries;
use crate::domain::returns::{compute_returns, ReturnKind, ReturnSeries};
use crate::domain::stats;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

pub const DEFAULT_CONFIDENCE_LEVELS: [f64; 2] = [0.95, 0.99];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VarMethod {
    #[default]
    Historical,
    Gaussian,
}

impl fmt::Display for VarMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarMethod::Historical => write!(f, "historical"),
            VarMethod::Gaussian => write!(f, "gaussian"),
        }
    }
}

impl FromStr for VarMethod {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "historical" => Ok(VarMethod::Historical),
            "gaussian" => Ok(VarMethod::Gaussian),
            other => Err(RiskError::invalid_parameter(
                "method",
                format!("expected 'historical' or 'gaussian', got '{other}'"),
            )),
        }
    }
}

/// Parses a comma-separated list such as `0.95,0.99`.
///
/// Range checking is left to [`estimate_var`], which drops out-of-range levels.
pub fn parse_confidence_levels(input: &str) -> Result<Vec<f64>, RiskError> {
    if input.trim().is_empty() {
        return Err(RiskError::invalid_parameter(
            "confidence_levels",
            "at least one confidence level required",
        ));
    }
    input
        .split(',')
        .map(|token| {
            let token = token.trim();
            token.parse::<f64>().map_err(|_| {
                RiskError::invalid_parameter(
                    "confidence_levels",
                    format!("'{token}' is not a number"),
                )
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VarLevel {
    pub confidence: f64,
    pub value: f64,
}

impl VarLevel {
    /// `VaR_95` for 0.95, `VaR_97.5` for 0.975.
    pub fn label(&self) -> String {
        let pct = self.confidence * 100.0;
        if (pct - pct.round()).abs() < 1e-9 {
            format!("VaR_{}", pct.round() as i64)
        } else {
            let text = format!("{pct:.4}");
            format!("VaR_{}", text.trim_end_matches('0').trim_end_matches('.'))
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarEstimate {
    pub ticker: String,
    pub method: VarMethod,
    /// In request order, invalid levels removed.
    pub levels: Vec<VarLevel>,
    /// Number of returns the estimate used.
    pub observations: usize,
    pub expected_return: f64,
    /// Sample std; absent for a single return.
    pub volatility: Option<f64>,
}

impl VarEstimate {
    pub fn get(&self, confidence: f64) -> Option<f64> {
        self.levels
            .iter()
            .find(|l| (l.confidence - confidence).abs() < 1e-12)
            .map(|l| l.value)
    }
}

pub fn estimate_var(
    returns: &ReturnSeries,
    confidence_levels: &[f64],
    method: VarMethod,
) -> Result<VarEstimate, RiskError> {
    if confidence_levels.is_empty() {
        return Err(RiskError::invalid_parameter(
            "confidence_levels",
            "at least one confidence level required",
        ));
    }
    let usable: Vec<f64> = confidence_levels
        .iter()
        .copied()
        .filter(|c| *c > 0.0 && *c < 1.0)
        .collect();
    if usable.is_empty() {
        return Err(RiskError::invalid_parameter(
            "confidence_levels",
            "no level lies strictly between 0 and 1",
        ));
    }
    if usable.len() < confidence_levels.len() {
        debug!(
            ticker = %returns.ticker,
            dropped = confidence_levels.len() - usable.len(),
            "ignoring out-of-range confidence levels"
        );
    }

    let values = returns.values();
    let expected_return = stats::mean(&values).ok_or_else(|| {
        RiskError::insufficient(format!("VaR for {}", returns.ticker), 0, 1)
    })?;
    let volatility = stats::sample_std(&values);

    let levels = usable
        .into_iter()
        .map(|confidence| {
            let value = match method {
                VarMethod::Historical => stats::percentile(&values, (1.0 - confidence) * 100.0)
                    .ok_or_else(|| RiskError::insufficient("historical VaR", values.len(), 1))?,
                VarMethod::Gaussian => {
                    let std = volatility.ok_or_else(|| {
                        RiskError::insufficient(
                            format!("gaussian VaR for {}", returns.ticker),
                            values.len(),
                            2,
                        )
                    })?;
                    expected_return + std * stats::inverse_normal_cdf(1.0 - confidence)?
                }
            };
            Ok(VarLevel { confidence, value })
        })
        .collect::<Result<Vec<_>, RiskError>>()?;

    Ok(VarEstimate {
        ticker: returns.ticker.clone(),
        method,
        levels,
        observations: values.len(),
        expected_return,
        volatility,
    })
}

/// Parameters for a VaR estimate straight from a price history.
#[derive(Debug, Clone, PartialEq)]
pub struct VarRequest {
    pub confidence_levels: Vec<f64>,
    pub method: VarMethod,
    /// Keep only the most recent N price points before computing returns.
    pub lookback: Option<usize>,
    pub return_kind: ReturnKind,
}

impl Default for VarRequest {
    fn default() -> Self {
        Self {
            confidence_levels: DEFAULT_CONFIDENCE_LEVELS.to_vec(),
            method: VarMethod::Historical,
            lookback: None,
            return_kind: ReturnKind::Log,
        }
    }
}

pub fn value_at_risk(prices: &PriceSeries, request: &VarRequest) -> Result<VarEstimate, RiskError> {
    if prices.is_empty() {
        return Err(RiskError::not_found(prices.ticker()));
    }
    let window = match request.lookback {
        Some(n) if n < 2 => {
            return Err(RiskError::invalid_parameter(
                "lookback",
                format!("must be at least 2 price points, got {n}"),
            ));
        }
        Some(n) => prices.tail(n),
        None => prices.clone(),
    };
    let returns = compute_returns(&window, request.return_kind)?;
    estimate_var(&returns, &request.confidence_levels, request.method)
}
