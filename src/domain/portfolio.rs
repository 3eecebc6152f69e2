//! Portfolio-level return, volatility and Sharpe ratio.
//!
//! daily_return     = sum(w_i * mean(r_i))
//! daily_volatility = sqrt(w' * COV * w)
//! annual_return    = daily_return * periods
//! annual_vol       = daily_volatility * sqrt(periods)
//! sharpe           = (annual_return - rf) / annual_vol, 0 when annual_vol is 0

use crate::domain::alignment::{align_returns, AlignedReturnSet};
use crate::domain::correlation::{correlation_from_covariance, covariance_matrix, TickerMatrix};
use crate::domain::error::RiskError;
use crate::domain::ohlcv::PriceSeries;
use crate::domain::returns::{compute_returns, ReturnKind, ReturnSeries};
use crate::domain::stats;
use chrono::NaiveDate;
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::debug;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Accepted band for the sum of holding weights.
pub const WEIGHT_SUM_MIN: f64 = 0.99;
pub const WEIGHT_SUM_MAX: f64 = 1.01;

/// Validated ticker -> weight mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct Holdings {
    weights: BTreeMap<String, f64>,
}

impl Holdings {
    pub fn new<I, S>(weights: I) -> Result<Self, RiskError>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut map = BTreeMap::new();
        for (ticker, weight) in weights {
            let ticker = ticker.into();
            if !weight.is_finite() {
                return Err(RiskError::invalid_parameter(
                    "holdings",
                    format!("weight for {ticker} is not a finite number"),
                ));
            }
            if weight < 0.0 {
                return Err(RiskError::invalid_parameter(
                    "holdings",
                    format!("weight for {ticker} cannot be negative"),
                ));
            }
            if map.insert(ticker.clone(), weight).is_some() {
                return Err(RiskError::invalid_parameter(
                    "holdings",
                    format!("duplicate holding {ticker}"),
                ));
            }
        }

        if map.is_empty() {
            return Err(RiskError::invalid_parameter("holdings", "cannot be empty"));
        }

        let sum: f64 = map.values().sum();
        if !(WEIGHT_SUM_MIN..=WEIGHT_SUM_MAX).contains(&sum) {
            return Err(RiskError::invalid_parameter(
                "holdings",
                format!("weights must sum to 1.0, got {sum:.4}"),
            ));
        }

        Ok(Self { weights: map })
    }

    pub fn weight(&self, ticker: &str) -> Option<f64> {
        self.weights.get(ticker).copied()
    }

    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.weights.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(t, w)| (t.as_str(), *w))
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

/// Parses `TICKER=WEIGHT` pairs such as `AAPL=0.6`.
pub fn parse_holding(input: &str) -> Result<(String, f64), RiskError> {
    let (ticker, weight) = input.split_once('=').ok_or_else(|| {
        RiskError::invalid_parameter("holding", format!("expected TICKER=WEIGHT, got '{input}'"))
    })?;
    let weight = weight.trim().parse::<f64>().map_err(|_| {
        RiskError::invalid_parameter("holding", format!("weight in '{input}' is not a number"))
    })?;
    Ok((ticker.trim().to_string(), weight))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortfolioParams {
    /// Trading periods per year.
    pub annualization_factor: f64,
    /// Annual risk-free rate used by the Sharpe ratio.
    pub risk_free_rate: f64,
}

impl Default for PortfolioParams {
    fn default() -> Self {
        Self {
            annualization_factor: TRADING_DAYS_PER_YEAR,
            risk_free_rate: 0.0,
        }
    }
}

impl PortfolioParams {
    fn validate(&self) -> Result<(), RiskError> {
        if !self.annualization_factor.is_finite() || self.annualization_factor <= 0.0 {
            return Err(RiskError::invalid_parameter(
                "annualization_factor",
                format!("must be positive, got {}", self.annualization_factor),
            ));
        }
        if !(0.0..1.0).contains(&self.risk_free_rate) {
            return Err(RiskError::invalid_parameter(
                "risk_free_rate",
                format!("must be in [0, 1), got {}", self.risk_free_rate),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioMetrics {
    pub daily_return: f64,
    pub daily_volatility: f64,
    pub annualized_return: f64,
    pub annualized_volatility: f64,
    pub sharpe_ratio: f64,
    pub risk_free_rate: f64,
}

/// Combines weights, aligned returns and their covariance into portfolio metrics.
pub fn portfolio_metrics(
    holdings: &Holdings,
    aligned: &AlignedReturnSet,
    covariance: &TickerMatrix,
    params: &PortfolioParams,
) -> Result<PortfolioMetrics, RiskError> {
    params.validate()?;

    if covariance.tickers() != aligned.tickers() {
        return Err(RiskError::invalid_parameter(
            "covariance",
            format!(
                "covers {:?} but the aligned returns cover {:?}",
                covariance.tickers(),
                aligned.tickers()
            ),
        ));
    }

    for ticker in holdings.tickers() {
        if aligned.column(ticker).is_none() {
            return Err(RiskError::invalid_parameter(
                "holdings",
                format!("{ticker} is missing from the aligned returns"),
            ));
        }
    }

    // weight vector in the aligned ticker order; unheld tickers weigh nothing
    let weights: Vec<f64> = aligned
        .tickers()
        .iter()
        .map(|t| holdings.weight(t).unwrap_or(0.0))
        .collect();

    let mut daily_return = 0.0;
    for (w, column) in weights.iter().zip(aligned.columns()) {
        let m = stats::mean(column)
            .ok_or_else(|| RiskError::insufficient("portfolio returns", 0, 2))?;
        daily_return += w * m;
    }

    let cov = covariance.rows();
    let mut variance = 0.0;
    for (i, wi) in weights.iter().enumerate() {
        for (j, wj) in weights.iter().enumerate() {
            variance += wi * cov[i][j] * wj;
        }
    }
    // rounding can leave a tiny negative quadratic form for a flat portfolio
    let daily_volatility = variance.max(0.0).sqrt();

    let annualized_return = daily_return * params.annualization_factor;
    let annualized_volatility = daily_volatility * params.annualization_factor.sqrt();
    let sharpe_ratio = if annualized_volatility > 0.0 {
        (annualized_return - params.risk_free_rate) / annualized_volatility
    } else {
        0.0
    };

    Ok(PortfolioMetrics {
        daily_return,
        daily_volatility,
        annualized_return,
        annualized_volatility,
        sharpe_ratio,
        risk_free_rate: params.risk_free_rate,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioAnalysis {
    pub holdings: Holdings,
    pub metrics: PortfolioMetrics,
    pub covariance: TickerMatrix,
    /// Absent when a holding has a constant return series.
    pub correlation: Option<TickerMatrix>,
    pub observations: usize,
    pub date_range: (NaiveDate, NaiveDate),
}

/// Full portfolio pipeline: log returns per holding, date alignment, covariance, metrics.
///
/// `prices` must hold a series for every holding; an empty or missing series is `NotFound`.
pub fn analyze_portfolio(
    holdings: &Holdings,
    prices: &BTreeMap<String, PriceSeries>,
    params: &PortfolioParams,
) -> Result<PortfolioAnalysis, RiskError> {
    params.validate()?;

    for ticker in holdings.tickers() {
        match prices.get(ticker) {
            Some(series) if !series.is_empty() => {}
            _ => return Err(RiskError::not_found(ticker)),
        }
    }

    let returns: BTreeMap<String, ReturnSeries> = holdings
        .tickers()
        .collect::<Vec<_>>()
        .par_iter()
        .map(|ticker| {
            let series = &prices[*ticker];
            compute_returns(series, ReturnKind::Log).map(|r| (ticker.to_string(), r))
        })
        .collect::<Result<_, RiskError>>()?;

    let aligned = align_returns(&returns)?;
    let covariance = covariance_matrix(&aligned)?;
    let metrics = portfolio_metrics(holdings, &aligned, &covariance, params)?;
    let correlation = correlation_from_covariance(&covariance).ok();

    let date_range = aligned
        .date_range()
        .ok_or_else(|| RiskError::insufficient("portfolio observations", 0, 2))?;

    debug!(
        holdings = holdings.len(),
        observations = aligned.len(),
        sharpe = metrics.sharpe_ratio,
        "portfolio analysed"
    );

    Ok(PortfolioAnalysis {
        holdings: holdings.clone(),
        metrics,
        covariance,
        correlation,
        observations: aligned.len(),
        date_range,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::PriceRecord;
    use approx::assert_relative_eq;

    fn prices(ticker: &str, closes: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        PriceSeries::new(
            ticker,
            closes
                .iter()
                .enumerate()
                .map(|(i, &close)| PriceRecord {
                    date: start + chrono::Duration::days(i as i64),
                    open: close,
                    high: close,
                    low: close,
                    close,
                    volume: 1,
                })
                .collect(),
        )
        .unwrap()
    }

    fn universe(entries: Vec<PriceSeries>) -> BTreeMap<String, PriceSeries> {
        entries
            .into_iter()
            .map(|s| (s.ticker().to_string(), s))
            .collect()
    }

    #[test]
    fn weights_within_tolerance_pass() {
        assert!(Holdings::new([("A", 0.4), ("B", 0.6)]).is_ok());
        assert!(Holdings::new([("A", 0.5), ("B", 0.505)]).is_ok());
    }

    #[test]
    fn weights_outside_tolerance_fail() {
        let err = Holdings::new([("A", 0.5), ("B", 0.4)]).unwrap_err();
        assert!(matches!(err, RiskError::InvalidParameter { .. }));
        assert!(Holdings::new([("A", 0.6), ("B", 0.6)]).is_err());
    }

    #[test]
    fn negative_or_duplicate_weights_fail() {
        assert!(matches!(
            Holdings::new([("A", 1.2), ("B", -0.2)]),
            Err(RiskError::InvalidParameter { .. })
        ));
        assert!(Holdings::new([("A", 0.5), ("A", 0.5)]).is_err());
        assert!(Holdings::new(Vec::<(String, f64)>::new()).is_err());
        assert!(Holdings::new([("A", f64::NAN)]).is_err());
    }

    #[test]
    fn parse_holding_pairs() {
        assert_eq!(parse_holding("AAPL=0.6").unwrap(), ("AAPL".to_string(), 0.6));
        assert_eq!(parse_holding(" msft = 0.4 ").unwrap(), ("msft".to_string(), 0.4));
        assert!(parse_holding("AAPL").is_err());
        assert!(parse_holding("AAPL=x").is_err());
    }

    #[test]
    fn single_holding_matches_its_own_statistics() {
        let closes = [100.0, 101.0, 99.5, 102.0, 103.5, 102.5];
        let holdings = Holdings::new([("AAA", 1.0)]).unwrap();
        let analysis = analyze_portfolio(
            &holdings,
            &universe(vec![prices("AAA", &closes)]),
            &PortfolioParams::default(),
        )
        .unwrap();

        let r = compute_returns(&prices("AAA", &closes), ReturnKind::Log).unwrap();
        let mean = stats::mean(&r.values()).unwrap();
        let std = stats::sample_std(&r.values()).unwrap();

        let m = &analysis.metrics;
        assert_relative_eq!(m.daily_return, mean, epsilon = 1e-12);
        assert_relative_eq!(m.daily_volatility, std, epsilon = 1e-12);
        assert_relative_eq!(m.annualized_return, mean * 252.0, epsilon = 1e-12);
        assert_relative_eq!(m.annualized_volatility, std * 252.0_f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(
            m.sharpe_ratio,
            m.annualized_return / m.annualized_volatility,
            epsilon = 1e-12
        );
        assert_eq!(analysis.observations, 5);
    }

    #[test]
    fn risk_free_rate_reduces_sharpe() {
        let holdings = Holdings::new([("AAA", 0.5), ("BBB", 0.5)]).unwrap();
        let data = universe(vec![
            prices("AAA", &[100.0, 102.0, 101.0, 104.0, 106.0]),
            prices("BBB", &[50.0, 49.0, 51.0, 52.0, 51.5]),
        ]);
        let base = analyze_portfolio(&holdings, &data, &PortfolioParams::default()).unwrap();
        let with_rf = analyze_portfolio(
            &holdings,
            &data,
            &PortfolioParams {
                risk_free_rate: 0.02,
                ..PortfolioParams::default()
            },
        )
        .unwrap();
        assert!(with_rf.metrics.sharpe_ratio < base.metrics.sharpe_ratio);
        assert_eq!(with_rf.metrics.risk_free_rate, 0.02);
        assert!(base.correlation.is_some());
    }

    #[test]
    fn quadratic_form_matches_two_asset_formula() {
        let holdings = Holdings::new([("AAA", 0.3), ("BBB", 0.7)]).unwrap();
        let data = universe(vec![
            prices("AAA", &[100.0, 103.0, 99.0, 101.0, 104.0, 102.0]),
            prices("BBB", &[20.0, 20.5, 20.1, 19.8, 20.6, 21.0]),
        ]);
        let analysis = analyze_portfolio(&holdings, &data, &PortfolioParams::default()).unwrap();
        let cov = &analysis.covariance;
        let var = 0.09 * cov.get("AAA", "AAA").unwrap()
            + 0.49 * cov.get("BBB", "BBB").unwrap()
            + 2.0 * 0.21 * cov.get("AAA", "BBB").unwrap();
        assert_relative_eq!(analysis.metrics.daily_volatility, var.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn flat_portfolio_has_zero_sharpe() {
        let holdings = Holdings::new([("AAA", 1.0)]).unwrap();
        let data = universe(vec![prices("AAA", &[10.0, 10.0, 10.0, 10.0])]);
        let analysis = analyze_portfolio(&holdings, &data, &PortfolioParams::default()).unwrap();
        assert_eq!(analysis.metrics.annualized_volatility, 0.0);
        assert_eq!(analysis.metrics.sharpe_ratio, 0.0);
        assert!(analysis.correlation.is_none());
    }

    #[test]
    fn missing_holding_is_not_found() {
        let holdings = Holdings::new([("AAA", 0.5), ("BBB", 0.5)]).unwrap();
        let data = universe(vec![
            prices("AAA", &[1.0, 2.0, 3.0]),
            prices("BBB", &[]),
        ]);
        let err = analyze_portfolio(&holdings, &data, &PortfolioParams::default()).unwrap_err();
        assert!(matches!(err, RiskError::NotFound { ticker } if ticker == "BBB"));
    }

    #[test]
    fn invalid_annualization_factor() {
        let holdings = Holdings::new([("AAA", 1.0)]).unwrap();
        let data = universe(vec![prices("AAA", &[1.0, 2.0, 3.0])]);
        let params = PortfolioParams {
            annualization_factor: 0.0,
            ..PortfolioParams::default()
        };
        assert!(matches!(
            analyze_portfolio(&holdings, &data, &params),
            Err(RiskError::InvalidParameter { .. })
        ));
    }

    fn aligned_returns(entries: &[(&str, &[f64])]) -> AlignedReturnSet {
        let returns: BTreeMap<String, ReturnSeries> = entries
            .iter()
            .map(|(t, closes)| {
                (t.to_string(), compute_returns(&prices(t, closes), ReturnKind::Log).unwrap())
            })
            .collect();
        align_returns(&returns).unwrap()
    }

    #[test]
    fn covariance_must_cover_the_aligned_tickers() {
        let a: &[f64] = &[100.0, 102.0, 101.0, 104.0, 106.0];
        let b: &[f64] = &[50.0, 49.0, 51.0, 52.0, 51.5];
        let c: &[f64] = &[20.0, 20.5, 20.1, 19.8, 20.6];
        let holdings = Holdings::new([("AAA", 0.4), ("BBB", 0.3), ("CCC", 0.3)]).unwrap();
        let params = PortfolioParams::default();

        let three = aligned_returns(&[("AAA", a), ("BBB", b), ("CCC", c)]);
        let short = covariance_matrix(&aligned_returns(&[("AAA", a), ("BBB", b)])).unwrap();
        let err = portfolio_metrics(&holdings, &three, &short, &params).unwrap_err();
        assert!(matches!(err, RiskError::InvalidParameter { .. }));

        let two = aligned_returns(&[("AAA", a), ("BBB", b)]);
        let foreign = covariance_matrix(&aligned_returns(&[("XXX", a), ("YYY", b)])).unwrap();
        let pair = Holdings::new([("AAA", 0.5), ("BBB", 0.5)]).unwrap();
        let err = portfolio_metrics(&pair, &two, &foreign, &params).unwrap_err();
        assert!(matches!(err, RiskError::InvalidParameter { .. }));

        let own = covariance_matrix(&two).unwrap();
        assert!(portfolio_metrics(&pair, &two, &own, &params).is_ok());
    }

    #[test]
    fn risk_free_rate_outside_unit_range_fails() {
        let holdings = Holdings::new([("AAA", 1.0)]).unwrap();
        let data = universe(vec![prices("AAA", &[1.0, 2.0, 3.0])]);
        for rate in [-0.3, 1.0, 5.0, f64::NAN] {
            let params = PortfolioParams {
                risk_free_rate: rate,
                ..PortfolioParams::default()
            };
            assert!(
                matches!(
                    analyze_portfolio(&holdings, &data, &params),
                    Err(RiskError::InvalidParameter { .. })
                ),
                "rate {rate} accepted"
            );
        }
    }
}
