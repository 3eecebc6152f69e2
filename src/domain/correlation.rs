//! Pairwise covariance and Pearson correlation over aligned returns.
//!
//! COV[i][j]  = sum((x_i - mean_i)(x_j - mean_j)) / (n - 1)
//! CORR[i][j] = COV[i][j] / (sd_i * sd_j)

use crate::domain::alignment::AlignedReturnSet;
use crate::domain::error::RiskError;
use crate::domain::stats;

/// Variances at or below this are treated as a constant series.
const ZERO_VARIANCE: f64 = 1e-24;

/// Square matrix keyed by ticker on both axes.
#[derive(Debug, Clone, PartialEq)]
pub struct TickerMatrix {
    tickers: Vec<String>,
    values: Vec<Vec<f64>>,
}

impl TickerMatrix {
    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.values
    }

    fn index_of(&self, ticker: &str) -> Option<usize> {
        self.tickers.iter().position(|t| t == ticker)
    }

    /// Cell lookup by ticker pair, independent of the order tickers were supplied in.
    pub fn get(&self, row: &str, col: &str) -> Option<f64> {
        let i = self.index_of(row)?;
        let j = self.index_of(col)?;
        Some(self.values[i][j])
    }

    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }
}

pub fn covariance_matrix(aligned: &AlignedReturnSet) -> Result<TickerMatrix, RiskError> {
    let columns = aligned.columns();
    let n = columns.len();
    let mut values = vec![vec![0.0; n]; n];

    for i in 0..n {
        for j in i..n {
            let cov = stats::sample_covariance(&columns[i], &columns[j]).ok_or_else(|| {
                RiskError::insufficient("covariance observations", aligned.len(), 2)
            })?;
            values[i][j] = cov;
            values[j][i] = cov;
        }
    }

    Ok(TickerMatrix {
        tickers: aligned.tickers().to_vec(),
        values,
    })
}

/// Derives correlations from a covariance matrix.
///
/// A zero-variance series has no defined correlation and fails with `InvalidData`.
pub fn correlation_from_covariance(cov: &TickerMatrix) -> Result<TickerMatrix, RiskError> {
    let n = cov.len();
    let mut sd = Vec::with_capacity(n);
    for (i, ticker) in cov.tickers.iter().enumerate() {
        let var = cov.values[i][i];
        if !var.is_finite() || var <= ZERO_VARIANCE {
            return Err(RiskError::invalid_data(format!(
                "{ticker}: zero-variance return series has no defined correlation"
            )));
        }
        sd.push(var.sqrt());
    }

    let mut values = vec![vec![0.0; n]; n];
    for i in 0..n {
        values[i][i] = 1.0;
        for j in (i + 1)..n {
            let rho = (cov.values[i][j] / (sd[i] * sd[j])).clamp(-1.0, 1.0);
            values[i][j] = rho;
            values[j][i] = rho;
        }
    }

    Ok(TickerMatrix {
        tickers: cov.tickers.clone(),
        values,
    })
}

pub fn correlation_matrix(aligned: &AlignedReturnSet) -> Result<TickerMatrix, RiskError> {
    correlation_from_covariance(&covariance_matrix(aligned)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::alignment::align_returns;
    use crate::domain::returns::{ReturnKind, ReturnPoint, ReturnSeries};
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn aligned(columns: &[(&str, &[f64])]) -> AlignedReturnSet {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let series: BTreeMap<String, ReturnSeries> = columns
            .iter()
            .map(|(ticker, values)| {
                let points = values
                    .iter()
                    .enumerate()
                    .map(|(i, &value)| ReturnPoint {
                        date: start + chrono::Duration::days(i as i64),
                        value,
                    })
                    .collect();
                (
                    ticker.to_string(),
                    ReturnSeries {
                        ticker: ticker.to_string(),
                        kind: ReturnKind::Log,
                        points,
                    },
                )
            })
            .collect();
        align_returns(&series).unwrap()
    }

    #[test]
    fn perfectly_correlated_and_anti_correlated() {
        let set = aligned(&[
            ("AAA", &[0.01, 0.02, -0.01, 0.03]),
            ("BBB", &[0.02, 0.04, -0.02, 0.06]),
            ("CCC", &[-0.01, -0.02, 0.01, -0.03]),
        ]);
        let corr = correlation_matrix(&set).unwrap();
        assert_relative_eq!(corr.get("AAA", "BBB").unwrap(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(corr.get("AAA", "CCC").unwrap(), -1.0, epsilon = 1e-12);
        assert_eq!(corr.get("BBB", "BBB"), Some(1.0));
    }

    #[test]
    fn symmetric_and_bounded() {
        let set = aligned(&[
            ("AAA", &[0.01, -0.03, 0.02, 0.005, -0.01]),
            ("BBB", &[0.00, 0.01, -0.02, 0.015, 0.02]),
            ("CCC", &[0.03, -0.01, 0.00, -0.02, 0.01]),
        ]);
        let corr = correlation_matrix(&set).unwrap();
        for a in corr.tickers() {
            for b in corr.tickers() {
                let v = corr.get(a, b).unwrap();
                assert_eq!(v, corr.get(b, a).unwrap());
                assert!((-1.0..=1.0).contains(&v));
            }
        }
    }

    #[test]
    fn covariance_known_values() {
        let set = aligned(&[("AAA", &[1.0, 2.0, 3.0]), ("BBB", &[2.0, 4.0, 7.0])]);
        let cov = covariance_matrix(&set).unwrap();
        // var(AAA) = 1; cov = ((-1)(-2.333) + 0 + (1)(2.667)) / 2 = 2.5
        assert_relative_eq!(cov.get("AAA", "AAA").unwrap(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(cov.get("AAA", "BBB").unwrap(), 2.5, epsilon = 1e-12);
        assert_relative_eq!(cov.get("BBB", "AAA").unwrap(), 2.5, epsilon = 1e-12);
    }

    #[test]
    fn zero_variance_series_is_invalid() {
        let set = aligned(&[("AAA", &[0.01, 0.01, 0.01]), ("BBB", &[0.01, 0.02, 0.03])]);
        assert!(covariance_matrix(&set).is_ok());
        let err = correlation_matrix(&set).unwrap_err();
        assert!(matches!(err, RiskError::InvalidData { reason } if reason.contains("AAA")));
    }

    #[test]
    fn lookup_of_unknown_ticker() {
        let set = aligned(&[("AAA", &[0.01, 0.02])]);
        let cov = covariance_matrix(&set).unwrap();
        assert!(cov.get("AAA", "ZZZ").is_none());
        assert_eq!(cov.len(), 1);
    }
}
