//! Drawdown analysis on closing prices.
//!
//! PEAK[i] = max(C[0..=i])
//! DD[i]   = (C[i] - PEAK[i]) / PEAK[i]        always <= 0, zero at new highs
//!
//! The trough is the first index holding the minimum drawdown. Recovery is the
//! first later date whose close exceeds the peak that preceded the trough.

use crate::domain::error::RiskError;
use crate::domain::ohlcv::PriceSeries;
use crate::domain::returns::ReturnPoint;
use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct DrawdownAnalysis {
    pub ticker: String,
    /// Most negative drawdown as a fraction (e.g. -0.0667).
    pub max_drawdown: f64,
    pub peak_date: NaiveDate,
    pub trough_date: NaiveDate,
    /// None while the drawdown is unrecovered at the end of the series.
    pub recovery_date: Option<NaiveDate>,
    pub path: Vec<ReturnPoint>,
}

impl DrawdownAnalysis {
    pub fn max_drawdown_percent(&self) -> f64 {
        self.max_drawdown * 100.0
    }

    pub fn observation_count(&self) -> usize {
        self.path.len()
    }

    pub fn is_recovered(&self) -> bool {
        self.recovery_date.is_some()
    }
}

pub fn analyze_drawdown(prices: &PriceSeries) -> Result<DrawdownAnalysis, RiskError> {
    let records = prices.records();
    if records.is_empty() {
        return Err(RiskError::not_found(prices.ticker()));
    }

    let mut path = Vec::with_capacity(records.len());
    let mut running_max = f64::NEG_INFINITY;
    let mut peak_idx = 0usize;
    let mut trough_idx = 0usize;
    let mut trough_peak_idx = 0usize;
    let mut max_drawdown = 0.0_f64;

    for (i, record) in records.iter().enumerate() {
        if record.close > running_max {
            running_max = record.close;
            peak_idx = i;
        }
        if running_max <= 0.0 {
            return Err(RiskError::invalid_data(format!(
                "{}: drawdown needs a positive running peak, got {} on {}",
                prices.ticker(),
                running_max,
                record.date
            )));
        }

        let dd = (record.close - running_max) / running_max;
        // strict comparison keeps the first occurrence of the minimum
        if dd < max_drawdown {
            max_drawdown = dd;
            trough_idx = i;
            trough_peak_idx = peak_idx;
        }
        path.push(ReturnPoint {
            date: record.date,
            value: dd,
        });
    }

    let peak_close = records[trough_peak_idx].close;
    let recovery_date = records[trough_idx + 1..]
        .iter()
        .find(|r| r.close > peak_close)
        .map(|r| r.date);

    Ok(DrawdownAnalysis {
        ticker: prices.ticker().to_string(),
        max_drawdown,
        peak_date: records[trough_peak_idx].date,
        trough_date: records[trough_idx].date,
        recovery_date,
        path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::PriceRecord;
    use approx::assert_relative_eq;

    fn series(closes: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let records = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PriceRecord {
                date: start + chrono::Duration::days(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 0,
            })
            .collect();
        PriceSeries::new("TEST", records).unwrap()
    }

    fn day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(n)
    }

    #[test]
    fn unrecovered_drawdown_at_series_end() {
        let dd = analyze_drawdown(&series(&[100.0, 102.0, 101.0, 105.0, 98.0])).unwrap();
        assert_relative_eq!(dd.max_drawdown, (98.0 - 105.0) / 105.0, epsilon = 1e-12);
        assert_eq!(dd.trough_date, day(4));
        assert_eq!(dd.peak_date, day(3));
        assert_eq!(dd.recovery_date, None);
        assert!(!dd.is_recovered());
        assert_eq!(dd.observation_count(), 5);
    }

    #[test]
    fn recovery_is_first_close_above_prior_peak() {
        let dd = analyze_drawdown(&series(&[100.0, 110.0, 90.0, 110.0, 111.0, 120.0])).unwrap();
        assert_eq!(dd.trough_date, day(2));
        // equalling the peak is not a recovery
        assert_eq!(dd.recovery_date, Some(day(4)));
    }

    #[test]
    fn path_is_non_positive_and_zero_at_start() {
        let dd = analyze_drawdown(&series(&[50.0, 40.0, 60.0, 45.0, 70.0])).unwrap();
        assert_eq!(dd.path[0].value, 0.0);
        assert!(dd.path.iter().all(|p| p.value <= 0.0));
        assert_eq!(dd.path[2].value, 0.0);
        assert_eq!(dd.path[4].value, 0.0);
    }

    #[test]
    fn ties_pick_first_trough() {
        let dd = analyze_drawdown(&series(&[100.0, 80.0, 100.0, 80.0])).unwrap();
        assert_eq!(dd.trough_date, day(1));
        assert_relative_eq!(dd.max_drawdown, -0.2);
        assert_eq!(dd.recovery_date, None);
    }

    #[test]
    fn monotonic_rise_has_zero_drawdown() {
        let dd = analyze_drawdown(&series(&[1.0, 2.0, 3.0])).unwrap();
        assert_eq!(dd.max_drawdown, 0.0);
        assert_eq!(dd.trough_date, day(0));
        assert_eq!(dd.recovery_date, Some(day(1)));
    }

    #[test]
    fn percent_form() {
        let dd = analyze_drawdown(&series(&[100.0, 75.0])).unwrap();
        assert_relative_eq!(dd.max_drawdown_percent(), -25.0, epsilon = 1e-12);
    }

    #[test]
    fn empty_series_is_not_found() {
        let empty = PriceSeries::new("NONE", vec![]).unwrap();
        let err = analyze_drawdown(&empty).unwrap_err();
        assert!(matches!(err, RiskError::NotFound { ticker } if ticker == "NONE"));
    }

    #[test]
    fn non_positive_peak_is_invalid() {
        let err = analyze_drawdown(&series(&[0.0, -1.0])).unwrap_err();
        assert!(matches!(err, RiskError::InvalidData { .. }));
    }
}
