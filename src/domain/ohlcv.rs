//! OHLCV records and per-ticker price series.

use crate::domain::error::RiskError;
use chrono::NaiveDate;

/// One daily OHLCV observation.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceRecord {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl PriceRecord {
    fn is_finite(&self) -> bool {
        self.open.is_finite() && self.high.is_finite() && self.low.is_finite() && self.close.is_finite()
    }
}

/// Summary of what the store holds for one ticker.
#[derive(Debug, Clone, PartialEq)]
pub struct TickerInfo {
    pub ticker: String,
    pub record_count: usize,
    pub earliest_date: NaiveDate,
    pub latest_date: NaiveDate,
    pub avg_volume: f64,
}

/// Date-ordered price history for a single ticker.
///
/// Dates are strictly increasing; construction rejects duplicates, out-of-order
/// records and non-finite prices.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    ticker: String,
    records: Vec<PriceRecord>,
}

impl PriceSeries {
    pub fn new(ticker: impl Into<String>, records: Vec<PriceRecord>) -> Result<Self, RiskError> {
        let ticker = ticker.into();

        if let Some(bad) = records.iter().find(|r| !r.is_finite()) {
            return Err(RiskError::invalid_data(format!(
                "{ticker}: non-finite price on {}",
                bad.date
            )));
        }

        if let Some(pair) = records.windows(2).find(|w| w[1].date <= w[0].date) {
            return Err(RiskError::invalid_data(format!(
                "{ticker}: dates not strictly increasing at {} -> {}",
                pair[0].date, pair[1].date
            )));
        }

        Ok(Self { ticker, records })
    }

    /// Sorts by date before validating. Duplicate dates are still rejected.
    pub fn from_unsorted(
        ticker: impl Into<String>,
        mut records: Vec<PriceRecord>,
    ) -> Result<Self, RiskError> {
        records.sort_by_key(|r| r.date);
        Self::new(ticker, records)
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn records(&self) -> &[PriceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.records.first().map(|r| r.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.records.last().map(|r| r.date)
    }

    pub fn closes(&self) -> impl Iterator<Item = f64> + '_ {
        self.records.iter().map(|r| r.close)
    }

    /// Keeps only the most recent `n` records.
    pub fn tail(&self, n: usize) -> PriceSeries {
        let start = self.records.len().saturating_sub(n);
        PriceSeries {
            ticker: self.ticker.clone(),
            records: self.records[start..].to_vec(),
        }
    }

    pub fn into_records(self) -> Vec<PriceRecord> {
        self.records
    }
}
