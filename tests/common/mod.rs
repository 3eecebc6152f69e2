#![allow(dead_code)]

use chrono::NaiveDate;
pub use quantrisk::domain::date_range::DateRange;
use quantrisk::domain::error::RiskError;
pub use quantrisk::domain::ohlcv::{PriceRecord, PriceSeries, TickerInfo};
pub use quantrisk::ports::price_port::PricePort;
use std::collections::HashMap;

pub struct MockPricePort {
    pub data: HashMap<String, Vec<PriceRecord>>,
    pub errors: HashMap<String, String>,
}

impl MockPricePort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_records(mut self, ticker: &str, records: Vec<PriceRecord>) -> Self {
        self.data.insert(ticker.to_string(), records);
        self
    }

    pub fn with_closes(self, ticker: &str, start_date: &str, closes: &[f64]) -> Self {
        self.with_records(ticker, records_from_closes(start_date, closes))
    }

    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self
    }

    fn check_error(&self, ticker: &str) -> Result<(), RiskError> {
        match self.errors.get(ticker) {
            Some(reason) => Err(RiskError::Storage {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl PricePort for MockPricePort {
    fn fetch_prices(&self, ticker: &str, range: &DateRange) -> Result<PriceSeries, RiskError> {
        self.check_error(ticker)?;
        let records = self
            .data
            .get(ticker)
            .map(|rs| rs.iter().filter(|r| range.contains(r.date)).cloned().collect())
            .unwrap_or_default();
        PriceSeries::from_unsorted(ticker, records)
    }

    fn list_tickers(&self) -> Result<Vec<String>, RiskError> {
        let mut tickers: Vec<String> = self.data.keys().cloned().collect();
        tickers.sort();
        Ok(tickers)
    }

    fn ticker_info(&self, ticker: &str) -> Result<Option<TickerInfo>, RiskError> {
        self.check_error(ticker)?;
        match self.data.get(ticker) {
            Some(records) if !records.is_empty() => {
                let earliest_date = records.iter().map(|r| r.date).min().unwrap();
                let latest_date = records.iter().map(|r| r.date).max().unwrap();
                let total: f64 = records.iter().map(|r| r.volume as f64).sum();
                Ok(Some(TickerInfo {
                    ticker: ticker.to_string(),
                    record_count: records.len(),
                    earliest_date,
                    latest_date,
                    avg_volume: total / records.len() as f64,
                }))
            }
            _ => Ok(None),
        }
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn make_record(date: &str, close: f64) -> PriceRecord {
    PriceRecord {
        date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        open: close - 1.0,
        high: close + 1.0,
        low: close - 2.0,
        close,
        volume: 1000,
    }
}

/// One record per consecutive calendar day starting at `start_date`.
pub fn records_from_closes(start_date: &str, closes: &[f64]) -> Vec<PriceRecord> {
    let start = NaiveDate::parse_from_str(start_date, "%Y-%m-%d").unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| PriceRecord {
            date: start + chrono::Duration::days(i as i64),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1000 + i as u64,
        })
        .collect()
}

/// Deterministic zig-zag path around `start_price`.
pub fn generate_records(start_date: &str, count: usize, start_price: f64) -> Vec<PriceRecord> {
    let closes: Vec<f64> = (0..count)
        .map(|i| {
            let drift = i as f64 * 0.1;
            let wiggle = if i % 2 == 0 { 1.5 } else { -1.0 };
            start_price + drift + wiggle * ((i % 5) as f64)
        })
        .collect();
    records_from_closes(start_date, &closes)
}

pub fn series(ticker: &str, start_date: &str, closes: &[f64]) -> PriceSeries {
    PriceSeries::new(ticker, records_from_closes(start_date, closes)).unwrap()
}
