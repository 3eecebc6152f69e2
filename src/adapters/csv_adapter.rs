//! CSV directory price store.
//!
//! One file per ticker, `{TICKER}.csv`, with a `DATE,OPEN,HIGH,LOW,CLOSE,VOLUME`
//! header. Rows with an empty volume are skipped.

use crate::domain::date_range::{parse_date, DateRange};
use crate::domain::error::RiskError;
use crate::domain::ohlcv::{PriceRecord, PriceSeries, TickerInfo};
use crate::domain::ticker::validate_ticker;
use crate::ports::price_port::PricePort;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, ticker: &str) -> PathBuf {
        self.base_path.join(format!("{ticker}.csv"))
    }

    fn load(&self, ticker: &str) -> Result<Vec<PriceRecord>, RiskError> {
        let path = self.csv_path(ticker);
        match read_price_file(&path) {
            Err(RiskError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                debug!(ticker, path = %path.display(), "no csv file for ticker");
                Ok(Vec::new())
            }
            other => other,
        }
    }
}

/// Reads every usable row of a price CSV, in file order.
pub fn read_price_file(path: &Path) -> Result<Vec<PriceRecord>, RiskError> {
    let content = fs::read_to_string(path)?;
    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let mut records = Vec::new();

    for (line, result) in rdr.records().enumerate() {
        let row = result.map_err(|e| RiskError::Storage {
            reason: format!("{}: CSV parse error: {e}", path.display()),
        })?;
        // header is line 1
        let line = line + 2;
        if let Some(record) = parse_row(&row).map_err(|reason| RiskError::Storage {
            reason: format!("{} line {line}: {reason}", path.display()),
        })? {
            records.push(record);
        }
    }

    Ok(records)
}

fn parse_row(row: &csv::StringRecord) -> Result<Option<PriceRecord>, String> {
    let field = |idx: usize, name: &str| {
        row.get(idx)
            .map(str::trim)
            .ok_or_else(|| format!("missing {name} column"))
    };

    let volume = field(5, "volume")?;
    if volume.is_empty() {
        return Ok(None);
    }
    let volume: f64 = volume
        .parse()
        .map_err(|e| format!("invalid volume value: {e}"))?;
    if !volume.is_finite() || volume < 0.0 {
        return Err(format!("invalid volume value: {volume}"));
    }

    let price = |idx: usize, name: &str| -> Result<f64, String> {
        field(idx, name)?
            .parse()
            .map_err(|e| format!("invalid {name} value: {e}"))
    };

    let date = parse_date(field(0, "date")?).map_err(|e| e.to_string())?;

    Ok(Some(PriceRecord {
        date,
        open: price(1, "open")?,
        high: price(2, "high")?,
        low: price(3, "low")?,
        close: price(4, "close")?,
        volume: volume.round() as u64,
    }))
}

impl PricePort for CsvAdapter {
    fn fetch_prices(&self, ticker: &str, range: &DateRange) -> Result<PriceSeries, RiskError> {
        let records = self
            .load(ticker)?
            .into_iter()
            .filter(|r| range.contains(r.date))
            .collect();
        PriceSeries::from_unsorted(ticker, records)
    }

    fn list_tickers(&self) -> Result<Vec<String>, RiskError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| RiskError::Storage {
            reason: format!(
                "failed to read directory {}: {e}",
                self.base_path.display()
            ),
        })?;

        let mut tickers = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Ok(ticker) = validate_ticker(stem) {
                if ticker == stem {
                    tickers.push(ticker);
                }
            }
        }

        tickers.sort();
        Ok(tickers)
    }

    fn ticker_info(&self, ticker: &str) -> Result<Option<TickerInfo>, RiskError> {
        let series = self.fetch_prices(ticker, &DateRange::unbounded())?;
        let (Some(earliest_date), Some(latest_date)) = (series.first_date(), series.last_date())
        else {
            return Ok(None);
        };
        let total_volume: f64 = series.records().iter().map(|r| r.volume as f64).sum();

        Ok(Some(TickerInfo {
            ticker: ticker.to_string(),
            record_count: series.len(),
            earliest_date,
            latest_date,
            avg_volume: total_volume / series.len() as f64,
        }))
    }
}
