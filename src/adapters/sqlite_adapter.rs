//! SQLite price store.
//!
//! Schema: `stock_prices(date, ticker, open, high, low, close, volume)` keyed on
//! `(date, ticker)`, with dates stored as `YYYY-MM-DD` text so lexical and
//! calendar order agree.

use crate::adapters::csv_adapter::read_price_file;
use crate::domain::config_validation::DEFAULT_POOL_SIZE;
use crate::domain::date_range::{DateRange, DATE_FORMAT};
use crate::domain::error::RiskError;
use crate::domain::ohlcv::{PriceRecord, PriceSeries, TickerInfo};
use crate::domain::ticker::validate_ticker;
use crate::ports::config_port::ConfigPort;
use crate::ports::price_port::PricePort;
use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::path::Path;
use tracing::{debug, info};

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn pool_error(e: r2d2::Error) -> RiskError {
    RiskError::Storage {
        reason: e.to_string(),
    }
}

fn query_error(e: rusqlite::Error) -> RiskError {
    RiskError::StorageQuery {
        reason: e.to_string(),
    }
}

fn parse_stored_date(value: &str) -> Result<NaiveDate, RiskError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|e| RiskError::Storage {
        reason: format!("stored date '{value}' is malformed: {e}"),
    })
}

impl SqliteAdapter {
    /// Opens the database named by `[data] path` with a pool of `[data] pool_size`.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, RiskError> {
        let db_path = config
            .get_string("data", "path")
            .ok_or_else(|| RiskError::ConfigMissing {
                section: "data".into(),
                key: "path".into(),
            })?;

        let pool_size = config.get_int("data", "pool_size", i64::from(DEFAULT_POOL_SIZE));
        let pool_size = u32::try_from(pool_size)
            .ok()
            .filter(|&n| n > 0)
            .ok_or_else(|| RiskError::ConfigInvalid {
                section: "data".into(),
                key: "pool_size".into(),
                reason: format!("pool_size must be at least 1, got {pool_size}"),
            })?;

        Self::open(&db_path, pool_size)
    }

    pub fn open(db_path: impl AsRef<Path>, pool_size: u32) -> Result<Self, RiskError> {
        let manager = SqliteConnectionManager::file(db_path.as_ref());
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_error)?;
        debug!(path = %db_path.as_ref().display(), pool_size, "opened sqlite store");
        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, RiskError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_error)?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, RiskError> {
        self.pool.get().map_err(pool_error)
    }

    pub fn initialize_schema(&self) -> Result<(), RiskError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS stock_prices (
                    date TEXT NOT NULL,
                    ticker TEXT NOT NULL,
                    open REAL,
                    high REAL,
                    low REAL,
                    close REAL,
                    volume INTEGER,
                    PRIMARY KEY (date, ticker)
                );
                CREATE INDEX IF NOT EXISTS idx_ticker ON stock_prices(ticker);
                CREATE INDEX IF NOT EXISTS idx_date ON stock_prices(date);",
            )
            .map_err(query_error)
    }

    /// Inserts records for one ticker; rows whose `(date, ticker)` already exist are
    /// left untouched. Returns the number of new rows.
    pub fn insert_records(&self, ticker: &str, records: &[PriceRecord]) -> Result<usize, RiskError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_error)?;

        let mut inserted = 0;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR IGNORE INTO stock_prices (date, ticker, open, high, low, close, volume)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )
                .map_err(query_error)?;

            for record in records {
                let volume = i64::try_from(record.volume).map_err(|_| {
                    RiskError::invalid_data(format!(
                        "{ticker}: volume {} on {} out of range",
                        record.volume, record.date
                    ))
                })?;
                inserted += stmt
                    .execute(params![
                        record.date.format(DATE_FORMAT).to_string(),
                        ticker,
                        record.open,
                        record.high,
                        record.low,
                        record.close,
                        volume
                    ])
                    .map_err(query_error)?;
            }
        }

        tx.commit().map_err(query_error)?;
        debug!(ticker, inserted, offered = records.len(), "inserted price records");
        Ok(inserted)
    }

    /// Loads a `DATE,OPEN,HIGH,LOW,CLOSE,VOLUME` file; the ticker is the file stem.
    pub fn import_csv(&self, path: &Path) -> Result<(String, usize), RiskError> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                RiskError::invalid_parameter("file", format!("no file name in {}", path.display()))
            })?;
        let ticker = validate_ticker(stem)?;
        let records = read_price_file(path)?;
        let inserted = self.insert_records(&ticker, &records)?;
        info!(ticker = %ticker, inserted, file = %path.display(), "imported csv");
        Ok((ticker, inserted))
    }
}

impl PricePort for SqliteAdapter {
    fn fetch_prices(&self, ticker: &str, range: &DateRange) -> Result<PriceSeries, RiskError> {
        let conn = self.conn()?;
        let start = range.start.map(|d| d.format(DATE_FORMAT).to_string());
        let end = range.end.map(|d| d.format(DATE_FORMAT).to_string());

        let mut stmt = conn
            .prepare(
                "SELECT date, open, high, low, close, volume
                 FROM stock_prices
                 WHERE ticker = ?1
                   AND (?2 IS NULL OR date >= ?2)
                   AND (?3 IS NULL OR date <= ?3)
                 ORDER BY date ASC",
            )
            .map_err(query_error)?;

        let rows = stmt
            .query_map(params![ticker, start, end], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, f64>(4)?,
                    row.get::<_, Option<i64>>(5)?,
                ))
            })
            .map_err(query_error)?;

        let mut records = Vec::new();
        for row in rows {
            let (date, open, high, low, close, volume) = row.map_err(query_error)?;
            records.push(PriceRecord {
                date: parse_stored_date(&date)?,
                open,
                high,
                low,
                close,
                volume: volume.unwrap_or(0).max(0) as u64,
            });
        }

        debug!(ticker, rows = records.len(), "sqlite price query");
        PriceSeries::new(ticker, records)
    }

    fn list_tickers(&self) -> Result<Vec<String>, RiskError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT ticker FROM stock_prices ORDER BY ticker")
            .map_err(query_error)?;

        let rows = stmt.query_map([], |row| row.get(0)).map_err(query_error)?;
        rows.collect::<Result<Vec<String>, _>>().map_err(query_error)
    }

    fn ticker_info(&self, ticker: &str) -> Result<Option<TickerInfo>, RiskError> {
        let conn = self.conn()?;
        let (count, earliest, latest, avg_volume): (i64, Option<String>, Option<String>, Option<f64>) =
            conn.query_row(
                "SELECT COUNT(*), MIN(date), MAX(date), AVG(volume)
                 FROM stock_prices WHERE ticker = ?1",
                params![ticker],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .map_err(query_error)?;

        match (earliest, latest) {
            (Some(earliest), Some(latest)) if count > 0 => Ok(Some(TickerInfo {
                ticker: ticker.to_string(),
                record_count: count as usize,
                earliest_date: parse_stored_date(&earliest)?,
                latest_date: parse_stored_date(&latest)?,
                avg_volume: avg_volume.unwrap_or(0.0),
            })),
            _ => Ok(None),
        }
    }
}
