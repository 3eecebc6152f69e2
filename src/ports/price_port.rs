//! Price series accessor port.

use crate::domain::date_range::DateRange;
use crate::domain::error::RiskError;
use crate::domain::ohlcv::{PriceSeries, TickerInfo};

/// Read-only store of per-ticker, date-ordered OHLCV records.
///
/// Implementations are shared across worker threads by the batch analyses.
pub trait PricePort: Send + Sync {
    /// Records for `ticker` within the inclusive `range`, ascending by date.
    ///
    /// An unknown ticker yields an empty series, not an error.
    fn fetch_prices(&self, ticker: &str, range: &DateRange) -> Result<PriceSeries, RiskError>;

    fn list_tickers(&self) -> Result<Vec<String>, RiskError>;

    /// Record count, date span and average volume; `None` for an unknown ticker.
    fn ticker_info(&self, ticker: &str) -> Result<Option<TickerInfo>, RiskError>;
}
