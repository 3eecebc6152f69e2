//! Core domain types and risk calculations.

pub mod error;
pub mod ticker;
pub mod date_range;
pub mod ohlcv;
pub mod stats;
pub mod returns;
pub mod volatility;
pub mod drawdown;
pub mod var;
pub mod alignment;
pub mod correlation;
pub mod portfolio;
pub mod analysis;
pub mod config_validation;
