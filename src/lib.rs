//! quantrisk: risk analytics over daily OHLCV price histories.
//!
//! Hexagonal architecture: pure calculations in [`domain`], port traits in [`ports`],
//! concrete stores and configuration in [`adapters`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
