//! Configuration validation and typed analysis settings.
//!
//! Validates the `[data]` and `[analysis]` sections before any store is opened.

use crate::domain::analysis::DEFAULT_VOLATILITY_WINDOW;
use crate::domain::error::RiskError;
use crate::domain::portfolio::{PortfolioParams, TRADING_DAYS_PER_YEAR};
use crate::domain::returns::ReturnKind;
use crate::domain::var::{parse_confidence_levels, VarMethod, VarRequest, DEFAULT_CONFIDENCE_LEVELS};
use crate::ports::config_port::ConfigPort;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_POOL_SIZE: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataSource {
    #[default]
    Csv,
    Sqlite,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Csv => write!(f, "csv"),
            DataSource::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl FromStr for DataSource {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(DataSource::Csv),
            "sqlite" => Ok(DataSource::Sqlite),
            other => Err(invalid("data", "source", format!("unknown data source '{other}'"))),
        }
    }
}

/// Typed view of the `[analysis]` section with defaults filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisSettings {
    pub annualization_factor: f64,
    pub risk_free_rate: f64,
    pub window: usize,
    pub confidence_levels: Vec<f64>,
    pub var_method: VarMethod,
    pub return_kind: ReturnKind,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            annualization_factor: TRADING_DAYS_PER_YEAR,
            risk_free_rate: 0.0,
            window: DEFAULT_VOLATILITY_WINDOW,
            confidence_levels: DEFAULT_CONFIDENCE_LEVELS.to_vec(),
            var_method: VarMethod::default(),
            return_kind: ReturnKind::default(),
        }
    }
}

impl AnalysisSettings {
    /// Reads `[analysis]`, falling back to defaults for absent keys.
    ///
    /// Call [`validate_analysis_config`] first; this only reports values it
    /// cannot parse.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, RiskError> {
        let defaults = Self::default();

        let confidence_levels = match config.get_string("analysis", "confidence_levels") {
            Some(raw) => parse_confidence_levels(&raw)
                .map_err(|e| invalid("analysis", "confidence_levels", e.to_string()))?,
            None => defaults.confidence_levels,
        };
        let var_method = match config.get_string("analysis", "var_method") {
            Some(raw) => raw
                .parse()
                .map_err(|e: RiskError| invalid("analysis", "var_method", e.to_string()))?,
            None => defaults.var_method,
        };
        let return_kind = match config.get_string("analysis", "return_type") {
            Some(raw) => raw
                .parse()
                .map_err(|e: RiskError| invalid("analysis", "return_type", e.to_string()))?,
            None => defaults.return_kind,
        };
        let window = config.get_int("analysis", "window", defaults.window as i64);

        Ok(Self {
            annualization_factor: config.get_double(
                "analysis",
                "annualization_factor",
                defaults.annualization_factor,
            ),
            risk_free_rate: config.get_double("analysis", "risk_free_rate", defaults.risk_free_rate),
            window: usize::try_from(window)
                .map_err(|_| invalid("analysis", "window", "window must be at least 2"))?,
            confidence_levels,
            var_method,
            return_kind,
        })
    }

    pub fn portfolio_params(&self) -> PortfolioParams {
        PortfolioParams {
            annualization_factor: self.annualization_factor,
            risk_free_rate: self.risk_free_rate,
        }
    }

    pub fn var_request(&self, lookback: Option<usize>) -> VarRequest {
        VarRequest {
            confidence_levels: self.confidence_levels.clone(),
            method: self.var_method,
            lookback,
            return_kind: ReturnKind::Log,
        }
    }
}

pub fn validate_analysis_config(config: &dyn ConfigPort) -> Result<(), RiskError> {
    validate_data_source(config)?;
    validate_data_path(config)?;
    validate_pool_size(config)?;
    validate_annualization_factor(config)?;
    validate_risk_free_rate(config)?;
    validate_window(config)?;
    validate_enums(config)?;
    Ok(())
}

pub fn data_source(config: &dyn ConfigPort) -> Result<DataSource, RiskError> {
    config
        .get_string("data", "source")
        .map(|s| s.parse())
        .transpose()
        .map(Option::unwrap_or_default)
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> RiskError {
    RiskError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn validate_data_source(config: &dyn ConfigPort) -> Result<(), RiskError> {
    data_source(config).map(|_| ())
}

fn validate_data_path(config: &dyn ConfigPort) -> Result<(), RiskError> {
    match config.get_string("data", "path") {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(RiskError::ConfigMissing {
            section: "data".to_string(),
            key: "path".to_string(),
        }),
    }
}

fn validate_pool_size(config: &dyn ConfigPort) -> Result<(), RiskError> {
    let value = config.get_int("data", "pool_size", DEFAULT_POOL_SIZE as i64);
    if value < 1 {
        return Err(invalid("data", "pool_size", "pool_size must be at least 1"));
    }
    Ok(())
}

fn validate_annualization_factor(config: &dyn ConfigPort) -> Result<(), RiskError> {
    let value = config.get_double("analysis", "annualization_factor", TRADING_DAYS_PER_YEAR);
    if value <= 0.0 {
        return Err(invalid(
            "analysis",
            "annualization_factor",
            "annualization_factor must be positive",
        ));
    }
    Ok(())
}

fn validate_risk_free_rate(config: &dyn ConfigPort) -> Result<(), RiskError> {
    let value = config.get_double("analysis", "risk_free_rate", 0.0);
    if value < 0.0 || value >= 1.0 {
        return Err(invalid(
            "analysis",
            "risk_free_rate",
            "risk_free_rate must be between 0 and 1",
        ));
    }
    Ok(())
}

fn validate_window(config: &dyn ConfigPort) -> Result<(), RiskError> {
    let value = config.get_int("analysis", "window", DEFAULT_VOLATILITY_WINDOW as i64);
    if value < 2 {
        return Err(invalid("analysis", "window", "window must be at least 2"));
    }
    Ok(())
}

fn validate_enums(config: &dyn ConfigPort) -> Result<(), RiskError> {
    if let Some(raw) = config.get_string("analysis", "var_method") {
        raw.parse::<VarMethod>()
            .map_err(|e| invalid("analysis", "var_method", e.to_string()))?;
    }
    if let Some(raw) = config.get_string("analysis", "return_type") {
        raw.parse::<ReturnKind>()
            .map_err(|e| invalid("analysis", "return_type", e.to_string()))?;
    }
    Ok(())
}
