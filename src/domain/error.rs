//! Domain error types.

/// Top-level error type for quantrisk.
///
/// The first four variants are the analytic failure kinds every core operation
/// reports; the remainder belong to storage and configuration plumbing.
#[derive(Debug, thiserror::Error)]
pub enum RiskError {
    #[error("no data found for ticker {ticker}")]
    NotFound { ticker: String },

    #[error("insufficient data for {context}: have {have}, need {need}")]
    InsufficientData {
        context: String,
        have: usize,
        need: usize,
    },

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("invalid data: {reason}")]
    InvalidData { reason: String },

    #[error("storage error: {reason}")]
    Storage { reason: String },

    #[error("storage query error: {reason}")]
    StorageQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RiskError {
    pub fn not_found(ticker: impl Into<String>) -> Self {
        RiskError::NotFound {
            ticker: ticker.into(),
        }
    }

    pub fn insufficient(context: impl Into<String>, have: usize, need: usize) -> Self {
        RiskError::InsufficientData {
            context: context.into(),
            have,
            need,
        }
    }

    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        RiskError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_data(reason: impl Into<String>) -> Self {
        RiskError::InvalidData {
            reason: reason.into(),
        }
    }
}

impl RiskError {
    /// Process exit status for this error kind.
    pub fn exit_status(&self) -> u8 {
        match self {
            RiskError::Io(_) => 1,
            RiskError::ConfigParse { .. }
            | RiskError::ConfigMissing { .. }
            | RiskError::ConfigInvalid { .. } => 2,
            RiskError::Storage { .. } | RiskError::StorageQuery { .. } => 3,
            RiskError::InvalidParameter { .. } => 4,
            RiskError::NotFound { .. } | RiskError::InsufficientData { .. } => 5,
            RiskError::InvalidData { .. } => 6,
        }
    }
}

impl From<&RiskError> for std::process::ExitCode {
    fn from(err: &RiskError) -> Self {
        std::process::ExitCode::from(err.exit_status())
    }
}
