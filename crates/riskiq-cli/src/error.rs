use thiserror::Error;

use riskiq_engine::{ConfigError, EngineError};

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] riskiq_core::ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Risk(#[from] EngineError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error("invalid log filter '{value}': {message}")]
    LogFilter { value: String, message: String },

    #[error("command did not finish within {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) | Self::Config(_) | Self::LogFilter { .. } => 2,
            Self::Risk(EngineError::InvalidPortfolio { .. } | EngineError::Validation(_)) => 2,
            Self::Risk(_) => 3,
            Self::Serialization(_) => 4,
            Self::Timeout { .. } => 7,
            Self::Io(_) => 10,
        }
    }
}
