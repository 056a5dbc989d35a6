use serde::{Deserialize, Serialize};
use thiserror::Error;

use riskiq_core::{SourceError, Symbol, ValidationError};

/// One ticker that could not be assessed inside a portfolio request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentFailure {
    pub ticker: String,
    pub code: String,
    pub message: String,
}

impl InstrumentFailure {
    pub fn from_error(ticker: impl Into<String>, error: &EngineError) -> Self {
        Self {
            ticker: ticker.into(),
            code: error.code().to_owned(),
            message: error.to_string(),
        }
    }
}

/// Fatal errors of the risk pipeline.
///
/// Forecaster failures are not represented here; they are recorded as
/// unavailable entries of the forecast bundle instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("insufficient history: {required} returns required, {available} available")]
    InsufficientHistory { required: usize, available: usize },

    #[error("market data unavailable for {symbol}: {source}")]
    DataUnavailable {
        symbol: Symbol,
        #[source]
        source: SourceError,
    },

    #[error("no instrument in the portfolio could be assessed ({} failures)", .failures.len())]
    NoValidInstruments { failures: Vec<InstrumentFailure> },

    #[error("invalid portfolio: {reason}")]
    InvalidPortfolio { reason: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("assessment task for {symbol} failed: {message}")]
    Task { symbol: String, message: String },
}

impl EngineError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InsufficientHistory { .. } => "risk.insufficient_history",
            Self::DataUnavailable { .. } => "risk.data_unavailable",
            Self::NoValidInstruments { .. } => "risk.no_valid_instruments",
            Self::InvalidPortfolio { .. } => "risk.invalid_portfolio",
            Self::Validation(_) => "risk.validation",
            Self::Task { .. } => "risk.task_failed",
        }
    }

    /// Whether retrying the same request later could succeed.
    pub fn retryable(&self) -> bool {
        match self {
            Self::DataUnavailable { source, .. } => source.retryable(),
            Self::Task { .. } => true,
            _ => false,
        }
    }
}

/// Errors raised while loading or evaluating a model artifact.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("failed to read model artifact {path}: {message}")]
    Io { path: String, message: String },

    #[error("malformed model artifact {path}: {message}")]
    Malformed { path: String, message: String },

    #[error("model expects {expected} inputs, got {actual}")]
    InputShape { expected: usize, actual: usize },

    #[error("model produced a non-finite output")]
    NonFinite,
}
