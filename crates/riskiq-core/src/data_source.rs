//! Market-data contract and request/response types.
//!
//! The risk engine treats a [`MarketDataSource`] as its sole source of truth
//! for prices. Adapters own their retry and circuit-breaking policy; callers
//! never retry on their own.
//!
//! # Example
//!
//! ```rust,ignore
//! use riskiq_core::{HistoryRequest, Interval, Lookback, MarketDataSource, Symbol, YahooAdapter};
//!
//! async fn closes(adapter: &YahooAdapter) -> Result<(), riskiq_core::SourceError> {
//!     let request = HistoryRequest::new(Symbol::parse("AAPL")?, Lookback::OneYear, Interval::OneDay);
//!     let series = adapter.history(request).await?;
//!     println!("{} closes in {}", series.len(), series.currency());
//!     Ok(())
//! }
//! ```

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use crate::{Interval, Lookback, PriceSeries, ProviderId, Symbol, ValidationError};

/// Adapter-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    /// The ticker is unknown or delisted upstream.
    NotFound,
    Unavailable,
    RateLimited,
    InvalidRequest,
    Internal,
}

/// Structured source error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
    retryable: bool,
}

impl SourceError {
    pub fn not_found(symbol: &Symbol) -> Self {
        Self {
            kind: SourceErrorKind::NotFound,
            message: format!("no price history for '{symbol}'; ticker may be unknown or delisted"),
            retryable: false,
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Unavailable,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::RateLimited,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::InvalidRequest,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Internal,
            message: message.into(),
            retryable: false,
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::NotFound => "source.not_found",
            SourceErrorKind::Unavailable => "source.unavailable",
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::InvalidRequest => "source.invalid_request",
            SourceErrorKind::Internal => "source.internal",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

impl From<ValidationError> for SourceError {
    fn from(error: ValidationError) -> Self {
        Self::internal(error.to_string())
    }
}

/// Request payload for a closing-price history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    pub symbol: Symbol,
    pub lookback: Lookback,
    pub interval: Interval,
}

impl HistoryRequest {
    pub fn new(symbol: Symbol, lookback: Lookback, interval: Interval) -> Self {
        Self {
            symbol,
            lookback,
            interval,
        }
    }

    /// Daily closes over the last year, the engine's default window.
    pub fn daily(symbol: Symbol) -> Self {
        Self::new(symbol, Lookback::OneYear, Interval::OneDay)
    }
}

/// Market-data collaborator contract.
///
/// Implementations must be `Send + Sync`; the portfolio aggregator shares
/// one source across concurrent per-ticker tasks.
pub trait MarketDataSource: Send + Sync {
    /// Returns the unique provider identifier.
    fn id(&self) -> ProviderId;

    /// Fetches the closing-price history for one ticker.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] with kind [`SourceErrorKind::NotFound`] for
    /// unknown or delisted tickers, and `Unavailable`/`RateLimited` for
    /// transport problems that survived the adapter's own retries.
    fn history<'a>(
        &'a self,
        req: HistoryRequest,
    ) -> Pin<Box<dyn Future<Output = Result<PriceSeries, SourceError>> + Send + 'a>>;
}
