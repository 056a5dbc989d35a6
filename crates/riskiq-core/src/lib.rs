//! Core contracts for riskiq.
//!
//! This crate contains:
//! - Canonical domain models (tickers, timestamps, price histories) and validation
//! - The market-data contract plus Yahoo and in-memory sources
//! - HTTP transport, retry and circuit-breaker plumbing for adapters
//! - The response envelope shared by every machine-readable output

pub mod adapters;
pub mod circuit_breaker;
pub mod data_source;
pub mod domain;
pub mod envelope;
pub mod error;
pub mod http_client;
pub mod retry;
pub mod source;

pub use adapters::{InMemorySource, YahooAdapter};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use data_source::{HistoryRequest, MarketDataSource, SourceError, SourceErrorKind};
pub use domain::{
    validate_currency_code, Interval, Lookback, PricePoint, PriceSeries, Symbol, UtcDateTime,
};
pub use envelope::{Envelope, EnvelopeError, EnvelopeMeta};
pub use error::ValidationError;
pub use http_client::{HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient};
pub use retry::{Backoff, RetryConfig};
pub use source::ProviderId;
