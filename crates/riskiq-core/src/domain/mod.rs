//! # Domain Models
//!
//! Canonical domain types for price histories.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Symbol`] | Validated exchange ticker |
//! | [`Interval`] | Sampling interval (1d, 1wk, 1mo) |
//! | [`Lookback`] | History window (1mo .. 5y) |
//! | [`PricePoint`] | One (timestamp, close) observation |
//! | [`PriceSeries`] | Chronological closes plus currency for one ticker |
//! | [`UtcDateTime`] | UTC timestamp |
//!
//! All types enforce their invariants at construction time and return
//! [`ValidationError`](crate::ValidationError) otherwise.

mod interval;
mod models;
mod symbol;
mod timestamp;

pub use interval::{Interval, Lookback};
pub use models::{validate_currency_code, PricePoint, PriceSeries};
pub use symbol::Symbol;
pub use timestamp::UtcDateTime;
