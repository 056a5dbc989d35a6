use serde::{Deserialize, Serialize};

use crate::{Interval, Symbol, UtcDateTime, ValidationError};

/// One closing price observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PricePointRecord")]
pub struct PricePoint {
    pub ts: UtcDateTime,
    pub close: f64,
}

impl PricePoint {
    pub fn new(ts: UtcDateTime, close: f64) -> Result<Self, ValidationError> {
        validate_non_negative("close", close)?;
        Ok(Self { ts, close })
    }
}

#[derive(Deserialize)]
struct PricePointRecord {
    ts: UtcDateTime,
    close: f64,
}

impl TryFrom<PricePointRecord> for PricePoint {
    type Error = ValidationError;

    fn try_from(record: PricePointRecord) -> Result<Self, Self::Error> {
        Self::new(record.ts, record.close)
    }
}

/// Chronological closing-price history for one ticker.
///
/// Timestamps are strictly increasing; the currency is carried through to
/// downstream outputs and never converted. Deserialization goes through
/// [`PriceSeries::new`], so a decoded series holds the same guarantees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PriceSeriesRecord")]
pub struct PriceSeries {
    symbol: Symbol,
    currency: String,
    interval: Interval,
    points: Vec<PricePoint>,
}

#[derive(Deserialize)]
struct PriceSeriesRecord {
    symbol: Symbol,
    currency: String,
    interval: Interval,
    points: Vec<PricePoint>,
}

impl TryFrom<PriceSeriesRecord> for PriceSeries {
    type Error = ValidationError;

    fn try_from(record: PriceSeriesRecord) -> Result<Self, Self::Error> {
        Self::new(record.symbol, record.currency, record.interval, record.points)
    }
}

impl PriceSeries {
    pub fn new(
        symbol: Symbol,
        currency: impl AsRef<str>,
        interval: Interval,
        points: Vec<PricePoint>,
    ) -> Result<Self, ValidationError> {
        for (index, pair) in points.windows(2).enumerate() {
            let (previous, current) = (pair[0].ts, pair[1].ts);
            if current == previous {
                return Err(ValidationError::DuplicateTimestamp {
                    ts: current.format_rfc3339(),
                });
            }
            if current < previous {
                return Err(ValidationError::UnorderedSeries { index: index + 1 });
            }
        }

        Ok(Self {
            symbol,
            currency: validate_currency_code(currency.as_ref())?,
            interval,
            points,
        })
    }

    /// Build a series from raw closes spaced one `interval` apart, ending at `end`.
    pub fn from_closes(
        symbol: Symbol,
        currency: impl AsRef<str>,
        interval: Interval,
        end: UtcDateTime,
        closes: &[f64],
    ) -> Result<Self, ValidationError> {
        let count = closes.len();
        let points = closes
            .iter()
            .enumerate()
            .map(|(index, &close)| {
                let steps_back = (count - index - 1) as i32;
                PricePoint::new(end.offset_by(-(interval.step() * steps_back)), close)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(symbol, currency, interval, points)
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn closes(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|point| point.close)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Validate and normalize currency to uppercase 3-letter code.
pub fn validate_currency_code(input: &str) -> Result<String, ValidationError> {
    let normalized = input.trim().to_ascii_uppercase();
    let is_valid = normalized.len() == 3 && normalized.chars().all(|ch| ch.is_ascii_alphabetic());

    if !is_valid {
        return Err(ValidationError::InvalidCurrency {
            value: input.to_owned(),
        });
    }

    Ok(normalized)
}

fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}
