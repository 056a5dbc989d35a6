use riskiq_core::{Interval, PriceSeries, Symbol, UtcDateTime};

use crate::error::EngineError;

/// Fewest finite returns any downstream consumer accepts.
pub const MIN_RETURNS: usize = 2;

/// One simple return, aligned to the later price of its pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReturnPoint {
    pub ts: UtcDateTime,
    pub close: f64,
    /// Simple return in percentage points.
    pub value: f64,
}

/// Simple returns of a price series, in percentage points
/// (`100 * (p_t / p_{t-1} - 1)`).
///
/// Non-finite returns (for example after a zero close) are dropped, so every
/// stored value is finite.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnSeries {
    symbol: Symbol,
    currency: String,
    interval: Interval,
    points: Vec<ReturnPoint>,
    values: Vec<f64>,
}

impl ReturnSeries {
    pub fn from_prices(prices: &PriceSeries) -> Result<Self, EngineError> {
        let points: Vec<ReturnPoint> = prices
            .points()
            .windows(2)
            .filter_map(|pair| {
                let value = 100.0 * (pair[1].close / pair[0].close - 1.0);
                value.is_finite().then_some(ReturnPoint {
                    ts: pair[1].ts,
                    close: pair[1].close,
                    value,
                })
            })
            .collect();

        if points.len() < MIN_RETURNS {
            return Err(EngineError::InsufficientHistory {
                required: MIN_RETURNS,
                available: points.len(),
            });
        }

        let values = points.iter().map(|point| point.value).collect();
        Ok(Self {
            symbol: prices.symbol().clone(),
            currency: prices.currency().to_owned(),
            interval: prices.interval(),
            points,
            values,
        })
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

    pub fn points(&self) -> &[ReturnPoint] {
        &self.points
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Annualize a per-period volatility given in percentage points into a fraction.
    pub fn annualize(&self, per_period_pct: f64) -> f64 {
        annualize(per_period_pct, self.interval)
    }
}

pub fn annualize(per_period_pct: f64, interval: Interval) -> f64 {
    per_period_pct / 100.0 * interval.periods_per_year().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prices(closes: &[f64]) -> PriceSeries {
        PriceSeries::from_closes(
            Symbol::parse("TEST").expect("symbol"),
            "USD",
            Interval::OneDay,
            UtcDateTime::parse("2024-03-01T00:00:00Z").expect("ts"),
            closes,
        )
        .expect("series")
    }

    #[test]
    fn returns_are_percentage_points_aligned_to_later_price() {
        let returns = ReturnSeries::from_prices(&prices(&[100.0, 110.0, 99.0])).expect("returns");

        assert_eq!(returns.len(), 2);
        assert!((returns.values()[0] - 10.0).abs() < 1e-9);
        assert!((returns.values()[1] + 10.0).abs() < 1e-9);
        assert_eq!(returns.points()[1].close, 99.0);
        assert_eq!(returns.points()[1].ts.date_string(), "2024-03-01");
    }

    #[test]
    fn non_finite_returns_are_dropped() {
        // 0 -> 5 is an infinite return and is skipped.
        let returns =
            ReturnSeries::from_prices(&prices(&[10.0, 0.0, 5.0, 6.0, 3.0])).expect("returns");
        assert_eq!(returns.len(), 3);
        assert!(returns.values().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn fewer_than_two_returns_is_insufficient_history() {
        let err = ReturnSeries::from_prices(&prices(&[10.0, 11.0])).expect_err("must fail");
        assert_eq!(
            err,
            EngineError::InsufficientHistory {
                required: 2,
                available: 1
            }
        );
    }

    #[test]
    fn annualizes_daily_percent_into_fraction() {
        let annual = annualize(1.0, Interval::OneDay);
        assert!((annual - 0.158_745).abs() < 1e-6);
    }
}
