use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::Duration;

use crate::ValidationError;

/// Sampling interval of a closing-price history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[default]
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "1wk")]
    OneWeek,
    #[serde(rename = "1mo")]
    OneMonth,
}

impl Interval {
    pub const ALL: [Self; 3] = [Self::OneDay, Self::OneWeek, Self::OneMonth];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OneDay => "1d",
            Self::OneWeek => "1wk",
            Self::OneMonth => "1mo",
        }
    }

    /// Trading periods per year, the annualization factor for volatility.
    pub const fn periods_per_year(self) -> f64 {
        match self {
            Self::OneDay => 252.0,
            Self::OneWeek => 52.0,
            Self::OneMonth => 12.0,
        }
    }

    /// Nominal calendar spacing between two samples.
    pub fn step(self) -> Duration {
        match self {
            Self::OneDay => Duration::days(1),
            Self::OneWeek => Duration::weeks(1),
            Self::OneMonth => Duration::days(30),
        }
    }
}

impl Display for Interval {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "1d" => Ok(Self::OneDay),
            "1wk" => Ok(Self::OneWeek),
            "1mo" => Ok(Self::OneMonth),
            other => Err(ValidationError::InvalidInterval {
                value: other.to_owned(),
            }),
        }
    }
}

/// How far back a price history request reaches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lookback {
    #[serde(rename = "1mo")]
    OneMonth,
    #[serde(rename = "3mo")]
    ThreeMonths,
    #[serde(rename = "6mo")]
    SixMonths,
    #[default]
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "2y")]
    TwoYears,
    #[serde(rename = "5y")]
    FiveYears,
}

impl Lookback {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OneMonth => "1mo",
            Self::ThreeMonths => "3mo",
            Self::SixMonths => "6mo",
            Self::OneYear => "1y",
            Self::TwoYears => "2y",
            Self::FiveYears => "5y",
        }
    }

    /// Approximate number of samples the window holds at `interval`.
    pub fn expected_points(self, interval: Interval) -> usize {
        let years = match self {
            Self::OneMonth => 1.0 / 12.0,
            Self::ThreeMonths => 0.25,
            Self::SixMonths => 0.5,
            Self::OneYear => 1.0,
            Self::TwoYears => 2.0,
            Self::FiveYears => 5.0,
        };
        ((years * interval.periods_per_year()).round() as usize).max(1)
    }
}

impl Display for Lookback {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Lookback {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "1mo" => Ok(Self::OneMonth),
            "3mo" => Ok(Self::ThreeMonths),
            "6mo" => Ok(Self::SixMonths),
            "1y" => Ok(Self::OneYear),
            "2y" => Ok(Self::TwoYears),
            "5y" => Ok(Self::FiveYears),
            other => Err(ValidationError::InvalidLookback {
                value: other.to_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daily_interval_annualizes_with_252_periods() {
        let interval = Interval::from_str("1D").expect("must parse");
        assert_eq!(interval, Interval::OneDay);
        assert_eq!(interval.periods_per_year(), 252.0);
    }

    #[test]
    fn rejects_intraday_interval() {
        let err = Interval::from_str("5m").expect_err("must fail");
        assert!(matches!(err, ValidationError::InvalidInterval { .. }));
    }

    #[test]
    fn one_year_of_daily_data_is_252_points() {
        let lookback = Lookback::from_str("1y").expect("must parse");
        assert_eq!(lookback.expected_points(Interval::OneDay), 252);
        assert_eq!(Lookback::OneMonth.expected_points(Interval::OneDay), 21);
        assert_eq!(Lookback::OneMonth.expected_points(Interval::OneMonth), 1);
    }
}
