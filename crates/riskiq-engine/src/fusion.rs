//! Forecast fusion and risk classification.
//!
//! The fused volatility is the plain mean of the available forecasts and
//! falls back to the realized volatility when none is available. The tier
//! comes from a volatility ladder and is escalated, never lowered, by a
//! second ladder over the CVaR tail loss. The tail ladder is calibrated on
//! daily losses, so coarser intervals are scaled to their daily equivalent
//! before being placed on it.

use std::fmt::{Display, Formatter};

use riskiq_core::Interval;
use serde::{Deserialize, Serialize};

use crate::forecast::{ForecastBundle, ForecastModel};

/// Upper bounds (exclusive) of LOW, LOW-MODERATE, MODERATE and MODERATE-HIGH
/// on annualized volatility.
pub const VOLATILITY_THRESHOLDS: [f64; 4] = [0.20, 0.30, 0.40, 0.50];

/// Same ladder over the absolute CVaR(95%) of one trading day.
pub const TAIL_LOSS_THRESHOLDS: [f64; 4] = [0.04, 0.06, 0.09, 0.12];

/// Discrete risk tier, ordered from least to most risky.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    #[serde(rename = "LOW")]
    Low,
    #[serde(rename = "LOW-MODERATE")]
    LowModerate,
    #[serde(rename = "MODERATE")]
    Moderate,
    #[serde(rename = "MODERATE-HIGH")]
    ModerateHigh,
    #[serde(rename = "HIGH")]
    High,
}

impl RiskLevel {
    pub const ALL: [Self; 5] = [
        Self::Low,
        Self::LowModerate,
        Self::Moderate,
        Self::ModerateHigh,
        Self::High,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::LowModerate => "LOW-MODERATE",
            Self::Moderate => "MODERATE",
            Self::ModerateHigh => "MODERATE-HIGH",
            Self::High => "HIGH",
        }
    }

    /// Place `value` on a half-open ladder. Values below zero land in LOW and
    /// NaN lands in HIGH, so every input maps to exactly one tier.
    fn from_ladder(value: f64, thresholds: &[f64; 4]) -> Self {
        if value < thresholds[0] {
            Self::Low
        } else if value < thresholds[1] {
            Self::LowModerate
        } else if value < thresholds[2] {
            Self::Moderate
        } else if value < thresholds[3] {
            Self::ModerateHigh
        } else {
            Self::High
        }
    }

    pub fn from_volatility(volatility: f64) -> Self {
        Self::from_ladder(volatility, &VOLATILITY_THRESHOLDS)
    }

    /// `cvar_95` is the one-period CVaR at `interval`.
    pub fn from_tail_loss(cvar_95: f64, interval: Interval) -> Self {
        Self::from_ladder(daily_tail_loss(cvar_95, interval), &TAIL_LOSS_THRESHOLDS)
    }
}

impl Display for RiskLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fused forward-looking volatility and the forecasts that went into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedForecast {
    pub volatility: f64,
    pub inputs: Vec<ForecastModel>,
    /// True when no forecast was available and realized volatility was used.
    pub fallback: bool,
}

pub fn fuse(bundle: &ForecastBundle, historical_volatility: f64) -> FusedForecast {
    let (inputs, values): (Vec<ForecastModel>, Vec<f64>) = bundle.available().unzip();
    if values.is_empty() {
        return FusedForecast {
            volatility: historical_volatility,
            inputs,
            fallback: true,
        };
    }

    FusedForecast {
        volatility: values.iter().sum::<f64>() / values.len() as f64,
        inputs,
        fallback: false,
    }
}

/// Absolute one-period tail loss rescaled to one trading day with the
/// square-root-of-time rule, matching how volatility is annualized.
pub fn daily_tail_loss(cvar_95: f64, interval: Interval) -> f64 {
    cvar_95.abs() * (interval.periods_per_year() / TRADING_DAYS_PER_YEAR).sqrt()
}

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub risk_level: RiskLevel,
    pub volatility_tier: RiskLevel,
    pub tail_tier: RiskLevel,
    pub rationale: String,
}

pub fn classify(fused_volatility: f64, cvar_95: f64, interval: Interval) -> Classification {
    let volatility_tier = RiskLevel::from_volatility(fused_volatility);
    let tail_tier = RiskLevel::from_tail_loss(cvar_95, interval);
    let risk_level = volatility_tier.max(tail_tier);

    let mut rationale = format!(
        "Fused volatility of {:.1}% maps to {volatility_tier}; tail loss (CVaR 95%) of {:.2}% per {interval} maps to {tail_tier}.",
        fused_volatility * 100.0,
        cvar_95.abs() * 100.0,
    );
    if risk_level > volatility_tier {
        rationale.push_str(&format!(" Tail risk escalates the tier to {risk_level}."));
    } else {
        rationale.push_str(&format!(" Final tier {risk_level}."));
    }

    Classification {
        risk_level,
        volatility_tier,
        tail_tier,
        rationale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::{ForecastOrigin, ForecastOutcome};

    #[test]
    fn volatility_ladder_is_half_open() {
        let cases = [
            (0.0, RiskLevel::Low),
            (0.199_999, RiskLevel::Low),
            (0.2, RiskLevel::LowModerate),
            (0.3, RiskLevel::Moderate),
            (0.4, RiskLevel::ModerateHigh),
            (0.5, RiskLevel::High),
            (7.5, RiskLevel::High),
            (-0.1, RiskLevel::Low),
            (f64::NAN, RiskLevel::High),
            (f64::INFINITY, RiskLevel::High),
        ];
        for (volatility, expected) in cases {
            assert_eq!(RiskLevel::from_volatility(volatility), expected, "{volatility}");
        }
    }

    #[test]
    fn tiers_are_ordered() {
        assert!(RiskLevel::ALL.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(
            serde_json::to_value(RiskLevel::LowModerate).expect("json"),
            "LOW-MODERATE"
        );
    }

    #[test]
    fn fusion_averages_available_forecasts() {
        let mut bundle = ForecastBundle::default();
        bundle.set(
            ForecastModel::Garch,
            ForecastOutcome::Available {
                volatility: 0.2,
                origin: ForecastOrigin::Fitted,
            },
        );
        bundle.set(
            ForecastModel::Xgboost,
            ForecastOutcome::Available {
                volatility: 0.4,
                origin: ForecastOrigin::InProcessFit,
            },
        );

        let fused = fuse(&bundle, 0.9);
        assert!((fused.volatility - 0.3).abs() < 1e-12);
        assert_eq!(fused.inputs, vec![ForecastModel::Garch, ForecastModel::Xgboost]);
        assert!(!fused.fallback);
    }

    #[test]
    fn fusion_without_forecasts_is_exactly_historical() {
        let fused = fuse(&ForecastBundle::default(), 0.273_4);
        assert_eq!(fused.volatility, 0.273_4);
        assert!(fused.inputs.is_empty());
        assert!(fused.fallback);
    }

    #[test]
    fn tail_loss_only_escalates() {
        let calm = classify(0.15, -0.02, Interval::OneDay);
        assert_eq!(calm.risk_level, RiskLevel::Low);
        assert!(calm.rationale.contains("Final tier LOW"));

        let fat_tail = classify(0.15, -0.10, Interval::OneDay);
        assert_eq!(fat_tail.volatility_tier, RiskLevel::Low);
        assert_eq!(fat_tail.tail_tier, RiskLevel::ModerateHigh);
        assert_eq!(fat_tail.risk_level, RiskLevel::ModerateHigh);
        assert!(fat_tail.rationale.contains("escalates"));

        let volatile = classify(0.55, -0.01, Interval::OneDay);
        assert_eq!(volatile.risk_level, RiskLevel::High);
    }

    #[test]
    fn tail_ladder_compares_daily_equivalent_losses() {
        // A 2% daily loss and its monthly and weekly square-root-of-time equivalents.
        let daily = RiskLevel::from_tail_loss(-0.02, Interval::OneDay);
        let weekly =
            RiskLevel::from_tail_loss(-0.02 * (252.0_f64 / 52.0).sqrt(), Interval::OneWeek);
        let monthly = RiskLevel::from_tail_loss(-0.02 * 21.0_f64.sqrt(), Interval::OneMonth);
        assert_eq!(daily, RiskLevel::Low);
        assert_eq!(weekly, RiskLevel::Low);
        assert_eq!(monthly, RiskLevel::Low);

        // 16.6% in one month is about 3.6% per day.
        let monthly_crash = classify(0.273, -0.166, Interval::OneMonth);
        assert_eq!(monthly_crash.tail_tier, RiskLevel::Low);
        assert_eq!(monthly_crash.risk_level, RiskLevel::LowModerate);
        assert!(monthly_crash.rationale.contains("per 1mo"), "{}", monthly_crash.rationale);

        assert_eq!(daily_tail_loss(-0.05, Interval::OneDay), 0.05);
        assert!(daily_tail_loss(f64::NAN, Interval::OneMonth).is_nan());
    }
}
