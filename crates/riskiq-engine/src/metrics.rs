use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::error::EngineError;
use crate::returns::{ReturnSeries, MIN_RETURNS};
use crate::stats::{mean, percentile, sample_std, ZERO_VARIANCE_EPSILON};

/// Tail probability of the 95% VaR.
const TAIL_PROBABILITY: f64 = 0.05;

/// How VaR(95%) is estimated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarMethod {
    /// Empirical 5th percentile of the returns.
    #[default]
    Historical,
    /// `mean + sigma * z(0.05)` under a normal fit.
    Parametric,
}

impl VarMethod {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Historical => "historical",
            Self::Parametric => "parametric",
        }
    }
}

impl Display for VarMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VarMethod {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "historical" => Ok(Self::Historical),
            "parametric" => Ok(Self::Parametric),
            other => Err(format!(
                "invalid VaR method '{other}', expected historical or parametric"
            )),
        }
    }
}

/// Realized risk statistics of one return series.
///
/// Volatility is annualized; VaR and CVaR are one-period losses. All three
/// are fractions (0.25 = 25%).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RealizedRiskMetrics {
    pub historical_volatility: f64,
    #[serde(rename = "VaR_95")]
    pub var_95: f64,
    #[serde(rename = "CVaR_95")]
    pub cvar_95: f64,
}

impl RealizedRiskMetrics {
    pub const ZERO: Self = Self {
        historical_volatility: 0.0,
        var_95: 0.0,
        cvar_95: 0.0,
    };

    pub fn compute(returns: &ReturnSeries, method: VarMethod) -> Result<Self, EngineError> {
        let values = returns.values();
        let (Some(mu), Some(sigma)) = (mean(values), sample_std(values)) else {
            return Err(EngineError::InsufficientHistory {
                required: MIN_RETURNS,
                available: values.len(),
            });
        };

        if sigma < ZERO_VARIANCE_EPSILON {
            return Ok(Self::ZERO);
        }

        let raw_var = match method {
            VarMethod::Historical => percentile(values, TAIL_PROBABILITY).unwrap_or(mu),
            VarMethod::Parametric => parametric_var(mu, sigma),
        };

        let tail: Vec<f64> = values.iter().copied().filter(|v| *v <= raw_var).collect();
        let raw_cvar = mean(&tail).unwrap_or(raw_var);

        let var_95 = (raw_var / 100.0).min(0.0);
        // CVaR averages the tail at or below VaR, so it can never sit above it.
        let cvar_95 = (raw_cvar / 100.0).min(var_95);

        Ok(Self {
            historical_volatility: returns.annualize(sigma),
            var_95,
            cvar_95,
        })
    }
}

fn parametric_var(mu: f64, sigma: f64) -> f64 {
    match Normal::new(mu, sigma) {
        Ok(normal) => normal.inverse_cdf(TAIL_PROBABILITY),
        // 1.6449 is z(0.95); only reached if statrs rejects the parameters.
        Err(_) => mu - 1.644_853_626_951_472_2 * sigma,
    }
}
