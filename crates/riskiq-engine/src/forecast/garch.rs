use serde::{Deserialize, Serialize};

use crate::config::GarchConfig;
use crate::returns::ReturnSeries;
use crate::stats::{mean, ZERO_VARIANCE_EPSILON};

use super::{Forecast, ForecastModel, ForecastOrigin, ModelUnavailable, VolatilityForecaster};

const MAX_ALPHA: f64 = 0.30;
const MAX_BETA: f64 = 0.98;
const MAX_PERSISTENCE: f64 = 0.999;
const MIN_OMEGA: f64 = 1e-12;
const INITIAL_STEP: f64 = 0.05;
const MIN_STEP: f64 = 1e-4;

/// Constant-mean GARCH(1,1) parameters on percentage-point returns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GarchParams {
    pub mu: f64,
    pub omega: f64,
    pub alpha: f64,
    pub beta: f64,
}

impl GarchParams {
    pub fn persistence(&self) -> f64 {
        self.alpha + self.beta
    }

    fn is_admissible(&self) -> bool {
        self.omega > MIN_OMEGA
            && self.alpha >= 0.0
            && self.beta >= 0.0
            && self.persistence() < MAX_PERSISTENCE
    }

    /// Conditional variances `sigma2[t]`, backcast from the sample variance at `t = 0`.
    pub fn conditional_variances(&self, residuals: &[f64], sample_var: f64) -> Vec<f64> {
        let mut variances = Vec::with_capacity(residuals.len());
        let mut previous = sample_var;
        let mut previous_residual_sq = sample_var;
        for residual in residuals {
            let current = self.omega + self.alpha * previous_residual_sq + self.beta * previous;
            variances.push(current);
            previous = current;
            previous_residual_sq = residual * residual;
        }
        variances
    }

    /// One-step-ahead variance after the last observation.
    pub fn next_variance(&self, last_residual: f64, last_variance: f64) -> f64 {
        self.omega + self.alpha * last_residual * last_residual + self.beta * last_variance
    }

    /// Gaussian negative log-likelihood without the constant term.
    fn negative_log_likelihood(&self, residuals: &[f64], sample_var: f64) -> f64 {
        if !self.is_admissible() {
            return f64::INFINITY;
        }

        let mut total = 0.0;
        for (residual, variance) in residuals
            .iter()
            .zip(self.conditional_variances(residuals, sample_var))
        {
            if variance <= 0.0 || !variance.is_finite() {
                return f64::INFINITY;
            }
            total += variance.ln() + residual * residual / variance;
        }
        0.5 * total
    }
}

/// Per-request GARCH(1,1) fit: variance-targeted grid search over
/// `(alpha, beta)`, then coordinate refinement of all three parameters.
#[derive(Debug, Clone, Default)]
pub struct GarchForecaster {
    config: GarchConfig,
}

impl GarchForecaster {
    pub fn new(config: GarchConfig) -> Self {
        Self { config }
    }

    pub fn fit(&self, returns: &[f64]) -> Result<GarchParams, ModelUnavailable> {
        if returns.len() < self.config.min_returns {
            return Err(ModelUnavailable::InsufficientHistory {
                required: self.config.min_returns,
                available: returns.len(),
            });
        }

        let mu = mean(returns).unwrap_or(0.0);
        let residuals: Vec<f64> = returns.iter().map(|r| r - mu).collect();
        let sample_var = residuals.iter().map(|e| e * e).sum::<f64>() / residuals.len() as f64;
        if sample_var.sqrt() < ZERO_VARIANCE_EPSILON {
            return Err(ModelUnavailable::ZeroVariance);
        }

        let mut best: Option<(GarchParams, f64)> = None;
        let steps = self.config.grid_steps.max(1);
        for i in 0..=steps {
            let alpha = MAX_ALPHA * i as f64 / steps as f64;
            for j in 0..=steps {
                let beta = MAX_BETA * j as f64 / steps as f64;
                if alpha + beta >= MAX_PERSISTENCE {
                    continue;
                }
                let candidate = GarchParams {
                    mu,
                    omega: sample_var * (1.0 - alpha - beta),
                    alpha,
                    beta,
                };
                let nll = candidate.negative_log_likelihood(&residuals, sample_var);
                if nll.is_finite() && best.map_or(true, |(_, best_nll)| nll < best_nll) {
                    best = Some((candidate, nll));
                }
            }
        }

        let Some((mut params, mut nll)) = best else {
            return Err(ModelUnavailable::FitFailed {
                reason: String::from("likelihood is not finite for any candidate"),
            });
        };

        let mut step = INITIAL_STEP;
        for _ in 0..self.config.refinement_rounds {
            let mut improved = false;
            for candidate in neighbours(params, sample_var, step) {
                let candidate_nll = candidate.negative_log_likelihood(&residuals, sample_var);
                if candidate_nll.is_finite() && candidate_nll < nll {
                    params = candidate;
                    nll = candidate_nll;
                    improved = true;
                }
            }

            if !improved {
                step *= 0.5;
                if step < MIN_STEP {
                    break;
                }
            }
        }

        Ok(params)
    }
}

fn neighbours(params: GarchParams, sample_var: f64, step: f64) -> [GarchParams; 6] {
    let omega_step = step * sample_var;
    [
        GarchParams {
            omega: params.omega + omega_step,
            ..params
        },
        GarchParams {
            omega: (params.omega - omega_step).max(MIN_OMEGA * 2.0),
            ..params
        },
        GarchParams {
            alpha: params.alpha + step,
            ..params
        },
        GarchParams {
            alpha: (params.alpha - step).max(0.0),
            ..params
        },
        GarchParams {
            beta: params.beta + step,
            ..params
        },
        GarchParams {
            beta: (params.beta - step).max(0.0),
            ..params
        },
    ]
}

impl VolatilityForecaster for GarchForecaster {
    fn model(&self) -> ForecastModel {
        ForecastModel::Garch
    }

    fn forecast(&self, returns: &ReturnSeries) -> Result<Forecast, ModelUnavailable> {
        let values = returns.values();
        let params = self.fit(values)?;

        let residuals: Vec<f64> = values.iter().map(|r| r - params.mu).collect();
        let sample_var = residuals.iter().map(|e| e * e).sum::<f64>() / residuals.len() as f64;
        let variances = params.conditional_variances(&residuals, sample_var);

        let (Some(&last_residual), Some(&last_variance)) = (residuals.last(), variances.last())
        else {
            return Err(ModelUnavailable::NonFiniteOutput);
        };

        let next = params.next_variance(last_residual, last_variance);
        if !next.is_finite() || next < 0.0 {
            return Err(ModelUnavailable::NonFiniteOutput);
        }

        Forecast::from_per_period_pct(next.sqrt(), returns, ForecastOrigin::Fitted)
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use riskiq_core::{Interval, PriceSeries, Symbol, UtcDateTime};

    use super::*;

    fn standard_normal(rng: &mut StdRng) -> f64 {
        let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
        let u2: f64 = rng.gen();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }

    fn simulate_garch(n: usize, omega: f64, alpha: f64, beta: f64, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut variance = omega / (1.0 - alpha - beta);
        let mut previous = 0.0_f64;
        (0..n)
            .map(|_| {
                variance = omega + alpha * previous * previous + beta * variance;
                previous = variance.sqrt() * standard_normal(&mut rng);
                previous
            })
            .collect()
    }

    fn return_series(returns: &[f64]) -> ReturnSeries {
        let mut closes = vec![100.0];
        for r in returns {
            let last = closes[closes.len() - 1];
            closes.push(last * (1.0 + r / 100.0));
        }
        let prices = PriceSeries::from_closes(
            Symbol::parse("GARCH").expect("symbol"),
            "USD",
            Interval::OneDay,
            UtcDateTime::parse("2024-12-31T00:00:00Z").expect("ts"),
            &closes,
        )
        .expect("prices");
        ReturnSeries::from_prices(&prices).expect("returns")
    }

    #[test]
    fn fewer_than_thirty_returns_is_unavailable() {
        let forecaster = GarchForecaster::default();
        let returns = return_series(&simulate_garch(10, 0.05, 0.1, 0.85, 7));

        let err = forecaster.forecast(&returns).expect_err("must be unavailable");
        assert_eq!(
            err,
            ModelUnavailable::InsufficientHistory {
                required: 30,
                available: 10
            }
        );
    }

    #[test]
    fn zero_variance_returns_are_unavailable() {
        let err = GarchForecaster::default()
            .fit(&[0.5; 40])
            .expect_err("must be unavailable");
        assert_eq!(err, ModelUnavailable::ZeroVariance);
    }

    #[test]
    fn fitted_parameters_are_stationary() {
        let returns = simulate_garch(500, 0.05, 0.10, 0.85, 11);
        let params = GarchForecaster::default().fit(&returns).expect("fit");

        assert!(params.omega > 0.0);
        assert!(params.alpha >= 0.0 && params.beta >= 0.0);
        assert!(params.persistence() < 1.0);
        assert!(params.persistence() > 0.5);
    }

    #[test]
    fn forecast_is_annualized_and_plausible() {
        let returns = return_series(&simulate_garch(250, 0.05, 0.10, 0.85, 3));
        let forecast = GarchForecaster::default().forecast(&returns).expect("forecast");

        // Unconditional daily sigma is 1% -> roughly 16% annualized.
        assert_eq!(forecast.origin, ForecastOrigin::Fitted);
        assert!(forecast.volatility > 0.05 && forecast.volatility < 0.6);
    }

    #[test]
    fn larger_last_shock_raises_next_variance() {
        let params = GarchParams {
            mu: 0.0,
            omega: 0.05,
            alpha: 0.1,
            beta: 0.85,
        };
        assert!(params.next_variance(3.0, 1.0) > params.next_variance(0.5, 1.0));
    }
}
