//! # Volatility forecasters
//!
//! | Forecaster | Model | Minimum returns |
//! |------------|-------|-----------------|
//! | [`GarchForecaster`] | GARCH(1,1) fitted per request | 30 |
//! | [`BoostedForecaster`] | Gradient-boosted trees, pretrained or fitted in process | 20 (34 to fit) |
//! | [`SequenceForecaster`] | Pretrained 2-layer LSTM | 10 |
//!
//! Every forecaster returns an annualized volatility as a fraction. A
//! forecaster that cannot produce a number reports [`ModelUnavailable`]; that
//! is recorded in the [`ForecastBundle`] and never aborts an assessment.

mod boosted;
mod garch;
mod sequence;

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use boosted::{
    feature_vector, BoostedForecaster, GradientBoostedModel, RegressionTree, TreeNode,
    FEATURE_NAMES,
};
pub use garch::{GarchForecaster, GarchParams};
pub use sequence::{
    LinearArtifact, LstmArtifact, LstmLayerArtifact, LstmModel, SequenceForecaster,
};

use crate::error::ModelError;
use crate::returns::ReturnSeries;

/// Identifies one of the three forecast slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastModel {
    Garch,
    Xgboost,
    Lstm,
}

impl ForecastModel {
    pub const ALL: [Self; 3] = [Self::Garch, Self::Xgboost, Self::Lstm];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Garch => "garch",
            Self::Xgboost => "xgboost",
            Self::Lstm => "lstm",
        }
    }
}

impl Display for ForecastModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an available forecast came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastOrigin {
    /// Parameters estimated on this request's history.
    Fitted,
    /// Loaded from a model artifact.
    Pretrained,
    /// Boosted ensemble trained on this request's history because no artifact exists.
    InProcessFit,
}

/// Why a forecaster produced no number.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelUnavailable {
    #[error("needs at least {required} returns, {available} available")]
    InsufficientHistory { required: usize, available: usize },
    #[error("no model artifact at {path}")]
    ArtifactMissing { path: String },
    #[error("model artifact rejected: {0}")]
    ArtifactInvalid(ModelError),
    #[error("returns have zero variance")]
    ZeroVariance,
    #[error("fit failed: {reason}")]
    FitFailed { reason: String },
    #[error("forecast is not a finite number")]
    NonFiniteOutput,
    #[error("model evaluation failed: {0}")]
    Evaluation(ModelError),
}

/// An available forecast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Forecast {
    /// Annualized volatility as a fraction, never negative.
    pub volatility: f64,
    pub origin: ForecastOrigin,
}

impl Forecast {
    /// Build from a per-period volatility in percentage points; negatives clamp to zero.
    pub fn from_per_period_pct(
        per_period_pct: f64,
        returns: &ReturnSeries,
        origin: ForecastOrigin,
    ) -> Result<Self, ModelUnavailable> {
        let volatility = returns.annualize(per_period_pct.max(0.0));
        if !volatility.is_finite() {
            return Err(ModelUnavailable::NonFiniteOutput);
        }
        Ok(Self { volatility, origin })
    }
}

/// Pretrained model capability: a numeric input (feature vector or window)
/// mapped to a scalar prediction.
pub trait ScalarModel: Send + Sync {
    fn predict(&self, input: ndarray::ArrayView1<'_, f64>) -> Result<f64, ModelError>;
}

/// One forecasting strategy. The engine iterates over a list of these.
pub trait VolatilityForecaster: Send + Sync {
    fn model(&self) -> ForecastModel;

    fn forecast(&self, returns: &ReturnSeries) -> Result<Forecast, ModelUnavailable>;
}

/// Outcome of one forecast slot as reported to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ForecastOutcome {
    Available {
        volatility: f64,
        origin: ForecastOrigin,
    },
    Unavailable {
        reason: String,
    },
}

impl ForecastOutcome {
    pub fn volatility(&self) -> Option<f64> {
        match self {
            Self::Available { volatility, .. } => Some(*volatility),
            Self::Unavailable { .. } => None,
        }
    }
}

impl From<Result<Forecast, ModelUnavailable>> for ForecastOutcome {
    fn from(result: Result<Forecast, ModelUnavailable>) -> Self {
        match result {
            Ok(forecast) => Self::Available {
                volatility: forecast.volatility,
                origin: forecast.origin,
            },
            Err(reason) => Self::Unavailable {
                reason: reason.to_string(),
            },
        }
    }
}

impl Default for ForecastOutcome {
    fn default() -> Self {
        Self::Unavailable {
            reason: String::from("forecaster not configured"),
        }
    }
}

/// The three forecast slots of an assessment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastBundle {
    pub garch: ForecastOutcome,
    pub xgboost: ForecastOutcome,
    pub lstm: ForecastOutcome,
}

impl ForecastBundle {
    pub fn set(&mut self, model: ForecastModel, outcome: ForecastOutcome) {
        match model {
            ForecastModel::Garch => self.garch = outcome,
            ForecastModel::Xgboost => self.xgboost = outcome,
            ForecastModel::Lstm => self.lstm = outcome,
        }
    }

    pub fn get(&self, model: ForecastModel) -> &ForecastOutcome {
        match model {
            ForecastModel::Garch => &self.garch,
            ForecastModel::Xgboost => &self.xgboost,
            ForecastModel::Lstm => &self.lstm,
        }
    }

    /// Available forecasts in slot order.
    pub fn available(&self) -> impl Iterator<Item = (ForecastModel, f64)> + '_ {
        ForecastModel::ALL
            .into_iter()
            .filter_map(|model| self.get(model).volatility().map(|vol| (model, vol)))
    }

    /// Run every forecaster over `returns` and collect the outcomes.
    pub fn evaluate(
        forecasters: &[std::sync::Arc<dyn VolatilityForecaster>],
        returns: &ReturnSeries,
    ) -> Self {
        let mut bundle = Self::default();
        for forecaster in forecasters {
            let result = forecaster.forecast(returns);
            if let Err(reason) = &result {
                tracing::debug!(
                    symbol = %returns.symbol(),
                    model = %forecaster.model(),
                    %reason,
                    "forecast unavailable"
                );
            }
            bundle.set(forecaster.model(), result.into());
        }
        bundle
    }
}
