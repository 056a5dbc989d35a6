use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use riskiq_core::{HistoryRequest, Interval, MarketDataSource, PriceSeries, Symbol};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::forecast::{
    BoostedForecaster, ForecastBundle, ForecastModel, GarchForecaster, ModelUnavailable,
    ScalarModel, SequenceForecaster, VolatilityForecaster,
};
use crate::fusion::{classify, fuse, RiskLevel};
use crate::metrics::RealizedRiskMetrics;
use crate::model_store::ModelStore;
use crate::returns::ReturnSeries;

/// One chart point of an assessment; `return` is a fraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalPoint {
    pub date: String,
    pub close: f64,
    #[serde(rename = "return")]
    pub period_return: f64,
}

/// Full risk picture of one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub ticker: Symbol,
    pub currency: String,
    pub interval: Interval,
    pub risk_level: RiskLevel,
    pub volatility_tier: RiskLevel,
    pub tail_tier: RiskLevel,
    pub rationale: String,
    pub fused_volatility: f64,
    pub fusion_inputs: Vec<ForecastModel>,
    #[serde(flatten)]
    pub metrics: RealizedRiskMetrics,
    pub forecasts: ForecastBundle,
    /// Number of returns the assessment was computed from.
    pub observations: usize,
    pub historical_data: Vec<HistoricalPoint>,
}

/// Runs the per-instrument pipeline: returns, realized metrics, forecasts,
/// fusion and classification.
///
/// Cloning is cheap; configuration and loaded models are shared behind `Arc`.
#[derive(Clone)]
pub struct RiskEngine {
    config: Arc<EngineConfig>,
    forecasters: Arc<[Arc<dyn VolatilityForecaster>]>,
}

impl Debug for RiskEngine {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let models: Vec<ForecastModel> = self.forecasters.iter().map(|f| f.model()).collect();
        f.debug_struct("RiskEngine")
            .field("config", &self.config)
            .field("forecasters", &models)
            .finish()
    }
}

fn loaded_or_logged<M: ScalarModel + 'static>(
    result: Result<M, ModelUnavailable>,
    model: ForecastModel,
) -> Result<Arc<dyn ScalarModel>, ModelUnavailable> {
    match result {
        Ok(loaded) => {
            info!(%model, "loaded pretrained model");
            Ok(Arc::new(loaded))
        }
        Err(reason @ ModelUnavailable::ArtifactMissing { .. }) => {
            debug!(%model, %reason, "no pretrained model");
            Err(reason)
        }
        Err(reason) => {
            warn!(%model, %reason, "ignoring invalid model artifact");
            Err(reason)
        }
    }
}

impl RiskEngine {
    /// Build the standard GARCH, boosted and LSTM forecasters, loading
    /// pretrained artifacts from `config.model_dir`.
    ///
    /// A missing or invalid boosted artifact falls back to the in-process fit;
    /// a missing or invalid LSTM artifact leaves that slot unavailable.
    pub fn new(config: EngineConfig) -> Self {
        let store = ModelStore::new(&config.model_dir);
        let forecasters = Self::standard_forecasters(&config, &store);
        Self::with_forecasters(config, forecasters)
    }

    pub fn standard_forecasters(
        config: &EngineConfig,
        store: &ModelStore,
    ) -> Vec<Arc<dyn VolatilityForecaster>> {
        let boosted = loaded_or_logged(store.load_boosted(), ForecastModel::Xgboost).ok();
        let sequence = loaded_or_logged(store.load_sequence(), ForecastModel::Lstm);

        let garch: Arc<dyn VolatilityForecaster> =
            Arc::new(GarchForecaster::new(config.garch.clone()));
        let boosted: Arc<dyn VolatilityForecaster> =
            Arc::new(BoostedForecaster::new(config.boosted.clone(), boosted));
        let sequence: Arc<dyn VolatilityForecaster> =
            Arc::new(SequenceForecaster::new(config.sequence.clone(), sequence));
        vec![garch, boosted, sequence]
    }

    pub fn with_forecasters(
        config: EngineConfig,
        forecasters: Vec<Arc<dyn VolatilityForecaster>>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            forecasters: forecasters.into(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Assess an already fetched price history. CPU bound; async callers go
    /// through [`RiskEngine::assess`].
    pub fn assess_series(&self, prices: &PriceSeries) -> Result<RiskAssessment, EngineError> {
        let returns = ReturnSeries::from_prices(prices)?;
        let metrics = RealizedRiskMetrics::compute(&returns, self.config.var_method)?;
        let forecasts = ForecastBundle::evaluate(&self.forecasters, &returns);
        let fused = fuse(&forecasts, metrics.historical_volatility);
        let classification = classify(fused.volatility, metrics.cvar_95, returns.interval());

        if fused.fallback {
            debug!(
                symbol = %returns.symbol(),
                "no forecast available, using realized volatility"
            );
        }

        let skip = returns.len().saturating_sub(self.config.history_points);
        let historical_data = returns.points()[skip..]
            .iter()
            .map(|point| HistoricalPoint {
                date: point.ts.date_string(),
                close: point.close,
                period_return: point.value / 100.0,
            })
            .collect();

        Ok(RiskAssessment {
            ticker: returns.symbol().clone(),
            currency: returns.currency().to_owned(),
            interval: returns.interval(),
            risk_level: classification.risk_level,
            volatility_tier: classification.volatility_tier,
            tail_tier: classification.tail_tier,
            rationale: classification.rationale,
            fused_volatility: fused.volatility,
            fusion_inputs: fused.inputs,
            metrics,
            forecasts,
            observations: returns.len(),
            historical_data,
        })
    }

    /// Fetch the history of `symbol` and assess it.
    ///
    /// # Errors
    ///
    /// [`EngineError::DataUnavailable`] when the source fails, otherwise the
    /// errors of [`RiskEngine::assess_series`].
    pub async fn assess(
        &self,
        source: &dyn MarketDataSource,
        symbol: &Symbol,
    ) -> Result<RiskAssessment, EngineError> {
        let request = HistoryRequest::new(symbol.clone(), self.config.lookback, self.config.interval);
        let prices = source
            .history(request)
            .await
            .map_err(|error| EngineError::DataUnavailable {
                symbol: symbol.clone(),
                source: error,
            })?;
        debug!(%symbol, provider = %source.id(), points = prices.len(), "fetched history");

        let engine = self.clone();
        let assessment = tokio::task::spawn_blocking(move || engine.assess_series(&prices))
            .await
            .map_err(|error| EngineError::Task {
                symbol: symbol.to_string(),
                message: error.to_string(),
            })??;

        info!(
            %symbol,
            risk_level = %assessment.risk_level,
            fused_volatility = assessment.fused_volatility,
            historical_volatility = assessment.metrics.historical_volatility,
            "assessment complete"
        );
        Ok(assessment)
    }
}
