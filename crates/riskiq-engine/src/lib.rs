//! Risk analysis engine for riskiq.
//!
//! Pipeline per instrument:
//! prices → [`ReturnSeries`] → [`RealizedRiskMetrics`] and a [`ForecastBundle`]
//! → fused volatility → [`RiskLevel`].
//!
//! [`RiskEngine::assess_portfolio`] runs the pipeline for up to
//! [`MAX_PORTFOLIO_SIZE`] tickers concurrently and aggregates the results.

pub mod assessment;
pub mod config;
pub mod error;
pub mod forecast;
pub mod fusion;
pub mod metrics;
pub mod model_store;
pub mod portfolio;
pub mod returns;
mod stats;
pub mod summary;

pub use assessment::{HistoricalPoint, RiskAssessment, RiskEngine};
pub use config::{
    BoostedConfig, ConfigError, EngineConfig, GarchConfig, SequenceConfig, ENV_MODEL_DIR,
    ENV_VAR_METHOD,
};
pub use error::{EngineError, InstrumentFailure, ModelError};
pub use forecast::{
    BoostedForecaster, Forecast, ForecastBundle, ForecastModel, ForecastOrigin, ForecastOutcome,
    GarchForecaster, GradientBoostedModel, LstmModel, ModelUnavailable, ScalarModel,
    SequenceForecaster, VolatilityForecaster,
};
pub use fusion::{classify, fuse, Classification, FusedForecast, RiskLevel};
pub use metrics::{RealizedRiskMetrics, VarMethod};
pub use model_store::{ModelStore, BOOSTED_ARTIFACT, SEQUENCE_ARTIFACT};
pub use portfolio::{
    aggregate, validate_portfolio, InstrumentOutcome, PortfolioSummary, MAX_PORTFOLIO_SIZE,
};
pub use returns::{ReturnPoint, ReturnSeries, MIN_RETURNS};
pub use summary::{RuleBasedSummary, SummaryGenerator, SummaryStyle};
