use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{info, warn};

use riskiq_core::{MarketDataSource, Symbol};

use crate::assessment::{RiskAssessment, RiskEngine};
use crate::error::{EngineError, InstrumentFailure};
use crate::fusion::{classify, RiskLevel};

/// Largest number of tickers accepted in one portfolio request.
pub const MAX_PORTFOLIO_SIZE: usize = 10;

/// Result for one ticker of a portfolio, in request order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InstrumentOutcome {
    Assessed(Box<RiskAssessment>),
    Failed(InstrumentFailure),
}

impl InstrumentOutcome {
    pub fn assessment(&self) -> Option<&RiskAssessment> {
        match self {
            Self::Assessed(assessment) => Some(assessment),
            Self::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&InstrumentFailure> {
        match self {
            Self::Assessed(_) => None,
            Self::Failed(failure) => Some(failure),
        }
    }
}

/// Aggregated risk of a portfolio. Averages cover successful instruments only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    /// Tickers that were assessed successfully.
    pub tickers: Vec<Symbol>,
    pub risk_level: RiskLevel,
    pub volatility_tier: RiskLevel,
    pub tail_tier: RiskLevel,
    pub rationale: String,
    pub average_volatility: f64,
    #[serde(rename = "average_VaR_95")]
    pub average_var_95: f64,
    #[serde(rename = "average_CVaR_95")]
    pub average_cvar_95: f64,
    pub average_fused_volatility: f64,
    pub instruments: Vec<InstrumentOutcome>,
}

impl PortfolioSummary {
    pub fn assessments(&self) -> impl Iterator<Item = &RiskAssessment> + '_ {
        self.instruments.iter().filter_map(InstrumentOutcome::assessment)
    }

    pub fn failures(&self) -> impl Iterator<Item = &InstrumentFailure> + '_ {
        self.instruments.iter().filter_map(InstrumentOutcome::failure)
    }
}

/// Reject empty, oversized and duplicated ticker lists.
pub fn validate_portfolio(tickers: &[Symbol]) -> Result<(), EngineError> {
    if tickers.is_empty() {
        return Err(EngineError::InvalidPortfolio {
            reason: String::from("at least one ticker is required"),
        });
    }
    if tickers.len() > MAX_PORTFOLIO_SIZE {
        return Err(EngineError::InvalidPortfolio {
            reason: format!(
                "at most {MAX_PORTFOLIO_SIZE} tickers are allowed, got {}",
                tickers.len()
            ),
        });
    }

    let mut seen = HashSet::with_capacity(tickers.len());
    if let Some(duplicate) = tickers.iter().find(|symbol| !seen.insert(*symbol)) {
        return Err(EngineError::InvalidPortfolio {
            reason: format!("duplicate ticker {duplicate}"),
        });
    }
    Ok(())
}

/// Average the successful assessments and classify the portfolio.
///
/// The overall tier is the classifier applied to the averaged fused
/// volatility and averaged CVaR, not a combination of per-instrument tiers.
/// Instruments of one request share the engine's interval, so the first
/// assessment's interval scales the tail ladder.
pub fn aggregate(instruments: Vec<InstrumentOutcome>) -> Result<PortfolioSummary, EngineError> {
    let assessed: Vec<&RiskAssessment> = instruments
        .iter()
        .filter_map(InstrumentOutcome::assessment)
        .collect();

    if assessed.is_empty() {
        let failures = instruments
            .iter()
            .filter_map(InstrumentOutcome::failure)
            .cloned()
            .collect();
        return Err(EngineError::NoValidInstruments { failures });
    }

    let count = assessed.len() as f64;
    let average = |field: fn(&RiskAssessment) -> f64| {
        assessed.iter().map(|assessment| field(assessment)).sum::<f64>() / count
    };

    let average_volatility = average(|a| a.metrics.historical_volatility);
    let average_var_95 = average(|a| a.metrics.var_95);
    let average_cvar_95 = average(|a| a.metrics.cvar_95);
    let average_fused_volatility = average(|a| a.fused_volatility);
    let interval = assessed[0].interval;
    let tickers: Vec<Symbol> = assessed.iter().map(|a| a.ticker.clone()).collect();

    let classification = classify(average_fused_volatility, average_cvar_95, interval);
    let rationale = format!(
        "Portfolio of {} assessed instrument(s). {}",
        tickers.len(),
        classification.rationale
    );

    Ok(PortfolioSummary {
        tickers,
        risk_level: classification.risk_level,
        volatility_tier: classification.volatility_tier,
        tail_tier: classification.tail_tier,
        rationale,
        average_volatility,
        average_var_95,
        average_cvar_95,
        average_fused_volatility,
        instruments,
    })
}

impl RiskEngine {
    /// Assess every ticker concurrently and aggregate the results.
    ///
    /// A ticker whose data fetch fails, whose history is too short, or whose
    /// task panics becomes a failed entry; the others still contribute.
    pub async fn assess_portfolio(
        &self,
        source: Arc<dyn MarketDataSource>,
        tickers: &[Symbol],
    ) -> Result<PortfolioSummary, EngineError> {
        validate_portfolio(tickers)?;

        let mut tasks = JoinSet::new();
        for (index, symbol) in tickers.iter().cloned().enumerate() {
            let engine = self.clone();
            let source = Arc::clone(&source);
            tasks.spawn(async move {
                let ticker = symbol.to_string();
                // Inner task so a panic is attributed to its ticker.
                let pipeline =
                    tokio::spawn(async move { engine.assess(&*source, &symbol).await });
                let result = pipeline.await.unwrap_or_else(|error| {
                    Err(EngineError::Task {
                        symbol: ticker.clone(),
                        message: error.to_string(),
                    })
                });
                (index, ticker, result)
            });
        }

        let mut slots: Vec<Option<InstrumentOutcome>> = vec![None; tickers.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, ticker, Ok(assessment))) => {
                    slots[index] = Some(InstrumentOutcome::Assessed(Box::new(assessment)));
                    info!(%ticker, "portfolio instrument assessed");
                }
                Ok((index, ticker, Err(error))) => {
                    warn!(%ticker, code = error.code(), %error, "portfolio instrument failed");
                    slots[index] = Some(InstrumentOutcome::Failed(InstrumentFailure::from_error(
                        ticker, &error,
                    )));
                }
                Err(error) => warn!(%error, "portfolio task aborted"),
            }
        }

        let instruments = slots
            .into_iter()
            .zip(tickers)
            .map(|(slot, symbol)| {
                slot.unwrap_or_else(|| {
                    let error = EngineError::Task {
                        symbol: symbol.to_string(),
                        message: String::from("task did not complete"),
                    };
                    InstrumentOutcome::Failed(InstrumentFailure::from_error(
                        symbol.as_str(),
                        &error,
                    ))
                })
            })
            .collect();

        aggregate(instruments)
    }
}
