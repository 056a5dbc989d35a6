use std::sync::Arc;

use serde::Serialize;

use riskiq_core::{MarketDataSource, Symbol};
use riskiq_engine::{
    EngineError, PortfolioSummary, RiskEngine, RuleBasedSummary, SummaryGenerator,
};

use crate::cli::PortfolioArgs;
use crate::error::CliError;

use super::{envelope_error, failure_error, CommandResult};

#[derive(Debug, Serialize)]
struct PortfolioResponseData {
    portfolio: Option<PortfolioSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
}

pub async fn run(
    args: &PortfolioArgs,
    engine: &RiskEngine,
    source: Arc<dyn MarketDataSource>,
) -> Result<CommandResult, CliError> {
    let symbols = args
        .symbols
        .iter()
        .map(|raw| Symbol::parse(raw))
        .collect::<Result<Vec<_>, _>>()?;

    match engine.assess_portfolio(source, &symbols).await {
        Ok(portfolio) => {
            let warnings = portfolio
                .failures()
                .map(|failure| format!("{} skipped: {}", failure.ticker, failure.message))
                .collect();
            let summary = args
                .summary
                .map(|style| RuleBasedSummary.summarize_portfolio(&portfolio, style.into()));
            let data = serde_json::to_value(PortfolioResponseData {
                portfolio: Some(portfolio),
                summary,
            })?;
            Ok(CommandResult::ok(data).with_warnings(warnings))
        }
        Err(error @ (EngineError::InvalidPortfolio { .. } | EngineError::Validation(_))) => {
            Err(error.into())
        }
        Err(EngineError::NoValidInstruments { failures }) => {
            let errors = failures
                .iter()
                .map(failure_error)
                .collect::<Result<Vec<_>, _>>()?;
            let data = serde_json::to_value(PortfolioResponseData {
                portfolio: None,
                summary: None,
            })?;
            Ok(CommandResult::ok(data).with_errors(errors))
        }
        Err(error) => {
            let data = serde_json::to_value(PortfolioResponseData {
                portfolio: None,
                summary: None,
            })?;
            let tickers = symbols
                .iter()
                .map(Symbol::as_str)
                .collect::<Vec<_>>()
                .join(",");
            Ok(CommandResult::ok(data).with_errors(vec![envelope_error(&tickers, &error)?]))
        }
    }
}
