use serde::Serialize;

use riskiq_core::{MarketDataSource, Symbol};
use riskiq_engine::{RiskAssessment, RiskEngine, RuleBasedSummary, SummaryGenerator};

use crate::cli::RiskArgs;
use crate::error::CliError;

use super::{envelope_error, CommandResult};

#[derive(Debug, Serialize)]
struct RiskResponseData {
    assessment: Option<RiskAssessment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
}

pub async fn run(
    args: &RiskArgs,
    engine: &RiskEngine,
    source: &dyn MarketDataSource,
) -> Result<CommandResult, CliError> {
    let symbol = Symbol::parse(&args.symbol)?;

    match engine.assess(source, &symbol).await {
        Ok(assessment) => {
            let summary = args.summary.map(|style| {
                RuleBasedSummary.summarize_assessment(&assessment, style.into())
            });
            let data = serde_json::to_value(RiskResponseData {
                assessment: Some(assessment),
                summary,
            })?;
            Ok(CommandResult::ok(data))
        }
        Err(error) => {
            let data = serde_json::to_value(RiskResponseData {
                assessment: None,
                summary: None,
            })?;
            Ok(CommandResult::ok(data).with_errors(vec![envelope_error(symbol.as_str(), &error)?]))
        }
    }
}
