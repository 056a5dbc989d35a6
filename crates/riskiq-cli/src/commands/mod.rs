mod portfolio;
mod risk;

use std::sync::Arc;
use std::time::Instant;

use riskiq_core::{
    Envelope, EnvelopeError, Interval, Lookback, MarketDataSource, ProviderId, RetryConfig,
    YahooAdapter,
};
use riskiq_engine::{EngineConfig, EngineError, InstrumentFailure, RiskEngine};
use serde_json::Value;
use tracing::debug;

use crate::cli::{Cli, Command};
use crate::error::CliError;
use crate::metadata::Metadata;

pub const SCHEMA_VERSION: &str = "v1.0.0";

pub struct CommandResult {
    pub data: Value,
    pub warnings: Vec<String>,
    pub errors: Vec<EnvelopeError>,
}

impl CommandResult {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    pub fn with_errors(mut self, errors: Vec<EnvelopeError>) -> Self {
        self.errors.extend(errors);
        self
    }
}

/// Envelope error entry for an engine failure.
fn envelope_error(symbol: &str, error: &EngineError) -> Result<EnvelopeError, CliError> {
    Ok(EnvelopeError::new(error.code(), error.to_string())?
        .with_symbol(symbol)
        .with_retryable(error.retryable()))
}

fn failure_error(failure: &InstrumentFailure) -> Result<EnvelopeError, CliError> {
    Ok(EnvelopeError::new(failure.code.as_str(), failure.message.as_str())?
        .with_symbol(failure.ticker.as_str()))
}

/// Defaults, then `--config`, then `RISKIQ_*` variables, then flags.
pub fn engine_config(cli: &Cli) -> Result<EngineConfig, CliError> {
    let base = match &cli.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    apply_flags(base.with_env()?, cli)
}

fn apply_flags(mut config: EngineConfig, cli: &Cli) -> Result<EngineConfig, CliError> {
    if let Some(dir) = &cli.model_dir {
        config.model_dir = dir.clone();
    }
    if let Some(method) = cli.var_method {
        config.var_method = method.into();
    }
    if let Some(lookback) = &cli.lookback {
        config.lookback = lookback.parse::<Lookback>()?;
    }
    if let Some(interval) = &cli.interval {
        config.interval = interval.parse::<Interval>()?;
    }
    Ok(config)
}

fn market_source(cli: &Cli) -> (Arc<dyn MarketDataSource>, Vec<String>) {
    if cli.mock {
        let source: Arc<dyn MarketDataSource> = Arc::new(YahooAdapter::synthetic());
        let warning = String::from("--mock: prices are synthetic and deterministic, not market data");
        return (source, vec![warning]);
    }

    let retry = RetryConfig::default();
    let timeout_ms = attempt_timeout_ms(cli.timeout_ms, retry.max_retries);
    let source: Arc<dyn MarketDataSource> = Arc::new(
        YahooAdapter::new()
            .with_retry(retry)
            .with_timeout_ms(timeout_ms),
    );
    (source, Vec::new())
}

/// Longest single chart request the adapter is allowed.
const MAX_ATTEMPT_TIMEOUT_MS: u64 = 10_000;

/// Per-request timeout that lets every retry start inside the invocation budget.
fn attempt_timeout_ms(budget_ms: u64, max_retries: u32) -> u64 {
    let attempts = u64::from(max_retries) + 1;
    (budget_ms / attempts).clamp(1, MAX_ATTEMPT_TIMEOUT_MS)
}

pub async fn run(cli: &Cli) -> Result<Envelope<Value>, CliError> {
    let started = Instant::now();
    let config = engine_config(cli)?;
    debug!(?config, "engine configuration");

    let engine = RiskEngine::new(config);
    let (source, source_warnings) = market_source(cli);
    let source_chain: Vec<ProviderId> = vec![source.id()];

    let command_result = match &cli.command {
        Command::Risk(args) => risk::run(args, &engine, &*source).await?,
        Command::Portfolio(args) => portfolio::run(args, &engine, Arc::clone(&source)).await?,
    };

    let CommandResult {
        data,
        warnings,
        errors,
    } = command_result;

    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    let mut metadata = Metadata::new(source_chain, latency_ms)?;
    for warning in source_warnings.into_iter().chain(warnings) {
        metadata.push_warning(warning);
    }

    let meta = metadata.into_envelope_meta(SCHEMA_VERSION)?;
    Envelope::with_errors(meta, data, errors).map_err(CliError::from)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use clap::Parser;
    use riskiq_engine::VarMethod;

    use super::*;

    #[test]
    fn request_timeout_leaves_room_for_retries() {
        // Given: The default budget and retry policy
        let retries = RetryConfig::default().max_retries;

        // When / Then: Each of the four attempts gets a quarter of the budget
        assert_eq!(attempt_timeout_ms(30_000, retries), 7_500);
        assert!(attempt_timeout_ms(30_000, retries) * u64::from(retries + 1) <= 30_000);

        // And: Long budgets keep the adapter's ceiling, tiny ones never reach zero
        assert_eq!(attempt_timeout_ms(600_000, retries), MAX_ATTEMPT_TIMEOUT_MS);
        assert_eq!(attempt_timeout_ms(2, retries), 1);
        assert_eq!(attempt_timeout_ms(5_000, 0), 5_000);
    }

    #[test]
    fn flags_override_file_values() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        std::io::Write::write_all(
            &mut file,
            br#"{"var_method": "parametric", "model_dir": "/srv/models", "interval": "1wk"}"#,
        )
        .expect("write config");
        let path = file.path().to_string_lossy().into_owned();

        let cli = Cli::try_parse_from([
            "riskiq",
            "--config",
            path.as_str(),
            "--var-method",
            "historical",
            "--lookback",
            "2y",
            "risk",
            "AAPL",
        ])
        .expect("parse");

        let file_config = EngineConfig::from_file(file.path()).expect("config");
        let config = apply_flags(file_config, &cli).expect("config");
        assert_eq!(config.var_method, VarMethod::Historical);
        assert_eq!(config.lookback, Lookback::TwoYears);
        assert_eq!(config.interval, Interval::OneWeek);
        assert_eq!(config.model_dir, PathBuf::from("/srv/models"));
    }

    #[test]
    fn invalid_interval_flag_is_a_validation_error() {
        let cli = Cli::try_parse_from(["riskiq", "--interval", "5m", "risk", "AAPL"])
            .expect("parse");
        let err = apply_flags(EngineConfig::default(), &cli).expect_err("must fail");
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    async fn mock_risk_command_builds_an_envelope() {
        let dir = tempfile::tempdir().expect("tempdir");
        let model_dir = dir.path().to_string_lossy().into_owned();
        let cli = Cli::try_parse_from([
            "riskiq",
            "--mock",
            "--model-dir",
            model_dir.as_str(),
            "risk",
            "MSFT",
            "--summary",
            "concise",
        ])
        .expect("parse");

        let envelope = run(&cli).await.expect("envelope");
        assert!(envelope.errors.is_empty());
        assert_eq!(envelope.meta.source_chain, vec![ProviderId::Yahoo]);
        assert_eq!(envelope.meta.warnings.len(), 1);
        assert_eq!(envelope.data["assessment"]["ticker"], "MSFT");
        assert!(envelope.data["summary"].as_str().is_some());
    }
}
