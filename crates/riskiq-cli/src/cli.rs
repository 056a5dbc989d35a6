//! CLI argument definitions for riskiq.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `risk` | Assess one ticker |
//! | `portfolio` | Assess up to 10 tickers and aggregate |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--mock` | `false` | Use deterministic synthetic prices instead of Yahoo |
//! | `--config` | none | JSON engine config file |
//! | `--model-dir` | `models` | Directory with pretrained model artifacts |
//! | `--var-method` | `historical` | VaR estimator |
//! | `--lookback` | `1y` | History window |
//! | `--interval` | `1d` | Sampling interval |
//! | `--timeout-ms` | `30000` | Budget for the whole invocation |
//! | `--log-level` | `RUST_LOG` or `warn` | Log filter, written to stderr |
//!
//! # Examples
//!
//! ```bash
//! riskiq risk AAPL --pretty
//! riskiq portfolio AAPL MSFT ADANIGREEN.NS --summary detailed
//! riskiq --mock --var-method parametric risk TSLA
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use riskiq_engine::{SummaryStyle, VarMethod};

/// riskiq - equity and portfolio risk analysis
///
/// Computes realized volatility, VaR and CVaR, three volatility forecasts
/// (GARCH, gradient-boosted trees, LSTM) and a fused risk tier.
#[derive(Debug, Parser)]
#[command(
    name = "riskiq",
    author,
    version,
    about = "Equity and portfolio risk analysis",
    long_about = "riskiq fetches closing prices, computes realized risk metrics, forecasts \
volatility with three models, fuses them and classifies the result into a risk tier.\n\
\n\
Results are printed as a JSON envelope on stdout; logs go to stderr.\n\
\n\
Use 'riskiq <command> --help' for command-specific help."
)]
pub struct Cli {
    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Use deterministic synthetic prices instead of calling Yahoo Finance.
    #[arg(long, global = true, default_value_t = false)]
    pub mock: bool,

    /// JSON engine configuration file. Environment variables and flags
    /// override its values.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding xgb_vol_model.json and lstm_vol_model.json.
    #[arg(long, global = true)]
    pub model_dir: Option<PathBuf>,

    /// Value-at-Risk estimator.
    #[arg(long, global = true, value_enum)]
    pub var_method: Option<VarMethodArg>,

    /// History window (1mo, 3mo, 6mo, 1y, 2y, 5y).
    #[arg(long, global = true)]
    pub lookback: Option<String>,

    /// Sampling interval (1d, 1wk, 1mo).
    #[arg(long, global = true)]
    pub interval: Option<String>,

    /// Time budget for the whole invocation in milliseconds.
    #[arg(long, global = true, default_value_t = 30_000)]
    pub timeout_ms: u64,

    /// Log filter (for example `info` or `riskiq_engine=debug`). Defaults to
    /// `RUST_LOG`, then `warn`.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Assess the risk of one ticker.
    ///
    /// # Examples
    ///
    ///   riskiq risk AAPL
    ///   riskiq risk RELIANCE.NS --summary technical --pretty
    Risk(RiskArgs),

    /// Assess up to 10 tickers concurrently and aggregate them.
    ///
    /// Tickers that cannot be assessed are reported per instrument and
    /// excluded from the averages.
    ///
    /// # Examples
    ///
    ///   riskiq portfolio AAPL MSFT GOOGL
    ///   riskiq portfolio AAPL TSLA --summary detailed
    Portfolio(PortfolioArgs),
}

/// Arguments for the `risk` command.
#[derive(Debug, Args)]
pub struct RiskArgs {
    /// Market symbol (e.g., AAPL, BRK-B, ADANIGREEN.NS).
    pub symbol: String,

    /// Attach a text summary in the given style.
    #[arg(long, value_enum)]
    pub summary: Option<SummaryStyleArg>,
}

/// Arguments for the `portfolio` command.
#[derive(Debug, Args)]
pub struct PortfolioArgs {
    /// One to ten distinct market symbols.
    #[arg(required = true, num_args = 1..)]
    pub symbols: Vec<String>,

    /// Attach a text summary in the given style.
    #[arg(long, value_enum)]
    pub summary: Option<SummaryStyleArg>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VarMethodArg {
    /// Empirical 5th percentile of returns.
    Historical,
    /// Normal quantile from mean and standard deviation.
    Parametric,
}

impl From<VarMethodArg> for VarMethod {
    fn from(value: VarMethodArg) -> Self {
        match value {
            VarMethodArg::Historical => Self::Historical,
            VarMethodArg::Parametric => Self::Parametric,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SummaryStyleArg {
    Concise,
    Detailed,
    Technical,
}

impl From<SummaryStyleArg> for SummaryStyle {
    fn from(value: SummaryStyleArg) -> Self {
        match value {
            SummaryStyleArg::Concise => Self::Concise,
            SummaryStyleArg::Detailed => Self::Detailed,
            SummaryStyleArg::Technical => Self::Technical,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from([
            "riskiq",
            "portfolio",
            "AAPL",
            "MSFT",
            "--mock",
            "--var-method",
            "parametric",
            "--summary",
            "technical",
        ])
        .expect("parse");

        assert!(cli.mock);
        assert_eq!(cli.var_method, Some(VarMethodArg::Parametric));
        match cli.command {
            Command::Portfolio(args) => {
                assert_eq!(args.symbols, vec!["AAPL", "MSFT"]);
                assert_eq!(args.summary, Some(SummaryStyleArg::Technical));
            }
            Command::Risk(_) => panic!("expected portfolio"),
        }
    }

    #[test]
    fn portfolio_requires_a_ticker() {
        assert!(Cli::try_parse_from(["riskiq", "portfolio"]).is_err());
    }
}
