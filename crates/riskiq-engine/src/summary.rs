//! Plain-text summaries of finished assessments.
//!
//! Summaries are produced after the numbers are final and never feed back
//! into them.

use std::fmt::{Display, Formatter, Write as _};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::assessment::RiskAssessment;
use crate::forecast::{ForecastModel, ForecastOutcome};
use crate::portfolio::PortfolioSummary;

/// Tickers listed by name in a portfolio summary before the rest are counted.
const LISTED_TICKERS: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryStyle {
    #[default]
    Concise,
    Detailed,
    Technical,
}

impl SummaryStyle {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Concise => "concise",
            Self::Detailed => "detailed",
            Self::Technical => "technical",
        }
    }
}

impl Display for SummaryStyle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SummaryStyle {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "concise" => Ok(Self::Concise),
            "detailed" => Ok(Self::Detailed),
            "technical" => Ok(Self::Technical),
            other => Err(format!(
                "unknown summary style '{other}', expected concise, detailed or technical"
            )),
        }
    }
}

/// Turns assessment results into prose.
pub trait SummaryGenerator: Send + Sync {
    fn summarize_assessment(&self, assessment: &RiskAssessment, style: SummaryStyle) -> String;

    fn summarize_portfolio(&self, portfolio: &PortfolioSummary, style: SummaryStyle) -> String;
}

/// Deterministic template summaries.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedSummary;

fn pct(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

fn volatility_description(volatility: f64) -> &'static str {
    if volatility > 0.5 {
        "very high volatility"
    } else if volatility > 0.35 {
        "elevated volatility"
    } else if volatility > 0.25 {
        "moderate volatility"
    } else {
        "relatively stable behaviour"
    }
}

fn instrument_suitability(volatility: f64) -> &'static str {
    if volatility > 0.4 {
        "This is a high-risk holding suited only to aggressive portfolios with high risk tolerance."
    } else if volatility > 0.25 {
        "Suitable for balanced portfolios with moderate risk tolerance."
    } else {
        "Suitable for conservative portfolios seeking stability."
    }
}

fn portfolio_suitability(volatility: f64) -> &'static str {
    if volatility > 0.35 {
        "This is an aggressive portfolio that needs close monitoring."
    } else if volatility > 0.25 {
        "Suitable for moderate risk tolerance with regular rebalancing."
    } else {
        "Well balanced for conservative to moderate investors."
    }
}

fn forecast_text(outcome: &ForecastOutcome) -> String {
    match outcome {
        ForecastOutcome::Available { volatility, .. } => pct(*volatility),
        ForecastOutcome::Unavailable { .. } => String::from("n/a"),
    }
}

fn forecast_number(outcome: &ForecastOutcome) -> String {
    outcome
        .volatility()
        .map_or_else(|| String::from("n/a"), |volatility| format!("{volatility:.4}"))
}

impl SummaryGenerator for RuleBasedSummary {
    fn summarize_assessment(&self, assessment: &RiskAssessment, style: SummaryStyle) -> String {
        let ticker = &assessment.ticker;
        let metrics = &assessment.metrics;
        let vol = metrics.historical_volatility;
        let var = metrics.var_95.abs();
        let cvar = metrics.cvar_95.abs();

        match style {
            SummaryStyle::Concise => format!(
                "{ticker} is rated {} risk: {} with annualized volatility of {} and a one-day 95% VaR of {}. {}",
                assessment.risk_level,
                volatility_description(vol),
                pct(vol),
                pct(var),
                instrument_suitability(vol),
            ),
            SummaryStyle::Detailed => {
                let mut text = format!("{ticker} Risk Analysis\n\n");
                let _ = writeln!(text, "Risk Level: {}", assessment.risk_level);
                let _ = writeln!(text, "Historical Volatility: {}", pct(vol));
                let _ = writeln!(text, "Value at Risk (95%): {}", pct(var));
                let _ = writeln!(text, "Conditional VaR (95%): {}", pct(cvar));
                let _ = writeln!(text, "Fused Forecast Volatility: {}", pct(assessment.fused_volatility));
                for model in ForecastModel::ALL {
                    let _ = writeln!(
                        text,
                        "  {model}: {}",
                        forecast_text(assessment.forecasts.get(model))
                    );
                }
                let _ = write!(
                    text,
                    "\n{ticker} exhibits {} with annualized volatility of {}. \
                     At 95% confidence the one-period loss should not exceed {}. {} {}",
                    volatility_description(vol),
                    pct(vol),
                    pct(var),
                    assessment.rationale,
                    instrument_suitability(vol),
                );
                text
            }
            SummaryStyle::Technical => format!(
                "{ticker}: sigma={vol:.4}, VaR95={:.4}, CVaR95={:.4}, sigma_fused={:.4} \
                 [garch={}, xgboost={}, lstm={}], n={}, tier={} (vol {}, tail {})",
                metrics.var_95,
                metrics.cvar_95,
                assessment.fused_volatility,
                forecast_number(&assessment.forecasts.garch),
                forecast_number(&assessment.forecasts.xgboost),
                forecast_number(&assessment.forecasts.lstm),
                assessment.observations,
                assessment.risk_level,
                assessment.volatility_tier,
                assessment.tail_tier,
            ),
        }
    }

    fn summarize_portfolio(&self, portfolio: &PortfolioSummary, style: SummaryStyle) -> String {
        let count = portfolio.tickers.len();
        let avg_vol = portfolio.average_volatility;
        let avg_var = portfolio.average_var_95.abs();
        let avg_cvar = portfolio.average_cvar_95.abs();

        let mut listed = portfolio
            .tickers
            .iter()
            .take(LISTED_TICKERS)
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        if count > LISTED_TICKERS {
            let _ = write!(listed, " (+{} more)", count - LISTED_TICKERS);
        }

        let outliers = portfolio
            .assessments()
            .filter(|assessment| assessment.metrics.historical_volatility > avg_vol * 1.3)
            .count();
        let failed = portfolio.failures().count();

        match style {
            SummaryStyle::Concise => format!(
                "Portfolio of {count} ({listed}) is rated {} risk with average volatility of {} \
                 and average 95% VaR of {}. {}",
                portfolio.risk_level,
                pct(avg_vol),
                pct(avg_var),
                portfolio_suitability(avg_vol),
            ),
            SummaryStyle::Detailed => {
                let mut text = format!("Portfolio Risk Analysis ({count} instruments)\n\n");
                let _ = writeln!(text, "Overall Risk: {}", portfolio.risk_level);
                let _ = writeln!(text, "Average Volatility: {}", pct(avg_vol));
                let _ = writeln!(text, "Average VaR (95%): {}", pct(avg_var));
                let _ = writeln!(text, "Average CVaR (95%): {}", pct(avg_cvar));
                let _ = writeln!(
                    text,
                    "Average Fused Forecast: {}",
                    pct(portfolio.average_fused_volatility)
                );
                let _ = writeln!(text, "\nPortfolio includes: {listed}\n");
                let _ = write!(
                    text,
                    "The portfolio shows average volatility of {} across {count} instruments. ",
                    pct(avg_vol)
                );
                if outliers > 0 {
                    let _ = write!(text, "{outliers} high-volatility instrument(s) detected. ");
                }
                if failed > 0 {
                    let _ = write!(text, "{failed} ticker(s) could not be assessed. ");
                }
                if count > 1 {
                    let _ = write!(
                        text,
                        "Diversification across {count} assets helps reduce overall risk. "
                    );
                }
                text.push_str(portfolio_suitability(avg_vol));
                text
            }
            SummaryStyle::Technical => format!(
                "N={count}, sigma_mean={avg_vol:.4}, VaR95_mean={:.4}, CVaR95_mean={:.4}, \
                 sigma_fused_mean={:.4}, outliers={outliers}, failed={failed}, tier={} (vol {}, tail {})",
                portfolio.average_var_95,
                portfolio.average_cvar_95,
                portfolio.average_fused_volatility,
                portfolio.risk_level,
                portfolio.volatility_tier,
                portfolio.tail_tier,
            ),
        }
    }
}
