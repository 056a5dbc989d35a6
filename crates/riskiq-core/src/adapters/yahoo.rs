use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::circuit_breaker::CircuitBreaker;
use crate::data_source::{HistoryRequest, MarketDataSource, SourceError};
use crate::http_client::{HttpClient, HttpRequest, HttpResponse, ReqwestHttpClient};
use crate::retry::RetryConfig;
use crate::{PricePoint, PriceSeries, ProviderId, Symbol, UtcDateTime};

const CHART_ENDPOINT: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const REFERER: &str = "https://finance.yahoo.com/";
const FALLBACK_CURRENCY: &str = "USD";

#[derive(Clone)]
enum Mode {
    Live(Arc<dyn HttpClient>),
    /// Deterministic offline random walk seeded by the ticker.
    Synthetic,
}

/// Yahoo Finance chart adapter.
///
/// Live mode talks to the public v8 chart endpoint; synthetic mode produces a
/// reproducible price path per ticker for offline runs and demos.
#[derive(Clone)]
pub struct YahooAdapter {
    mode: Mode,
    circuit_breaker: Arc<CircuitBreaker>,
    retry: RetryConfig,
    timeout_ms: u64,
}

impl Default for YahooAdapter {
    fn default() -> Self {
        Self::with_http_client(Arc::new(ReqwestHttpClient::new()))
    }
}

impl YahooAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_http_client(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            mode: Mode::Live(http_client),
            circuit_breaker: Arc::new(CircuitBreaker::default()),
            retry: RetryConfig::default(),
            timeout_ms: 10_000,
        }
    }

    pub fn synthetic() -> Self {
        Self {
            mode: Mode::Synthetic,
            ..Self::with_http_client(Arc::new(ReqwestHttpClient::new()))
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_circuit_breaker(mut self, circuit_breaker: Arc<CircuitBreaker>) -> Self {
        self.circuit_breaker = circuit_breaker;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self.mode, Mode::Synthetic)
    }

    fn chart_url(req: &HistoryRequest) -> String {
        format!(
            "{CHART_ENDPOINT}/{}?range={}&interval={}",
            urlencoding::encode(req.symbol.as_str()),
            req.lookback.as_str(),
            req.interval.as_str(),
        )
    }

    async fn fetch_chart(
        &self,
        http_client: &Arc<dyn HttpClient>,
        req: &HistoryRequest,
    ) -> Result<HttpResponse, SourceError> {
        let request = HttpRequest::get(Self::chart_url(req))
            .with_header("referer", REFERER)
            .with_timeout_ms(self.timeout_ms);

        let mut attempt = 0;
        loop {
            if !self.circuit_breaker.allow_request() {
                return Err(SourceError::unavailable(
                    "yahoo circuit breaker is open; skipping upstream call",
                ));
            }

            let outcome = match http_client.execute(request.clone()).await {
                Ok(response) if response.is_success() || response.status == 404 => {
                    self.circuit_breaker.record_success();
                    return Ok(response);
                }
                Ok(response) => {
                    self.circuit_breaker.record_failure();
                    let error = if response.status == 429 {
                        SourceError::rate_limited("yahoo returned status 429")
                    } else {
                        SourceError::unavailable(format!(
                            "yahoo returned status {}",
                            response.status
                        ))
                    };
                    (error, self.retry.should_retry_status(response.status))
                }
                Err(error) => {
                    self.circuit_breaker.record_failure();
                    let retryable = error.retryable();
                    let error = if retryable {
                        SourceError::unavailable(format!("yahoo transport error: {error}"))
                    } else {
                        SourceError::internal(format!("yahoo transport error: {error}"))
                    };
                    (error, retryable)
                }
            };

            let (error, retryable) = outcome;
            if !retryable || attempt >= self.retry.max_retries {
                return Err(error);
            }

            let delay = self.retry.delay_for_attempt(attempt);
            warn!(
                symbol = %req.symbol,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "retrying yahoo chart request"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn fetch_live(
        &self,
        http_client: &Arc<dyn HttpClient>,
        req: &HistoryRequest,
    ) -> Result<PriceSeries, SourceError> {
        let response = self.fetch_chart(http_client, req).await?;
        parse_chart(&req.symbol, req, &response.body)
    }

    fn fetch_synthetic(&self, req: &HistoryRequest) -> Result<PriceSeries, SourceError> {
        let count = req.lookback.expected_points(req.interval) + 1;
        let seed = symbol_seed(&req.symbol);
        let mut rng = fastrand::Rng::with_seed(seed);

        // Per-ticker daily sigma between 0.8% and 3.2%.
        let sigma = 0.008 + (seed % 25) as f64 * 0.001;
        let drift = ((seed % 7) as f64 - 3.0) * 0.0002;
        let mut price = 20.0 + (seed % 480) as f64;

        let mut closes = Vec::with_capacity(count);
        for _ in 0..count {
            closes.push((price * 100.0).round() / 100.0);
            // Sum of three uniforms, centered, approximates a normal shock.
            let shock = (rng.f64() + rng.f64() + rng.f64() - 1.5) * 2.0;
            price = (price * (1.0 + drift + sigma * shock)).max(0.01);
        }

        let series = PriceSeries::from_closes(
            req.symbol.clone(),
            FALLBACK_CURRENCY,
            req.interval,
            UtcDateTime::now(),
            &closes,
        )?;
        debug!(symbol = %req.symbol, points = series.len(), "generated synthetic yahoo history");
        Ok(series)
    }
}

impl MarketDataSource for YahooAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Yahoo
    }

    fn history<'a>(
        &'a self,
        req: HistoryRequest,
    ) -> Pin<Box<dyn Future<Output = Result<PriceSeries, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            match &self.mode {
                Mode::Live(http_client) => self.fetch_live(http_client, &req).await,
                Mode::Synthetic => self.fetch_synthetic(&req),
            }
        })
    }
}

fn parse_chart(
    symbol: &Symbol,
    req: &HistoryRequest,
    body: &str,
) -> Result<PriceSeries, SourceError> {
    let payload: YahooChartResponse = serde_json::from_str(body)
        .map_err(|e| SourceError::internal(format!("failed to parse yahoo chart: {e}")))?;

    if let Some(error) = payload.chart.error {
        debug!(
            symbol = %symbol,
            code = error.code.as_deref().unwrap_or("unknown"),
            description = error.description.as_deref().unwrap_or(""),
            "yahoo chart error payload"
        );
        return Err(SourceError::not_found(symbol));
    }

    let Some(result) = payload.chart.result.and_then(|results| results.into_iter().next()) else {
        return Err(SourceError::not_found(symbol));
    };

    let timestamps = result.timestamp.unwrap_or_default();
    let closes = result
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|quote| quote.close)
        .unwrap_or_default();

    let mut points: Vec<PricePoint> = Vec::with_capacity(timestamps.len());
    for (ts, close) in timestamps.into_iter().zip(closes) {
        let Some(close) = close else {
            continue;
        };
        let ts = UtcDateTime::from_unix_seconds(ts)?;
        // Yahoo occasionally repeats the live bar; keep the first occurrence.
        if points.last().is_some_and(|last| last.ts >= ts) {
            continue;
        }
        if let Ok(point) = PricePoint::new(ts, close) {
            points.push(point);
        }
    }

    if points.is_empty() {
        return Err(SourceError::not_found(symbol));
    }

    let currency = result
        .meta
        .and_then(|meta| meta.currency)
        .filter(|currency| crate::validate_currency_code(currency).is_ok())
        .unwrap_or_else(|| FALLBACK_CURRENCY.to_owned());

    Ok(PriceSeries::new(
        symbol.clone(),
        currency,
        req.interval,
        points,
    )?)
}

fn symbol_seed(symbol: &Symbol) -> u64 {
    symbol.as_str().bytes().fold(5381_u64, |acc, byte| {
        acc.wrapping_mul(33).wrapping_add(byte as u64)
    })
}

#[derive(Debug, Deserialize)]
struct YahooChartResponse {
    chart: YahooChart,
}

#[derive(Debug, Deserialize)]
struct YahooChart {
    #[serde(default)]
    result: Option<Vec<YahooChartResult>>,
    #[serde(default)]
    error: Option<YahooChartError>,
}

#[derive(Debug, Deserialize)]
struct YahooChartError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct YahooChartResult {
    #[serde(default)]
    meta: Option<YahooChartMeta>,
    #[serde(default)]
    timestamp: Option<Vec<i64>>,
    indicators: YahooIndicators,
}

#[derive(Debug, Deserialize)]
struct YahooChartMeta {
    #[serde(default)]
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct YahooIndicators {
    #[serde(default)]
    quote: Vec<YahooQuote>,
}

#[derive(Debug, Deserialize)]
struct YahooQuote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::data_source::SourceErrorKind;
    use crate::http_client::HttpError;
    use crate::{Interval, Lookback};

    struct ScriptedHttpClient {
        responses: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedHttpClient {
        fn new(responses: Vec<Result<HttpResponse, HttpError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn request_count(&self) -> usize {
            self.requests.lock().expect("requests lock").len()
        }
    }

    impl HttpClient for ScriptedHttpClient {
        fn execute<'a>(
            &'a self,
            request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
            self.requests.lock().expect("requests lock").push(request);
            let next = self
                .responses
                .lock()
                .expect("responses lock")
                .pop_front()
                .unwrap_or_else(|| Err(HttpError::new("script exhausted")));
            Box::pin(async move { next })
        }
    }

    fn request(symbol: &str) -> HistoryRequest {
        HistoryRequest::new(
            Symbol::parse(symbol).expect("symbol"),
            Lookback::OneYear,
            Interval::OneDay,
        )
    }

    fn adapter(client: Arc<ScriptedHttpClient>) -> YahooAdapter {
        YahooAdapter::with_http_client(client)
            .with_retry(RetryConfig::fixed(Duration::from_millis(1), 2))
    }

    const CHART_OK: &str = r#"{"chart":{"result":[{"meta":{"currency":"INR"},
        "timestamp":[1704182400,1704268800,1704355200,1704441600],
        "indicators":{"quote":[{"close":[100.0,null,102.5,101.0]}]}}],"error":null}}"#;

    const CHART_NOT_FOUND: &str = r#"{"chart":{"result":null,"error":{"code":"Not Found",
        "description":"No data found, symbol may be delisted"}}}"#;

    #[test]
    fn chart_url_encodes_symbol_and_window() {
        let url = YahooAdapter::chart_url(&request("^GSPC"));
        assert_eq!(
            url,
            "https://query1.finance.yahoo.com/v8/finance/chart/%5EGSPC?range=1y&interval=1d"
        );
    }

    #[tokio::test]
    async fn parses_closes_and_skips_null_entries() {
        let client = ScriptedHttpClient::new(vec![Ok(HttpResponse::ok_json(CHART_OK))]);
        let series = adapter(client)
            .history(request("ADANIGREEN.NS"))
            .await
            .expect("series");

        assert_eq!(series.currency(), "INR");
        assert_eq!(series.closes().collect::<Vec<_>>(), vec![100.0, 102.5, 101.0]);
    }

    #[tokio::test]
    async fn delisted_ticker_maps_to_not_found_without_retry() {
        let client = ScriptedHttpClient::new(vec![Ok(HttpResponse::new(404, CHART_NOT_FOUND))]);
        let err = adapter(client.clone())
            .history(request("ZZZZ"))
            .await
            .expect_err("must fail");

        assert_eq!(err.kind(), SourceErrorKind::NotFound);
        assert_eq!(client.request_count(), 1);
    }

    #[tokio::test]
    async fn retries_transient_status_then_succeeds() {
        let client = ScriptedHttpClient::new(vec![
            Ok(HttpResponse::new(503, "")),
            Err(HttpError::new("connection reset")),
            Ok(HttpResponse::ok_json(CHART_OK)),
        ]);
        let series = adapter(client.clone())
            .history(request("AAPL"))
            .await
            .expect("series after retries");

        assert_eq!(series.len(), 3);
        assert_eq!(client.request_count(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_retry_budget() {
        let client = ScriptedHttpClient::new(vec![
            Ok(HttpResponse::new(429, "")),
            Ok(HttpResponse::new(429, "")),
            Ok(HttpResponse::new(429, "")),
            Ok(HttpResponse::ok_json(CHART_OK)),
        ]);
        let err = adapter(client.clone())
            .history(request("AAPL"))
            .await
            .expect_err("must exhaust retries");

        assert_eq!(err.kind(), SourceErrorKind::RateLimited);
        assert_eq!(client.request_count(), 3);
    }

    #[tokio::test]
    async fn client_error_status_is_not_retried() {
        let client = ScriptedHttpClient::new(vec![Ok(HttpResponse::new(400, ""))]);
        let err = adapter(client.clone())
            .history(request("AAPL"))
            .await
            .expect_err("must fail");

        assert_eq!(err.kind(), SourceErrorKind::Unavailable);
        assert_eq!(client.request_count(), 1);
    }

    #[tokio::test]
    async fn synthetic_history_is_deterministic_per_ticker() {
        let adapter = YahooAdapter::synthetic();
        let first = adapter.history(request("MSFT")).await.expect("series");
        let second = adapter.history(request("MSFT")).await.expect("series");
        let other = adapter.history(request("TSLA")).await.expect("series");

        assert_eq!(first.len(), 253);
        assert_eq!(
            first.closes().collect::<Vec<_>>(),
            second.closes().collect::<Vec<_>>()
        );
        assert_ne!(
            first.closes().collect::<Vec<_>>(),
            other.closes().collect::<Vec<_>>()
        );
    }
}
