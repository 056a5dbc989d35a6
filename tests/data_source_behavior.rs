//! Behavior tests for the market-data sources feeding the engine.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use riskiq_core::{
    HttpClient, HttpError, HttpRequest, HttpResponse, InMemorySource, MarketDataSource,
    RetryConfig, SourceErrorKind, YahooAdapter,
};
use riskiq_engine::{EngineError, RiskLevel};
use riskiq_tests::{engine_without_artifacts, symbol};
use serde_json::json;

/// Serves one canned chart body and records every URL requested.
struct CannedChart {
    body: String,
    urls: Mutex<Vec<String>>,
}

impl CannedChart {
    fn new(body: String) -> Arc<Self> {
        Arc::new(Self {
            body,
            urls: Mutex::new(Vec::new()),
        })
    }
}

impl HttpClient for CannedChart {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        self.urls.lock().expect("urls lock").push(request.url);
        let response = HttpResponse::ok_json(self.body.clone());
        Box::pin(async move { Ok(response) })
    }
}

fn chart_body(closes: &[f64], currency: &str) -> String {
    let timestamps: Vec<i64> = (0..closes.len() as i64)
        .map(|day| 1_704_182_400 + day * 86_400)
        .collect();
    json!({
        "chart": {
            "result": [{
                "meta": { "currency": currency },
                "timestamp": timestamps,
                "indicators": { "quote": [{ "close": closes }] }
            }],
            "error": null
        }
    })
    .to_string()
}

#[tokio::test]
async fn yahoo_chart_history_flows_through_the_engine() {
    // Given: A Yahoo adapter whose transport serves 61 alternating closes in INR
    let mut closes = vec![100.0];
    for i in 0..60 {
        let last: f64 = closes[closes.len() - 1];
        closes.push(if i % 2 == 0 { last * 1.05 } else { last * 0.95 });
    }
    let transport = CannedChart::new(chart_body(&closes, "INR"));
    let adapter = YahooAdapter::with_http_client(transport.clone())
        .with_retry(RetryConfig::fixed(Duration::from_millis(1), 1));
    let (_models, engine) = engine_without_artifacts();

    // When: The ticker is assessed
    let assessment = engine
        .assess(&adapter, &symbol("RELIANCE.NS"))
        .await
        .expect("assessment");

    // Then: The currency is carried through and the swing is classified
    assert_eq!(assessment.currency, "INR");
    assert_eq!(assessment.observations, 60);
    assert!(assessment.risk_level >= RiskLevel::Moderate);

    // And: The chart endpoint was asked for the configured window
    let urls = transport.urls.lock().expect("urls lock");
    assert_eq!(urls.len(), 1);
    assert!(urls[0].ends_with("/RELIANCE.NS?range=1y&interval=1d"), "{}", urls[0]);
}

#[tokio::test]
async fn synthetic_mode_is_reproducible_per_ticker() {
    // Given: The offline Yahoo adapter
    let adapter = YahooAdapter::synthetic();
    let (_models, engine) = engine_without_artifacts();

    // When: The same ticker is assessed twice and another ticker once
    let first = engine.assess(&adapter, &symbol("NVDA")).await.expect("first");
    let second = engine.assess(&adapter, &symbol("NVDA")).await.expect("second");
    let other = engine.assess(&adapter, &symbol("KO")).await.expect("other");

    // Then: Metrics and forecasts repeat exactly, and tickers differ
    assert_eq!(first.metrics, second.metrics);
    assert_eq!(first.forecasts, second.forecasts);
    assert_eq!(first.fused_volatility, second.fused_volatility);
    assert_ne!(first.metrics, other.metrics);
    assert_eq!(first.observations, 252);
}

#[tokio::test]
async fn unknown_ticker_in_memory_maps_to_data_unavailable() {
    // Given: An empty in-memory source
    let source = InMemorySource::new();
    let (_models, engine) = engine_without_artifacts();

    // When: A ticker is assessed
    let err = engine
        .assess(&source, &symbol("GHOST"))
        .await
        .expect_err("must fail");

    // Then: The source error is wrapped and not retryable
    let EngineError::DataUnavailable { source, .. } = &err else {
        panic!("unexpected error: {err:?}");
    };
    assert_eq!(source.kind(), SourceErrorKind::NotFound);
    assert_eq!(err.code(), "risk.data_unavailable");
    assert!(!err.retryable());
}

#[tokio::test]
async fn upstream_outage_is_retryable() {
    // Given: A transport that always fails
    struct Down;

    impl HttpClient for Down {
        fn execute<'a>(
            &'a self,
            _request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
            Box::pin(async { Err(HttpError::new("connection refused")) })
        }
    }

    let adapter = YahooAdapter::with_http_client(Arc::new(Down))
        .with_retry(RetryConfig::fixed(Duration::from_millis(1), 1));
    let (_models, engine) = engine_without_artifacts();

    // When: A ticker is assessed
    let err = engine
        .assess(&adapter, &symbol("AAPL"))
        .await
        .expect_err("must fail");

    // Then: The failure is marked retryable for callers
    assert_eq!(err.code(), "risk.data_unavailable");
    assert!(err.retryable());
    assert_eq!(adapter.id().as_str(), "yahoo");
}
