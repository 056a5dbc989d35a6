use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use crate::data_source::{HistoryRequest, MarketDataSource, SourceError};
use crate::{PriceSeries, ProviderId, Symbol};

/// Market-data source backed by fixed, preloaded series.
///
/// Unknown tickers fail with `NotFound`, mirroring a delisted symbol upstream.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    series: HashMap<Symbol, PriceSeries>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, series: PriceSeries) -> Self {
        self.insert(series);
        self
    }

    pub fn insert(&mut self, series: PriceSeries) {
        self.series.insert(series.symbol().clone(), series);
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

impl MarketDataSource for InMemorySource {
    fn id(&self) -> ProviderId {
        ProviderId::Memory
    }

    fn history<'a>(
        &'a self,
        req: HistoryRequest,
    ) -> Pin<Box<dyn Future<Output = Result<PriceSeries, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            self.series
                .get(&req.symbol)
                .cloned()
                .ok_or_else(|| SourceError::not_found(&req.symbol))
        })
    }
}
