//! Shared doubles for behaviour tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tickterm_core::{
    CapabilitySet, ChartPeriod, CompanyProfile, DataSource, EconomicObservation, Endpoint,
    FetchError, FinancialRatios, FinancialStatement, MarketDataGateway, MockSource, NewsArticle,
    Orchestrator, PriceBar, ProviderId, Quote, RetryConfig, SearchHit, SourceFuture,
    SourceRouter, StatementRequest, Symbol, WatchlistStore, YieldCurve,
};

/// Mock-backed source with call counters, latency and failure injection.
///
/// Failures are keyed by symbol or series id and apply on every call.
/// `failing_first(n)` makes the first `n` calls of any kind fail with
/// `Unavailable`.
pub struct ScriptedSource {
    inner: MockSource,
    delay: Duration,
    failing: HashMap<String, FetchError>,
    transient: AtomicU32,
    calls: Mutex<HashMap<Endpoint, u32>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self {
            inner: MockSource::new(),
            delay: Duration::ZERO,
            failing: HashMap::new(),
            transient: AtomicU32::new(0),
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self, key: &str, error: FetchError) -> Self {
        self.failing.insert(key.to_owned(), error);
        self
    }

    pub fn failing_first(self, count: u32) -> Self {
        self.transient.store(count, Ordering::SeqCst);
        self
    }

    pub fn calls(&self, endpoint: Endpoint) -> u32 {
        self.calls
            .lock()
            .expect("counter lock")
            .get(&endpoint)
            .copied()
            .unwrap_or(0)
    }

    async fn gate(&self, endpoint: Endpoint, key: &str) -> Result<(), FetchError> {
        *self
            .calls
            .lock()
            .expect("counter lock")
            .entry(endpoint)
            .or_insert(0) += 1;

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self
            .transient
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
        {
            return Err(FetchError::unavailable("scripted transient failure"));
        }
        match self.failing.get(key) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

impl DataSource for ScriptedSource {
    fn id(&self) -> ProviderId {
        ProviderId::Mock
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::full()
    }

    fn quote<'a>(&'a self, symbol: &'a Symbol) -> SourceFuture<'a, Quote> {
        Box::pin(async move {
            self.gate(Endpoint::Quote, symbol.as_str()).await?;
            self.inner.quote(symbol).await
        })
    }

    fn series<'a>(
        &'a self,
        symbol: &'a Symbol,
        period: ChartPeriod,
    ) -> SourceFuture<'a, Vec<PriceBar>> {
        Box::pin(async move {
            self.gate(Endpoint::Series, symbol.as_str()).await?;
            self.inner.series(symbol, period).await
        })
    }

    fn statement<'a>(&'a self, req: &'a StatementRequest) -> SourceFuture<'a, FinancialStatement> {
        Box::pin(async move {
            self.gate(Endpoint::Statement, req.symbol.as_str()).await?;
            self.inner.statement(req).await
        })
    }

    fn profile<'a>(&'a self, symbol: &'a Symbol) -> SourceFuture<'a, CompanyProfile> {
        Box::pin(async move {
            self.gate(Endpoint::Profile, symbol.as_str()).await?;
            self.inner.profile(symbol).await
        })
    }

    fn ratios<'a>(&'a self, symbol: &'a Symbol) -> SourceFuture<'a, FinancialRatios> {
        Box::pin(async move {
            self.gate(Endpoint::Ratios, symbol.as_str()).await?;
            self.inner.ratios(symbol).await
        })
    }

    fn news<'a>(
        &'a self,
        symbol: Option<&'a Symbol>,
        limit: usize,
    ) -> SourceFuture<'a, Vec<NewsArticle>> {
        Box::pin(async move {
            self.gate(Endpoint::News, symbol.map(Symbol::as_str).unwrap_or("*"))
                .await?;
            self.inner.news(symbol, limit).await
        })
    }

    fn search<'a>(&'a self, query: &'a str, limit: usize) -> SourceFuture<'a, Vec<SearchHit>> {
        Box::pin(async move {
            self.gate(Endpoint::Search, query).await?;
            self.inner.search(query, limit).await
        })
    }

    fn movers<'a>(&'a self, limit: usize) -> SourceFuture<'a, Vec<Quote>> {
        Box::pin(async move {
            self.gate(Endpoint::Movers, "*").await?;
            self.inner.movers(limit).await
        })
    }

    fn yield_curve<'a>(&'a self) -> SourceFuture<'a, YieldCurve> {
        Box::pin(async move {
            self.gate(Endpoint::Yields, "*").await?;
            self.inner.yield_curve().await
        })
    }

    fn economic_series<'a>(&'a self, series_id: &'a str) -> SourceFuture<'a, EconomicObservation> {
        Box::pin(async move {
            self.gate(Endpoint::Economic, series_id).await?;
            self.inner.economic_series(series_id).await
        })
    }
}

pub fn symbol(value: &str) -> Symbol {
    Symbol::parse(value).expect("valid symbol")
}

pub fn gateway(source: Arc<ScriptedSource>) -> MarketDataGateway {
    let source: Arc<dyn DataSource> = source;
    MarketDataGateway::new(SourceRouter::new(vec![source]))
}

/// Orchestrator over `source` with a fast fixed retry delay.
pub async fn orchestrator(source: Arc<ScriptedSource>, dir: &Path) -> Orchestrator {
    let store = WatchlistStore::open(dir.join("watchlists.json")).await;
    Orchestrator::new(Arc::new(gateway(source)), Arc::new(store))
        .with_retry(RetryConfig::fixed(Duration::from_millis(5), 2))
}
