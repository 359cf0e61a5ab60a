//! Market data gateway: cache, single-flight and throttling in front of the
//! routed data sources.
//!
//! Every operation follows the same path:
//!
//! ```text
//! cache hit? ──yes──► decode and return
//!     │ no
//!     ▼
//! join or start the in-flight fetch for the key
//!     │ (initializer only)
//!     ▼
//! select source ─► throttle ─► fetch under timeout ─► cache with TTL
//! ```
//!
//! Concurrent callers for the same key share one remote call and one result,
//! including a failure. Failures are never cached.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::OnceCell;

use crate::cache::{CacheKey, CacheStore, CacheTtls};
use crate::config::Settings;
use crate::data_source::{DataSource, Endpoint, FetchError, StatementRequest};
use crate::provider_policy::ProviderPolicy;
use crate::routing::SourceRouter;
use crate::throttling::ThrottlingQueue;
use crate::{
    ChartPeriod, CompanyProfile, EconomicObservation, FinancialRatios, FinancialStatement,
    NewsArticle, PriceSeries, ProviderId, Quote, SearchHit, Symbol, YieldCurve,
};

type Flight = Arc<OnceCell<Result<String, FetchError>>>;

/// Distinct keys whose call counts are kept before the per-key map resets.
const DEFAULT_TRACKED_CALL_KEYS: usize = 4096;

pub struct MarketDataGateway {
    router: SourceRouter,
    cache: CacheStore,
    ttls: CacheTtls,
    throttles: HashMap<ProviderId, ThrottlingQueue>,
    fetch_timeout: Duration,
    inflight: Mutex<HashMap<CacheKey, Flight>>,
    total_calls: AtomicU64,
    calls: Mutex<HashMap<CacheKey, u64>>,
    tracked_call_keys: usize,
}

impl MarketDataGateway {
    /// Gateway with default TTLs, a 10s fetch timeout and the default quota
    /// for every routed provider.
    pub fn new(router: SourceRouter) -> Self {
        let throttles = router
            .source_ids()
            .into_iter()
            .filter_map(ProviderPolicy::default_for)
            .map(|policy| (policy.provider_id, ThrottlingQueue::from_policy(&policy)))
            .collect();

        Self {
            router,
            cache: CacheStore::new(),
            ttls: CacheTtls::default(),
            throttles,
            fetch_timeout: Duration::from_secs(10),
            inflight: Mutex::new(HashMap::new()),
            total_calls: AtomicU64::new(0),
            calls: Mutex::new(HashMap::new()),
            tracked_call_keys: DEFAULT_TRACKED_CALL_KEYS,
        }
    }

    pub fn from_settings(settings: &Settings, router: SourceRouter) -> Self {
        Self::new(router)
            .with_ttls(settings.ttls.clone())
            .with_fetch_timeout(settings.fetch_timeout)
    }

    pub fn with_ttls(mut self, ttls: CacheTtls) -> Self {
        self.ttls = ttls;
        self
    }

    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    /// Replaces the request budget for the policy's provider.
    pub fn with_policy(mut self, policy: &ProviderPolicy) -> Self {
        self.throttles
            .insert(policy.provider_id, ThrottlingQueue::from_policy(policy));
        self
    }

    pub fn with_cache(mut self, cache: CacheStore) -> Self {
        self.cache = cache;
        self
    }

    /// Caps the per-key call counts kept for `remote_calls_for` (minimum 1).
    pub fn with_tracked_call_keys(mut self, keys: usize) -> Self {
        self.tracked_call_keys = keys.max(1);
        self
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Remote calls issued so far, across all keys.
    pub fn remote_calls(&self) -> u64 {
        self.total_calls.load(Ordering::Relaxed)
    }

    /// Remote calls issued for one key since the per-key counts last reset.
    pub fn remote_calls_for(&self, key: &CacheKey) -> u64 {
        lock(&self.calls).get(key).copied().unwrap_or(0)
    }

    pub async fn quote(&self, symbol: &Symbol) -> Result<Quote, FetchError> {
        let key = CacheKey::new(Endpoint::Quote, [symbol.as_str()]);
        let symbol = symbol.clone();
        self.cached(key, move |source| async move { source.quote(&symbol).await })
            .await
    }

    /// Ascending, de-duplicated history; an empty result is `NotFound`.
    pub async fn series(
        &self,
        symbol: &Symbol,
        period: ChartPeriod,
    ) -> Result<PriceSeries, FetchError> {
        let key = CacheKey::new(Endpoint::Series, [symbol.as_str(), period.as_str()]);
        let symbol = symbol.clone();
        self.cached(key, move |source| async move {
            let bars = source.series(&symbol, period).await?;
            PriceSeries::new(symbol.clone(), bars).map_err(|_| {
                FetchError::not_found(format!("no {period} price history for {symbol}"))
            })
        })
        .await
    }

    pub async fn statement(&self, req: &StatementRequest) -> Result<FinancialStatement, FetchError> {
        let years = req.years.to_string();
        let key = CacheKey::new(
            Endpoint::Statement,
            [
                req.symbol.as_str(),
                req.kind.as_str(),
                years.as_str(),
                if req.quarterly { "quarter" } else { "annual" },
            ],
        );
        let req = req.clone();
        self.cached(key, move |source| async move {
            let statement = source.statement(&req).await?;
            if statement.periods.is_empty() {
                return Err(FetchError::not_found(format!(
                    "no {} data for {}",
                    req.kind.title().to_ascii_lowercase(),
                    req.symbol
                )));
            }
            Ok(statement)
        })
        .await
    }

    pub async fn profile(&self, symbol: &Symbol) -> Result<CompanyProfile, FetchError> {
        let key = CacheKey::new(Endpoint::Profile, [symbol.as_str()]);
        let symbol = symbol.clone();
        self.cached(key, move |source| async move { source.profile(&symbol).await })
            .await
    }

    pub async fn ratios(&self, symbol: &Symbol) -> Result<FinancialRatios, FetchError> {
        let key = CacheKey::new(Endpoint::Ratios, [symbol.as_str()]);
        let symbol = symbol.clone();
        self.cached(key, move |source| async move { source.ratios(&symbol).await })
            .await
    }

    pub async fn news(
        &self,
        symbol: Option<&Symbol>,
        limit: usize,
    ) -> Result<Vec<NewsArticle>, FetchError> {
        let scope = symbol.map(Symbol::as_str).unwrap_or("*");
        let key = CacheKey::new(Endpoint::News, [scope, limit.to_string().as_str()]);
        let symbol = symbol.cloned();
        self.cached(key, move |source| async move {
            source.news(symbol.as_ref(), limit).await
        })
        .await
    }

    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, FetchError> {
        let query = query.trim().to_lowercase();
        let key = CacheKey::new(Endpoint::Search, [query.as_str(), limit.to_string().as_str()]);
        self.cached(key, move |source| async move {
            source.search(&query, limit).await
        })
        .await
    }

    pub async fn movers(&self, limit: usize) -> Result<Vec<Quote>, FetchError> {
        let key = CacheKey::new(Endpoint::Movers, [limit.to_string()]);
        self.cached(key, move |source| async move { source.movers(limit).await })
            .await
    }

    pub async fn yield_curve(&self) -> Result<YieldCurve, FetchError> {
        let key = CacheKey::new(Endpoint::Yields, std::iter::empty::<&str>());
        self.cached(key, |source| async move {
            let curve = source.yield_curve().await?;
            if curve.points.is_empty() {
                return Err(FetchError::not_found("no treasury yields published"));
            }
            Ok(curve)
        })
        .await
    }

    pub async fn economic_series(&self, series_id: &str) -> Result<EconomicObservation, FetchError> {
        let series_id = series_id.trim().to_ascii_uppercase();
        let key = CacheKey::new(Endpoint::Economic, [series_id.as_str()]);
        self.cached(key, move |source| async move {
            source.economic_series(&series_id).await
        })
        .await
    }

    async fn cached<T, F, Fut>(&self, key: CacheKey, fetch: F) -> Result<T, FetchError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(Arc<dyn DataSource>) -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        if let Some(value) = self.cache_lookup(&key).await {
            tracing::debug!(key = %key, "cache hit");
            return Ok(value);
        }

        let (flight, joined) = {
            let mut inflight = lock(&self.inflight);
            match inflight.get(&key) {
                Some(flight) => (flight.clone(), true),
                None => {
                    let flight: Flight = Arc::new(OnceCell::new());
                    inflight.insert(key.clone(), flight.clone());
                    (flight, false)
                }
            }
        };
        if joined {
            tracing::debug!(key = %key, "joining in-flight fetch");
        } else {
            tracing::debug!(key = %key, "cache miss");
        }

        let outcome = flight
            .get_or_init(|| self.load(&key, fetch))
            .await
            .clone();

        {
            let mut inflight = lock(&self.inflight);
            if inflight
                .get(&key)
                .is_some_and(|current| Arc::ptr_eq(current, &flight))
            {
                inflight.remove(&key);
            }
        }

        let body = outcome?;
        serde_json::from_str(&body).map_err(|e| {
            FetchError::unavailable(format!("cached {} payload is unreadable: {e}", key.endpoint))
        })
    }

    async fn cache_lookup<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let body = self.cache.get(key).await?;
        match serde_json::from_str(&body) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::warn!(key = %key, %error, "discarding unreadable cache entry");
                None
            }
        }
    }

    /// Runs once per flight; the result is shared with every joined caller.
    async fn load<T, F, Fut>(&self, key: &CacheKey, fetch: F) -> Result<String, FetchError>
    where
        T: Serialize,
        F: FnOnce(Arc<dyn DataSource>) -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        // a flight that finished between the lookup and the join already cached
        if let Some(body) = self.cache.get(key).await {
            return Ok(body);
        }

        let source = self.router.select(key.endpoint)?;
        let provider = source.id();
        if let Some(throttle) = self.throttles.get(&provider) {
            throttle.acquire()?;
        }

        self.record_call(key);

        let value = match tokio::time::timeout(self.fetch_timeout, fetch(source)).await {
            Ok(Ok(value)) => value,
            Ok(Err(error)) => {
                tracing::warn!(key = %key, provider = %provider, code = error.code(), "fetch failed");
                return Err(error);
            }
            Err(_) => {
                tracing::warn!(key = %key, provider = %provider, "fetch timed out");
                return Err(FetchError::unavailable(format!(
                    "{provider} did not respond within {}ms",
                    self.fetch_timeout.as_millis()
                )));
            }
        };

        let body = serde_json::to_string(&value).map_err(|e| {
            FetchError::unavailable(format!("failed to encode {} payload: {e}", key.endpoint))
        })?;
        self.cache
            .put(key.clone(), body.clone(), self.ttls.for_endpoint(key.endpoint))
            .await;
        Ok(body)
    }

    fn record_call(&self, key: &CacheKey) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        let mut calls = lock(&self.calls);
        if !calls.contains_key(key) && calls.len() >= self.tracked_call_keys {
            tracing::debug!(keys = calls.len(), "resetting per-key call counts");
            calls.clear();
        }
        *calls.entry(key.clone()).or_insert(0) += 1;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use rust_decimal_macros::dec;

    use super::*;
    use crate::data_source::{CapabilitySet, FetchErrorKind, SourceFuture};
    use crate::{PriceBar, UtcDateTime};

    /// Counts quote calls; fails the first `failures` of them.
    struct CountingSource {
        calls: AtomicU32,
        failures: u32,
        delay: Duration,
    }

    impl CountingSource {
        fn new(failures: u32, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                failures,
                delay,
            })
        }
    }

    impl DataSource for CountingSource {
        fn id(&self) -> ProviderId {
            ProviderId::Mock
        }

        fn capabilities(&self) -> CapabilitySet {
            CapabilitySet::only(&[Endpoint::Quote, Endpoint::Series])
        }

        fn quote<'a>(&'a self, symbol: &'a Symbol) -> SourceFuture<'a, Quote> {
            Box::pin(async move {
                let call = self.calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(self.delay).await;
                if call < self.failures {
                    return Err(FetchError::unavailable("upstream hiccup"));
                }
                Ok(Quote::new(
                    symbol.clone(),
                    dec!(101.25),
                    dec!(1.25),
                    dec!(1.25),
                    "USD",
                    UtcDateTime::now(),
                ))
            })
        }

        fn series<'a>(
            &'a self,
            _symbol: &'a Symbol,
            _period: ChartPeriod,
        ) -> SourceFuture<'a, Vec<PriceBar>> {
            Box::pin(async move { Ok(Vec::new()) })
        }
    }

    fn gateway(source: Arc<CountingSource>) -> MarketDataGateway {
        let source: Arc<dyn DataSource> = source;
        MarketDataGateway::new(SourceRouter::new(vec![source]))
    }

    fn aapl() -> Symbol {
        Symbol::parse("AAPL").expect("valid")
    }

    #[tokio::test]
    async fn second_call_within_ttl_is_served_from_cache() {
        let source = CountingSource::new(0, Duration::ZERO);
        let gateway = gateway(source.clone());

        let first = gateway.quote(&aapl()).await.expect("quote");
        let second = gateway.quote(&aapl()).await.expect("quote");

        assert_eq!(first, second);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(gateway.remote_calls(), 1);
    }

    #[tokio::test]
    async fn per_key_counts_stay_bounded_while_total_keeps_counting() {
        let source = CountingSource::new(0, Duration::ZERO);
        let gateway = gateway(source).with_tracked_call_keys(2);

        for ticker in ["AAPL", "MSFT", "NVDA"] {
            gateway
                .quote(&Symbol::parse(ticker).expect("valid"))
                .await
                .expect("quote");
        }

        assert_eq!(gateway.remote_calls(), 3);
        assert_eq!(lock(&gateway.calls).len(), 1);
        assert_eq!(
            gateway.remote_calls_for(&CacheKey::new(Endpoint::Quote, ["NVDA"])),
            1
        );
        assert_eq!(
            gateway.remote_calls_for(&CacheKey::new(Endpoint::Quote, ["AAPL"])),
            0
        );
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_flight() {
        let source = CountingSource::new(0, Duration::from_millis(50));
        let gateway = gateway(source.clone());
        let symbol = aapl();

        let results = futures::future::join_all((0..8).map(|_| gateway.quote(&symbol))).await;

        assert!(results.iter().all(Result::is_ok));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_shared_but_not_cached() {
        let source = CountingSource::new(1, Duration::from_millis(20));
        let gateway = gateway(source.clone());
        let symbol = aapl();

        let results = futures::future::join_all((0..3).map(|_| gateway.quote(&symbol))).await;
        assert!(results
            .iter()
            .all(|result| matches!(result, Err(e) if e.kind() == FetchErrorKind::Unavailable)));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        gateway.quote(&symbol).await.expect("retry reaches the source");
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_source_times_out_as_unavailable() {
        let source = CountingSource::new(0, Duration::from_secs(30));
        let gateway = gateway(source).with_fetch_timeout(Duration::from_secs(1));

        let err = gateway.quote(&aapl()).await.expect_err("must time out");
        assert_eq!(err.kind(), FetchErrorKind::Unavailable);
    }

    #[tokio::test]
    async fn empty_series_is_not_found() {
        let gateway = gateway(CountingSource::new(0, Duration::ZERO));
        let err = gateway
            .series(&aapl(), ChartPeriod::OneMonth)
            .await
            .expect_err("empty");
        assert_eq!(err.kind(), FetchErrorKind::NotFound);
    }

    #[tokio::test]
    async fn exhausted_budget_is_rate_limited_before_the_source() {
        let source = CountingSource::new(0, Duration::ZERO);
        let gateway = gateway(source.clone()).with_policy(&ProviderPolicy {
            provider_id: ProviderId::Mock,
            quota_window: Duration::from_secs(60),
            quota_limit: 1,
            max_retry_after: Duration::from_secs(5),
        });

        gateway.quote(&aapl()).await.expect("first call fits");
        let err = gateway
            .quote(&Symbol::parse("MSFT").expect("valid"))
            .await
            .expect_err("budget spent");
        assert_eq!(err.kind(), FetchErrorKind::RateLimited);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unrouted_endpoint_reports_invalid_key() {
        let gateway = gateway(CountingSource::new(0, Duration::ZERO));
        let err = gateway.economic_series("GDP").await.expect_err("no source");
        assert_eq!(err.kind(), FetchErrorKind::InvalidKey);
    }
}
