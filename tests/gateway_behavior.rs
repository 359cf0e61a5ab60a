//! Behaviour tests for the caching, deduplicating market data gateway.

mod support;

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tickterm_core::{CacheKey, CacheTtls, ChartPeriod, Endpoint, FetchError, FetchErrorKind};

use support::{gateway, symbol, ScriptedSource};

#[tokio::test]
async fn when_same_quote_is_requested_within_ttl_then_provider_is_called_once() {
    // Given: a gateway with default TTLs
    let source = Arc::new(ScriptedSource::new());
    let gateway = gateway(source.clone());
    let aapl = symbol("AAPL");

    // When: the same quote is requested twice in a row
    let first = gateway.quote(&aapl).await.expect("first quote");
    let second = gateway.quote(&aapl).await.expect("second quote");

    // Then: the second answer came from cache
    assert_eq!(first, second);
    assert_eq!(source.calls(Endpoint::Quote), 1);
    assert_eq!(
        gateway.remote_calls_for(&CacheKey::new(Endpoint::Quote, ["AAPL"])),
        1
    );
}

#[tokio::test]
async fn when_concurrent_callers_miss_together_then_they_share_one_fetch() {
    // Given: a slow provider
    let source = Arc::new(ScriptedSource::new().with_delay(Duration::from_millis(50)));
    let gateway = gateway(source.clone());
    let msft = symbol("MSFT");

    // When: ten callers ask for the same series at once
    let results = join_all((0..10).map(|_| gateway.series(&msft, ChartPeriod::ThreeMonths))).await;

    // Then: all succeed with identical data from a single upstream call
    assert!(results.iter().all(Result::is_ok));
    let first = results[0].as_ref().expect("series");
    assert!(results
        .iter()
        .all(|result| result.as_ref().expect("series").bars() == first.bars()));
    assert_eq!(source.calls(Endpoint::Series), 1);
}

#[tokio::test]
async fn when_ttl_is_zero_then_every_request_reaches_provider() {
    let source = Arc::new(ScriptedSource::new());
    let ttls = CacheTtls {
        quote: Duration::ZERO,
        ..CacheTtls::default()
    };
    let gateway = gateway(source.clone()).with_ttls(ttls);
    let nvda = symbol("NVDA");

    for _ in 0..3 {
        gateway.quote(&nvda).await.expect("quote");
    }

    assert_eq!(source.calls(Endpoint::Quote), 3);
    assert!(gateway.cache().is_empty().await);
}

#[tokio::test]
async fn when_arguments_differ_then_cache_entries_are_distinct() {
    let source = Arc::new(ScriptedSource::new());
    let gateway = gateway(source.clone());
    let aapl = symbol("AAPL");

    gateway.series(&aapl, ChartPeriod::OneMonth).await.expect("1M");
    gateway.series(&aapl, ChartPeriod::OneYear).await.expect("1Y");
    gateway.series(&aapl, ChartPeriod::OneMonth).await.expect("1M again");
    gateway.quote(&aapl).await.expect("quote");

    assert_eq!(source.calls(Endpoint::Series), 2);
    assert_eq!(source.calls(Endpoint::Quote), 1);
    assert_eq!(gateway.cache().len().await, 3);
}

#[tokio::test]
async fn when_fetch_fails_then_error_is_not_cached() {
    // Given: a provider that fails the first call only
    let source = Arc::new(ScriptedSource::new().failing_first(1));
    let gateway = gateway(source.clone());
    let tsla = symbol("TSLA");

    // When: the first call fails and the second is made straight after
    let err = gateway.profile(&tsla).await.expect_err("first call fails");
    let profile = gateway.profile(&tsla).await.expect("second call succeeds");

    // Then: the failure was not remembered
    assert_eq!(err.kind(), FetchErrorKind::Unavailable);
    assert_eq!(profile.symbol, tsla);
    assert_eq!(source.calls(Endpoint::Profile), 2);
}

#[tokio::test]
async fn when_concurrent_callers_share_a_failed_flight_then_all_see_the_error() {
    let source = Arc::new(
        ScriptedSource::new()
            .with_delay(Duration::from_millis(30))
            .failing("GME", FetchError::not_found("delisted")),
    );
    let gateway = gateway(source.clone());
    let gme = symbol("GME");

    let results = join_all((0..4).map(|_| gateway.quote(&gme))).await;

    assert!(results
        .iter()
        .all(|result| matches!(result, Err(error) if error.kind() == FetchErrorKind::NotFound)));
    assert_eq!(source.calls(Endpoint::Quote), 1);
}

#[tokio::test]
async fn when_provider_exceeds_fetch_timeout_then_request_fails_as_unavailable() {
    let source = Arc::new(ScriptedSource::new().with_delay(Duration::from_millis(200)));
    let gateway = gateway(source).with_fetch_timeout(Duration::from_millis(20));

    let err = gateway
        .ratios(&symbol("IBM"))
        .await
        .expect_err("timed out");

    assert_eq!(err.kind(), FetchErrorKind::Unavailable);
    assert!(err.message().contains("did not respond"));
}

#[tokio::test]
async fn when_search_query_differs_only_in_case_then_cache_is_shared() {
    let source = Arc::new(ScriptedSource::new());
    let gateway = gateway(source.clone());

    gateway.search("Apple", 5).await.expect("search");
    gateway.search("  apple ", 5).await.expect("search");

    assert_eq!(source.calls(Endpoint::Search), 1);
}
