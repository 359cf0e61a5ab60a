//! Behaviour tests for command parsing and orchestrated dispatch.
//!
//! These exercise the whole pipeline from a terminal line to a display
//! payload against a scripted data source.

mod support;

use std::sync::Arc;

use tickterm_core::command::{self, ParseError, ParsedRequest};
use tickterm_core::currency;
use tickterm_core::{
    BasketConfig, BasketEntry, ChartPeriod, DisplayPayload, Endpoint, EntryOutcome, FetchError,
    LocalizedAmount, OrchestratorError, VERBS,
};

use support::{orchestrator, symbol, ScriptedSource};

// =============================================================================
// Command parsing
// =============================================================================

#[test]
fn when_chart_period_is_outside_allowed_set_then_parse_fails_with_invalid_arguments() {
    // Given / When: a two-year chart, which is not an offered window
    let result = command::parse("GP AAPL 2Y");

    // Then: the verb is recognized but its arguments are rejected
    assert!(matches!(
        result,
        Err(ParseError::InvalidArguments { ref verb, .. }) if verb == "GP"
    ));
}

#[test]
fn when_chart_period_is_one_year_then_chart_request_is_built() {
    let request = command::parse("gp aapl 1y").expect("valid chart command");

    assert_eq!(
        request,
        ParsedRequest::Chart {
            symbol: symbol("AAPL"),
            period: ChartPeriod::OneYear,
        }
    );
}

#[test]
fn when_verb_is_unknown_then_parse_names_it() {
    let err = command::parse("XYZZY AAPL").expect_err("unknown verb");
    assert!(matches!(err, ParseError::UnknownCommand { ref verb } if verb == "XYZZY"));
}

// =============================================================================
// Quote dispatch and currency
// =============================================================================

#[tokio::test]
async fn when_quote_is_dispatched_then_currency_follows_symbol_suffix() {
    // Given: an orchestrator over the scripted source
    let dir = tempfile::tempdir().expect("tempdir");
    let orchestrator = orchestrator(Arc::new(ScriptedSource::new()), dir.path()).await;

    for raw in ["AAPL", "VOD.L", "7203.T", "SAP.DE", "0700.HK", "BHP.AX", "FOO.ZZ"] {
        // When: the quote command runs
        let envelope = orchestrator
            .execute(&format!("Q {raw}"))
            .await
            .expect("quote payload");

        // Then: the payload currency is the converter's answer for the symbol
        let DisplayPayload::Quote(view) = envelope.payload else {
            panic!("expected quote payload for {raw}");
        };
        let expected = currency::resolve(&symbol(raw));
        assert_eq!(view.currency, expected.currency.code, "currency for {raw}");
        assert_eq!(view.price.currency, expected.currency.code);
        assert_eq!(view.currency_recognized, expected.recognized);
    }
}

#[tokio::test]
async fn when_quote_fetch_is_exhausted_then_request_fails_as_data_unavailable() {
    // Given: every fetch keyed on AAPL fails transiently
    let dir = tempfile::tempdir().expect("tempdir");
    let source = Arc::new(ScriptedSource::new().failing("AAPL", FetchError::unavailable("down")));
    let orchestrator = orchestrator(source.clone(), dir.path()).await;

    // When
    let err = orchestrator.execute("Q AAPL").await.expect_err("quote fails");

    // Then: the quote was retried and the error names the symbol
    assert!(matches!(
        err,
        OrchestratorError::DataUnavailable { ref subject, attempts: 3, .. } if subject == "AAPL"
    ));
    assert_eq!(err.code(), "data.unavailable");
    assert_eq!(source.calls(Endpoint::Quote), 3);
}

// =============================================================================
// Multi-symbol fan-out
// =============================================================================

#[tokio::test]
async fn when_two_of_six_index_fetches_are_unavailable_then_payload_keeps_order_and_markers() {
    // Given: six indices, two of which are down
    let dir = tempfile::tempdir().expect("tempdir");
    let source = ScriptedSource::new()
        .failing("^DJI", FetchError::unavailable("exchange feed down"))
        .failing("^FTSE", FetchError::unavailable("exchange feed down"));
    let mut baskets = BasketConfig::default();
    baskets.indices.truncate(6);
    let orchestrator = orchestrator(Arc::new(source), dir.path())
        .await
        .with_baskets(baskets);

    // When: the world indices page is requested
    let envelope = orchestrator.execute("WEI").await.expect("partial payload");

    // Then: four resolved rows and two markers, in configured order
    let DisplayPayload::Index(view) = envelope.payload else {
        panic!("expected index payload");
    };
    let order: Vec<&str> = view.rows.iter().map(|row| row.symbol.as_str()).collect();
    assert_eq!(order, vec!["^GSPC", "^DJI", "^IXIC", "^RUT", "^FTSE", "^GDAXI"]);

    let resolved = view.rows.iter().filter(|row| row.outcome.is_resolved()).count();
    assert_eq!(resolved, 4);
    for failed in [&view.rows[1], &view.rows[4]] {
        assert!(matches!(
            &failed.outcome,
            EntryOutcome::Failed { code, .. } if code == "fetch.unavailable"
        ));
    }
}

#[tokio::test]
async fn when_every_basket_entry_fails_then_request_fails_as_a_whole() {
    // Given: a two-entry forex basket where both fetches fail
    let dir = tempfile::tempdir().expect("tempdir");
    let source = ScriptedSource::new()
        .failing("FXE", FetchError::unavailable("down"))
        .failing("FXY", FetchError::unavailable("down"));
    let mut baskets = BasketConfig::default();
    baskets.forex.truncate(2);
    let orchestrator = orchestrator(Arc::new(source), dir.path())
        .await
        .with_baskets(baskets);

    // When
    let err = orchestrator.execute("FXIP").await.expect_err("all failed");

    // Then
    assert!(matches!(err, OrchestratorError::DataUnavailable { .. }));
}

#[tokio::test]
async fn when_one_indicator_fails_then_economic_page_marks_only_that_row() {
    let dir = tempfile::tempdir().expect("tempdir");
    let source = ScriptedSource::new().failing("UNRATE", FetchError::not_found("series retired"));
    let orchestrator = orchestrator(Arc::new(source), dir.path()).await;

    let envelope = orchestrator.execute("ECST").await.expect("partial payload");

    let DisplayPayload::EconStats(view) = envelope.payload else {
        panic!("expected economic payload");
    };
    assert_eq!(view.rows.len(), BasketConfig::default().indicators.len());
    let failed: Vec<&str> = view
        .rows
        .iter()
        .filter(|row| !row.outcome.is_resolved())
        .map(|row| row.series_id.as_str())
        .collect();
    assert_eq!(failed, vec!["UNRATE"]);
}

// =============================================================================
// Bounded retry
// =============================================================================

#[tokio::test]
async fn when_provider_stays_unavailable_then_it_is_called_one_plus_max_retries_times() {
    // Given: profile fetches for AAPL always fail transiently
    let dir = tempfile::tempdir().expect("tempdir");
    let source = Arc::new(
        ScriptedSource::new().failing("AAPL", FetchError::unavailable("upstream 503")),
    );
    let orchestrator = orchestrator(source.clone(), dir.path()).await;

    // When
    let err = orchestrator.execute("FA AAPL").await.expect_err("exhausted");

    // Then: three attempts with two retries configured
    assert!(matches!(
        err,
        OrchestratorError::DataUnavailable { attempts: 3, ref subject, .. } if subject == "AAPL"
    ));
    assert_eq!(source.calls(Endpoint::Profile), 3);
}

#[tokio::test]
async fn when_symbol_is_not_found_then_source_is_called_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    let source = Arc::new(ScriptedSource::new().failing("NOPE", FetchError::not_found("unknown")));
    let orchestrator = orchestrator(source.clone(), dir.path()).await;

    let err = orchestrator.execute("FA NOPE").await.expect_err("not found");

    assert!(matches!(err, OrchestratorError::NotFound { ref subject } if subject == "NOPE"));
    assert_eq!(source.calls(Endpoint::Profile), 1);
}

#[tokio::test]
async fn when_key_is_rejected_then_error_surfaces_without_retry() {
    let dir = tempfile::tempdir().expect("tempdir");
    let source = Arc::new(
        ScriptedSource::new().failing("MSFT", FetchError::invalid_key("key revoked")),
    );
    let orchestrator = orchestrator(source.clone(), dir.path()).await;

    let err = orchestrator.execute("FA MSFT").await.expect_err("invalid key");

    assert!(matches!(err, OrchestratorError::InvalidKey { ref message } if message == "key revoked"));
    assert_eq!(source.calls(Endpoint::Profile), 1);
}

#[tokio::test]
async fn when_first_attempt_fails_transiently_then_retry_recovers() {
    let dir = tempfile::tempdir().expect("tempdir");
    let source = Arc::new(ScriptedSource::new().failing_first(1));
    let orchestrator = orchestrator(source.clone(), dir.path()).await;

    let envelope = orchestrator.execute("FA AAPL").await.expect("recovered");

    assert!(matches!(envelope.payload, DisplayPayload::Fundamentals(_)));
    assert_eq!(source.calls(Endpoint::Profile), 2);
}

// =============================================================================
// Other pages
// =============================================================================

#[tokio::test]
async fn when_quarterly_statement_is_requested_then_columns_cover_every_quarter() {
    let dir = tempfile::tempdir().expect("tempdir");
    let orchestrator = orchestrator(Arc::new(ScriptedSource::new()), dir.path()).await;

    let envelope = orchestrator.execute("IS AAPL 2 Q").await.expect("statement");

    let DisplayPayload::Statement(view) = envelope.payload else {
        panic!("expected statement payload");
    };
    assert!(view.quarterly);
    assert_eq!(view.columns.len(), 8);
    assert!(view.rows.iter().all(|row| row.values.len() == 8));
}

#[tokio::test]
async fn when_financials_are_requested_then_quote_and_ratios_are_both_fetched() {
    let dir = tempfile::tempdir().expect("tempdir");
    let source = Arc::new(ScriptedSource::new());
    let orchestrator = orchestrator(source.clone(), dir.path()).await;

    let envelope = orchestrator.execute("FI NVDA").await.expect("financials");

    assert!(matches!(envelope.payload, DisplayPayload::Financials(_)));
    assert_eq!(source.calls(Endpoint::Quote), 1);
    assert_eq!(source.calls(Endpoint::Ratios), 1);
}

#[tokio::test]
async fn when_help_is_requested_then_every_verb_is_listed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let orchestrator = orchestrator(Arc::new(ScriptedSource::new()), dir.path()).await;

    for line in ["HELP", "?"] {
        let envelope = orchestrator.execute(line).await.expect("help");
        let DisplayPayload::Help(view) = envelope.payload else {
            panic!("expected help payload");
        };
        assert_eq!(view.verbs.len(), VERBS.len());
    }
}

#[tokio::test]
async fn when_watchlist_is_shown_then_rows_follow_insertion_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    let source = ScriptedSource::new().failing("TSLA", FetchError::unavailable("halted"));
    let orchestrator = orchestrator(Arc::new(source), dir.path()).await;

    for line in ["WA MSFT", "WA TSLA", "WA AAPL"] {
        orchestrator.execute(line).await.expect("add");
    }
    let envelope = orchestrator.execute("W").await.expect("watchlist");

    let DisplayPayload::Watchlist(view) = envelope.payload else {
        panic!("expected watchlist payload");
    };
    let order: Vec<&str> = view.rows.iter().map(|row| row.symbol.as_str()).collect();
    assert_eq!(order, vec!["MSFT", "TSLA", "AAPL"]);
    assert!(!view.rows[1].outcome.is_resolved());
}

// =============================================================================
// Row money and JSON shape
// =============================================================================

/// Fails on any JSON object that repeats a key, at any depth.
struct UniqueKeys;

impl<'de> serde::Deserialize<'de> for UniqueKeys {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(UniqueKeysVisitor)
    }
}

struct UniqueKeysVisitor;

impl<'de> serde::de::Visitor<'de> for UniqueKeysVisitor {
    type Value = UniqueKeys;

    fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_bool<E: serde::de::Error>(self, _: bool) -> Result<UniqueKeys, E> {
        Ok(UniqueKeys)
    }
    fn visit_i64<E: serde::de::Error>(self, _: i64) -> Result<UniqueKeys, E> {
        Ok(UniqueKeys)
    }
    fn visit_u64<E: serde::de::Error>(self, _: u64) -> Result<UniqueKeys, E> {
        Ok(UniqueKeys)
    }
    fn visit_f64<E: serde::de::Error>(self, _: f64) -> Result<UniqueKeys, E> {
        Ok(UniqueKeys)
    }
    fn visit_str<E: serde::de::Error>(self, _: &str) -> Result<UniqueKeys, E> {
        Ok(UniqueKeys)
    }
    fn visit_unit<E: serde::de::Error>(self) -> Result<UniqueKeys, E> {
        Ok(UniqueKeys)
    }

    fn visit_seq<A: serde::de::SeqAccess<'de>>(self, mut seq: A) -> Result<UniqueKeys, A::Error> {
        while seq.next_element::<UniqueKeys>()?.is_some() {}
        Ok(UniqueKeys)
    }

    fn visit_map<A: serde::de::MapAccess<'de>>(self, mut map: A) -> Result<UniqueKeys, A::Error> {
        let mut seen = std::collections::HashSet::new();
        while let Some(key) = map.next_key::<String>()? {
            if !seen.insert(key.clone()) {
                return Err(serde::de::Error::custom(format!("duplicate key '{key}'")));
            }
            map.next_value::<UniqueKeys>()?;
        }
        Ok(UniqueKeys)
    }
}

fn london_basket() -> BasketConfig {
    let mut baskets = BasketConfig::default();
    baskets.indices = vec![BasketEntry {
        symbol: symbol("VOD.L"),
        label: String::from("Vodafone"),
    }];
    baskets
}

fn assert_sterling(amount: &LocalizedAmount) {
    assert_eq!(amount.currency, "GBP");
    assert!(
        amount.formatted.trim_start_matches('-').starts_with('£'),
        "unexpected format {}",
        amount.formatted
    );
}

#[tokio::test]
async fn when_basket_row_resolves_then_price_and_change_are_both_localized() {
    // Given: a one-entry basket listed in London
    let dir = tempfile::tempdir().expect("tempdir");
    let orchestrator = orchestrator(Arc::new(ScriptedSource::new()), dir.path())
        .await
        .with_baskets(london_basket());

    // When
    let envelope = orchestrator.execute("WEI").await.expect("index payload");

    // Then
    let DisplayPayload::Index(view) = envelope.payload else {
        panic!("expected index payload");
    };
    let line = view.rows[0].outcome.resolved().expect("resolved row");
    assert_sterling(&line.price);
    assert_sterling(&line.change);
}

#[tokio::test]
async fn when_watchlist_row_resolves_then_change_carries_the_listing_currency() {
    let dir = tempfile::tempdir().expect("tempdir");
    let orchestrator = orchestrator(Arc::new(ScriptedSource::new()), dir.path()).await;
    orchestrator.execute("WA VOD.L").await.expect("add");

    let envelope = orchestrator.execute("W").await.expect("watchlist payload");

    let DisplayPayload::Watchlist(view) = envelope.payload else {
        panic!("expected watchlist payload");
    };
    let line = view.rows[0].outcome.resolved().expect("resolved row");
    assert_sterling(&line.change);
}

#[tokio::test]
async fn when_row_pages_are_serialized_then_no_object_repeats_a_key() {
    // Given: a basket with one resolved and one failed row, and a watchlist
    let dir = tempfile::tempdir().expect("tempdir");
    let source = ScriptedSource::new().failing("^DJI", FetchError::unavailable("down"));
    let mut baskets = BasketConfig::default();
    baskets.indices.truncate(2);
    let orchestrator = orchestrator(Arc::new(source), dir.path())
        .await
        .with_baskets(baskets);
    orchestrator.execute("WA MSFT").await.expect("add");

    for line in ["WEI", "W", "ECST"] {
        // When
        let envelope = orchestrator.execute(line).await.expect("payload");
        let json = serde_json::to_string(&envelope).expect("serialize");

        // Then: a strict reader accepts it, and row fields sit beside a nested outcome
        serde_json::from_str::<UniqueKeys>(&json)
            .unwrap_or_else(|error| panic!("{line} emitted {error}: {json}"));
        let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");
        let row = &value["payload"]["rows"][0];
        assert!(row["outcome"]["status"].is_string(), "{line}: {row}");
    }
}
