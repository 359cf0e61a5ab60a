//! Request orchestration.
//!
//! [`Orchestrator::dispatch`] turns one [`ParsedRequest`] into a
//! [`DisplayPayload`]: it fans out gateway fetches, retries transient
//! failures, localizes money and renders charts.
//!
//! # Retry
//!
//! `RateLimited` and `Unavailable` are retried up to `RetryConfig::max_retries`
//! times. `NotFound` and `InvalidKey` surface after the first attempt.
//!
//! # Partial failure
//!
//! Multi-entry pages (indices, forex, economic series, watchlists) keep a
//! per-entry [`EntryOutcome`] in request order. The request as a whole fails
//! only when every entry failed.

use std::future::Future;
use std::sync::Arc;

use rust_decimal::Decimal;
use thiserror::Error;
use tokio::time::Instant;

use crate::chart::ChartRenderer;
use crate::command::{self, ParseError, ParsedRequest, VERBS};
use crate::config::{BasketConfig, BasketEntry, Settings};
use crate::currency::{self, LocalizedAmount};
use crate::data_source::{FetchError, FetchErrorKind, StatementRequest};
use crate::gateway::MarketDataGateway;
use crate::payload::{
    BasketRow, BasketView, ChartView, DisplayEnvelope, DisplayPayload, EconRow, EconValue,
    EconView, EntryOutcome, FinancialsView, Headline, HelpView, MoversView, NewsView, ProfileView,
    QuoteLine, QuoteView, SearchView, StatementRow, StatementView, WatchlistRow, WatchlistView,
    YieldRow, YieldView,
};
use crate::retry::RetryConfig;
use crate::routing::SourceRouter;
use crate::watchlist::{StoreError, WatchlistStore};
use crate::{ChartPeriod, Quote, Symbol, WatchlistName};

const QUOTE_HEADLINES: usize = 3;
const NEWS_LIMIT: usize = 15;
const MOVERS_LIMIT: usize = 10;
const SEARCH_LIMIT: usize = 10;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("no data found for {subject}")]
    NotFound { subject: String },

    #[error("{message}")]
    InvalidKey { message: String },

    #[error("{subject}: data unavailable after {attempts} attempt(s): {reason}")]
    DataUnavailable {
        subject: String,
        attempts: u32,
        reason: String,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl OrchestratorError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Parse(ParseError::UnknownCommand { .. }) => "command.unknown",
            Self::Parse(ParseError::InvalidArguments { .. }) => "command.invalid_arguments",
            Self::NotFound { .. } => "data.not_found",
            Self::InvalidKey { .. } => "data.invalid_key",
            Self::DataUnavailable { .. } => "data.unavailable",
            Self::Store(_) => "watchlist.rejected",
        }
    }
}

/// Final failure of a retried fetch.
#[derive(Debug)]
struct Exhausted {
    error: FetchError,
    attempts: u32,
}

impl Exhausted {
    fn into_error(self, subject: impl Into<String>) -> OrchestratorError {
        let subject = subject.into();
        match self.error.kind() {
            FetchErrorKind::NotFound => OrchestratorError::NotFound { subject },
            FetchErrorKind::InvalidKey => OrchestratorError::InvalidKey {
                message: self.error.message().to_owned(),
            },
            FetchErrorKind::RateLimited | FetchErrorKind::Unavailable => {
                OrchestratorError::DataUnavailable {
                    subject,
                    attempts: self.attempts,
                    reason: self.error.message().to_owned(),
                }
            }
        }
    }
}

pub struct Orchestrator {
    gateway: Arc<MarketDataGateway>,
    watchlists: Arc<WatchlistStore>,
    baskets: BasketConfig,
    renderer: ChartRenderer,
    chart_width: usize,
    chart_height: usize,
    retry: RetryConfig,
}

impl Orchestrator {
    pub fn new(gateway: Arc<MarketDataGateway>, watchlists: Arc<WatchlistStore>) -> Self {
        Self {
            gateway,
            watchlists,
            baskets: BasketConfig::default(),
            renderer: ChartRenderer,
            chart_width: 60,
            chart_height: 12,
            retry: RetryConfig::default(),
        }
    }

    /// Wires router, gateway and watchlist store from `settings`.
    pub async fn from_settings(settings: &Settings) -> Self {
        let router = SourceRouter::builder().with_settings(settings).build();
        let gateway = MarketDataGateway::from_settings(settings, router);
        let watchlists = WatchlistStore::open(settings.watchlist_path.clone()).await;

        Self::new(Arc::new(gateway), Arc::new(watchlists))
            .with_retry(RetryConfig::exponential(settings.max_retries))
            .with_chart_size(settings.chart_width, settings.chart_height)
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_baskets(mut self, baskets: BasketConfig) -> Self {
        self.baskets = baskets;
        self
    }

    pub fn with_chart_size(mut self, width: usize, height: usize) -> Self {
        self.chart_width = width;
        self.chart_height = height;
        self
    }

    pub fn gateway(&self) -> &MarketDataGateway {
        &self.gateway
    }

    pub fn watchlists(&self) -> &WatchlistStore {
        &self.watchlists
    }

    /// Parses and runs one terminal line.
    pub async fn execute(&self, line: &str) -> Result<DisplayEnvelope, OrchestratorError> {
        let request = command::parse(line)?;
        self.run(request).await
    }

    /// Dispatches `request` and wraps the payload for the UI.
    pub async fn run(&self, request: ParsedRequest) -> Result<DisplayEnvelope, OrchestratorError> {
        let started = Instant::now();
        let verb = request.verb();
        let region = request.region();

        let payload = self.dispatch(request).await?;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::debug!(verb, elapsed_ms, "dispatch complete");

        Ok(DisplayEnvelope::new(region, verb, elapsed_ms, payload))
    }

    pub async fn dispatch(&self, request: ParsedRequest) -> Result<DisplayPayload, OrchestratorError> {
        match request {
            ParsedRequest::Quote(symbol) => self.quote_page(&symbol).await,
            ParsedRequest::Chart { symbol, period } => self.chart_page(&symbol, period).await,
            ParsedRequest::Fundamentals(symbol) => self.profile_page(&symbol).await,
            ParsedRequest::Financials(symbol) => self.financials_page(&symbol).await,
            ParsedRequest::Statement(req) => self.statement_page(&req).await,
            ParsedRequest::Index => self
                .basket_page("World Equity Indices", &self.baskets.indices)
                .await
                .map(DisplayPayload::Index),
            ParsedRequest::Forex => self
                .basket_page("Currency ETFs", &self.baskets.forex)
                .await
                .map(DisplayPayload::Forex),
            ParsedRequest::Yield => self.yield_page().await,
            ParsedRequest::Movers => self.movers_page().await,
            ParsedRequest::EconStats => self.econ_page().await,
            ParsedRequest::News(symbol) => self.news_page(symbol).await,
            ParsedRequest::WatchlistShow(name) => self.watchlist_page(name).await,
            ParsedRequest::WatchlistAdd { symbol, list } => {
                let name = list.unwrap_or_else(WatchlistName::default_list);
                let message = if self.watchlists.add_symbol(&name, &symbol).await? {
                    format!("added {symbol} to '{name}'")
                } else {
                    format!("{symbol} is already in '{name}'")
                };
                Ok(DisplayPayload::Notice { message })
            }
            ParsedRequest::WatchlistRemove { symbol, list } => {
                let name = list.unwrap_or_else(WatchlistName::default_list);
                self.watchlists.remove_symbol(&name, &symbol).await?;
                Ok(DisplayPayload::Notice {
                    message: format!("removed {symbol} from '{name}'"),
                })
            }
            ParsedRequest::WatchlistCreate(name) => {
                self.watchlists.create(&name).await?;
                Ok(DisplayPayload::Notice {
                    message: format!("created watchlist '{name}'"),
                })
            }
            ParsedRequest::WatchlistDelete(name) => {
                self.watchlists.delete(&name).await?;
                Ok(DisplayPayload::Notice {
                    message: format!("deleted watchlist '{name}'"),
                })
            }
            ParsedRequest::Search(query) => {
                let hits = self
                    .retrying(&query, || self.gateway.search(&query, SEARCH_LIMIT))
                    .await
                    .map_err(|exhausted| exhausted.into_error(format!("search '{query}'")))?;
                Ok(DisplayPayload::Search(SearchView { query, hits }))
            }
            ParsedRequest::Help => Ok(DisplayPayload::Help(HelpView {
                verbs: VERBS.to_vec(),
            })),
        }
    }

    /// Runs `fetch` until it succeeds, fails permanently or the retry budget
    /// is spent.
    async fn retrying<T, F, Fut>(&self, subject: &str, mut fetch: F) -> Result<T, Exhausted>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut attempt = 0;
        loop {
            match fetch().await {
                Ok(value) => return Ok(value),
                Err(error) if self.retry.should_retry(&error, attempt) => {
                    let delay = self.retry.delay_for(&error, attempt);
                    tracing::warn!(
                        subject,
                        attempt = attempt + 1,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        code = error.code(),
                        "retrying fetch"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    return Err(Exhausted {
                        error,
                        attempts: attempt + 1,
                    })
                }
            }
        }
    }

    async fn quote_page(&self, symbol: &Symbol) -> Result<DisplayPayload, OrchestratorError> {
        let (quote, news) = tokio::join!(
            self.retrying(symbol.as_str(), || self.gateway.quote(symbol)),
            self.gateway.news(Some(symbol), QUOTE_HEADLINES),
        );
        let quote = quote.map_err(|exhausted| exhausted.into_error(symbol.as_str()))?;

        let headlines = match news {
            Ok(articles) => articles
                .into_iter()
                .take(QUOTE_HEADLINES)
                .map(|article| Headline {
                    title: article.title,
                    site: article.site,
                    published_at: article.published_at,
                })
                .collect(),
            Err(error) => {
                tracing::warn!(symbol = %symbol, code = error.code(), "headlines unavailable");
                Vec::new()
            }
        };

        Ok(DisplayPayload::Quote(quote_view(quote, headlines)))
    }

    async fn chart_page(
        &self,
        symbol: &Symbol,
        period: ChartPeriod,
    ) -> Result<DisplayPayload, OrchestratorError> {
        let series = self
            .retrying(symbol.as_str(), || self.gateway.series(symbol, period))
            .await
            .map_err(|exhausted| exhausted.into_error(format!("{symbol} {period}")))?;

        let chart = self
            .renderer
            .render(&series, self.chart_width, self.chart_height);
        let bars = series.bars();
        let first_close = series.first().close;
        let last_close = series.last().close;
        let high = bars.iter().map(|bar| bar.high).max().unwrap_or(last_close);
        let low = bars.iter().map(|bar| bar.low).min().unwrap_or(last_close);

        Ok(DisplayPayload::Chart(ChartView {
            symbol: symbol.clone(),
            period,
            bars: series.len(),
            first_close: currency::localize(symbol, first_close),
            last_close: currency::localize(symbol, last_close),
            high: currency::localize(symbol, high),
            low: currency::localize(symbol, low),
            change_percent: percent_change(first_close, last_close),
            chart,
        }))
    }

    async fn profile_page(&self, symbol: &Symbol) -> Result<DisplayPayload, OrchestratorError> {
        let profile = self
            .retrying(symbol.as_str(), || self.gateway.profile(symbol))
            .await
            .map_err(|exhausted| exhausted.into_error(symbol.as_str()))?;
        let market_cap = profile
            .market_cap
            .map(|cap| currency::localize_compact(symbol, cap));

        Ok(DisplayPayload::Fundamentals(ProfileView {
            profile,
            market_cap,
        }))
    }

    async fn financials_page(&self, symbol: &Symbol) -> Result<DisplayPayload, OrchestratorError> {
        let (quote, ratios) = tokio::join!(
            self.retrying(symbol.as_str(), || self.gateway.quote(symbol)),
            self.retrying(symbol.as_str(), || self.gateway.ratios(symbol)),
        );
        let quote = quote.map_err(|exhausted| exhausted.into_error(symbol.as_str()))?;
        let ratios = ratios.map_err(|exhausted| exhausted.into_error(format!("{symbol} ratios")))?;

        let market_cap = ratios
            .market_cap
            .or(quote.market_cap)
            .map(|cap| currency::localize_compact(symbol, cap));
        let enterprise_value = ratios
            .enterprise_value
            .map(|value| currency::localize_compact(symbol, value));

        Ok(DisplayPayload::Financials(FinancialsView {
            quote: quote_line(quote),
            ratios,
            market_cap,
            enterprise_value,
        }))
    }

    async fn statement_page(&self, req: &StatementRequest) -> Result<DisplayPayload, OrchestratorError> {
        let statement = self
            .retrying(req.symbol.as_str(), || self.gateway.statement(req))
            .await
            .map_err(|exhausted| {
                exhausted.into_error(format!("{} {}", req.symbol, req.kind.title().to_lowercase()))
            })?;

        let columns = statement
            .periods
            .iter()
            .map(|period| period.label.clone())
            .collect();

        // line labels in first-seen order; a period missing a line shows a gap
        let mut labels: Vec<&str> = Vec::new();
        for line in statement.periods.iter().flat_map(|period| &period.lines) {
            if !labels.contains(&line.label.as_str()) {
                labels.push(&line.label);
            }
        }
        let rows = labels
            .iter()
            .map(|label| StatementRow {
                label: (*label).to_owned(),
                values: statement
                    .periods
                    .iter()
                    .map(|period| {
                        period
                            .lines
                            .iter()
                            .find(|line| line.label == *label)
                            .and_then(|line| line.value)
                            .map(|value| currency::localize_compact(&req.symbol, value))
                    })
                    .collect(),
            })
            .collect();

        Ok(DisplayPayload::Statement(StatementView {
            kind: statement.kind,
            symbol: statement.symbol.clone(),
            quarterly: statement.quarterly,
            columns,
            rows,
        }))
    }

    async fn basket_page(
        &self,
        title: &str,
        entries: &[BasketEntry],
    ) -> Result<BasketView, OrchestratorError> {
        let results = futures::future::join_all(entries.iter().map(|entry| {
            let symbol = &entry.symbol;
            self.retrying(symbol.as_str(), move || self.gateway.quote(symbol))
        }))
        .await;

        let mut rows = Vec::with_capacity(entries.len());
        let mut first_failure = None;
        for (entry, result) in entries.iter().zip(results) {
            let outcome = match result {
                Ok(quote) => EntryOutcome::Resolved(quote_line(quote)),
                Err(exhausted) => {
                    let outcome = EntryOutcome::from_result(Err(exhausted.error.clone()));
                    first_failure.get_or_insert(exhausted);
                    outcome
                }
            };
            rows.push(BasketRow {
                symbol: entry.symbol.clone(),
                label: entry.label.clone(),
                outcome,
            });
        }

        if let Some(exhausted) = all_failed(&rows, |row| row.outcome.is_resolved(), first_failure) {
            return Err(exhausted.into_error(title));
        }

        Ok(BasketView {
            title: title.to_owned(),
            rows,
        })
    }

    async fn yield_page(&self) -> Result<DisplayPayload, OrchestratorError> {
        let curve = self
            .retrying("treasury yields", || self.gateway.yield_curve())
            .await
            .map_err(|exhausted| exhausted.into_error("treasury yields"))?;

        let rows = curve
            .points
            .iter()
            .map(|point| YieldRow {
                maturity: point.maturity.clone(),
                rate: point.rate,
                previous: point.previous,
                change_bp: point.change_bp(),
            })
            .collect();

        Ok(DisplayPayload::Yield(YieldView {
            as_of: curve.as_of,
            rows,
        }))
    }

    async fn movers_page(&self) -> Result<DisplayPayload, OrchestratorError> {
        let quotes = self
            .retrying("market movers", || self.gateway.movers(MOVERS_LIMIT))
            .await
            .map_err(|exhausted| exhausted.into_error("market movers"))?;

        Ok(DisplayPayload::Movers(MoversView {
            quotes: quotes.into_iter().map(quote_line).collect(),
        }))
    }

    async fn econ_page(&self) -> Result<DisplayPayload, OrchestratorError> {
        let indicators = &self.baskets.indicators;
        let results = futures::future::join_all(indicators.iter().map(|indicator| {
            let series_id = indicator.series_id.as_str();
            self.retrying(series_id, move || self.gateway.economic_series(series_id))
        }))
        .await;

        let mut rows = Vec::with_capacity(indicators.len());
        let mut first_failure = None;
        for (indicator, result) in indicators.iter().zip(results) {
            let outcome = match result {
                Ok(observation) => EntryOutcome::Resolved(EconValue {
                    value: observation.value,
                    date: observation.date,
                }),
                Err(exhausted) => {
                    let outcome = EntryOutcome::from_result(Err(exhausted.error.clone()));
                    first_failure.get_or_insert(exhausted);
                    outcome
                }
            };
            rows.push(EconRow {
                series_id: indicator.series_id.clone(),
                label: indicator.label.clone(),
                unit: indicator.unit.clone(),
                outcome,
            });
        }

        if let Some(exhausted) = all_failed(&rows, |row| row.outcome.is_resolved(), first_failure) {
            return Err(exhausted.into_error("economic indicators"));
        }

        Ok(DisplayPayload::EconStats(EconView { rows }))
    }

    async fn news_page(&self, symbol: Option<Symbol>) -> Result<DisplayPayload, OrchestratorError> {
        let subject = symbol
            .as_ref()
            .map_or_else(|| String::from("market news"), |symbol| format!("{symbol} news"));
        let articles = self
            .retrying(&subject, || self.gateway.news(symbol.as_ref(), NEWS_LIMIT))
            .await
            .map_err(|exhausted| exhausted.into_error(subject.as_str()))?;

        Ok(DisplayPayload::News(NewsView { symbol, articles }))
    }

    async fn watchlist_page(
        &self,
        name: Option<WatchlistName>,
    ) -> Result<DisplayPayload, OrchestratorError> {
        let name = name.unwrap_or_else(WatchlistName::default_list);
        let watchlist = self.watchlists.get(&name).await?;
        let available = self
            .watchlists
            .list()
            .await
            .into_iter()
            .map(|list| list.name)
            .collect();

        let results = futures::future::join_all(
            watchlist
                .symbols
                .iter()
                .map(|symbol| self.retrying(symbol.as_str(), move || self.gateway.quote(symbol))),
        )
        .await;

        let mut rows = Vec::with_capacity(watchlist.symbols.len());
        let mut first_failure = None;
        for (symbol, result) in watchlist.symbols.iter().zip(results) {
            let outcome = match result {
                Ok(quote) => EntryOutcome::Resolved(quote_line(quote)),
                Err(exhausted) => {
                    let outcome = EntryOutcome::from_result(Err(exhausted.error.clone()));
                    first_failure.get_or_insert(exhausted);
                    outcome
                }
            };
            rows.push(WatchlistRow {
                symbol: symbol.clone(),
                outcome,
            });
        }

        if let Some(exhausted) = all_failed(&rows, |row| row.outcome.is_resolved(), first_failure) {
            return Err(exhausted.into_error(format!("watchlist '{name}'")));
        }

        Ok(DisplayPayload::Watchlist(WatchlistView {
            name,
            rows,
            available,
        }))
    }
}

/// Returns the first failure when `rows` is non-empty and none resolved.
fn all_failed<R>(
    rows: &[R],
    resolved: impl Fn(&R) -> bool,
    first_failure: Option<Exhausted>,
) -> Option<Exhausted> {
    if rows.is_empty() || rows.iter().any(resolved) {
        return None;
    }
    first_failure
}

fn quote_line(quote: Quote) -> QuoteLine {
    QuoteLine {
        price: currency::localize(&quote.symbol, quote.price),
        change: currency::localize(&quote.symbol, quote.change),
        symbol: quote.symbol,
        name: quote.name,
        change_percent: quote.change_percent,
    }
}

fn quote_view(quote: Quote, headlines: Vec<Headline>) -> QuoteView {
    let symbol = &quote.symbol;
    let resolution = currency::resolve(symbol);
    let localize = |amount: Decimal| -> LocalizedAmount { currency::localize(symbol, amount) };

    QuoteView {
        name: quote.name.clone(),
        currency: resolution.currency.code,
        currency_recognized: resolution.recognized,
        price: localize(quote.price),
        change: localize(quote.change),
        change_percent: quote.change_percent,
        day_low: quote.day_low.map(localize),
        day_high: quote.day_high.map(localize),
        volume: quote.volume,
        market_cap: quote
            .market_cap
            .map(|cap| currency::localize_compact(symbol, cap)),
        exchange: quote.exchange.clone(),
        as_of: quote.as_of,
        headlines,
        symbol: symbol.clone(),
    }
}

fn percent_change(from: Decimal, to: Decimal) -> Decimal {
    if from.is_zero() {
        return Decimal::ZERO;
    }
    ((to - from) / from * Decimal::ONE_HUNDRED).round_dp(2)
}
