//! Data source trait and fetch error contract.
//!
//! Every provider adapter implements [`DataSource`]. Methods return boxed
//! futures so adapters can be stored as `Arc<dyn DataSource>` and routed by
//! [`Endpoint`].
//!
//! # Endpoints
//!
//! | Endpoint | Method | Response |
//! |----------|--------|----------|
//! | Quote | [`DataSource::quote`] | [`Quote`] |
//! | Series | [`DataSource::series`] | `Vec<`[`PriceBar`]`>` |
//! | Statement | [`DataSource::statement`] | [`FinancialStatement`] |
//! | Profile | [`DataSource::profile`] | [`CompanyProfile`] |
//! | Ratios | [`DataSource::ratios`] | [`FinancialRatios`] |
//! | News | [`DataSource::news`] | `Vec<`[`NewsArticle`]`>` |
//! | Search | [`DataSource::search`] | `Vec<`[`SearchHit`]`>` |
//! | Movers | [`DataSource::movers`] | `Vec<`[`Quote`]`>` |
//! | Yields | [`DataSource::yield_curve`] | [`YieldCurve`] |
//! | Economic | [`DataSource::economic_series`] | [`EconomicObservation`] |
//!
//! # Errors
//!
//! Adapters classify every failure into one of four [`FetchErrorKind`]s.
//! `RateLimited` and `Unavailable` are retryable; `NotFound` and `InvalidKey`
//! are not.

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    ChartPeriod, CompanyProfile, EconomicObservation, FinancialRatios, FinancialStatement,
    NewsArticle, PriceBar, ProviderId, Quote, SearchHit, StatementKind, Symbol, YieldCurve,
};

/// Data endpoint type used for routing, caching and capability checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    Quote,
    Series,
    Statement,
    Profile,
    Ratios,
    News,
    Search,
    Movers,
    Yields,
    Economic,
}

impl Endpoint {
    pub const ALL: [Self; 10] = [
        Self::Quote,
        Self::Series,
        Self::Statement,
        Self::Profile,
        Self::Ratios,
        Self::News,
        Self::Search,
        Self::Movers,
        Self::Yields,
        Self::Economic,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::Series => "series",
            Self::Statement => "statement",
            Self::Profile => "profile",
            Self::Ratios => "ratios",
            Self::News => "news",
            Self::Search => "search",
            Self::Movers => "movers",
            Self::Yields => "yields",
            Self::Economic => "economic",
        }
    }

    const fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supported endpoint matrix for a data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilitySet {
    mask: u16,
}

impl CapabilitySet {
    pub const fn none() -> Self {
        Self { mask: 0 }
    }

    pub const fn full() -> Self {
        Self::only(&Endpoint::ALL)
    }

    pub const fn only(endpoints: &[Endpoint]) -> Self {
        let mut mask = 0;
        let mut index = 0;
        while index < endpoints.len() {
            mask |= endpoints[index].bit();
            index += 1;
        }
        Self { mask }
    }

    pub const fn without(self, endpoint: Endpoint) -> Self {
        Self {
            mask: self.mask & !endpoint.bit(),
        }
    }

    pub const fn supports(self, endpoint: Endpoint) -> bool {
        self.mask & endpoint.bit() != 0
    }

    pub fn supported_endpoints(self) -> Vec<&'static str> {
        Endpoint::ALL
            .into_iter()
            .filter(|endpoint| self.supports(*endpoint))
            .map(Endpoint::as_str)
            .collect()
    }
}

/// Gateway-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    /// The symbol or query has no data.
    NotFound,
    /// Provider backpressure or an exhausted local quota.
    RateLimited,
    /// Transient network or provider failure, including timeouts.
    Unavailable,
    /// Missing or rejected credentials.
    InvalidKey,
}

/// Structured fetch error shared by adapters, the gateway and single-flight waiters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    kind: FetchErrorKind,
    message: String,
    retry_after: Option<Duration>,
}

impl FetchError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::NotFound, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::RateLimited, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Unavailable, message)
    }

    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::InvalidKey, message)
    }

    /// Error for an endpoint the provider does not implement.
    pub fn unsupported(provider: ProviderId, endpoint: Endpoint) -> Self {
        Self::unavailable(format!(
            "endpoint '{endpoint}' is not supported by source '{provider}'"
        ))
    }

    fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after: None,
        }
    }

    /// Attaches a provider-suggested delay before the next attempt.
    pub fn with_retry_after(mut self, delay: Duration) -> Self {
        self.retry_after = Some(delay);
        self
    }

    pub const fn kind(&self) -> FetchErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    pub const fn retryable(&self) -> bool {
        matches!(
            self.kind,
            FetchErrorKind::RateLimited | FetchErrorKind::Unavailable
        )
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            FetchErrorKind::NotFound => "fetch.not_found",
            FetchErrorKind::RateLimited => "fetch.rate_limited",
            FetchErrorKind::Unavailable => "fetch.unavailable",
            FetchErrorKind::InvalidKey => "fetch.invalid_key",
        }
    }
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for FetchError {}

/// Request payload for statement endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatementRequest {
    pub kind: StatementKind,
    pub symbol: Symbol,
    pub years: u32,
    pub quarterly: bool,
}

impl StatementRequest {
    /// Number of periods to request: one per year, or four per year when quarterly.
    pub const fn period_limit(&self) -> u32 {
        if self.quarterly {
            self.years * 4
        } else {
            self.years
        }
    }
}

pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, FetchError>> + Send + 'a>>;

fn unsupported<'a, T: Send + 'a>(provider: ProviderId, endpoint: Endpoint) -> SourceFuture<'a, T> {
    Box::pin(async move { Err(FetchError::unsupported(provider, endpoint)) })
}

/// Source adapter contract.
///
/// Adapters advertise what they implement through
/// [`capabilities`](DataSource::capabilities); the router never calls a
/// method outside that set, and the default bodies report the endpoint as
/// unsupported.
///
/// Implementations must be `Send + Sync`; the gateway shares them across
/// concurrent dispatches.
pub trait DataSource: Send + Sync {
    fn id(&self) -> ProviderId;

    fn capabilities(&self) -> CapabilitySet;

    fn quote<'a>(&'a self, symbol: &'a Symbol) -> SourceFuture<'a, Quote> {
        let _ = symbol;
        unsupported(self.id(), Endpoint::Quote)
    }

    /// Daily bars covering `period`. Ordering is not required; the gateway
    /// normalizes.
    fn series<'a>(&'a self, symbol: &'a Symbol, period: ChartPeriod) -> SourceFuture<'a, Vec<PriceBar>> {
        let _ = (symbol, period);
        unsupported(self.id(), Endpoint::Series)
    }

    fn statement<'a>(&'a self, req: &'a StatementRequest) -> SourceFuture<'a, FinancialStatement> {
        let _ = req;
        unsupported(self.id(), Endpoint::Statement)
    }

    fn profile<'a>(&'a self, symbol: &'a Symbol) -> SourceFuture<'a, CompanyProfile> {
        let _ = symbol;
        unsupported(self.id(), Endpoint::Profile)
    }

    fn ratios<'a>(&'a self, symbol: &'a Symbol) -> SourceFuture<'a, FinancialRatios> {
        let _ = symbol;
        unsupported(self.id(), Endpoint::Ratios)
    }

    /// Headlines for `symbol`, or market-wide headlines when `None`.
    fn news<'a>(&'a self, symbol: Option<&'a Symbol>, limit: usize) -> SourceFuture<'a, Vec<NewsArticle>> {
        let _ = (symbol, limit);
        unsupported(self.id(), Endpoint::News)
    }

    fn search<'a>(&'a self, query: &'a str, limit: usize) -> SourceFuture<'a, Vec<SearchHit>> {
        let _ = (query, limit);
        unsupported(self.id(), Endpoint::Search)
    }

    fn movers<'a>(&'a self, limit: usize) -> SourceFuture<'a, Vec<Quote>> {
        let _ = limit;
        unsupported(self.id(), Endpoint::Movers)
    }

    fn yield_curve<'a>(&'a self) -> SourceFuture<'a, YieldCurve> {
        unsupported(self.id(), Endpoint::Yields)
    }

    fn economic_series<'a>(&'a self, series_id: &'a str) -> SourceFuture<'a, EconomicObservation> {
        let _ = series_id;
        unsupported(self.id(), Endpoint::Economic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_set_tracks_individual_endpoints() {
        let caps = CapabilitySet::only(&[Endpoint::Quote, Endpoint::Economic]);
        assert!(caps.supports(Endpoint::Quote));
        assert!(caps.supports(Endpoint::Economic));
        assert!(!caps.supports(Endpoint::Series));
        assert_eq!(caps.supported_endpoints(), vec!["quote", "economic"]);

        let full = CapabilitySet::full().without(Endpoint::Economic);
        assert!(full.supports(Endpoint::Yields));
        assert!(!full.supports(Endpoint::Economic));
    }

    #[test]
    fn only_transient_kinds_are_retryable() {
        assert!(FetchError::rate_limited("slow down").retryable());
        assert!(FetchError::unavailable("timeout").retryable());
        assert!(!FetchError::not_found("no data").retryable());
        assert!(!FetchError::invalid_key("bad key").retryable());
    }

    #[test]
    fn error_codes_are_stable() {
        let error = FetchError::rate_limited("quota").with_retry_after(Duration::from_secs(2));
        assert_eq!(error.code(), "fetch.rate_limited");
        assert_eq!(error.retry_after(), Some(Duration::from_secs(2)));
        assert_eq!(error.to_string(), "quota (fetch.rate_limited)");
    }

    #[test]
    fn quarterly_statements_request_four_periods_per_year() {
        let req = StatementRequest {
            kind: StatementKind::Income,
            symbol: Symbol::parse("AAPL").expect("valid"),
            years: 3,
            quarterly: true,
        };
        assert_eq!(req.period_limit(), 12);
    }
}
