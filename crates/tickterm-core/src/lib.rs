//! # tickterm core
//!
//! Command dispatch and live market-data orchestration for the `tickterm`
//! terminal dashboard.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`command`] | Verb table, tokenizer and request parser |
//! | [`orchestrator`] | Fan-out, retry and payload assembly |
//! | [`gateway`] | Cached, single-flight access to data sources |
//! | [`routing`] | Endpoint to provider selection |
//! | [`adapters`] | FMP, FRED and offline mock providers |
//! | [`watchlist`] | Durable named watchlists |
//! | [`currency`] | Suffix-based currency resolution and formatting |
//! | [`chart`] | ASCII price charts |
//! | [`payload`] | Display payloads for the UI layer |
//! | [`config`] | Environment settings and basket definitions |
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  input line     │
//! └────────┬────────┘
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Command parser  │────▶│ Orchestrator     │──▶ Watchlist store
//! └─────────────────┘     └────────┬─────────┘──▶ Currency / Chart
//!                                  ▼
//!                         ┌──────────────────┐
//!                         │ Gateway (cache,  │
//!                         │ single-flight)   │
//!                         └────────┬─────────┘
//!                                  ▼
//!                         ┌──────────────────┐     ┌─────────────────┐
//!                         │ Source router    │────▶│ Throttle        │
//!                         └────────┬─────────┘     └─────────────────┘
//!                                  ▼
//!                         ┌──────────────────┐     ┌─────────────────┐
//!                         │ DataSource       │────▶│ Circuit breaker │
//!                         │ (FMP/FRED/Mock)  │     │ + HTTP client   │
//!                         └──────────────────┘     └─────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use tickterm_core::{Orchestrator, Settings};
//!
//! let settings = Settings::from_env().with_mock_mode(true);
//! let orchestrator = Orchestrator::from_settings(&settings).await;
//! let envelope = orchestrator.execute("Q AAPL").await?;
//! ```
//!
//! API keys are read from the environment only and never logged.

pub mod adapters;
pub mod cache;
pub mod chart;
pub mod circuit_breaker;
pub mod command;
pub mod config;
pub mod currency;
pub mod data_source;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod http_client;
pub mod orchestrator;
pub mod payload;
pub mod provider_policy;
pub mod retry;
pub mod routing;
pub mod source;
pub mod throttling;
pub mod watchlist;

pub use adapters::{FmpAdapter, FredAdapter, MockSource};
pub use cache::{CacheKey, CacheStore, CacheTtls};
pub use chart::{ChartRenderer, RenderedChart};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use command::{Command, ParseError, ParsedRequest, VerbSpec, VERBS};
pub use config::{BasketConfig, BasketEntry, Indicator, Settings};
pub use currency::LocalizedAmount;
pub use data_source::{
    CapabilitySet, DataSource, Endpoint, FetchError, FetchErrorKind, SourceFuture,
    StatementRequest,
};
pub use domain::{
    ChartPeriod, CompanyProfile, EconomicObservation, FinancialRatios, FinancialStatement,
    NewsArticle, PriceBar, PriceSeries, Quote, SearchHit, StatementKind, StatementLine,
    StatementPeriod, Symbol, UtcDateTime, WatchlistName, YieldCurve, YieldPoint,
};
pub use error::ValidationError;
pub use gateway::MarketDataGateway;
pub use http_client::{HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient};
pub use orchestrator::{Orchestrator, OrchestratorError};
pub use payload::{DisplayEnvelope, DisplayPayload, DisplayRegion, EntryOutcome};
pub use provider_policy::ProviderPolicy;
pub use retry::{Backoff, RetryConfig};
pub use routing::{SourceRouter, SourceRouterBuilder};
pub use source::ProviderId;
pub use throttling::ThrottlingQueue;
pub use watchlist::{StoreError, Watchlist, WatchlistStore};
