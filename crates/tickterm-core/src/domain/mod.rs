//! # Domain Models
//!
//! Canonical types shared by the gateway, the renderers and the orchestrator.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Symbol`] | Normalized ticker, index or pair symbol |
//! | [`WatchlistName`] | Lowercase watchlist identifier |
//! | [`ChartPeriod`] | Chart look-back window (1D .. 5Y) |
//! | [`Quote`] | Latest price with change and currency |
//! | [`PriceSeries`] | Ordered, non-empty OHLCV history |
//! | [`FinancialStatement`] | Income, balance or cash-flow statement |
//! | [`YieldCurve`] | Treasury yields by maturity |
//! | [`UtcDateTime`] | UTC timestamp |
//!
//! Monetary values are [`rust_decimal::Decimal`]; ratios stay `f64`.

mod models;
mod period;
mod symbol;
mod timestamp;
mod watchlist_name;

pub use models::{
    CompanyProfile, EconomicObservation, FinancialRatios, FinancialStatement, NewsArticle,
    PriceBar, PriceSeries, Quote, SearchHit, StatementKind, StatementLine, StatementPeriod,
    YieldCurve, YieldPoint,
};
pub use period::ChartPeriod;
pub use symbol::Symbol;
pub use timestamp::UtcDateTime;
pub use watchlist_name::WatchlistName;
