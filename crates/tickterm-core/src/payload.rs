//! Display payloads handed to the UI layer.
//!
//! Payloads carry resolved, currency-localized values or per-entry error
//! markers. They never carry a raw error object.

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::chart::RenderedChart;
use crate::command::VerbSpec;
use crate::currency::LocalizedAmount;
use crate::data_source::FetchError;
use crate::{
    ChartPeriod, CompanyProfile, FinancialRatios, NewsArticle, SearchHit, StatementKind, Symbol,
    UtcDateTime, WatchlistName,
};

/// Screen area a payload renders into; the UI keeps the newest per region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayRegion {
    Quote,
    Chart,
    Content,
    Watchlist,
}

impl DisplayRegion {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::Chart => "chart",
            Self::Content => "content",
            Self::Watchlist => "watchlist",
        }
    }
}

/// Result of one sub-fetch inside a multi-entry payload.
///
/// Rows nest it under `outcome` so entry fields never collide with row keys.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntryOutcome<T> {
    Resolved(T),
    Failed { reason: String, code: String },
}

impl<T> EntryOutcome<T> {
    pub fn from_result(result: Result<T, FetchError>) -> Self {
        match result {
            Ok(value) => Self::Resolved(value),
            Err(error) => Self::Failed {
                reason: error.message().to_owned(),
                code: error.code().to_owned(),
            },
        }
    }

    pub const fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    pub fn resolved(&self) -> Option<&T> {
        match self {
            Self::Resolved(value) => Some(value),
            Self::Failed { .. } => None,
        }
    }
}

/// Compact quote row used by baskets, movers and watchlists.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoteLine {
    pub symbol: Symbol,
    pub name: Option<String>,
    pub price: LocalizedAmount,
    pub change: LocalizedAmount,
    pub change_percent: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Headline {
    pub title: String,
    pub site: Option<String>,
    pub published_at: UtcDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoteView {
    pub symbol: Symbol,
    pub name: Option<String>,
    pub currency: &'static str,
    /// False when the symbol's exchange suffix is unknown and USD was assumed.
    pub currency_recognized: bool,
    pub price: LocalizedAmount,
    pub change: LocalizedAmount,
    pub change_percent: Decimal,
    pub day_low: Option<LocalizedAmount>,
    pub day_high: Option<LocalizedAmount>,
    pub volume: Option<u64>,
    pub market_cap: Option<LocalizedAmount>,
    pub exchange: Option<String>,
    pub as_of: UtcDateTime,
    pub headlines: Vec<Headline>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartView {
    pub symbol: Symbol,
    pub period: ChartPeriod,
    pub bars: usize,
    pub first_close: LocalizedAmount,
    pub last_close: LocalizedAmount,
    pub high: LocalizedAmount,
    pub low: LocalizedAmount,
    pub change_percent: Decimal,
    pub chart: RenderedChart,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileView {
    pub profile: CompanyProfile,
    pub market_cap: Option<LocalizedAmount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialsView {
    pub quote: QuoteLine,
    pub ratios: FinancialRatios,
    pub market_cap: Option<LocalizedAmount>,
    pub enterprise_value: Option<LocalizedAmount>,
}

/// One statement line across all reported periods.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementRow {
    pub label: String,
    pub values: Vec<Option<LocalizedAmount>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementView {
    pub kind: StatementKind,
    pub symbol: Symbol,
    pub quarterly: bool,
    pub columns: Vec<String>,
    pub rows: Vec<StatementRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BasketRow {
    pub symbol: Symbol,
    pub label: String,
    pub outcome: EntryOutcome<QuoteLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BasketView {
    pub title: String,
    pub rows: Vec<BasketRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YieldRow {
    pub maturity: String,
    pub rate: Decimal,
    pub previous: Option<Decimal>,
    pub change_bp: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YieldView {
    pub as_of: String,
    pub rows: Vec<YieldRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoversView {
    pub quotes: Vec<QuoteLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EconValue {
    pub value: Option<Decimal>,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EconRow {
    pub series_id: String,
    pub label: String,
    pub unit: String,
    pub outcome: EntryOutcome<EconValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EconView {
    pub rows: Vec<EconRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewsView {
    pub symbol: Option<Symbol>,
    pub articles: Vec<NewsArticle>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatchlistRow {
    pub symbol: Symbol,
    pub outcome: EntryOutcome<QuoteLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatchlistView {
    pub name: WatchlistName,
    pub rows: Vec<WatchlistRow>,
    /// Names of every stored watchlist, default first.
    pub available: Vec<WatchlistName>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchView {
    pub query: String,
    pub hits: Vec<SearchHit>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HelpView {
    pub verbs: Vec<VerbSpec>,
}

/// Tagged payload, one variant per request family.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DisplayPayload {
    Quote(QuoteView),
    Chart(ChartView),
    Fundamentals(ProfileView),
    Financials(FinancialsView),
    Statement(StatementView),
    Index(BasketView),
    Forex(BasketView),
    Yield(YieldView),
    Movers(MoversView),
    EconStats(EconView),
    News(NewsView),
    Watchlist(WatchlistView),
    /// Confirmation of a watchlist mutation.
    Notice { message: String },
    Search(SearchView),
    Help(HelpView),
}

/// Payload plus the metadata the UI needs for last-write-wins.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayEnvelope {
    pub request_id: Uuid,
    pub region: DisplayRegion,
    pub verb: &'static str,
    pub generated_at: UtcDateTime,
    pub elapsed_ms: u64,
    pub payload: DisplayPayload,
}

impl DisplayEnvelope {
    pub fn new(
        region: DisplayRegion,
        verb: &'static str,
        elapsed_ms: u64,
        payload: DisplayPayload,
    ) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            region,
            verb,
            generated_at: UtcDateTime::now(),
            elapsed_ms,
            payload,
        }
    }
}
