use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::adapters::{decimal_value, non_empty, parse_json, send};
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::currency;
use crate::data_source::{
    CapabilitySet, DataSource, Endpoint, FetchError, SourceFuture, StatementRequest,
};
use crate::http_client::{HttpClient, HttpRequest};
use crate::{
    ChartPeriod, CompanyProfile, FinancialRatios, FinancialStatement, NewsArticle, PriceBar,
    ProviderId, Quote, SearchHit, StatementKind, StatementLine, StatementPeriod, Symbol,
    UtcDateTime, YieldCurve, YieldPoint,
};

const DEFAULT_BASE_URL: &str = "https://financialmodelingprep.com/stable";

/// Shortest look-back requested for a series, so a weekend still has bars.
const MIN_SERIES_LOOKBACK_DAYS: i64 = 5;

pub(crate) const INCOME_LINES: &[(&str, &str)] = &[
    ("revenue", "Revenue"),
    ("costOfRevenue", "Cost of Revenue"),
    ("grossProfit", "Gross Profit"),
    ("operatingExpenses", "Operating Expenses"),
    ("operatingIncome", "Operating Income"),
    ("incomeBeforeTax", "Pre-Tax Income"),
    ("netIncome", "Net Income"),
    ("eps", "EPS"),
    ("epsDiluted", "EPS (Diluted)"),
    ("ebitda", "EBITDA"),
];

pub(crate) const BALANCE_LINES: &[(&str, &str)] = &[
    ("totalAssets", "Total Assets"),
    ("totalCurrentAssets", "Current Assets"),
    ("cashAndCashEquivalents", "Cash & Equivalents"),
    ("netReceivables", "Receivables"),
    ("inventory", "Inventory"),
    ("totalLiabilities", "Total Liabilities"),
    ("totalCurrentLiabilities", "Current Liabilities"),
    ("longTermDebt", "Long-Term Debt"),
    ("totalDebt", "Total Debt"),
    ("netDebt", "Net Debt"),
    ("totalStockholdersEquity", "Shareholders' Equity"),
    ("retainedEarnings", "Retained Earnings"),
];

pub(crate) const CASH_FLOW_LINES: &[(&str, &str)] = &[
    ("netIncome", "Net Income"),
    ("depreciationAndAmortization", "D&A"),
    ("stockBasedCompensation", "Stock Compensation"),
    ("operatingCashFlow", "Operating Cash Flow"),
    ("capitalExpenditure", "Capital Expenditure"),
    ("freeCashFlow", "Free Cash Flow"),
    ("netCashProvidedByInvestingActivities", "Investing Cash Flow"),
    ("netCashProvidedByFinancingActivities", "Financing Cash Flow"),
    ("netChangeInCash", "Net Change in Cash"),
];

pub(crate) const fn statement_lines(
    kind: StatementKind,
) -> &'static [(&'static str, &'static str)] {
    match kind {
        StatementKind::Income => INCOME_LINES,
        StatementKind::Balance => BALANCE_LINES,
        StatementKind::CashFlow => CASH_FLOW_LINES,
    }
}

const MATURITIES: &[(&str, &str)] = &[
    ("month1", "1M"),
    ("month2", "2M"),
    ("month3", "3M"),
    ("month6", "6M"),
    ("year1", "1Y"),
    ("year2", "2Y"),
    ("year3", "3Y"),
    ("year5", "5Y"),
    ("year7", "7Y"),
    ("year10", "10Y"),
    ("year20", "20Y"),
    ("year30", "30Y"),
];

/// Financial Modeling Prep adapter (stable API).
///
/// Serves every endpoint except economic series.
#[derive(Clone)]
pub struct FmpAdapter {
    http_client: Arc<dyn HttpClient>,
    api_key: String,
    base_url: String,
    timeout: Duration,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl FmpAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>, api_key: impl Into<String>) -> Self {
        Self {
            http_client,
            api_key: api_key.into(),
            base_url: String::from(DEFAULT_BASE_URL),
            timeout: Duration::from_secs(10),
            circuit_breaker: Arc::new(CircuitBreaker::new(
                ProviderId::Fmp,
                CircuitBreakerConfig::default(),
            )),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_circuit_breaker(mut self, circuit_breaker: Arc<CircuitBreaker>) -> Self {
        self.circuit_breaker = circuit_breaker;
        self
    }

    fn request(&self, path: &str) -> HttpRequest {
        HttpRequest::get(format!("{}{}", self.base_url, path)).with_timeout(self.timeout)
    }

    async fn get_json<T: DeserializeOwned>(&self, request: HttpRequest) -> Result<T, FetchError> {
        let request = request.with_query("apikey", &self.api_key);
        let body = send(
            ProviderId::Fmp,
            self.http_client.as_ref(),
            &self.circuit_breaker,
            request,
        )
        .await?;

        if let Ok(FmpErrorBody { message }) = serde_json::from_str::<FmpErrorBody>(&body) {
            return Err(classify_error_message(&message));
        }
        parse_json(ProviderId::Fmp, &body)
    }

    async fn first_row<T: DeserializeOwned>(
        &self,
        request: HttpRequest,
        subject: &str,
    ) -> Result<T, FetchError> {
        let rows: Vec<T> = self.get_json(request).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| FetchError::not_found(format!("no data for {subject}")))
    }

    async fn fetch_quote(&self, symbol: &Symbol) -> Result<Quote, FetchError> {
        let row: FmpQuote = self
            .first_row(
                self.request("/quote").with_query("symbol", symbol),
                symbol.as_str(),
            )
            .await?;
        row.into_quote(symbol.clone())
            .ok_or_else(|| FetchError::not_found(format!("no price for {symbol}")))
    }

    async fn fetch_series(
        &self,
        symbol: &Symbol,
        period: ChartPeriod,
    ) -> Result<Vec<PriceBar>, FetchError> {
        let to = UtcDateTime::now().date();
        let lookback = time::Duration::days(period.days().max(MIN_SERIES_LOOKBACK_DAYS));
        let from = to.checked_sub(lookback).unwrap_or(to);

        let history: FmpHistory = self
            .get_json(
                self.request("/historical-price-eod/full")
                    .with_query("symbol", symbol)
                    .with_query("from", from)
                    .with_query("to", to),
            )
            .await?;

        let mut bars: Vec<PriceBar> = history
            .into_rows()
            .into_iter()
            .filter_map(FmpBar::into_bar)
            .collect();
        if period == ChartPeriod::OneDay && bars.len() > 2 {
            bars.sort_by_key(|bar| bar.ts);
            bars = bars.split_off(bars.len() - 2);
        }
        Ok(bars)
    }

    async fn fetch_statement(
        &self,
        req: &StatementRequest,
    ) -> Result<FinancialStatement, FetchError> {
        let path = match req.kind {
            StatementKind::Income => "/income-statement",
            StatementKind::Balance => "/balance-sheet-statement",
            StatementKind::CashFlow => "/cash-flow-statement",
        };
        let rows: Vec<Map<String, Value>> = self
            .get_json(
                self.request(path)
                    .with_query("symbol", &req.symbol)
                    .with_query("limit", req.period_limit())
                    .with_query("period", if req.quarterly { "quarter" } else { "annual" }),
            )
            .await?;

        Ok(FinancialStatement {
            kind: req.kind,
            symbol: req.symbol.clone(),
            quarterly: req.quarterly,
            periods: rows
                .iter()
                .map(|row| statement_period(row, statement_lines(req.kind)))
                .collect(),
        })
    }

    async fn fetch_profile(&self, symbol: &Symbol) -> Result<CompanyProfile, FetchError> {
        let row: FmpProfile = self
            .first_row(
                self.request("/profile").with_query("symbol", symbol),
                symbol.as_str(),
            )
            .await?;
        Ok(row.into_profile(symbol.clone()))
    }

    async fn fetch_ratios(&self, symbol: &Symbol) -> Result<FinancialRatios, FetchError> {
        let (ratios, metrics) = futures::try_join!(
            self.first_row::<FmpRatiosTtm>(
                self.request("/ratios-ttm").with_query("symbol", symbol),
                symbol.as_str(),
            ),
            self.first_row::<FmpKeyMetricsTtm>(
                self.request("/key-metrics-ttm").with_query("symbol", symbol),
                symbol.as_str(),
            ),
        )?;

        Ok(FinancialRatios {
            gross_margin: ratios.gross_margin,
            operating_margin: ratios.operating_margin,
            net_margin: ratios.net_margin,
            return_on_equity: ratios.return_on_equity.or(metrics.return_on_equity),
            return_on_assets: ratios.return_on_assets.or(metrics.return_on_assets),
            current_ratio: ratios.current_ratio.or(metrics.current_ratio),
            quick_ratio: ratios.quick_ratio,
            pe_ratio: ratios.pe_ratio,
            price_to_book: ratios.price_to_book,
            price_to_sales: ratios.price_to_sales,
            debt_to_equity: ratios.debt_to_equity,
            dividend_yield: ratios.dividend_yield,
            payout_ratio: ratios.payout_ratio,
            market_cap: metrics.market_cap,
            enterprise_value: metrics.enterprise_value,
        })
    }

    async fn fetch_news(
        &self,
        symbol: Option<&Symbol>,
        limit: usize,
    ) -> Result<Vec<NewsArticle>, FetchError> {
        let request = match symbol {
            Some(symbol) => self.request("/news/stock").with_query("symbols", symbol),
            None => self.request("/news/stock-latest"),
        };
        let rows: Vec<FmpArticle> = self
            .get_json(request.with_query("page", 0).with_query("limit", limit))
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(FmpArticle::into_article)
            .take(limit)
            .collect())
    }

    async fn fetch_search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, FetchError> {
        let rows: Vec<FmpSearchHit> = self
            .get_json(
                self.request("/search-name")
                    .with_query("query", query)
                    .with_query("limit", limit),
            )
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| SearchHit {
                symbol: row.symbol,
                name: row.name,
                exchange: non_empty(row.exchange),
                currency: non_empty(row.currency),
            })
            .take(limit)
            .collect())
    }

    async fn fetch_movers(&self, limit: usize) -> Result<Vec<Quote>, FetchError> {
        let rows: Vec<FmpQuote> = self.get_json(self.request("/biggest-gainers")).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let symbol = Symbol::parse(&row.symbol).ok()?;
                row.into_quote(symbol)
            })
            .take(limit)
            .collect())
    }

    async fn fetch_yield_curve(&self) -> Result<YieldCurve, FetchError> {
        let rows: Vec<Map<String, Value>> =
            self.get_json(self.request("/treasury-rates")).await?;
        let mut rows = rows.into_iter();
        let current = rows
            .next()
            .ok_or_else(|| FetchError::not_found("no treasury rates published"))?;
        let previous = rows.next();

        let points = MATURITIES
            .iter()
            .filter_map(|(field, label)| {
                let rate = decimal_value(current.get(*field))?;
                Some(YieldPoint {
                    maturity: (*label).to_owned(),
                    rate,
                    previous: previous
                        .as_ref()
                        .and_then(|row| decimal_value(row.get(*field))),
                })
            })
            .collect();

        Ok(YieldCurve {
            as_of: string_field(&current, "date").unwrap_or_default(),
            points,
        })
    }
}

impl DataSource for FmpAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Fmp
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::full().without(Endpoint::Economic)
    }

    fn quote<'a>(&'a self, symbol: &'a Symbol) -> SourceFuture<'a, Quote> {
        Box::pin(self.fetch_quote(symbol))
    }

    fn series<'a>(
        &'a self,
        symbol: &'a Symbol,
        period: ChartPeriod,
    ) -> SourceFuture<'a, Vec<PriceBar>> {
        Box::pin(self.fetch_series(symbol, period))
    }

    fn statement<'a>(&'a self, req: &'a StatementRequest) -> SourceFuture<'a, FinancialStatement> {
        Box::pin(self.fetch_statement(req))
    }

    fn profile<'a>(&'a self, symbol: &'a Symbol) -> SourceFuture<'a, CompanyProfile> {
        Box::pin(self.fetch_profile(symbol))
    }

    fn ratios<'a>(&'a self, symbol: &'a Symbol) -> SourceFuture<'a, FinancialRatios> {
        Box::pin(self.fetch_ratios(symbol))
    }

    fn news<'a>(
        &'a self,
        symbol: Option<&'a Symbol>,
        limit: usize,
    ) -> SourceFuture<'a, Vec<NewsArticle>> {
        Box::pin(self.fetch_news(symbol, limit))
    }

    fn search<'a>(&'a self, query: &'a str, limit: usize) -> SourceFuture<'a, Vec<SearchHit>> {
        Box::pin(self.fetch_search(query, limit))
    }

    fn movers<'a>(&'a self, limit: usize) -> SourceFuture<'a, Vec<Quote>> {
        Box::pin(self.fetch_movers(limit))
    }

    fn yield_curve<'a>(&'a self) -> SourceFuture<'a, YieldCurve> {
        Box::pin(self.fetch_yield_curve())
    }
}

/// FMP reports some failures as `200 {"Error Message": "..."}`.
#[derive(Deserialize)]
struct FmpErrorBody {
    #[serde(rename = "Error Message")]
    message: String,
}

fn classify_error_message(message: &str) -> FetchError {
    let lowered = message.to_ascii_lowercase();
    if lowered.contains("api key") || lowered.contains("apikey") {
        FetchError::invalid_key("fmp rejected the API key")
    } else if lowered.contains("limit reach") {
        FetchError::rate_limited("fmp daily limit reached")
    } else {
        FetchError::not_found(format!("fmp: {message}"))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FmpQuote {
    symbol: String,
    #[serde(default)]
    name: Option<String>,
    price: Option<Decimal>,
    #[serde(default)]
    change: Option<Decimal>,
    #[serde(default, alias = "changesPercentage")]
    change_percentage: Option<Decimal>,
    #[serde(default)]
    day_low: Option<Decimal>,
    #[serde(default)]
    day_high: Option<Decimal>,
    #[serde(default)]
    volume: Option<f64>,
    #[serde(default)]
    market_cap: Option<Decimal>,
    #[serde(default)]
    exchange: Option<String>,
    #[serde(default)]
    timestamp: Option<i64>,
}

impl FmpQuote {
    fn into_quote(self, symbol: Symbol) -> Option<Quote> {
        let price = self.price?;
        let currency = currency::resolve(&symbol).currency.code;
        let as_of = self
            .timestamp
            .and_then(|ts| UtcDateTime::from_unix_timestamp(ts).ok())
            .unwrap_or_else(UtcDateTime::now);

        let mut quote = Quote::new(
            symbol,
            price,
            self.change.unwrap_or_default(),
            self.change_percentage.unwrap_or_default(),
            currency,
            as_of,
        );
        quote.name = non_empty(self.name);
        quote.day_low = self.day_low;
        quote.day_high = self.day_high;
        quote.volume = self.volume.filter(|v| *v >= 0.0).map(|v| v as u64);
        quote.market_cap = self.market_cap;
        quote.exchange = non_empty(self.exchange);
        Some(quote)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FmpHistory {
    Rows(Vec<FmpBar>),
    Wrapped {
        #[serde(default)]
        historical: Vec<FmpBar>,
    },
}

impl FmpHistory {
    fn into_rows(self) -> Vec<FmpBar> {
        match self {
            Self::Rows(rows) => rows,
            Self::Wrapped { historical } => historical,
        }
    }
}

#[derive(Deserialize)]
struct FmpBar {
    date: String,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    #[serde(default)]
    volume: Option<f64>,
}

impl FmpBar {
    fn into_bar(self) -> Option<PriceBar> {
        let ts = UtcDateTime::parse_lenient(&self.date).ok()?;
        Some(PriceBar {
            ts,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume.filter(|v| *v >= 0.0).map(|v| v as u64).unwrap_or(0),
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FmpProfile {
    #[serde(default)]
    company_name: Option<String>,
    #[serde(default)]
    exchange: Option<String>,
    #[serde(default)]
    sector: Option<String>,
    #[serde(default)]
    industry: Option<String>,
    #[serde(default)]
    ceo: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    website: Option<String>,
    #[serde(default)]
    full_time_employees: Option<Value>,
    #[serde(default)]
    market_cap: Option<Decimal>,
    #[serde(default)]
    description: Option<String>,
}

impl FmpProfile {
    fn into_profile(self, symbol: Symbol) -> CompanyProfile {
        let employees = match self.full_time_employees {
            Some(Value::Number(number)) => number.as_u64(),
            Some(Value::String(text)) => text.trim().replace(',', "").parse().ok(),
            _ => None,
        };

        CompanyProfile {
            name: non_empty(self.company_name).unwrap_or_else(|| symbol.to_string()),
            symbol,
            exchange: non_empty(self.exchange),
            sector: non_empty(self.sector),
            industry: non_empty(self.industry),
            ceo: non_empty(self.ceo),
            country: non_empty(self.country),
            website: non_empty(self.website),
            employees,
            market_cap: self.market_cap,
            description: non_empty(self.description),
        }
    }
}

#[derive(Deserialize)]
struct FmpRatiosTtm {
    #[serde(default, rename = "grossProfitMarginTTM")]
    gross_margin: Option<f64>,
    #[serde(default, rename = "operatingProfitMarginTTM")]
    operating_margin: Option<f64>,
    #[serde(default, rename = "netProfitMarginTTM")]
    net_margin: Option<f64>,
    #[serde(default, rename = "returnOnEquityTTM")]
    return_on_equity: Option<f64>,
    #[serde(default, rename = "returnOnAssetsTTM")]
    return_on_assets: Option<f64>,
    #[serde(default, rename = "currentRatioTTM")]
    current_ratio: Option<f64>,
    #[serde(default, rename = "quickRatioTTM")]
    quick_ratio: Option<f64>,
    #[serde(default, rename = "priceToEarningsRatioTTM")]
    pe_ratio: Option<f64>,
    #[serde(default, rename = "priceToBookRatioTTM")]
    price_to_book: Option<f64>,
    #[serde(default, rename = "priceToSalesRatioTTM")]
    price_to_sales: Option<f64>,
    #[serde(default, rename = "debtToEquityRatioTTM", alias = "debtEquityRatioTTM")]
    debt_to_equity: Option<f64>,
    #[serde(default, rename = "dividendYieldTTM")]
    dividend_yield: Option<f64>,
    #[serde(default, rename = "payoutRatioTTM", alias = "dividendPayoutRatioTTM")]
    payout_ratio: Option<f64>,
}

#[derive(Deserialize)]
struct FmpKeyMetricsTtm {
    #[serde(default, rename = "marketCap")]
    market_cap: Option<Decimal>,
    #[serde(default, rename = "enterpriseValueTTM")]
    enterprise_value: Option<Decimal>,
    #[serde(default, rename = "returnOnEquityTTM")]
    return_on_equity: Option<f64>,
    #[serde(default, rename = "returnOnAssetsTTM")]
    return_on_assets: Option<f64>,
    #[serde(default, rename = "currentRatioTTM")]
    current_ratio: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FmpArticle {
    title: String,
    published_date: String,
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default, alias = "publisher")]
    site: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

impl FmpArticle {
    fn into_article(self) -> Option<NewsArticle> {
        let published_at = match UtcDateTime::parse_lenient(&self.published_date) {
            Ok(ts) => ts,
            Err(error) => {
                tracing::debug!(%error, "skipping article with unreadable date");
                return None;
            }
        };
        Some(NewsArticle {
            title: self.title,
            site: non_empty(self.site),
            url: non_empty(self.url),
            symbol: non_empty(self.symbol),
            published_at,
        })
    }
}

#[derive(Deserialize)]
struct FmpSearchHit {
    symbol: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    exchange: Option<String>,
    #[serde(default)]
    currency: Option<String>,
}

fn string_field(row: &Map<String, Value>, field: &str) -> Option<String> {
    match row.get(field)? {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// `FY2024` for annual rows, `Q3 2024` for quarterly ones.
fn period_label(row: &Map<String, Value>) -> String {
    let date = string_field(row, "date").unwrap_or_default();
    let year = string_field(row, "fiscalYear")
        .or_else(|| string_field(row, "calendarYear"))
        .unwrap_or_else(|| date.chars().take(4).collect());

    match string_field(row, "period").as_deref() {
        Some(period) if period.starts_with('Q') => format!("{period} {year}"),
        _ => format!("FY{year}"),
    }
}

fn statement_period(row: &Map<String, Value>, lines: &[(&str, &str)]) -> StatementPeriod {
    StatementPeriod {
        label: period_label(row),
        date: string_field(row, "date").unwrap_or_default(),
        lines: lines
            .iter()
            .map(|(field, label)| StatementLine {
                label: (*label).to_owned(),
                value: decimal_value(row.get(*field)),
            })
            .collect(),
    }
}
