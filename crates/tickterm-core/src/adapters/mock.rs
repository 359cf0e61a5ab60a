use std::collections::HashSet;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use time::{Date, OffsetDateTime, Weekday};

use crate::adapters::fmp::statement_lines;
use crate::currency;
use crate::data_source::{CapabilitySet, DataSource, FetchError, SourceFuture, StatementRequest};
use crate::{
    ChartPeriod, CompanyProfile, EconomicObservation, FinancialRatios, FinancialStatement,
    NewsArticle, PriceBar, ProviderId, Quote, SearchHit, StatementLine, StatementPeriod, Symbol,
    UtcDateTime, YieldCurve, YieldPoint,
};

/// Trading days generated per symbol; the longest chart period fits inside.
const WALK_LEN: usize = 1_310;

/// 2025-01-03, a Friday.
const ANCHOR_DAYS_SINCE_EPOCH: i64 = 20_091;

const UNIVERSE: &[UniverseEntry] = &[
    ("AAPL", "Apple Inc.", "NASDAQ", "Technology"),
    ("MSFT", "Microsoft Corporation", "NASDAQ", "Technology"),
    ("NVDA", "NVIDIA Corporation", "NASDAQ", "Technology"),
    ("GOOGL", "Alphabet Inc.", "NASDAQ", "Communication Services"),
    ("AMZN", "Amazon.com, Inc.", "NASDAQ", "Consumer Cyclical"),
    ("TSLA", "Tesla, Inc.", "NASDAQ", "Consumer Cyclical"),
    ("JPM", "JPMorgan Chase & Co.", "NYSE", "Financial Services"),
    ("PG", "Procter & Gamble Company", "NYSE", "Consumer Defensive"),
    ("XOM", "Exxon Mobil Corporation", "NYSE", "Energy"),
    ("VOD.L", "Vodafone Group Plc", "LSE", "Communication Services"),
    ("SAP.DE", "SAP SE", "XETRA", "Technology"),
    ("7203.T", "Toyota Motor Corporation", "JPX", "Consumer Cyclical"),
    ("0700.HK", "Tencent Holdings Limited", "HKSE", "Communication Services"),
    ("005930.KS", "Samsung Electronics Co., Ltd.", "KSC", "Technology"),
];

const YIELDS: &[(&str, &str, &str)] = &[
    ("1M", "4.40", "4.41"),
    ("3M", "4.31", "4.33"),
    ("6M", "4.24", "4.25"),
    ("1Y", "4.17", "4.18"),
    ("2Y", "4.28", "4.25"),
    ("5Y", "4.42", "4.38"),
    ("10Y", "4.60", "4.57"),
    ("30Y", "4.82", "4.79"),
];

const ECONOMIC: &[(&str, &str, &str)] = &[
    ("GDP", "29349.924", "2024-07-01"),
    ("UNRATE", "4.2", "2024-12-01"),
    ("CPIAUCSL", "316.441", "2024-12-01"),
    ("FEDFUNDS", "4.48", "2024-12-01"),
    ("DGS10", "4.60", "2025-01-03"),
];

/// Deterministic offline data source.
///
/// Prices are a seeded random walk per symbol, so repeated calls agree with
/// each other and across runs. Symbols registered through
/// [`with_missing`](MockSource::with_missing) report `NotFound`.
#[derive(Debug, Clone, Default)]
pub struct MockSource {
    missing: HashSet<Symbol>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_missing<I>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = Symbol>,
    {
        self.missing.extend(symbols);
        self
    }

    fn ensure_known(&self, symbol: &Symbol) -> Result<(), FetchError> {
        if self.missing.contains(symbol) {
            return Err(FetchError::not_found(format!("mock has no data for {symbol}")));
        }
        Ok(())
    }

    fn build_quote(&self, symbol: &Symbol) -> Result<Quote, FetchError> {
        self.ensure_known(symbol)?;
        let walk = walk(symbol);
        let last = walk[WALK_LEN - 1];
        let previous = walk[WALK_LEN - 2];
        let change = last - previous;
        let change_percent = if previous.is_zero() {
            Decimal::ZERO
        } else {
            (change / previous * Decimal::ONE_HUNDRED).round_dp(2)
        };

        let mut quote = Quote::new(
            symbol.clone(),
            last,
            change,
            change_percent,
            currency::resolve(symbol).currency.code,
            UtcDateTime::from_date(anchor()),
        );
        quote.name = universe_entry(symbol).map(|(_, name, _, _)| (*name).to_owned());
        quote.exchange = universe_entry(symbol).map(|(_, _, exchange, _)| (*exchange).to_owned());
        quote.day_low = Some(last.min(previous));
        quote.day_high = Some(last.max(previous));
        quote.volume = Some(1_000_000 + seed(symbol) % 50_000_000);
        Ok(quote)
    }

    fn build_series(
        &self,
        symbol: &Symbol,
        period: ChartPeriod,
    ) -> Result<Vec<PriceBar>, FetchError> {
        self.ensure_known(symbol)?;
        let count = ((period.days() * 5 / 7) as usize).clamp(2, WALK_LEN);
        let walk = walk(symbol);
        let closes = &walk[WALK_LEN - count..];

        Ok(trading_days(count)
            .into_iter()
            .zip(closes.iter().enumerate())
            .map(|(date, (index, close))| {
                let open = if index == 0 { *close } else { closes[index - 1] };
                PriceBar {
                    ts: UtcDateTime::from_date(date),
                    open,
                    high: open.max(*close),
                    low: open.min(*close),
                    close: *close,
                    volume: 1_000_000
                        + seed(symbol).wrapping_add(index as u64 * 7_919) % 9_000_000,
                }
            })
            .collect())
    }

    fn build_statement(&self, req: &StatementRequest) -> Result<FinancialStatement, FetchError> {
        self.ensure_known(&req.symbol)?;
        let base = Decimal::from(10_000_000_000_u64 + seed(&req.symbol) % 90_000_000_000);
        let lines = statement_lines(req.kind);

        let periods = (0..req.period_limit())
            .map(|offset| {
                let (label, date) = if req.quarterly {
                    let quarter = 4 - offset % 4;
                    let year = 2024 - offset / 4;
                    (format!("Q{quarter} {year}"), format!("{year}-{:02}-30", quarter * 3))
                } else {
                    let year = 2024 - offset;
                    (format!("FY{year}"), format!("{year}-12-31"))
                };
                let scale = Decimal::from(100 - offset.min(50)) / Decimal::ONE_HUNDRED;
                StatementPeriod {
                    label,
                    date,
                    lines: lines
                        .iter()
                        .enumerate()
                        .map(|(index, (_, label))| StatementLine {
                            label: (*label).to_owned(),
                            value: Some((base * scale / Decimal::from(index as u64 + 1)).round()),
                        })
                        .collect(),
                }
            })
            .collect();

        Ok(FinancialStatement {
            kind: req.kind,
            symbol: req.symbol.clone(),
            quarterly: req.quarterly,
            periods,
        })
    }

    fn build_profile(&self, symbol: &Symbol) -> Result<CompanyProfile, FetchError> {
        self.ensure_known(symbol)?;
        let entry = universe_entry(symbol);
        Ok(CompanyProfile {
            symbol: symbol.clone(),
            name: entry
                .map(|(_, name, _, _)| (*name).to_owned())
                .unwrap_or_else(|| format!("{symbol} Holdings")),
            exchange: entry.map(|(_, _, exchange, _)| (*exchange).to_owned()),
            sector: entry.map(|(_, _, _, sector)| (*sector).to_owned()),
            industry: None,
            ceo: None,
            country: None,
            website: None,
            employees: Some(1_000 + seed(symbol) % 200_000),
            market_cap: Some(walk(symbol)[WALK_LEN - 1] * Decimal::from(1_000_000_000_u64)),
            description: Some(format!("Offline sample profile for {symbol}.")),
        })
    }

    fn build_ratios(&self, symbol: &Symbol) -> Result<FinancialRatios, FetchError> {
        self.ensure_known(symbol)?;
        let mut rng = fastrand::Rng::with_seed(seed(symbol));
        Ok(FinancialRatios {
            gross_margin: Some(0.2 + rng.f64() * 0.5),
            operating_margin: Some(0.05 + rng.f64() * 0.3),
            net_margin: Some(0.02 + rng.f64() * 0.25),
            return_on_equity: Some(rng.f64() * 0.6),
            return_on_assets: Some(rng.f64() * 0.2),
            current_ratio: Some(0.8 + rng.f64() * 2.0),
            quick_ratio: Some(0.5 + rng.f64() * 1.5),
            pe_ratio: Some(8.0 + rng.f64() * 40.0),
            price_to_book: Some(1.0 + rng.f64() * 20.0),
            price_to_sales: Some(0.5 + rng.f64() * 10.0),
            debt_to_equity: Some(rng.f64() * 3.0),
            dividend_yield: Some(rng.f64() * 0.04),
            payout_ratio: Some(rng.f64() * 0.6),
            market_cap: Some(walk(symbol)[WALK_LEN - 1] * Decimal::from(1_000_000_000_u64)),
            enterprise_value: Some(walk(symbol)[WALK_LEN - 1] * Decimal::from(1_050_000_000_u64)),
        })
    }

    fn build_news(
        &self,
        symbol: Option<&Symbol>,
        limit: usize,
    ) -> Result<Vec<NewsArticle>, FetchError> {
        if let Some(symbol) = symbol {
            self.ensure_known(symbol)?;
        }
        let close = anchor_close();
        Ok((0..limit.min(20))
            .map(|index| {
                let title = match symbol {
                    Some(symbol) => format!("{symbol} sample headline #{}", index + 1),
                    None => format!("Market sample headline #{}", index + 1),
                };
                NewsArticle {
                    title,
                    site: Some(String::from("mock.example")),
                    url: None,
                    symbol: symbol.map(Symbol::to_string),
                    published_at: UtcDateTime::from_offset_datetime(
                        close - time::Duration::hours(index as i64),
                    )
                    .unwrap_or_else(|_| UtcDateTime::from_date(anchor())),
                }
            })
            .collect())
    }

    fn build_search(&self, query: &str, limit: usize) -> Vec<SearchHit> {
        let needle = query.trim().to_ascii_lowercase();
        UNIVERSE
            .iter()
            .filter(|(symbol, name, _, _)| {
                symbol.to_ascii_lowercase().contains(&needle)
                    || name.to_ascii_lowercase().contains(&needle)
            })
            .take(limit)
            .map(|(symbol, name, exchange, _)| SearchHit {
                symbol: (*symbol).to_owned(),
                name: (*name).to_owned(),
                exchange: Some((*exchange).to_owned()),
                currency: Symbol::parse(symbol)
                    .ok()
                    .map(|symbol| currency::resolve(&symbol).currency.code.to_owned()),
            })
            .collect()
    }

    fn build_movers(&self, limit: usize) -> Vec<Quote> {
        let mut quotes: Vec<Quote> = UNIVERSE
            .iter()
            .filter_map(|(symbol, _, _, _)| Symbol::parse(symbol).ok())
            .filter_map(|symbol| self.build_quote(&symbol).ok())
            .collect();
        quotes.sort_by(|a, b| b.change_percent.cmp(&a.change_percent));
        quotes.truncate(limit);
        quotes
    }
}

impl DataSource for MockSource {
    fn id(&self) -> ProviderId {
        ProviderId::Mock
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::full()
    }

    fn quote<'a>(&'a self, symbol: &'a Symbol) -> SourceFuture<'a, Quote> {
        Box::pin(async move { self.build_quote(symbol) })
    }

    fn series<'a>(
        &'a self,
        symbol: &'a Symbol,
        period: ChartPeriod,
    ) -> SourceFuture<'a, Vec<PriceBar>> {
        Box::pin(async move { self.build_series(symbol, period) })
    }

    fn statement<'a>(&'a self, req: &'a StatementRequest) -> SourceFuture<'a, FinancialStatement> {
        Box::pin(async move { self.build_statement(req) })
    }

    fn profile<'a>(&'a self, symbol: &'a Symbol) -> SourceFuture<'a, CompanyProfile> {
        Box::pin(async move { self.build_profile(symbol) })
    }

    fn ratios<'a>(&'a self, symbol: &'a Symbol) -> SourceFuture<'a, FinancialRatios> {
        Box::pin(async move { self.build_ratios(symbol) })
    }

    fn news<'a>(
        &'a self,
        symbol: Option<&'a Symbol>,
        limit: usize,
    ) -> SourceFuture<'a, Vec<NewsArticle>> {
        Box::pin(async move { self.build_news(symbol, limit) })
    }

    fn search<'a>(&'a self, query: &'a str, limit: usize) -> SourceFuture<'a, Vec<SearchHit>> {
        Box::pin(async move { Ok(self.build_search(query, limit)) })
    }

    fn movers<'a>(&'a self, limit: usize) -> SourceFuture<'a, Vec<Quote>> {
        Box::pin(async move { Ok(self.build_movers(limit)) })
    }

    fn yield_curve<'a>(&'a self) -> SourceFuture<'a, YieldCurve> {
        Box::pin(async move {
            Ok(YieldCurve {
                as_of: anchor().to_string(),
                points: YIELDS
                    .iter()
                    .filter_map(|(maturity, rate, previous)| {
                        Some(YieldPoint {
                            maturity: (*maturity).to_owned(),
                            rate: rate.parse().ok()?,
                            previous: previous.parse().ok(),
                        })
                    })
                    .collect(),
            })
        })
    }

    fn economic_series<'a>(&'a self, series_id: &'a str) -> SourceFuture<'a, EconomicObservation> {
        Box::pin(async move {
            ECONOMIC
                .iter()
                .find(|(id, _, _)| id.eq_ignore_ascii_case(series_id))
                .map(|(id, value, date)| EconomicObservation {
                    series_id: (*id).to_owned(),
                    value: value.parse().ok(),
                    date: (*date).to_owned(),
                })
                .ok_or_else(|| FetchError::not_found(format!("mock has no series {series_id}")))
        })
    }
}

fn anchor() -> Date {
    OffsetDateTime::UNIX_EPOCH.date() + time::Duration::days(ANCHOR_DAYS_SINCE_EPOCH)
}

/// 21:00 UTC on the anchor date.
fn anchor_close() -> OffsetDateTime {
    OffsetDateTime::UNIX_EPOCH
        + time::Duration::days(ANCHOR_DAYS_SINCE_EPOCH)
        + time::Duration::hours(21)
}

type UniverseEntry = (&'static str, &'static str, &'static str, &'static str);

fn universe_entry(symbol: &Symbol) -> Option<&'static UniverseEntry> {
    UNIVERSE.iter().find(|(known, _, _, _)| *known == symbol.as_str())
}

/// FNV-1a over the symbol text.
fn seed(symbol: &Symbol) -> u64 {
    symbol
        .as_str()
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325_u64, |hash, byte| {
            (hash ^ u64::from(byte)).wrapping_mul(0x0000_0100_0000_01b3)
        })
}

fn walk(symbol: &Symbol) -> Vec<Decimal> {
    let mut rng = fastrand::Rng::with_seed(seed(symbol));
    let mut price = if symbol.is_index() {
        1_000.0 + rng.f64() * 39_000.0
    } else {
        20.0 + rng.f64() * 480.0
    };

    (0..WALK_LEN)
        .map(|_| {
            price *= 1.0 + (rng.f64() - 0.5) * 0.04;
            Decimal::from_f64(price).unwrap_or_default().round_dp(2)
        })
        .collect()
}

/// The `count` most recent weekdays up to the anchor, oldest first.
fn trading_days(count: usize) -> Vec<Date> {
    let mut days = Vec::with_capacity(count);
    let mut cursor = Some(anchor());
    while let Some(date) = cursor {
        if days.len() == count {
            break;
        }
        if !matches!(date.weekday(), Weekday::Saturday | Weekday::Sunday) {
            days.push(date);
        }
        cursor = date.previous_day();
    }
    days.reverse();
    days
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::FetchErrorKind;
    use crate::StatementKind;

    fn symbol(value: &str) -> Symbol {
        Symbol::parse(value).expect("valid symbol")
    }

    #[test]
    fn anchor_is_a_friday() {
        assert_eq!(anchor().to_string(), "2025-01-03");
        assert_eq!(anchor().weekday(), Weekday::Friday);
    }

    #[tokio::test]
    async fn quotes_are_deterministic_and_localized() {
        let mock = MockSource::new();
        let first = mock.quote(&symbol("VOD.L")).await.expect("quote");
        let second = mock.quote(&symbol("VOD.L")).await.expect("quote");
        assert_eq!(first, second);
        assert_eq!(first.currency, "GBP");
        assert!(first.price > Decimal::ZERO);
    }

    #[tokio::test]
    async fn series_skips_weekends_and_ends_on_the_quote_price() {
        let mock = MockSource::new();
        let aapl = symbol("AAPL");
        let bars = mock.series(&aapl, ChartPeriod::OneMonth).await.expect("series");
        let quote = mock.quote(&aapl).await.expect("quote");

        assert_eq!(bars.len(), 21);
        assert_eq!(bars.last().map(|bar| bar.close), Some(quote.price));
        assert!(bars.windows(2).all(|pair| pair[0].ts < pair[1].ts));
        assert!(bars
            .iter()
            .all(|bar| !matches!(bar.ts.date().weekday(), Weekday::Saturday | Weekday::Sunday)));
    }

    #[tokio::test]
    async fn missing_symbols_are_not_found() {
        let mock = MockSource::new().with_missing([symbol("GONE")]);
        let err = mock.quote(&symbol("GONE")).await.expect_err("must fail");
        assert_eq!(err.kind(), FetchErrorKind::NotFound);
        assert!(mock.quote(&symbol("AAPL")).await.is_ok());
    }

    #[tokio::test]
    async fn statement_has_one_period_per_requested_slot() {
        let mock = MockSource::new();
        let req = StatementRequest {
            kind: StatementKind::Balance,
            symbol: symbol("MSFT"),
            years: 2,
            quarterly: true,
        };
        let statement = mock.statement(&req).await.expect("statement");
        assert_eq!(statement.periods.len(), 8);
        assert_eq!(statement.periods[0].label, "Q4 2024");
        assert_eq!(statement.periods[4].label, "Q4 2023");
    }

    #[tokio::test]
    async fn search_matches_names_and_tickers() {
        let mock = MockSource::new();
        let hits = mock.search("toyota", 5).await.expect("search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].symbol, "7203.T");
        assert_eq!(hits[0].currency.as_deref(), Some("JPY"));
    }

    #[tokio::test]
    async fn unknown_economic_series_is_not_found() {
        let mock = MockSource::new();
        assert!(mock.economic_series("unrate").await.is_ok());
        let err = mock.economic_series("NOPE").await.expect_err("must fail");
        assert_eq!(err.kind(), FetchErrorKind::NotFound);
    }
}
