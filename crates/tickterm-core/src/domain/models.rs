use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Symbol, UtcDateTime, ValidationError};

/// Latest quote for a single instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: Symbol,
    pub name: Option<String>,
    pub price: Decimal,
    pub change: Decimal,
    pub change_percent: Decimal,
    pub currency: String,
    pub day_low: Option<Decimal>,
    pub day_high: Option<Decimal>,
    pub volume: Option<u64>,
    pub market_cap: Option<Decimal>,
    pub exchange: Option<String>,
    pub as_of: UtcDateTime,
}

impl Quote {
    /// Minimal quote; optional fields can be filled in by the adapter afterwards.
    pub fn new(
        symbol: Symbol,
        price: Decimal,
        change: Decimal,
        change_percent: Decimal,
        currency: impl Into<String>,
        as_of: UtcDateTime,
    ) -> Self {
        Self {
            symbol,
            name: None,
            price,
            change,
            change_percent,
            currency: currency.into(),
            day_low: None,
            day_high: None,
            volume: None,
            market_cap: None,
            exchange: None,
            as_of,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !name.is_empty() {
            self.name = Some(name);
        }
        self
    }
}

/// One OHLCV observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub ts: UtcDateTime,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: u64,
}

/// Non-empty price history in strictly ascending timestamp order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPriceSeries")]
pub struct PriceSeries {
    symbol: Symbol,
    bars: Vec<PriceBar>,
}

#[derive(Deserialize)]
struct RawPriceSeries {
    symbol: Symbol,
    bars: Vec<PriceBar>,
}

impl TryFrom<RawPriceSeries> for PriceSeries {
    type Error = ValidationError;

    fn try_from(value: RawPriceSeries) -> Result<Self, Self::Error> {
        Self::new(value.symbol, value.bars)
    }
}

impl PriceSeries {
    /// Sorts bars by timestamp and drops repeated timestamps, keeping the first
    /// occurrence. Fails when no bars remain.
    pub fn new(symbol: Symbol, mut bars: Vec<PriceBar>) -> Result<Self, ValidationError> {
        if bars.is_empty() {
            return Err(ValidationError::EmptySeries {
                symbol: symbol.to_string(),
            });
        }

        // stable sort keeps the provider's first occurrence ahead of duplicates
        bars.sort_by_key(|bar| bar.ts);
        bars.dedup_by(|later, earlier| later.ts == earlier.ts);

        Ok(Self { symbol, bars })
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> &PriceBar {
        &self.bars[0]
    }

    pub fn last(&self) -> &PriceBar {
        &self.bars[self.bars.len() - 1]
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars
            .iter()
            .map(|bar| bar.close.to_f64().unwrap_or(0.0))
            .collect()
    }
}

/// Company profile used by the `FA` page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub symbol: Symbol,
    pub name: String,
    pub exchange: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub ceo: Option<String>,
    pub country: Option<String>,
    pub website: Option<String>,
    pub employees: Option<u64>,
    pub market_cap: Option<Decimal>,
    pub description: Option<String>,
}

/// Trailing-twelve-month ratios and key metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialRatios {
    pub gross_margin: Option<f64>,
    pub operating_margin: Option<f64>,
    pub net_margin: Option<f64>,
    pub return_on_equity: Option<f64>,
    pub return_on_assets: Option<f64>,
    pub current_ratio: Option<f64>,
    pub quick_ratio: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub price_to_book: Option<f64>,
    pub price_to_sales: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub payout_ratio: Option<f64>,
    pub market_cap: Option<Decimal>,
    pub enterprise_value: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    Income,
    Balance,
    CashFlow,
}

impl StatementKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Balance => "balance",
            Self::CashFlow => "cash_flow",
        }
    }

    pub const fn title(self) -> &'static str {
        match self {
            Self::Income => "Income Statement",
            Self::Balance => "Balance Sheet",
            Self::CashFlow => "Cash Flow Statement",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementLine {
    pub label: String,
    pub value: Option<Decimal>,
}

/// One fiscal year or quarter of a statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementPeriod {
    pub label: String,
    pub date: String,
    pub lines: Vec<StatementLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialStatement {
    pub kind: StatementKind,
    pub symbol: Symbol,
    pub quarterly: bool,
    pub periods: Vec<StatementPeriod>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub title: String,
    pub site: Option<String>,
    pub url: Option<String>,
    pub symbol: Option<String>,
    pub published_at: UtcDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub symbol: String,
    pub name: String,
    pub exchange: Option<String>,
    pub currency: Option<String>,
}

/// Treasury yield for one maturity, in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldPoint {
    pub maturity: String,
    pub rate: Decimal,
    pub previous: Option<Decimal>,
}

impl YieldPoint {
    /// Day-over-day change in basis points.
    pub fn change_bp(&self) -> Option<Decimal> {
        self.previous
            .map(|previous| ((self.rate - previous) * Decimal::ONE_HUNDRED).round_dp(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldCurve {
    pub as_of: String,
    pub points: Vec<YieldPoint>,
}

/// Latest observation of an economic series; `value` is absent when the
/// publisher reports a missing data point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomicObservation {
    pub series_id: String,
    pub value: Option<Decimal>,
    pub date: String,
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn bar(ts: &str, close: Decimal) -> PriceBar {
        PriceBar {
            ts: UtcDateTime::parse(ts).expect("valid ts"),
            open: close,
            high: close,
            low: close,
            close,
            volume: 100,
        }
    }

    #[test]
    fn series_is_sorted_and_deduplicated() {
        let symbol = Symbol::parse("AAPL").expect("valid");
        let series = PriceSeries::new(
            symbol,
            vec![
                bar("2024-01-03T00:00:00Z", dec!(3)),
                bar("2024-01-01T00:00:00Z", dec!(1)),
                bar("2024-01-03T00:00:00Z", dec!(99)),
                bar("2024-01-02T00:00:00Z", dec!(2)),
            ],
        )
        .expect("non-empty");

        let closes: Vec<Decimal> = series.bars().iter().map(|bar| bar.close).collect();
        assert_eq!(closes, vec![dec!(1), dec!(2), dec!(3)]);
    }

    #[test]
    fn empty_series_is_rejected() {
        let symbol = Symbol::parse("AAPL").expect("valid");
        let err = PriceSeries::new(symbol, Vec::new()).expect_err("must fail");
        assert!(matches!(err, ValidationError::EmptySeries { .. }));
    }

    #[test]
    fn series_deserialization_enforces_invariants() {
        let raw = r#"{"symbol":"AAPL","bars":[]}"#;
        assert!(serde_json::from_str::<PriceSeries>(raw).is_err());
    }

    #[test]
    fn yield_change_is_reported_in_basis_points() {
        let point = YieldPoint {
            maturity: String::from("10Y"),
            rate: dec!(4.25),
            previous: Some(dec!(4.31)),
        };
        assert_eq!(point.change_bp(), Some(dec!(-6.0)));
    }
}
