//! Symbol-suffix currency resolution and display formatting.
//!
//! Pure functions: no network, no failure. Unknown exchange suffixes fall back
//! to USD and are flagged through [`LocalizedAmount::recognized`].

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::Symbol;

/// Display conventions for one currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CurrencyInfo {
    pub code: &'static str,
    pub prefix: &'static str,
    pub decimals: u32,
}

const fn currency(code: &'static str, prefix: &'static str, decimals: u32) -> CurrencyInfo {
    CurrencyInfo {
        code,
        prefix,
        decimals,
    }
}

pub const USD: CurrencyInfo = currency("USD", "$", 2);
const GBP: CurrencyInfo = currency("GBP", "£", 2);
const EUR: CurrencyInfo = currency("EUR", "€", 2);
const JPY: CurrencyInfo = currency("JPY", "¥", 0);
const HKD: CurrencyInfo = currency("HKD", "HK$", 2);
const KRW: CurrencyInfo = currency("KRW", "₩", 0);
const CAD: CurrencyInfo = currency("CAD", "C$", 2);
const AUD: CurrencyInfo = currency("AUD", "A$", 2);
const CHF: CurrencyInfo = currency("CHF", "CHF ", 2);
const INR: CurrencyInfo = currency("INR", "₹", 2);
const CNY: CurrencyInfo = currency("CNY", "¥", 2);
const SGD: CurrencyInfo = currency("SGD", "S$", 2);
const TWD: CurrencyInfo = currency("TWD", "NT$", 2);
const BRL: CurrencyInfo = currency("BRL", "R$", 2);
const SEK: CurrencyInfo = currency("SEK", "SEK ", 2);
const NOK: CurrencyInfo = currency("NOK", "NOK ", 2);
const DKK: CurrencyInfo = currency("DKK", "DKK ", 2);

const SUFFIXES: &[(&str, CurrencyInfo)] = &[
    ("L", GBP),
    ("DE", EUR),
    ("F", EUR),
    ("PA", EUR),
    ("AS", EUR),
    ("MI", EUR),
    ("MC", EUR),
    ("BR", EUR),
    ("LS", EUR),
    ("VI", EUR),
    ("HE", EUR),
    ("IR", EUR),
    ("T", JPY),
    ("HK", HKD),
    ("KS", KRW),
    ("KQ", KRW),
    ("TO", CAD),
    ("V", CAD),
    ("NE", CAD),
    ("AX", AUD),
    ("SW", CHF),
    ("NS", INR),
    ("BO", INR),
    ("SS", CNY),
    ("SZ", CNY),
    ("SI", SGD),
    ("TW", TWD),
    ("TWO", TWD),
    ("SA", BRL),
    ("ST", SEK),
    ("OL", NOK),
    ("CO", DKK),
];

/// Currency resolution for a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub currency: CurrencyInfo,
    /// False when the symbol carried a suffix outside the known table.
    pub recognized: bool,
}

/// Resolves the trading currency from the symbol's exchange suffix.
pub fn resolve(symbol: &Symbol) -> Resolution {
    // pair quotes like EURUSD=X carry no exchange suffix
    let suffix = match symbol.exchange_suffix() {
        Some(suffix) if !symbol.as_str().contains('=') => suffix,
        _ => {
            return Resolution {
                currency: USD,
                recognized: true,
            }
        }
    };

    match SUFFIXES.iter().find(|(known, _)| *known == suffix) {
        Some((_, currency)) => Resolution {
            currency: *currency,
            recognized: true,
        },
        None => Resolution {
            currency: USD,
            recognized: false,
        },
    }
}

/// Monetary value ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalizedAmount {
    pub amount: Decimal,
    pub currency: &'static str,
    pub formatted: String,
    pub recognized: bool,
}

/// Localizes `amount` using the currency implied by `symbol`.
pub fn localize(symbol: &Symbol, amount: Decimal) -> LocalizedAmount {
    let resolution = resolve(symbol);
    LocalizedAmount {
        amount,
        currency: resolution.currency.code,
        formatted: format_amount(amount, &resolution.currency),
        recognized: resolution.recognized,
    }
}

/// Like [`localize`] but with a T/B/M/K suffix for large figures.
pub fn localize_compact(symbol: &Symbol, amount: Decimal) -> LocalizedAmount {
    let resolution = resolve(symbol);
    LocalizedAmount {
        amount,
        currency: resolution.currency.code,
        formatted: format_compact(amount, &resolution.currency),
        recognized: resolution.recognized,
    }
}

/// `-$1,234.50`: sign first, then prefix, grouped integer part, fixed decimals.
pub fn format_amount(amount: Decimal, currency: &CurrencyInfo) -> String {
    let mut rounded = amount
        .round_dp_with_strategy(currency.decimals, RoundingStrategy::MidpointAwayFromZero)
        .abs();
    rounded.rescale(currency.decimals);

    let sign = if amount.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}{}{}", currency.prefix, group_thousands(&rounded.to_string()))
}

/// `$2.95T`, `-€12.30M`; values under one thousand use [`format_amount`].
pub fn format_compact(amount: Decimal, currency: &CurrencyInfo) -> String {
    const UNITS: [(i64, &str); 4] = [
        (1_000_000_000_000, "T"),
        (1_000_000_000, "B"),
        (1_000_000, "M"),
        (1_000, "K"),
    ];

    let magnitude = amount.abs();
    for (scale, unit) in UNITS {
        let scale = Decimal::from(scale);
        if magnitude >= scale {
            let mut scaled = (magnitude / scale)
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
            scaled.rescale(2);
            let sign = if amount.is_sign_negative() { "-" } else { "" };
            return format!("{sign}{}{scaled}{unit}", currency.prefix);
        }
    }

    format_amount(amount, currency)
}

fn group_thousands(plain: &str) -> String {
    let (integer, fraction) = match plain.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (plain, None),
    };

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (index, ch) in integer.chars().enumerate() {
        if index > 0 && (integer.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    match fraction {
        Some(fraction) => format!("{grouped}.{fraction}"),
        None => grouped,
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn symbol(value: &str) -> Symbol {
        Symbol::parse(value).expect("valid symbol")
    }

    #[test]
    fn suffix_table_resolves_known_exchanges() {
        let cases = [
            ("AAPL", "USD"),
            ("VOD.L", "GBP"),
            ("SAP.DE", "EUR"),
            ("7203.T", "JPY"),
            ("0700.HK", "HKD"),
            ("005930.KS", "KRW"),
            ("SHOP.TO", "CAD"),
            ("^FTSE", "USD"),
            ("EURUSD=X", "USD"),
        ];

        for (input, expected) in cases {
            let resolution = resolve(&symbol(input));
            assert_eq!(resolution.currency.code, expected, "symbol {input}");
            assert!(resolution.recognized, "symbol {input}");
        }
    }

    #[test]
    fn unknown_suffix_defaults_to_usd_with_marker() {
        let localized = localize(&symbol("ABC.XX"), dec!(10));
        assert_eq!(localized.currency, "USD");
        assert!(!localized.recognized);
        assert_eq!(localized.formatted, "$10.00");
    }

    #[test]
    fn formats_with_grouping_and_precision() {
        assert_eq!(localize(&symbol("AAPL"), dec!(1234.5)).formatted, "$1,234.50");
        assert_eq!(localize(&symbol("VOD.L"), dec!(72.456)).formatted, "£72.46");
        assert_eq!(localize(&symbol("7203.T"), dec!(2850.5)).formatted, "¥2,851");
        assert_eq!(
            localize(&symbol("005930.KS"), dec!(71500)).formatted,
            "₩71,500"
        );
        assert_eq!(localize(&symbol("AAPL"), dec!(999999.995)).formatted, "$1,000,000.00");
    }

    #[test]
    fn negative_amounts_put_sign_before_prefix() {
        assert_eq!(localize(&symbol("AAPL"), dec!(-3.2)).formatted, "-$3.20");
        assert_eq!(localize(&symbol("AAPL"), dec!(-0.001)).formatted, "$0.00");
    }

    #[test]
    fn compact_format_uses_unit_suffixes() {
        assert_eq!(format_compact(dec!(2950000000000), &USD), "$2.95T");
        assert_eq!(format_compact(dec!(-12300000), &EUR), "-€12.30M");
        assert_eq!(format_compact(dec!(950), &USD), "$950.00");
    }
}
