//! Command-line interpreter: tokenizes a terminal line and resolves it to a
//! [`ParsedRequest`].
//!
//! Parsing never touches the network or disk.
//!
//! | Verb | Usage | Request |
//! |------|-------|---------|
//! | `Q` | `Q <SYMBOL>` | [`ParsedRequest::Quote`] |
//! | `GP` | `GP <SYMBOL> [PERIOD]` | [`ParsedRequest::Chart`] |
//! | `FA` | `FA <SYMBOL>` | [`ParsedRequest::Fundamentals`] |
//! | `FI` | `FI <SYMBOL>` | [`ParsedRequest::Financials`] |
//! | `IS` `BS` `CF` | `<VERB> <SYMBOL> [YEARS] [Q]` | [`ParsedRequest::Statement`] |
//! | `WEI` `WB` `FXIP` `MOST` `ECST` | no arguments | basket pages |
//! | `N` / `TOP` | `N [SYMBOL]` / `TOP` | [`ParsedRequest::News`] |
//! | `W` `WA` `WR` `WC` `WD` | see [`VERBS`] | watchlist operations |
//! | `S` | `S <QUERY...>` | [`ParsedRequest::Search`] |
//! | `HELP` / `?` | no arguments | [`ParsedRequest::Help`] |

use serde::Serialize;
use thiserror::Error;

use crate::data_source::StatementRequest;
use crate::payload::DisplayRegion;
use crate::{ChartPeriod, StatementKind, Symbol, WatchlistName};

const DEFAULT_STATEMENT_YEARS: u32 = 4;
const MAX_STATEMENT_YEARS: u32 = 20;

/// Help-table row for one verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VerbSpec {
    pub verb: &'static str,
    pub usage: &'static str,
    pub description: &'static str,
}

const fn verb(verb: &'static str, usage: &'static str, description: &'static str) -> VerbSpec {
    VerbSpec {
        verb,
        usage,
        description,
    }
}

pub const VERBS: &[VerbSpec] = &[
    verb("Q", "Q <SYMBOL>", "Quote with latest headlines"),
    verb("GP", "GP <SYMBOL> [1D|1W|1M|3M|6M|1Y|5Y]", "Price chart (default 1M)"),
    verb("FA", "FA <SYMBOL>", "Company profile"),
    verb("FI", "FI <SYMBOL>", "TTM ratios and key metrics"),
    verb("IS", "IS <SYMBOL> [YEARS] [Q]", "Income statement"),
    verb("BS", "BS <SYMBOL> [YEARS] [Q]", "Balance sheet"),
    verb("CF", "CF <SYMBOL> [YEARS] [Q]", "Cash flow statement"),
    verb("WEI", "WEI", "World equity indices"),
    verb("WB", "WB", "US Treasury yield curve"),
    verb("FXIP", "FXIP", "Currency ETF board"),
    verb("MOST", "MOST", "Most active movers"),
    verb("ECST", "ECST", "Economic indicators"),
    verb("N", "N [SYMBOL]", "News headlines"),
    verb("TOP", "TOP", "Top market headlines"),
    verb("W", "W [NAME]", "Show a watchlist with live quotes"),
    verb("WA", "WA <SYMBOL> [NAME]", "Add a symbol to a watchlist"),
    verb("WR", "WR <SYMBOL> [NAME]", "Remove a symbol from a watchlist"),
    verb("WC", "WC <NAME>", "Create a watchlist"),
    verb("WD", "WD <NAME>", "Delete a watchlist"),
    verb("S", "S <QUERY...>", "Search symbols by name or ticker"),
    verb("HELP", "HELP | ?", "List commands"),
];

fn usage_for(verb: &str) -> &'static str {
    VERBS
        .iter()
        .find(|spec| spec.verb == verb)
        .map(|spec| spec.usage)
        .unwrap_or("HELP")
}

/// Tokenized terminal line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Uppercased first token.
    pub verb: String,
    pub args: Vec<String>,
    pub raw: String,
}

impl Command {
    /// Splits on whitespace; `None` for a blank line.
    pub fn tokenize(line: &str) -> Option<Self> {
        let mut tokens = line.split_whitespace();
        let verb = tokens.next()?.to_ascii_uppercase();
        Some(Self {
            verb,
            args: tokens.map(str::to_owned).collect(),
            raw: line.to_owned(),
        })
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown command '{verb}'; type HELP for the command list")]
    UnknownCommand { verb: String },

    #[error("{verb}: {reason} (usage: {expected})")]
    InvalidArguments {
        verb: String,
        expected: &'static str,
        reason: String,
    },
}

/// One fully validated command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedRequest {
    Quote(Symbol),
    Chart {
        symbol: Symbol,
        period: ChartPeriod,
    },
    Fundamentals(Symbol),
    Financials(Symbol),
    Statement(StatementRequest),
    Index,
    Yield,
    Forex,
    Movers,
    EconStats,
    /// Company headlines, or market-wide headlines when `None`.
    News(Option<Symbol>),
    /// `None` shows the default list.
    WatchlistShow(Option<WatchlistName>),
    WatchlistAdd {
        symbol: Symbol,
        list: Option<WatchlistName>,
    },
    WatchlistRemove {
        symbol: Symbol,
        list: Option<WatchlistName>,
    },
    WatchlistCreate(WatchlistName),
    WatchlistDelete(WatchlistName),
    Search(String),
    Help,
}

impl ParsedRequest {
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::Quote(_) => "Q",
            Self::Chart { .. } => "GP",
            Self::Fundamentals(_) => "FA",
            Self::Financials(_) => "FI",
            Self::Statement(req) => match req.kind {
                StatementKind::Income => "IS",
                StatementKind::Balance => "BS",
                StatementKind::CashFlow => "CF",
            },
            Self::Index => "WEI",
            Self::Yield => "WB",
            Self::Forex => "FXIP",
            Self::Movers => "MOST",
            Self::EconStats => "ECST",
            Self::News(_) => "N",
            Self::WatchlistShow(_) => "W",
            Self::WatchlistAdd { .. } => "WA",
            Self::WatchlistRemove { .. } => "WR",
            Self::WatchlistCreate(_) => "WC",
            Self::WatchlistDelete(_) => "WD",
            Self::Search(_) => "S",
            Self::Help => "HELP",
        }
    }

    /// Screen area the resulting payload replaces.
    pub const fn region(&self) -> DisplayRegion {
        match self {
            Self::Quote(_) => DisplayRegion::Quote,
            Self::Chart { .. } => DisplayRegion::Chart,
            Self::WatchlistShow(_)
            | Self::WatchlistAdd { .. }
            | Self::WatchlistRemove { .. }
            | Self::WatchlistCreate(_)
            | Self::WatchlistDelete(_) => DisplayRegion::Watchlist,
            _ => DisplayRegion::Content,
        }
    }

    /// Whether the request changes persisted watchlists.
    pub const fn mutates(&self) -> bool {
        matches!(
            self,
            Self::WatchlistAdd { .. }
                | Self::WatchlistRemove { .. }
                | Self::WatchlistCreate(_)
                | Self::WatchlistDelete(_)
        )
    }
}

/// Parses one terminal line.
pub fn parse(line: &str) -> Result<ParsedRequest, ParseError> {
    let Some(command) = Command::tokenize(line) else {
        return Err(ParseError::UnknownCommand {
            verb: String::new(),
        });
    };
    resolve(&command)
}

/// Resolves a tokenized command to its request variant.
pub fn resolve(command: &Command) -> Result<ParsedRequest, ParseError> {
    let verb = match command.verb.as_str() {
        "?" => "HELP",
        other => other,
    };
    let args = Args {
        verb,
        values: &command.args,
    };

    match verb {
        "Q" => {
            args.arity(1, 1)?;
            Ok(ParsedRequest::Quote(args.symbol(0)?))
        }
        "GP" => {
            args.arity(1, 2)?;
            let period = match args.values.get(1) {
                Some(token) => ChartPeriod::parse(token).map_err(|e| args.invalid(e.to_string()))?,
                None => ChartPeriod::default(),
            };
            Ok(ParsedRequest::Chart {
                symbol: args.symbol(0)?,
                period,
            })
        }
        "FA" => {
            args.arity(1, 1)?;
            Ok(ParsedRequest::Fundamentals(args.symbol(0)?))
        }
        "FI" => {
            args.arity(1, 1)?;
            Ok(ParsedRequest::Financials(args.symbol(0)?))
        }
        "IS" => args.statement(StatementKind::Income),
        "BS" => args.statement(StatementKind::Balance),
        "CF" => args.statement(StatementKind::CashFlow),
        "WEI" => args.arity(0, 0).map(|_| ParsedRequest::Index),
        "WB" => args.arity(0, 0).map(|_| ParsedRequest::Yield),
        "FXIP" => args.arity(0, 0).map(|_| ParsedRequest::Forex),
        "MOST" => args.arity(0, 0).map(|_| ParsedRequest::Movers),
        "ECST" => args.arity(0, 0).map(|_| ParsedRequest::EconStats),
        "TOP" => args.arity(0, 0).map(|_| ParsedRequest::News(None)),
        "N" => {
            args.arity(0, 1)?;
            let symbol = args.values.first().map(|_| args.symbol(0)).transpose()?;
            Ok(ParsedRequest::News(symbol))
        }
        "W" => {
            args.arity(0, 1)?;
            Ok(ParsedRequest::WatchlistShow(args.optional_name(0)?))
        }
        "WA" => {
            args.arity(1, 2)?;
            Ok(ParsedRequest::WatchlistAdd {
                symbol: args.symbol(0)?,
                list: args.optional_name(1)?,
            })
        }
        "WR" => {
            args.arity(1, 2)?;
            Ok(ParsedRequest::WatchlistRemove {
                symbol: args.symbol(0)?,
                list: args.optional_name(1)?,
            })
        }
        "WC" => {
            args.arity(1, 1)?;
            Ok(ParsedRequest::WatchlistCreate(args.name(0)?))
        }
        "WD" => {
            args.arity(1, 1)?;
            Ok(ParsedRequest::WatchlistDelete(args.name(0)?))
        }
        "S" => {
            if args.values.is_empty() {
                return Err(args.invalid("missing search query"));
            }
            Ok(ParsedRequest::Search(args.values.join(" ")))
        }
        "HELP" => args.arity(0, 0).map(|_| ParsedRequest::Help),
        _ => Err(ParseError::UnknownCommand {
            verb: command.verb.clone(),
        }),
    }
}

struct Args<'a> {
    verb: &'a str,
    values: &'a [String],
}

impl Args<'_> {
    fn invalid(&self, reason: impl Into<String>) -> ParseError {
        ParseError::InvalidArguments {
            verb: self.verb.to_owned(),
            expected: usage_for(self.verb),
            reason: reason.into(),
        }
    }

    fn arity(&self, min: usize, max: usize) -> Result<(), ParseError> {
        let count = self.values.len();
        if count < min {
            return Err(self.invalid(format!(
                "expected at least {min} argument(s), got {count}"
            )));
        }
        if count > max {
            return Err(self.invalid(format!(
                "expected at most {max} argument(s), got {count}"
            )));
        }
        Ok(())
    }

    fn symbol(&self, index: usize) -> Result<Symbol, ParseError> {
        let token = self
            .values
            .get(index)
            .ok_or_else(|| self.invalid("missing symbol"))?;
        Symbol::parse(token).map_err(|e| self.invalid(e.to_string()))
    }

    fn name(&self, index: usize) -> Result<WatchlistName, ParseError> {
        let token = self
            .values
            .get(index)
            .ok_or_else(|| self.invalid("missing watchlist name"))?;
        WatchlistName::parse(token).map_err(|e| self.invalid(e.to_string()))
    }

    fn optional_name(&self, index: usize) -> Result<Option<WatchlistName>, ParseError> {
        match self.values.get(index) {
            Some(_) => self.name(index).map(Some),
            None => Ok(None),
        }
    }

    /// `<SYMBOL> [YEARS] [Q]`; a trailing `Q` selects quarterly periods.
    fn statement(&self, kind: StatementKind) -> Result<ParsedRequest, ParseError> {
        self.arity(1, 3)?;
        let symbol = self.symbol(0)?;

        let mut rest = &self.values[1..];
        let quarterly = matches!(rest.last(), Some(token) if token.eq_ignore_ascii_case("Q"));
        if quarterly {
            rest = &rest[..rest.len() - 1];
        }

        let years = match rest {
            [] => DEFAULT_STATEMENT_YEARS,
            [token] => self.years(token)?,
            _ => return Err(self.invalid("expected at most one year count")),
        };

        Ok(ParsedRequest::Statement(StatementRequest {
            kind,
            symbol,
            years,
            quarterly,
        }))
    }

    fn years(&self, token: &str) -> Result<u32, ParseError> {
        let years = token
            .parse::<u32>()
            .map_err(|_| self.invalid(format!("year count '{token}' is not a number")))?;
        if !(1..=MAX_STATEMENT_YEARS).contains(&years) {
            return Err(self.invalid(format!(
                "year count must be between 1 and {MAX_STATEMENT_YEARS}, got {years}"
            )));
        }
        Ok(years)
    }
}
