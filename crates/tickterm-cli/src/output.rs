use std::io::{self, Write};

use tickterm_core::currency;
use tickterm_core::payload::{
    BasketView, ChartView, EconView, EntryOutcome, FinancialsView, HelpView, MoversView, NewsView,
    ProfileView, QuoteLine, QuoteView, SearchView, StatementView, WatchlistView, YieldView,
};
use tickterm_core::{DisplayEnvelope, DisplayPayload};

use crate::cli::OutputFormat;
use crate::error::CliError;

pub fn render(envelope: &DisplayEnvelope, format: OutputFormat, pretty: bool) -> Result<(), CliError> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match format {
        OutputFormat::Json => {
            let payload = if pretty {
                serde_json::to_string_pretty(envelope)?
            } else {
                serde_json::to_string(envelope)?
            };
            writeln!(out, "{payload}")?;
        }
        OutputFormat::Text => {
            for line in text_lines(&envelope.payload) {
                writeln!(out, "{line}")?;
            }
        }
    }

    out.flush()?;
    Ok(())
}

pub fn text_lines(payload: &DisplayPayload) -> Vec<String> {
    match payload {
        DisplayPayload::Quote(view) => quote_lines(view),
        DisplayPayload::Chart(view) => chart_lines(view),
        DisplayPayload::Fundamentals(view) => profile_lines(view),
        DisplayPayload::Financials(view) => financials_lines(view),
        DisplayPayload::Statement(view) => statement_lines(view),
        DisplayPayload::Index(view) | DisplayPayload::Forex(view) => basket_lines(view),
        DisplayPayload::Yield(view) => yield_lines(view),
        DisplayPayload::Movers(view) => movers_lines(view),
        DisplayPayload::EconStats(view) => econ_lines(view),
        DisplayPayload::News(view) => news_lines(view),
        DisplayPayload::Watchlist(view) => watchlist_lines(view),
        DisplayPayload::Notice { message } => vec![message.clone()],
        DisplayPayload::Search(view) => search_lines(view),
        DisplayPayload::Help(view) => help_lines(view),
    }
}

fn quote_lines(view: &QuoteView) -> Vec<String> {
    let mut lines = vec![
        format!("{}  {}", view.symbol, view.name.as_deref().unwrap_or("")),
        format!(
            "{}  {} ({:+}%)",
            view.price.formatted, view.change.formatted, view.change_percent
        ),
    ];

    let mut details = Vec::new();
    if let (Some(low), Some(high)) = (&view.day_low, &view.day_high) {
        details.push(format!("Range {} - {}", low.formatted, high.formatted));
    }
    if let Some(volume) = view.volume {
        details.push(format!("Vol {volume}"));
    }
    if let Some(cap) = &view.market_cap {
        details.push(format!("Mkt cap {}", cap.formatted));
    }
    if !details.is_empty() {
        lines.push(details.join("  "));
    }
    if !view.currency_recognized {
        lines.push(format!("! unknown exchange suffix, showing {}", view.currency));
    }

    for headline in &view.headlines {
        match &headline.site {
            Some(site) => lines.push(format!("  - {} ({site})", headline.title)),
            None => lines.push(format!("  - {}", headline.title)),
        }
    }
    lines
}

fn chart_lines(view: &ChartView) -> Vec<String> {
    let max_label = currency::localize(&view.symbol, view.chart.axis.max_close).formatted;
    let min_label = currency::localize(&view.symbol, view.chart.axis.min_close).formatted;

    let mut lines = vec![format!(
        "{} {}  {} ({:+}%)  H {}  L {}",
        view.symbol,
        view.period,
        view.last_close.formatted,
        view.change_percent,
        view.high.formatted,
        view.low.formatted
    )];
    lines.extend(view.chart.framed_lines(&max_label, &min_label));
    lines
}

fn profile_lines(view: &ProfileView) -> Vec<String> {
    let profile = &view.profile;
    let mut lines = vec![format!("{}  {}", profile.symbol, profile.name)];
    let fields = [
        ("Exchange", profile.exchange.clone()),
        ("Sector", profile.sector.clone()),
        ("Industry", profile.industry.clone()),
        ("CEO", profile.ceo.clone()),
        ("Country", profile.country.clone()),
        ("Employees", profile.employees.map(|count| count.to_string())),
        ("Market cap", view.market_cap.as_ref().map(|cap| cap.formatted.clone())),
        ("Website", profile.website.clone()),
    ];
    lines.extend(
        fields
            .into_iter()
            .filter_map(|(label, value)| value.map(|value| format!("{label:<12} {value}"))),
    );
    if let Some(description) = &profile.description {
        lines.push(String::new());
        lines.push(description.clone());
    }
    lines
}

fn financials_lines(view: &FinancialsView) -> Vec<String> {
    let ratios = &view.ratios;
    let percent = |value: Option<f64>| value.map(|v| format!("{:.2}%", v * 100.0));
    let times = |value: Option<f64>| value.map(|v| format!("{v:.2}x"));

    let mut lines = vec![format!(
        "{}  {} ({:+}%)",
        view.quote.symbol, view.quote.price.formatted, view.quote.change_percent
    )];
    let fields = [
        ("Market cap", view.market_cap.as_ref().map(|cap| cap.formatted.clone())),
        ("Enterprise value", view.enterprise_value.as_ref().map(|ev| ev.formatted.clone())),
        ("P/E", times(ratios.pe_ratio)),
        ("P/B", times(ratios.price_to_book)),
        ("P/S", times(ratios.price_to_sales)),
        ("Gross margin", percent(ratios.gross_margin)),
        ("Operating margin", percent(ratios.operating_margin)),
        ("Net margin", percent(ratios.net_margin)),
        ("ROE", percent(ratios.return_on_equity)),
        ("ROA", percent(ratios.return_on_assets)),
        ("Current ratio", times(ratios.current_ratio)),
        ("Quick ratio", times(ratios.quick_ratio)),
        ("Debt/equity", times(ratios.debt_to_equity)),
        ("Dividend yield", percent(ratios.dividend_yield)),
        ("Payout ratio", percent(ratios.payout_ratio)),
    ];
    lines.extend(fields.into_iter().map(|(label, value)| {
        format!("{label:<18} {}", value.unwrap_or_else(|| String::from("-")))
    }));
    lines
}

fn statement_lines(view: &StatementView) -> Vec<String> {
    let mut header = format!("{:<28}", format!("{} {}", view.symbol, view.kind.title()));
    for column in &view.columns {
        header.push_str(&format!("{column:>14}"));
    }

    let mut lines = vec![header];
    for row in &view.rows {
        let mut line = format!("{:<28}", row.label);
        for value in &row.values {
            let cell = value.as_ref().map_or("-", |amount| amount.formatted.as_str());
            line.push_str(&format!("{cell:>14}"));
        }
        lines.push(line);
    }
    lines
}

fn basket_lines(view: &BasketView) -> Vec<String> {
    let mut lines = vec![view.title.clone()];
    lines.extend(view.rows.iter().map(|row| {
        let label = format!("{:<20} {:<10}", row.label, row.symbol.as_str());
        outcome_line(&label, &row.outcome)
    }));
    lines
}

fn yield_lines(view: &YieldView) -> Vec<String> {
    let mut lines = vec![format!("US Treasury yields ({})", view.as_of)];
    lines.extend(view.rows.iter().map(|row| match row.change_bp {
        Some(change) => format!("{:<5} {:>6}%  {:+}bp", row.maturity, row.rate, change),
        None => format!("{:<5} {:>6}%", row.maturity, row.rate),
    }));
    lines
}

fn movers_lines(view: &MoversView) -> Vec<String> {
    let mut lines = vec![String::from("Most active movers")];
    lines.extend(view.quotes.iter().map(|quote| {
        let label = format!("{:<10}", quote.symbol.as_str());
        format!("{label} {}", quote_cells(quote))
    }));
    lines
}

fn econ_lines(view: &EconView) -> Vec<String> {
    let mut lines = vec![String::from("Economic indicators")];
    lines.extend(view.rows.iter().map(|row| {
        let label = format!("{:<28}", row.label);
        match &row.outcome {
            EntryOutcome::Resolved(value) => match value.value {
                Some(number) => format!("{label} {number} {} ({})", row.unit, value.date),
                None => format!("{label} n/a ({})", value.date),
            },
            EntryOutcome::Failed { reason, .. } => format!("{label} error: {reason}"),
        }
    }));
    lines
}

fn news_lines(view: &NewsView) -> Vec<String> {
    let title = match &view.symbol {
        Some(symbol) => format!("News for {symbol}"),
        None => String::from("Top headlines"),
    };
    let mut lines = vec![title];
    if view.articles.is_empty() {
        lines.push(String::from("no headlines"));
    }
    lines.extend(view.articles.iter().map(|article| {
        let date = article.published_at.date();
        match &article.site {
            Some(site) => format!("{date}  {} ({site})", article.title),
            None => format!("{date}  {}", article.title),
        }
    }));
    lines
}

fn watchlist_lines(view: &WatchlistView) -> Vec<String> {
    let mut lines = vec![format!("Watchlist '{}' ({} symbols)", view.name, view.rows.len())];
    lines.extend(view.rows.iter().map(|row| {
        let label = format!("{:<10}", row.symbol.as_str());
        outcome_line(&label, &row.outcome)
    }));
    if view.available.len() > 1 {
        let names: Vec<&str> = view.available.iter().map(|name| name.as_str()).collect();
        lines.push(format!("Lists: {}", names.join(", ")));
    }
    lines
}

fn search_lines(view: &SearchView) -> Vec<String> {
    if view.hits.is_empty() {
        return vec![format!("no matches for '{}'", view.query)];
    }
    view.hits
        .iter()
        .map(|hit| {
            format!(
                "{:<10} {:<36} {}",
                hit.symbol,
                hit.name,
                hit.exchange.as_deref().unwrap_or("")
            )
        })
        .collect()
}

fn help_lines(view: &HelpView) -> Vec<String> {
    view.verbs
        .iter()
        .map(|spec| format!("{:<38} {}", spec.usage, spec.description))
        .collect()
}

fn outcome_line(label: &str, outcome: &EntryOutcome<QuoteLine>) -> String {
    match outcome {
        EntryOutcome::Resolved(quote) => format!("{label} {}", quote_cells(quote)),
        EntryOutcome::Failed { reason, .. } => format!("{label} error: {reason}"),
    }
}

fn quote_cells(quote: &QuoteLine) -> String {
    let amount = quote.change.amount;
    let change = if amount.is_sign_positive() && !amount.is_zero() {
        format!("+{}", quote.change.formatted)
    } else {
        quote.change.formatted.clone()
    };
    format!("{:>14} {:>12} {:>+8}%", quote.price.formatted, change, quote.change_percent)
}
