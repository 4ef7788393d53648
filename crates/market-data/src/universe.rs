//! Symbol universe discovery.
//!
//! The universe comes from a public ticker-list page; on any failure a small
//! hardcoded list of major tickers is returned instead of an error, so the
//! screener always has something to work with.

use screener_core::normalize_symbol;
use std::time::Duration;

const UNIVERSE_URL: &str = "https://www.slickcharts.com/sp500";

/// Major large-cap tickers used when the universe page cannot be fetched.
pub fn fallback_universe() -> Vec<String> {
    [
        "AAPL", "MSFT", "GOOGL", "AMZN", "NVDA", "TSLA", "META", "BRK.B", "V", "JPM",
        "WMT", "MA", "PG", "HD", "DIS", "NFLX", "ADBE", "CRM", "CSCO", "INTC",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Fetch the ticker universe from the public list page.
///
/// Symbols are pulled out of table-cell links of the form
/// `href="/symbol/XXXX"`. Any fetch or parse failure falls back to
/// `fallback_universe()`.
pub async fn fetch_universe() -> Vec<String> {
    match try_fetch_universe().await {
        Ok(symbols) if !symbols.is_empty() => symbols,
        Ok(_) => {
            tracing::warn!("universe page parsed to zero symbols, using fallback list");
            fallback_universe()
        }
        Err(e) => {
            tracing::warn!("failed to fetch ticker universe ({e}), using fallback list");
            fallback_universe()
        }
    }
}

async fn try_fetch_universe() -> Result<Vec<String>, reqwest::Error> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent("Mozilla/5.0 (stock-screener)")
        .build()?;

    let html = client.get(UNIVERSE_URL).send().await?.text().await?;
    Ok(parse_symbol_links(&html))
}

fn parse_symbol_links(html: &str) -> Vec<String> {
    let mut symbols = Vec::new();
    for chunk in html.split("href=\"/symbol/").skip(1) {
        let Some(end) = chunk.find('"') else { continue };
        if let Ok(symbol) = normalize_symbol(&chunk[..end]) {
            if !symbols.contains(&symbol) {
                symbols.push(symbol);
            }
        }
    }
    symbols
}
