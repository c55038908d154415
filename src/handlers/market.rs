//! Market quotes handler

use crate::models::{MarketData, MarketRequest};
use crate::state::SessionState;
use crate::tools::QuoteProvider;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info};

pub const MAX_SYMBOLS: usize = 5;

/// Uppercase words that look like tickers but are plain English
const STOPWORDS: &[&str] = &[
    "PRICE", "OF", "THE", "AND", "FOR", "WITH", "LAST", "CLOSE", "QUOTE", "STOCK", "TODAY",
    "WHAT", "SHOW", "GET", "GIVE", "TELL", "DATA", "MARKET", "I", "A", "IS", "MY", "ME", "TO",
    "IN", "ON", "AT", "OR", "AN", "BUY", "SELL", "HOW", "WHY", "NOW",
];

lazy_static! {
    static ref DOLLAR_TICKER: Regex = Regex::new(r"\$([A-Za-z]{1,5})\b").unwrap();
    static ref PLAIN_TICKER: Regex = Regex::new(r"\b[A-Z]{1,5}\b").unwrap();
    static ref ALPHA_TOKEN: Regex = Regex::new(r"\b[A-Za-z]{1,5}\b").unwrap();
}

fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

/// Pull ticker symbols out of free text.
///
/// `$TICKER` markers come first, then uppercase 1-5 letter words. Stop words
/// are dropped, duplicates removed and the list capped at [`MAX_SYMBOLS`].
/// With no candidate left, the last short alphabetic token is tried.
pub fn extract_symbols(message: &str) -> Vec<String> {
    let dollar = DOLLAR_TICKER
        .captures_iter(message)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_uppercase()));
    let plain = PLAIN_TICKER
        .find_iter(message)
        .map(|m| m.as_str().to_string());

    let mut symbols: Vec<String> = Vec::new();
    for candidate in dollar.chain(plain) {
        if !is_stopword(&candidate) && !symbols.contains(&candidate) {
            symbols.push(candidate);
        }
    }

    if symbols.is_empty() {
        if let Some(last) = ALPHA_TOKEN.find_iter(message).last() {
            let last = last.as_str().to_uppercase();
            if !is_stopword(&last) {
                symbols.push(last);
            }
        }
    }

    symbols.truncate(MAX_SYMBOLS);
    symbols
}

fn normalize(symbols: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(symbols.len());
    for raw in symbols {
        let symbol = raw.trim().trim_start_matches('$').to_uppercase();
        if !symbol.is_empty() && !out.contains(&symbol) {
            out.push(symbol);
        }
    }
    out
}

/// Symbols for this turn: explicit request, then holdings (when the portfolio
/// handler follows), then whatever the message mentions.
pub fn resolve_symbols(state: &SessionState, include_holdings: bool) -> Vec<String> {
    if let Some(request) = &state.market_request {
        let explicit = normalize(&request.symbols);
        if !explicit.is_empty() {
            return explicit;
        }
    }

    if include_holdings {
        if let Some(holdings) = &state.portfolio_input {
            let symbols: Vec<String> = holdings.iter().map(|h| h.symbol.clone()).collect();
            let symbols = normalize(&symbols);
            if !symbols.is_empty() {
                return symbols;
            }
        }
    }

    extract_symbols(&state.user_message)
}

/// Fetch quotes into `state.market_data`. Always leaves it populated,
/// possibly empty.
pub async fn run(state: &mut SessionState, quotes: &dyn QuoteProvider, include_holdings: bool) {
    let symbols = resolve_symbols(state, include_holdings);
    info!(?symbols, "Fetching market quotes");

    let data = if symbols.is_empty() {
        MarketData::new()
    } else {
        quotes.get_quotes(&symbols).await
    };

    let failures = data.values().filter(|q| q.error.is_some()).count();
    debug!(quotes = data.len(), failures, "Market data ready");

    state.market_request = Some(MarketRequest { symbols });
    state.market_data = Some(data);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Holding;
    use crate::state::TurnRequest;
    use crate::test_support::RecordingQuotes;

    #[test]
    fn test_price_question_extracts_ticker() {
        assert_eq!(extract_symbols("What's the price of AAPL?"), vec!["AAPL"]);
    }

    #[test]
    fn test_dollar_marker_comes_first() {
        assert_eq!(
            extract_symbols("Compare MSFT with $nvda today"),
            vec!["NVDA", "MSFT"]
        );
    }

    #[test]
    fn test_stopwords_and_duplicates_dropped() {
        assert_eq!(
            extract_symbols("SHOW ME THE QUOTE FOR TSLA AND TSLA"),
            vec!["TSLA"]
        );
    }

    #[test]
    fn test_capped_at_five() {
        let symbols = extract_symbols("AAA BBB CCC DDD EEE FFF GGG");
        assert_eq!(symbols.len(), MAX_SYMBOLS);
        assert_eq!(symbols[0], "AAA");
    }

    #[test]
    fn test_lowercase_fallback_uses_last_token() {
        assert_eq!(extract_symbols("price of msft"), vec!["MSFT"]);
        assert!(extract_symbols("what is the price").is_empty());
    }

    #[test]
    fn test_holdings_used_for_portfolio_path() {
        let request = TurnRequest {
            portfolio_input: Some(vec![
                Holding { symbol: "aapl".into(), quantity: 10.0 },
                Holding { symbol: "MSFT".into(), quantity: 1.0 },
            ]),
            ..Default::default()
        };
        let state = SessionState::new("s", "analyze my portfolio", None, request);

        assert_eq!(resolve_symbols(&state, true), vec!["AAPL", "MSFT"]);
        assert!(resolve_symbols(&state, false).is_empty());
    }

    #[tokio::test]
    async fn test_run_populates_market_data() {
        let quotes = RecordingQuotes::with_prices(&[("AAPL", 150.0)]);
        let mut state = SessionState::new("s", "price of $AAPL and $ZZZZ", None, TurnRequest::default());

        run(&mut state, &quotes, false).await;

        let data = state.market_data.as_ref().unwrap();
        assert_eq!(data["AAPL"].last_price, Some(150.0));
        assert!(data["ZZZZ"].error.is_some());
        assert_eq!(state.market_request.unwrap().symbols, vec!["AAPL", "ZZZZ"]);
    }

    #[tokio::test]
    async fn test_run_without_symbols_leaves_empty_map() {
        let quotes = RecordingQuotes::with_prices(&[]);
        let mut state = SessionState::new("s", "what is the price", None, TurnRequest::default());

        run(&mut state, &quotes, false).await;

        assert!(state.market_data.unwrap().is_empty());
        assert_eq!(quotes.calls().await, 0);
    }
}
