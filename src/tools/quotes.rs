//! Market quote collaborator
//!
//! `QuoteProvider` is what handlers see: it never fails, problems come back as
//! `Quote::error`. `CachedQuoteProvider` layers a TTL cache over a raw
//! `QuoteSource`.

use crate::error::FinBriefError;
use crate::models::{MarketData, Quote};
use crate::tools::cache::TtlCache;
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Quotes keyed by uppercase symbol. Every requested symbol gets an entry.
    async fn get_quotes(&self, symbols: &[String]) -> MarketData;
}

/// Raw price data for one symbol
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuoteSnapshot {
    #[serde(default)]
    pub last_price: Option<f64>,
    #[serde(default)]
    pub previous_close: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub history: Vec<PricePoint>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PricePoint {
    pub date: String,
    pub close: f64,
}

#[async_trait]
pub trait QuoteSource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn fetch(&self, symbol: &str) -> Result<QuoteSnapshot>;
}

/// JSON quote service: `GET {base_url}/api/v1/quote/{SYMBOL}`
pub struct HttpQuoteSource {
    client: Client,
    base_url: String,
}

impl HttpQuoteSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl QuoteSource for HttpQuoteSource {
    fn name(&self) -> &'static str {
        "quote_api"
    }

    async fn fetch(&self, symbol: &str) -> Result<QuoteSnapshot> {
        let url = format!("{}/api/v1/quote/{}", self.base_url, symbol);

        let response = self.client.get(&url).send().await.map_err(|e| {
            FinBriefError::MarketData(format!("Quote request failed for {}: {}", symbol, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FinBriefError::MarketData(format!(
                "Quote API returned {} for {}: {}",
                status, symbol, body
            )));
        }

        response
            .json::<QuoteSnapshot>()
            .await
            .map_err(|e| FinBriefError::MarketData(format!("Invalid quote payload: {}", e)))
    }
}

/// Source used when no quote service is configured
pub struct UnconfiguredQuoteSource;

#[async_trait]
impl QuoteSource for UnconfiguredQuoteSource {
    fn name(&self) -> &'static str {
        "unconfigured"
    }

    async fn fetch(&self, _symbol: &str) -> Result<QuoteSnapshot> {
        Err(FinBriefError::MarketData(
            "QUOTE_API_BASE_URL is not configured".to_string(),
        ))
    }
}

/// TTL-cached provider keyed by `quote:<SYMBOL>`
pub struct CachedQuoteProvider {
    source: Arc<dyn QuoteSource>,
    cache: TtlCache<Quote>,
}

impl CachedQuoteProvider {
    pub fn new(source: Arc<dyn QuoteSource>, ttl_seconds: u64) -> Self {
        Self {
            source,
            cache: TtlCache::new(ttl_seconds),
        }
    }

    async fn quote_for(&self, symbol: &str) -> Quote {
        let key = format!("quote:{}", symbol);

        if let Some(mut cached) = self.cache.get(&key).await {
            debug!(symbol, "Quote cache hit");
            cached.cache_hit = true;
            return cached;
        }

        match self.source.fetch(symbol).await {
            Ok(snapshot) => match build_quote(symbol, self.source.name(), snapshot) {
                Some(quote) => {
                    self.cache.set(&key, quote.clone()).await;
                    quote
                }
                None => Quote::failed(
                    symbol,
                    "Failed to fetch quote: no price returned by the provider",
                ),
            },
            Err(e) => {
                warn!(symbol, error = %e, "Quote fetch failed");
                Quote::failed(symbol, format!("Failed to fetch quote: {}", e))
            }
        }
    }
}

#[async_trait]
impl QuoteProvider for CachedQuoteProvider {
    async fn get_quotes(&self, symbols: &[String]) -> MarketData {
        let mut quotes = MarketData::new();

        for raw in symbols {
            let symbol = raw.trim().to_uppercase();
            if symbol.is_empty() || quotes.contains_key(&symbol) {
                continue;
            }
            let quote = self.quote_for(&symbol).await;
            quotes.insert(symbol, quote);
        }

        quotes
    }
}

/// Turn a snapshot into a quote. `None` when there is no last price.
pub fn build_quote(symbol: &str, source: &str, snapshot: QuoteSnapshot) -> Option<Quote> {
    let last_price = snapshot.last_price?;

    let history: Vec<f64> = snapshot.history.iter().map(|p| p.close).collect();
    let history_dates: Vec<String> = snapshot.history.iter().map(|p| p.date.clone()).collect();

    let previous_close = snapshot.previous_close.or_else(|| {
        if history.len() >= 2 {
            history.get(history.len() - 2).copied()
        } else {
            None
        }
    });

    let pct_change = match previous_close {
        Some(prev) if prev != 0.0 => Some((last_price - prev) / prev * 100.0),
        _ => None,
    };

    Some(Quote {
        symbol: symbol.to_string(),
        last_price: Some(last_price),
        previous_close,
        pct_change,
        market_cap: snapshot.market_cap,
        currency: snapshot.currency,
        history,
        history_dates,
        source: source.to_string(),
        cache_hit: false,
        fetched_at: Utc::now(),
        error: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl QuoteSource for CountingSource {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn fetch(&self, symbol: &str) -> Result<QuoteSnapshot> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match symbol {
                "AAPL" => Ok(QuoteSnapshot {
                    last_price: Some(110.0),
                    previous_close: Some(100.0),
                    ..Default::default()
                }),
                "EMPTY" => Ok(QuoteSnapshot::default()),
                _ => Err(FinBriefError::MarketData("unknown symbol".to_string())),
            }
        }
    }

    #[test]
    fn test_pct_change() {
        let quote = build_quote(
            "AAPL",
            "test",
            QuoteSnapshot {
                last_price: Some(110.0),
                previous_close: Some(100.0),
                ..Default::default()
            },
        )
        .unwrap();
        assert!((quote.pct_change.unwrap() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_previous_close_inferred_from_history() {
        let history = vec![
            PricePoint { date: "2024-01-01".into(), close: 90.0 },
            PricePoint { date: "2024-01-02".into(), close: 100.0 },
            PricePoint { date: "2024-01-03".into(), close: 105.0 },
        ];
        let quote = build_quote(
            "MSFT",
            "test",
            QuoteSnapshot {
                last_price: Some(105.0),
                history,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(quote.previous_close, Some(100.0));
        assert_eq!(quote.history_dates.len(), 3);
    }

    #[test]
    fn test_zero_previous_close_has_no_change() {
        let quote = build_quote(
            "X",
            "test",
            QuoteSnapshot {
                last_price: Some(1.0),
                previous_close: Some(0.0),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(quote.pct_change.is_none());
    }

    #[tokio::test]
    async fn test_cache_and_in_band_errors() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
        });
        let provider = CachedQuoteProvider::new(source.clone(), 60);

        let symbols = vec!["aapl".to_string(), "NOPE".to_string(), "EMPTY".to_string()];
        let first = provider.get_quotes(&symbols).await;
        assert_eq!(first.len(), 3);
        assert!(!first["AAPL"].cache_hit);
        assert!(first["NOPE"].error.as_deref().unwrap().starts_with("Failed to fetch quote"));
        assert!(first["EMPTY"].error.is_some());

        let second = provider.get_quotes(&symbols).await;
        assert!(second["AAPL"].cache_hit);
        // errors are never cached
        assert_eq!(source.calls.load(Ordering::SeqCst), 5);
    }
}
