//! Scripted collaborators for unit tests

use crate::error::FinBriefError;
use crate::gemini::TextGenerator;
use crate::models::{MarketData, NewsItem, Quote};
use crate::tools::{Collaborators, Document, NewsFeed, QuoteProvider, Retriever};
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

pub fn doc(title: &str, category: &str, content: &str) -> Document {
    Document {
        content: content.to_string(),
        source: format!("{}.txt", title.to_lowercase().replace(' ', "_")),
        title: title.to_string(),
        category: category.to_string(),
    }
}

pub fn headline(title: &str, source: &str) -> NewsItem {
    NewsItem {
        title: title.to_string(),
        url: format!("https://news.test/{}", title.to_lowercase().replace(' ', "-")),
        published: "Mon, 01 Jan 2024 09:00:00 GMT".to_string(),
        source: source.to_string(),
    }
}

/// Returns the same text for every prompt and records the user prompts
pub struct FixedGenerator {
    text: String,
    prompts: Mutex<Vec<String>>,
}

impl FixedGenerator {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub async fn calls(&self) -> usize {
        self.prompts.lock().await.len()
    }

    pub async fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().await.last().cloned()
    }
}

#[async_trait]
impl TextGenerator for FixedGenerator {
    async fn generate(&self, _system_prompt: &str, user_prompt: &str) -> Result<String> {
        self.prompts.lock().await.push(user_prompt.to_string());
        Ok(self.text.clone())
    }
}

pub struct FailingGenerator;

#[async_trait]
impl TextGenerator for FailingGenerator {
    async fn generate(&self, _system_prompt: &str, _user_prompt: &str) -> Result<String> {
        Err(FinBriefError::Llm("model unavailable".to_string()))
    }
}

pub struct StaticRetriever {
    documents: Vec<Document>,
    honor_category: bool,
}

impl StaticRetriever {
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            documents,
            honor_category: true,
        }
    }

    /// Ignores the category argument
    pub fn unfiltered(documents: Vec<Document>) -> Self {
        Self {
            documents,
            honor_category: false,
        }
    }
}

#[async_trait]
impl Retriever for StaticRetriever {
    async fn retrieve(&self, _query: &str, category: Option<&str>) -> Result<Vec<Document>> {
        Ok(self
            .documents
            .iter()
            .filter(|d| {
                !self.honor_category || category.map_or(true, |c| d.category.eq_ignore_ascii_case(c))
            })
            .cloned()
            .collect())
    }
}

/// Prices from a fixed table; every call is logged in order
pub struct RecordingQuotes {
    prices: HashMap<String, f64>,
    requests: Mutex<Vec<Vec<String>>>,
}

impl RecordingQuotes {
    pub fn with_prices(prices: &[(&str, f64)]) -> Self {
        Self {
            prices: prices.iter().map(|(s, p)| (s.to_string(), *p)).collect(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub async fn calls(&self) -> usize {
        self.requests.lock().await.len()
    }

    pub async fn requests(&self) -> Vec<Vec<String>> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl QuoteProvider for RecordingQuotes {
    async fn get_quotes(&self, symbols: &[String]) -> MarketData {
        self.requests.lock().await.push(symbols.to_vec());

        symbols
            .iter()
            .map(|symbol| {
                let quote = match self.prices.get(symbol) {
                    Some(price) => Quote {
                        symbol: symbol.clone(),
                        last_price: Some(*price),
                        previous_close: None,
                        pct_change: None,
                        market_cap: None,
                        currency: Some("USD".to_string()),
                        history: Vec::new(),
                        history_dates: Vec::new(),
                        source: "stub".to_string(),
                        cache_hit: false,
                        fetched_at: Utc::now(),
                        error: None,
                    },
                    None => Quote::failed(symbol, "Failed to fetch quote: unknown symbol"),
                };
                (symbol.clone(), quote)
            })
            .collect()
    }
}

pub struct StaticNewsFeed {
    items: Option<Vec<NewsItem>>,
}

impl StaticNewsFeed {
    pub fn new(items: Vec<NewsItem>) -> Self {
        Self { items: Some(items) }
    }

    pub fn failing() -> Self {
        Self { items: None }
    }
}

#[async_trait]
impl NewsFeed for StaticNewsFeed {
    async fn fetch(&self, _topic: &str, limit: usize) -> Result<Vec<NewsItem>> {
        match &self.items {
            Some(items) => Ok(items.iter().take(limit).cloned().collect()),
            None => Err(FinBriefError::NewsFeed("feed unreachable".to_string())),
        }
    }
}

/// Stub collaborator set; the quote provider is returned for inspection
pub fn collaborators(
    generator: Arc<dyn TextGenerator>,
    documents: Vec<Document>,
    prices: &[(&str, f64)],
    headlines: Vec<NewsItem>,
) -> (Collaborators, Arc<RecordingQuotes>) {
    let quotes = Arc::new(RecordingQuotes::with_prices(prices));
    let collaborators = Collaborators {
        generator,
        retriever: Arc::new(StaticRetriever::new(documents)),
        quotes: quotes.clone(),
        news: Arc::new(StaticNewsFeed::new(headlines)),
    };
    (collaborators, quotes)
}
