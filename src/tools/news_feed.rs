//! Headline collaborator: RSS/Atom fetching and headline curation

use crate::config::FeedSource;
use crate::error::FinBriefError;
use crate::models::NewsItem;
use crate::Result;
use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};

#[async_trait]
pub trait NewsFeed: Send + Sync {
    /// Topic-filtered, de-duplicated headlines, at most `limit`
    async fn fetch(&self, topic: &str, limit: usize) -> Result<Vec<NewsItem>>;
}

/// Keyword filters per topic. `All` and unknown topics match everything.
pub const TOPIC_KEYWORDS: &[(&str, &[&str])] = &[
    ("Markets", &["stocks", "market", "s&p", "nasdaq", "dow", "equities", "selloff", "rally"]),
    ("Macro", &["inflation", "rates", "fed", "cpi", "jobs", "gdp", "yield", "treasury"]),
    ("Tech", &["apple", "microsoft", "google", "amazon", "meta", "nvidia", "ai", "chip"]),
    ("Crypto", &["bitcoin", "ethereum", "crypto", "sec", "etf", "coinbase"]),
    ("ETFs", &["etf", "index fund", "vanguard", "ishares", "spy", "qqq"]),
    ("Earnings", &["earnings", "guidance", "revenue", "eps", "quarter", "profit", "loss"]),
];

pub fn topic_matches(title: &str, topic: &str) -> bool {
    let keywords = TOPIC_KEYWORDS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(topic))
        .map(|(_, kws)| *kws)
        .unwrap_or(&[]);

    if keywords.is_empty() {
        return true;
    }

    let title = title.to_lowercase();
    keywords.iter().any(|kw| title.contains(kw))
}

/// Lowercase, collapse whitespace, keep only letters, digits and `%&-.,:`
pub fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || " %&-.,:".contains(*c))
        .collect()
}

/// Filter by topic, drop items without title or link, de-duplicate by
/// normalized title, move dated items ahead of undated ones and truncate.
pub fn curate_headlines(items: Vec<NewsItem>, topic: &str, limit: usize) -> Vec<NewsItem> {
    let mut seen = HashSet::new();

    let mut curated: Vec<NewsItem> = items
        .into_iter()
        .filter(|item| !item.title.trim().is_empty() && !item.url.trim().is_empty())
        .filter(|item| topic_matches(&item.title, topic))
        .filter(|item| seen.insert(normalize_title(&item.title)))
        .collect();

    // stable, so feed order is kept within each group
    curated.sort_by_key(|item| item.published.trim().is_empty());
    curated.truncate(limit);
    curated
}

/// Parse an RSS 2.0 or Atom document into headline items
pub fn parse_feed(xml: &str, source: &str) -> Result<Vec<NewsItem>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    let mut current: Option<NewsItem> = None;
    let mut field: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                match name.as_str() {
                    "item" | "entry" => current = Some(empty_item(source)),
                    "link" if current.is_some() => {
                        if let Some(href) = href_attribute(&e) {
                            set_link(current.as_mut(), href);
                        }
                        field = Some(name);
                    }
                    _ => field = Some(name),
                }
            }
            Ok(Event::Empty(e)) => {
                // Atom: <link href="..."/>
                if e.local_name().as_ref() == b"link" {
                    if let Some(href) = href_attribute(&e) {
                        set_link(current.as_mut(), href);
                    }
                }
            }
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| FinBriefError::NewsFeed(format!("Invalid feed text: {}", e)))?;
                apply_field(current.as_mut(), field.as_deref(), &text);
            }
            Ok(Event::CData(c)) => {
                let raw = c.into_inner();
                let text = String::from_utf8_lossy(&raw);
                apply_field(current.as_mut(), field.as_deref(), &text);
            }
            Ok(Event::End(e)) => {
                let name = e.local_name();
                if matches!(name.as_ref(), b"item" | b"entry") {
                    if let Some(item) = current.take() {
                        items.push(item);
                    }
                }
                field = None;
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(FinBriefError::NewsFeed(format!(
                    "Malformed feed from {} at position {}: {}",
                    source,
                    reader.buffer_position(),
                    e
                )))
            }
        }
    }

    Ok(items)
}

fn empty_item(source: &str) -> NewsItem {
    NewsItem {
        title: String::new(),
        url: String::new(),
        published: String::new(),
        source: source.to_string(),
    }
}

fn href_attribute(e: &quick_xml::events::BytesStart<'_>) -> Option<String> {
    e.try_get_attribute("href")
        .ok()
        .flatten()
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
}

fn set_link(item: Option<&mut NewsItem>, href: String) {
    if let Some(item) = item {
        if item.url.is_empty() {
            item.url = href;
        }
    }
}

fn apply_field(item: Option<&mut NewsItem>, field: Option<&str>, text: &str) {
    let (Some(item), Some(field)) = (item, field) else {
        return;
    };
    let text = text.trim();

    match field {
        "title" => item.title.push_str(text),
        "link" if item.url.is_empty() => item.url = text.to_string(),
        "pubDate" | "published" | "updated" if item.published.is_empty() => {
            item.published = text.to_string()
        }
        _ => {}
    }
}

/// Fetches every configured feed. A feed that fails is skipped.
pub struct RssNewsFeed {
    client: Client,
    sources: Vec<FeedSource>,
}

impl RssNewsFeed {
    pub fn new(sources: Vec<FeedSource>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent("finbrief/0.1")
            .build()
            .unwrap_or_default();

        Self { client, sources }
    }

    async fn fetch_source(&self, source: &FeedSource) -> Result<Vec<NewsItem>> {
        let response = self.client.get(&source.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FinBriefError::NewsFeed(format!(
                "{} returned {}",
                source.name, status
            )));
        }
        let body = response.text().await?;
        parse_feed(&body, &source.name)
    }
}

#[async_trait]
impl NewsFeed for RssNewsFeed {
    async fn fetch(&self, topic: &str, limit: usize) -> Result<Vec<NewsItem>> {
        let per_source_cap = (limit * 3).max(20);
        let mut items = Vec::new();

        for source in &self.sources {
            match self.fetch_source(source).await {
                Ok(entries) => {
                    debug!(feed = %source.name, count = entries.len(), "Fetched feed");
                    items.extend(entries.into_iter().take(per_source_cap));
                }
                Err(e) => warn!(feed = %source.name, error = %e, "Skipping feed"),
            }
        }

        Ok(curate_headlines(items, topic, limit))
    }
}
