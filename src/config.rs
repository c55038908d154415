//! Runtime settings loaded from the environment (and `.env` when present)

use crate::error::FinBriefError;
use crate::Result;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_MARKET_CACHE_TTL_SECONDS: u64 = 1800;
const DEFAULT_API_PORT: u16 = 8080;

/// Business RSS feeds polled by the news handler when `NEWS_FEEDS` is unset
pub const DEFAULT_NEWS_FEEDS: &[(&str, &str)] = &[
    ("Reuters Business", "https://feeds.reuters.com/reuters/businessNews"),
    ("Yahoo Finance", "https://finance.yahoo.com/rss/"),
    ("MarketWatch Top Stories", "https://www.marketwatch.com/rss/topstories"),
    ("Investing.com News", "https://www.investing.com/rss/news.rss"),
];

#[derive(Debug, Clone)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub quote_api_base_url: Option<String>,
    pub market_cache_ttl_seconds: u64,
    pub kb_dir: Option<PathBuf>,
    pub news_feeds: Vec<FeedSource>,
    pub database_url: Option<String>,
    pub api_port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gemini_api_key: String::new(),
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            quote_api_base_url: None,
            market_cache_ttl_seconds: DEFAULT_MARKET_CACHE_TTL_SECONDS,
            kb_dir: None,
            news_feeds: default_feeds(),
            database_url: None,
            api_port: DEFAULT_API_PORT,
        }
    }
}

impl Settings {
    /// Load settings, reading `.env` first if one exists.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let defaults = Settings::default();

        let news_feeds = match non_empty_var("NEWS_FEEDS") {
            Some(raw) => parse_feeds(&raw)?,
            None => defaults.news_feeds,
        };

        Ok(Self {
            gemini_api_key: env::var("GEMINI_API_KEY").unwrap_or_default(),
            gemini_model: non_empty_var("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            quote_api_base_url: non_empty_var("QUOTE_API_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string()),
            market_cache_ttl_seconds: parse_var(
                "MARKET_CACHE_TTL_SECONDS",
                defaults.market_cache_ttl_seconds,
            )?,
            kb_dir: non_empty_var("KB_DIR").map(PathBuf::from),
            news_feeds,
            database_url: non_empty_var("POSTGRES_URL").or_else(|| non_empty_var("DATABASE_URL")),
            api_port: match non_empty_var("PORT").or_else(|| non_empty_var("API_PORT")) {
                Some(raw) => parse_value("PORT", &raw)?,
                None => defaults.api_port,
            },
        })
    }
}

fn default_feeds() -> Vec<FeedSource> {
    DEFAULT_NEWS_FEEDS
        .iter()
        .map(|(name, url)| FeedSource {
            name: name.to_string(),
            url: url.to_string(),
        })
        .collect()
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: FromStr>(key: &str, default: T) -> Result<T> {
    match non_empty_var(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| FinBriefError::Config(format!("{} has an invalid value: {:?}", key, raw)))
}

/// Parse `name=url;name=url` into feed sources.
fn parse_feeds(raw: &str) -> Result<Vec<FeedSource>> {
    raw.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (name, url) = entry.split_once('=').ok_or_else(|| {
                FinBriefError::Config(format!("NEWS_FEEDS entry must be name=url, got {:?}", entry))
            })?;
            Ok(FeedSource {
                name: name.trim().to_string(),
                url: url.trim().to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_feeds() {
        let feeds = parse_feeds("Wire=https://a.example/rss; Other=https://b.example/feed ;").unwrap();
        assert_eq!(feeds.len(), 2);
        assert_eq!(feeds[0].name, "Wire");
        assert_eq!(feeds[1].url, "https://b.example/feed");
    }

    #[test]
    fn test_parse_feeds_rejects_missing_url() {
        assert!(parse_feeds("just-a-name").is_err());
    }

    #[test]
    fn test_parse_value_reports_key() {
        let err = parse_value::<u64>("MARKET_CACHE_TTL_SECONDS", "soon").unwrap_err();
        assert!(err.to_string().contains("MARKET_CACHE_TTL_SECONDS"));
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.market_cache_ttl_seconds, 1800);
        assert_eq!(settings.news_feeds.len(), DEFAULT_NEWS_FEEDS.len());
        assert!(settings.database_url.is_none());
    }
}
