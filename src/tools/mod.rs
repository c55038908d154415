//! External collaborators
//!
//! Everything the handlers talk to lives behind a trait here: text generation,
//! knowledge retrieval, market quotes and news feeds. Handlers only see the
//! trait objects, so tests swap in stubs.

pub mod cache;
pub mod news_feed;
pub mod quotes;
pub mod retrieval;

pub use cache::TtlCache;
pub use news_feed::{curate_headlines, NewsFeed, RssNewsFeed};
pub use quotes::{
    CachedQuoteProvider, HttpQuoteSource, QuoteProvider, QuoteSnapshot, QuoteSource,
    UnconfiguredQuoteSource,
};
pub use retrieval::{Document, KnowledgeBase, Retriever};

use crate::config::Settings;
use crate::gemini::{GeminiClient, TextGenerator};
use std::sync::Arc;
use tracing::{info, warn};

/// Collaborator set shared by every handler of a turn
#[derive(Clone)]
pub struct Collaborators {
    pub generator: Arc<dyn TextGenerator>,
    pub retriever: Arc<dyn Retriever>,
    pub quotes: Arc<dyn QuoteProvider>,
    pub news: Arc<dyn NewsFeed>,
}

/// Build the production collaborators from settings.
/// A missing or unreadable knowledge base leaves retrieval empty.
pub fn create_default_collaborators(settings: &Settings) -> Collaborators {
    let generator = Arc::new(GeminiClient::new(
        settings.gemini_api_key.clone(),
        &settings.gemini_model,
    ));

    let knowledge_base = match &settings.kb_dir {
        Some(dir) => KnowledgeBase::load_dir(dir).unwrap_or_else(|e| {
            warn!(error = %e, "Knowledge base unavailable, QA answers will lack context");
            KnowledgeBase::from_documents(Vec::new())
        }),
        None => {
            warn!("KB_DIR not set, QA answers will lack context");
            KnowledgeBase::from_documents(Vec::new())
        }
    };

    let source: Arc<dyn QuoteSource> = match &settings.quote_api_base_url {
        Some(url) => {
            info!(base_url = %url, "Using HTTP quote source");
            Arc::new(HttpQuoteSource::new(url.clone()))
        }
        None => {
            warn!("QUOTE_API_BASE_URL not set, quotes will report errors");
            Arc::new(UnconfiguredQuoteSource)
        }
    };

    Collaborators {
        generator,
        retriever: Arc::new(knowledge_base),
        quotes: Arc::new(CachedQuoteProvider::new(
            source,
            settings.market_cache_ttl_seconds,
        )),
        news: Arc::new(RssNewsFeed::new(settings.news_feeds.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_collaborators_degrade_without_config() {
        let collaborators = create_default_collaborators(&Settings::default());

        let quotes = collaborators.quotes.get_quotes(&["AAPL".to_string()]).await;
        assert!(quotes["AAPL"].error.is_some());

        let docs = collaborators.retriever.retrieve("index fund", None).await.unwrap();
        assert!(docs.is_empty());

        assert!(collaborators.generator.generate("s", "u").await.is_err());
    }
}
