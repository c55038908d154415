//! News synthesis handler

use crate::gemini::TextGenerator;
use crate::models::{Citation, NewsItem, NewsRequest, NewsSummary, Outcome};
use crate::state::SessionState;
use crate::tools::NewsFeed;
use tracing::{info, warn};

/// Headlines passed to generation at most
pub const MAX_HEADLINES: usize = 5;

pub const NO_HEADLINES_SUMMARY: &str =
    "No headlines were retrieved for the selected topic. Try **All** or increase the limit.";

const NEWS_SYSTEM_PROMPT: &str = "You are a Financial News Synthesizer. \
You summarize and contextualize financial news for a general audience. \
Be factual. Do not hallucinate numbers or events. \
If details are missing, say so. \
Do not provide personalized financial advice.\n\n\
Output format:\n\
### Top stories\n\
- Headline, why it matters, what to watch next (include citation tags like [1])\n\n\
### Themes & signal\n\
- 3-5 bullets synthesizing patterns across stories\n\n\
### Risk notes\n\
- 2-3 bullets: what could change the narrative\n";

fn citations(items: &[NewsItem]) -> Vec<Citation> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| Citation {
            id: i + 1,
            title: item.title.clone(),
            source: item.source.clone(),
            category: None,
            url: Some(item.url.clone()),
            published: Some(item.published.clone()),
        })
        .collect()
}

fn headline_context(items: &[NewsItem]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            format!(
                "[{}] {}\nSource: {}\nPublished: {}\nURL: {}",
                i + 1,
                item.title,
                item.source,
                item.published,
                item.url
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Plain headline list used when generation is unavailable
fn headline_digest(items: &[NewsItem], reason: &str) -> String {
    let mut lines = vec![format!("_Summary unavailable ({}). Latest headlines:_", reason)];
    lines.extend(
        items
            .iter()
            .enumerate()
            .map(|(i, item)| format!("- [{}] {} ({})", i + 1, item.title, item.source)),
    );
    lines.join("\n")
}

pub async fn summarize(
    request: &NewsRequest,
    feed: &dyn NewsFeed,
    generator: &dyn TextGenerator,
) -> Outcome<NewsSummary> {
    let limit = request.limit.clamp(1, MAX_HEADLINES);

    let mut items = match feed.fetch(&request.topic, limit).await {
        Ok(items) => items,
        Err(e) => {
            warn!(error = %e, topic = %request.topic, "News fetch failed");
            return Outcome::failed(format!("Failed to fetch news: {}", e));
        }
    };
    items.truncate(limit);

    if items.is_empty() {
        return Outcome::Ready(NewsSummary {
            topic: request.topic.clone(),
            summary: NO_HEADLINES_SUMMARY.to_string(),
            items,
            citations: Vec::new(),
        });
    }

    let prompt = format!(
        "Topic filter: {}\nHeadlines:\n\n{}\n\n\
         Synthesize these headlines. Use citations [1], [2], etc when referencing a specific story.",
        request.topic,
        headline_context(&items)
    );

    let summary = match generator.generate(NEWS_SYSTEM_PROMPT, &prompt).await {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "News synthesis failed, falling back to headline digest");
            headline_digest(&items, "text generation failed")
        }
    };

    Outcome::Ready(NewsSummary {
        topic: request.topic.clone(),
        summary,
        citations: citations(&items),
        items,
    })
}

pub async fn run(state: &mut SessionState, feed: &dyn NewsFeed, generator: &dyn TextGenerator) {
    let request = state.news_request.clone().unwrap_or_default();
    let outcome = summarize(&request, feed, generator).await;

    info!(
        topic = %request.topic,
        headlines = outcome.ready().map_or(0, |s| s.items.len()),
        "News summary ready"
    );

    state.news_request = Some(request);
    state.news_summary = Some(outcome);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{headline, FailingGenerator, FixedGenerator, StaticNewsFeed};

    #[tokio::test]
    async fn test_summary_carries_citations() {
        let feed = StaticNewsFeed::new(vec![
            headline("Fed holds rates", "Reuters Business"),
            headline("Stocks rally", "Yahoo Finance"),
        ]);
        let generator = FixedGenerator::new("Rates unchanged [1]; equities up [2].");

        let outcome = summarize(&NewsRequest::default(), &feed, &generator).await;

        let summary = outcome.ready().unwrap();
        assert_eq!(summary.citations.len(), 2);
        assert_eq!(summary.citations[1].id, 2);
        assert_eq!(summary.citations[1].source, "Yahoo Finance");
        assert!(generator.last_prompt().await.unwrap().contains("[2] Stocks rally"));
    }

    #[tokio::test]
    async fn test_headlines_capped() {
        let feed = StaticNewsFeed::new((0..9).map(|i| headline(&format!("Story {}", i), "Wire")).collect());
        let request = NewsRequest {
            topic: "All".to_string(),
            limit: 20,
        };

        let outcome = summarize(&request, &feed, &FixedGenerator::new("ok")).await;
        assert_eq!(outcome.ready().unwrap().items.len(), MAX_HEADLINES);
    }

    #[tokio::test]
    async fn test_no_headlines_is_not_an_error() {
        let feed = StaticNewsFeed::new(vec![]);
        let generator = FixedGenerator::new("unused");

        let outcome = summarize(&NewsRequest::default(), &feed, &generator).await;

        assert_eq!(outcome.ready().unwrap().summary, NO_HEADLINES_SUMMARY);
        assert_eq!(generator.calls().await, 0);
    }

    #[tokio::test]
    async fn test_generation_failure_degrades_to_digest() {
        let feed = StaticNewsFeed::new(vec![headline("Bitcoin jumps", "Wire")]);

        let outcome = summarize(&NewsRequest::default(), &feed, &FailingGenerator).await;

        let summary = outcome.ready().unwrap();
        assert!(summary.summary.contains("Summary unavailable"));
        assert!(summary.summary.contains("Bitcoin jumps"));
    }

    #[tokio::test]
    async fn test_feed_failure_is_in_band() {
        let outcome = summarize(
            &NewsRequest::default(),
            &StaticNewsFeed::failing(),
            &FixedGenerator::new("unused"),
        )
        .await;

        assert!(outcome.error().unwrap().starts_with("Failed to fetch news"));
    }
}
