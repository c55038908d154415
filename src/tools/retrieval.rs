//! Knowledge-base retrieval
//!
//! `KnowledgeBase` is a small in-memory retriever: articles are split into
//! overlapping chunks and ranked by how many query terms they share.

use crate::error::FinBriefError;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

pub const CHUNK_SIZE: usize = 800;
pub const CHUNK_OVERLAP: usize = 150;
pub const TOP_K: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub content: String,
    pub source: String,
    pub title: String,
    pub category: String,
}

#[async_trait]
pub trait Retriever: Send + Sync {
    /// Most relevant documents first. `category` restricts results when set.
    async fn retrieve(&self, query: &str, category: Option<&str>) -> Result<Vec<Document>>;
}

#[derive(Debug)]
pub struct KnowledgeBase {
    chunks: Vec<Document>,
}

impl KnowledgeBase {
    /// Chunk the given articles
    pub fn from_documents(documents: Vec<Document>) -> Self {
        let chunks = documents
            .into_iter()
            .flat_map(|doc| {
                chunk_text(&doc.content, CHUNK_SIZE, CHUNK_OVERLAP)
                    .into_iter()
                    .map(move |content| Document {
                        content,
                        source: doc.source.clone(),
                        title: doc.title.clone(),
                        category: doc.category.clone(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        Self { chunks }
    }

    /// Load every `*.txt` file of a directory
    pub fn load_dir(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(FinBriefError::Retrieval(format!(
                "Knowledge base directory not found: {}",
                dir.display()
            )));
        }

        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "txt"))
            .collect();
        paths.sort();

        let mut documents = Vec::with_capacity(paths.len());
        for path in &paths {
            let raw = std::fs::read_to_string(path)?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let stem = path
                .file_stem()
                .map(|n| n.to_string_lossy().replace(['_', '-'], " "))
                .unwrap_or_default();
            documents.push(parse_article(&raw, &stem, &file_name));
        }

        if documents.is_empty() {
            return Err(FinBriefError::Retrieval(format!(
                "No .txt articles in knowledge base directory: {}",
                dir.display()
            )));
        }

        let kb = Self::from_documents(documents);
        info!(
            articles = paths.len(),
            chunks = kb.chunks.len(),
            "Knowledge base loaded"
        );
        Ok(kb)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    fn search(&self, query: &str, category: Option<&str>) -> Vec<Document> {
        let terms = terms(query);
        if terms.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, &Document)> = self
            .chunks
            .iter()
            .filter(|doc| category.map_or(true, |c| doc.category.eq_ignore_ascii_case(c)))
            .filter_map(|doc| {
                let body = self::terms(&doc.content);
                let title = self::terms(&doc.title);
                let score = terms
                    .iter()
                    .map(|t| usize::from(body.contains(t)) + 2 * usize::from(title.contains(t)))
                    .sum::<usize>();
                (score > 0).then_some((score, doc))
            })
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored
            .into_iter()
            .take(TOP_K)
            .map(|(_, doc)| doc.clone())
            .collect()
    }
}

#[async_trait]
impl Retriever for KnowledgeBase {
    async fn retrieve(&self, query: &str, category: Option<&str>) -> Result<Vec<Document>> {
        Ok(self.search(query, category))
    }
}

/// Split an article into its `Title:`/`Category:`/`Source:` header and body
fn parse_article(raw: &str, default_title: &str, default_source: &str) -> Document {
    let mut title = default_title.to_string();
    let mut category = "Uncategorized".to_string();
    let mut source = default_source.to_string();
    let mut body_start = 0;

    for line in raw.split_inclusive('\n') {
        let trimmed = line.trim();
        let header = trimmed.split_once(':').and_then(|(key, value)| {
            match key.trim().to_ascii_lowercase().as_str() {
                "title" => Some(("title", value.trim())),
                "category" => Some(("category", value.trim())),
                "source" => Some(("source", value.trim())),
                _ => None,
            }
        });

        match header {
            Some(("title", v)) => title = v.to_string(),
            Some(("category", v)) => category = v.to_string(),
            Some((_, v)) => source = v.to_string(),
            None if trimmed.is_empty() && body_start == 0 => {}
            None => break,
        }
        body_start += line.len();
    }

    let content = raw.get(body_start..).unwrap_or("").trim().to_string();

    Document {
        content,
        source,
        title,
        category,
    }
}

/// Character-window chunking that prefers to break on whitespace
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }
    if chars.len() <= size {
        return vec![text.trim().to_string()];
    }

    let step_floor = size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let mut end = (start + size).min(chars.len());
        if end < chars.len() {
            if let Some(ws) = (start + step_floor..end).rev().find(|&i| chars[i].is_whitespace()) {
                end = ws;
            }
        }

        let chunk: String = chars[start..end].iter().collect();
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }

        if end >= chars.len() {
            break;
        }
        start = end.saturating_sub(overlap).max(start + 1);
    }

    chunks
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 3)
        .map(|t| t.to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(title: &str, category: &str, content: &str) -> Document {
        Document {
            content: content.to_string(),
            source: format!("{}.txt", title.to_lowercase()),
            title: title.to_string(),
            category: category.to_string(),
        }
    }

    #[test]
    fn test_parse_article_headers() {
        let raw = "Title: Roth IRA Basics\nCategory: Tax\nSource: irs.gov\n\nA Roth IRA is funded with after-tax dollars.";
        let article = parse_article(raw, "roth", "roth.txt");
        assert_eq!(article.title, "Roth IRA Basics");
        assert_eq!(article.category, "Tax");
        assert_eq!(article.source, "irs.gov");
        assert!(article.content.starts_with("A Roth IRA"));
    }

    #[test]
    fn test_parse_article_without_headers() {
        let article = parse_article("ETFs trade like stocks.", "etf basics", "etf_basics.txt");
        assert_eq!(article.title, "etf basics");
        assert_eq!(article.category, "Uncategorized");
        assert_eq!(article.content, "ETFs trade like stocks.");
    }

    #[test]
    fn test_chunking_overlaps_and_bounds() {
        let text = "word ".repeat(500);
        let chunks = chunk_text(&text, 800, 150);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= 800));
    }

    #[tokio::test]
    async fn test_ranking_and_category_filter() {
        let kb = KnowledgeBase::from_documents(vec![
            doc("Index Funds", "Investing", "An index fund tracks a market index."),
            doc("Roth IRA", "Tax", "Roth contributions grow tax free."),
            doc("Capital Gains", "Tax", "Capital gains tax applies when you sell."),
        ]);

        let results = kb.retrieve("what is an index fund?", None).await.unwrap();
        assert_eq!(results[0].title, "Index Funds");

        let tax = kb.retrieve("how is tax on gains handled", Some("tax")).await.unwrap();
        assert!(!tax.is_empty());
        assert!(tax.iter().all(|d| d.category == "Tax"));
        assert_eq!(tax[0].title, "Capital Gains");
    }

    #[test]
    fn test_missing_directory_is_a_retrieval_error() {
        let err = KnowledgeBase::load_dir(Path::new("/nonexistent/finbrief-kb")).unwrap_err();
        assert!(matches!(err, FinBriefError::Retrieval(_)));
    }

    #[test]
    fn test_directory_without_articles_is_a_retrieval_error() {
        let dir = std::env::temp_dir().join(format!("finbrief-kb-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("notes.md"), "not an article").unwrap();

        let err = KnowledgeBase::load_dir(&dir).unwrap_err();
        std::fs::remove_dir_all(&dir).unwrap();
        assert!(matches!(err, FinBriefError::Retrieval(_)));
    }

    #[tokio::test]
    async fn test_no_overlap_returns_nothing() {
        let kb = KnowledgeBase::from_documents(vec![doc("Bonds", "Investing", "Bonds pay coupons.")]);
        assert!(kb.retrieve("zzz qqq", None).await.unwrap().is_empty());
    }
}
