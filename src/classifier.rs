//! Intent Classifier
//!
//! Maps a free-text message to the set of intents it touches.
//! Keyword matching is case-insensitive substring containment, so overlapping
//! vocabularies ("portfolio" + "price") legitimately produce `Mixed`.

use crate::models::{Agent, Intent};
use serde::{Deserialize, Serialize};

/// Output of classification, recorded on the session state by the router stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub intent: Intent,
    /// Every detected intent in first-seen order, never empty
    pub sub_intents: Vec<Intent>,
    pub required_agents: Vec<Agent>,
}

impl Classification {
    /// Build a classification from detected topical intents.
    pub fn from_detected(detected: Vec<Intent>) -> Self {
        let mut sub_intents: Vec<Intent> = Vec::with_capacity(detected.len());
        for intent in detected {
            if intent.agent().is_some() && !sub_intents.contains(&intent) {
                sub_intents.push(intent);
            }
        }

        if sub_intents.is_empty() {
            sub_intents.push(Intent::Qa);
        }

        let intent = if sub_intents.len() == 1 {
            sub_intents[0]
        } else {
            Intent::Mixed
        };

        let required_agents = sub_intents.iter().filter_map(|i| i.agent()).collect();

        Self {
            intent,
            sub_intents,
            required_agents,
        }
    }

    /// Caller-forced single intent. `Mixed`/`Unknown` cannot be forced.
    pub fn forced(intent: Intent) -> Option<Self> {
        let agent = intent.agent()?;
        Some(Self {
            intent,
            sub_intents: vec![intent],
            required_agents: vec![agent],
        })
    }
}

/// Swappable classification strategy
pub trait IntentClassifier: Send + Sync {
    fn classify(&self, message: &str) -> Classification;
}

/// Static keyword lists — zero allocation
const PORTFOLIO_KEYWORDS: &[&str] = &["portfolio", "allocation", "diversification", "holdings"];

const MARKET_KEYWORDS: &[&str] = &["price", "quote", "ticker", "market cap", "stock price"];

const GOALS_KEYWORDS: &[&str] = &["goal", "retirement", "save", "saving", "target", "projection"];

const NEWS_KEYWORDS: &[&str] = &["news", "headline", "what happened today", "latest"];

const TAX_KEYWORDS: &[&str] = &[
    "tax", "taxes", "capital gains", "short-term", "long-term",
    "wash sale", "tax-loss", "harvesting", "1099", "w-2", "w2",
    "deduction", "deductions", "credits", "tax credit", "withholding",
    "ira", "roth", "traditional ira", "401k", "403b", "hsa", "fsa",
    "brokerage account tax", "dividend tax", "qualified dividend",
];

const QA_KEYWORDS: &[&str] = &["what is", "explain", "difference between", "how does", "define"];

/// Category check order; detection order of `sub_intents` follows it.
const CATEGORIES: &[(Intent, &[&str])] = &[
    (Intent::Portfolio, PORTFOLIO_KEYWORDS),
    (Intent::Market, MARKET_KEYWORDS),
    (Intent::Goals, GOALS_KEYWORDS),
    (Intent::News, NEWS_KEYWORDS),
    (Intent::Tax, TAX_KEYWORDS),
    (Intent::Qa, QA_KEYWORDS),
];

/// Keyword-pattern classifier
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier;

impl IntentClassifier for KeywordClassifier {
    fn classify(&self, message: &str) -> Classification {
        classify(message)
    }
}

/// Classify a message. Pure: the same text always yields the same result.
pub fn classify(message: &str) -> Classification {
    let text = message.to_lowercase();

    let detected = CATEGORIES
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|kw| text.contains(kw)))
        .map(|(intent, _)| *intent)
        .collect();

    Classification::from_detected(detected)
}
