//! Core data models for the finance assistant

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

//
// ================= Intents & Handlers =================
//

/// Classified purpose of a user message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Qa,
    Portfolio,
    Market,
    Goals,
    News,
    Tax,
    Mixed,
    Unknown,
}

impl Intent {
    /// Handler serving a single-topic intent. `Mixed` and `Unknown` have none.
    pub fn agent(self) -> Option<Agent> {
        match self {
            Intent::Qa => Some(Agent::Qa),
            Intent::Portfolio => Some(Agent::Portfolio),
            Intent::Market => Some(Agent::Market),
            Intent::Goals => Some(Agent::Goals),
            Intent::News => Some(Agent::News),
            Intent::Tax => Some(Agent::Tax),
            Intent::Mixed | Intent::Unknown => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Intent::Qa => "qa",
            Intent::Portfolio => "portfolio",
            Intent::Market => "market",
            Intent::Goals => "goals",
            Intent::News => "news",
            Intent::Tax => "tax",
            Intent::Mixed => "mixed",
            Intent::Unknown => "unknown",
        }
    }
}

/// Handler adapters the router can invoke
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Agent {
    Qa,
    Portfolio,
    Market,
    Goals,
    News,
    Tax,
}

impl Agent {
    pub fn as_str(self) -> &'static str {
        match self {
            Agent::Qa => "qa",
            Agent::Portfolio => "portfolio",
            Agent::Market => "market",
            Agent::Goals => "goals",
            Agent::News => "news",
            Agent::Tax => "tax",
        }
    }
}

impl From<Agent> for Intent {
    fn from(agent: Agent) -> Self {
        match agent {
            Agent::Qa => Intent::Qa,
            Agent::Portfolio => Intent::Portfolio,
            Agent::Market => Intent::Market,
            Agent::Goals => Intent::Goals,
            Agent::News => Intent::News,
            Agent::Tax => Intent::Tax,
        }
    }
}

//
// ================= Profile =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Experience {
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RiskTolerance {
    Conservative,
    Moderate,
    Aggressive,
}

/// Long-lived user attributes carried across turns
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience: Option<Experience>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_tolerance: Option<RiskTolerance>,
    /// Knowledge-base category preferred for education answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qa_category: Option<String>,
}

//
// ================= Handler Outcomes =================
//

/// Result slice of a handler that talks to an external collaborator.
/// Failures stay in-band so the turn always completes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome<T> {
    Ready(T),
    Failed { error: String },
}

impl<T> Outcome<T> {
    pub fn failed(error: impl Into<String>) -> Self {
        Outcome::Failed {
            error: error.into(),
        }
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Outcome::Ready(value) => Some(value),
            Outcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Outcome::Ready(_) => None,
            Outcome::Failed { error } => Some(error),
        }
    }
}

/// Source reference attached to a generated answer, numbered from 1
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Citation {
    pub id: usize,
    pub title: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
}

/// Generated education answer (knowledge QA and tax)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeAnswer {
    pub answer: String,
    pub citations: Vec<Citation>,
}

//
// ================= Market =================
//

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MarketRequest {
    #[serde(default)]
    pub symbols: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Quote {
    pub symbol: String,
    #[serde(default)]
    pub last_price: Option<f64>,
    #[serde(default)]
    pub previous_close: Option<f64>,
    #[serde(default)]
    pub pct_change: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub history: Vec<f64>,
    #[serde(default)]
    pub history_dates: Vec<String>,
    pub source: String,
    #[serde(default)]
    pub cache_hit: bool,
    pub fetched_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Quote {
    /// In-band failure entry for a symbol that could not be priced
    pub fn failed(symbol: &str, error: impl Into<String>) -> Self {
        Self {
            symbol: symbol.to_string(),
            last_price: None,
            previous_close: None,
            pct_change: None,
            market_cap: None,
            currency: None,
            history: Vec::new(),
            history_dates: Vec::new(),
            source: "error".to_string(),
            cache_hit: false,
            fetched_at: Utc::now(),
            error: Some(error.into()),
        }
    }
}

/// Quotes keyed by uppercase symbol
pub type MarketData = BTreeMap<String, Quote>;

//
// ================= Portfolio =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Holding {
    pub symbol: String,
    #[serde(default)]
    pub quantity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub quantity: f64,
    pub price: Option<f64>,
    pub value: f64,
    pub allocation_pct: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConcentrationRisk {
    High,
    Moderate,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AllocationShare {
    pub symbol: String,
    pub allocation_pct: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConcentrationFlags {
    pub over_25: Vec<AllocationShare>,
    pub over_10_count: usize,
    pub top_positions: Vec<AllocationShare>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortfolioMetrics {
    pub total_value: f64,
    pub positions: Vec<Position>,
    pub hhi: f64,
    pub effective_holdings: f64,
    pub concentration_risk: ConcentrationRisk,
    pub diversification_grade: String,
    pub concentration_flags: ConcentrationFlags,
    pub recommendations: Vec<String>,
}

//
// ================= Goals =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GoalsRequest {
    #[serde(default = "default_goal_amount")]
    pub goal_amount: f64,
    #[serde(default)]
    pub current_savings: f64,
    #[serde(default = "default_goal_years")]
    pub years: f64,
    #[serde(default = "default_expected_return")]
    pub expected_return: f64,
    #[serde(default = "default_inflation_rate")]
    pub inflation_rate: f64,
    /// Planned monthly contribution used for scenarios; the required one when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_contribution: Option<f64>,
}

fn default_goal_amount() -> f64 {
    50_000.0
}

fn default_goal_years() -> f64 {
    10.0
}

fn default_expected_return() -> f64 {
    0.06
}

fn default_inflation_rate() -> f64 {
    0.02
}

impl Default for GoalsRequest {
    fn default() -> Self {
        Self {
            goal_amount: default_goal_amount(),
            current_savings: 0.0,
            years: default_goal_years(),
            expected_return: default_expected_return(),
            inflation_rate: default_inflation_rate(),
            monthly_contribution: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Short,
    OnTrack,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GoalScenario {
    pub name: String,
    pub annual_return: f64,
    pub reached_month: Option<u32>,
    pub ending_balance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GoalProjection {
    pub inflation_adjusted_target: f64,
    pub future_value_current: f64,
    pub required_monthly_contribution: f64,
    pub gap: f64,
    pub status: GoalStatus,
    pub monthly_contribution: f64,
    pub scenarios: Vec<GoalScenario>,
    pub summary: String,
}

//
// ================= News =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewsRequest {
    #[serde(default = "default_news_topic")]
    pub topic: String,
    #[serde(default = "default_news_limit")]
    pub limit: usize,
}

fn default_news_topic() -> String {
    "All".to_string()
}

fn default_news_limit() -> usize {
    5
}

impl Default for NewsRequest {
    fn default() -> Self {
        Self {
            topic: default_news_topic(),
            limit: default_news_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewsItem {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub published: String,
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewsSummary {
    pub topic: String,
    pub summary: String,
    pub items: Vec<NewsItem>,
    pub citations: Vec<Citation>,
}

//
// ================= Display =================
//

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for RiskTolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskTolerance::Conservative => "conservative",
            RiskTolerance::Moderate => "moderate",
            RiskTolerance::Aggressive => "aggressive",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for Experience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Experience::Beginner => "beginner",
            Experience::Intermediate => "intermediate",
            Experience::Advanced => "advanced",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for ConcentrationRisk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConcentrationRisk::High => "high",
            ConcentrationRisk::Moderate => "moderate",
            ConcentrationRisk::Low => "low",
        };
        write!(f, "{}", s)
    }
}
