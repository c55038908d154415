//! Per-turn session state
//!
//! `SessionState` is created fresh for every message, seeded with the
//! persisted profile and memory, threaded by `&mut` through each stage, and
//! reduced to a `TurnOutput` plus a `Checkpoint` at the end of the turn.

pub mod checkpoint;

pub use checkpoint::{
    build_checkpoint_store, Checkpoint, CheckpointStore, InMemoryCheckpointStore,
    PostgresCheckpointStore,
};

use crate::classifier::Classification;
use crate::graph::Stage;
use crate::memory::ConversationMemory;
use crate::models::{
    Agent, GoalProjection, GoalsRequest, Holding, Intent, KnowledgeAnswer, MarketData,
    MarketRequest, NewsRequest, NewsSummary, Outcome, PortfolioMetrics, Profile,
};
use serde::{Deserialize, Serialize};

/// Wall-clock duration of one handler invocation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepTiming {
    pub agent: Agent,
    pub elapsed_ms: u64,
}

/// Diagnostics recorded while the turn runs
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DebugInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub router: Option<Classification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<Stage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Vec<Agent>>,
    #[serde(default)]
    pub trace: Vec<Stage>,
    #[serde(default)]
    pub steps: Vec<StepTiming>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portfolio_narrative: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goals_narrative: Option<String>,
}

/// Optional request slices a caller can attach to a turn
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnRequest {
    #[serde(default)]
    pub market_request: Option<MarketRequest>,
    #[serde(default)]
    pub portfolio_input: Option<Vec<Holding>>,
    #[serde(default)]
    pub goals_request: Option<GoalsRequest>,
    #[serde(default)]
    pub news_request: Option<NewsRequest>,
    /// Knowledge-base category for education answers; "All" clears it
    #[serde(default)]
    pub qa_category: Option<String>,
    /// Skip classification and route as this intent
    #[serde(default)]
    pub force_intent: Option<Intent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: String,
    pub user_message: String,
    pub force_intent: Option<Intent>,
    pub classification: Option<Classification>,
    pub profile: Profile,
    pub memory: ConversationMemory,

    pub market_request: Option<MarketRequest>,
    pub market_data: Option<MarketData>,
    pub portfolio_input: Option<Vec<Holding>>,
    pub portfolio_metrics: Option<Outcome<PortfolioMetrics>>,
    pub goals_request: Option<GoalsRequest>,
    pub goals_projection: Option<Outcome<GoalProjection>>,
    pub news_request: Option<NewsRequest>,
    pub news_summary: Option<Outcome<NewsSummary>>,
    pub tax_answer: Option<Outcome<KnowledgeAnswer>>,
    pub rag_answer: Option<Outcome<KnowledgeAnswer>>,

    pub final_answer: String,
    pub debug: DebugInfo,
}

impl SessionState {
    /// Fresh state for one turn, seeded from the previous checkpoint
    pub fn new(
        session_id: impl Into<String>,
        user_message: impl Into<String>,
        checkpoint: Option<Checkpoint>,
        request: TurnRequest,
    ) -> Self {
        let (mut profile, memory) = match checkpoint {
            Some(cp) => (cp.profile, cp.memory),
            None => (Profile::default(), ConversationMemory::new()),
        };

        if let Some(category) = request.qa_category {
            let category = category.trim().to_string();
            profile.qa_category = if category.is_empty() || category.eq_ignore_ascii_case("all") {
                None
            } else {
                Some(category)
            };
        }

        Self {
            session_id: session_id.into(),
            user_message: user_message.into(),
            force_intent: request.force_intent,
            classification: None,
            profile,
            memory,
            market_request: request.market_request,
            market_data: None,
            portfolio_input: request.portfolio_input,
            portfolio_metrics: None,
            goals_request: request.goals_request,
            goals_projection: None,
            news_request: request.news_request,
            news_summary: None,
            tax_answer: None,
            rag_answer: None,
            final_answer: String::new(),
            debug: DebugInfo::default(),
        }
    }

    /// Classified intent; `Unknown` until the router stage has run
    pub fn intent(&self) -> Intent {
        self.classification
            .as_ref()
            .map(|c| c.intent)
            .unwrap_or(Intent::Unknown)
    }

    pub fn required_agents(&self) -> &[Agent] {
        self.classification
            .as_ref()
            .map(|c| c.required_agents.as_slice())
            .unwrap_or(&[])
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint::new(self.profile.clone(), self.memory.clone())
    }

    pub fn into_output(self) -> TurnOutput {
        let intent = self.intent();
        TurnOutput {
            session_id: self.session_id,
            intent,
            final_answer: self.final_answer,
            profile: self.profile,
            memory: self.memory,
            market_data: self.market_data,
            portfolio_metrics: self.portfolio_metrics,
            goals_projection: self.goals_projection,
            news_summary: self.news_summary,
            tax_answer: self.tax_answer,
            rag_answer: self.rag_answer,
            debug: self.debug,
        }
    }
}

/// What a finished turn hands back to its caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnOutput {
    pub session_id: String,
    pub intent: Intent,
    pub final_answer: String,
    pub profile: Profile,
    pub memory: ConversationMemory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_data: Option<MarketData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub portfolio_metrics: Option<Outcome<PortfolioMetrics>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goals_projection: Option<Outcome<GoalProjection>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub news_summary: Option<Outcome<NewsSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_answer: Option<Outcome<KnowledgeAnswer>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rag_answer: Option<Outcome<KnowledgeAnswer>>,
    pub debug: DebugInfo,
}
