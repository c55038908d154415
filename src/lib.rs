//! FinBrief: a conversational finance-education assistant
//!
//! Each user message is one turn through a fixed state machine:
//! - classify the message into intents (keyword heuristics, swappable)
//! - route to exactly one linear handler chain, or plan a mixed chain
//! - run handlers one at a time against a typed session state
//! - compose the populated sections and wrap them in the safety guardrail
//! - persist profile and bounded memory for the next turn
//!
//! TURN LOOP:
//! MEMORY_UPDATE → ROUTER → HANDLERS → COMPOSE → APPEND_ASSISTANT

pub mod agent;
pub mod api;
pub mod classifier;
pub mod compose;
pub mod config;
pub mod error;
pub mod execution;
pub mod gemini;
pub mod graph;
pub mod guardrail;
pub mod handlers;
pub mod memory;
pub mod models;
pub mod planner;
pub mod state;
pub mod tools;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{FinBriefError, Result};

// Re-export common types
pub use models::*;
pub use agent::Orchestrator;
pub use classifier::{classify, Classification, IntentClassifier, KeywordClassifier};
pub use graph::{route, Stage};
pub use guardrail::guard;
pub use state::{SessionState, TurnOutput, TurnRequest};
