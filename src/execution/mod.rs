//! Execution engine for handler steps
//!
//! Runs one handler at a time against the session state. Handlers report
//! their own failures in-band, so a step never aborts the turn.

use crate::handlers::{goals, knowledge, market, news, portfolio, tax};
use crate::models::Agent;
use crate::state::{SessionState, StepTiming};
use crate::tools::Collaborators;
use crate::Result;
use crate::error::FinBriefError;
use std::time::Instant;
use tracing::debug;

/// Maximum steps allowed per plan
const MAX_STEPS_PER_PLAN: usize = 12;

/// Dispatches handler steps to their collaborators
pub struct ExecutionEngine {
    collaborators: Collaborators,
}

impl ExecutionEngine {
    pub fn new(collaborators: Collaborators) -> Self {
        Self { collaborators }
    }

    /// Run a single handler and record its timing
    pub async fn run(&self, agent: Agent, state: &mut SessionState) {
        let start = Instant::now();
        let c = &self.collaborators;

        match agent {
            Agent::Qa => knowledge::run(state, c.generator.as_ref(), c.retriever.as_ref()).await,
            Agent::Tax => tax::run(state, c.generator.as_ref(), c.retriever.as_ref()).await,
            Agent::Market => {
                let include_holdings = state.required_agents().contains(&Agent::Portfolio);
                market::run(state, c.quotes.as_ref(), include_holdings).await
            }
            Agent::Portfolio => portfolio::run(state),
            Agent::Goals => goals::run(state),
            Agent::News => news::run(state, c.news.as_ref(), c.generator.as_ref()).await,
        }

        let elapsed_ms = start.elapsed().as_millis() as u64;
        debug!(agent = %agent, elapsed_ms, "Step complete");
        state.debug.steps.push(StepTiming { agent, elapsed_ms });
    }

    /// Execute all steps of a plan in order
    pub async fn execute_plan(&self, plan: &[Agent], state: &mut SessionState) -> Result<()> {
        if plan.len() > MAX_STEPS_PER_PLAN {
            return Err(FinBriefError::Execution(format!(
                "Plan exceeds maximum allowed steps ({})",
                MAX_STEPS_PER_PLAN
            )));
        }

        debug!(steps = plan.len(), "Starting plan execution");
        for agent in plan {
            self.run(*agent, state).await;
        }
        Ok(())
    }
}
