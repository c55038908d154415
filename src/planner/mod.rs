//! Planner for mixed-intent turns
//!
//! Converts `required_agents` into an ordered execution plan. The plan is run
//! one handler at a time by the execution engine.

use crate::models::Agent;

/// Trait for plan generation over a fixed handler set
pub trait Planner: Send + Sync {
    fn plan(&self, required_agents: &[Agent]) -> Vec<Agent>;
}

/// Knowledge QA first, remaining handlers in their detected order.
/// A portfolio step is always preceded by a market step.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriorityPlanner;

impl Planner for PriorityPlanner {
    fn plan(&self, required_agents: &[Agent]) -> Vec<Agent> {
        let mut plan: Vec<Agent> = Vec::with_capacity(required_agents.len() + 1);

        if required_agents.contains(&Agent::Qa) {
            plan.push(Agent::Qa);
        }

        for agent in required_agents {
            match agent {
                Agent::Qa => {}
                Agent::Market => {
                    if !plan.contains(&Agent::Market) {
                        plan.push(Agent::Market);
                    }
                }
                Agent::Portfolio => {
                    if !plan.contains(&Agent::Market) {
                        plan.push(Agent::Market);
                    }
                    if !plan.contains(&Agent::Portfolio) {
                        plan.push(Agent::Portfolio);
                    }
                }
                other => {
                    if !plan.contains(other) {
                        plan.push(*other);
                    }
                }
            }
        }

        plan
    }
}
