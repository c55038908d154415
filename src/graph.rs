//! Fixed execution graph
//!
//! memory_update → router → {rag | market_only | market_then_portfolio → portfolio
//! | goals | news | tax | planner → execute_plan} → compose → append_assistant → END
//!
//! Every path is a linear chain. The market/portfolio dependency is encoded by
//! two distinct market stages, only one of which flows into `Portfolio`.

use crate::models::Intent;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound on stages visited in one turn. The longest chain is seven.
pub const MAX_STAGES_PER_TURN: usize = 16;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    MemoryUpdate,
    Router,
    Rag,
    MarketOnly,
    MarketThenPortfolio,
    Portfolio,
    Goals,
    News,
    Tax,
    Planner,
    ExecutePlan,
    Compose,
    CollaborativeCompose,
    AppendAssistant,
    End,
}

impl Stage {
    pub const ENTRY: Stage = Stage::MemoryUpdate;

    pub fn name(self) -> &'static str {
        match self {
            Stage::MemoryUpdate => "memory_update",
            Stage::Router => "router",
            Stage::Rag => "rag",
            Stage::MarketOnly => "market_only",
            Stage::MarketThenPortfolio => "market_then_portfolio",
            Stage::Portfolio => "portfolio",
            Stage::Goals => "goals",
            Stage::News => "news",
            Stage::Tax => "tax",
            Stage::Planner => "planner",
            Stage::ExecutePlan => "execute_plan",
            Stage::Compose => "compose",
            Stage::CollaborativeCompose => "collaborative_compose",
            Stage::AppendAssistant => "append_assistant",
            Stage::End => "end",
        }
    }

    /// Transition table. `intent` is only consulted when leaving `Router`.
    pub fn next(self, intent: Intent) -> Stage {
        match self {
            Stage::MemoryUpdate => Stage::Router,
            Stage::Router => route(intent),
            Stage::MarketThenPortfolio => Stage::Portfolio,
            Stage::Rag
            | Stage::MarketOnly
            | Stage::Portfolio
            | Stage::Goals
            | Stage::News
            | Stage::Tax => Stage::Compose,
            Stage::Planner => Stage::ExecutePlan,
            Stage::ExecutePlan => Stage::CollaborativeCompose,
            Stage::Compose | Stage::CollaborativeCompose => Stage::AppendAssistant,
            Stage::AppendAssistant | Stage::End => Stage::End,
        }
    }
}

/// Pick the stage that follows the router. Total over `Intent`;
/// `Unknown` takes the knowledge path.
pub fn route(intent: Intent) -> Stage {
    match intent {
        Intent::Qa | Intent::Unknown => Stage::Rag,
        Intent::Market => Stage::MarketOnly,
        Intent::Portfolio => Stage::MarketThenPortfolio,
        Intent::Goals => Stage::Goals,
        Intent::News => Stage::News,
        Intent::Tax => Stage::Tax,
        Intent::Mixed => Stage::Planner,
    }
}

/// Full stage sequence a turn with this intent walks through, `End` excluded
pub fn path_for(intent: Intent) -> Vec<Stage> {
    let mut path = Vec::new();
    let mut stage = Stage::ENTRY;
    while stage != Stage::End && path.len() < MAX_STAGES_PER_TURN {
        path.push(stage);
        stage = stage.next(intent);
    }
    path
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ALL_INTENTS: &[Intent] = &[
        Intent::Qa,
        Intent::Portfolio,
        Intent::Market,
        Intent::Goals,
        Intent::News,
        Intent::Tax,
        Intent::Mixed,
        Intent::Unknown,
    ];

    #[test]
    fn test_route_names() {
        assert_eq!(route(Intent::Qa).name(), "rag");
        assert_eq!(route(Intent::Market).name(), "market_only");
        assert_eq!(route(Intent::Portfolio).name(), "market_then_portfolio");
        assert_eq!(route(Intent::Goals).name(), "goals");
        assert_eq!(route(Intent::News).name(), "news");
        assert_eq!(route(Intent::Tax).name(), "tax");
        assert_eq!(route(Intent::Mixed).name(), "planner");
        assert_eq!(route(Intent::Unknown).name(), "rag");
    }

    #[test]
    fn test_portfolio_path_fetches_market_first() {
        assert_eq!(
            path_for(Intent::Portfolio),
            vec![
                Stage::MemoryUpdate,
                Stage::Router,
                Stage::MarketThenPortfolio,
                Stage::Portfolio,
                Stage::Compose,
                Stage::AppendAssistant,
            ]
        );
    }

    #[test]
    fn test_market_only_never_reaches_portfolio() {
        assert!(!path_for(Intent::Market).contains(&Stage::Portfolio));
    }

    #[test]
    fn test_mixed_path_uses_collaborative_compose() {
        assert_eq!(
            path_for(Intent::Mixed),
            vec![
                Stage::MemoryUpdate,
                Stage::Router,
                Stage::Planner,
                Stage::ExecutePlan,
                Stage::CollaborativeCompose,
                Stage::AppendAssistant,
            ]
        );
    }

    #[test]
    fn test_every_path_terminates_with_single_compose() {
        for intent in ALL_INTENTS {
            let path = path_for(*intent);
            assert!(path.len() < MAX_STAGES_PER_TURN, "{} did not terminate", intent);
            let composes = path
                .iter()
                .filter(|s| matches!(s, Stage::Compose | Stage::CollaborativeCompose))
                .count();
            assert_eq!(composes, 1);
            assert_eq!(path.last(), Some(&Stage::AppendAssistant));
        }
    }

    proptest! {
        #[test]
        fn route_is_pure(intent in prop::sample::select(ALL_INTENTS)) {
            prop_assert_eq!(route(intent), route(intent));
        }
    }
}
