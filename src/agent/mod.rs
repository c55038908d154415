//! Turn orchestrator
//!
//! memory_update → router → handler chain → compose → append_assistant
//!
//! The stage loop walks the transition table in `graph`, awaiting one stage at
//! a time against a single `SessionState`. Profile and memory are loaded from
//! the checkpoint store before the first stage and saved after the last.

use crate::classifier::{Classification, IntentClassifier, KeywordClassifier};
use crate::compose::{compose, compose_collaborative};
use crate::error::FinBriefError;
use crate::execution::ExecutionEngine;
use crate::graph::{route, Stage, MAX_STAGES_PER_TURN};
use crate::guardrail::guard;
use crate::memory::update_profile;
use crate::models::Agent;
use crate::planner::{Planner, PriorityPlanner};
use crate::state::{CheckpointStore, SessionState, TurnOutput, TurnRequest};
use crate::tools::Collaborators;
use crate::Result;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Coordinates one conversational turn end to end
pub struct Orchestrator {
    classifier: Arc<dyn IntentClassifier>,
    planner: Arc<dyn Planner>,
    execution_engine: ExecutionEngine,
    store: Arc<dyn CheckpointStore>,
}

impl Orchestrator {
    pub fn new(
        classifier: Arc<dyn IntentClassifier>,
        planner: Arc<dyn Planner>,
        execution_engine: ExecutionEngine,
        store: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self {
            classifier,
            planner,
            execution_engine,
            store,
        }
    }

    /// Keyword classifier and priority planner
    pub fn with_defaults(collaborators: Collaborators, store: Arc<dyn CheckpointStore>) -> Self {
        Self::new(
            Arc::new(KeywordClassifier),
            Arc::new(PriorityPlanner),
            ExecutionEngine::new(collaborators),
            store,
        )
    }

    pub fn store(&self) -> &Arc<dyn CheckpointStore> {
        &self.store
    }

    /// Run one message through the stage machine
    pub async fn process_turn(
        &self,
        session_id: &str,
        user_message: &str,
        request: TurnRequest,
    ) -> Result<TurnOutput> {
        let start_time = Instant::now();

        let checkpoint = match self.store.load(session_id).await {
            Ok(checkpoint) => checkpoint,
            Err(e) => {
                warn!(session_id, error = %e, "Checkpoint load failed, starting fresh");
                None
            }
        };

        let mut state = SessionState::new(session_id, user_message, checkpoint, request);

        let mut stage = Stage::ENTRY;
        while stage != Stage::End {
            if state.debug.trace.len() >= MAX_STAGES_PER_TURN {
                return Err(FinBriefError::Execution(format!(
                    "Turn exceeded {} stages without reaching the end",
                    MAX_STAGES_PER_TURN
                )));
            }

            debug!(stage = %stage, "Entering stage");
            state.debug.trace.push(stage);
            self.run_stage(stage, &mut state).await?;
            stage = stage.next(state.intent());
        }

        if let Err(e) = self.store.save(session_id, &state.checkpoint()).await {
            warn!(session_id, error = %e, "Checkpoint save failed");
        }

        info!(
            session_id,
            intent = %state.intent(),
            stages = state.debug.trace.len(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Turn complete"
        );

        Ok(state.into_output())
    }

    async fn run_stage(&self, stage: Stage, state: &mut SessionState) -> Result<()> {
        match stage {
            Stage::MemoryUpdate => {
                state.profile = update_profile(std::mem::take(&mut state.profile), &state.user_message);
                let message = state.user_message.clone();
                state.memory.push_user(message);
            }
            Stage::Router => {
                let classification = self.classify(state);
                let next = route(classification.intent);
                info!(
                    intent = %classification.intent,
                    sub_intents = ?classification.sub_intents,
                    route = %next,
                    "Routed message"
                );
                state.debug.router = Some(classification.clone());
                state.debug.route = Some(next);
                state.classification = Some(classification);
            }
            Stage::Rag => self.execution_engine.run(Agent::Qa, state).await,
            Stage::MarketOnly | Stage::MarketThenPortfolio => {
                self.execution_engine.run(Agent::Market, state).await
            }
            Stage::Portfolio => self.execution_engine.run(Agent::Portfolio, state).await,
            Stage::Goals => self.execution_engine.run(Agent::Goals, state).await,
            Stage::News => self.execution_engine.run(Agent::News, state).await,
            Stage::Tax => self.execution_engine.run(Agent::Tax, state).await,
            Stage::Planner => {
                let plan = self.planner.plan(state.required_agents());
                debug!(?plan, "Execution plan created");
                state.debug.plan = Some(plan);
            }
            Stage::ExecutePlan => {
                let plan = state.debug.plan.clone().unwrap_or_default();
                self.execution_engine.execute_plan(&plan, state).await?;
            }
            Stage::Compose => {
                state.final_answer = guard(&state.user_message, &compose(state));
            }
            Stage::CollaborativeCompose => {
                state.final_answer = guard(&state.user_message, &compose_collaborative(state));
            }
            Stage::AppendAssistant => {
                let answer = state.final_answer.clone();
                state.memory.push_assistant(answer);
            }
            Stage::End => {}
        }
        Ok(())
    }

    fn classify(&self, state: &SessionState) -> Classification {
        if let Some(forced) = state.force_intent.and_then(Classification::forced) {
            debug!(intent = %forced.intent, "Using forced intent");
            return forced;
        }
        self.classifier.classify(&state.user_message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::COLLABORATIVE_PREAMBLE;
    use crate::graph::path_for;
    use crate::guardrail::{CLARIFYING_REDIRECT, DISCLAIMER};
    use crate::memory::MessageRole;
    use crate::models::{ConcentrationRisk, Experience, Holding, Intent};
    use crate::state::{Checkpoint, InMemoryCheckpointStore};
    use crate::test_support::{collaborators, doc, headline, FailingGenerator, FixedGenerator, RecordingQuotes};
    use async_trait::async_trait;

    fn orchestrator(generator: Arc<dyn crate::gemini::TextGenerator>) -> (Orchestrator, Arc<RecordingQuotes>) {
        let (collaborators, quotes) = collaborators(
            generator,
            vec![doc("Index Funds", "Investing", "An index fund tracks a market index.")],
            &[("AAPL", 150.0), ("MSFT", 300.0)],
            vec![headline("Markets close higher", "Wire")],
        );
        let store = Arc::new(InMemoryCheckpointStore::new());
        (Orchestrator::with_defaults(collaborators, store), quotes)
    }

    fn holdings() -> Vec<Holding> {
        vec![
            Holding { symbol: "AAPL".to_string(), quantity: 10.0 },
            Holding { symbol: "MSFT".to_string(), quantity: 1.0 },
        ]
    }

    #[tokio::test]
    async fn test_portfolio_turn_fetches_quotes_first() {
        let (orchestrator, quotes) = orchestrator(Arc::new(FixedGenerator::new("unused")));
        let request = TurnRequest {
            portfolio_input: Some(holdings()),
            ..Default::default()
        };

        let output = orchestrator
            .process_turn("s1", "Review my portfolio", request)
            .await
            .unwrap();

        assert_eq!(output.intent, Intent::Portfolio);
        assert_eq!(output.debug.trace, path_for(Intent::Portfolio));
        assert_eq!(quotes.requests().await, vec![vec!["AAPL".to_string(), "MSFT".to_string()]]);

        let metrics = output.portfolio_metrics.as_ref().unwrap().ready().unwrap();
        assert_eq!(metrics.total_value, 1800.0);
        assert_eq!(metrics.concentration_risk, ConcentrationRisk::High);
        assert!(output.final_answer.starts_with(DISCLAIMER));
        assert!(output.final_answer.contains("### 🧾 Portfolio Summary"));
    }

    #[tokio::test]
    async fn test_memory_is_capped_across_turns() {
        let (orchestrator, _) = orchestrator(Arc::new(FixedGenerator::new("Index funds are diversified [1].")));

        for turn in 1..=12 {
            let output = orchestrator
                .process_turn("s1", &format!("explain index funds ({})", turn), TurnRequest::default())
                .await
                .unwrap();
            assert_eq!(output.memory.len(), (turn * 2).min(20));
        }

        let checkpoint = orchestrator.store().load("s1").await.unwrap().unwrap();
        let entries: Vec<_> = checkpoint.memory.entries().collect();
        assert_eq!(entries.len(), 20);
        assert_eq!(entries[0].content, "explain index funds (3)");
        assert_eq!(entries[19].role, MessageRole::Assistant);
    }

    proptest::proptest! {
        #[test]
        fn memory_length_tracks_turn_count(turns in 1usize..14) {
            let len = tokio_test::block_on(async {
                let (orchestrator, _) = orchestrator(Arc::new(FixedGenerator::new("ok")));
                let mut len = 0;
                for _ in 0..turns {
                    len = orchestrator
                        .process_turn("p", "define compound interest", TurnRequest::default())
                        .await
                        .unwrap()
                        .memory
                        .len();
                }
                len
            });
            proptest::prop_assert_eq!(len, (turns * 2).min(20));
        }
    }

    #[tokio::test]
    async fn test_profile_persists_between_turns() {
        let (orchestrator, _) = orchestrator(Arc::new(FixedGenerator::new("ok")));

        orchestrator
            .process_turn("s2", "I'm a beginner investor", TurnRequest::default())
            .await
            .unwrap();
        let output = orchestrator
            .process_turn("s2", "what is an index fund?", TurnRequest::default())
            .await
            .unwrap();

        assert_eq!(output.profile.experience, Some(Experience::Beginner));
        assert_eq!(output.memory.len(), 4);
    }

    #[tokio::test]
    async fn test_mixed_turn_runs_plan_and_collaborative_compose() {
        let (orchestrator, quotes) = orchestrator(Arc::new(FixedGenerator::new("Synthesized [1].")));
        let request = TurnRequest {
            portfolio_input: Some(holdings()),
            ..Default::default()
        };

        let output = orchestrator
            .process_turn("s3", "Explain my portfolio allocation and the latest news", request)
            .await
            .unwrap();

        assert_eq!(output.intent, Intent::Mixed);
        assert_eq!(
            output.debug.plan,
            Some(vec![Agent::Qa, Agent::Market, Agent::Portfolio, Agent::News])
        );
        assert_eq!(quotes.calls().await, 1);
        assert!(output.rag_answer.is_some());
        assert!(output.news_summary.is_some());
        assert!(output.final_answer.starts_with(&format!("{}{}", DISCLAIMER, COLLABORATIVE_PREAMBLE)));
    }

    #[tokio::test]
    async fn test_generator_failure_still_answers() {
        let (orchestrator, _) = orchestrator(Arc::new(FailingGenerator));

        let output = orchestrator
            .process_turn("s4", "What is an index fund?", TurnRequest::default())
            .await
            .unwrap();

        assert!(output.rag_answer.as_ref().unwrap().error().is_some());
        assert!(output.final_answer.starts_with(DISCLAIMER));
        assert!(output.final_answer.contains("❌"));
    }

    #[tokio::test]
    async fn test_forced_intent_skips_classifier() {
        let (orchestrator, quotes) = orchestrator(Arc::new(FixedGenerator::new("unused")));
        let request = TurnRequest {
            force_intent: Some(Intent::Goals),
            ..Default::default()
        };

        let output = orchestrator
            .process_turn("s5", "what's the price of AAPL?", request)
            .await
            .unwrap();

        assert_eq!(output.intent, Intent::Goals);
        assert!(output.goals_projection.is_some());
        assert!(output.market_data.is_none());
        assert_eq!(quotes.calls().await, 0);
    }

    #[tokio::test]
    async fn test_advice_request_gets_redirect() {
        let (orchestrator, _) = orchestrator(Arc::new(FixedGenerator::new("unused")));

        let output = orchestrator
            .process_turn("s6", "Should I buy AAPL at this price?", TurnRequest::default())
            .await
            .unwrap();

        assert_eq!(output.intent, Intent::Market);
        assert!(output.final_answer.ends_with(CLARIFYING_REDIRECT));
    }

    struct BrokenStore;

    #[async_trait]
    impl CheckpointStore for BrokenStore {
        async fn load(&self, _session_id: &str) -> Result<Option<Checkpoint>> {
            Err(FinBriefError::Checkpoint("unreachable".to_string()))
        }

        async fn save(&self, _session_id: &str, _checkpoint: &Checkpoint) -> Result<()> {
            Err(FinBriefError::Checkpoint("unreachable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_store_failures_do_not_fail_the_turn() {
        let (collaborators, _) = collaborators(Arc::new(FixedGenerator::new("ok")), vec![], &[], vec![]);
        let orchestrator = Orchestrator::with_defaults(collaborators, Arc::new(BrokenStore));

        let output = orchestrator
            .process_turn("s7", "help me plan a retirement goal", TurnRequest::default())
            .await
            .unwrap();

        assert_eq!(output.intent, Intent::Goals);
        assert_eq!(output.memory.len(), 2);
    }
}
