pub mod controller;
pub mod error;
pub mod extraction;
pub mod messages;
pub mod pricing;
pub mod questions;
pub mod runner;
pub mod slots;
pub mod storage;

// Re-export commonly used types
pub use controller::{StartOutcome, TurnController, TurnOutcome, TurnStatus};
pub use error::{QuoteFlowError, Result};
pub use extraction::{NoopExtractor, SlotCandidates, SlotExtractor, extract_or_empty};
pub use pricing::{Offer, PlanTier, PricingEngine, QuoteRequest, QuoteResult};
pub use questions::{Question, next_prompt, next_question};
pub use runner::{ConversationReply, ConversationRunner, StartedConversation};
pub use slots::{Slot, SlotState, ValidationError};
pub use storage::{InMemorySessionStorage, Session, SessionStorage};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::{Arc, Mutex};

    /// Replays canned extractor replies, one per turn.
    struct ScriptedExtractor {
        replies: Mutex<Vec<Value>>,
    }

    impl ScriptedExtractor {
        fn new(mut replies: Vec<Value>) -> Self {
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
            }
        }
    }

    #[async_trait]
    impl SlotExtractor for ScriptedExtractor {
        async fn extract(&self, _text: &str) -> Result<SlotCandidates> {
            let next = self.replies.lock().unwrap().pop().unwrap_or(Value::Null);
            SlotCandidates::from_json(next)
        }
    }

    fn runner(replies: Vec<Value>) -> ConversationRunner {
        let controller = TurnController::new(Arc::new(ScriptedExtractor::new(replies)));
        ConversationRunner::new(controller, Arc::new(InMemorySessionStorage::new()))
    }

    #[tokio::test]
    async fn test_full_conversation() {
        let runner = runner(vec![
            json!({
                "vehicle_year": 2018, "vehicle_make": "Kia", "vehicle_model": "Rio",
                "vehicle_value_usd": 12000.0, "usage": "particular", "city": "Guayaquil",
                "driver_age": 28, "claims_last_3y": 0, "anti_theft": null,
                "garage_overnight": null, "deductible_pct": 10, "addons": ["asistencia_vial"]
            }),
            json!({ "anti_theft": true }),
            // malformed extractor output for this turn
            json!("sí"),
            json!({ "garage_overnight": false }),
        ]);

        let started = runner.start().await.unwrap();
        assert!(started.message.starts_with("Hi!"));

        let reply = runner
            .reply(
                &started.session_id,
                "Kia Rio 2018, uso particular, Guayaquil, vale 12 mil dólares. Conductor 28 años, sin siniestros. Deducible 10%, quiero asistencia vial.",
            )
            .await
            .unwrap();
        assert_eq!(reply.session_id, started.session_id);
        assert!(!reply.restarted);
        assert_eq!(reply.outcome.status, TurnStatus::AwaitingOptional(Slot::AntiTheft));

        let reply = runner.reply(&started.session_id, "sí, tiene alarma").await.unwrap();
        assert_eq!(
            reply.outcome.status,
            TurnStatus::AwaitingOptional(Slot::GarageOvernight)
        );

        // extraction failure repeats the same question with the state intact
        let reply = runner.reply(&started.session_id, "sí").await.unwrap();
        assert_eq!(
            reply.outcome.status,
            TurnStatus::AwaitingOptional(Slot::GarageOvernight)
        );
        assert_eq!(reply.outcome.state.anti_theft, Some(true));

        let reply = runner.reply(&started.session_id, "no").await.unwrap();
        assert_eq!(reply.outcome.status, TurnStatus::Quoted);
        let quote = reply.outcome.quote.unwrap();
        assert_eq!(quote.offers.len(), 3);
        assert!(quote.offers.iter().all(|o| o.plan == PlanTier::Mid));
        assert!(quote.offers.iter().all(|o| o.addons == vec![slots::Addon::RoadsideAssistance]));

        let stored = runner.session(&started.session_id).await.unwrap();
        assert_eq!(stored.state, reply.outcome.state);
    }

    #[tokio::test]
    async fn test_unknown_session_restarts() {
        let runner = runner(vec![json!({ "vehicle_year": 2020 })]);

        let reply = runner.reply("no-such-session", "un auto 2020").await.unwrap();
        assert!(reply.restarted);
        assert_ne!(reply.session_id, "no-such-session");
        assert!(reply.outcome.message.starts_with(messages::SESSION_EXPIRED_MESSAGE));
        assert!(
            reply
                .outcome
                .message
                .ends_with(questions::prompt_for(Slot::VehicleMake))
        );

        let stored = runner.session(&reply.session_id).await.unwrap();
        assert_eq!(stored.state.vehicle_year.map(slots::VehicleYear::get), Some(2020));
    }

    #[tokio::test]
    async fn test_missing_session_lookup() {
        let runner = runner(Vec::new());
        assert!(matches!(
            runner.session("nope").await,
            Err(QuoteFlowError::SessionNotFound(id)) if id == "nope"
        ));
    }

    #[tokio::test]
    async fn test_conversations_do_not_share_state() {
        let runner = runner(vec![
            json!({ "vehicle_year": 2015 }),
            json!({ "vehicle_year": 2030 }),
        ]);

        let a = runner.start().await.unwrap();
        let b = runner.start().await.unwrap();
        runner.reply(&a.session_id, "2015").await.unwrap();
        runner.reply(&b.session_id, "2030").await.unwrap();

        let a = runner.session(&a.session_id).await.unwrap();
        let b = runner.session(&b.session_id).await.unwrap();
        assert_eq!(a.state.vehicle_year.map(slots::VehicleYear::get), Some(2015));
        assert_eq!(b.state.vehicle_year.map(slots::VehicleYear::get), Some(2030));
    }
}
