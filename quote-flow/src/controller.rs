//! Dialogue turn controller.
//!
//! One call handles exactly one turn: extract, merge, then either ask a single question or
//! produce a single quote. The controller owns no conversation state; the caller passes the
//! previous [`SlotState`] in and persists the returned one.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::{
    extraction::{SlotCandidates, SlotExtractor, extract_or_empty},
    messages::{WELCOME_MESSAGE, format_quote_message},
    pricing::{PricingEngine, QuoteResult},
    questions::next_question,
    slots::{MergeOutcome, Slot, SlotState, ValidationError},
};

/// Where the conversation stands after a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "slot", rename_all = "snake_case")]
pub enum TurnStatus {
    /// Waiting for a required slot
    AwaitingRequired(Slot),
    /// Waiting for an optional slot
    AwaitingOptional(Slot),
    /// A quote was produced
    Quoted,
}

/// Result of a single turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    /// Reply to send to the user
    pub message: String,
    pub state: SlotState,
    pub quote: Option<QuoteResult>,
    pub status: TurnStatus,
    /// Extracted values dropped this turn
    pub rejected: Vec<ValidationError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StartOutcome {
    pub message: String,
    pub state: SlotState,
}

#[derive(Clone)]
pub struct TurnController {
    extractor: Arc<dyn SlotExtractor>,
    pricing: PricingEngine,
}

impl TurnController {
    pub fn new(extractor: Arc<dyn SlotExtractor>) -> Self {
        Self {
            extractor,
            pricing: PricingEngine::default(),
        }
    }

    /// Opening turn: welcome message and an empty state. No extraction happens.
    pub fn start(&self) -> StartOutcome {
        StartOutcome {
            message: WELCOME_MESSAGE.to_string(),
            state: SlotState::new(),
        }
    }

    /// Runs one turn for a user utterance. Blank input skips extraction entirely.
    pub async fn process_turn(&self, previous: &SlotState, user_text: &str) -> TurnOutcome {
        let candidates = if user_text.trim().is_empty() {
            SlotCandidates::new()
        } else {
            extract_or_empty(self.extractor.as_ref(), user_text).await
        };
        self.advance(previous, &candidates)
    }

    /// The synchronous part of a turn, once extraction has finished.
    pub fn advance(&self, previous: &SlotState, candidates: &SlotCandidates) -> TurnOutcome {
        let MergeOutcome {
            state,
            applied,
            rejected,
        } = previous.merge(candidates);

        debug!(
            applied = ?applied,
            rejected = rejected.len(),
            "Merged extracted slots"
        );

        if let Some(question) = next_question(&state) {
            let status = if question.is_required() {
                TurnStatus::AwaitingRequired(question.slot)
            } else {
                TurnStatus::AwaitingOptional(question.slot)
            };
            info!(slot = %question.slot, required = question.is_required(), "Asking for slot");

            return TurnOutcome {
                message: question.prompt.to_string(),
                state,
                quote: None,
                status,
                rejected,
            };
        }

        let quote = self.pricing.quote_state(&state);
        TurnOutcome {
            message: format_quote_message(&quote),
            state,
            quote: Some(quote),
            status: TurnStatus::Quoted,
            rejected,
        }
    }
}
