//! ConversationRunner – convenience wrapper that loads a session, runs exactly **one** turn,
//! and persists the updated state back to storage.
//!
//! The [`TurnController`] never sees the store; this wrapper is the piece a transport layer
//! holds on to. Create it once at startup and share it across requests:
//! ```rust,ignore
//! let runner = ConversationRunner::new(controller, storage);
//! let started = runner.start().await?;
//! let reply = runner.reply(&started.session_id, "Kia Rio 2018 en Guayaquil").await?;
//! ```

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::{
    controller::{TurnController, TurnOutcome},
    error::{QuoteFlowError, Result},
    messages::SESSION_EXPIRED_MESSAGE,
    storage::{Session, SessionStorage},
};

#[derive(Debug, Clone, PartialEq)]
pub struct StartedConversation {
    pub session_id: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversationReply {
    /// Session the turn was stored under. Differs from the requested id after a restart.
    pub session_id: String,
    /// True when the requested session was unknown or expired and a new one was opened
    pub restarted: bool,
    pub outcome: TurnOutcome,
}

/// High-level helper that orchestrates the _load → turn → save_ pattern.
#[derive(Clone)]
pub struct ConversationRunner {
    controller: TurnController,
    storage: Arc<dyn SessionStorage>,
}

impl ConversationRunner {
    pub fn new(controller: TurnController, storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            controller,
            storage,
        }
    }

    async fn prune(&self) -> Result<()> {
        let removed = self.storage.prune_expired(Utc::now()).await?;
        if removed > 0 {
            info!(removed = removed, "Pruned expired sessions");
        }
        Ok(())
    }

    /// Opens a new session holding an empty state.
    pub async fn start(&self) -> Result<StartedConversation> {
        self.prune().await?;

        let start = self.controller.start();
        let mut session = Session::new_random();
        session.update(start.state);
        let session_id = session.id.clone();
        self.storage.save(session).await?;

        info!(session_id = %session_id, "Conversation started");
        Ok(StartedConversation {
            session_id,
            message: start.message,
        })
    }

    /// Runs one turn for `session_id` and saves the merged state.
    ///
    /// An unknown or expired id opens a fresh session instead of failing; the turn still
    /// runs against the new, empty state.
    pub async fn reply(&self, session_id: &str, user_text: &str) -> Result<ConversationReply> {
        self.prune().await?;

        let (mut session, restarted) = match self.storage.get(session_id).await? {
            Some(session) => (session, false),
            None => {
                let session = Session::new_random();
                info!(
                    requested_session_id = %session_id,
                    session_id = %session.id,
                    "Session not found, starting a new one"
                );
                (session, true)
            }
        };

        let mut outcome = self
            .controller
            .process_turn(&session.state, user_text)
            .await;
        if restarted {
            outcome.message = format!("{SESSION_EXPIRED_MESSAGE}\n\n{}", outcome.message);
        }

        session.update(outcome.state.clone());
        let session_id = session.id.clone();
        self.storage.save(session).await?;

        info!(
            session_id = %session_id,
            status = ?outcome.status,
            "Turn completed"
        );

        Ok(ConversationReply {
            session_id,
            restarted,
            outcome,
        })
    }

    pub async fn session(&self, session_id: &str) -> Result<Session> {
        self.storage
            .get(session_id)
            .await?
            .ok_or_else(|| QuoteFlowError::SessionNotFound(session_id.to_string()))
    }
}
