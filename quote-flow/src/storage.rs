use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::{error::Result, slots::SlotState};

pub const DEFAULT_SESSION_TTL_SECONDS: i64 = 60 * 60;

/// One conversation's persisted state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub state: SlotState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<String>, state: SlotState) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            state,
            created_at: now,
            updated_at: now,
        }
    }

    /// Fresh session with a random v4 id and an empty state
    pub fn new_random() -> Self {
        Self::new(Uuid::new_v4().to_string(), SlotState::new())
    }

    pub fn update(&mut self, state: SlotState) {
        self.state = state;
        self.updated_at = Utc::now();
    }

    pub fn is_expired(&self, ttl: TimeDelta, now: DateTime<Utc>) -> bool {
        now - self.updated_at > ttl
    }
}

/// Keyed session store with time-to-live eviction
#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn save(&self, session: Session) -> Result<()>;
    /// Expired sessions read as absent
    async fn get(&self, id: &str) -> Result<Option<Session>>;
    async fn delete(&self, id: &str) -> Result<()>;
    /// Removes every session idle for longer than the TTL, returning how many were dropped
    async fn prune_expired(&self, now: DateTime<Utc>) -> Result<usize>;
}

/// In-memory implementation of SessionStorage
pub struct InMemorySessionStorage {
    sessions: Arc<DashMap<String, Session>>,
    ttl: TimeDelta,
}

impl InMemorySessionStorage {
    pub fn new() -> Self {
        Self::with_ttl(TimeDelta::seconds(DEFAULT_SESSION_TTL_SECONDS))
    }

    pub fn with_ttl(ttl: TimeDelta) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for InMemorySessionStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStorage for InMemorySessionStorage {
    async fn save(&self, session: Session) -> Result<()> {
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Session>> {
        let now = Utc::now();
        Ok(self
            .sessions
            .get(id)
            .filter(|entry| !entry.is_expired(self.ttl, now))
            .map(|entry| entry.clone()))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.sessions.remove(id);
        Ok(())
    }

    async fn prune_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut removed = 0;
        self.sessions.retain(|_, session| {
            let keep = !session.is_expired(self.ttl, now);
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }
}
