//! In-memory session storage with age-based expiry

use super::traits::SessionStore;
use crate::llm::Message;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// A conversation: an id, its creation time and the ordered turns
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub turns: Vec<Message>,
}

impl Session {
    pub fn new() -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
            turns: Vec::new(),
        }
    }

    pub fn message_count(&self) -> usize {
        self.turns.len()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-local session store shared across request handlers
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, Session>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemorySessionStore {
    fn create(&self) -> Session {
        let session = Session::new();
        self.sessions.insert(session.id.clone(), session.clone());
        tracing::debug!("Created session {}", session.id);
        session
    }

    fn get(&self, id: &str) -> Option<Session> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    fn save(&self, session: Session) {
        self.sessions.insert(session.id.clone(), session);
    }

    fn delete(&self, id: &str) -> bool {
        self.sessions.remove(id).is_some()
    }

    fn remove_created_before(&self, cutoff: DateTime<Utc>) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| session.created_at >= cutoff);
        before.saturating_sub(self.sessions.len())
    }

    fn len(&self) -> usize {
        self.sessions.len()
    }
}

/// Periodically drop sessions older than `max_age`.
///
/// The first sweep runs one `interval` after spawning.
pub fn spawn_sweeper(
    store: Arc<dyn SessionStore>,
    interval: Duration,
    max_age: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        loop {
            ticker.tick().await;
            let removed = store.sweep(max_age);
            if removed > 0 {
                tracing::info!("Expired {} session(s) older than {:?}", removed, max_age);
            }
        }
    })
}
