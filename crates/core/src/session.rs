//! Token-to-session storage.
//!
//! Handlers only see the `SessionStore` trait so a shared backend can replace
//! the in-process map when more than one server instance is running.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::session::{SessionEntry, SessionToken};

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Inserts unconditionally, replacing any entry already under `token`.
    async fn put(&self, token: SessionToken, entry: SessionEntry);

    /// Expired entries read as absent.
    async fn get(&self, token: &str) -> Option<SessionEntry>;

    /// Removes the entry; returns whether one was present.
    async fn expire(&self, token: &str) -> bool;

    /// Drops every entry whose deadline has passed and returns how many went.
    async fn purge_expired(&self) -> usize;

    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Sessions held in process memory; lost on restart.
#[derive(Debug, Clone, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionEntry>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn put(&self, token: SessionToken, entry: SessionEntry) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(token.0, entry);
    }

    async fn get(&self, token: &str) -> Option<SessionEntry> {
        let sessions = self.sessions.read().await;
        sessions.get(token).filter(|entry| !entry.is_expired()).cloned()
    }

    async fn expire(&self, token: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        sessions.remove(token).is_some()
    }

    async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| !entry.is_expired_at(now));
        let purged = before - sessions.len();
        if purged > 0 {
            debug!(event_name = "auth.session.purged", purged, "expired sessions purged");
        }
        purged
    }

    async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
