use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque bearer token handed out at login.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionToken(pub String);

impl SessionToken {
    /// `token-<uuid>-<username>`; uniqueness comes from the uuid alone.
    pub fn issue(username: &str) -> Self {
        Self(format!("token-{}-{username}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionEntry {
    pub username: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl SessionEntry {
    pub fn new(username: impl Into<String>, ttl: Option<Duration>) -> Self {
        let issued_at = Utc::now();
        let expires_at = ttl.and_then(|ttl| issued_at.checked_add_signed(ttl));
        Self { username: username.into(), issued_at, expires_at }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|expires_at| now >= expires_at).unwrap_or(false)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}
