//! Login and token verification.
//!
//! `LoginService` checks a submitted pair against the single configured
//! credential and issues tokens; `AuthGuard` resolves a presented token back
//! to the username it was issued for.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::AuthConfig;
use crate::domain::credential::Credential;
use crate::domain::session::{SessionEntry, SessionToken};
use crate::errors::ApplicationError;
use crate::session::SessionStore;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Server credentials are not configured")]
    NotConfigured,
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Missing or invalid authentication token")]
    InvalidToken,
}

impl From<AuthError> for ApplicationError {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::NotConfigured => Self::ServerMisconfigured(value.to_string()),
            AuthError::InvalidCredentials | AuthError::InvalidToken => {
                Self::Unauthorized(value.to_string())
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoginOutcome {
    pub message: String,
    pub token: SessionToken,
    pub expires_at: Option<DateTime<Utc>>,
}

/// The authenticated caller, as resolved from a token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub username: String,
}

#[derive(Clone)]
pub struct LoginService {
    credentials: AuthConfig,
    token_ttl: Option<Duration>,
    sessions: Arc<dyn SessionStore>,
}

impl LoginService {
    pub fn new(config: &AuthConfig, sessions: Arc<dyn SessionStore>) -> Self {
        // Values chrono cannot represent behave like 0.
        let token_ttl = match config.token_ttl_secs {
            0 => None,
            secs => i64::try_from(secs).ok().and_then(Duration::try_seconds),
        };
        Self { credentials: config.clone(), token_ttl, sessions }
    }

    pub async fn login(&self, credential: &Credential) -> Result<LoginOutcome, AuthError> {
        if !self.credentials.is_configured() {
            warn!(
                event_name = "auth.login.misconfigured",
                "login attempted without configured credentials"
            );
            return Err(AuthError::NotConfigured);
        }

        let username_matches = credential.username == self.credentials.username;
        let password_matches = credential.password == self.credentials.password.expose_secret();
        if !(username_matches && password_matches) {
            warn!(
                event_name = "auth.login.rejected",
                username = %credential.username,
                "login rejected"
            );
            return Err(AuthError::InvalidCredentials);
        }

        let token = SessionToken::issue(&credential.username);
        let entry = SessionEntry::new(credential.username.clone(), self.token_ttl);
        let expires_at = entry.expires_at;
        self.sessions.put(token.clone(), entry).await;

        info!(
            event_name = "auth.login.accepted",
            username = %credential.username,
            "session token issued"
        );

        Ok(LoginOutcome {
            message: format!("Welcome back, {}!", credential.username),
            token,
            expires_at,
        })
    }
}

#[derive(Clone)]
pub struct AuthGuard {
    sessions: Arc<dyn SessionStore>,
}

impl AuthGuard {
    pub fn new(sessions: Arc<dyn SessionStore>) -> Self {
        Self { sessions }
    }

    pub async fn authenticate(&self, token: Option<&str>) -> Result<Principal, AuthError> {
        let token = token.map(str::trim).filter(|token| !token.is_empty());
        let Some(token) = token else {
            return Err(AuthError::InvalidToken);
        };

        match self.sessions.get(token).await {
            Some(entry) => Ok(Principal { username: entry.username }),
            None => Err(AuthError::InvalidToken),
        }
    }

    /// Revokes a token. The token must currently be valid.
    pub async fn logout(&self, token: Option<&str>) -> Result<Principal, AuthError> {
        let principal = self.authenticate(token).await?;
        if let Some(token) = token {
            self.sessions.expire(token.trim()).await;
        }
        info!(
            event_name = "auth.logout",
            username = %principal.username,
            "session token revoked"
        );
        Ok(principal)
    }
}
