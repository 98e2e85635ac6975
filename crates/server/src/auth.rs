use agentdesk_core::auth::Principal;
use agentdesk_core::errors::ApplicationError;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::api::{error_response, ApiError, AppState};

/// Primary token header. FastAPI-style clients send the underscore form.
pub const TOKEN_HEADER: &str = "x_auth_token";
pub const TOKEN_HEADER_ALIAS: &str = "x-auth-token";

/// The caller behind a valid session token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub principal: Principal,
    pub token: String,
}

impl AuthenticatedUser {
    pub fn username(&self) -> &str {
        &self.principal.username
    }
}

fn presented_token(parts: &Parts) -> Option<String> {
    [TOKEN_HEADER, TOKEN_HEADER_ALIAS]
        .iter()
        .filter_map(|name| parts.headers.get(*name))
        .filter_map(|value| value.to_str().ok())
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = presented_token(parts);
        match state.guard.authenticate(token.as_deref()).await {
            Ok(principal) => Ok(Self { principal, token: token.unwrap_or_default() }),
            Err(error) => Err(error_response(ApplicationError::from(error), "auth")),
        }
    }
}
