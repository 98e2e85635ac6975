//! Authenticated JSON API: login, logout, chat and trip planning.

use std::sync::Arc;

use agentdesk_agent::{AgentRuntime, ChatTurnRequest, TurnOutcome};
use agentdesk_core::auth::{AuthGuard, LoginService};
use agentdesk_core::domain::chat::{ChatMessage, ReplySource};
use agentdesk_core::domain::credential::Credential;
use agentdesk_core::domain::plan::TripRequest;
use agentdesk_core::errors::ApplicationError;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::health;

#[derive(Clone)]
pub struct AppState {
    pub login: LoginService,
    pub guard: AuthGuard,
    pub runtime: Arc<AgentRuntime>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

pub type ApiError = (StatusCode, Json<ErrorBody>);

pub fn error_response(error: ApplicationError, scope: &str) -> ApiError {
    let correlation_id = format!("{scope}-{}", Uuid::new_v4());
    let interface = error.into_interface(correlation_id);
    let status =
        StatusCode::from_u16(interface.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    if status.is_server_error() {
        warn!(
            event_name = "api.request.failed",
            correlation_id = interface.correlation_id(),
            status = status.as_u16(),
            detail = interface.detail(),
            "request failed"
        );
    } else {
        info!(
            event_name = "api.request.rejected",
            correlation_id = interface.correlation_id(),
            status = status.as_u16(),
            detail = interface.detail(),
            "request rejected"
        );
    }

    (status, Json(ErrorBody { detail: interface.detail().to_string() }))
}

fn body_or_bad_request<T>(
    payload: Result<Json<T>, JsonRejection>,
    scope: &str,
) -> Result<T, ApiError> {
    payload.map(|Json(value)| value).map_err(|rejection| {
        error_response(ApplicationError::BadRequest(rejection.body_text()), scope)
    })
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoutResponse {
    pub message: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub source: ReplySource,
    pub monitored: bool,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guardrails_note: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct PlanRequest {
    #[serde(flatten)]
    pub trip: TripRequest,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlanResponse {
    pub itinerary: String,
    pub source: ReplySource,
    pub monitored: bool,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guardrails_note: Option<String>,
}

impl From<TurnOutcome> for ChatResponse {
    fn from(outcome: TurnOutcome) -> Self {
        let turn = outcome.turn;
        Self {
            reply: turn.reply,
            source: turn.source,
            monitored: turn.monitored,
            session_id: turn.session_id.0,
            guardrails_note: turn.guardrails_note,
        }
    }
}

impl From<TurnOutcome> for PlanResponse {
    fn from(outcome: TurnOutcome) -> Self {
        let turn = outcome.turn;
        Self {
            itinerary: turn.reply,
            source: turn.source,
            monitored: turn.monitored,
            session_id: turn.session_id.0,
            guardrails_note: turn.guardrails_note,
        }
    }
}

/// The full HTTP surface: health plus the API, wrapped in CORS and request tracing.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    health::router(state.runtime.clone())
        .merge(router(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/chat", post(chat))
        .route("/plan", post(plan))
        .with_state(state)
}

async fn index() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": "agentdesk",
        "endpoints": ["/health", "/login", "/logout", "/chat", "/plan"],
    }))
}

async fn login(
    State(state): State<AppState>,
    payload: Result<Json<Credential>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let credential = body_or_bad_request(payload, "login")?;
    let outcome = state
        .login
        .login(&credential)
        .await
        .map_err(|error| error_response(ApplicationError::from(error), "login"))?;

    Ok(Json(LoginResponse { message: outcome.message, token: outcome.token.0 }))
}

async fn logout(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<LogoutResponse>, ApiError> {
    state
        .guard
        .logout(Some(&user.token))
        .await
        .map_err(|error| error_response(ApplicationError::from(error), "logout"))?;

    Ok(Json(LogoutResponse { message: format!("Goodbye, {}!", user.username()) }))
}

async fn chat(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let request = body_or_bad_request(payload, "chat")?;
    let outcome = state
        .runtime
        .handle_chat(
            user.username(),
            ChatTurnRequest {
                message: request.message,
                messages: request.messages,
                session_id: request.session_id,
            },
        )
        .await
        .map_err(|error| error_response(error, "chat"))?;

    Ok(Json(ChatResponse::from(outcome)))
}

async fn plan(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    payload: Result<Json<PlanRequest>, JsonRejection>,
) -> Result<Json<PlanResponse>, ApiError> {
    let request = body_or_bad_request(payload, "plan")?;
    let outcome = state
        .runtime
        .handle_plan(user.username(), request.trip, request.session_id)
        .await
        .map_err(|error| error_response(error, "plan"))?;

    Ok(Json(PlanResponse::from(outcome)))
}
