use std::sync::Arc;

use agentdesk_agent::AgentRuntime;
use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    runtime: Arc<AgentRuntime>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub agent: &'static str,
    pub checked_at: String,
}

pub fn router(runtime: Arc<AgentRuntime>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { runtime })
}

/// Liveness only: an unconfigured agent still serves fallback replies.
pub async fn health(State(state): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        agent: if state.runtime.agent_configured() { "configured" } else { "offline" },
        checked_at: Utc::now().to_rfc3339(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use agentdesk_agent::guardrails::DisabledGuard;
    use agentdesk_agent::monitor::DisabledMonitor;
    use agentdesk_agent::runner::UnconfiguredAgent;
    use agentdesk_agent::AgentRuntime;
    use axum::{extract::State, Json};

    use crate::health::{health, HealthState};

    #[tokio::test]
    async fn health_reports_offline_agent() {
        let runtime = AgentRuntime::new(
            Arc::new(UnconfiguredAgent::new("no key")),
            Arc::new(DisabledGuard),
            Arc::new(DisabledMonitor),
            true,
        );

        let Json(payload) = health(State(HealthState { runtime: Arc::new(runtime) })).await;

        assert_eq!(payload.status, "ok");
        assert_eq!(payload.agent, "offline");
        assert!(!payload.checked_at.is_empty());
    }
}
