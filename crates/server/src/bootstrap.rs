use std::sync::Arc;

use agentdesk_agent::runtime::RuntimeBuildError;
use agentdesk_agent::AgentRuntime;
use agentdesk_core::auth::{AuthGuard, LoginService};
use agentdesk_core::config::{AppConfig, ConfigError};
use agentdesk_core::session::{InMemorySessionStore, SessionStore};
use thiserror::Error;
use tracing::{info, warn};

use crate::api::AppState;

pub struct Application {
    pub config: AppConfig,
    pub sessions: Arc<dyn SessionStore>,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("agent runtime setup failed: {0}")]
    Runtime(#[from] RuntimeBuildError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    if !config.auth.is_configured() {
        warn!(
            event_name = "system.bootstrap.credentials_missing",
            correlation_id = "bootstrap",
            "auth.username/auth.password are not set; every login will fail until they are"
        );
    }

    let runtime = AgentRuntime::from_config(&config)?;
    info!(
        event_name = "system.bootstrap.agent_ready",
        correlation_id = "bootstrap",
        agent = if runtime.agent_configured() { "configured" } else { "offline" },
        model = %config.llm.model,
        offline_fallback = config.agent.offline_fallback,
        guardrails = config.guardrails.enabled,
        monitor = config.monitor.is_configured(),
        "agent runtime initialized"
    );

    let sessions: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    let state = AppState {
        login: LoginService::new(&config.auth, sessions.clone()),
        guard: AuthGuard::new(sessions.clone()),
        runtime: Arc::new(runtime),
    };

    Ok(Application { config, sessions, state })
}
