//! Trace recording against a Langfuse-compatible public API.

use std::time::Duration;

use agentdesk_core::config::MonitorConfig;
use agentdesk_core::domain::chat::SessionId;
use async_trait::async_trait;
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

const MONITOR_TIMEOUT_SECS: u64 = 5;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceRecord {
    pub session_id: SessionId,
    pub name: String,
    pub user: String,
    pub input: String,
    pub output: String,
    pub source: String,
}

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("monitor is disabled")]
    Disabled,
    #[error("monitor transport error: {0}")]
    Transport(String),
    #[error("monitor rejected trace with status {status}")]
    Rejected { status: u16 },
}

#[async_trait]
pub trait TraceMonitor: Send + Sync {
    async fn is_reachable(&self) -> bool;
    async fn record(&self, trace: TraceRecord) -> Result<(), MonitorError>;
}

pub struct DisabledMonitor;

#[async_trait]
impl TraceMonitor for DisabledMonitor {
    async fn is_reachable(&self) -> bool {
        false
    }

    async fn record(&self, _trace: TraceRecord) -> Result<(), MonitorError> {
        Err(MonitorError::Disabled)
    }
}

pub struct IngestionMonitor {
    http: reqwest::Client,
    host: String,
    public_key: String,
    secret_key: SecretString,
    environment: String,
}

impl IngestionMonitor {
    /// `None` unless the monitor is enabled and host plus both keys are set.
    pub fn from_config(config: &MonitorConfig) -> Result<Option<Self>, MonitorError> {
        if !config.is_configured() {
            return Ok(None);
        }
        let (Some(host), Some(public_key), Some(secret_key)) =
            (&config.host, &config.public_key, &config.secret_key)
        else {
            return Ok(None);
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(MONITOR_TIMEOUT_SECS))
            .build()
            .map_err(|error| MonitorError::Transport(error.to_string()))?;

        Ok(Some(Self {
            http,
            host: host.trim().trim_end_matches('/').to_string(),
            public_key: public_key.trim().to_string(),
            secret_key: secret_key.clone(),
            environment: config.environment.clone(),
        }))
    }

    fn ingestion_batch(&self, trace: &TraceRecord) -> Value {
        let timestamp = Utc::now().to_rfc3339();
        json!({
            "batch": [{
                "id": Uuid::new_v4().to_string(),
                "timestamp": timestamp,
                "type": "trace-create",
                "body": {
                    "id": Uuid::new_v4().to_string(),
                    "timestamp": timestamp,
                    "name": trace.name,
                    "sessionId": trace.session_id.as_str(),
                    "userId": trace.user,
                    "input": trace.input,
                    "output": trace.output,
                    "environment": self.environment,
                    "metadata": { "source": trace.source },
                }
            }]
        })
    }
}

#[async_trait]
impl TraceMonitor for IngestionMonitor {
    async fn is_reachable(&self) -> bool {
        let url = format!("{}/api/public/projects", self.host);
        let response = self
            .http
            .get(&url)
            .basic_auth(&self.public_key, Some(self.secret_key.expose_secret()))
            .send()
            .await;

        match response {
            Ok(response) => response.status().is_success(),
            Err(error) => {
                debug!(event_name = "monitor.unreachable", error = %error, "monitor check failed");
                false
            }
        }
    }

    async fn record(&self, trace: TraceRecord) -> Result<(), MonitorError> {
        let url = format!("{}/api/public/ingestion", self.host);
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.public_key, Some(self.secret_key.expose_secret()))
            .json(&self.ingestion_batch(&trace))
            .send()
            .await
            .map_err(|error| MonitorError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MonitorError::Rejected { status: status.as_u16() });
        }
        Ok(())
    }
}
