use std::sync::Arc;

use agentdesk_core::domain::chat::{ChatMessage, Role, SessionId};
use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::llm::{CompletionRequest, LlmClient, LlmError, LlmMessage};
use crate::tools::ToolRegistry;

pub const SYSTEM_PROMPT: &str = "You are a helpful teaching assistant for a course on building, \
deploying and monitoring AI agents with Streamlit, FastAPI and Langfuse. You also help plan \
trips. Use the available tools when they help, keep answers short and practical, and say so \
when you do not know something.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentRequest {
    pub messages: Vec<ChatMessage>,
    pub session_id: SessionId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentReply {
    pub text: String,
    pub model: String,
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent is not configured: {0}")]
    NotConfigured(String),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("agent returned no content")]
    EmptyReply,
    #[error("agent did not finish within {0} tool rounds")]
    ToolRoundsExhausted(u32),
}

#[async_trait]
pub trait AgentRunner: Send + Sync {
    fn is_configured(&self) -> bool {
        true
    }

    async fn run(&self, request: AgentRequest) -> Result<AgentReply, AgentError>;
}

/// Stands in for the agent when no provider credentials are available.
pub struct UnconfiguredAgent {
    reason: String,
}

impl UnconfiguredAgent {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

#[async_trait]
impl AgentRunner for UnconfiguredAgent {
    fn is_configured(&self) -> bool {
        false
    }

    async fn run(&self, _request: AgentRequest) -> Result<AgentReply, AgentError> {
        Err(AgentError::NotConfigured(self.reason.clone()))
    }
}

/// Chat-completions agent that may call registered tools between model turns.
pub struct ToolCallingAgent {
    client: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    max_tool_rounds: u32,
}

impl ToolCallingAgent {
    pub fn new(client: Arc<dyn LlmClient>, tools: Arc<ToolRegistry>, max_tool_rounds: u32) -> Self {
        Self { client, tools, max_tool_rounds }
    }

    fn initial_messages(&self, history: &[ChatMessage]) -> Vec<LlmMessage> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(LlmMessage::new(Role::System.as_str(), SYSTEM_PROMPT));
        messages.extend(
            history.iter().map(|entry| LlmMessage::new(entry.role.as_str(), entry.content.clone())),
        );
        messages
    }

    async fn call_tool(&self, name: &str, arguments: &str) -> String {
        let input: Value = match serde_json::from_str(arguments) {
            Ok(value) => value,
            Err(error) => {
                return json!({ "error": format!("invalid arguments: {error}") }).to_string();
            }
        };

        match self.tools.execute(name, input).await {
            Ok(output) => output.to_string(),
            Err(error) => {
                warn!(
                    event_name = "agent.tool.failed",
                    tool = name,
                    error = %error,
                    "tool call failed"
                );
                json!({ "error": error.to_string() }).to_string()
            }
        }
    }
}

#[async_trait]
impl AgentRunner for ToolCallingAgent {
    async fn run(&self, request: AgentRequest) -> Result<AgentReply, AgentError> {
        let mut messages = self.initial_messages(&request.messages);
        let tools = self.tools.specs();

        for round in 0..=self.max_tool_rounds {
            let completion = self
                .client
                .complete(CompletionRequest { messages: messages.clone(), tools: tools.clone() })
                .await?;

            if completion.message.tool_calls.is_empty() {
                let text = completion.message.text().ok_or(AgentError::EmptyReply)?;
                return Ok(AgentReply { text: text.to_string(), model: completion.model });
            }
            if round == self.max_tool_rounds {
                break;
            }

            let calls = completion.message.tool_calls.clone();
            messages.push(completion.message);
            for call in calls {
                debug!(
                    event_name = "agent.tool.called",
                    session_id = %request.session_id.as_str(),
                    tool = %call.function.name,
                    round,
                    "executing tool call"
                );
                let output = self.call_tool(&call.function.name, &call.function.arguments).await;
                messages.push(LlmMessage::tool_result(call.id, output));
            }
        }

        Err(AgentError::ToolRoundsExhausted(self.max_tool_rounds))
    }
}
