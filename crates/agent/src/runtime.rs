use std::sync::Arc;

use agentdesk_core::config::AppConfig;
use agentdesk_core::domain::chat::{ChatMessage, ChatTurn, ReplySource, SessionId};
use agentdesk_core::domain::plan::TripRequest;
use agentdesk_core::errors::ApplicationError;
use tracing::{info, warn};

use crate::conversation::Conversation;
use crate::fallback::{offline_reply, starter_itinerary};
use crate::guardrails::{
    DisabledGuard, GuardrailChecker, GuardrailStage, GuardrailVerdict, KeywordGuard,
};
use crate::llm::{LlmError, OpenAiCompatibleClient};
use crate::monitor::{DisabledMonitor, IngestionMonitor, MonitorError, TraceMonitor, TraceRecord};
use crate::runner::{AgentRequest, AgentRunner, ToolCallingAgent, UnconfiguredAgent};
use crate::tools::ToolRegistry;

pub const PROMPT_BLOCKED_REPLY: &str = "I am sorry but I cannot engage in this type of behavior.";
pub const CONTENT_BLOCKED_REPLY: &str = "I am sorry but I am experiencing some difficulties.";
pub const OFF_TOPIC_REPLY: &str = "Can you provide more details on what you are looking for?";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnStage {
    Received,
    Validated,
    AgentAttempted,
    AgentSucceeded,
    AgentFailed,
    GuardrailChecked,
    Responded,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChatTurnRequest {
    pub message: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub session_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnOutcome {
    pub turn: ChatTurn,
    pub stages: Vec<TurnStage>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TurnKind {
    Chat,
    Plan,
}

impl TurnKind {
    fn trace_name(&self) -> &'static str {
        match self {
            Self::Chat => "chat-turn",
            Self::Plan => "travel-plan",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeBuildError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Monitor(#[from] MonitorError),
}

/// Runs one validated turn against the agent, its guardrails and the monitor.
pub struct AgentRuntime {
    runner: Arc<dyn AgentRunner>,
    guardrails: Arc<dyn GuardrailChecker>,
    monitor: Arc<dyn TraceMonitor>,
    offline_fallback: bool,
}

impl AgentRuntime {
    pub fn new(
        runner: Arc<dyn AgentRunner>,
        guardrails: Arc<dyn GuardrailChecker>,
        monitor: Arc<dyn TraceMonitor>,
        offline_fallback: bool,
    ) -> Self {
        Self { runner, guardrails, monitor, offline_fallback }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, RuntimeBuildError> {
        let runner: Arc<dyn AgentRunner> = if config.llm.is_configured() {
            let client = OpenAiCompatibleClient::from_config(&config.llm)?;
            let tools = ToolRegistry::with_builtin_tools(config.agent.documents_dir.clone());
            Arc::new(ToolCallingAgent::new(
                Arc::new(client),
                Arc::new(tools),
                config.llm.max_tool_rounds,
            ))
        } else {
            Arc::new(UnconfiguredAgent::new("no API key configured for the LLM provider"))
        };

        let guardrails: Arc<dyn GuardrailChecker> = if config.guardrails.enabled {
            Arc::new(KeywordGuard::from_config(&config.guardrails))
        } else {
            Arc::new(DisabledGuard)
        };

        let monitor: Arc<dyn TraceMonitor> = match IngestionMonitor::from_config(&config.monitor)? {
            Some(monitor) => Arc::new(monitor),
            None => Arc::new(DisabledMonitor),
        };

        Ok(Self::new(runner, guardrails, monitor, config.agent.offline_fallback))
    }

    pub fn agent_configured(&self) -> bool {
        self.runner.is_configured()
    }

    pub async fn handle_chat(
        &self,
        user: &str,
        request: ChatTurnRequest,
    ) -> Result<TurnOutcome, ApplicationError> {
        let mut stages = vec![TurnStage::Received];
        // An explicit blank message is rejected even when history is present.
        let blank_message =
            request.message.as_deref().is_some_and(|message| message.trim().is_empty());
        let conversation = Conversation::assemble(request.messages, request.message.as_deref());
        let message = match conversation.pending_user_message() {
            Some(message) if !blank_message => message.to_string(),
            _ => return Err(ApplicationError::BadRequest("message cannot be empty".to_string())),
        };
        stages.push(TurnStage::Validated);

        let session_id = SessionId::from_client(request.session_id.as_deref());
        let fallback = || (offline_reply(&message).to_string(), ReplySource::RuleBased);
        self.run_turn(TurnKind::Chat, user, conversation, &message, session_id, stages, fallback)
            .await
    }

    pub async fn handle_plan(
        &self,
        user: &str,
        request: TripRequest,
        session_id: Option<String>,
    ) -> Result<TurnOutcome, ApplicationError> {
        let mut stages = vec![TurnStage::Received];
        request.validate()?;
        stages.push(TurnStage::Validated);

        let prompt = request.prompt();
        let session_id = SessionId::from_client(session_id.as_deref());
        let destination = request.destination().to_string();
        let fallback = || (starter_itinerary(&destination), ReplySource::Fallback);
        let conversation = Conversation::single(prompt.clone());
        self.run_turn(TurnKind::Plan, user, conversation, &prompt, session_id, stages, fallback)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_turn<F>(
        &self,
        kind: TurnKind,
        user: &str,
        conversation: Conversation,
        prompt: &str,
        session_id: SessionId,
        mut stages: Vec<TurnStage>,
        fallback: F,
    ) -> Result<TurnOutcome, ApplicationError>
    where
        F: FnOnce() -> (String, ReplySource),
    {
        let monitored = self.monitor.is_reachable().await;
        let context = TurnContext { kind, user, prompt, session_id, monitored };

        let precheck = self.guardrails.check_prompt(prompt).await;
        if !precheck.is_pass() {
            stages.push(TurnStage::GuardrailChecked);
            let (reply, note) = blocked_reply(&precheck);
            warn!(
                event_name = "agent.turn.blocked",
                correlation_id = %context.session_id.as_str(),
                note = %note,
                "prompt rejected by guardrails"
            );
            return Ok(self.finish(context, stages, reply, ReplySource::Blocked, Some(note)).await);
        }

        stages.push(TurnStage::AgentAttempted);
        let request = AgentRequest {
            messages: conversation.into_messages(),
            session_id: context.session_id.clone(),
        };
        match self.runner.run(request).await {
            Ok(reply) => {
                stages.push(TurnStage::AgentSucceeded);
                let verdict = self.guardrails.check_reply(prompt, &reply.text).await;
                stages.push(TurnStage::GuardrailChecked);
                if verdict.is_pass() {
                    let source = ReplySource::Agent { model: reply.model };
                    return Ok(self.finish(context, stages, reply.text, source, None).await);
                }

                let (text, note) = blocked_reply(&verdict);
                warn!(
                    event_name = "agent.turn.blocked",
                    correlation_id = %context.session_id.as_str(),
                    note = %note,
                    "agent reply rejected by guardrails"
                );
                Ok(self.finish(context, stages, text, ReplySource::Blocked, Some(note)).await)
            }
            Err(error) => {
                stages.push(TurnStage::AgentFailed);
                warn!(
                    event_name = "agent.turn.agent_failed",
                    correlation_id = %context.session_id.as_str(),
                    error = %error,
                    fallback = self.offline_fallback,
                    "agent attempt failed"
                );
                if !self.offline_fallback {
                    return Err(ApplicationError::AgentUnavailable(
                        "The agent is currently unavailable. Please try again later.".to_string(),
                    ));
                }
                let (text, source) = fallback();
                Ok(self.finish(context, stages, text, source, None).await)
            }
        }
    }

    async fn finish(
        &self,
        context: TurnContext<'_>,
        mut stages: Vec<TurnStage>,
        reply: String,
        source: ReplySource,
        guardrails_note: Option<String>,
    ) -> TurnOutcome {
        let TurnContext { kind, user, prompt, session_id, monitored } = context;
        if monitored {
            let trace = TraceRecord {
                session_id: session_id.clone(),
                name: kind.trace_name().to_string(),
                user: user.to_string(),
                input: prompt.to_string(),
                output: reply.clone(),
                source: source.to_string(),
            };
            if let Err(error) = self.monitor.record(trace).await {
                warn!(
                    event_name = "monitor.record_failed",
                    correlation_id = %session_id.as_str(),
                    error = %error,
                    "trace could not be recorded"
                );
            }
        }

        stages.push(TurnStage::Responded);
        info!(
            event_name = "agent.turn.responded",
            correlation_id = %session_id.as_str(),
            kind = kind.trace_name(),
            source = %source,
            monitored,
            "turn completed"
        );

        TurnOutcome {
            turn: ChatTurn {
                session_id,
                reply,
                source,
                monitored,
                guardrails_note,
            },
            stages,
        }
    }
}

struct TurnContext<'a> {
    kind: TurnKind,
    user: &'a str,
    prompt: &'a str,
    session_id: SessionId,
    monitored: bool,
}

/// Apology text and note for a non-pass verdict. Errors fail closed.
fn blocked_reply(verdict: &GuardrailVerdict) -> (String, String) {
    match verdict {
        GuardrailVerdict::Blocked { stage, reason } => {
            let reply = match stage {
                GuardrailStage::Prompt => PROMPT_BLOCKED_REPLY,
                GuardrailStage::ReplyContent => CONTENT_BLOCKED_REPLY,
                GuardrailStage::ReplyRelevance => OFF_TOPIC_REPLY,
            };
            (reply.to_string(), format!("{}: {reason}", stage.as_str()))
        }
        GuardrailVerdict::Error { message } => {
            (PROMPT_BLOCKED_REPLY.to_string(), format!("guardrail error: {message}"))
        }
        GuardrailVerdict::Pass => (String::new(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use agentdesk_core::domain::chat::{ChatMessage, ReplySource};
    use agentdesk_core::domain::plan::TripRequest;
    use agentdesk_core::errors::ApplicationError;
    use async_trait::async_trait;
    use chrono::NaiveDate;

    use super::{
        AgentRuntime, ChatTurnRequest, TurnStage, CONTENT_BLOCKED_REPLY, OFF_TOPIC_REPLY,
        PROMPT_BLOCKED_REPLY,
    };
    use crate::guardrails::{
        DisabledGuard, GuardrailChecker, GuardrailStage, GuardrailVerdict, KeywordGuard,
    };
    use crate::monitor::{MonitorError, TraceMonitor, TraceRecord};
    use crate::runner::{AgentError, AgentReply, AgentRequest, AgentRunner};

    struct CountingRunner {
        calls: AtomicUsize,
        reply: Option<String>,
    }

    impl CountingRunner {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self { calls: AtomicUsize::new(0), reply: Some(text.to_string()) })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self { calls: AtomicUsize::new(0), reply: None })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AgentRunner for CountingRunner {
        async fn run(&self, _request: AgentRequest) -> Result<AgentReply, AgentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Some(text) => {
                    Ok(AgentReply { text: text.clone(), model: "fake-model".to_string() })
                }
                None => Err(AgentError::EmptyReply),
            }
        }
    }

    #[derive(Default)]
    struct RecordingMonitor {
        reachable: bool,
        checks: AtomicUsize,
        traces: Mutex<Vec<TraceRecord>>,
    }

    #[async_trait]
    impl TraceMonitor for RecordingMonitor {
        async fn is_reachable(&self) -> bool {
            self.checks.fetch_add(1, Ordering::SeqCst);
            self.reachable
        }

        async fn record(&self, trace: TraceRecord) -> Result<(), MonitorError> {
            self.traces.lock().expect("lock").push(trace);
            Err(MonitorError::Transport("ingestion offline".to_string()))
        }
    }

    struct BrokenGuard;

    #[async_trait]
    impl GuardrailChecker for BrokenGuard {
        async fn check_prompt(&self, _prompt: &str) -> GuardrailVerdict {
            GuardrailVerdict::Error { message: "validator unavailable".to_string() }
        }

        async fn check_reply(&self, _prompt: &str, _reply: &str) -> GuardrailVerdict {
            GuardrailVerdict::Pass
        }
    }

    struct OffTopicGuard;

    #[async_trait]
    impl GuardrailChecker for OffTopicGuard {
        async fn check_prompt(&self, _prompt: &str) -> GuardrailVerdict {
            GuardrailVerdict::Pass
        }

        async fn check_reply(&self, _prompt: &str, _reply: &str) -> GuardrailVerdict {
            GuardrailVerdict::Blocked {
                stage: GuardrailStage::ReplyRelevance,
                reason: "off topic".to_string(),
            }
        }
    }

    fn runtime(
        runner: Arc<CountingRunner>,
        guard: Arc<dyn GuardrailChecker>,
        monitor: Arc<RecordingMonitor>,
        offline_fallback: bool,
    ) -> AgentRuntime {
        AgentRuntime::new(runner, guard, monitor, offline_fallback)
    }

    fn keyword_guard() -> Arc<dyn GuardrailChecker> {
        Arc::new(KeywordGuard::new(vec!["politics".to_string()], vec!["weapons".to_string()], true))
    }

    fn chat(message: &str) -> ChatTurnRequest {
        ChatTurnRequest { message: Some(message.to_string()), ..ChatTurnRequest::default() }
    }

    fn trip() -> TripRequest {
        TripRequest {
            destination: "Lisbon".to_string(),
            num_days: 3,
            budget: 1_200,
            preferences: "Food".to_string(),
            start_date: NaiveDate::from_ymd_opt(2026, 6, 1).expect("date"),
        }
    }

    #[tokio::test]
    async fn blank_message_is_rejected_without_external_calls() {
        let runner = CountingRunner::replying("hi");
        let monitor = Arc::new(RecordingMonitor::default());
        let runtime = runtime(runner.clone(), Arc::new(DisabledGuard), monitor.clone(), true);

        let blank_after_history = ChatTurnRequest {
            message: Some("   ".to_string()),
            messages: vec![ChatMessage::user("streamlit?"), ChatMessage::assistant("hi")],
            session_id: None,
        };
        let history_without_question = ChatTurnRequest {
            message: None,
            messages: vec![ChatMessage::user("streamlit?"), ChatMessage::assistant("hi")],
            session_id: None,
        };

        for request in [
            chat("   "),
            chat(""),
            ChatTurnRequest::default(),
            blank_after_history,
            history_without_question,
        ] {
            let error = runtime.handle_chat("student", request).await.expect_err("blank");
            assert_eq!(error, ApplicationError::BadRequest("message cannot be empty".to_string()));
        }
        assert_eq!(runner.calls(), 0);
        assert_eq!(monitor.checks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn agent_reply_is_returned_with_model_source() {
        let runner = CountingRunner::replying("Hello! Ask me about Streamlit.");
        let runtime = runtime(runner.clone(), keyword_guard(), Arc::default(), true);

        let outcome = runtime.handle_chat("student", chat("hello")).await.expect("turn");

        assert_eq!(outcome.turn.reply, "Hello! Ask me about Streamlit.");
        assert_eq!(outcome.turn.source, ReplySource::Agent { model: "fake-model".to_string() });
        assert!(!outcome.turn.monitored);
        assert_eq!(
            outcome.stages,
            vec![
                TurnStage::Received,
                TurnStage::Validated,
                TurnStage::AgentAttempted,
                TurnStage::AgentSucceeded,
                TurnStage::GuardrailChecked,
                TurnStage::Responded,
            ]
        );
    }

    #[tokio::test]
    async fn agent_failure_falls_back_to_rule_based_reply() {
        let runner = CountingRunner::failing();
        let runtime = runtime(runner.clone(), keyword_guard(), Arc::default(), true);

        let outcome =
            runtime.handle_chat("student", chat("How do I use FastAPI?")).await.expect("turn");

        assert_eq!(runner.calls(), 1);
        assert_eq!(outcome.turn.source, ReplySource::RuleBased);
        assert!(outcome.turn.reply.starts_with("FastAPI ships with automatic docs"));
        assert!(outcome.stages.contains(&TurnStage::AgentFailed));
        assert_eq!(outcome.stages.last(), Some(&TurnStage::Responded));
    }

    #[tokio::test]
    async fn agent_failure_without_fallback_is_unavailable() {
        let runtime = runtime(CountingRunner::failing(), keyword_guard(), Arc::default(), false);

        let error = runtime.handle_chat("student", chat("hello")).await.expect_err("unavailable");

        assert!(matches!(error, ApplicationError::AgentUnavailable(_)));
    }

    #[tokio::test]
    async fn blocked_prompt_never_reaches_the_agent() {
        let runner = CountingRunner::replying("sure");
        let runtime = runtime(runner.clone(), keyword_guard(), Arc::default(), true);

        let outcome =
            runtime.handle_chat("student", chat("Let's discuss politics")).await.expect("turn");

        assert_eq!(runner.calls(), 0);
        assert_eq!(outcome.turn.reply, PROMPT_BLOCKED_REPLY);
        assert_eq!(outcome.turn.source, ReplySource::Blocked);
        assert!(outcome.turn.guardrails_note.as_deref().unwrap_or_default().contains("politics"));
    }

    #[tokio::test]
    async fn guardrail_errors_fail_closed() {
        let runner = CountingRunner::replying("sure");
        let runtime = runtime(runner.clone(), Arc::new(BrokenGuard), Arc::default(), true);

        let outcome = runtime.handle_chat("student", chat("hello")).await.expect("turn");

        assert_eq!(runner.calls(), 0);
        assert_eq!(outcome.turn.source, ReplySource::Blocked);
        assert!(outcome
            .turn
            .guardrails_note
            .as_deref()
            .unwrap_or_default()
            .contains("validator unavailable"));
    }

    #[tokio::test]
    async fn unsafe_reply_is_replaced_by_apology() {
        let runner = CountingRunner::replying("Here is how to buy weapons.");
        let runtime = runtime(runner, keyword_guard(), Arc::default(), true);

        let outcome = runtime.handle_chat("student", chat("hello")).await.expect("turn");

        assert_eq!(outcome.turn.reply, CONTENT_BLOCKED_REPLY);
        assert_eq!(outcome.turn.source, ReplySource::Blocked);
    }

    #[tokio::test]
    async fn off_topic_reply_asks_for_details() {
        let runner = CountingRunner::replying("Bananas.");
        let runtime = runtime(runner, Arc::new(OffTopicGuard), Arc::default(), true);

        let outcome = runtime.handle_chat("student", chat("hello")).await.expect("turn");

        assert_eq!(outcome.turn.reply, OFF_TOPIC_REPLY);
    }

    #[tokio::test]
    async fn monitored_turn_records_trace_and_ignores_failures() {
        let monitor = Arc::new(RecordingMonitor { reachable: true, ..RecordingMonitor::default() });
        let runtime =
            runtime(CountingRunner::failing(), Arc::new(DisabledGuard), monitor.clone(), true);

        let request = ChatTurnRequest {
            message: Some("monitor tips".to_string()),
            messages: vec![ChatMessage::assistant("hello")],
            session_id: Some("session-42".to_string()),
        };
        let outcome = runtime.handle_chat("student", request).await.expect("turn");

        assert!(outcome.turn.monitored);
        assert_eq!(outcome.turn.session_id.as_str(), "session-42");
        let traces = monitor.traces.lock().expect("lock");
        assert_eq!(traces.len(), 1);
        assert_eq!(traces[0].name, "chat-turn");
        assert_eq!(traces[0].source, "rule-based");
        assert_eq!(traces[0].input, "monitor tips");
    }

    #[tokio::test]
    async fn plan_falls_back_to_starter_itinerary() {
        let runner = CountingRunner::failing();
        let runtime = runtime(runner.clone(), Arc::new(DisabledGuard), Arc::default(), true);

        let outcome = runtime.handle_plan("student", trip(), None).await.expect("plan");

        assert_eq!(runner.calls(), 1);
        assert_eq!(outcome.turn.source, ReplySource::Fallback);
        assert!(outcome.turn.reply.starts_with("Here's a quick starter itinerary for Lisbon."));
        assert!(!outcome.turn.session_id.as_str().is_empty());
    }

    #[tokio::test]
    async fn invalid_plan_is_rejected_before_the_agent() {
        let runner = CountingRunner::replying("itinerary");
        let runtime = runtime(runner.clone(), Arc::new(DisabledGuard), Arc::default(), true);
        let mut request = trip();
        request.num_days = 0;

        let error = runtime.handle_plan("student", request, None).await.expect_err("invalid");

        assert!(matches!(error, ApplicationError::BadRequest(_)));
        assert_eq!(runner.calls(), 0);
    }
}
