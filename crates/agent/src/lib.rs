//! Agent runtime for chat and trip-planning turns.
//!
//! A turn is validated, screened by guardrails, answered by at most one agent
//! attempt, and optionally traced:
//! 1. **Conversation** (`conversation`) - merge client history with the new message
//! 2. **Guardrails** (`guardrails`) - screen the prompt, then the reply
//! 3. **Agent** (`runner`, `llm`, `tools`) - one chat-completions exchange with tool calls
//! 4. **Fallback** (`fallback`) - canned replies when the agent is unavailable
//! 5. **Monitor** (`monitor`) - record the input/output pair against the session
//!
//! `AgentRuntime` in `runtime` ties these together. Collaborators sit behind
//! traits so tests can substitute deterministic fakes.

pub mod conversation;
pub mod fallback;
pub mod guardrails;
pub mod llm;
pub mod monitor;
pub mod runner;
pub mod runtime;
pub mod tools;

pub use runner::{AgentError, AgentReply, AgentRequest, AgentRunner};
pub use runtime::{AgentRuntime, ChatTurnRequest, TurnOutcome, TurnStage};
