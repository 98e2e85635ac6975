use agentdesk_core::domain::chat::{ChatMessage, Role};

/// The history handed to the agent for one turn.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    /// Merges client history with the standalone `message` field.
    ///
    /// Blank history entries are dropped. `message` is appended as a user turn
    /// unless the history already ends with the same user text, which is how
    /// chat UIs that send both fields behave.
    pub fn assemble(history: Vec<ChatMessage>, message: Option<&str>) -> Self {
        let mut messages: Vec<ChatMessage> = history
            .into_iter()
            .filter(|entry| !entry.content.trim().is_empty())
            .map(|entry| ChatMessage {
                role: entry.role,
                content: entry.content.trim().to_string(),
            })
            .collect();

        if let Some(text) = message.map(str::trim).filter(|text| !text.is_empty()) {
            let already_last = messages
                .last()
                .map(|last| last.role == Role::User && last.content == text)
                .unwrap_or(false);
            if !already_last {
                messages.push(ChatMessage::user(text));
            }
        }

        Self { messages }
    }

    pub fn single(prompt: impl Into<String>) -> Self {
        Self { messages: vec![ChatMessage::user(prompt)] }
    }

    /// The user message awaiting a reply. `None` when the conversation does
    /// not end on a user turn.
    pub fn pending_user_message(&self) -> Option<&str> {
        self.messages
            .last()
            .filter(|entry| entry.role == Role::User)
            .map(|entry| entry.content.as_str())
    }

    pub fn into_messages(self) -> Vec<ChatMessage> {
        self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
