//! Conversation and response types shared by every stage of the pipeline.

use std::fmt;

/// Role of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Wire name used by OpenAI-compatible APIs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single role-tagged text turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    System(String),
    User(String),
    Assistant(String),
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message::System(content.into())
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message::User(content.into())
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message::Assistant(content.into())
    }

    pub fn role(&self) -> Role {
        match self {
            Message::System(_) => Role::System,
            Message::User(_) => Role::User,
            Message::Assistant(_) => Role::Assistant,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Message::System(text) | Message::User(text) | Message::Assistant(text) => text,
        }
    }
}

/// An ordered conversation handed to the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prompt {
    messages: Vec<Message>,
}

impl Prompt {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// Single-turn prompt holding one user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(vec![Message::user(text)])
    }

    /// Prepend a system instruction.
    pub fn with_system(mut self, text: impl Into<String>) -> Self {
        self.messages.insert(0, Message::system(text));
        self
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl From<&str> for Prompt {
    fn from(text: &str) -> Self {
        Prompt::user(text)
    }
}

impl From<String> for Prompt {
    fn from(text: String) -> Self {
        Prompt::user(text)
    }
}

impl From<Vec<Message>> for Prompt {
    fn from(messages: Vec<Message>) -> Self {
        Prompt::new(messages)
    }
}

/// Reason the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    ToolCalls,
    Other(String),
}

impl FinishReason {
    pub fn from_wire(reason: &str) -> Self {
        match reason {
            "stop" => FinishReason::Stop,
            "length" => FinishReason::Length,
            "content_filter" => FinishReason::ContentFilter,
            "tool_calls" | "function_call" => FinishReason::ToolCalls,
            other => FinishReason::Other(other.to_string()),
        }
    }
}

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Assistant output, either complete or as a streaming delta.
///
/// While streaming, `content` holds only the newest fragment and
/// `full_content` everything merged so far. Once `finished` is set the
/// message is frozen: `content` is empty and `full_content` is final.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AiMessage {
    pub content: String,
    pub full_content: String,
    pub finished: bool,
    pub finish_reason: Option<FinishReason>,
    pub usage: Option<Usage>,
}

impl AiMessage {
    /// A finished, non-streamed message.
    pub fn complete(content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            full_content: content.clone(),
            content,
            finished: true,
            ..Self::default()
        }
    }

    /// Append a streamed fragment to the running buffer.
    pub fn merge(&mut self, fragment: &str) {
        self.content = fragment.to_string();
        self.full_content.push_str(fragment);
    }

    /// Snapshot carrying only `fragment` plus the buffer so far.
    pub fn delta(&self, fragment: &str) -> Self {
        Self {
            content: fragment.to_string(),
            full_content: self.full_content.clone(),
            finished: false,
            finish_reason: None,
            usage: None,
        }
    }

    pub(crate) fn freeze(&mut self) {
        self.content.clear();
        self.finished = true;
    }

    /// The text of the message as the caller should see it.
    pub fn text(&self) -> &str {
        &self.full_content
    }
}

/// Successful result of a synchronous call.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatResponse {
    pub message: AiMessage,
    pub finish_reason: Option<FinishReason>,
    pub usage: Option<Usage>,
    /// The provider payload this response was parsed from.
    pub raw: String,
}

impl ChatResponse {
    pub fn content(&self) -> &str {
        self.message.text()
    }
}
