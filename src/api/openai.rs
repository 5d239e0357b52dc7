//! OpenAI Chat Completions wire format: response and stream-chunk parsing.
//!
//! Complete responses read `choices[0].message.content`, stream chunks read
//! `choices[0].delta.content`. A missing path yields no content rather than
//! an error, since control frames (role announcements, usage-only frames)
//! legitimately omit it.

use serde::Deserialize;
use serde_json::Value;

use crate::client::ClientError;
use crate::model::{AiMessage, ChatResponse, FinishReason, Usage};

/// Which content path a payload is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    /// `choices[0].message.content` of a non-streamed reply.
    Complete,
    /// `choices[0].delta.content` of a stream chunk.
    Delta,
}

/// Normalized content of one payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    pub content: Option<String>,
    pub finish_reason: Option<FinishReason>,
    pub usage: Option<Usage>,
}

/// Parse one JSON payload in the given mode.
///
/// A top-level `error` object short-circuits into [`ClientError::Provider`];
/// invalid JSON is a [`ClientError::Parse`] carrying the raw text.
pub fn parse_payload(raw: &str, mode: ParseMode) -> Result<Fragment, ClientError> {
    let payload: ChatPayload =
        serde_json::from_str(raw).map_err(|e| ClientError::invalid_json(raw, e))?;

    if let Some(error) = payload.error.filter(|e| !e.is_empty()) {
        return Err(error.into_client_error(None, raw));
    }

    let choice = payload.choices.into_iter().next();
    let content = choice.as_ref().and_then(|choice| match mode {
        ParseMode::Complete => choice.message.as_ref().and_then(|m| m.content.clone()),
        ParseMode::Delta => choice.delta.as_ref().and_then(|m| m.content.clone()),
    });

    Ok(Fragment {
        content,
        finish_reason: choice
            .and_then(|choice| choice.finish_reason)
            .map(|reason| FinishReason::from_wire(&reason)),
        usage: payload.usage.map(Usage::from),
    })
}

/// Parse the body of a non-streamed reply.
pub fn parse_response(raw: &str) -> Result<ChatResponse, ClientError> {
    if raw.trim().is_empty() {
        return Err(ClientError::Parse {
            message: "empty response".to_string(),
            raw: Some(raw.to_string()),
        });
    }

    let fragment = parse_payload(raw, ParseMode::Complete)?;
    let mut message = AiMessage::complete(fragment.content.unwrap_or_default());
    message.finish_reason = fragment.finish_reason.clone();
    message.usage = fragment.usage;

    Ok(ChatResponse {
        message,
        finish_reason: fragment.finish_reason,
        usage: fragment.usage,
        raw: raw.to_string(),
    })
}

/// Classify a non-2xx reply.
///
/// A body holding a provider error object becomes [`ClientError::Provider`]
/// with the status attached, anything else [`ClientError::Status`].
pub fn error_from_status(status: u16, body: &str) -> ClientError {
    match serde_json::from_str::<ChatPayload>(body) {
        Ok(ChatPayload {
            error: Some(error), ..
        }) if !error.is_empty() => error.into_client_error(Some(status), body),
        _ => ClientError::Status {
            status,
            body: body.to_string(),
        },
    }
}

// --- Chat Completions API Types ---

#[derive(Debug, Clone, Deserialize)]
struct ChatPayload {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
    error: Option<ChatError>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: Option<ChatContent>,
    delta: Option<ChatContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatContent {
    content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

impl From<ChatUsage> for Usage {
    fn from(usage: ChatUsage) -> Self {
        Usage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ChatError {
    message: Option<String>,
    // Some providers send numeric codes.
    code: Option<Value>,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

impl ChatError {
    fn is_empty(&self) -> bool {
        self.message.is_none() && self.code.is_none() && self.error_type.is_none()
    }

    fn into_client_error(self, status: Option<u16>, raw: &str) -> ClientError {
        let code = match self.code {
            Some(Value::String(code)) => Some(code),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        };
        ClientError::Provider {
            message: self.message.unwrap_or_else(|| "unknown provider error".to_string()),
            code,
            kind: self.error_type,
            status,
            raw: raw.to_string(),
        }
    }
}
