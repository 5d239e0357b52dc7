//! Groq API.

use crate::config::ChatConfig;
use crate::providers::Provider;

pub struct Groq;

impl Provider for Groq {
    fn config(api_key: impl Into<String>) -> ChatConfig {
        ChatConfig::new(
            "groq",
            "https://api.groq.com",
            "/openai/v1/chat/completions",
            "llama-3.3-70b-versatile",
        )
        .with_api_key(api_key)
    }
}
