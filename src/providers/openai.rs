//! OpenAI Chat Completions.
//! See: <https://platform.openai.com/docs/api-reference/chat>

use crate::config::ChatConfig;
use crate::providers::Provider;

pub struct OpenAi;

impl Provider for OpenAi {
    fn config(api_key: impl Into<String>) -> ChatConfig {
        ChatConfig::new(
            "openai",
            "https://api.openai.com",
            "/v1/chat/completions",
            "gpt-4o",
        )
        .with_api_key(api_key)
    }
}
